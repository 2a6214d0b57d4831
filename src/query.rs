use crate::config::EngineConfig;
use crate::index_store::FullTextIndex;
use crate::model::{SearchFilters, SearchHit};
use crate::snippet;
use crate::store::DocumentStore;
use anyhow::Result;

/// Executes a search request: queries the Full-Text Index, joins hits back
/// against the Document Store, applies post-filters, and computes snippets.
pub fn search(
    index: &FullTextIndex,
    store: &DocumentStore,
    query: &str,
    filters: &SearchFilters,
    limit: usize,
    config: &EngineConfig,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    // Filters narrow the result set, so over-fetch from the index before
    // truncating to `limit` to avoid under-filling a filtered page.
    let fetch_limit = if has_active_filter(filters) { (limit * 5).max(limit) } else { limit };
    let raw_hits = index.search(query, fetch_limit)?;
    let terms = snippet::query_terms(query);

    let mut results = Vec::with_capacity(limit);
    for raw in raw_hits {
        let Some(document) = store.get(&raw.path) else { continue };

        if !passes_filters(&document, filters) {
            continue;
        }

        let snippets = snippet::make_snippets(
            &document.content,
            &terms,
            config.snippet_radius,
            config.snippet_max_count,
            config.snippet_per_term_cap,
        );

        results.push(SearchHit {
            path: document.path.clone(),
            name: document.name.clone(),
            doc_type: document.doc_type,
            score: raw.score,
            snippets,
        });

        if results.len() >= limit {
            break;
        }
    }

    Ok(results)
}

fn has_active_filter(filters: &SearchFilters) -> bool {
    filters.types.is_some()
        || filters.date_from.is_some()
        || filters.date_to.is_some()
        || filters.min_size.is_some()
        || filters.max_size.is_some()
        || filters.folder_path.is_some()
}

fn passes_filters(document: &crate::model::Document, filters: &SearchFilters) -> bool {
    if let Some(types) = &filters.types {
        if !types.contains(&document.doc_type) {
            return false;
        }
    }
    if let Some(from) = filters.date_from {
        if document.modified < from {
            return false;
        }
    }
    if let Some(to) = filters.date_to {
        if document.modified > to {
            return false;
        }
    }
    if let Some(min) = filters.min_size {
        if document.size < min {
            return false;
        }
    }
    if let Some(max) = filters.max_size {
        if document.size > max {
            return false;
        }
    }
    if let Some(prefix) = &filters.folder_path {
        if !document.path.starts_with(prefix) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, DocumentType};
    use chrono::Utc;
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn doc(path: &str, content: &str, doc_type: DocumentType, size: u64) -> Document {
        Document {
            id: crate::model::stable_id(Path::new(path)),
            path: PathBuf::from(path),
            name: Path::new(path).file_name().unwrap().to_string_lossy().into_owned(),
            size,
            modified: Utc::now(),
            doc_type,
            content: content.to_string(),
            structured: None,
            has_warning: false,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn small_tree_scenario() {
        let dir = tempdir().unwrap();
        let index = FullTextIndex::open_or_create(dir.path()).unwrap();
        let store = DocumentStore::new();
        let config = EngineConfig::default();

        for d in [
            doc("/t/a.txt", "hello world", DocumentType::Text, 11),
            doc("/t/b.md", "hello friends", DocumentType::Text, 13),
            doc("/t/c.docx", "greetings world", DocumentType::Word, 15),
        ] {
            index.upsert(&d).unwrap();
            store.put(d);
        }
        index.commit().unwrap();

        let hits = search(&index, &store, "hello", &SearchFilters::default(), 10, &config).unwrap();
        let mut names: Vec<_> = hits.iter().map(|h| h.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "b.md".to_string()]);

        let hits = search(&index, &store, "world", &SearchFilters::default(), 10, &config).unwrap();
        let mut names: Vec<_> = hits.iter().map(|h| h.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt".to_string(), "c.docx".to_string()]);

        let hits =
            search(&index, &store, "\"hello world\"", &SearchFilters::default(), 10, &config).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "a.txt");
    }

    #[test]
    fn filters_narrow_the_result_set() {
        let dir = tempdir().unwrap();
        let index = FullTextIndex::open_or_create(dir.path()).unwrap();
        let store = DocumentStore::new();
        let config = EngineConfig::default();

        for d in [
            doc("/t/small.txt", "hello small", DocumentType::Text, 5),
            doc("/t/big.pdf", "hello big", DocumentType::Pdf, 5000),
        ] {
            index.upsert(&d).unwrap();
            store.put(d);
        }
        index.commit().unwrap();

        let mut filters = SearchFilters::default();
        filters.types = Some(vec![DocumentType::Pdf]);
        let hits = search(&index, &store, "hello", &filters, 10, &config).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_type, DocumentType::Pdf);
    }
}
