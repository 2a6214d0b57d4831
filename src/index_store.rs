use crate::model::{Document, DocumentType};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::*;
use tantivy::{Index, IndexWriter, TantivyDocument, Term};

/// Wraps a persistent Tantivy index: the Full-Text Index component. Writer
/// access is serialized behind a mutex (single writer, many readers); reads
/// go through the index's own reader, which observes whatever was last
/// committed regardless of a write in flight.
pub struct FullTextIndex {
    index: Index,
    schema: Schema,
    writer: Arc<parking_lot::Mutex<IndexWriter>>,
    fields: Fields,
}

struct Fields {
    id: Field,
    path: Field,
    name: Field,
    doc_type: Field,
    size: Field,
    modified: Field,
    content: Field,
}

#[derive(Debug, Clone)]
pub struct RawHit {
    pub path: PathBuf,
    pub name: String,
    pub doc_type: DocumentType,
    pub size: u64,
    pub modified: i64,
    pub score: f32,
}

impl FullTextIndex {
    pub fn open_or_create(index_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(index_dir)?;
        let schema = Self::build_schema();
        let dir = MmapDirectory::open(index_dir).context("failed to open index directory")?;
        let index = Index::open_or_create(dir, schema.clone()).context("failed to open/create index")?;
        let writer = index.writer(64_000_000).context("failed to create index writer")?;
        let fields = Self::resolve_fields(&schema);

        Ok(Self { index, schema, writer: Arc::new(parking_lot::Mutex::new(writer)), fields })
    }

    fn build_schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING | STORED);
        builder.add_text_field("path", STRING | STORED);
        builder.add_text_field("name", TEXT | STORED);
        builder.add_text_field("doc_type", STRING | STORED);
        builder.add_u64_field("size", INDEXED | STORED);
        builder.add_date_field("modified", INDEXED | STORED);
        builder.add_text_field("content", TEXT | STORED);
        builder.build()
    }

    fn resolve_fields(schema: &Schema) -> Fields {
        Fields {
            id: schema.get_field("id").unwrap(),
            path: schema.get_field("path").unwrap(),
            name: schema.get_field("name").unwrap(),
            doc_type: schema.get_field("doc_type").unwrap(),
            size: schema.get_field("size").unwrap(),
            modified: schema.get_field("modified").unwrap(),
            content: schema.get_field("content").unwrap(),
        }
    }

    /// Upsert by stable id: delete-then-add within the writer's pending
    /// batch. Does not commit; the caller batches many of these then calls
    /// `commit` once.
    pub fn upsert(&self, doc: &Document) -> Result<()> {
        let writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.fields.id, &doc.id));

        let mut tdoc = TantivyDocument::new();
        tdoc.add_text(self.fields.id, &doc.id);
        tdoc.add_text(self.fields.path, doc.path.to_string_lossy());
        tdoc.add_text(self.fields.name, &doc.name);
        tdoc.add_text(self.fields.doc_type, doc.doc_type.as_str());
        tdoc.add_u64(self.fields.size, doc.size);
        tdoc.add_date(self.fields.modified, tantivy::DateTime::from_timestamp_secs(doc.modified.timestamp()));
        tdoc.add_text(self.fields.content, &doc.content);

        writer.add_document(tdoc)?;
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        let writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.fields.id, id));
        Ok(())
    }

    /// Commits the writer's pending batch as a single atomic commit.
    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit()?;
        Ok(())
    }

    pub fn document_count(&self) -> Result<u64> {
        let reader = self.index.reader()?;
        Ok(reader.searcher().num_docs())
    }

    /// Executes `query_str` against `content`/`name`. Falls back to a
    /// bag-of-words match on the same two fields if the query string fails
    /// to parse (so stray `* ? :` characters never surface as an error).
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<RawHit>> {
        let reader = self.index.reader()?;
        let searcher = reader.searcher();

        let trimmed = query_str.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let has_real_term = trimmed
            .split_whitespace()
            .any(|w| !matches!(w.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT"));
        if !has_real_term {
            return Ok(Vec::new());
        }

        let query: Box<dyn Query> = match self.parse_query(trimmed) {
            Ok(q) => q,
            Err(_) => self.bag_of_words_query(trimmed),
        };

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            hits.push(self.to_raw_hit(&doc, score));
        }

        // Tie-break within the already score-ranked window: newer
        // last_modified first, then shorter path, for hits whose score ties.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.modified.cmp(&a.modified))
                .then_with(|| a.path.as_os_str().len().cmp(&b.path.as_os_str().len()))
        });

        Ok(hits)
    }

    fn parse_query(&self, query_str: &str) -> Result<Box<dyn Query>> {
        let sanitized: String = query_str
            .chars()
            .map(|c| if c == '*' || c == '?' || c == ':' { ' ' } else { c })
            .collect();

        let mut parser = QueryParser::for_index(&self.index, vec![self.fields.content, self.fields.name]);
        parser.set_conjunction_by_default();
        parser.set_field_boost(self.fields.name, 2.0);
        Ok(parser.parse_query(&sanitized)?)
    }

    fn bag_of_words_query(&self, query_str: &str) -> Box<dyn Query> {
        let words: Vec<&str> = query_str
            .split(|c: char| c.is_whitespace() || c == '*' || c == '?' || c == ':')
            .filter(|w| !w.is_empty())
            .filter(|w| !matches!(w.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT"))
            .collect();

        if words.is_empty() {
            return Box::new(BooleanQuery::new(Vec::new()));
        }

        let per_word: Vec<(Occur, Box<dyn Query>)> = words
            .iter()
            .map(|w| {
                let lower = w.to_lowercase();
                let content_term = TermQuery::new(
                    Term::from_field_text(self.fields.content, &lower),
                    IndexRecordOption::Basic,
                );
                let name_term = TermQuery::new(
                    Term::from_field_text(self.fields.name, &lower),
                    IndexRecordOption::Basic,
                );
                let either: Box<dyn Query> = Box::new(BooleanQuery::new(vec![
                    (Occur::Should, Box::new(content_term)),
                    (Occur::Should, Box::new(name_term)),
                ]));
                (Occur::Must, either)
            })
            .collect();

        Box::new(BooleanQuery::new(per_word))
    }

    fn to_raw_hit(&self, doc: &TantivyDocument, score: f32) -> RawHit {
        let path = doc.get_first(self.fields.path).and_then(|v| v.as_str()).unwrap_or("").to_string();
        let name = doc.get_first(self.fields.name).and_then(|v| v.as_str()).unwrap_or("").to_string();
        let doc_type = doc
            .get_first(self.fields.doc_type)
            .and_then(|v| v.as_str())
            .and_then(DocumentType::from_str)
            .unwrap_or(DocumentType::Text);
        let size = doc.get_first(self.fields.size).and_then(|v| v.as_u64()).unwrap_or(0);
        let modified = doc
            .get_first(self.fields.modified)
            .and_then(|v| v.as_datetime())
            .map(|d| d.into_timestamp_secs())
            .unwrap_or(0);

        RawHit { path: PathBuf::from(path), name, doc_type, size, modified, score }
    }

    #[allow(dead_code)]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Looks up the stored `content` for a stable id, used to rehydrate a
    /// `Document`'s content when rebuilding the Document Store from the
    /// persisted metadata table (`store.db` does not duplicate content).
    pub fn get_content(&self, id: &str) -> Result<Option<String>> {
        let reader = self.index.reader()?;
        let searcher = reader.searcher();
        let term = Term::from_field_text(self.fields.id, id);
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let top = searcher.search(&query, &TopDocs::with_limit(1))?;
        let Some((_, address)) = top.into_iter().next() else { return Ok(None) };
        let doc: TantivyDocument = searcher.doc(address)?;
        Ok(doc.get_first(self.fields.content).and_then(|v| v.as_str()).map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    fn doc(path: &str, content: &str) -> Document {
        Document {
            id: crate::model::stable_id(Path::new(path)),
            path: PathBuf::from(path),
            name: Path::new(path).file_name().unwrap().to_string_lossy().into_owned(),
            size: content.len() as u64,
            modified: Utc::now(),
            doc_type: DocumentType::Text,
            content: content.to_string(),
            structured: None,
            has_warning: false,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_then_search_finds_the_term() {
        let dir = tempdir().unwrap();
        let index = FullTextIndex::open_or_create(dir.path()).unwrap();
        index.upsert(&doc("/t/a.txt", "hello world")).unwrap();
        index.upsert(&doc("/t/b.txt", "goodbye")).unwrap();
        index.commit().unwrap();

        let hits = index.search("hello", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, PathBuf::from("/t/a.txt"));
    }

    #[test]
    fn malformed_query_degrades_to_bag_of_words() {
        let dir = tempdir().unwrap();
        let index = FullTextIndex::open_or_create(dir.path()).unwrap();
        index.upsert(&doc("/t/a.txt", "alpha beta")).unwrap();
        index.commit().unwrap();

        // A lone colon is not valid Tantivy query syntax on its own field-less
        // term but must never error out per the query language contract.
        let hits = index.search("alpha:", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn boolean_and_or_not_behave_as_specified() {
        let dir = tempdir().unwrap();
        let index = FullTextIndex::open_or_create(dir.path()).unwrap();
        index.upsert(&doc("/t/d1.txt", "alpha beta")).unwrap();
        index.upsert(&doc("/t/d2.txt", "alpha gamma")).unwrap();
        index.commit().unwrap();

        let and_hits = index.search("alpha AND beta", 10).unwrap();
        assert_eq!(and_hits.len(), 1);
        assert_eq!(and_hits[0].path, PathBuf::from("/t/d1.txt"));

        let or_hits = index.search("alpha OR gamma", 10).unwrap();
        assert_eq!(or_hits.len(), 2);

        let not_hits = index.search("alpha NOT beta", 10).unwrap();
        assert_eq!(not_hits.len(), 1);
        assert_eq!(not_hits[0].path, PathBuf::from("/t/d2.txt"));
    }

    #[test]
    fn delete_removes_from_search_results() {
        let dir = tempdir().unwrap();
        let index = FullTextIndex::open_or_create(dir.path()).unwrap();
        let document = doc("/t/a.txt", "hello world");
        index.upsert(&document).unwrap();
        index.commit().unwrap();
        assert_eq!(index.search("hello", 10).unwrap().len(), 1);

        index.delete(&document.id).unwrap();
        index.commit().unwrap();
        assert_eq!(index.search("hello", 10).unwrap().len(), 0);
    }
}
