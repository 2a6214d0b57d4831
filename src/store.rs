use crate::model::{stable_id, Document, DocumentType};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Authoritative in-memory mapping from absolute path to `Document`, mirrored
/// to disk by the persistence layer. All writers take the single write lock;
/// readers take a shared read lock, so a search never observes a half-written
/// document.
#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<PathBuf, Document>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the document at `document.path`, recomputing the
    /// stable id from the path so the Store and the Full-Text Index stay in
    /// sync without an auxiliary table.
    pub fn put(&self, mut document: Document) -> Document {
        document.id = stable_id(&document.path);
        let mut guard = self.documents.write();
        guard.insert(document.path.clone(), document.clone());
        document
    }

    pub fn remove_by_path(&self, path: &Path) -> Option<Document> {
        self.documents.write().remove(path)
    }

    /// Removes every document whose path is at or under `prefix`, returning
    /// the removed entries (used when a root or an excluded folder is
    /// removed).
    pub fn remove_under_prefix(&self, prefix: &Path) -> Vec<Document> {
        let mut guard = self.documents.write();
        let to_remove: Vec<PathBuf> =
            guard.keys().filter(|p| p.starts_with(prefix)).cloned().collect();
        to_remove.iter().filter_map(|p| guard.remove(p)).collect()
    }

    pub fn get(&self, path: &Path) -> Option<Document> {
        self.documents.read().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.documents.read().contains_key(path)
    }

    pub fn iter(&self) -> Vec<Document> {
        self.documents.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_type(&self) -> HashMap<DocumentType, u64> {
        let guard = self.documents.read();
        let mut counts: HashMap<DocumentType, u64> = HashMap::new();
        for document in guard.values() {
            *counts.entry(document.doc_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn total_size(&self) -> u64 {
        self.documents.read().values().map(|d| d.size).sum()
    }

    pub fn clear(&self) {
        self.documents.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(path: &str) -> Document {
        Document {
            id: String::new(),
            path: PathBuf::from(path),
            name: Path::new(path).file_name().unwrap().to_string_lossy().into_owned(),
            size: 10,
            modified: Utc::now(),
            doc_type: DocumentType::Text,
            content: "hello".to_string(),
            structured: None,
            has_warning: false,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn put_recomputes_stable_id_from_path() {
        let store = DocumentStore::new();
        let saved = store.put(doc("/root/a.txt"));
        assert_eq!(saved.id, stable_id(Path::new("/root/a.txt")));
    }

    #[test]
    fn remove_under_prefix_only_removes_matching_paths() {
        let store = DocumentStore::new();
        store.put(doc("/root/drafts/a.txt"));
        store.put(doc("/root/public.txt"));

        let removed = store.remove_under_prefix(Path::new("/root/drafts"));
        assert_eq!(removed.len(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(Path::new("/root/public.txt")).is_some());
    }

    #[test]
    fn no_two_entries_share_a_path() {
        let store = DocumentStore::new();
        store.put(doc("/root/a.txt"));
        store.put(doc("/root/a.txt"));
        assert_eq!(store.len(), 1);
    }
}
