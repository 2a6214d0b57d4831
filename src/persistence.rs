use crate::model::{Document, DocumentType, RootFolder, SearchHistoryEntry};
use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const SCHEMA_VERSION: &str = "1";

/// The Persistence Layer: `store.db`, an embedded relational database
/// holding document metadata, roots, exclusions and search history.
/// `index/`, the full-text index itself, is owned and persisted separately
/// by `FullTextIndex`/tantivy. A single connection is shared behind a mutex;
/// writes go through transactions.
pub struct PersistenceLayer {
    conn: Mutex<Connection>,
}

impl PersistenceLayer {
    pub fn open(store_db_path: &Path) -> Result<Self> {
        let conn = Connection::open(store_db_path).context("failed to open store.db")?;
        let layer = Self { conn: Mutex::new(conn) };
        layer.init_schema()?;
        Ok(layer)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                path TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                size INTEGER NOT NULL,
                mtime_utc INTEGER NOT NULL,
                type TEXT NOT NULL,
                has_warning INTEGER NOT NULL,
                extracted_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS roots (
                path TEXT PRIMARY KEY,
                added_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS exclusions (
                path TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS search_history (
                query TEXT PRIMARY KEY,
                timestamp_utc INTEGER NOT NULL,
                result_count INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('schema_version', ?1)",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    pub fn put_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO documents (path, name, size, mtime_utc, type, has_warning, extracted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(path) DO UPDATE SET
                name=excluded.name, size=excluded.size, mtime_utc=excluded.mtime_utc,
                type=excluded.type, has_warning=excluded.has_warning, extracted_at=excluded.extracted_at",
            params![
                path_key(&doc.path),
                doc.name,
                doc.size,
                doc.modified.timestamp(),
                doc.doc_type.as_str(),
                doc.has_warning,
                doc.extracted_at.timestamp(),
            ],
        )?;
        Ok(())
    }

    pub fn remove_document(&self, path: &Path) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM documents WHERE path = ?1", params![path_key(path)])?;
        Ok(())
    }

    pub fn remove_documents_under(&self, prefix: &Path) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM documents WHERE path LIKE ?1 ESCAPE '\\'",
            params![format!("{}%", like_escape(&path_key(prefix)))],
        )?;
        Ok(())
    }

    /// Loads every persisted document-metadata row. Content is not
    /// duplicated here; the caller rehydrates it from the full-text index.
    pub fn load_document_rows(&self) -> Result<Vec<DocumentRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT path, name, size, mtime_utc, type, has_warning, extracted_at FROM documents",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let path: String = row.get(0)?;
                let ty: String = row.get(4)?;
                Ok(DocumentRow {
                    path: PathBuf::from(path),
                    name: row.get(1)?,
                    size: row.get::<_, i64>(2)? as u64,
                    modified: timestamp_to_utc(row.get(3)?),
                    doc_type: DocumentType::from_str(&ty).unwrap_or(DocumentType::Text),
                    has_warning: row.get(5)?,
                    extracted_at: timestamp_to_utc(row.get(6)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn clear_documents(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM documents", [])?;
        Ok(())
    }

    pub fn put_root(&self, root: &RootFolder) -> Result<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO roots (path, added_at) VALUES (?1, ?2)",
            params![path_key(&root.path), root.added_at.timestamp()],
        )?;
        Ok(())
    }

    pub fn remove_root(&self, path: &Path) -> Result<()> {
        self.conn.lock().execute("DELETE FROM roots WHERE path = ?1", params![path_key(path)])?;
        Ok(())
    }

    pub fn load_roots(&self) -> Result<Vec<RootFolder>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT path, added_at FROM roots")?;
        let rows = stmt
            .query_map([], |row| {
                let path: String = row.get(0)?;
                Ok(RootFolder { path: PathBuf::from(path), added_at: timestamp_to_utc(row.get(1)?) })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn add_exclusion(&self, path: &Path) -> Result<()> {
        self.conn
            .lock()
            .execute("INSERT OR IGNORE INTO exclusions (path) VALUES (?1)", params![path_key(path)])?;
        Ok(())
    }

    pub fn remove_exclusion(&self, path: &Path) -> Result<()> {
        self.conn.lock().execute("DELETE FROM exclusions WHERE path = ?1", params![path_key(path)])?;
        Ok(())
    }

    pub fn load_exclusions(&self) -> Result<Vec<PathBuf>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT path FROM exclusions")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().map(PathBuf::from).collect())
    }

    /// Upserts a history entry (newest timestamp wins on duplicate query)
    /// then trims to `cap` most-recent entries.
    pub fn record_search(&self, query: &str, result_count: u64, cap: usize) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO search_history (query, timestamp_utc, result_count) VALUES (?1, ?2, ?3)
             ON CONFLICT(query) DO UPDATE SET timestamp_utc=excluded.timestamp_utc, result_count=excluded.result_count",
            params![query, Utc::now().timestamp(), result_count as i64],
        )?;
        conn.execute(
            "DELETE FROM search_history WHERE query NOT IN (
                SELECT query FROM search_history ORDER BY timestamp_utc DESC LIMIT ?1
            )",
            params![cap as i64],
        )?;
        Ok(())
    }

    pub fn load_search_history(&self, limit: Option<usize>) -> Result<Vec<SearchHistoryEntry>> {
        let conn = self.conn.lock();
        let sql = match limit {
            Some(_) => "SELECT query, timestamp_utc, result_count FROM search_history ORDER BY timestamp_utc DESC LIMIT ?1",
            None => "SELECT query, timestamp_utc, result_count FROM search_history ORDER BY timestamp_utc DESC",
        };
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row| {
            Ok(SearchHistoryEntry {
                query: row.get(0)?,
                timestamp: timestamp_to_utc(row.get(1)?),
                result_count: row.get::<_, i64>(2)? as u64,
            })
        };
        let rows = if let Some(limit) = limit {
            stmt.query_map(params![limit as i64], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map([], map_row)?.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    pub fn clear_search_history(&self) -> Result<()> {
        self.conn.lock().execute("DELETE FROM search_history", [])?;
        Ok(())
    }

    pub fn remove_search_history_entry(&self, query: &str) -> Result<()> {
        self.conn.lock().execute("DELETE FROM search_history WHERE query = ?1", params![query])?;
        Ok(())
    }
}

/// A document-metadata row as persisted, before content is rehydrated from
/// the full-text index.
pub struct DocumentRow {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub doc_type: DocumentType,
    pub has_warning: bool,
    pub extracted_at: DateTime<Utc>,
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Escapes `LIKE` wildcard characters (`%`, `_`) and the escape character
/// itself so a path prefix is matched literally rather than as a pattern.
/// Paired with `ESCAPE '\'` on every `LIKE` clause that uses it.
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn timestamp_to_utc(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_document(path: &str) -> Document {
        Document {
            id: crate::model::stable_id(Path::new(path)),
            path: PathBuf::from(path),
            name: Path::new(path).file_name().unwrap().to_string_lossy().into_owned(),
            size: 42,
            modified: Utc::now(),
            doc_type: DocumentType::Text,
            content: "hello world".to_string(),
            structured: None,
            has_warning: false,
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn round_trips_document_metadata() {
        let dir = tempdir().unwrap();
        let layer = PersistenceLayer::open(&dir.path().join("store.db")).unwrap();
        layer.put_document(&sample_document("/root/a.txt")).unwrap();

        let rows = layer.load_document_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, PathBuf::from("/root/a.txt"));
    }

    #[test]
    fn search_history_is_capped_and_dedups_by_query() {
        let dir = tempdir().unwrap();
        let layer = PersistenceLayer::open(&dir.path().join("store.db")).unwrap();

        for i in 0..5 {
            layer.record_search(&format!("q{i}"), i, 3).unwrap();
        }
        let history = layer.load_search_history(None).unwrap();
        assert_eq!(history.len(), 3);

        layer.record_search("q4", 99, 3).unwrap();
        let history = layer.load_search_history(None).unwrap();
        assert_eq!(history.iter().find(|h| h.query == "q4").unwrap().result_count, 99);
    }

    #[test]
    fn remove_documents_under_prefix_matches_only_descendants() {
        let dir = tempdir().unwrap();
        let layer = PersistenceLayer::open(&dir.path().join("store.db")).unwrap();
        layer.put_document(&sample_document("/root/drafts/a.txt")).unwrap();
        layer.put_document(&sample_document("/root/public.txt")).unwrap();

        layer.remove_documents_under(Path::new("/root/drafts")).unwrap();
        let rows = layer.load_document_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, PathBuf::from("/root/public.txt"));
    }

    #[test]
    fn remove_documents_under_prefix_does_not_treat_underscore_as_wildcard() {
        let dir = tempdir().unwrap();
        let layer = PersistenceLayer::open(&dir.path().join("store.db")).unwrap();
        layer.put_document(&sample_document("/home/user/my_docs/a.txt")).unwrap();
        layer.put_document(&sample_document("/home/user/myXdocs/b.txt")).unwrap();

        layer.remove_documents_under(Path::new("/home/user/my_docs")).unwrap();
        let rows = layer.load_document_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, PathBuf::from("/home/user/myXdocs/b.txt"));
    }
}
