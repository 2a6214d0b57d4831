use crate::config::EngineConfig;
use crate::coordinator::{Coordinator, EngineState, PdfQueueStatus, Shared};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, FileChangeType};
use crate::extractors::{ExtractionOutcome, ExtractorRegistry};
use crate::index_store::FullTextIndex;
use crate::model::{
    Document, DocumentType, FileSummary, FolderNode, FolderSummary, IndexStats, RootFolder,
    SearchFilters, SearchHistoryEntry, SearchHit, StructuredContent,
};
use crate::persistence::PersistenceLayer;
use crate::query;
use crate::store::DocumentStore;
use crate::watcher::{ChangeWatcher, WatchEvent};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

/// The single top-level state object for one engine process: owns the
/// Document Store, Full-Text Index, persistence connection, watcher handle
/// and background queue, and exposes the full command surface as plain
/// methods. Constructed once at process start, torn down on shutdown.
pub struct Engine {
    coordinator: Arc<Coordinator>,
    roots: parking_lot::RwLock<Vec<RootFolder>>,
    exclusions: parking_lot::RwLock<HashSet<PathBuf>>,
    watcher: tokio::sync::Mutex<Option<WatcherHandle>>,
    config: EngineConfig,
    events: broadcast::Sender<EngineEvent>,
}

struct WatcherHandle {
    watcher: ChangeWatcher,
    pump: tokio::task::JoinHandle<()>,
}

impl Engine {
    /// Opens (or creates) the on-disk state under `data_dir`: `index/` for
    /// the Full-Text Index and `store.db` for metadata/roots/exclusions/
    /// history. Rehydrates the Document Store from persisted rows, then
    /// runs the startup self-repair pass described in §4.7.
    ///
    /// Must be called from within a Tokio runtime context: opening spawns
    /// the background PDF queue's consumer task.
    pub fn open(data_dir: &Path, config: EngineConfig) -> EngineResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| EngineError::Io { path: data_dir.to_path_buf(), source: e })?;

        let index = FullTextIndex::open_or_create(&data_dir.join("index")).map_err(EngineError::Other)?;
        let persistence = PersistenceLayer::open(&data_dir.join("store.db")).map_err(EngineError::Other)?;
        let store = DocumentStore::new();
        let extractors = ExtractorRegistry::new(config.pdf_image_only_threshold);
        let (events, _rx) = broadcast::channel(1024);

        let shared = Shared {
            store: Arc::new(store),
            index: Arc::new(index),
            extractors: Arc::new(extractors),
            persistence: Arc::new(persistence),
            events: events.clone(),
            config: config.clone(),
        };

        let roots = shared.persistence.load_roots().map_err(EngineError::Other)?;
        let exclusions: HashSet<PathBuf> =
            shared.persistence.load_exclusions().map_err(EngineError::Other)?.into_iter().collect();

        self_repair(&shared)?;

        let coordinator = Arc::new(Coordinator::new(shared));

        Ok(Self {
            coordinator,
            roots: parking_lot::RwLock::new(roots),
            exclusions: parking_lot::RwLock::new(exclusions),
            watcher: tokio::sync::Mutex::new(None),
            config,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn shared(&self) -> &Shared {
        self.coordinator.shared()
    }

    pub fn state(&self) -> EngineState {
        self.coordinator.state()
    }

    // ---- Roots -----------------------------------------------------

    /// Adds folders as new roots, ignoring any path already covered by an
    /// existing root (including descendants of one) and subsuming any
    /// existing root that is a descendant of a newly-added path.
    pub fn add_folders(&self, paths: Vec<PathBuf>) -> EngineResult<Vec<FolderSummary>> {
        let mut summaries = Vec::new();
        for path in paths {
            if !path.exists() {
                return Err(EngineError::NotFound(path));
            }
            if self.is_covered_by_existing_root(&path) {
                continue;
            }
            self.subsume_descendant_roots(&path)?;

            let root = RootFolder { path: path.clone(), added_at: chrono::Utc::now() };
            self.shared().persistence.put_root(&root).map_err(EngineError::Other)?;
            self.roots.write().push(root);

            let exclusions = self.exclusions.read().clone();
            let indexed =
                self.coordinator.scan_root(&path, &exclusions).map_err(EngineError::Other)?;
            summaries.push(FolderSummary { path, file_count: indexed.len() as u64 });
        }
        Ok(summaries)
    }

    fn is_covered_by_existing_root(&self, path: &Path) -> bool {
        self.roots.read().iter().any(|r| path.starts_with(&r.path))
    }

    fn subsume_descendant_roots(&self, parent: &Path) -> EngineResult<()> {
        let mut roots = self.roots.write();
        let (subsumed, kept): (Vec<_>, Vec<_>) = roots.drain(..).partition(|r| r.path.starts_with(parent));
        *roots = kept;
        drop(roots);
        for root in subsumed {
            self.shared().persistence.remove_root(&root.path).map_err(EngineError::Other)?;
            self.coordinator.remove_under_prefix(&root.path);
        }
        Ok(())
    }

    pub fn remove_folder(&self, path: &Path) -> EngineResult<()> {
        self.roots.write().retain(|r| r.path != path);
        self.shared().persistence.remove_root(path).map_err(EngineError::Other)?;
        self.coordinator.remove_under_prefix(path);
        Ok(())
    }

    pub fn get_indexed_folders(&self) -> Vec<FolderSummary> {
        let store = &self.shared().store;
        self.roots
            .read()
            .iter()
            .map(|r| {
                let file_count = store.iter().iter().filter(|d| d.path.starts_with(&r.path)).count() as u64;
                FolderSummary { path: r.path.clone(), file_count }
            })
            .collect()
    }

    /// Blocking full (re-)scan of one already-added root. Idempotent.
    pub fn scan_folder(&self, path: &Path) -> EngineResult<Vec<FileSummary>> {
        let exclusions = self.exclusions.read().clone();
        let indexed = self.coordinator.scan_root(path, &exclusions).map_err(EngineError::Other)?;
        Ok(indexed.iter().map(FileSummary::from).collect())
    }

    // ---- Search ------------------------------------------------------

    /// Excluded directories are purged from the Store and Index eagerly (see
    /// `add_excluded_folder`), so a search never needs a query-time
    /// exclusion filter on top of this.
    pub fn search_index(&self, query_str: &str, filters: &SearchFilters) -> EngineResult<Vec<SearchHit>> {
        let hits = query::search(
            &self.shared().index,
            &self.shared().store,
            query_str,
            filters,
            self.config.default_search_limit,
            &self.config,
        )
        .map_err(EngineError::Other)?;
        let _ = self.shared().persistence.record_search(query_str, hits.len() as u64, self.config.search_history_cap);
        Ok(hits)
    }

    pub fn extract_file_content(&self, path: &Path) -> EngineResult<(String, Option<StructuredContent>)> {
        if let Some(document) = self.shared().store.get(path) {
            return Ok((document.content, document.structured));
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Err(EngineError::Unsupported(path.to_path_buf()));
        };
        let Some(doc_type) = DocumentType::from_extension(ext) else {
            return Err(EngineError::Unsupported(path.to_path_buf()));
        };
        match self.shared().extractors.extract(path, doc_type) {
            ExtractionOutcome::Extracted { content, structured, .. } => Ok((content, structured)),
            ExtractionOutcome::Skipped { reason } => Err(EngineError::ExtractSkipped { path: path.to_path_buf(), reason }),
        }
    }

    pub fn get_all_files(&self) -> Vec<FileSummary> {
        let excluded = self.exclusions.read().clone();
        self.shared()
            .store
            .iter()
            .iter()
            .filter(|d| !is_effectively_excluded(&d.path, &excluded))
            .map(FileSummary::from)
            .collect()
    }

    pub fn get_index_stats(&self) -> IndexStats {
        let store = &self.shared().store;
        let by_type = store
            .count_by_type()
            .into_iter()
            .map(|(ty, count)| (ty.as_str().to_string(), count))
            .collect();
        IndexStats {
            total_documents: store.len() as u64,
            total_size: store.total_size(),
            by_type,
            folder_count: self.roots.read().len() as u64,
            pending_background: self.coordinator.pdf_queue_status().pending,
        }
    }

    pub fn get_folder_tree(&self) -> Vec<FolderNode> {
        let excluded = self.exclusions.read().clone();
        self.roots.read().iter().map(|r| build_folder_node(&r.path, &excluded)).collect()
    }

    // ---- Exclusions ----------------------------------------------------

    pub fn toggle_folder_exclusion(&self, path: &Path) -> EngineResult<bool> {
        let now_excluded = !self.exclusions.read().contains(path);
        if now_excluded {
            self.add_excluded_folder(path)?;
        } else {
            self.remove_excluded_folder(path)?;
        }
        Ok(now_excluded)
    }

    pub fn exclude_folders_batch(&self, paths: Vec<PathBuf>) -> EngineResult<()> {
        for path in paths {
            self.add_excluded_folder(&path)?;
        }
        Ok(())
    }

    pub fn include_folders_batch(&self, paths: Vec<PathBuf>) -> EngineResult<()> {
        for path in paths {
            self.remove_excluded_folder(&path)?;
        }
        Ok(())
    }

    pub fn get_excluded_folders(&self) -> Vec<PathBuf> {
        self.exclusions.read().iter().cloned().collect()
    }

    pub fn add_excluded_folder(&self, path: &Path) -> EngineResult<()> {
        self.exclusions.write().insert(path.to_path_buf());
        self.shared().persistence.add_exclusion(path).map_err(EngineError::Other)?;
        self.coordinator.remove_under_prefix(path);
        Ok(())
    }

    /// Un-excludes a directory and re-indexes whatever is still on disk
    /// under it (the documents were dropped, not merely hidden, while
    /// excluded — see §3's exclusion-coverage invariant).
    pub fn remove_excluded_folder(&self, path: &Path) -> EngineResult<()> {
        self.exclusions.write().remove(path);
        self.shared().persistence.remove_exclusion(path).map_err(EngineError::Other)?;

        let roots = self.roots.read().clone();
        for root in roots.iter().filter(|r| path.starts_with(&r.path) || r.path.starts_with(path)) {
            let exclusions = self.exclusions.read().clone();
            self.coordinator.scan_root(&root.path, &exclusions).map_err(EngineError::Other)?;
        }
        Ok(())
    }

    // ---- Search history --------------------------------------------------

    pub fn get_search_history(&self, limit: Option<usize>) -> EngineResult<Vec<SearchHistoryEntry>> {
        self.shared().persistence.load_search_history(limit).map_err(EngineError::Other)
    }

    pub fn clear_search_history(&self) -> EngineResult<()> {
        self.shared().persistence.clear_search_history().map_err(EngineError::Other)
    }

    pub fn remove_from_search_history(&self, query_str: &str) -> EngineResult<()> {
        self.shared().persistence.remove_search_history_entry(query_str).map_err(EngineError::Other)
    }

    // ---- Background queue -----------------------------------------------

    pub fn get_pdf_queue_status(&self) -> PdfQueueStatus {
        self.coordinator.pdf_queue_status()
    }

    // ---- Index lifecycle -------------------------------------------------

    /// Commits the current index batch; the rest of the on-disk state
    /// (store.db) is kept transactionally up to date on every mutation, so
    /// there is no separate bulk "save" step for it.
    pub fn save_index(&self) -> EngineResult<()> {
        self.shared().index.commit().map_err(EngineError::Other)
    }

    /// Re-runs startup self-repair against the currently-open index/store;
    /// returns the resulting document count.
    pub fn load_index(&self) -> EngineResult<u64> {
        self_repair(self.shared())?;
        Ok(self.shared().store.len() as u64)
    }

    pub fn clear_index(&self) -> EngineResult<()> {
        self.coordinator.clear_all().map_err(EngineError::Other)
    }

    // ---- Watching ----------------------------------------------------

    pub async fn start_watching(&self) -> EngineResult<()> {
        let mut guard = self.watcher.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        let roots: Vec<PathBuf> = self.roots.read().iter().map(|r| r.path.clone()).collect();
        let (watcher, mut rx) = ChangeWatcher::start(roots, self.config.watch_debounce)
            .map_err(|e| EngineError::Other(anyhow::anyhow!(e)))?;

        let coordinator = self.coordinator.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    WatchEvent::Created(path) => coordinator.reindex_one(&path, FileChangeType::Added),
                    WatchEvent::Modified(path) => coordinator.reindex_one(&path, FileChangeType::Modified),
                    WatchEvent::Removed(path) => coordinator.remove_path(&path),
                }
            }
        });

        *guard = Some(WatcherHandle { watcher, pump });
        Ok(())
    }

    pub async fn stop_watching(&self) -> EngineResult<()> {
        let mut guard = self.watcher.lock().await;
        if let Some(handle) = guard.take() {
            handle.pump.abort();
            drop(handle.watcher);
        }
        Ok(())
    }

    // ---- OS delegation -------------------------------------------------

    pub fn open_file(&self, path: &Path) -> EngineResult<()> {
        if !path.exists() {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }
        os_open(path).map_err(|e| EngineError::Io { path: path.to_path_buf(), source: e })
    }

    pub fn show_in_folder(&self, path: &Path) -> EngineResult<()> {
        let target = path.parent().unwrap_or(path);
        if !target.exists() {
            return Err(EngineError::NotFound(target.to_path_buf()));
        }
        os_open(target).map_err(|e| EngineError::Io { path: target.to_path_buf(), source: e })
    }

    pub fn delete_file(&self, path: &Path) -> EngineResult<()> {
        if !path.exists() {
            return Err(EngineError::NotFound(path.to_path_buf()));
        }
        std::fs::remove_file(path).map_err(|e| EngineError::Io { path: path.to_path_buf(), source: e })?;
        self.coordinator.remove_path(path);
        Ok(())
    }
}

/// Delegates to the host OS's default opener for a file or directory.
/// `open_file`/`show_in_folder` are thin wrappers around this; the engine
/// does not attempt to know how to render any particular format itself.
fn os_open(path: &Path) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    let (program, args): (&str, Vec<&std::ffi::OsStr>) = ("open", vec![path.as_os_str()]);
    #[cfg(target_os = "windows")]
    let (program, args): (&str, Vec<&std::ffi::OsStr>) = ("explorer", vec![path.as_os_str()]);
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let (program, args): (&str, Vec<&std::ffi::OsStr>) = ("xdg-open", vec![path.as_os_str()]);

    std::process::Command::new(program).args(args).status().map(|_| ())
}

fn is_effectively_excluded(path: &Path, exclusions: &HashSet<PathBuf>) -> bool {
    exclusions.iter().any(|excluded| path.starts_with(excluded))
}

fn build_folder_node(path: &Path, exclusions: &HashSet<PathBuf>) -> FolderNode {
    let is_excluded = is_effectively_excluded(path, exclusions);
    let mut children = Vec::new();
    let mut file_count = 0u64;

    if let Ok(entries) = std::fs::read_dir(path) {
        let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        dirs.sort();
        for entry in dirs {
            if entry.is_dir() {
                children.push(build_folder_node(&entry, exclusions));
            } else {
                file_count += 1;
            }
        }
    }

    FolderNode {
        path: path.to_path_buf(),
        name: path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
        is_excluded,
        file_count,
        children,
    }
}

/// Verifies the §3 invariants against what's on disk and repairs minor
/// drift: a persisted row whose file no longer exists is dropped from both
/// the metadata table and the index; a row whose content cannot be
/// rehydrated from the index (e.g. index was wiped but store.db wasn't) is
/// re-extracted from the file, or dropped if the file is also gone.
fn self_repair(shared: &Shared) -> EngineResult<()> {
    let rows = shared.persistence.load_document_rows().map_err(EngineError::Other)?;
    for row in rows {
        if !row.path.exists() {
            log::warn!("self-repair: dropping orphan row for missing file {}", row.path.display());
            let _ = shared.persistence.remove_document(&row.path);
            let _ = shared.index.delete(&crate::model::stable_id(&row.path));
            continue;
        }

        match shared.index.get_content(&crate::model::stable_id(&row.path)).map_err(EngineError::Other)? {
            Some(content) => {
                let document = Document {
                    id: crate::model::stable_id(&row.path),
                    path: row.path.clone(),
                    name: row.name,
                    size: row.size,
                    modified: row.modified,
                    doc_type: row.doc_type,
                    content,
                    structured: None,
                    has_warning: row.has_warning,
                    extracted_at: row.extracted_at,
                };
                shared.store.put(document);
            }
            None => {
                log::warn!("self-repair: re-extracting {} (missing from index)", row.path.display());
                match shared.extractors.extract(&row.path, row.doc_type) {
                    ExtractionOutcome::Extracted { content, structured, has_warning } => {
                        let document = Document {
                            id: crate::model::stable_id(&row.path),
                            path: row.path.clone(),
                            name: row.name,
                            size: row.size,
                            modified: row.modified,
                            doc_type: row.doc_type,
                            content,
                            structured,
                            has_warning,
                            extracted_at: row.extracted_at,
                        };
                        let saved = shared.store.put(document);
                        let _ = shared.index.upsert(&saved);
                    }
                    ExtractionOutcome::Skipped { .. } => {
                        let _ = shared.persistence.remove_document(&row.path);
                    }
                }
            }
        }
    }
    let _ = shared.index.commit();
    Ok(())
}

