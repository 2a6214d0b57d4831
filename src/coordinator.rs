use crate::config::EngineConfig;
use crate::events::{EngineEvent, FileChangeType, IndexPhase};
use crate::extractors::{ExtractionOutcome, ExtractorRegistry};
use crate::index_store::FullTextIndex;
use crate::model::{stable_id, Document, DocumentType, SkippedFile};
use crate::persistence::PersistenceLayer;
use crate::store::DocumentStore;
use crate::walker::Walker;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Semaphore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Scanning,
    Indexing,
    Finalizing,
    Watching,
    ClearingIndex,
}

/// Shared handles every coordinator operation (foreground scan or background
/// PDF drain) needs. Cheap to clone; every field is itself an `Arc`.
#[derive(Clone)]
pub struct Shared {
    pub store: Arc<DocumentStore>,
    pub index: Arc<FullTextIndex>,
    pub extractors: Arc<ExtractorRegistry>,
    pub persistence: Arc<PersistenceLayer>,
    pub events: broadcast::Sender<EngineEvent>,
    pub config: EngineConfig,
}

impl Shared {
    fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

/// Orchestrates discovery -> extraction -> index-write in phases and runs
/// PDF extraction on a bounded background queue. Foreground scans and
/// incremental updates share the one state field below; the background
/// queue tracks its own progress separately since it runs concurrently with
/// whatever the foreground state machine is doing.
pub struct Coordinator {
    shared: Shared,
    state: parking_lot::Mutex<EngineState>,
    pdf_queue: PdfQueue,
}

impl Coordinator {
    pub fn new(shared: Shared) -> Self {
        let pdf_queue = PdfQueue::spawn(shared.clone());
        Self { shared, state: parking_lot::Mutex::new(EngineState::Idle), pdf_queue }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    fn set_state(&self, state: EngineState) {
        *self.state.lock() = state;
    }

    /// Runs a full scan of `root`: Discovering, Indexing (non-PDF files),
    /// Finalizing, then hands PDFs to the background queue. Idempotent:
    /// re-running over an unchanged tree upserts identical documents.
    pub fn scan_root(&self, root: &Path, exclusions: &HashSet<PathBuf>) -> anyhow::Result<Vec<Document>> {
        self.set_state(EngineState::Scanning);
        let candidates = Walker::new(exclusions).walk(root);
        let total = candidates.len() as u64;
        self.shared.emit(EngineEvent::IndexingProgress {
            phase: IndexPhase::Discovering,
            current: 0,
            total,
            filename: None,
        });

        self.set_state(EngineState::Indexing);
        let mut indexed = Vec::new();
        let mut pdfs = Vec::new();

        for (i, path) in candidates.into_iter().enumerate() {
            let Some(doc_type) = DocumentType::from_extension(
                path.extension().and_then(|e| e.to_str()).unwrap_or(""),
            ) else {
                continue;
            };

            if doc_type == DocumentType::Pdf {
                pdfs.push(path);
                continue;
            }

            let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
            self.shared.emit(EngineEvent::IndexingProgress {
                phase: IndexPhase::Indexing,
                current: i as u64 + 1,
                total,
                filename,
            });

            if let Some(doc) = self.extract_and_upsert(&path, doc_type) {
                indexed.push(doc);
            }
        }

        self.set_state(EngineState::Finalizing);
        self.shared.emit(EngineEvent::IndexingProgress {
            phase: IndexPhase::Finalizing,
            current: total,
            total,
            filename: None,
        });
        self.shared.index.commit()?;

        self.shared.emit(EngineEvent::IndexingProgress {
            phase: IndexPhase::BackgroundPdfDrain,
            current: 0,
            total: pdfs.len() as u64,
            filename: None,
        });
        self.pdf_queue.seed(pdfs);

        self.set_state(EngineState::Idle);
        Ok(indexed)
    }

    /// Extracts one non-PDF file and upserts it into the Store + Index, or
    /// records it as a skipped file. Returns the document on success.
    fn extract_and_upsert(&self, path: &Path, doc_type: DocumentType) -> Option<Document> {
        match self.shared.extractors.extract(path, doc_type) {
            ExtractionOutcome::Extracted { content, structured, has_warning } => {
                let document = build_document(path, doc_type, content, structured, has_warning)?;
                self.upsert(&document);
                Some(document)
            }
            ExtractionOutcome::Skipped { reason } => {
                log::debug!("skipped {}: {reason}", path.display());
                None
            }
        }
    }

    /// Upsert into the Store, the Index's uncommitted batch, and the
    /// persistence layer's metadata table.
    fn upsert(&self, document: &Document) {
        let saved = self.shared.store.put(document.clone());
        if let Err(e) = self.shared.index.upsert(&saved) {
            log::warn!("index write failed for {}: {e}", saved.path.display());
        }
        if let Err(e) = self.shared.persistence.put_document(&saved) {
            log::warn!("metadata persist failed for {}: {e}", saved.path.display());
        }
    }

    /// Removes a file from the Store, Index and persistence layer.
    pub fn remove_path(&self, path: &Path) {
        if let Some(document) = self.shared.store.remove_by_path(path) {
            if let Err(e) = self.shared.index.delete(&document.id) {
                log::warn!("index delete failed for {}: {e}", path.display());
            }
            let _ = self.shared.index.commit();
        }
        if let Err(e) = self.shared.persistence.remove_document(path) {
            log::warn!("metadata delete failed for {}: {e}", path.display());
        }
        self.shared.emit(EngineEvent::FileChanged { change: FileChangeType::Removed, path: path.to_path_buf() });
    }

    /// Removes every document at or under `prefix` (root removal, or a
    /// folder newly covered by the exclusion set).
    pub fn remove_under_prefix(&self, prefix: &Path) -> Vec<Document> {
        let removed = self.shared.store.remove_under_prefix(prefix);
        for document in &removed {
            if let Err(e) = self.shared.index.delete(&document.id) {
                log::warn!("index delete failed for {}: {e}", document.path.display());
            }
        }
        let _ = self.shared.index.commit();
        if let Err(e) = self.shared.persistence.remove_documents_under(prefix) {
            log::warn!("metadata prefix delete failed for {}: {e}", prefix.display());
        }
        removed
    }

    /// Indexes or re-indexes exactly one file, as driven by a filesystem
    /// `created`/`modified` event.
    pub fn reindex_one(&self, path: &Path, change: FileChangeType) {
        let Some(doc_type) =
            DocumentType::from_extension(path.extension().and_then(|e| e.to_str()).unwrap_or(""))
        else {
            return;
        };
        self.set_state(EngineState::Indexing);
        if doc_type == DocumentType::Pdf {
            self.pdf_queue.push_one(path.to_path_buf());
        } else if let Some(document) = self.extract_and_upsert(path, doc_type) {
            let _ = self.shared.index.commit();
            self.shared.emit(EngineEvent::FileChanged { change, path: document.path });
        }
        self.set_state(EngineState::Watching);
    }

    pub fn pdf_queue_status(&self) -> PdfQueueStatus {
        self.pdf_queue.status()
    }

    pub fn clear_all(&self) -> anyhow::Result<()> {
        self.set_state(EngineState::ClearingIndex);
        self.pdf_queue.seed(Vec::new());
        self.shared.store.clear();
        self.shared.persistence.clear_documents()?;
        self.set_state(EngineState::Idle);
        Ok(())
    }

    pub fn shared(&self) -> &Shared {
        &self.shared
    }
}

fn build_document(
    path: &Path,
    doc_type: DocumentType,
    content: String,
    structured: Option<crate::model::StructuredContent>,
    has_warning: bool,
) -> Option<Document> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok().map(chrono::DateTime::<Utc>::from).unwrap_or_else(Utc::now);
    Some(Document {
        id: stable_id(path),
        path: path.to_path_buf(),
        name: path.file_name()?.to_string_lossy().into_owned(),
        size: metadata.len(),
        modified,
        doc_type,
        content,
        structured,
        has_warning,
        extracted_at: Utc::now(),
    })
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PdfQueueStatus {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub total: u64,
    pub is_running: bool,
    pub progress_percent: f32,
    pub is_complete: bool,
}

#[derive(Default)]
struct PdfQueueStats {
    pending: u64,
    processing: u64,
    completed: u64,
    total: u64,
    skipped: u64,
    skipped_files: Vec<SkippedFile>,
}

/// The background PDF queue: a single long-lived consumer task with bounded
/// concurrency `N`, fed by an unbounded multi-producer channel. Every queued
/// item carries the generation it was seeded under; re-seeding bumps a
/// shared generation counter so stale items are dropped as the consumer
/// reaches them, without interrupting whatever extraction is already in
/// flight.
struct PdfQueue {
    tx: tokio::sync::mpsc::UnboundedSender<(PathBuf, u64)>,
    generation: Arc<AtomicU64>,
    stats: Arc<parking_lot::Mutex<PdfQueueStats>>,
}

impl PdfQueue {
    fn spawn(shared: Shared) -> Self {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<(PathBuf, u64)>();
        let generation = Arc::new(AtomicU64::new(0));
        let stats = Arc::new(parking_lot::Mutex::new(PdfQueueStats::default()));
        let semaphore = Arc::new(Semaphore::new(shared.config.pdf_queue_concurrency.max(1)));

        let consumer_generation = generation.clone();
        let consumer_stats = stats.clone();
        tokio::spawn(async move {
            while let Some((path, item_gen)) = rx.recv().await {
                if item_gen != consumer_generation.load(Ordering::SeqCst) {
                    let mut s = consumer_stats.lock();
                    s.pending = s.pending.saturating_sub(1);
                    maybe_emit_complete(&shared, &s, item_gen, &consumer_generation);
                    continue;
                }

                let Ok(permit) = semaphore.clone().acquire_owned().await else { continue };
                {
                    let mut s = consumer_stats.lock();
                    s.pending = s.pending.saturating_sub(1);
                    s.processing += 1;
                }

                let shared = shared.clone();
                let stats = consumer_stats.clone();
                let generation = consumer_generation.clone();
                let current_name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                tokio::spawn(async move {
                    let _permit = permit;
                    let path_for_extract = path.clone();
                    let extractors = shared.extractors.clone();
                    let outcome = tokio::task::spawn_blocking(move || {
                        extractors.extract(&path_for_extract, DocumentType::Pdf)
                    })
                    .await;

                    match outcome {
                        Ok(ExtractionOutcome::Extracted { content, structured, has_warning }) => {
                            if let Some(document) = build_document(&path, DocumentType::Pdf, content, structured, has_warning) {
                                let saved = shared.store.put(document);
                                let _ = shared.index.upsert(&saved);
                                let _ = shared.index.commit();
                                let _ = shared.persistence.put_document(&saved);
                                shared.emit(EngineEvent::PdfIndexed { path: path.clone() });
                            }
                        }
                        Ok(ExtractionOutcome::Skipped { reason }) => {
                            record_skip(&shared, &stats, &path, reason);
                        }
                        Err(_) => {
                            record_skip(&shared, &stats, &path, "extraction task panicked".to_string());
                        }
                    }

                    let mut s = stats.lock();
                    s.processing = s.processing.saturating_sub(1);
                    s.completed += 1;
                    if item_gen == generation.load(Ordering::SeqCst) {
                        shared.emit(EngineEvent::PdfProgress {
                            completed: s.completed,
                            total: s.total,
                            current: current_name,
                        });
                    }
                    maybe_emit_complete(&shared, &s, item_gen, &generation);
                });
            }
        });

        Self { tx, generation, stats }
    }

    /// Replaces the current snapshot: bumps the generation (so any item
    /// still pending from the old snapshot is dropped when the consumer
    /// reaches it) and pushes `paths` under the new generation.
    fn seed(&self, paths: Vec<PathBuf>) {
        let gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut s = self.stats.lock();
            *s = PdfQueueStats { total: paths.len() as u64, pending: paths.len() as u64, ..Default::default() };
        }
        for path in paths {
            let _ = self.tx.send((path, gen));
        }
    }

    fn push_one(&self, path: PathBuf) {
        let gen = self.generation.load(Ordering::SeqCst);
        {
            let mut s = self.stats.lock();
            s.pending += 1;
            s.total += 1;
        }
        let _ = self.tx.send((path, gen));
    }

    fn status(&self) -> PdfQueueStatus {
        let s = self.stats.lock();
        let is_complete = s.total > 0 && s.pending == 0 && s.processing == 0;
        let progress_percent = if s.total == 0 { 100.0 } else { (s.completed as f32 / s.total as f32) * 100.0 };
        PdfQueueStatus {
            pending: s.pending,
            processing: s.processing,
            completed: s.completed,
            total: s.total,
            is_running: s.processing > 0 || s.pending > 0,
            progress_percent,
            is_complete,
        }
    }
}

fn record_skip(shared: &Shared, stats: &parking_lot::Mutex<PdfQueueStats>, path: &Path, reason: String) {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    {
        let mut s = stats.lock();
        s.skipped += 1;
        s.skipped_files.push(SkippedFile { path: path.to_path_buf(), name: name.clone(), reason: reason.clone() });
    }
    shared.emit(EngineEvent::PdfSkipped { name, path: path.to_path_buf(), reason });
}

fn maybe_emit_complete(shared: &Shared, stats: &PdfQueueStats, item_gen: u64, generation: &AtomicU64) {
    if item_gen == generation.load(Ordering::SeqCst) && stats.pending == 0 && stats.processing == 0 {
        shared.emit(EngineEvent::PdfComplete {
            total: stats.total,
            indexed: stats.completed.saturating_sub(stats.skipped),
            skipped: stats.skipped,
            skipped_files: stats.skipped_files.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_store::FullTextIndex;
    use std::fs;
    use tempfile::tempdir;

    fn make_shared(dir: &Path) -> Shared {
        let (tx, _rx) = broadcast::channel(64);
        Shared {
            store: Arc::new(DocumentStore::new()),
            index: Arc::new(FullTextIndex::open_or_create(&dir.join("index")).unwrap()),
            extractors: Arc::new(ExtractorRegistry::default()),
            persistence: Arc::new(PersistenceLayer::open(&dir.join("store.db")).unwrap()),
            events: tx,
            config: EngineConfig::default(),
        }
    }

    #[tokio::test]
    async fn scan_root_indexes_plaintext_and_defers_pdfs() {
        let work = tempdir().unwrap();
        let state_dir = tempdir().unwrap();
        fs::write(work.path().join("a.txt"), "hello world").unwrap();
        fs::write(work.path().join("notes.pdf"), b"%PDF-1.4 not a real pdf").unwrap();

        let shared = make_shared(state_dir.path());
        let coordinator = Coordinator::new(shared);
        let exclusions = HashSet::new();
        let indexed = coordinator.scan_root(work.path(), &exclusions).unwrap();

        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[0].name, "a.txt");
        assert_eq!(coordinator.shared().store.len(), 1);
    }

    #[tokio::test]
    async fn remove_path_clears_store_and_persistence() {
        let work = tempdir().unwrap();
        let state_dir = tempdir().unwrap();
        fs::write(work.path().join("a.txt"), "hello world").unwrap();

        let shared = make_shared(state_dir.path());
        let coordinator = Coordinator::new(shared);
        coordinator.scan_root(work.path(), &HashSet::new()).unwrap();
        assert_eq!(coordinator.shared().store.len(), 1);

        coordinator.remove_path(&work.path().join("a.txt"));
        assert_eq!(coordinator.shared().store.len(), 0);
    }
}
