use crate::model::SkippedFile;
use std::path::PathBuf;

/// Fire-and-forget events the engine emits toward whatever is consuming the
/// command surface. The inter-process bridge that ferries these across a UI
/// boundary is out of scope here; this is the plain Rust shape it would wrap.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    FileChanged { change: FileChangeType, path: PathBuf },
    IndexingProgress { phase: IndexPhase, current: u64, total: u64, filename: Option<String> },
    PdfProgress { completed: u64, total: u64, current: Option<String> },
    PdfIndexed { path: PathBuf },
    PdfSkipped { name: String, path: PathBuf, reason: String },
    PdfComplete { total: u64, indexed: u64, skipped: u64, skipped_files: Vec<SkippedFile> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeType {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPhase {
    Discovering,
    Indexing,
    Finalizing,
    BackgroundPdfDrain,
}
