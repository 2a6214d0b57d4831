//! `docscout`: a local, offline desktop document-search engine.
//!
//! Watches user-chosen folders, extracts text from office documents, keeps a
//! persistent full-text index, and answers ranked keyword queries with
//! match snippets. Delivered as a plain library; the command surface on
//! [`Engine`] is meant to be wired onto whatever IPC transport a host
//! application uses.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod events;
pub mod extractors;
pub mod index_store;
pub mod model;
pub mod persistence;
pub mod query;
pub mod snippet;
pub mod store;
pub mod walker;
pub mod watcher;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{CommandOutcome, EngineError, EngineResult};
pub use events::{EngineEvent, FileChangeType, IndexPhase};
pub use model::{
    Document, DocumentType, FileSummary, FolderNode, FolderSummary, IndexStats, RootFolder,
    SearchFilters, SearchHistoryEntry, SearchHit, Section, SectionTag, Snippet, TextRun, TextStyle,
};
