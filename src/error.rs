use std::path::PathBuf;
use thiserror::Error;

/// The closed error taxonomy surfaced to callers of the command surface.
///
/// Internal plumbing composes fallible steps with `anyhow`; at the command
/// boundary those errors are folded into one of these variants so a caller
/// can match on outcome instead of parsing a message.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("unsupported file extension: {0}")]
    Unsupported(PathBuf),

    #[error("extraction produced no usable content for {path}: {reason}")]
    ExtractSkipped { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },

    #[error("full-text index write failed after retry: {0}")]
    IndexWriteError(String),

    #[error("on-disk state was inconsistent and could not be self-repaired: {0}")]
    CorruptState(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Command-level response shape used by the §6 surface: never throws across
/// the boundary, always a `(success, error_message)` pair plus a payload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommandOutcome<T> {
    pub success: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> CommandOutcome<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, error: None, data: Some(data) }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self { success: false, error: Some(message.into()), data: None }
    }

    pub fn from_result(result: EngineResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(EngineError::Cancelled) => Self { success: true, error: None, data: None },
            Err(e) => Self::err(e.to_string()),
        }
    }
}
