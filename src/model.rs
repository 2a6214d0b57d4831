use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// A document currently known to the engine.
///
/// Created after successful extraction, mutated only by re-extraction on a
/// filesystem change, destroyed when the underlying file disappears, its
/// root is removed, or the exclusion set newly covers its path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Stable id derived from `path`; the join key with the full-text index.
    pub id: String,
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub doc_type: DocumentType,
    pub content: String,
    pub structured: Option<StructuredContent>,
    /// Set when extraction succeeded only partially.
    pub has_warning: bool,
    pub extracted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Word,
    Powerpoint,
    Pdf,
    Spreadsheet,
    Text,
}

impl DocumentType {
    /// Dispatch table: lowercased extension -> type. Returns `None` for
    /// anything outside the closed supported-extension set.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "docx" => Some(Self::Word),
            "pptx" => Some(Self::Powerpoint),
            "xlsx" => Some(Self::Spreadsheet),
            "pdf" => Some(Self::Pdf),
            "txt" | "md" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Powerpoint => "powerpoint",
            Self::Pdf => "pdf",
            Self::Spreadsheet => "spreadsheet",
            Self::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "word" => Some(Self::Word),
            "powerpoint" => Some(Self::Powerpoint),
            "pdf" => Some(Self::Pdf),
            "spreadsheet" => Some(Self::Spreadsheet),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// A tree of sections produced by format-specific extractors for rich preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub tag: SectionTag,
    pub runs: Vec<TextRun>,
    pub children: Vec<Section>,
}

impl Section {
    pub fn new(tag: SectionTag) -> Self {
        Self { tag, runs: Vec::new(), children: Vec::new() }
    }

    pub fn with_text(tag: SectionTag, text: impl Into<String>) -> Self {
        Self { tag, runs: vec![TextRun::plain(text)], children: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SectionTag {
    Heading { level: u8 },
    Paragraph,
    ListItem { ordered: bool, depth: u32 },
    Table,
    TableRow,
    TableCell,
    PageBreak,
    SlideBreak { slide_number: u32 },
    HorizontalRule,
    CodeBlock,
    Link { url: String },
    Image { data: String, width: u32, height: u32, alt: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
}

impl TextRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), style: TextStyle::default() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub color: Option<String>,
    pub highlight: Option<String>,
}

pub type StructuredContent = Section;

/// Recomputes the stable document id from an absolute path: lowercase hex
/// SHA-256 of the platform-native path string, truncated to 16 characters.
pub fn stable_id(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFolder {
    pub path: PathBuf,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderSummary {
    pub path: PathBuf,
    pub file_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderNode {
    pub path: PathBuf,
    pub name: String,
    pub is_excluded: bool,
    pub file_count: u64,
    pub children: Vec<FolderNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHistoryEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: u64,
}

/// A lightweight view of a `Document` for listing commands that don't need
/// the full extracted content (`get_all_files`, `scan_folder`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub path: PathBuf,
    pub name: String,
    pub doc_type: DocumentType,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub has_warning: bool,
}

impl From<&Document> for FileSummary {
    fn from(doc: &Document) -> Self {
        Self {
            path: doc.path.clone(),
            name: doc.name.clone(),
            doc_type: doc.doc_type,
            size: doc.size,
            modified: doc.modified,
            has_warning: doc.has_warning,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndexStats {
    pub total_documents: u64,
    pub total_size: u64,
    pub by_type: std::collections::HashMap<String, u64>,
    pub folder_count: u64,
    pub pending_background: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snippet {
    pub text: String,
    pub term: String,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: PathBuf,
    pub name: String,
    pub doc_type: DocumentType,
    pub score: f32,
    pub snippets: Vec<Snippet>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    pub types: Option<Vec<DocumentType>>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub folder_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic_and_short() {
        let a = stable_id(Path::new("/tmp/a.txt"));
        let b = stable_id(Path::new("/tmp/a.txt"));
        let c = stable_id(Path::new("/tmp/b.txt"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn document_type_dispatch_is_case_insensitive() {
        assert_eq!(DocumentType::from_extension("PDF"), Some(DocumentType::Pdf));
        assert_eq!(DocumentType::from_extension("Docx"), Some(DocumentType::Word));
        assert_eq!(DocumentType::from_extension("exe"), None);
    }
}
