// Type-specific extractors for the closed set of supported document formats.
// Each extractor turns a file's bytes into plain text and, where the format
// supports it, a structured section tree. Extractors must be total: any
// internal parse error degrades to partial text or a classified skip, never
// a propagated error.

use crate::model::{DocumentType, Section};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

mod docx;
mod pdf;
mod plaintext;
mod pptx;
mod xlsx;

/// Result of running one file through its format extractor.
pub enum ExtractionOutcome {
    Extracted {
        content: String,
        structured: Option<Section>,
        /// Set when extraction only partially succeeded (e.g. some pages of
        /// a PDF failed, or an archive was malformed and a fallback path ran).
        has_warning: bool,
    },
    /// No usable content was produced; never indexed.
    Skipped { reason: String },
}

pub trait Extractor: Send + Sync {
    fn extract(&self, path: &Path) -> ExtractionOutcome;
}

/// Dispatch table: `DocumentType` -> extractor. Adding a format is one new
/// variant on `DocumentType` plus one new match arm here.
pub struct ExtractorRegistry {
    plaintext: plaintext::PlainTextExtractor,
    docx: docx::DocxExtractor,
    pptx: pptx::PptxExtractor,
    xlsx: xlsx::XlsxExtractor,
    pdf: pdf::PdfExtractor,
}

impl ExtractorRegistry {
    pub fn new(pdf_image_only_threshold: usize) -> Self {
        Self {
            plaintext: plaintext::PlainTextExtractor,
            docx: docx::DocxExtractor,
            pptx: pptx::PptxExtractor,
            xlsx: xlsx::XlsxExtractor,
            pdf: pdf::PdfExtractor { image_only_threshold: pdf_image_only_threshold },
        }
    }

    /// Extract `path`, dispatching on `doc_type`. A panic inside a
    /// third-party parser is caught here and turned into a skip so a single
    /// malformed file can never take down the indexing worker.
    pub fn extract(&self, path: &Path, doc_type: DocumentType) -> ExtractionOutcome {
        let extractor: &dyn Extractor = match doc_type {
            DocumentType::Text => &self.plaintext,
            DocumentType::Word => &self.docx,
            DocumentType::Powerpoint => &self.pptx,
            DocumentType::Spreadsheet => &self.xlsx,
            DocumentType::Pdf => &self.pdf,
        };

        match catch_unwind(AssertUnwindSafe(|| extractor.extract(path))) {
            Ok(outcome) => outcome,
            Err(_) => ExtractionOutcome::Skipped {
                reason: "extractor panicked on malformed input".to_string(),
            },
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(20)
    }
}
