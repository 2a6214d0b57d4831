use super::{ExtractionOutcome, Extractor};
use std::fs;
use std::path::Path;

/// `.txt` / `.md`: read as UTF-8, replacing invalid byte sequences with the
/// Unicode replacement character. No structured tree.
pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extract(&self, path: &Path) -> ExtractionOutcome {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return ExtractionOutcome::Skipped { reason: format!("read failed: {e}") }
            }
        };

        let content = String::from_utf8_lossy(&bytes).into_owned();
        ExtractionOutcome::Extracted { content, structured: None, has_warning: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use std::io::Write;

    #[test]
    fn reads_utf8_text() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("hello world".as_bytes()).unwrap();
        file.flush().unwrap();

        match (PlainTextExtractor).extract(file.path()) {
            ExtractionOutcome::Extracted { content, structured, has_warning } => {
                assert_eq!(content, "hello world");
                assert!(structured.is_none());
                assert!(!has_warning);
            }
            ExtractionOutcome::Skipped { .. } => panic!("expected extraction to succeed"),
        }
    }

    #[test]
    fn replaces_invalid_utf8_bytes() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[b'h', b'i', 0xff, 0xfe]).unwrap();
        file.flush().unwrap();

        match (PlainTextExtractor).extract(file.path()) {
            ExtractionOutcome::Extracted { content, .. } => {
                assert!(content.starts_with("hi"));
                assert!(content.contains('\u{FFFD}'));
            }
            ExtractionOutcome::Skipped { .. } => panic!("expected extraction to succeed"),
        }
    }
}
