use super::{ExtractionOutcome, Extractor};
use crate::model::{Section, SectionTag, TextRun, TextStyle};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// `.docx`: primary path walks `word/document.xml`'s paragraph/run structure
/// into a section tree with run-level formatting; on a malformed archive,
/// falls back to concatenating any `<w:t>` text reachable in the zip.
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn extract(&self, path: &Path) -> ExtractionOutcome {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => return ExtractionOutcome::Skipped { reason: format!("open failed: {e}") },
        };

        let mut archive = match ZipArchive::new(file) {
            Ok(a) => a,
            Err(e) => return ExtractionOutcome::Skipped { reason: format!("not a valid archive: {e}") },
        };

        match archive.by_name("word/document.xml") {
            Ok(mut entry) => {
                let mut xml = String::new();
                if entry.read_to_string(&mut xml).is_err() {
                    return fallback_scan(&mut archive);
                }
                drop(entry);
                match parse_document_xml(&xml) {
                    Some((content, section)) if !content.trim().is_empty() => {
                        ExtractionOutcome::Extracted { content, structured: Some(section), has_warning: false }
                    }
                    _ => fallback_scan(&mut archive),
                }
            }
            Err(_) => fallback_scan(&mut archive),
        }
    }
}

fn parse_document_xml(xml: &str) -> Option<(String, Section)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut root = Section::new(SectionTag::Paragraph);
    root.children.clear();

    let mut current_paragraph = Vec::new();
    let mut plain_text = String::new();
    let mut bold = false;
    let mut italic = false;
    let mut underline = false;
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current_paragraph.clear(),
                b"r" => {
                    bold = false;
                    italic = false;
                    underline = false;
                }
                b"b" => bold = true,
                b"i" => italic = true,
                b"u" => underline = true,
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"b" => bold = true,
                b"i" => italic = true,
                b"u" => underline = true,
                b"br" => current_paragraph.push(TextRun::plain("\n")),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    let text = text.into_owned();
                    if !text.is_empty() {
                        plain_text.push_str(&text);
                        current_paragraph.push(TextRun {
                            text,
                            style: TextStyle { bold, italic, underline, ..Default::default() },
                        });
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current_paragraph.is_empty() {
                        let mut para = Section::new(SectionTag::Paragraph);
                        para.runs = std::mem::take(&mut current_paragraph);
                        root.children.push(para);
                        plain_text.push('\n');
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }

    Some((plain_text, root))
}

/// Malformed-archive fallback: scan every xml-ish entry for `<w:t>` runs and
/// join them, ignoring formatting.
fn fallback_scan(archive: &mut ZipArchive<File>) -> ExtractionOutcome {
    let mut joined = String::new();
    for i in 0..archive.len() {
        let Ok(mut entry) = archive.by_index(i) else { continue };
        if !entry.name().ends_with(".xml") {
            continue;
        }
        let mut xml = String::new();
        if entry.read_to_string(&mut xml).is_err() {
            continue;
        }
        drop(entry);

        let mut reader = Reader::from_str(&xml);
        let mut buf = Vec::new();
        let mut in_text = false;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
                Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
                Ok(Event::Text(e)) if in_text => {
                    if let Ok(text) = e.unescape() {
                        joined.push_str(&text);
                        joined.push(' ');
                    }
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
            buf.clear();
        }
    }

    if joined.trim().is_empty() {
        ExtractionOutcome::Skipped { reason: "no reachable body text in archive".to_string() }
    } else {
        ExtractionOutcome::Extracted { content: joined, structured: None, has_warning: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_paragraph_xml() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>hello</w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t> world</w:t></w:r></w:p></w:body></w:document>"#;
        let (content, section) = parse_document_xml(xml).unwrap();
        assert_eq!(content.trim(), "hello world");
        assert_eq!(section.children.len(), 1);
        assert_eq!(section.children[0].runs.len(), 2);
    }
}
