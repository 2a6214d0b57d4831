use super::{ExtractionOutcome, Extractor};
use crate::model::{Section, SectionTag, TextRun};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

/// `.pptx`: one `SlideBreak` section per slide, each followed by its
/// paragraph text. Slides are visited by direct name lookup
/// (`ppt/slides/slideN.xml`) in ascending order; the first missing number
/// ends the scan, matching how PowerPoint itself numbers slide parts.
pub struct PptxExtractor;

impl Extractor for PptxExtractor {
    fn extract(&self, path: &Path) -> ExtractionOutcome {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => return ExtractionOutcome::Skipped { reason: format!("open failed: {e}") },
        };

        let mut archive = match ZipArchive::new(file) {
            Ok(a) => a,
            Err(e) => return ExtractionOutcome::Skipped { reason: format!("not a valid archive: {e}") },
        };

        let mut root = Section::new(SectionTag::Paragraph);
        let mut content = String::new();
        let mut slide_number = 1u32;
        let mut any_slide = false;

        loop {
            let name = format!("ppt/slides/slide{slide_number}.xml");
            let xml = match archive.by_name(&name) {
                Ok(mut entry) => {
                    let mut buf = String::new();
                    if entry.read_to_string(&mut buf).is_err() {
                        break;
                    }
                    buf
                }
                Err(_) => break,
            };
            any_slide = true;

            root.children.push(Section::new(SectionTag::SlideBreak { slide_number }));
            content.push_str(&format!("--- slide {slide_number} ---\n"));

            for para_text in slide_paragraphs(&xml) {
                if !para_text.trim().is_empty() {
                    content.push_str(&para_text);
                    content.push('\n');
                    let mut para = Section::new(SectionTag::Paragraph);
                    para.runs = vec![TextRun::plain(para_text)];
                    root.children.push(para);
                }
            }

            slide_number += 1;
        }

        if any_slide {
            ExtractionOutcome::Extracted { content, structured: Some(root), has_warning: false }
        } else {
            fallback_scan(&mut archive)
        }
    }
}

/// Splits one slide's XML into paragraph text, honoring `<a:p>` boundaries.
fn slide_paragraphs(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    paragraphs
}

/// Fallback for a malformed slide layout: scan every `ppt/slides/*.xml`
/// entry for `<a:t>` runs and join with newlines.
fn fallback_scan(archive: &mut ZipArchive<File>) -> ExtractionOutcome {
    let mut joined = String::new();
    for i in 0..archive.len() {
        let Ok(mut entry) = archive.by_index(i) else { continue };
        if !entry.name().starts_with("ppt/slides/slide") || !entry.name().ends_with(".xml") {
            continue;
        }
        let mut xml = String::new();
        if entry.read_to_string(&mut xml).is_err() {
            continue;
        }
        drop(entry);
        for para in slide_paragraphs(&xml) {
            if !para.trim().is_empty() {
                joined.push_str(&para);
                joined.push('\n');
            }
        }
    }

    if joined.trim().is_empty() {
        ExtractionOutcome::Skipped { reason: "no reachable slide text in archive".to_string() }
    } else {
        ExtractionOutcome::Extracted { content: joined, structured: None, has_warning: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_paragraphs_on_boundary() {
        let xml = r#"<p:sld><p:txBody><a:p><a:r><a:t>hello</a:t></a:r></a:p><a:p><a:r><a:t>world</a:t></a:r></a:p></p:txBody></p:sld>"#;
        let paras = slide_paragraphs(xml);
        assert_eq!(paras, vec!["hello".to_string(), "world".to_string()]);
    }
}
