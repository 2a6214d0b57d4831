use super::{ExtractionOutcome, Extractor};
use crate::model::{Section, SectionTag, TextRun};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::path::Path;

/// `.xlsx`: concatenates cell string values sheet by sheet; structured tree
/// is one `Table` section per sheet, with one `TableRow`/`TableCell` per cell.
pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn extract(&self, path: &Path) -> ExtractionOutcome {
        let mut workbook: Xlsx<_> = match open_workbook(path) {
            Ok(w) => w,
            Err(e) => return ExtractionOutcome::Skipped { reason: format!("failed to open workbook: {e}") },
        };

        let mut content = String::new();
        let mut tables = Vec::new();
        let sheet_names = workbook.sheet_names().to_vec();

        if sheet_names.is_empty() {
            return ExtractionOutcome::Skipped { reason: "workbook has no sheets".to_string() };
        }

        for sheet_name in &sheet_names {
            let Ok(range) = workbook.worksheet_range(sheet_name) else { continue };

            content.push_str(sheet_name);
            content.push('\n');

            let mut table = Section::new(SectionTag::Table);
            for row in range.rows() {
                let mut table_row = Section::new(SectionTag::TableRow);
                for cell in row {
                    let value = cell_to_string(cell);
                    if !value.is_empty() {
                        content.push_str(&value);
                        content.push(' ');
                    }
                    let mut table_cell = Section::new(SectionTag::TableCell);
                    table_cell.runs = vec![TextRun::plain(value)];
                    table_row.children.push(table_cell);
                }
                content.push('\n');
                table.children.push(table_row);
            }
            tables.push(table);
        }

        let mut root = Section::new(SectionTag::Paragraph);
        root.children = tables;

        if content.trim().is_empty() {
            ExtractionOutcome::Skipped { reason: "workbook contains no readable cell values".to_string() }
        } else {
            ExtractionOutcome::Extracted { content, structured: Some(root), has_warning: false }
        }
    }
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::String(s) => s.clone(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format!("{:?}", dt),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => String::new(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
