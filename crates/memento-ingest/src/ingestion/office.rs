//! OOXML and plain-text extraction paths: DOCX, PPTX, XLSX, TXT.

use std::io::{Cursor, Read};

use calamine::Reader as _;
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Error, Result};

/// Extract DOCX text: paragraph runs first, then table cell text.
///
/// Cell contents are flattened into the text flow after the paragraphs,
/// parts joined with blank lines.
pub fn extract_docx_text(data: &[u8], filename: &str) -> Result<String> {
    let doc = docx_rs::read_docx(data)
        .map_err(|e| Error::corrupt_container(filename, e.to_string()))?;

    let mut parts: Vec<String> = Vec::new();
    for child in doc.document.children {
        match child {
            docx_rs::DocumentChild::Paragraph(paragraph) => {
                let text = paragraph_text(&paragraph);
                if !text.trim().is_empty() {
                    parts.push(text);
                }
            }
            docx_rs::DocumentChild::Table(table) => {
                for row in &table.rows {
                    let docx_rs::TableChild::TableRow(row) = row;
                    for cell in &row.cells {
                        let docx_rs::TableRowChild::TableCell(cell) = cell;
                        for content in &cell.children {
                            if let docx_rs::TableCellContent::Paragraph(paragraph) = content {
                                let text = paragraph_text(paragraph);
                                if !text.trim().is_empty() {
                                    parts.push(text);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    Ok(parts.join("\n\n"))
}

fn paragraph_text(paragraph: &docx_rs::Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let docx_rs::ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let docx_rs::RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

/// Extract PPTX text slide by slide.
///
/// Slides live at `ppt/slides/slideN.xml`; sorting is numeric, not
/// lexicographic, so slide10 follows slide9.
pub fn extract_pptx_text(data: &[u8], filename: &str) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::corrupt_container(filename, e.to_string()))?;

    let mut slide_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    slide_names.sort_by_key(|name| {
        name.trim_start_matches("ppt/slides/slide")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(0)
    });

    let mut slides = Vec::new();
    for (slide_number, name) in slide_names.iter().enumerate() {
        let mut xml = String::new();
        let Ok(mut entry) = archive.by_name(name) else {
            continue;
        };
        if entry.read_to_string(&mut xml).is_err() {
            tracing::warn!("[{}] slide {} unreadable, skipping", filename, name);
            continue;
        }
        let slide_text = slide_xml_text(&xml);
        if !slide_text.is_empty() {
            slides.push(format!("Slide {}:\n{}", slide_number + 1, slide_text));
        }
    }

    Ok(slides.join("\n\n"))
}

/// Pull `<a:t>` runs out of one slide's XML, with paragraph line breaks
fn slide_xml_text(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    if let Ok(text) = e.unescape() {
                        if !line.is_empty() {
                            line.push(' ');
                        }
                        line.push_str(text.trim());
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !line.trim().is_empty() {
                        lines.push(std::mem::take(&mut line));
                    } else {
                        line.clear();
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
    }
    if !line.trim().is_empty() {
        lines.push(line);
    }

    lines.join("\n")
}

/// Extract XLSX text: every sheet, rows joined with ` | `
pub fn extract_xlsx_text(data: &[u8], filename: &str) -> Result<String> {
    let cursor = Cursor::new(data.to_vec());
    let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
        .map_err(|e| Error::corrupt_container(filename, e.to_string()))?;

    let mut parts = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let Ok(range) = workbook.worksheet_range(&sheet_name) else {
            continue;
        };

        let mut sheet_lines = vec![format!("Sheet: {}", sheet_name)];
        for row in range.rows() {
            let row_text: Vec<String> = row
                .iter()
                .map(|cell| match cell {
                    calamine::Data::Empty => String::new(),
                    calamine::Data::String(s) => s.clone(),
                    calamine::Data::Float(f) => f.to_string(),
                    calamine::Data::Int(i) => i.to_string(),
                    calamine::Data::Bool(b) => b.to_string(),
                    calamine::Data::DateTime(dt) => dt.to_string(),
                    _ => String::new(),
                })
                .collect();
            if !row_text.iter().all(|s| s.is_empty()) {
                sheet_lines.push(row_text.join(" | "));
            }
        }
        parts.push(sheet_lines.join("\n"));
    }

    Ok(parts.join("\n\n"))
}

/// Decode plain text, stripping a UTF-8 BOM when present
pub fn extract_plain_text(data: &[u8]) -> String {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);
    String::from_utf8_lossy(data).to_string()
}
