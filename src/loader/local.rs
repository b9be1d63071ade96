use std::fs;
use std::path::Path;

use pulldown_cmark::{Event, Parser, TagEnd};

use super::{FormatKind, Segment};
use crate::error::{DocQaError, Result};

/// Parse a local document file into text segments
pub fn load_local(kind: FormatKind, path: &Path) -> Result<Vec<Segment>> {
    match kind {
        FormatKind::Text => {
            let content = fs::read_to_string(path).map_err(|e| DocQaError::parse(path, e))?;
            Ok(vec![Segment::new(content, path)])
        }
        FormatKind::Markdown => {
            let raw = fs::read_to_string(path).map_err(|e| DocQaError::parse(path, e))?;
            Ok(vec![Segment::new(markdown_to_text(&raw), path)])
        }
        FormatKind::Pdf => load_pdf(path),
        FormatKind::Docx => load_docx(path),
        FormatKind::Csv => load_csv(path),
        FormatKind::Xlsx => load_xlsx(path),
        FormatKind::Remote(ext) => Err(DocQaError::parse(
            path,
            format!(".{ext} has no local parser"),
        )),
    }
}

/// One segment per non-blank page; `page_number` stays 1-based in document order.
fn load_pdf(path: &Path) -> Result<Vec<Segment>> {
    let bytes = fs::read(path).map_err(|e| DocQaError::parse(path, e))?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
        .map_err(|e| DocQaError::parse(path, format!("PDF parse error: {}", e)))?;

    Ok(pages
        .iter()
        .enumerate()
        .map(|(i, page)| (i + 1, page.replace('\0', "")))
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(number, page)| Segment::new(page.trim(), path).with_meta("page_number", number))
        .collect())
}

fn load_docx(path: &Path) -> Result<Vec<Segment>> {
    let bytes = fs::read(path).map_err(|e| DocQaError::parse(path, e))?;
    let doc = docx_rs::read_docx(&bytes)
        .map_err(|e| DocQaError::parse(path, format!("DOCX parse error: {}", e)))?;

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        if let docx_rs::DocumentChild::Paragraph(p) = child {
            let mut line = String::new();
            for child in p.children {
                if let docx_rs::ParagraphChild::Run(run) = child {
                    for child in run.children {
                        if let docx_rs::RunChild::Text(t) = child {
                            line.push_str(&t.text);
                        }
                    }
                }
            }
            paragraphs.push(line);
        }
    }

    Ok(vec![Segment::new(paragraphs.join("\n"), path)])
}

/// One segment per data row, rendered as `header: value` lines.
fn load_csv(path: &Path) -> Result<Vec<Segment>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| DocQaError::parse(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| DocQaError::parse(path, e))?
        .clone();

    let mut segments = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| DocQaError::parse(path, e))?;
        let content = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| format!("{}: {}", h.trim(), v.trim()))
            .collect::<Vec<_>>()
            .join("\n");
        segments.push(Segment::new(content, path).with_meta("row", row));
    }
    Ok(segments)
}

/// One segment per non-empty sheet.
fn load_xlsx(path: &Path) -> Result<Vec<Segment>> {
    use calamine::Reader;

    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|e| DocQaError::parse(path, e))?;

    let mut segments = Vec::new();
    for sheet_name in workbook.sheet_names().to_vec() {
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| DocQaError::parse(path, e))?;

        let rows: Vec<String> = range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.to_string())
                    .collect::<Vec<_>>()
                    .join(" | ")
            })
            .filter(|line| !line.replace('|', "").trim().is_empty())
            .collect();

        if !rows.is_empty() {
            segments.push(Segment::new(rows.join("\n"), path).with_meta("sheet", &sheet_name));
        }
    }
    Ok(segments)
}

/// Strip markdown markup, keeping text with block boundaries as blank lines.
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock) => {
                out.push_str("\n\n")
            }
            Event::End(TagEnd::Item) => out.push('\n'),
            _ => {}
        }
    }
    out.trim().to_string()
}
