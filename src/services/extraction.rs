// Document Text Extraction
// PDF and DOCX uploads -> normalized plain text for the analysis pipeline

use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild, TableRowChild};
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{info, warn};

use super::text_processor::normalize_text;
use crate::models::DocumentKind;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const MAX_FILE_BYTES: usize = 50 * 1024 * 1024;
const MIN_PDF_BYTES: usize = 100;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("empty or invalid file buffer")]
    Empty,
    #[error("PDF file appears to be too small or corrupted ({0} bytes)")]
    TooSmall(usize),
    #[error("file is too large ({0} bytes), maximum is 50MB")]
    TooLarge(usize),
    #[error("file does not appear to be a valid PDF (missing PDF header)")]
    MissingPdfHeader,
    #[error("file is corrupted or unreadable: {0}")]
    Corrupt(String),
    #[error("no text content found")]
    NoText,
}

impl ExtractionError {
    /// Wording shown to the person who uploaded the file.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedType(_) => "Invalid file type. Please upload a PDF or DOCX file.",
            Self::NoText => "No text could be extracted from the file.",
            Self::TooLarge(_) => "Failed to extract text from file. The file is too large; the maximum size is 50MB.",
            Self::MissingPdfHeader => "Failed to extract text from file. The file does not appear to be a valid PDF.",
            Self::Empty | Self::TooSmall(_) | Self::Corrupt(_) => {
                "Failed to extract text from file. The file may be corrupted or in an unsupported format."
            }
        }
    }
}

impl DocumentKind {
    /// Classify an upload by MIME type first, then by extension.
    pub fn from_file_name_and_mime(file_name: &str, mime: Option<&str>) -> Result<Self, ExtractionError> {
        let name = file_name.to_lowercase();
        let mime = mime.map(|m| m.trim().to_lowercase()).unwrap_or_default();

        if mime == PDF_MIME || name.ends_with(".pdf") {
            Ok(Self::Pdf)
        } else if mime == DOCX_MIME || name.ends_with(".docx") {
            Ok(Self::Docx)
        } else {
            Err(ExtractionError::UnsupportedType(file_name.to_string()))
        }
    }
}

/// Extract and normalize the text of an uploaded contract.
pub async fn extract_text(file_name: &str, mime: Option<&str>, bytes: Vec<u8>) -> Result<String, ExtractionError> {
    let kind = DocumentKind::from_file_name_and_mime(file_name, mime)?;
    let size = bytes.len();

    // Parsers are synchronous and may panic on hostile input.
    let raw = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => extract_pdf(&bytes),
        DocumentKind::Docx => extract_docx(&bytes),
    })
    .await
    .map_err(|e| ExtractionError::Corrupt(format!("extraction task failed: {}", e)))?;

    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            warn!("[EXTRACT] {} ({} bytes) failed: {}", file_name, size, e);
            return Err(e);
        }
    };

    let text = normalize_text(&raw);
    if text.is_empty() {
        warn!("[EXTRACT] {} produced no text", file_name);
        return Err(ExtractionError::NoText);
    }

    info!(
        "[EXTRACT] {} kind={:?} bytes={} chars={}",
        file_name,
        kind,
        size,
        text.chars().count()
    );
    Ok(text)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if !bytes.starts_with(b"%PDF") {
        return Err(ExtractionError::MissingPdfHeader);
    }
    if bytes.len() > MAX_FILE_BYTES {
        return Err(ExtractionError::TooLarge(bytes.len()));
    }
    if bytes.len() < MIN_PDF_BYTES {
        return Err(ExtractionError::TooSmall(bytes.len()));
    }

    let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes)))
        .map_err(|_| ExtractionError::Corrupt("PDF parser panicked".to_string()))?
        .map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::NoText);
    }
    Ok(text.to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    if bytes.is_empty() {
        return Err(ExtractionError::Empty);
    }
    if bytes.len() > MAX_FILE_BYTES {
        return Err(ExtractionError::TooLarge(bytes.len()));
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Corrupt(format!("not a DOCX container: {}", e)))?;
    if archive.by_name("word/document.xml").is_err() {
        return Err(ExtractionError::Corrupt("word/document.xml missing".to_string()));
    }

    let docx = catch_unwind(AssertUnwindSafe(|| docx_rs::read_docx(bytes)))
        .map_err(|_| ExtractionError::Corrupt("DOCX reader panicked".to_string()))?
        .map_err(|e| ExtractionError::Corrupt(e.to_string()))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => lines.push(paragraph_text(p)),
            DocumentChild::Table(t) => collect_table(t, &mut lines),
            _ => {}
        }
    }

    Ok(lines.join("\n"))
}

// Row and cell wrappers are single-variant enums today.
#[allow(irrefutable_let_patterns)]
fn collect_table(table: &Table, lines: &mut Vec<String>) {
    for row in &table.rows {
        let TableChild::TableRow(row) = row else { continue };
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell else { continue };
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(p) => lines.push(paragraph_text(p)),
                    TableCellContent::Table(t) => collect_table(t, lines),
                    _ => {}
                }
            }
        }
    }
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut out = String::new();
    push_children(&paragraph.children, &mut out);
    out
}

fn push_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    match rc {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children(&link.children, out),
            _ => {}
        }
    }
}
