//! Text extraction from uploaded documents
//!
//! Supported inputs are PDF and plain text. The real format is sniffed
//! from the bytes; the caller-declared MIME type is only used to warn
//! when the two disagree.

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Result of extracting text from a document
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Cleaned extracted text
    pub text: String,
    /// Page count, when the format has pages
    pub page_count: Option<usize>,
    /// Non-fatal issues encountered during extraction
    pub warnings: Vec<String>,
}

/// Sniffed document format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Pdf,
    PlainText,
}

fn sniff_format(bytes: &[u8]) -> Result<Format> {
    if bytes.starts_with(b"%PDF-") {
        return Ok(Format::Pdf);
    }
    if std::str::from_utf8(bytes).is_ok() {
        return Ok(Format::PlainText);
    }
    Err(Error::UnsupportedFormat(
        "not a PDF and not valid UTF-8 text".to_string(),
    ))
}

fn format_mime(format: Format) -> &'static str {
    match format {
        Format::Pdf => "application/pdf",
        Format::PlainText => "text/plain",
    }
}

/// Extract text from document bytes.
///
/// Runs PDF parsing on a blocking thread with a timeout; a parser
/// panic or timeout is reported as a corrupt document.
pub async fn extract_text(
    bytes: &[u8],
    declared_mime: Option<&str>,
    timeout: Duration,
) -> Result<Extraction> {
    if bytes.is_empty() {
        return Err(Error::CorruptDocument("empty file".to_string()));
    }

    let format = sniff_format(bytes)?;
    let mut warnings = Vec::new();

    if let Some(declared) = declared_mime {
        let actual = format_mime(format);
        if !declared.eq_ignore_ascii_case(actual) {
            warnings.push(format!(
                "declared MIME type {} does not match detected {}",
                declared, actual
            ));
        }
    }

    let (raw_text, page_count) = match format {
        Format::PlainText => {
            // sniff_format verified UTF-8 already
            (String::from_utf8_lossy(bytes).into_owned(), None)
        }
        Format::Pdf => extract_pdf(bytes.to_vec(), timeout).await?,
    };

    let text = clean_text(&raw_text);
    if text.is_empty() {
        return Err(Error::EmptyExtraction);
    }

    debug!(
        chars = text.len(),
        pages = ?page_count,
        warnings = warnings.len(),
        "Extracted document text"
    );

    Ok(Extraction {
        text,
        page_count,
        warnings,
    })
}

async fn extract_pdf(bytes: Vec<u8>, timeout: Duration) -> Result<(String, Option<usize>)> {
    let parse = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| Error::CorruptDocument(format!("PDF parse failed: {}", e)))
    });

    let text = match tokio::time::timeout(timeout, parse).await {
        Err(_) => {
            warn!("PDF extraction timed out after {:?}", timeout);
            return Err(Error::CorruptDocument(format!(
                "PDF extraction timed out after {}s",
                timeout.as_secs()
            )));
        }
        Ok(Err(join_err)) => {
            // the parser panicked on malformed input
            return Err(Error::CorruptDocument(format!(
                "PDF parser crashed: {}",
                join_err
            )));
        }
        Ok(Ok(result)) => result?,
    };

    // pdf-extract emits a form feed per page boundary
    let page_count = text.matches('\u{c}').count() + 1;
    Ok((text, Some(page_count)))
}

/// Normalize extracted text: collapse horizontal whitespace within
/// lines and cap runs of blank lines at one, keeping paragraph breaks
/// for the chunker.
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;

    for line in raw.replace('\u{c}', "\n").lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            if blank_run > 0 {
                out.push_str("\n\n");
            } else {
                out.push('\n');
            }
        }
        out.push_str(&collapsed);
        blank_run = 0;
    }

    out
}
