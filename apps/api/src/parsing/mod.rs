//! Parsing: turns an uploaded document into the text every later stage works on.
//!
//! A closed set of extraction strategies (`strategies::Strategy`) is run by the
//! `cascade::ParsingCascade`, which scores every candidate with the heuristics in
//! `quality` and keeps the best one. Nothing here is persisted: each request gets a
//! private working directory that is removed before `parse` returns.

pub mod cascade;
pub mod extractors;
pub mod prompts;
pub mod quality;
pub mod strategies;
pub mod structuring;

use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub use cascade::ParsingCascade;
pub use strategies::Strategy;

/// Below this many characters an extraction carries nothing worth analysing.
pub const MIN_TEXT_LEN: usize = 50;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// An uploaded file. Lives only for the duration of one analysis request.
#[derive(Debug, Clone)]
pub struct Document {
    pub bytes: Bytes,
    pub declared_type: Option<String>,
    pub filename: String,
}

impl Document {
    pub fn new(bytes: impl Into<Bytes>, declared_type: Option<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_type,
            filename: filename.into(),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn media_type(&self) -> Result<MediaType, ParseError> {
        MediaType::resolve(self.declared_type.as_deref(), &self.filename)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Pdf,
    Docx,
    PlainText,
    Html,
    Png,
    Jpeg,
}

impl MediaType {
    /// Declared type wins unless it is missing or the generic octet-stream, in which
    /// case the filename extension decides.
    pub fn resolve(declared: Option<&str>, filename: &str) -> Result<Self, ParseError> {
        let declared = declared
            .map(|d| d.split(';').next().unwrap_or(d).trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty());

        match declared.as_deref() {
            Some("application/octet-stream") | None => {
                let ext = Path::new(filename)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase())
                    .unwrap_or_default();
                Self::from_extension(&ext).ok_or_else(|| {
                    ParseError::UnsupportedMediaType(if ext.is_empty() {
                        "application/octet-stream".to_string()
                    } else {
                        format!(".{ext}")
                    })
                })
            }
            Some(mime) => {
                Self::from_mime(mime).ok_or_else(|| ParseError::UnsupportedMediaType(mime.to_string()))
            }
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "application/pdf" | "application/x-pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" | "text/markdown" => Some(Self::PlainText),
            "text/html" | "application/xhtml+xml" => Some(Self::Html),
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" | "text" | "md" => Some(Self::PlainText),
            "html" | "htm" | "xhtml" => Some(Self::Html),
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    /// Extension used for the working copy handed to external tools.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "txt",
            Self::Html => "html",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

/// One strategy's output, scored. Never mutated after the cascade builds it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    pub text: String,
    pub method: Strategy,
    pub confidence_score: u8,
    pub quality_score: u8,
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Diagnostic record of a single strategy run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub method: Strategy,
    pub success: bool,
    pub text_length: usize,
    pub confidence_score: u8,
    pub quality_score: u8,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttemptSummary {
    pub fn from_result(result: &ExtractionResult, duration_ms: u64) -> Self {
        Self {
            method: result.method,
            success: result.success,
            text_length: result.text.chars().count(),
            confidence_score: result.confidence_score,
            quality_score: result.quality_score,
            duration_ms,
            error: result.error.clone(),
        }
    }
}

/// The winning extraction, promoted with request metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResume {
    pub text: String,
    pub method: Strategy,
    pub confidence_score: u8,
    pub quality_score: u8,
    pub page_count: Option<u32>,
    pub file_name: String,
    pub file_size: usize,
    pub parsed_at: DateTime<Utc>,
    pub used_secondary: bool,
    pub attempts: Vec<AttemptSummary>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors and modes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("no strategy extracted usable text ({} attempts)", attempts.len())]
    NoExtractableText { attempts: Vec<AttemptSummary> },

    #[error("parse workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

/// How aggressively the cascade runs its expensive strategies (OCR, AI structuring).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeMode {
    /// Every applicable strategy runs on every document.
    Exhaustive,
    /// Expensive strategies run only when no cheap result reached `quality_floor`.
    Tiered { quality_floor: u8 },
}

impl CascadeMode {
    pub fn parse(raw: &str, quality_floor: u8) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "exhaustive" => Some(Self::Exhaustive),
            "tiered" => Some(Self::Tiered {
                quality_floor: quality_floor.min(100),
            }),
            _ => None,
        }
    }
}
