//! The closed set of extraction strategies and the per-media-type lists the cascade
//! walks. Adding a strategy means adding a variant; every `match` below then has to
//! say what it does.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::extractors::{self, ExtractError, RawText};
use super::structuring::{self, TextStructurer};
use super::{Document, MediaType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// `pdftotext -layout`.
    Layout,
    /// Non-AI reorganisation of the base text.
    StructuredNoAi,
    /// Native decoder for the media type.
    PlainText,
    Ocr,
    /// LLM reorganisation of the base text.
    AiStructured,
    /// `pdftotext -raw` (content-stream order).
    RawOrder,
    Pandoc,
    LossyText,
    TagStrip,
    PrintableScrape,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::StructuredNoAi => "structured-no-ai",
            Self::PlainText => "plain-text",
            Self::Ocr => "ocr",
            Self::AiStructured => "ai-structured",
            Self::RawOrder => "raw-order",
            Self::Pandoc => "pandoc",
            Self::LossyText => "lossy-text",
            Self::TagStrip => "tag-strip",
            Self::PrintableScrape => "printable-scrape",
        }
    }

    /// OCR and model calls cost orders of magnitude more than everything else.
    pub fn is_expensive(self) -> bool {
        matches!(self, Self::Ocr | Self::AiStructured)
    }

    /// Strategies that reshape another strategy's text instead of reading the file.
    pub fn is_derived(self) -> bool {
        matches!(self, Self::StructuredNoAi | Self::AiStructured)
    }

    /// Primary candidates, in run order.
    pub fn primary_for(media: MediaType, ai_structuring: bool) -> Vec<Strategy> {
        let mut list = match media {
            MediaType::Pdf => vec![
                Self::Layout,
                Self::StructuredNoAi,
                Self::PlainText,
                Self::Ocr,
                Self::AiStructured,
            ],
            MediaType::Docx | MediaType::PlainText | MediaType::Html => {
                vec![Self::PlainText, Self::StructuredNoAi, Self::AiStructured]
            }
            MediaType::Png | MediaType::Jpeg => vec![Self::Ocr],
        };
        if !ai_structuring {
            list.retain(|s| *s != Self::AiStructured);
        }
        list
    }

    /// Reduced fallback set, tried only when every primary candidate was discarded.
    /// A PDF without a text layer has nothing to scrape but its own object syntax,
    /// so it gets no printable-run fallback.
    pub fn secondary_for(media: MediaType) -> &'static [Strategy] {
        match media {
            MediaType::Pdf => &[Self::RawOrder],
            MediaType::Docx => &[Self::Pandoc, Self::PrintableScrape],
            MediaType::PlainText => &[Self::LossyText],
            MediaType::Html => &[Self::Pandoc, Self::TagStrip],
            MediaType::Png | MediaType::Jpeg => &[],
        }
    }

    pub async fn run(self, ctx: &mut StrategyContext<'_>) -> Result<RawText, ExtractError> {
        let media = ctx.media;
        let raw = match self {
            Self::Layout => match media {
                MediaType::Pdf => {
                    let input = ctx.input_path().await?;
                    extractors::pdftotext(&input, "-layout", ctx.workspace).await?
                }
                _ => return Err(not_applicable(media)),
            },
            Self::RawOrder => match media {
                MediaType::Pdf => {
                    let input = ctx.input_path().await?;
                    extractors::pdftotext(&input, "-raw", ctx.workspace).await?
                }
                _ => return Err(not_applicable(media)),
            },
            Self::PlainText => native_text(ctx.document, media).await?,
            Self::Ocr => match media {
                MediaType::Pdf => {
                    let input = ctx.input_path().await?;
                    extractors::ocr_pdf(&input, ctx.workspace).await?
                }
                MediaType::Png | MediaType::Jpeg => {
                    let input = ctx.input_path().await?;
                    extractors::ocr_image(&input, ctx.workspace).await?
                }
                _ => return Err(not_applicable(media)),
            },
            Self::Pandoc => {
                let from = match media {
                    MediaType::Docx => "docx",
                    MediaType::Html => "html",
                    _ => return Err(not_applicable(media)),
                };
                let input = ctx.input_path().await?;
                extractors::pandoc(&input, from, ctx.workspace).await?
            }
            Self::LossyText => extractors::utf8_lossy(&ctx.document.bytes),
            Self::TagStrip => extractors::strip_tags(&ctx.document.bytes),
            Self::PrintableScrape => extractors::printable_runs(&ctx.document.bytes),
            Self::StructuredNoAi => {
                let base = ctx.base_text().await?;
                RawText::with_pages(structuring::organize(&base.text), base.page_count)
            }
            Self::AiStructured => {
                let structurer = ctx
                    .structurer
                    .ok_or_else(|| ExtractError::Structurer("no structurer configured".into()))?;
                let base = ctx.base_text().await?;
                let structured = structurer.structure(&base.text).await?;
                RawText {
                    text: structured.text,
                    page_count: base.page_count,
                    self_confidence: Some(structured.confidence),
                }
            }
        };
        Ok(raw)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The media type's own decoder; also the base text for derived strategies.
async fn native_text(document: &Document, media: MediaType) -> Result<RawText, ExtractError> {
    match media {
        MediaType::Pdf => extractors::pdf_text(document.bytes.clone()).await,
        MediaType::Docx => extractors::docx_text(document.bytes.clone()).await,
        MediaType::PlainText => extractors::utf8_strict(&document.bytes),
        MediaType::Html => Ok(extractors::html_text(&document.bytes)),
        MediaType::Png | MediaType::Jpeg => Err(not_applicable(media)),
    }
}

fn not_applicable(media: MediaType) -> ExtractError {
    ExtractError::NotApplicable(media.extension())
}

// ────────────────────────────────────────────────────────────────────────────
// Per-request execution context
// ────────────────────────────────────────────────────────────────────────────

/// State shared by the strategies of one cascade run: the document, its private
/// workspace, and the lazily produced working copy and base text.
pub struct StrategyContext<'a> {
    pub document: &'a Document,
    pub media: MediaType,
    pub workspace: &'a Path,
    pub structurer: Option<&'a dyn TextStructurer>,
    input_path: Option<PathBuf>,
    base: Option<Result<RawText, String>>,
}

impl<'a> StrategyContext<'a> {
    pub fn new(
        document: &'a Document,
        media: MediaType,
        workspace: &'a Path,
        structurer: Option<&'a dyn TextStructurer>,
    ) -> Self {
        Self {
            document,
            media,
            workspace,
            structurer,
            input_path: None,
            base: None,
        }
    }

    /// Writes the document into the workspace on first use.
    async fn input_path(&mut self) -> Result<PathBuf, ExtractError> {
        if let Some(path) = &self.input_path {
            return Ok(path.clone());
        }
        let path = self
            .workspace
            .join(format!("input.{}", self.media.extension()));
        tokio::fs::write(&path, &self.document.bytes).await?;
        self.input_path = Some(path.clone());
        Ok(path)
    }

    /// Offers a finished extraction as base text for the derived strategies.
    /// The first usable file-reading result wins.
    pub fn offer_base(&mut self, strategy: Strategy, raw: &RawText) {
        if self.base.is_none() && !strategy.is_derived() && !raw.text.trim().is_empty() {
            self.base = Some(Ok(raw.clone()));
        }
    }

    async fn base_text(&mut self) -> Result<RawText, ExtractError> {
        if self.base.is_none() {
            let computed = native_text(self.document, self.media)
                .await
                .map_err(|e| e.to_string());
            self.base = Some(computed);
        }
        match &self.base {
            Some(Ok(raw)) => Ok(raw.clone()),
            Some(Err(e)) => Err(ExtractError::BaseUnavailable(e.clone())),
            None => Err(ExtractError::BaseUnavailable("not computed".into())),
        }
    }
}
