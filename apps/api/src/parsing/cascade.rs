//! Parsing cascade: run the candidate strategies for a document, score what they
//! produce, keep the best.
//!
//! Selection is by quality, then confidence, then text length; strategy order only
//! decides which runs first. Results under `MIN_TEXT_LEN` characters are discarded.
//! When nothing survives the primary list, the media type's secondary list runs.
//! All intermediate files live in a per-request directory under `work_root`, which is
//! removed before `parse` returns, and by `Drop` if the caller abandons the future.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::extractors::{self, RawText};
use super::quality::{confidence_score, quality_score};
use super::strategies::{Strategy, StrategyContext};
use super::structuring::TextStructurer;
use super::{
    AttemptSummary, CascadeMode, Document, ExtractionResult, MediaType, ParseError, ParsedResume,
    MIN_TEXT_LEN,
};
use crate::llm_client::truncate;

pub struct ParsingCascade {
    work_root: PathBuf,
    mode: CascadeMode,
    structurer: Option<Arc<dyn TextStructurer>>,
}

struct Outcome {
    winner: ExtractionResult,
    attempts: Vec<AttemptSummary>,
    used_secondary: bool,
}

impl ParsingCascade {
    /// `structurer: None` disables the AI-structured strategy.
    pub fn new(
        work_root: impl Into<PathBuf>,
        mode: CascadeMode,
        structurer: Option<Arc<dyn TextStructurer>>,
    ) -> Self {
        Self {
            work_root: work_root.into(),
            mode,
            structurer,
        }
    }

    pub fn mode(&self) -> CascadeMode {
        self.mode
    }

    pub async fn parse(&self, document: &Document) -> Result<ParsedResume, ParseError> {
        let media = document.media_type()?;

        tokio::fs::create_dir_all(&self.work_root).await?;
        let workspace = tempfile::Builder::new()
            .prefix("parse-")
            .tempdir_in(&self.work_root)?;

        let outcome = self.run_cascade(document, media, workspace.path()).await;

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!("Failed to remove parse workspace {}: {e}", workspace_path.display());
        }

        let Outcome {
            winner,
            attempts,
            used_secondary,
        } = outcome?;

        let page_count = winner.page_count.or_else(|| match media {
            MediaType::Pdf => extractors::pdf_page_count(&document.bytes),
            _ => None,
        });

        info!(
            "Parsed '{}' with {} (quality {}, confidence {}, {} attempts{})",
            document.filename,
            winner.method,
            winner.quality_score,
            winner.confidence_score,
            attempts.len(),
            if used_secondary { ", secondary set" } else { "" }
        );

        Ok(ParsedResume {
            text: winner.text,
            method: winner.method,
            confidence_score: winner.confidence_score,
            quality_score: winner.quality_score,
            page_count,
            file_name: document.filename.clone(),
            file_size: document.size(),
            parsed_at: Utc::now(),
            used_secondary,
            attempts,
        })
    }

    async fn run_cascade(
        &self,
        document: &Document,
        media: MediaType,
        workspace: &Path,
    ) -> Result<Outcome, ParseError> {
        let mut ctx = StrategyContext::new(document, media, workspace, self.structurer.as_deref());
        let mut attempts = Vec::new();

        let primary = Strategy::primary_for(media, self.structurer.is_some());
        if let Some(winner) = self.run_set(&primary, &mut ctx, &mut attempts).await {
            return Ok(Outcome {
                winner,
                attempts,
                used_secondary: false,
            });
        }

        let secondary = Strategy::secondary_for(media);
        if !secondary.is_empty() {
            debug!(
                "No primary strategy produced usable text for '{}', trying {} fallbacks",
                document.filename,
                secondary.len()
            );
        }
        match self.run_set(secondary, &mut ctx, &mut attempts).await {
            Some(winner) => Ok(Outcome {
                winner,
                attempts,
                used_secondary: true,
            }),
            None => {
                warn!(
                    "No extractable text in '{}' after {} attempts",
                    document.filename,
                    attempts.len()
                );
                Err(ParseError::NoExtractableText { attempts })
            }
        }
    }

    async fn run_set(
        &self,
        strategies: &[Strategy],
        ctx: &mut StrategyContext<'_>,
        attempts: &mut Vec<AttemptSummary>,
    ) -> Option<ExtractionResult> {
        let mut candidates: Vec<ExtractionResult> = Vec::new();

        for &strategy in strategies {
            if let CascadeMode::Tiered { quality_floor } = self.mode {
                if strategy.is_expensive()
                    && candidates.iter().any(|c| c.quality_score >= quality_floor)
                {
                    debug!("Skipping {strategy}: a cheaper result already reached quality {quality_floor}");
                    continue;
                }
            }

            let started = Instant::now();
            let result = match strategy.run(ctx).await {
                Ok(raw) => {
                    ctx.offer_base(strategy, &raw);
                    score(strategy, raw)
                }
                Err(e) => failed(strategy, e.to_string()),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            if let Some(error) = &result.error {
                warn!(
                    "Strategy {strategy} failed after {duration_ms}ms: {}",
                    truncate(error, 200)
                );
            } else {
                debug!(
                    "Strategy {strategy} finished in {duration_ms}ms: quality {}, confidence {}",
                    result.quality_score, result.confidence_score
                );
            }

            attempts.push(AttemptSummary::from_result(&result, duration_ms));
            if result.success {
                candidates.push(result);
            }
        }

        select_best(candidates)
    }
}

/// Scores a finished extraction; anything under the length floor becomes a failure
/// with zero scores so it can never outrank a usable result.
fn score(strategy: Strategy, raw: RawText) -> ExtractionResult {
    let text = raw.text.trim().to_string();
    let length = text.chars().count();
    if length < MIN_TEXT_LEN {
        let mut result = failed(
            strategy,
            format!("extracted {length} characters, below the {MIN_TEXT_LEN} character minimum"),
        );
        result.text = text;
        result.page_count = raw.page_count;
        return result;
    }

    ExtractionResult {
        success: true,
        confidence_score: raw.self_confidence.unwrap_or_else(|| confidence_score(&text)),
        quality_score: quality_score(&text),
        text,
        method: strategy,
        page_count: raw.page_count,
        error: None,
    }
}

fn failed(strategy: Strategy, error: String) -> ExtractionResult {
    ExtractionResult {
        success: false,
        text: String::new(),
        method: strategy,
        confidence_score: 0,
        quality_score: 0,
        page_count: None,
        error: Some(error),
    }
}

/// Highest (quality, confidence, length); the earliest candidate wins exact ties.
fn select_best(candidates: Vec<ExtractionResult>) -> Option<ExtractionResult> {
    let rank = |r: &ExtractionResult| (r.quality_score, r.confidence_score, r.text.len());
    let mut best: Option<ExtractionResult> = None;
    for candidate in candidates {
        match &best {
            Some(current) if rank(&candidate) <= rank(current) => {}
            _ => best = Some(candidate),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::extractors::ExtractError;
    use crate::parsing::structuring::StructuredText;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const RESUME: &str = "Jane Doe\n\
        jane.doe@example.com | (555) 123-4567\n\
        Experience\n\
        Senior Engineer, Acme Corp\n\
        2019 - Present\n\
        Led development of the billing platform\n\
        Education\n\
        BSc Computer Science, State University\n\
        Skills\n\
        Rust, Go, PostgreSQL";

    /// Returns a richer rewrite and counts calls.
    struct CountingStructurer {
        calls: AtomicUsize,
        confidence: u8,
    }

    impl CountingStructurer {
        fn new(confidence: u8) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                confidence,
            })
        }
    }

    #[async_trait]
    impl TextStructurer for CountingStructurer {
        async fn structure(&self, raw_text: &str) -> Result<StructuredText, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let extra = "Summary\nProject leadership and management of analysis work\n\
                         Certification: AWS Solutions Architect\nGitHub: github.com/jane\n\
                         LinkedIn: linkedin.com/in/jane\nContact: phone and email above\n";
            Ok(StructuredText {
                text: format!("{raw_text}\n{extra}{}", "Achievement: shipped on time\n".repeat(10)),
                confidence: self.confidence,
            })
        }
    }

    fn text_doc(bytes: impl Into<bytes::Bytes>) -> Document {
        Document::new(bytes, Some("text/plain".into()), "resume.txt")
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_plain_text_resume_parses_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let cascade = ParsingCascade::new(root.path(), CascadeMode::Exhaustive, None);

        let parsed = cascade.parse(&text_doc(RESUME)).await.unwrap();

        assert!(parsed.text.contains("Experience") || parsed.text.contains("EXPERIENCE"));
        assert!(!parsed.used_secondary);
        assert_eq!(parsed.attempts.len(), 2);
        assert_eq!(parsed.file_name, "resume.txt");
        assert_eq!(parsed.file_size, RESUME.len());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_winner_outranks_every_other_attempt() {
        let root = tempfile::tempdir().unwrap();
        let structurer = CountingStructurer::new(70);
        let cascade = ParsingCascade::new(root.path(), CascadeMode::Exhaustive, Some(structurer));

        let parsed = cascade.parse(&text_doc(RESUME)).await.unwrap();

        assert_eq!(parsed.method, Strategy::AiStructured);
        assert_eq!(parsed.confidence_score, 70);
        assert!(parsed
            .attempts
            .iter()
            .all(|a| a.quality_score <= parsed.quality_score));
    }

    #[tokio::test]
    async fn test_short_text_exhausts_cascade_without_leftovers() {
        let root = tempfile::tempdir().unwrap();
        let cascade = ParsingCascade::new(root.path(), CascadeMode::Exhaustive, None);

        let err = cascade.parse(&text_doc("Jane Doe, engineer")).await.unwrap_err();

        match err {
            ParseError::NoExtractableText { attempts } => {
                // plain-text, structured-no-ai, then the lossy fallback
                assert_eq!(attempts.len(), 3);
                assert!(attempts.iter().all(|a| !a.success));
                assert_eq!(attempts[2].method, Strategy::LossyText);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_invalid_utf8_falls_back_to_secondary_set() {
        let root = tempfile::tempdir().unwrap();
        let cascade = ParsingCascade::new(root.path(), CascadeMode::Exhaustive, None);
        let mut bytes = RESUME.as_bytes().to_vec();
        bytes.extend_from_slice(b"\n\xFF\xFE");

        let parsed = cascade.parse(&text_doc(bytes)).await.unwrap();

        assert!(parsed.used_secondary);
        assert_eq!(parsed.method, Strategy::LossyText);
        assert!(parsed.attempts[..2].iter().all(|a| a.error.is_some()));
    }

    #[tokio::test]
    async fn test_tiered_mode_skips_expensive_strategies_when_cheap_is_good() {
        let root = tempfile::tempdir().unwrap();
        let structurer = CountingStructurer::new(90);
        let cascade = ParsingCascade::new(
            root.path(),
            CascadeMode::Tiered { quality_floor: 40 },
            Some(structurer.clone()),
        );

        let parsed = cascade.parse(&text_doc(RESUME)).await.unwrap();

        assert_eq!(structurer.calls.load(Ordering::SeqCst), 0);
        assert_ne!(parsed.method, Strategy::AiStructured);
        assert_eq!(parsed.attempts.len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustive_mode_always_runs_expensive_strategies() {
        let root = tempfile::tempdir().unwrap();
        let structurer = CountingStructurer::new(90);
        let cascade = ParsingCascade::new(
            root.path(),
            CascadeMode::Exhaustive,
            Some(structurer.clone()),
        );

        cascade.parse(&text_doc(RESUME)).await.unwrap();

        assert_eq!(structurer.calls.load(Ordering::SeqCst), 1);
    }

    /// A one-page PDF with an empty content stream and scanner metadata.
    fn textless_pdf() -> Vec<u8> {
        let objects = [
            "<< /Type /Catalog /Pages 2 0 R >>",
            "<< /Type /Pages /Kids [3 0 R] /Count 1 >>",
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R >>",
            "<< /Length 0 >>\nstream\n\nendstream",
            "<< /Producer (HP Scan Software Suite version 4) /Creator (Canon MF Scan Utility for Windows) >>",
        ];
        let mut pdf = String::from("%PDF-1.4\n");
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(pdf.len());
            pdf.push_str(&format!("{} 0 obj\n{body}\nendobj\n", i + 1));
        }
        let xref = pdf.len();
        pdf.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
        for offset in offsets {
            pdf.push_str(&format!("{offset:010} 00000 n \n"));
        }
        pdf.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R /Info 5 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        ));
        pdf.into_bytes()
    }

    #[tokio::test]
    async fn test_textless_pdf_has_no_extractable_text() {
        let root = tempfile::tempdir().unwrap();
        let cascade = ParsingCascade::new(root.path(), CascadeMode::Exhaustive, None);
        let doc = Document::new(textless_pdf(), Some("application/pdf".into()), "scan.pdf");

        let err = cascade.parse(&doc).await.unwrap_err();

        match err {
            ParseError::NoExtractableText { attempts } => {
                assert!(attempts.iter().all(|a| !a.success));
                assert!(attempts
                    .iter()
                    .all(|a| a.method != Strategy::PrintableScrape));
                assert_eq!(attempts.last().unwrap().method, Strategy::RawOrder);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // input.pdf and every tool output went with the workspace
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_image_ocr_leaves_no_files() {
        let root = tempfile::tempdir().unwrap();
        let cascade = ParsingCascade::new(root.path(), CascadeMode::Exhaustive, None);
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec();
        let doc = Document::new(png, Some("image/png".into()), "scan.png");

        let err = cascade.parse(&doc).await.unwrap_err();

        match err {
            ParseError::NoExtractableText { attempts } => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].method, Strategy::Ocr);
                assert!(attempts[0].error.is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn test_unsupported_media_type_is_rejected_before_workspace() {
        let root = tempfile::tempdir().unwrap();
        let work_root = root.path().join("never-created");
        let cascade = ParsingCascade::new(&work_root, CascadeMode::Exhaustive, None);
        let doc = Document::new(b"PK..".to_vec(), Some("application/zip".into()), "cv.zip");

        let err = cascade.parse(&doc).await.unwrap_err();

        assert!(matches!(err, ParseError::UnsupportedMediaType(_)));
        assert!(!work_root.exists());
    }

    #[test]
    fn test_select_best_breaks_ties_by_confidence_then_length() {
        let make = |method, quality, confidence, text: &str| ExtractionResult {
            success: true,
            text: text.to_string(),
            method,
            confidence_score: confidence,
            quality_score: quality,
            page_count: None,
            error: None,
        };
        let best = select_best(vec![
            make(Strategy::Layout, 60, 50, "aaaa"),
            make(Strategy::PlainText, 60, 70, "aa"),
            make(Strategy::Ocr, 60, 70, "aaaaaa"),
            make(Strategy::StructuredNoAi, 55, 99, "aaaaaaaa"),
        ])
        .unwrap();
        assert_eq!(best.method, Strategy::Ocr);
    }
}
