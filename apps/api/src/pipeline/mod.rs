//! Pipeline: one analysis request end to end, under an outer deadline.
//!
//! parse → progress → analyze (cache, backends, reconcile, benchmark) → progress.
//! Dropping the in-flight future on deadline expiry removes the parse workspace and
//! kills any running extraction tool.

pub mod handlers;

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::models::{AnalysisMode, ScoreReport};
use crate::analysis::DualModelAnalyzer;
use crate::config::PipelineLimits;
use crate::errors::AppError;
use crate::parsing::{AttemptSummary, Document, ParsingCascade, Strategy};
use crate::progress::ProgressTracker;

#[derive(Debug)]
pub struct AnalyzeRequest {
    pub document: Document,
    pub industry: String,
    pub role: String,
    pub mode: AnalysisMode,
    /// Client-chosen id for progress polling; generated when absent.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub session_id: String,
    /// Carries the benchmark as `industryBenchmark`.
    pub analysis: ScoreReport,
    pub parsing_method: Strategy,
    pub confidence: u8,
    pub quality_score: u8,
    pub page_count: Option<u32>,
    pub used_secondary_parser: bool,
    pub parsing_attempts: Vec<AttemptSummary>,
    pub file_name: String,
    pub cached: bool,
    pub analysis_time_ms: u64,
}

pub struct AtsService {
    cascade: ParsingCascade,
    analyzer: DualModelAnalyzer,
    progress: Arc<ProgressTracker>,
    limits: PipelineLimits,
}

pub fn new_session_id() -> String {
    format!("ats-{}", Uuid::new_v4())
}

impl AtsService {
    pub fn new(
        cascade: ParsingCascade,
        analyzer: DualModelAnalyzer,
        progress: Arc<ProgressTracker>,
        limits: PipelineLimits,
    ) -> Self {
        Self {
            cascade,
            analyzer,
            progress,
            limits,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn analyzer(&self) -> &DualModelAnalyzer {
        &self.analyzer
    }

    pub async fn analyze(&self, request: AnalyzeRequest) -> Result<AnalysisResponse, AppError> {
        let session_id = request
            .session_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(new_session_id);
        self.progress.init(&session_id);

        let deadline = self
            .limits
            .deadline_for(request.document.size(), request.mode == AnalysisMode::Fast);
        info!(
            "Analysis {session_id} started: file={} size={} industry={} role={} mode={:?} deadline={}s",
            request.document.filename,
            request.document.size(),
            request.industry,
            request.role,
            request.mode,
            deadline.as_secs()
        );

        match tokio::time::timeout(deadline, self.run(&session_id, &request)).await {
            Ok(Ok(response)) => {
                match serde_json::to_value(&response) {
                    Ok(value) => self.progress.complete(&session_id, value),
                    Err(e) => {
                        warn!("Could not attach result to progress record {session_id}: {e}");
                        self.progress.complete(&session_id, serde_json::Value::Null);
                    }
                }
                Ok(response)
            }
            Ok(Err(err)) => {
                self.progress.fail(&session_id, &err.to_string());
                Err(err)
            }
            Err(_) => {
                warn!("Analysis {session_id} exceeded its {}s deadline", deadline.as_secs());
                self.progress.fail(&session_id, "Analysis timed out");
                Err(AppError::PipelineTimeout {
                    limit_secs: deadline.as_secs(),
                })
            }
        }
    }

    async fn run(
        &self,
        session_id: &str,
        request: &AnalyzeRequest,
    ) -> Result<AnalysisResponse, AppError> {
        let started = Instant::now();

        self.progress
            .update(session_id, 0, "Extracting text from resume...", None);
        let parsed = self.cascade.parse(&request.document).await?;
        self.progress.update(
            session_id,
            1,
            &format!("Text extracted using {}", parsed.method),
            None,
        );

        self.progress
            .update(session_id, 2, "Running AI analysis...", None);
        let analysis = self
            .analyzer
            .analyze(&parsed.text, &request.industry, &request.role, request.mode)
            .await;

        let analysis_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Analysis {session_id} done in {analysis_time_ms}ms: method={} score={} cached={}",
            parsed.method, analysis.ats_score, analysis.cached
        );

        Ok(AnalysisResponse {
            session_id: session_id.to_string(),
            cached: analysis.cached,
            analysis,
            parsing_method: parsed.method,
            confidence: parsed.confidence_score,
            quality_score: parsed.quality_score,
            page_count: parsed.page_count,
            used_secondary_parser: parsed.used_secondary,
            parsing_attempts: parsed.attempts,
            file_name: parsed.file_name,
            analysis_time_ms,
        })
    }
}
