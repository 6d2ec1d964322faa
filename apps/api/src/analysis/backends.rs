//! Analysis backends: one external scoring model each.
//!
//! The analyzer holds backends as `Arc<dyn AnalysisBackend>`; tests swap in fakes.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::analysis::models::BackendScoreReport;
use crate::analysis::prompts::ANALYSIS_SYSTEM;
use crate::llm_client::{openai::OpenAiClient, parse_json_reply, LlmClient, LlmError};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("provider error: {0}")]
    Provider(LlmError),
}

impl From<LlmError> for BackendError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(e) => BackendError::Malformed(e.to_string()),
            LlmError::EmptyContent => BackendError::Malformed("empty reply".to_string()),
            other => BackendError::Provider(other),
        }
    }
}

/// Output budget selector; the prompt itself is built by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptProfile {
    Full,
    Fast,
}

#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub prompt: String,
    pub profile: PromptProfile,
}

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Name reported in `modelsUsed`.
    fn name(&self) -> &'static str;

    async fn analyze(&self, request: &BackendRequest) -> Result<BackendScoreReport, BackendError>;
}

/// A reply must carry an overall score or at least one sub-metric to derive it from.
pub fn validate(report: BackendScoreReport) -> Result<BackendScoreReport, BackendError> {
    if report.overall().is_none() {
        return Err(BackendError::Malformed(
            "reply has neither atsScore nor detailedMetrics".to_string(),
        ));
    }
    Ok(report)
}

pub struct AnthropicBackend {
    client: LlmClient,
}

impl AnthropicBackend {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnalysisBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "Claude Sonnet 4"
    }

    async fn analyze(&self, request: &BackendRequest) -> Result<BackendScoreReport, BackendError> {
        let max_tokens = match request.profile {
            PromptProfile::Full => 3000,
            PromptProfile::Fast => 500,
        };
        let response = self
            .client
            .call(&request.prompt, ANALYSIS_SYSTEM, max_tokens)
            .await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        validate(parse_json_reply(text)?)
    }
}

pub struct OpenAiBackend {
    client: OpenAiClient,
}

impl OpenAiBackend {
    pub fn new(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AnalysisBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "GPT-4o"
    }

    async fn analyze(&self, request: &BackendRequest) -> Result<BackendScoreReport, BackendError> {
        let max_tokens = match request.profile {
            PromptProfile::Full => 2000,
            PromptProfile::Fast => 500,
        };
        let report = self
            .client
            .complete_json(&request.prompt, ANALYSIS_SYSTEM, max_tokens)
            .await?;
        validate(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failures_classify_as_malformed() {
        let parse = parse_json_reply::<BackendScoreReport>("not json").unwrap_err();
        assert!(matches!(BackendError::from(parse), BackendError::Malformed(_)));
        assert!(matches!(
            BackendError::from(LlmError::EmptyContent),
            BackendError::Malformed(_)
        ));
        assert!(matches!(
            BackendError::from(LlmError::RateLimited { retries: 3 }),
            BackendError::Provider(_)
        ));
    }

    #[test]
    fn test_validate_rejects_scoreless_reply() {
        let empty: BackendScoreReport = serde_json::from_str(r#"{"strengths": ["ok"]}"#).unwrap();
        assert!(matches!(validate(empty), Err(BackendError::Malformed(_))));

        let partial: BackendScoreReport =
            serde_json::from_str(r#"{"detailedMetrics": {"actionVerbs": 60}}"#).unwrap();
        assert!(validate(partial).is_ok());
    }

    #[test]
    fn test_fenced_reply_parses() {
        let reply = "```json\n{\"atsScore\": 72, \"overallGrade\": \"C\"}\n```";
        let report = validate(parse_json_reply(reply).unwrap()).unwrap();
        assert_eq!(report.ats_score, Some(72.0));
    }
}
