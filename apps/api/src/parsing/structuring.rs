//! Structuring passes that reorganise base text into a cleaner resume layout.
//!
//! `organize` is the deterministic, non-AI pass. `TextStructurer` is the seam for the
//! AI-assisted pass; `AppState` wiring supplies `LlmStructurer`, tests supply fakes.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::extractors::ExtractError;
use super::prompts;
use crate::llm_client::LlmClient;

const HEADER_KEYWORDS: &[&str] = &[
    "experience",
    "education",
    "skills",
    "summary",
    "objective",
    "profile",
    "contact",
    "certifications",
    "awards",
    "honors",
    "projects",
    "work",
    "technical",
    "professional",
    "academic",
    "credentials",
    "achievements",
];

/// Longest input sent to the structuring model.
const MAX_STRUCTURING_CHARS: usize = 20_000;
const STRUCTURING_MAX_TOKENS: u32 = 4000;

// ────────────────────────────────────────────────────────────────────────────
// Non-AI organisation
// ────────────────────────────────────────────────────────────────────────────

pub fn is_section_header(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }
    let short = lower.chars().count() < 20;
    HEADER_KEYWORDS.iter().any(|kw| {
        lower == *kw
            || lower.starts_with(&format!("{kw} "))
            || lower.contains(&format!("{kw}:"))
            || (short && lower.contains(kw))
    })
}

pub fn is_date_line(line: &str) -> bool {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    let res = RES.get_or_init(|| {
        const MONTH: &str = r"(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?";
        [
            r"^\d{4}\s*[-–]\s*\d{4}$".to_string(),
            r"(?i)^\d{4}\s*[-–]\s*(present|current)$".to_string(),
            format!(r"(?i)^{MONTH}\s+\d{{4}}\s*[-–]\s*{MONTH}\s+\d{{4}}$"),
            format!(r"(?i)^{MONTH}\s+\d{{4}}\s*[-–]\s*(present|current)$"),
            r"(?i)issued on".to_string(),
            r"^\d{4}$".to_string(),
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static regex"))
        .collect()
    });
    let line = line.trim();
    res.iter().any(|re| re.is_match(line))
}

fn normalize_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases section headers behind a blank line, folds stand-alone date lines into
/// the entry above them, and normalises whitespace.
pub fn organize(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut last_was_header = false;

    for raw in text.lines() {
        let line = normalize_whitespace(raw);
        if line.is_empty() {
            continue;
        }

        if is_section_header(&line) {
            if !lines.is_empty() && !last_was_header {
                lines.push(String::new());
            }
            lines.push(line.to_uppercase());
            last_was_header = true;
            continue;
        }

        if is_date_line(&line) && !last_was_header {
            if let Some(previous) = lines.last_mut() {
                if !previous.is_empty() && !is_date_line(previous) && !is_section_header(previous) {
                    previous.push_str(" - ");
                    previous.push_str(&line);
                    continue;
                }
            }
        }

        lines.push(line);
        last_was_header = false;
    }

    lines.join("\n")
}

// ────────────────────────────────────────────────────────────────────────────
// AI-assisted structuring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct StructuredText {
    pub text: String,
    pub confidence: u8,
}

#[async_trait]
pub trait TextStructurer: Send + Sync {
    async fn structure(&self, raw_text: &str) -> Result<StructuredText, ExtractError>;
}

/// Structures text with the primary LLM.
pub struct LlmStructurer {
    llm: LlmClient,
}

impl LlmStructurer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Deserialize)]
struct StructuringReply {
    text: String,
    confidence: f64,
}

#[async_trait]
impl TextStructurer for LlmStructurer {
    async fn structure(&self, raw_text: &str) -> Result<StructuredText, ExtractError> {
        let input: String = raw_text.chars().take(MAX_STRUCTURING_CHARS).collect();
        let prompt = prompts::structuring_prompt(&input);

        let reply: StructuringReply = self
            .llm
            .call_json(&prompt, prompts::STRUCTURING_SYSTEM, STRUCTURING_MAX_TOKENS)
            .await
            .map_err(|e| ExtractError::Structurer(e.to_string()))?;

        Ok(StructuredText {
            text: reply.text,
            confidence: reply.confidence.round().clamp(0.0, 100.0) as u8,
        })
    }
}
