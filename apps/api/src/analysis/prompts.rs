// Prompts for the analysis backends.
// Both backends receive the same user prompt so their scores are comparable.

use crate::llm_client::prompts::{FIDELITY_INSTRUCTION, JSON_ONLY_SYSTEM};

/// Keywords listed in the comprehensive prompt.
pub const FULL_KEYWORD_LIMIT: usize = 20;
/// Keywords listed in the fast prompt.
pub const FAST_KEYWORD_LIMIT: usize = 10;

pub const ANALYSIS_SYSTEM: &str = JSON_ONLY_SYSTEM;

const FULL_SCHEMA: &str = r#"{
  "atsScore": <number between 0-100>,
  "overallGrade": "<A+, A, B+, B, C+, C, D, F>",
  "detailedMetrics": {
    "sectionCompleteness": <number between 0-100>,
    "keywordDensity": <number between 0-100>,
    "formatConsistency": <number between 0-100>,
    "actionVerbs": <number between 0-100>,
    "quantifiedAchievements": <number between 0-100>
  },
  "quickStats": {
    "wordCount": <number>,
    "sectionsFound": <number>,
    "keywordsMatched": <number>,
    "improvementAreas": <number>
  },
  "strengths": ["<strength>", "... up to 5"],
  "weaknesses": ["<weakness>", "... up to 5"],
  "recommendations": ["<recommendation>", "... up to 5"],
  "detailedInsights": {
    "keywordAnalysis": "<keyword usage and optimization opportunities>",
    "formatAnalysis": "<formatting and structure>",
    "contentAnalysis": "<content quality and impact>",
    "industryAlignment": "<industry-specific alignment>",
    "atsCompatibility": "<ATS parser compatibility>"
  },
  "industryAlignment": <number between 0-100>,
  "contentQuality": <number between 0-100>
}"#;

const FAST_SCHEMA: &str = r#"{
  "atsScore": <0-100>,
  "detailedMetrics": {
    "sectionCompleteness": <0-100>,
    "keywordDensity": <0-100>,
    "formatConsistency": <0-100>,
    "actionVerbs": <0-100>,
    "quantifiedAchievements": <0-100>
  },
  "strengths": ["<s1>", "<s2>", "<s3>"],
  "weaknesses": ["<w1>", "<w2>", "<w3>"],
  "recommendations": ["<r1>", "<r2>", "<r3>"],
  "industryAlignment": <0-100>,
  "contentQuality": <0-100>
}"#;

/// Comprehensive prompt shared verbatim by both backends.
pub fn full_prompt(resume_text: &str, industry: &str, role: &str, keywords: &[String]) -> String {
    let keywords = keyword_line(keywords, FULL_KEYWORD_LIMIT);
    format!(
        "You are an expert ATS (Applicant Tracking System) analyst and resume optimization \
         specialist. Analyze this resume with the precision of a professional recruiter \
         and an ATS parser.\n\n\
         RESUME TEXT:\n{resume_text}\n\n\
         TARGET POSITION: {role} {industry}\n\n\
         INDUSTRY KEYWORDS TO FOCUS ON: {keywords}\n\n\
         {FIDELITY_INSTRUCTION}\n\n\
         Provide a comprehensive ATS compatibility assessment in exactly this JSON format:\n\
         {FULL_SCHEMA}\n\n\
         Return only valid JSON."
    )
}

/// Terse prompt for fast mode.
pub fn fast_prompt(resume_text: &str, industry: &str, role: &str, keywords: &[String]) -> String {
    let keywords = keyword_line(keywords, FAST_KEYWORD_LIMIT);
    format!(
        "Analyze this resume for ATS compatibility. Return only JSON:\n\n\
         RESUME: {resume_text}\n\
         TARGET: {role} {industry}\n\
         KEYWORDS: {keywords}\n\n\
         {FAST_SCHEMA}"
    )
}

fn keyword_line(keywords: &[String], limit: usize) -> String {
    keywords
        .iter()
        .take(limit)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
