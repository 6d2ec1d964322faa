// Prompt for the AI-structured extraction strategy.

pub const STRUCTURING_SYSTEM: &str = "You clean up text extracted from resume files. \
    You MUST respond with valid JSON only, no markdown code fences, no commentary.";

/// Builds the structuring prompt around the raw extracted text.
pub fn structuring_prompt(raw_text: &str) -> String {
    format!(
        r#"The following text was extracted automatically from a resume file and may have
broken line order, merged columns, stray symbols, or split words.

Rewrite it as clean plain text:
- keep every fact exactly as written (names, employers, dates, numbers, skills)
- put each section heading (EXPERIENCE, EDUCATION, SKILLS, ...) on its own line in upper case
- keep one entry per line, with its dates on the same line
- drop page numbers, headers/footers repeated on each page, and extraction debris

{fidelity}

Return JSON with exactly this shape:
{{"text": "<the cleaned resume text>", "confidence": <integer 0-100, how sure you are the text is complete and correctly ordered>}}

EXTRACTED TEXT:
---
{raw_text}
---"#,
        fidelity = crate::llm_client::prompts::FIDELITY_INSTRUCTION,
    )
}
