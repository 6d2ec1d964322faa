// Shared prompt constants.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction appended to every prompt that carries resume text.
pub const FIDELITY_INSTRUCTION: &str = "\
    CRITICAL: Base every statement on the resume text provided. \
    Do NOT invent employers, dates, degrees, or skills that are not present. \
    If a section is missing, say so instead of guessing.";
