//! Text scoring for the parsing cascade.
//!
//! `confidence_score` is the cheap signal: does this look like a resume at all?
//! `quality_score` is stricter and is what the cascade ranks on; it subtracts points
//! for the debris that OCR and layout extraction leave behind.

use std::sync::OnceLock;

use regex::Regex;

const SECTION_KEYWORDS: &[&str] = &[
    "experience",
    "education",
    "skills",
    "summary",
    "objective",
    "projects",
    "certifications",
];

const STRUCTURE_KEYWORDS: &[&str] = &[
    "experience",
    "education",
    "skills",
    "summary",
    "objective",
    "contact",
    "phone",
    "email",
    "linkedin",
    "github",
];

const PROFESSIONAL_KEYWORDS: &[&str] = &[
    "university",
    "degree",
    "certification",
    "project",
    "achievement",
    "responsibility",
    "leadership",
    "management",
    "development",
    "analysis",
];

pub(crate) fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("static regex")
    })
}

pub(crate) fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\+?1[-.\s]?)?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}").expect("static regex")
    })
}

fn artifact_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // digit fragments glued to a stray letter: "3 a", "12b"
            Regex::new(r"\b[0-9]{1,2}\s*[a-z]\b").expect("static regex"),
            Regex::new(r"\b[a-z]{1,2}\s*[0-9]\b").expect("static regex"),
            Regex::new(r"[^\w\s@.-]").expect("static regex"),
        ]
    })
}

fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

fn count_present(lower: &str, keywords: &[&str]) -> i32 {
    keywords.iter().filter(|k| lower.contains(*k)).count() as i32
}

fn clamp_score(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

/// Does this text look like a resume? Base 20, section headings, contact details, and
/// enough lines to be more than a fragment.
pub fn confidence_score(text: &str) -> u8 {
    if text.trim().is_empty() {
        return 0;
    }
    let lower = text.to_lowercase();
    let mut score = 20;

    score += (count_present(&lower, SECTION_KEYWORDS) * 10).min(40);
    if email_re().is_match(text) {
        score += 15;
    }
    if phone_re().is_match(text) {
        score += 15;
    }

    let lines = line_count(text);
    if lines > 5 {
        score += 5;
    }
    if lines > 15 {
        score += 5;
    }

    clamp_score(score)
}

/// Ranking score for cascade candidates.
pub fn quality_score(text: &str) -> u8 {
    if text.chars().count() < 10 {
        return 0;
    }
    let lower = text.to_lowercase();
    let mut score = count_present(&lower, STRUCTURE_KEYWORDS) * 10;

    if email_re().is_match(text) {
        score += 20;
    }
    if phone_re().is_match(text) {
        score += 20;
    }

    score += (count_present(&lower, PROFESSIONAL_KEYWORDS) * 5).min(50);

    let lines = line_count(text);
    if lines > 10 {
        score += 10;
    }
    if lines > 20 {
        score += 10;
    }

    let artifacts: usize = artifact_res().iter().map(|re| re.find_iter(text).count()).sum();
    score -= (artifacts as i32 * 2).min(30);

    if has_letter_spacing(text) {
        score -= 40;
    }
    if special_char_ratio(text) > 0.15 {
        score -= 20;
    }

    clamp_score(score)
}

/// "E x p e r i e n c e" style output: most whitespace-separated tokens are one char.
pub fn has_letter_spacing(text: &str) -> bool {
    let mut total = 0usize;
    let mut single = 0usize;
    for token in text.split_whitespace() {
        total += 1;
        if token.chars().count() == 1 {
            single += 1;
        }
    }
    total >= 10 && single as f64 / total as f64 > 0.5
}

/// Share of non-whitespace characters that are neither alphanumeric nor ordinary
/// resume punctuation.
pub fn special_char_ratio(text: &str) -> f64 {
    let mut visible = 0usize;
    let mut special = 0usize;
    for c in text.chars().filter(|c| !c.is_whitespace()) {
        visible += 1;
        if !c.is_alphanumeric() && !".,;:@-+()/&'\"%#|•".contains(c) {
            special += 1;
        }
    }
    if visible == 0 {
        return 0.0;
    }
    special as f64 / visible as f64
}
