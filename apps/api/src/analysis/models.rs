use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::benchmark::BenchmarkResult;

// ────────────────────────────────────────────────────────────────────────────
// Grade
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "C+")]
    CPlus,
    C,
    D,
    F,
}

impl Grade {
    /// A+ ≥95, A ≥90, B+ ≥85, B ≥80, C+ ≥75, C ≥70, D ≥60, else F.
    pub fn from_score(score: u8) -> Self {
        match score {
            95..=u8::MAX => Self::APlus,
            90..=94 => Self::A,
            85..=89 => Self::BPlus,
            80..=84 => Self::B,
            75..=79 => Self::CPlus,
            70..=74 => Self::C,
            60..=69 => Self::D,
            _ => Self::F,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Metrics
// ────────────────────────────────────────────────────────────────────────────

/// The five sub-scores every report carries, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    SectionCompleteness,
    KeywordDensity,
    FormatConsistency,
    ActionVerbs,
    QuantifiedAchievements,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::SectionCompleteness,
        Metric::KeywordDensity,
        Metric::FormatConsistency,
        Metric::ActionVerbs,
        Metric::QuantifiedAchievements,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::SectionCompleteness => "sectionCompleteness",
            Self::KeywordDensity => "keywordDensity",
            Self::FormatConsistency => "formatConsistency",
            Self::ActionVerbs => "actionVerbs",
            Self::QuantifiedAchievements => "quantifiedAchievements",
        }
    }

    /// Human wording for recommendations.
    pub fn label(self) -> &'static str {
        match self {
            Self::SectionCompleteness => "section completeness",
            Self::KeywordDensity => "keyword density",
            Self::FormatConsistency => "format consistency",
            Self::ActionVerbs => "action verbs",
            Self::QuantifiedAchievements => "quantified achievements",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedMetrics {
    pub section_completeness: u8,
    pub keyword_density: u8,
    pub format_consistency: u8,
    pub action_verbs: u8,
    pub quantified_achievements: u8,
}

impl DetailedMetrics {
    pub fn uniform(value: u8) -> Self {
        Self::from_array([value; 5])
    }

    pub fn from_array(values: [u8; 5]) -> Self {
        let [section_completeness, keyword_density, format_consistency, action_verbs, quantified_achievements] =
            values;
        Self {
            section_completeness,
            keyword_density,
            format_consistency,
            action_verbs,
            quantified_achievements,
        }
    }

    pub fn get(&self, metric: Metric) -> u8 {
        match metric {
            Metric::SectionCompleteness => self.section_completeness,
            Metric::KeywordDensity => self.keyword_density,
            Metric::FormatConsistency => self.format_consistency,
            Metric::ActionVerbs => self.action_verbs,
            Metric::QuantifiedAchievements => self.quantified_achievements,
        }
    }

    /// Rounded mean of the five sub-scores.
    pub fn average(&self) -> u8 {
        let sum: u32 = Metric::ALL.iter().map(|m| self.get(*m) as u32).sum();
        (sum as f64 / 5.0).round() as u8
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Score report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    #[serde(default, deserialize_with = "lenient_count")]
    pub word_count: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub sections_found: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub keywords_matched: u32,
    #[serde(default, deserialize_with = "lenient_count")]
    pub improvement_areas: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Fast,
    Comprehensive,
}

/// The reconciled report returned to clients and stored in the result cache.
///
/// `ats_score` is the (rounded) mean of the backends' overall scores;
/// `metrics_average` is published next to it so the relation to `detailed_metrics`
/// can be audited. `overall_grade` is always `Grade::from_score(ats_score)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub ats_score: u8,
    pub overall_grade: Grade,
    pub detailed_metrics: DetailedMetrics,
    pub metrics_average: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_stats: Option<QuickStats>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_insights: Option<Value>,
    pub industry_alignment: u8,
    pub content_quality: u8,
    pub models_used: Vec<String>,
    pub analysis_mode: AnalysisMode,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry_benchmark: Option<BenchmarkResult>,
}

pub const FALLBACK_MODEL: &str = "Default Fallback";

impl ScoreReport {
    /// The fixed report returned when no backend produced a usable answer.
    pub fn fallback(mode: AnalysisMode) -> Self {
        Self {
            ats_score: 50,
            overall_grade: Grade::C,
            detailed_metrics: DetailedMetrics::uniform(50),
            metrics_average: 50,
            quick_stats: Some(QuickStats::default()),
            strengths: vec!["Resume submitted successfully".to_string()],
            weaknesses: vec!["AI analysis unavailable".to_string()],
            recommendations: vec!["Please try again".to_string()],
            detailed_insights: None,
            industry_alignment: 50,
            content_quality: 50,
            models_used: vec![FALLBACK_MODEL.to_string()],
            analysis_mode: mode,
            cached: false,
            industry_benchmark: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.models_used.len() == 1 && self.models_used[0] == FALLBACK_MODEL
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend wire format
// ────────────────────────────────────────────────────────────────────────────

/// What a backend actually sends back. Models drop fields, send `"85"` instead of
/// `85`, or send floats, so every score is optional and parsed leniently.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendScoreReport {
    #[serde(default, deserialize_with = "lenient_score")]
    pub ats_score: Option<f64>,
    /// Read for logging only; the grade is always recomputed.
    #[serde(default)]
    pub overall_grade: Option<Value>,
    #[serde(default)]
    pub detailed_metrics: BackendMetrics,
    #[serde(default)]
    pub quick_stats: Option<QuickStats>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub weaknesses: Vec<String>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub detailed_insights: Option<Value>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub industry_alignment: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub content_quality: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendMetrics {
    #[serde(default, deserialize_with = "lenient_score")]
    pub section_completeness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub keyword_density: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub format_consistency: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub action_verbs: Option<f64>,
    #[serde(default, deserialize_with = "lenient_score")]
    pub quantified_achievements: Option<f64>,
}

impl BackendMetrics {
    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::SectionCompleteness => self.section_completeness,
            Metric::KeywordDensity => self.keyword_density,
            Metric::FormatConsistency => self.format_consistency,
            Metric::ActionVerbs => self.action_verbs,
            Metric::QuantifiedAchievements => self.quantified_achievements,
        }
    }

    pub fn present(&self) -> Vec<f64> {
        Metric::ALL.iter().filter_map(|m| self.get(*m)).collect()
    }
}

impl BackendScoreReport {
    /// Overall score as sent, or derived from whatever sub-metrics are present.
    pub fn overall(&self) -> Option<f64> {
        self.ats_score.or_else(|| {
            let present = self.detailed_metrics.present();
            (!present.is_empty()).then(|| present.iter().sum::<f64>() / present.len() as f64)
        })
    }
}

fn number_from(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn lenient_score<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from)
        .map(|n| n.clamp(0.0, 100.0)))
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from)
        .map(|n| n.max(0.0).round().min(u32::MAX as f64) as u32)
        .unwrap_or(0))
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let items = match value {
        Some(Value::Array(items)) => items,
        Some(Value::String(s)) => vec![Value::String(s)],
        _ => return Ok(Vec::new()),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|s| !s.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_table_boundaries() {
        let cases = [
            (100, "A+"),
            (95, "A+"),
            (94, "A"),
            (90, "A"),
            (89, "B+"),
            (85, "B+"),
            (84, "B"),
            (80, "B"),
            (79, "C+"),
            (75, "C+"),
            (74, "C"),
            (70, "C"),
            (69, "D"),
            (60, "D"),
            (59, "F"),
            (0, "F"),
        ];
        for (score, grade) in cases {
            assert_eq!(Grade::from_score(score).as_str(), grade, "score {score}");
        }
    }

    #[test]
    fn test_grade_serializes_with_plus() {
        assert_eq!(serde_json::to_value(Grade::BPlus).unwrap(), "B+");
        assert_eq!(serde_json::from_str::<Grade>("\"A+\"").unwrap(), Grade::APlus);
    }

    #[test]
    fn test_fallback_report_values() {
        let report = ScoreReport::fallback(AnalysisMode::Comprehensive);
        assert_eq!(report.ats_score, 50);
        assert_eq!(report.overall_grade, Grade::C);
        assert_eq!(report.detailed_metrics, DetailedMetrics::uniform(50));
        assert_eq!(report.models_used, vec!["Default Fallback"]);
        assert!(report.is_fallback());
    }

    #[test]
    fn test_report_serializes_camel_case() {
        let value = serde_json::to_value(ScoreReport::fallback(AnalysisMode::Fast)).unwrap();
        assert_eq!(value["atsScore"], 50);
        assert_eq!(value["overallGrade"], "C");
        assert_eq!(value["detailedMetrics"]["quantifiedAchievements"], 50);
        assert_eq!(value["analysisMode"], "fast");
        assert!(value.get("industryBenchmark").is_none());
    }

    #[test]
    fn test_backend_report_parses_leniently() {
        let raw = r#"{
            "atsScore": "82",
            "overallGrade": "B",
            "detailedMetrics": {"sectionCompleteness": 90.4, "keywordDensity": "70%", "actionVerbs": null},
            "quickStats": {"wordCount": 512.0, "sectionsFound": "5"},
            "strengths": ["Clear layout", 42, ""],
            "weaknesses": "Few metrics",
            "industryAlignment": 140
        }"#;
        let report: BackendScoreReport = serde_json::from_str(raw).unwrap();
        assert_eq!(report.ats_score, Some(82.0));
        assert_eq!(report.detailed_metrics.keyword_density, Some(70.0));
        assert_eq!(report.detailed_metrics.action_verbs, None);
        assert_eq!(report.quick_stats.unwrap().word_count, 512);
        assert_eq!(report.quick_stats.unwrap().sections_found, 5);
        assert_eq!(report.strengths, vec!["Clear layout", "42"]);
        assert_eq!(report.weaknesses, vec!["Few metrics"]);
        assert_eq!(report.industry_alignment, Some(100.0));
        assert_eq!(report.content_quality, None);
    }

    #[test]
    fn test_overall_derives_from_present_metrics() {
        let report: BackendScoreReport = serde_json::from_str(
            r#"{"detailedMetrics": {"sectionCompleteness": 80, "keywordDensity": 60}}"#,
        )
        .unwrap();
        assert_eq!(report.overall(), Some(70.0));

        let empty: BackendScoreReport = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.overall(), None);
    }

    #[test]
    fn test_metrics_average_rounds() {
        let metrics = DetailedMetrics::from_array([80, 81, 81, 81, 81]);
        assert_eq!(metrics.average(), 81);
    }
}
