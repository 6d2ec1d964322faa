//! Benchmark Service: places a combined score on an industry/role curve.
//!
//! Each curve has three points: `poor` (the industry's bottom score), `average` and
//! `excellent` (the role level's average and top scores). The percentile is a
//! piecewise-linear map over four bands, continuous and non-decreasing in the score:
//!
//! | score band            | percentile |
//! |-----------------------|------------|
//! | 0 → poor              | 0 → 25     |
//! | poor → average        | 25 → 50    |
//! | average → excellent   | 50 → 90    |
//! | excellent → 100       | 90 → 100   |
//!
//! Unknown industries use the general table; unknown role levels use Mid.

pub mod tables;

use serde::Serialize;

use crate::analysis::models::{Metric, ScoreReport};
use tables::{industry_or_general, IndustryStandard, MetricStandard, RoleLevel};

const MAX_MISSING_KEYWORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkCurve {
    pub poor: f64,
    pub average: f64,
    pub excellent: f64,
}

impl BenchmarkCurve {
    pub fn lookup(industry: &str, role: &str) -> (Self, &'static IndustryStandard, RoleLevel) {
        let standard = industry_or_general(industry);
        let level = RoleLevel::parse(role).unwrap_or(RoleLevel::Mid);
        let role_standard = standard.role(level);
        let curve = Self {
            poor: standard.bottom_score as f64,
            average: role_standard.average_score as f64,
            excellent: role_standard.top_score as f64,
        };
        (curve, standard, level)
    }

    pub fn percentile(&self, score: f64) -> f64 {
        let score = score.clamp(0.0, 100.0);
        let bands = [
            (0.0, self.poor, 0.0, 25.0),
            (self.poor, self.average, 25.0, 50.0),
            (self.average, self.excellent, 50.0, 90.0),
            (self.excellent, 100.0, 90.0, 100.0),
        ];
        for (lo, hi, p_lo, p_hi) in bands {
            if score <= hi {
                let width = hi - lo;
                if width <= 0.0 {
                    return p_hi;
                }
                return p_lo + (score - lo) / width * (p_hi - p_lo);
            }
        }
        100.0
    }

    pub fn label(&self, score: f64) -> PerformanceLabel {
        if score >= self.excellent {
            PerformanceLabel::Excellent
        } else if score >= self.average {
            PerformanceLabel::AboveAverage
        } else if score >= self.poor {
            PerformanceLabel::Average
        } else {
            PerformanceLabel::BelowAverage
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PerformanceLabel {
    #[serde(rename = "Below Average")]
    BelowAverage,
    Average,
    #[serde(rename = "Above Average")]
    AboveAverage,
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetricPerformance {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl MetricPerformance {
    fn rate(score: u8, standard: MetricStandard) -> Self {
        if score >= standard.excellent {
            Self::Excellent
        } else if score >= standard.average {
            Self::Good
        } else if score >= standard.poor {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricComparison {
    pub metric: &'static str,
    pub user_score: u8,
    pub industry_average: u8,
    pub excellent: u8,
    pub poor: u8,
    pub performance: MetricPerformance,
    pub difference: i16,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordCoverage {
    pub coverage: u8,
    pub found_keywords: Vec<&'static str>,
    /// At most ten, in table order.
    pub missing_keywords: Vec<&'static str>,
    pub total_keywords: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub industry: &'static str,
    pub role: RoleLevel,
    pub score: u8,
    pub percentile: u8,
    pub performance_label: PerformanceLabel,
    /// Role-level average; the curve's midpoint.
    pub industry_average: u8,
    /// Average and top score across all role levels of the industry.
    pub industry_wide_average: u8,
    pub industry_top_score: u8,
    pub poor_score: u8,
    pub excellent_score: u8,
    pub score_difference: i16,
    pub metric_comparisons: Vec<MetricComparison>,
    pub keyword_coverage: KeywordCoverage,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Compares a report against its industry/role curve. `resume_text` feeds the
/// critical-keyword coverage.
pub fn compare(report: &ScoreReport, resume_text: &str, industry: &str, role: &str) -> BenchmarkResult {
    let (curve, standard, level) = BenchmarkCurve::lookup(industry, role);
    let score = report.ats_score;
    let percentile = curve.percentile(score as f64).round() as u8;
    let label = curve.label(score as f64);
    let average = curve.average as u8;
    let score_difference = score as i16 - average as i16;

    let metric_comparisons: Vec<MetricComparison> = Metric::ALL
        .iter()
        .map(|&metric| {
            let standard = standard.metric(metric);
            let user_score = report.detailed_metrics.get(metric);
            MetricComparison {
                metric: metric.key(),
                user_score,
                industry_average: standard.average,
                excellent: standard.excellent,
                poor: standard.poor,
                performance: MetricPerformance::rate(user_score, standard),
                difference: user_score as i16 - standard.average as i16,
            }
        })
        .collect();

    let keyword_coverage = keyword_coverage(resume_text, standard.critical_keywords);
    let insights = insights(label, score_difference);
    let recommendations = recommendations(score, average, &metric_comparisons, &keyword_coverage);

    BenchmarkResult {
        industry: standard.name,
        role: level,
        score,
        percentile,
        performance_label: label,
        industry_average: average,
        industry_wide_average: standard.average_score,
        industry_top_score: standard.top_score,
        poor_score: curve.poor as u8,
        excellent_score: curve.excellent as u8,
        score_difference,
        metric_comparisons,
        keyword_coverage,
        insights,
        recommendations,
    }
}

pub fn keyword_coverage(resume_text: &str, keywords: &'static [&'static str]) -> KeywordCoverage {
    let haystack = resume_text.to_lowercase();
    let (found, missing): (Vec<&'static str>, Vec<&'static str>) = keywords
        .iter()
        .copied()
        .partition(|k| contains_term(&haystack, &k.to_lowercase()));

    let coverage = if keywords.is_empty() {
        0
    } else {
        (found.len() as f64 / keywords.len() as f64 * 100.0).round() as u8
    };

    KeywordCoverage {
        coverage,
        found_keywords: found,
        missing_keywords: missing.into_iter().take(MAX_MISSING_KEYWORDS).collect(),
        total_keywords: keywords.len(),
    }
}

/// Whole-term match: "api" matches "REST API" but not "capital".
pub fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let is_word = |c: char| c.is_alphanumeric();
    haystack.match_indices(term).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + term.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

fn insights(label: PerformanceLabel, score_difference: i16) -> Vec<String> {
    let mut insights: Vec<String> = match label {
        PerformanceLabel::Excellent => vec![
            "Your resume ranks in the top tier for this industry and role level.".into(),
            "You're well-positioned to compete for the most selective openings.".into(),
        ],
        PerformanceLabel::AboveAverage => vec![
            "Your resume performs above the average for this role level.".into(),
            "Minor improvements could move you into the top tier.".into(),
        ],
        PerformanceLabel::Average => vec![
            "Your resume meets baseline industry standards.".into(),
            "Focus on the weaker metrics to improve your competitive position.".into(),
        ],
        PerformanceLabel::BelowAverage => vec![
            "Your resume scores below the typical range for this industry.".into(),
            "Substantial improvements are needed to be competitive.".into(),
        ],
    };

    if score_difference > 5 {
        insights.push(format!(
            "You're {score_difference} points above the role-level average."
        ));
    } else if score_difference < -5 {
        insights.push(format!(
            "You're {} points below the role-level average.",
            -score_difference
        ));
    }
    insights
}

fn recommendations(
    score: u8,
    average: u8,
    metrics: &[MetricComparison],
    keywords: &KeywordCoverage,
) -> Vec<String> {
    let mut out = Vec::new();

    if score < average {
        out.push(format!(
            "Focus on reaching the industry average of {average} points."
        ));
    }

    for comparison in metrics.iter().filter(|c| c.performance == MetricPerformance::Poor) {
        let label = Metric::ALL
            .iter()
            .find(|m| m.key() == comparison.metric)
            .map(|m| m.label())
            .unwrap_or(comparison.metric);
        out.push(format!(
            "Improve {label}: currently {}% vs industry average {}%.",
            comparison.user_score, comparison.industry_average
        ));
    }

    if keywords.coverage < 50 {
        out.push(format!(
            "Increase keyword coverage: currently {}% of industry keywords found.",
            keywords.coverage
        ));
        if !keywords.missing_keywords.is_empty() {
            let examples: Vec<&str> = keywords.missing_keywords.iter().take(3).copied().collect();
            out.push(format!(
                "Consider adding keywords like: {}.",
                examples.join(", ")
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::models::{AnalysisMode, DetailedMetrics, Grade};

    fn report(score: u8, metrics: DetailedMetrics) -> ScoreReport {
        let mut report = ScoreReport::fallback(AnalysisMode::Comprehensive);
        report.ats_score = score;
        report.overall_grade = Grade::from_score(score);
        report.detailed_metrics = metrics;
        report
    }

    #[test]
    fn test_percentile_hits_band_boundaries() {
        let (curve, _, _) = BenchmarkCurve::lookup("technology", "Senior");
        assert_eq!(curve, BenchmarkCurve { poor: 45.0, average: 82.0, excellent: 92.0 });
        assert_eq!(curve.percentile(0.0), 0.0);
        assert_eq!(curve.percentile(45.0), 25.0);
        assert_eq!(curve.percentile(82.0), 50.0);
        assert_eq!(curve.percentile(92.0), 90.0);
        assert_eq!(curve.percentile(100.0), 100.0);
    }

    #[test]
    fn test_percentile_is_monotonic_for_every_curve() {
        for industry in ["technology", "healthcare", "finance", "marketing", "sales", "general", "??"] {
            for role in ["Entry", "Mid", "Senior", "Lead", "Principal", "??"] {
                let (curve, _, _) = BenchmarkCurve::lookup(industry, role);
                let mut previous = -1.0;
                for tenth in 0..=1000 {
                    let p = curve.percentile(tenth as f64 / 10.0);
                    assert!(p >= previous, "{industry}/{role} at {}", tenth as f64 / 10.0);
                    assert!((0.0..=100.0).contains(&p));
                    previous = p;
                }
            }
        }
    }

    #[test]
    fn test_labels_follow_bands() {
        let (curve, _, _) = BenchmarkCurve::lookup("general", "Mid");
        // general/Mid: poor 45, average 70, excellent 83
        assert_eq!(curve.label(30.0), PerformanceLabel::BelowAverage);
        assert_eq!(curve.label(45.0), PerformanceLabel::Average);
        assert_eq!(curve.label(70.0), PerformanceLabel::AboveAverage);
        assert_eq!(curve.label(83.0), PerformanceLabel::Excellent);
    }

    #[test]
    fn test_unknown_industry_and_role_use_defaults() {
        let (curve, standard, level) = BenchmarkCurve::lookup("astrology", "overlord");
        assert_eq!(standard.key, "general");
        assert_eq!(level, RoleLevel::Mid);
        assert_eq!(curve.average, 70.0);
    }

    #[test]
    fn test_compare_builds_recommendations_for_weak_resume() {
        let weak = report(40, DetailedMetrics::from_array([50, 30, 70, 60, 20]));
        let result = compare(&weak, "Python and SQL developer", "technology", "Mid");

        assert_eq!(result.industry, "Technology");
        assert_eq!(result.performance_label, PerformanceLabel::BelowAverage);
        assert_eq!(result.score_difference, 40 - 75);
        assert!(result.recommendations[0].contains("industry average of 75"));
        assert!(result
            .recommendations
            .iter()
            .any(|r| r.starts_with("Improve keyword density")));
        assert!(result.keyword_coverage.found_keywords.contains(&"python"));
        assert!(result.keyword_coverage.found_keywords.contains(&"sql"));
        assert_eq!(result.keyword_coverage.missing_keywords.len(), 10);
        assert!(result.insights.iter().any(|i| i.contains("35 points below")));
    }

    #[test]
    fn test_compare_strong_resume_has_no_score_recommendation() {
        let strong = report(97, DetailedMetrics::uniform(96));
        let result = compare(&strong, "", "finance", "Senior");
        assert_eq!(result.performance_label, PerformanceLabel::Excellent);
        assert!(result.percentile >= 90);
        assert!(result
            .metric_comparisons
            .iter()
            .all(|c| c.performance == MetricPerformance::Excellent));
        assert_eq!(result.keyword_coverage.coverage, 0);
        assert!(!result.recommendations.iter().any(|r| r.contains("industry average of")));
    }

    #[test]
    fn test_contains_term_respects_word_boundaries() {
        assert!(contains_term("built a rest api in go", "api"));
        assert!(!contains_term("venture capital", "api"));
        assert!(contains_term("node.js, react", "node.js"));
        assert!(!contains_term("anything", ""));
    }
}
