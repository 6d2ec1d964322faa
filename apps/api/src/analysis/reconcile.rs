//! Reconciliation: folds up to two backend replies into one `ScoreReport`.
//!
//! Both succeed: every number is the rounded mean of the two, after filling a
//! sub-score missing from one reply with the other reply's value (and missing from
//! both, with that reply's own overall score). Text fields come from the primary
//! unless it left them empty. One succeeds: its reply alone, under its own name.
//! Neither: `ScoreReport::fallback`. The grade is always recomputed from the score.

use tracing::debug;

use crate::analysis::models::{
    AnalysisMode, BackendScoreReport, DetailedMetrics, Grade, Metric, ScoreReport,
};

/// A validated reply together with the name it is reported under.
#[derive(Debug, Clone)]
pub struct NamedReport {
    pub name: String,
    pub report: BackendScoreReport,
}

impl NamedReport {
    pub fn new(name: impl Into<String>, report: BackendScoreReport) -> Self {
        Self {
            name: name.into(),
            report,
        }
    }
}

pub fn reconcile(
    primary: Option<NamedReport>,
    secondary: Option<NamedReport>,
    mode: AnalysisMode,
) -> ScoreReport {
    // A reply with no overall score cannot be placed on the scale at all.
    let primary = primary.filter(|r| r.report.overall().is_some());
    let secondary = secondary.filter(|r| r.report.overall().is_some());

    match (primary, secondary) {
        (Some(p), Some(s)) => combine(p, s, mode),
        (Some(one), None) | (None, Some(one)) => single(one, mode),
        (None, None) => ScoreReport::fallback(mode),
    }
}

fn single(named: NamedReport, mode: AnalysisMode) -> ScoreReport {
    let r = &named.report;
    let overall = r.overall().unwrap_or_default();

    let detailed_metrics = metrics_from(|m| r.detailed_metrics.get(m).unwrap_or(overall));
    let ats_score = to_score(overall);
    note_claimed_grade(&named, Grade::from_score(ats_score));

    ScoreReport {
        ats_score,
        overall_grade: Grade::from_score(ats_score),
        metrics_average: detailed_metrics.average(),
        detailed_metrics,
        quick_stats: r.quick_stats,
        strengths: r.strengths.clone(),
        weaknesses: r.weaknesses.clone(),
        recommendations: r.recommendations.clone(),
        detailed_insights: r.detailed_insights.clone(),
        industry_alignment: to_score(r.industry_alignment.unwrap_or(overall)),
        content_quality: to_score(r.content_quality.unwrap_or(overall)),
        models_used: vec![named.name],
        analysis_mode: mode,
        cached: false,
        industry_benchmark: None,
    }
}

fn combine(primary: NamedReport, secondary: NamedReport, mode: AnalysisMode) -> ScoreReport {
    let p = &primary.report;
    let s = &secondary.report;
    let p_overall = p.overall().unwrap_or_default();
    let s_overall = s.overall().unwrap_or_default();

    let detailed_metrics = metrics_from(|m| {
        let p_value = p.detailed_metrics.get(m);
        let s_value = s.detailed_metrics.get(m);
        mean(
            p_value.or(s_value).unwrap_or(p_overall),
            s_value.or(p_value).unwrap_or(s_overall),
        )
    });
    let ats_score = to_score(mean(p_overall, s_overall));
    note_claimed_grade(&primary, Grade::from_score(ats_score));
    note_claimed_grade(&secondary, Grade::from_score(ats_score));

    let industry_alignment = mean(
        p.industry_alignment.or(s.industry_alignment).unwrap_or(p_overall),
        s.industry_alignment.or(p.industry_alignment).unwrap_or(s_overall),
    );
    let content_quality = mean(
        p.content_quality.or(s.content_quality).unwrap_or(p_overall),
        s.content_quality.or(p.content_quality).unwrap_or(s_overall),
    );

    ScoreReport {
        ats_score,
        overall_grade: Grade::from_score(ats_score),
        metrics_average: detailed_metrics.average(),
        detailed_metrics,
        quick_stats: p.quick_stats.or(s.quick_stats),
        strengths: prefer_primary(&p.strengths, &s.strengths),
        weaknesses: prefer_primary(&p.weaknesses, &s.weaknesses),
        recommendations: prefer_primary(&p.recommendations, &s.recommendations),
        detailed_insights: p
            .detailed_insights
            .clone()
            .or_else(|| s.detailed_insights.clone()),
        industry_alignment: to_score(industry_alignment),
        content_quality: to_score(content_quality),
        models_used: vec![primary.name, secondary.name],
        analysis_mode: mode,
        cached: false,
        industry_benchmark: None,
    }
}

fn note_claimed_grade(named: &NamedReport, grade: Grade) {
    if let Some(claimed) = &named.report.overall_grade {
        if claimed.as_str() != Some(grade.as_str()) {
            debug!(
                "{} claimed grade {claimed}; combined score grades as {}",
                named.name,
                grade.as_str()
            );
        }
    }
}

fn metrics_from(mut value: impl FnMut(Metric) -> f64) -> DetailedMetrics {
    let mut scores = [0u8; 5];
    for (slot, metric) in scores.iter_mut().zip(Metric::ALL) {
        *slot = to_score(value(metric));
    }
    DetailedMetrics::from_array(scores)
}

fn mean(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

fn to_score(value: f64) -> u8 {
    value.clamp(0.0, 100.0).round() as u8
}

fn prefer_primary(primary: &[String], secondary: &[String]) -> Vec<String> {
    if primary.is_empty() {
        secondary.to_vec()
    } else {
        primary.to_vec()
    }
}
