//! Static industry and role-level standards.

use serde::Serialize;

use crate::analysis::models::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricStandard {
    pub average: u8,
    pub excellent: u8,
    pub poor: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoleLevel {
    Entry,
    Mid,
    Senior,
    Lead,
    Principal,
}

impl RoleLevel {
    /// Case-insensitive; a few common titles map onto the five levels.
    pub fn parse(role: &str) -> Option<Self> {
        match role.trim().to_ascii_lowercase().as_str() {
            "entry" | "entry-level" | "junior" | "intern" | "graduate" => Some(Self::Entry),
            "mid" | "mid-level" | "intermediate" => Some(Self::Mid),
            "senior" => Some(Self::Senior),
            "lead" | "staff" => Some(Self::Lead),
            "principal" | "director" => Some(Self::Principal),
            _ => None,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Entry => 0,
            Self::Mid => 1,
            Self::Senior => 2,
            Self::Lead => 3,
            Self::Principal => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleStandard {
    pub average_score: u8,
    pub top_score: u8,
}

#[derive(Debug)]
pub struct IndustryStandard {
    pub key: &'static str,
    pub name: &'static str,
    pub average_score: u8,
    pub top_score: u8,
    pub bottom_score: u8,
    /// Indexed like `Metric::ALL`.
    pub metrics: [MetricStandard; 5],
    pub critical_keywords: &'static [&'static str],
    /// Indexed Entry, Mid, Senior, Lead, Principal.
    pub roles: [RoleStandard; 5],
}

impl IndustryStandard {
    pub fn role(&self, level: RoleLevel) -> RoleStandard {
        self.roles[level.index()]
    }

    pub fn metric(&self, metric: Metric) -> MetricStandard {
        let index = Metric::ALL
            .iter()
            .position(|m| *m == metric)
            .unwrap_or_default();
        self.metrics[index]
    }
}

const fn m(average: u8, excellent: u8, poor: u8) -> MetricStandard {
    MetricStandard {
        average,
        excellent,
        poor,
    }
}

const fn r(average_score: u8, top_score: u8) -> RoleStandard {
    RoleStandard {
        average_score,
        top_score,
    }
}

pub static INDUSTRIES: [IndustryStandard; 6] = [
    IndustryStandard {
        key: "technology",
        name: "Technology",
        average_score: 75,
        top_score: 90,
        bottom_score: 45,
        metrics: [m(85, 95, 60), m(70, 85, 40), m(80, 95, 50), m(75, 90, 45), m(65, 85, 30)],
        critical_keywords: &[
            "software development", "programming", "coding", "algorithms", "data structures",
            "machine learning", "artificial intelligence", "cloud computing", "devops", "agile",
            "scrum", "python", "javascript", "react", "node.js", "sql", "git", "docker",
            "kubernetes", "aws", "azure", "gcp", "api", "microservices", "database",
        ],
        roles: [r(65, 80), r(75, 88), r(82, 92), r(85, 95), r(88, 97)],
    },
    IndustryStandard {
        key: "healthcare",
        name: "Healthcare",
        average_score: 78,
        top_score: 92,
        bottom_score: 50,
        metrics: [m(90, 98, 70), m(75, 88, 45), m(85, 95, 60), m(80, 92, 50), m(70, 85, 35)],
        critical_keywords: &[
            "patient care", "medical", "clinical", "healthcare", "diagnosis", "treatment",
            "nursing", "physician", "hospital", "clinic", "pharmaceutical", "therapy",
            "surgery", "emergency", "critical care", "pediatrics", "oncology", "cardiology",
            "neurology", "radiology", "laboratory", "research", "clinical trials", "HIPAA",
        ],
        roles: [r(70, 85), r(78, 90), r(85, 95), r(88, 97), r(90, 98)],
    },
    IndustryStandard {
        key: "finance",
        name: "Finance",
        average_score: 80,
        top_score: 93,
        bottom_score: 55,
        metrics: [m(88, 96, 65), m(78, 90, 50), m(87, 96, 65), m(82, 94, 55), m(75, 90, 40)],
        critical_keywords: &[
            "financial analysis", "investment", "portfolio", "risk management", "compliance",
            "audit", "accounting", "budgeting", "forecasting", "trading", "banking",
            "credit", "derivatives", "equity", "bonds", "securities", "valuation",
            "mergers", "acquisitions", "CFA", "CPA", "FRM", "regulatory", "Basel",
        ],
        roles: [r(72, 87), r(80, 92), r(87, 96), r(90, 98), r(92, 99)],
    },
    IndustryStandard {
        key: "marketing",
        name: "Marketing",
        average_score: 73,
        top_score: 88,
        bottom_score: 48,
        metrics: [m(82, 93, 58), m(72, 85, 42), m(78, 90, 52), m(76, 88, 48), m(68, 82, 35)],
        critical_keywords: &[
            "digital marketing", "social media", "content marketing", "SEO", "SEM",
            "PPC", "email marketing", "campaign", "brand", "analytics", "ROI",
            "conversion", "lead generation", "customer acquisition", "market research",
            "strategy", "advertising", "public relations", "influencer", "automation",
        ],
        roles: [r(65, 80), r(73, 86), r(80, 92), r(83, 95), r(85, 97)],
    },
    IndustryStandard {
        key: "sales",
        name: "Sales",
        average_score: 76,
        top_score: 89,
        bottom_score: 52,
        metrics: [m(84, 94, 62), m(74, 87, 45), m(80, 92, 55), m(78, 90, 50), m(72, 88, 38)],
        critical_keywords: &[
            "sales", "revenue", "quota", "prospecting", "lead generation", "CRM",
            "pipeline", "closing", "negotiation", "relationship", "client", "customer",
            "territory", "account management", "business development", "partnership",
            "consultative selling", "solution selling", "cold calling", "presentation",
        ],
        roles: [r(68, 82), r(76, 88), r(83, 93), r(86, 96), r(88, 98)],
    },
    IndustryStandard {
        key: "general",
        name: "General",
        average_score: 70,
        top_score: 85,
        bottom_score: 45,
        metrics: [m(80, 92, 55), m(65, 80, 40), m(75, 88, 50), m(70, 85, 45), m(60, 78, 30)],
        critical_keywords: &[
            "leadership", "management", "communication", "problem solving", "teamwork",
            "project management", "analytical", "strategic", "collaboration", "innovation",
            "results", "achievement", "growth", "improvement", "efficiency", "quality",
        ],
        roles: [r(60, 75), r(70, 83), r(77, 88), r(80, 92), r(82, 95)],
    },
];

pub fn general() -> &'static IndustryStandard {
    &INDUSTRIES[INDUSTRIES.len() - 1]
}

/// Exact (case-insensitive) industry lookup.
pub fn find_industry(industry: &str) -> Option<&'static IndustryStandard> {
    let wanted = industry.trim();
    INDUSTRIES
        .iter()
        .find(|i| i.key.eq_ignore_ascii_case(wanted) || i.name.eq_ignore_ascii_case(wanted))
}

/// Industry lookup falling back to the general table.
pub fn industry_or_general(industry: &str) -> &'static IndustryStandard {
    find_industry(industry).unwrap_or_else(general)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_curve_is_strictly_increasing() {
        for industry in &INDUSTRIES {
            for level in [
                RoleLevel::Entry,
                RoleLevel::Mid,
                RoleLevel::Senior,
                RoleLevel::Lead,
                RoleLevel::Principal,
            ] {
                let role = industry.role(level);
                assert!(industry.bottom_score < role.average_score, "{} {:?}", industry.key, level);
                assert!(role.average_score < role.top_score, "{} {:?}", industry.key, level);
                assert!(role.top_score < 100);
            }
            for standard in industry.metrics {
                assert!(standard.poor < standard.average && standard.average < standard.excellent);
            }
        }
    }

    #[test]
    fn test_lookups_fall_back_to_general() {
        assert_eq!(industry_or_general("Finance").key, "finance");
        assert_eq!(industry_or_general("underwater basket weaving").key, "general");
        assert_eq!(RoleLevel::parse("SENIOR"), Some(RoleLevel::Senior));
        assert_eq!(RoleLevel::parse("junior"), Some(RoleLevel::Entry));
        assert_eq!(RoleLevel::parse("wizard"), None);
    }

    #[test]
    fn test_metric_lookup_follows_metric_order() {
        let tech = industry_or_general("technology");
        assert_eq!(tech.metric(Metric::SectionCompleteness).average, 85);
        assert_eq!(tech.metric(Metric::QuantifiedAchievements).poor, 30);
    }
}
