//! Keyword provider: `(industry, role) -> ordered keywords` for the analysis prompt.

use async_trait::async_trait;

use crate::benchmark::tables::{industry_or_general, RoleLevel};

#[async_trait]
pub trait KeywordProvider: Send + Sync {
    async fn keywords(&self, industry: &str, role: &str) -> Vec<String>;
}

/// Industry critical keywords followed by seniority keywords for the role, deduplicated.
pub struct StaticKeywordProvider;

#[async_trait]
impl KeywordProvider for StaticKeywordProvider {
    async fn keywords(&self, industry: &str, role: &str) -> Vec<String> {
        let standard = industry_or_general(industry);
        let level = RoleLevel::parse(role).unwrap_or(RoleLevel::Senior);

        let mut out: Vec<String> = Vec::new();
        for keyword in standard
            .critical_keywords
            .iter()
            .chain(role_keywords(level))
        {
            if !out.iter().any(|k| k.eq_ignore_ascii_case(keyword)) {
                out.push(keyword.to_string());
            }
        }
        out
    }
}

fn role_keywords(level: RoleLevel) -> &'static [&'static str] {
    match level {
        RoleLevel::Entry => &[
            "entry level", "junior", "assistant", "trainee", "intern", "graduate",
        ],
        RoleLevel::Mid => &[
            "mid level", "experienced", "specialist", "coordinator", "analyst", "consultant",
        ],
        RoleLevel::Senior => &[
            "senior", "lead", "principal", "expert", "specialist", "consultant", "advisor",
        ],
        RoleLevel::Lead => &["lead", "team lead", "senior", "principal", "architect", "manager"],
        RoleLevel::Principal => &[
            "principal", "senior", "architect", "expert", "consultant", "advisor",
        ],
    }
}
