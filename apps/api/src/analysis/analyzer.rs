//! Dual-Model Analyzer: cache check, keyword lookup, concurrent backend calls,
//! reconciliation and benchmark annotation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::analysis::backends::{AnalysisBackend, BackendError, BackendRequest, PromptProfile};
use crate::analysis::keywords::KeywordProvider;
use crate::analysis::models::{AnalysisMode, BackendScoreReport, ScoreReport};
use crate::analysis::prompts::{fast_prompt, full_prompt};
use crate::analysis::reconcile::{reconcile, NamedReport};
use crate::benchmark;
use crate::cache::{content_key, CacheStats, TtlCache};
use crate::llm_client::truncate;

pub struct DualModelAnalyzer {
    primary: Arc<dyn AnalysisBackend>,
    /// Also the single backend used in fast mode.
    secondary: Arc<dyn AnalysisBackend>,
    keywords: Arc<dyn KeywordProvider>,
    backend_timeout: Duration,
    results: TtlCache<ScoreReport>,
    keyword_cache: TtlCache<Arc<Vec<String>>>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerCacheStats {
    #[serde(flatten)]
    pub results: CacheStats,
    pub keywords: CacheStats,
}

impl DualModelAnalyzer {
    pub fn new(
        primary: Arc<dyn AnalysisBackend>,
        secondary: Arc<dyn AnalysisBackend>,
        keywords: Arc<dyn KeywordProvider>,
        backend_timeout: Duration,
        cache_max_size: usize,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            primary,
            secondary,
            keywords,
            backend_timeout,
            results: TtlCache::new(cache_max_size, cache_ttl),
            keyword_cache: TtlCache::new(cache_max_size, cache_ttl),
        }
    }

    /// Never fails: total backend failure yields the fallback report, which is
    /// benchmarked but not cached.
    pub async fn analyze(
        &self,
        resume_text: &str,
        industry: &str,
        role: &str,
        mode: AnalysisMode,
    ) -> ScoreReport {
        let key = content_key("analysis-", &[resume_text, industry, role]);
        if let Some(mut cached) = self.results.get(&key) {
            info!("Returning cached analysis for {industry}/{role}");
            cached.cached = true;
            return cached;
        }

        let keywords = self.keywords_for(industry, role).await;
        let started = Instant::now();

        let mut report = match mode {
            AnalysisMode::Fast => {
                let request = BackendRequest {
                    prompt: fast_prompt(resume_text, industry, role, &keywords),
                    profile: PromptProfile::Fast,
                };
                let outcome = self.call(self.secondary.as_ref(), &request).await;
                let named = outcome.map(|r| {
                    NamedReport::new(format!("{} (Fast Mode)", self.secondary.name()), r)
                });
                reconcile(None, named, mode)
            }
            AnalysisMode::Comprehensive => {
                let request = BackendRequest {
                    prompt: full_prompt(resume_text, industry, role, &keywords),
                    profile: PromptProfile::Full,
                };
                let (primary, secondary) = tokio::join!(
                    self.call(self.primary.as_ref(), &request),
                    self.call(self.secondary.as_ref(), &request),
                );
                reconcile(
                    primary.map(|r| NamedReport::new(self.primary.name(), r)),
                    secondary.map(|r| NamedReport::new(self.secondary.name(), r)),
                    mode,
                )
            }
        };

        report.industry_benchmark = Some(benchmark::compare(&report, resume_text, industry, role));

        info!(
            "Analysis ({:?}) finished in {}ms: score={} grade={} models={:?}",
            mode,
            started.elapsed().as_millis(),
            report.ats_score,
            report.overall_grade.as_str(),
            report.models_used
        );

        if report.is_fallback() {
            warn!("All analysis backends failed; returning fallback report uncached");
        } else {
            self.results.put(key, report.clone());
        }
        report
    }

    /// One backend call under its own deadline. Failures are logged and become `None`.
    async fn call(
        &self,
        backend: &dyn AnalysisBackend,
        request: &BackendRequest,
    ) -> Option<BackendScoreReport> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.backend_timeout, backend.analyze(request))
            .await
            .unwrap_or_else(|_| Err(BackendError::Timeout(self.backend_timeout)));
        let duration_ms = started.elapsed().as_millis();

        match result {
            Ok(report) => {
                debug!("Backend {} answered in {duration_ms}ms", backend.name());
                Some(report)
            }
            Err(e) => {
                warn!(
                    "Backend {} failed after {duration_ms}ms: {}",
                    backend.name(),
                    truncate(&e.to_string(), 200)
                );
                None
            }
        }
    }

    async fn keywords_for(&self, industry: &str, role: &str) -> Arc<Vec<String>> {
        let key = format!("keywords-{industry}-{role}");
        if let Some(keywords) = self.keyword_cache.get(&key) {
            return keywords;
        }
        let keywords = Arc::new(self.keywords.keywords(industry, role).await);
        debug!("Loaded {} keywords for {industry}/{role}", keywords.len());
        self.keyword_cache.put(key, keywords.clone());
        keywords
    }

    pub fn cache_stats(&self) -> AnalyzerCacheStats {
        AnalyzerCacheStats {
            results: self.results.stats(),
            keywords: self.keyword_cache.stats(),
        }
    }

    pub fn clear_caches(&self) {
        self.results.clear();
        self.keyword_cache.clear();
        info!("Analysis caches cleared");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::analysis::models::{Grade, FALLBACK_MODEL};

    enum Behaviour {
        Score(u32),
        Hang,
        Garbage,
    }

    struct FakeBackend {
        name: &'static str,
        behaviour: Behaviour,
        calls: AtomicUsize,
        last_profile: parking_lot::Mutex<Option<PromptProfile>>,
    }

    impl FakeBackend {
        fn new(name: &'static str, behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                name,
                behaviour,
                calls: AtomicUsize::new(0),
                last_profile: parking_lot::Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisBackend for FakeBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn analyze(&self, request: &BackendRequest) -> Result<BackendScoreReport, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_profile.lock() = Some(request.profile);
            match self.behaviour {
                Behaviour::Score(score) => Ok(serde_json::from_str(&format!(
                    r#"{{"atsScore": {score}, "overallGrade": "A+", "strengths": ["{}"]}}"#,
                    self.name
                ))
                .unwrap()),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("the analyzer deadline fires first")
                }
                Behaviour::Garbage => Err(BackendError::Malformed("not json".into())),
            }
        }
    }

    struct FixedKeywords(AtomicUsize);

    #[async_trait]
    impl KeywordProvider for FixedKeywords {
        async fn keywords(&self, _industry: &str, _role: &str) -> Vec<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            vec!["rust".into(), "tokio".into()]
        }
    }

    fn analyzer(
        primary: Arc<FakeBackend>,
        secondary: Arc<FakeBackend>,
    ) -> (DualModelAnalyzer, Arc<FixedKeywords>) {
        let keywords = Arc::new(FixedKeywords(AtomicUsize::new(0)));
        let analyzer = DualModelAnalyzer::new(
            primary,
            secondary,
            keywords.clone(),
            Duration::from_secs(30),
            10,
            Duration::from_secs(3600),
        );
        (analyzer, keywords)
    }

    const RESUME: &str = "Experience\nBuilt services in Rust\nEducation\nBSc\nSkills\nRust, SQL";

    #[tokio::test(start_paused = true)]
    async fn test_both_backends_are_averaged_and_cached() {
        let primary = FakeBackend::new("Claude Sonnet 4", Behaviour::Score(80));
        let secondary = FakeBackend::new("GPT-4o", Behaviour::Score(90));
        let (analyzer, keywords) = analyzer(primary.clone(), secondary.clone());

        let first = analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        assert_eq!(first.ats_score, 85);
        assert_eq!(first.overall_grade, Grade::BPlus);
        assert_eq!(first.strengths, vec!["Claude Sonnet 4"]);
        assert!(!first.cached);
        assert!(first.industry_benchmark.is_some());

        let second = analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        assert!(second.cached);
        assert_eq!(second.ats_score, 85);
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
        assert_eq!(keywords.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_backend_does_not_block_the_other() {
        let primary = FakeBackend::new("Claude Sonnet 4", Behaviour::Hang);
        let secondary = FakeBackend::new("GPT-4o", Behaviour::Score(72));
        let (analyzer, _) = analyzer(primary, secondary);

        let report = analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        assert_eq!(report.ats_score, 72);
        assert_eq!(report.overall_grade, Grade::C);
        assert_eq!(report.models_used, vec!["GPT-4o"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_is_fallback_and_not_cached() {
        let primary = FakeBackend::new("Claude Sonnet 4", Behaviour::Garbage);
        let secondary = FakeBackend::new("GPT-4o", Behaviour::Hang);
        let (analyzer, _) = analyzer(primary.clone(), secondary);

        let report = analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        assert_eq!(report.ats_score, 50);
        assert_eq!(report.overall_grade, Grade::C);
        assert_eq!(report.models_used, vec![FALLBACK_MODEL]);
        assert_eq!(analyzer.cache_stats().results.size, 0);

        analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_mode_calls_only_the_secondary() {
        let primary = FakeBackend::new("Claude Sonnet 4", Behaviour::Score(80));
        let secondary = FakeBackend::new("GPT-4o", Behaviour::Score(64));
        let (analyzer, _) = analyzer(primary.clone(), secondary.clone());

        let report = analyzer
            .analyze(RESUME, "finance", "Mid", AnalysisMode::Fast)
            .await;
        assert_eq!(primary.calls(), 0);
        assert_eq!(*secondary.last_profile.lock(), Some(PromptProfile::Fast));
        assert_eq!(report.models_used, vec!["GPT-4o (Fast Mode)"]);
        assert_eq!(report.analysis_mode, AnalysisMode::Fast);
        assert_eq!(report.overall_grade, Grade::D);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_result_expires_and_clear_empties() {
        let primary = FakeBackend::new("Claude Sonnet 4", Behaviour::Score(80));
        let secondary = FakeBackend::new("GPT-4o", Behaviour::Score(80));
        let (analyzer, _) = analyzer(primary.clone(), secondary);

        analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        tokio::time::advance(Duration::from_secs(3601)).await;
        let again = analyzer
            .analyze(RESUME, "technology", "Senior", AnalysisMode::Comprehensive)
            .await;
        assert!(!again.cached);
        assert_eq!(primary.calls(), 2);

        analyzer.clear_caches();
        assert_eq!(analyzer.cache_stats().results.size, 0);
        assert_eq!(analyzer.cache_stats().keywords.size, 0);
    }
}
