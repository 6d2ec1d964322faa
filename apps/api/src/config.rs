use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::parsing::CascadeMode;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Root under which every parse request creates (and removes) its own temp dir.
    pub work_dir: PathBuf,
    pub cascade_mode: CascadeMode,
    pub ai_structuring: bool,
    pub backend_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_max_size: usize,
    pub pipeline: PipelineLimits,
    pub progress_retention: Duration,
    pub progress_sweep_interval: Duration,
}

/// Outer deadline policy for one analysis request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineLimits {
    pub base: Duration,
    pub fast_base: Duration,
    pub per_mb: Duration,
    pub max: Duration,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            fast_base: Duration::from_secs(30),
            per_mb: Duration::from_secs(20),
            max: Duration::from_secs(120),
        }
    }
}

impl PipelineLimits {
    /// Deadline grows with document size; fast mode starts lower but shares the cap.
    pub fn deadline_for(&self, file_size: usize, fast_mode: bool) -> Duration {
        let base = if fast_mode { self.fast_base } else { self.base };
        let megabytes = file_size as f64 / (1024.0 * 1024.0);
        let extra = self.per_mb.mul_f64(megabytes);
        (base + extra).min(self.max)
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let tiered_floor: u8 = env_or("ATS_TIERED_QUALITY_FLOOR", 60)?;
        let cascade_mode = match std::env::var("ATS_CASCADE_MODE") {
            Ok(raw) => CascadeMode::parse(&raw, tiered_floor)
                .with_context(|| format!("ATS_CASCADE_MODE has unknown value '{raw}'"))?,
            Err(_) => CascadeMode::Exhaustive,
        };

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            work_dir: std::env::var("ATS_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| std::env::temp_dir().join("ats-work")),
            cascade_mode,
            ai_structuring: env_or("ATS_AI_STRUCTURING", true)?,
            backend_timeout: Duration::from_secs(env_or("ATS_BACKEND_TIMEOUT_SECS", 30)?),
            cache_ttl: Duration::from_secs(env_or("ATS_CACHE_TTL_SECS", 3600)?),
            cache_max_size: env_or("ATS_CACHE_MAX_SIZE", 1000)?,
            pipeline: PipelineLimits {
                base: Duration::from_secs(env_or("ATS_PIPELINE_TIMEOUT_SECS", 60)?),
                fast_base: Duration::from_secs(env_or("ATS_FAST_PIPELINE_TIMEOUT_SECS", 30)?),
                per_mb: Duration::from_secs(env_or("ATS_PIPELINE_TIMEOUT_PER_MB_SECS", 20)?),
                max: Duration::from_secs(env_or("ATS_PIPELINE_TIMEOUT_MAX_SECS", 120)?),
            },
            progress_retention: Duration::from_secs(env_or("ATS_PROGRESS_RETENTION_SECS", 3600)?),
            progress_sweep_interval: Duration::from_secs(env_or("ATS_PROGRESS_SWEEP_SECS", 1800)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} has invalid value '{raw}'"))
}
