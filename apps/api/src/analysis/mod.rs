//! Analysis: turns resume text into a reconciled, benchmarked `ScoreReport`.

pub mod analyzer;
pub mod backends;
pub mod keywords;
pub mod models;
pub mod prompts;
pub mod reconcile;

pub use analyzer::DualModelAnalyzer;
