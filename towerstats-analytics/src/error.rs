use thiserror::Error;

/// Errors raised when a textual option (CLI flag, config value) does not
/// name a known variant.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown run type '{0}' (expected farm, tournament or milestone)")]
    RunType(String),
    #[error("unknown period duration '{0}' (expected per-run, daily, weekly, monthly or yearly)")]
    Duration(String),
    #[error("unknown aggregation '{0}' (expected max, p50, p75, p90 or p99)")]
    Aggregation(String),
    #[error("unknown trend aggregation '{0}' (expected sum, average, min or max)")]
    TrendAggregation(String),
    #[error("invalid tier '{0}' (expected 'all' or a positive integer)")]
    Tier(String),
    #[error("unknown category '{0}'")]
    Category(String),
}
