//! Towerstats Analytics
//!
//! Aggregation core for recorded tower-defense runs: per-period source
//! breakdowns with discrepancy detection, per-tier statistics with
//! percentile-aware hourly rates, and trend detection across period windows.
//! Every calculation is a pure function over borrowed runs; loading and
//! presentation live outside this crate.

pub mod breakdown;
pub mod categories;
pub mod error;
pub mod fields;
pub mod filters;
pub mod grouping;
pub mod numbers;
pub mod parse;
pub mod percentiles;
pub mod period;
pub mod run;
pub mod tier_stats;
pub mod trends;

// Re-export commonly used types
pub use breakdown::{
    DISCREPANCY_TOLERANCE, DiscrepancyKind, PeriodSourceBreakdown, SourceAnalysisData,
    SourceSummary, SourceValue, calculate_period_breakdown, calculate_source_analysis,
    calculate_summary,
};
pub use categories::{
    CategoryConfigError, CategoryDefinition, CategoryId, CategoryRegistry, SourceField,
};
pub use error::ParseError;
pub use fields::{FIELD_ALIASES, extract_value, numeric_field_names, numeric_value};
pub use filters::{RunFilters, RunTypeFilter, SourceAnalysisFilters, TierFilter, filter_runs};
pub use grouping::{PeriodGroup, group_by_period, limit_to_periods};
pub use percentiles::{FieldPercentiles, Percentile, PercentileValue, field_percentiles};
pub use period::{PeriodDuration, parse_period_key, period_key, period_label};
pub use run::{FieldValue, Run, RunField, RunRef, RunType};
pub use tier_stats::{
    Aggregation, FieldStats, TierStats, calculate_tier_stats, cell_value, field_stats,
};
pub use trends::{
    FieldTrendData, TierTrendsAnalysis, TrendAggregation, TrendDirection, TrendFilters,
    TrendShape, TrendSummary, calculate_field_trend, calculate_tier_trends,
};

/// Supplies the runs every analysis reads.
/// Storage and import formats provide this
pub trait RunSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load every recorded run
    ///
    /// # Errors
    ///
    /// Returns an error if the runs cannot be read or decoded.
    fn load_runs(&self) -> Result<Vec<Run>, Self::Error>;
}

/// Bundles a run source with the category table analyses resolve against
pub struct AnalyticsEngine<S>
where
    S: RunSource,
{
    source: S,
    categories: CategoryRegistry,
}

impl<S> AnalyticsEngine<S>
where
    S: RunSource,
{
    /// Create an engine reading from `source` and resolving categories in `categories`
    pub const fn new(source: S, categories: CategoryRegistry) -> Self {
        Self { source, categories }
    }

    #[must_use]
    pub const fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    /// Source breakdown of `category` over the filtered period window
    ///
    /// # Errors
    ///
    /// Returns an error if the runs cannot be loaded.
    pub fn source_analysis(
        &self,
        category: CategoryId,
        filters: &SourceAnalysisFilters,
    ) -> Result<SourceAnalysisData, S::Error> {
        let runs = self.source.load_runs()?;
        Ok(calculate_source_analysis(
            &runs,
            self.categories.get(category),
            filters,
        ))
    }

    /// Per-tier field statistics, highest tier first
    ///
    /// # Errors
    ///
    /// Returns an error if the runs cannot be loaded.
    pub fn tier_stats(&self, filters: &RunFilters) -> Result<Vec<TierStats>, S::Error> {
        let runs = self.source.load_runs()?;
        Ok(calculate_tier_stats(&runs, filters))
    }

    /// Significant field trends for one tier
    ///
    /// # Errors
    ///
    /// Returns an error if the runs cannot be loaded.
    pub fn tier_trends(&self, filters: &TrendFilters) -> Result<TierTrendsAnalysis, S::Error> {
        let runs = self.source.load_runs()?;
        Ok(calculate_tier_trends(&runs, filters))
    }
}
