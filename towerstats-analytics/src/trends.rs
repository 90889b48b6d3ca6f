//! Change detection across a window of periods for one tier.
//!
//! Every numeric field seen in the window becomes a value series (one point
//! per period, missing values count as 0). The series' first and last
//! points give the change and direction; the consecutive deltas give the
//! shape. Fields that moved less than the caller's threshold are dropped.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::fields::{extract_value, numeric_field_names};
use crate::filters::{RunFilters, RunTypeFilter, TierFilter, filter_runs};
use crate::grouping::{group_by_period, limit_to_periods};
use crate::numbers::usize_to_f64;
use crate::period::{PeriodDuration, period_label};
use crate::run::Run;

/// Percent changes smaller than this (in absolute value) count as stable.
pub const STABLE_PERCENT: f64 = 0.1;

/// Share of deltas that must agree for a directional or flat shape.
const DOMINANT_SHARE: f64 = 0.7;

/// Share of sign flips between consecutive deltas that marks a series volatile.
const VOLATILE_SHARE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Stable => "stable",
        }
    }

    fn from_percent(percent_change: f64) -> Self {
        if percent_change.abs() < STABLE_PERCENT {
            Self::Stable
        } else if percent_change > 0.0 {
            Self::Up
        } else {
            Self::Down
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall shape of a series, judged from its consecutive deltas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendShape {
    Upward,
    Downward,
    Stable,
    Volatile,
    Linear,
}

impl TrendShape {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upward => "upward",
            Self::Downward => "downward",
            Self::Stable => "stable",
            Self::Volatile => "volatile",
            Self::Linear => "linear",
        }
    }

    /// Classify `values`. Series with fewer than two points are stable.
    #[must_use]
    pub fn classify(values: &[f64]) -> Self {
        let deltas: Vec<f64> = values.windows(2).map(|pair| pair[1] - pair[0]).collect();
        if deltas.is_empty() {
            return Self::Stable;
        }
        let count = usize_to_f64(deltas.len());
        let share = |pred: fn(f64) -> bool| {
            usize_to_f64(deltas.iter().filter(|&&d| pred(d)).count()) / count
        };

        if share(|d| d > 0.0) >= DOMINANT_SHARE {
            return Self::Upward;
        }
        if share(|d| d < 0.0) >= DOMINANT_SHARE {
            return Self::Downward;
        }
        if share(|d| d == 0.0) >= DOMINANT_SHARE {
            return Self::Stable;
        }
        if deltas.len() > 1 {
            let flips = deltas
                .windows(2)
                .filter(|pair| pair[0] * pair[1] < 0.0)
                .count();
            if usize_to_f64(flips) / usize_to_f64(deltas.len() - 1) >= VOLATILE_SHARE {
                return Self::Volatile;
            }
        }
        Self::Linear
    }
}

impl fmt::Display for TrendShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field's movement across the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTrendData {
    pub field_name: String,
    /// One value per period, oldest first
    pub values: Vec<f64>,
    pub absolute_change: f64,
    pub percent_change: f64,
    pub direction: TrendDirection,
    pub shape: TrendShape,
}

/// Percent change from `first` to `last`.
///
/// A zero base reports +100 for growth, -100 for a drop below zero and 0
/// otherwise.
#[must_use]
pub fn percent_change(first: f64, last: f64) -> f64 {
    if first == 0.0 {
        if last > 0.0 {
            100.0
        } else if last < 0.0 {
            -100.0
        } else {
            0.0
        }
    } else {
        (last - first) / first.abs() * 100.0
    }
}

/// Trend for one field's value series.
#[must_use]
pub fn calculate_field_trend(field_name: &str, values: Vec<f64>) -> FieldTrendData {
    let first = values.first().copied().unwrap_or(0.0);
    let last = values.last().copied().unwrap_or(0.0);
    let percent = percent_change(first, last);
    FieldTrendData {
        field_name: field_name.to_string(),
        absolute_change: last - first,
        percent_change: percent,
        direction: TrendDirection::from_percent(percent),
        shape: TrendShape::classify(&values),
        values,
    }
}

/// How the runs of a multi-run period collapse into one point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendAggregation {
    #[default]
    Sum,
    Average,
    Min,
    Max,
}

impl TrendAggregation {
    pub const ALL: [Self; 4] = [Self::Sum, Self::Average, Self::Min, Self::Max];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Average => "average",
            Self::Min => "min",
            Self::Max => "max",
        }
    }

    /// Reduce `values`; an empty slice reduces to 0.
    #[must_use]
    pub fn reduce(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Sum => values.iter().sum(),
            Self::Average => values.iter().sum::<f64>() / usize_to_f64(values.len()),
            Self::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

impl fmt::Display for TrendAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrendAggregation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" | "total" => Ok(Self::Sum),
            "average" | "avg" | "mean" => Ok(Self::Average),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            _ => Err(ParseError::TrendAggregation(s.to_string())),
        }
    }
}

/// Window and significance settings for [`calculate_tier_trends`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendFilters {
    pub tier: u32,
    pub run_type: RunTypeFilter,
    pub duration: PeriodDuration,
    /// Number of most recent periods in the window
    pub quantity: usize,
    /// Minimum absolute percent change for a field to be reported
    pub change_threshold: f64,
    pub aggregation: TrendAggregation,
}

impl TrendFilters {
    /// Last five runs of `tier`, any run type, fields moving at least 5%.
    #[must_use]
    pub const fn for_tier(tier: u32) -> Self {
        Self {
            tier,
            run_type: RunTypeFilter::All,
            duration: PeriodDuration::PerRun,
            quantity: 5,
            change_threshold: 5.0,
            aggregation: TrendAggregation::Sum,
        }
    }

    #[must_use]
    pub const fn run_filters(&self) -> RunFilters {
        RunFilters {
            run_type: self.run_type,
            tier: TierFilter::Only(self.tier),
        }
    }
}

/// A field singled out in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendHighlight {
    pub field_name: String,
    pub percent_change: f64,
}

impl From<&FieldTrendData> for TrendHighlight {
    fn from(trend: &FieldTrendData) -> Self {
        Self {
            field_name: trend.field_name.clone(),
            percent_change: trend.percent_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub fields_analyzed: usize,
    pub significant_changes: usize,
    pub up_count: usize,
    pub down_count: usize,
    pub stable_count: usize,
    pub top_gainer: Option<TrendHighlight>,
    pub top_decliner: Option<TrendHighlight>,
}

impl TrendSummary {
    fn from_trends(fields_analyzed: usize, trends: &[FieldTrendData]) -> Self {
        let count = |direction: TrendDirection| {
            trends.iter().filter(|t| t.direction == direction).count()
        };
        let top_gainer = trends
            .iter()
            .filter(|t| t.direction == TrendDirection::Up)
            .fold(None::<&FieldTrendData>, |best, t| match best {
                Some(b) if b.percent_change >= t.percent_change => Some(b),
                _ => Some(t),
            })
            .map(TrendHighlight::from);
        let top_decliner = trends
            .iter()
            .filter(|t| t.direction == TrendDirection::Down)
            .fold(None::<&FieldTrendData>, |best, t| match best {
                Some(b) if b.percent_change <= t.percent_change => Some(b),
                _ => Some(t),
            })
            .map(TrendHighlight::from);

        Self {
            fields_analyzed,
            significant_changes: trends.len(),
            up_count: count(TrendDirection::Up),
            down_count: count(TrendDirection::Down),
            stable_count: count(TrendDirection::Stable),
            top_gainer,
            top_decliner,
        }
    }
}

/// Trend report for one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierTrendsAnalysis {
    pub tier: u32,
    pub run_count: usize,
    pub period_keys: Vec<String>,
    pub period_labels: Vec<String>,
    /// Significant trends, largest absolute percent change first
    pub trends: Vec<FieldTrendData>,
    pub summary: TrendSummary,
}

/// Build the trend window for `filters.tier` and report the significant fields.
///
/// Windows with fewer than two periods produce no trends.
#[must_use]
pub fn calculate_tier_trends(runs: &[Run], filters: &TrendFilters) -> TierTrendsAnalysis {
    let mut filtered = filter_runs(runs, &filters.run_filters());
    filtered.sort_by_key(|run| run.timestamp());

    let groups = group_by_period(filtered.iter().copied(), filters.duration);
    let group_count = groups.len();
    let window = limit_to_periods(groups, filters.quantity, filters.duration);
    let window_len = window.len();

    let period_keys: Vec<String> = window.iter().map(|group| group.key.clone()).collect();
    let period_labels: Vec<String> = window
        .iter()
        .enumerate()
        .map(|(position, group)| match filters.duration {
            PeriodDuration::PerRun => period_label(
                &group.key,
                filters.duration,
                Some(window_len - 1 - position),
                Some(group_count),
            ),
            _ => period_label(&group.key, filters.duration, None, None),
        })
        .collect();
    let run_count = window.iter().map(|group| group.runs.len()).sum();

    let mut analysis = TierTrendsAnalysis {
        tier: filters.tier,
        run_count,
        period_keys,
        period_labels,
        trends: Vec::new(),
        summary: TrendSummary::default(),
    };
    if window_len < 2 {
        log::debug!(
            "tier {} trends: {} period(s) in window, nothing to compare",
            filters.tier,
            window_len
        );
        return analysis;
    }

    let field_names = numeric_field_names(window.iter().flat_map(|group| group.runs.iter().copied()));
    let mut trends: Vec<FieldTrendData> = field_names
        .iter()
        .map(|field_name| {
            let series = window
                .iter()
                .map(|group| {
                    let values: Vec<f64> = group
                        .runs
                        .iter()
                        .map(|run| extract_value(run, field_name))
                        .collect();
                    filters.aggregation.reduce(&values)
                })
                .collect();
            calculate_field_trend(field_name, series)
        })
        .filter(|trend| trend.percent_change.abs() >= filters.change_threshold)
        .collect();
    trends.sort_by(|a, b| b.percent_change.abs().total_cmp(&a.percent_change.abs()));

    log::debug!(
        "tier {} trends: {} of {} field(s) significant over {} period(s)",
        filters.tier,
        trends.len(),
        field_names.len(),
        window_len
    );
    analysis.summary = TrendSummary::from_trends(field_names.len(), &trends);
    analysis.trends = trends;
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ten_percent_rise() {
        let trend = calculate_field_trend("coinsEarned", vec![1000.0, 1100.0]);
        assert!(close(trend.percent_change, 10.0));
        assert!(close(trend.absolute_change, 100.0));
        assert_eq!(trend.direction, TrendDirection::Up);
    }

    #[test]
    fn zero_base_counts_as_full_rise() {
        let trend = calculate_field_trend("cellsEarned", vec![0.0, 100.0]);
        assert!(close(trend.percent_change, 100.0));
        assert_eq!(trend.direction, TrendDirection::Up);
        let flat = calculate_field_trend("cellsEarned", vec![0.0, 0.0]);
        assert!(close(flat.percent_change, 0.0));
        assert_eq!(flat.direction, TrendDirection::Stable);
    }

    #[test]
    fn tiny_moves_are_stable_and_drops_use_absolute_base() {
        let tiny = calculate_field_trend("wave", vec![10_000.0, 10_005.0]);
        assert_eq!(tiny.direction, TrendDirection::Stable);
        let drop = calculate_field_trend("wave", vec![-200.0, -300.0]);
        assert!(close(drop.percent_change, -50.0));
        assert_eq!(drop.direction, TrendDirection::Down);
    }

    #[test]
    fn shapes_follow_delta_shares() {
        assert_eq!(TrendShape::classify(&[1.0, 2.0, 3.0, 4.0]), TrendShape::Upward);
        assert_eq!(TrendShape::classify(&[1.0, 2.0, 3.0, 3.0, 3.0]), TrendShape::Linear);
        assert_eq!(
            TrendShape::classify(&[9.0, 8.0, 7.0, 6.0, 5.0, 5.5]),
            TrendShape::Downward
        );
        assert_eq!(TrendShape::classify(&[5.0, 5.0, 5.0, 5.0]), TrendShape::Stable);
        assert_eq!(TrendShape::classify(&[1.0, 3.0, 2.0, 4.0, 3.0]), TrendShape::Volatile);
        assert_eq!(TrendShape::classify(&[1.0, 2.0, 2.0, 1.0]), TrendShape::Linear);
        assert_eq!(TrendShape::classify(&[7.0]), TrendShape::Stable);
    }

    #[test]
    fn trend_aggregations_reduce_periods() {
        let values = [3.0, 1.0, 2.0];
        assert!(close(TrendAggregation::Sum.reduce(&values), 6.0));
        assert!(close(TrendAggregation::Average.reduce(&values), 2.0));
        assert!(close(TrendAggregation::Min.reduce(&values), 1.0));
        assert!(close(TrendAggregation::Max.reduce(&values), 3.0));
        assert!(close(TrendAggregation::Max.reduce(&[]), 0.0));
        assert_eq!("avg".parse::<TrendAggregation>(), Ok(TrendAggregation::Average));
        assert!("median".parse::<TrendAggregation>().is_err());
    }
}
