//! Per-period source breakdowns and their roll-up.
//!
//! Each bucket sums a category's sources and its authoritative total. When
//! the total is known and the sources miss it by more than
//! [`DISCREPANCY_TOLERANCE`], the gap is reported as an extra pseudo-source:
//! `Unknown` when the sources undercount, `Overage` when they overcount.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::categories::CategoryDefinition;
use crate::fields::extract_value;
use crate::filters::{SourceAnalysisFilters, filter_runs};
use crate::grouping::{group_by_period, limit_to_periods};
use crate::numbers::percentage_of;
use crate::period::{PeriodDuration, period_label};
use crate::run::Run;

/// Relative gap between total and source sum below which no discrepancy is reported.
pub const DISCREPANCY_TOLERANCE: f64 = 0.01;

/// Direction of a mismatch between a category total and its sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyKind {
    /// Sources sum to less than the total
    Unknown,
    /// Sources sum to more than the total
    Overage,
}

impl DiscrepancyKind {
    pub const ALL: [Self; 2] = [Self::Unknown, Self::Overage];

    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Unknown => "_unknown",
            Self::Overage => "_overage",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Overage => "Overage",
        }
    }

    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Unknown => "#6b7280",
            Self::Overage => "#ef4444",
        }
    }
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A source's contribution to a total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceValue {
    pub field_name: String,
    pub display_name: String,
    pub color: String,
    pub value: f64,
    pub percentage: f64,
    /// Set on the pseudo-sources that report a total/source mismatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discrepancy: Option<DiscrepancyKind>,
}

impl SourceValue {
    fn discrepancy(kind: DiscrepancyKind, value: f64, total: f64) -> Self {
        Self {
            field_name: kind.field_name().to_string(),
            display_name: kind.display_name().to_string(),
            color: kind.color().to_string(),
            value,
            percentage: percentage_of(value, total),
            discrepancy: Some(kind),
        }
    }

    #[must_use]
    pub const fn is_discrepancy(&self) -> bool {
        self.discrepancy.is_some()
    }
}

/// Source breakdown for one period bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSourceBreakdown {
    pub period_key: String,
    pub period_label: String,
    pub total: f64,
    pub run_count: usize,
    /// Tracked sources in category order, then any discrepancy entry
    pub sources: Vec<SourceValue>,
}

impl PeriodSourceBreakdown {
    pub fn tracked_sources(&self) -> impl Iterator<Item = &SourceValue> {
        self.sources.iter().filter(|s| !s.is_discrepancy())
    }

    #[must_use]
    pub fn discrepancy(&self) -> Option<&SourceValue> {
        self.sources.iter().find(|s| s.is_discrepancy())
    }
}

/// Roll-up of every included period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub category: String,
    pub total_value: f64,
    pub period_count: usize,
    /// Non-zero tracked sources, largest share first
    pub sources: Vec<SourceValue>,
    /// Non-zero discrepancy totals, kept out of `sources`
    pub discrepancies: SmallVec<[SourceValue; 2]>,
}

/// Everything the source breakdown view renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalysisData {
    pub periods: Vec<PeriodSourceBreakdown>,
    pub summary: SourceSummary,
}

/// Break down one bucket of runs into the category's sources.
///
/// The bucket total is the summed total field, or the summed sources when
/// no run carries a positive total.
#[must_use]
pub fn calculate_period_breakdown(
    runs: &[&Run],
    category: &CategoryDefinition,
    period_key: &str,
    period_label: &str,
) -> PeriodSourceBreakdown {
    let source_values: Vec<f64> = category
        .sources
        .iter()
        .map(|source| runs.iter().map(|run| extract_value(run, &source.field_name)).sum())
        .collect();
    let source_sum: f64 = source_values.iter().sum();
    let aggregated_total: f64 = runs
        .iter()
        .map(|run| extract_value(run, &category.total_field))
        .sum();
    let period_total = if aggregated_total > 0.0 {
        aggregated_total
    } else {
        source_sum
    };

    let mut sources: Vec<SourceValue> = category
        .sources
        .iter()
        .zip(&source_values)
        .map(|(source, &value)| SourceValue {
            field_name: source.field_name.clone(),
            display_name: source.display_name.clone(),
            color: source.color.clone(),
            value,
            percentage: percentage_of(value, period_total),
            discrepancy: None,
        })
        .collect();

    if aggregated_total > 0.0 {
        let gap = aggregated_total - source_sum;
        if (gap / aggregated_total).abs() > DISCREPANCY_TOLERANCE {
            let kind = if gap > 0.0 {
                DiscrepancyKind::Unknown
            } else {
                DiscrepancyKind::Overage
            };
            sources.push(SourceValue::discrepancy(kind, gap.abs(), period_total));
        }
    }

    PeriodSourceBreakdown {
        period_key: period_key.to_string(),
        period_label: period_label.to_string(),
        total: period_total,
        run_count: runs.len(),
        sources,
    }
}

/// Roll per-period breakdowns into category-wide totals.
#[must_use]
pub fn calculate_summary(
    periods: &[PeriodSourceBreakdown],
    category: &CategoryDefinition,
) -> SourceSummary {
    let total_value: f64 = periods.iter().map(|period| period.total).sum();

    let mut sources: Vec<SourceValue> = category
        .sources
        .iter()
        .map(|source| {
            let value: f64 = periods
                .iter()
                .flat_map(PeriodSourceBreakdown::tracked_sources)
                .filter(|entry| entry.field_name == source.field_name)
                .map(|entry| entry.value)
                .sum();
            SourceValue {
                field_name: source.field_name.clone(),
                display_name: source.display_name.clone(),
                color: source.color.clone(),
                value,
                percentage: percentage_of(value, total_value),
                discrepancy: None,
            }
        })
        .filter(|entry| entry.value != 0.0)
        .collect();
    sources.sort_by(|a, b| {
        b.percentage
            .total_cmp(&a.percentage)
            .then_with(|| b.value.total_cmp(&a.value))
    });

    let discrepancies = DiscrepancyKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let value: f64 = periods
                .iter()
                .flat_map(|period| period.sources.iter())
                .filter(|entry| entry.discrepancy == Some(kind))
                .map(|entry| entry.value)
                .sum();
            (value != 0.0).then(|| SourceValue::discrepancy(kind, value, total_value))
        })
        .collect();

    SourceSummary {
        category: category.name.clone(),
        total_value,
        period_count: periods.len(),
        sources,
        discrepancies,
    }
}

/// Filter, bucket and break down `runs` for one category.
///
/// Empty input (or nothing matching the filters) gives zero periods and a
/// zero-valued summary.
#[must_use]
pub fn calculate_source_analysis(
    runs: &[Run],
    category: &CategoryDefinition,
    filters: &SourceAnalysisFilters,
) -> SourceAnalysisData {
    let mut filtered = filter_runs(runs, &filters.run_filters());
    filtered.sort_by_key(|run| run.timestamp());

    let groups = group_by_period(filtered.iter().copied(), filters.duration);
    let group_count = groups.len();
    let kept = limit_to_periods(groups, filters.quantity, filters.duration);
    let kept_count = kept.len();
    log::debug!(
        "source analysis '{}': {} of {} runs matched, {} of {} periods kept",
        category.name,
        filtered.len(),
        runs.len(),
        kept_count,
        group_count
    );

    let periods: Vec<PeriodSourceBreakdown> = kept
        .iter()
        .enumerate()
        .map(|(position, group)| {
            let label = if filters.duration == PeriodDuration::PerRun {
                let recency = kept_count - 1 - position;
                period_label(&group.key, filters.duration, Some(recency), Some(group_count))
            } else {
                period_label(&group.key, filters.duration, None, None)
            };
            calculate_period_breakdown(&group.runs, category, &group.key, &label)
        })
        .collect();
    let summary = calculate_summary(&periods, category);

    SourceAnalysisData { periods, summary }
}
