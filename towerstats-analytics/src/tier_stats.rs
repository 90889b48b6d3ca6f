//! Per-tier field statistics: best run, percentiles and hourly rates.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::fields::{numeric_field_names, numeric_value};
use crate::filters::{RunFilters, filter_runs};
use crate::numbers::hourly_rate;
use crate::percentiles::{FieldPercentiles, Percentile, field_percentiles};
use crate::run::{Run, RunRef};

/// How a tier table cell reduces a field's runs to one number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Max,
    P50,
    P75,
    P90,
    P99,
}

impl Aggregation {
    pub const ALL: [Self; 5] = [Self::Max, Self::P50, Self::P75, Self::P90, Self::P99];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::P50 => "p50",
            Self::P75 => "p75",
            Self::P90 => "p90",
            Self::P99 => "p99",
        }
    }

    /// The percentile this aggregation reads, `None` for `Max`.
    #[must_use]
    pub const fn percentile(self) -> Option<Percentile> {
        match self {
            Self::Max => None,
            Self::P50 => Some(Percentile::P50),
            Self::P75 => Some(Percentile::P75),
            Self::P90 => Some(Percentile::P90),
            Self::P99 => Some(Percentile::P99),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == normalized)
            .ok_or_else(|| ParseError::Aggregation(s.to_string()))
    }
}

/// Statistics for one field across one tier's runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldStats {
    pub field_name: String,
    pub max_value: f64,
    pub max_run: RunRef,
    /// Real time (seconds) of `max_run`
    pub max_run_duration: f64,
    /// `max_value` per hour of `max_run`; `None` when that run has no duration
    pub hourly_rate: Option<f64>,
    pub percentiles: FieldPercentiles,
    pub longest_run: RunRef,
    pub longest_duration: f64,
}

impl FieldStats {
    /// Value for `aggregation`, optionally normalized per hour.
    ///
    /// Percentile rates divide by the real time of the run at that rank,
    /// never by an average duration.
    #[must_use]
    pub fn value(&self, aggregation: Aggregation, want_hourly: bool) -> Option<f64> {
        match aggregation.percentile() {
            None if want_hourly => self.hourly_rate,
            None => Some(self.max_value),
            Some(percentile) => {
                let at_rank = self.percentiles.get(percentile)?;
                if want_hourly {
                    hourly_rate(at_rank.value, at_rank.duration)
                } else {
                    Some(at_rank.value)
                }
            }
        }
    }
}

/// Compute [`FieldStats`] for `field_name`, `None` when no run has a number for it.
///
/// Ties on the max value or the longest duration keep the earliest run in
/// `runs`. Aliased field names resolve like every other lookup.
#[must_use]
pub fn field_stats<'a, I>(runs: I, field_name: &str) -> Option<FieldStats>
where
    I: IntoIterator<Item = &'a Run>,
{
    let valued: Vec<(f64, &Run)> = runs
        .into_iter()
        .filter_map(|run| {
            numeric_value(run, field_name)
                .filter(|value| value.is_finite())
                .map(|value| (value, run))
        })
        .collect();

    let (first, rest) = valued.split_first()?;
    let (mut max_value, mut max_run) = *first;
    let mut longest_run = max_run;
    for &(value, run) in rest {
        if value > max_value {
            max_value = value;
            max_run = run;
        }
        if run.real_time() > longest_run.real_time() {
            longest_run = run;
        }
    }

    let percentiles = field_percentiles(valued.iter().map(|(_, run)| *run), |run| {
        numeric_value(run, field_name)
    });

    Some(FieldStats {
        field_name: field_name.to_string(),
        max_value,
        max_run: RunRef::from(max_run),
        max_run_duration: max_run.real_time(),
        hourly_rate: hourly_rate(max_value, max_run.real_time()),
        percentiles,
        longest_run: RunRef::from(longest_run),
        longest_duration: longest_run.real_time(),
    })
}

/// Every numeric field's stats for one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierStats {
    pub tier: u32,
    pub run_count: usize,
    pub fields: BTreeMap<String, FieldStats>,
}

impl TierStats {
    #[must_use]
    pub fn field(&self, field_name: &str) -> Option<&FieldStats> {
        self.fields.get(field_name)
    }
}

/// Cell value for a tier table: `None` when the tier lacks the field or
/// the requested rate cannot be computed.
#[must_use]
pub fn cell_value(
    tier_stats: &TierStats,
    field_name: &str,
    want_hourly: bool,
    aggregation: Aggregation,
) -> Option<f64> {
    tier_stats
        .field(field_name)
        .and_then(|stats| stats.value(aggregation, want_hourly))
}

/// Partition filtered runs by tier and compute stats for every numeric field.
///
/// Tiers come back highest first. Runs without a tier are skipped.
#[must_use]
pub fn calculate_tier_stats(runs: &[Run], filters: &RunFilters) -> Vec<TierStats> {
    let mut by_tier: BTreeMap<u32, Vec<&Run>> = BTreeMap::new();
    let mut untiered = 0_usize;
    for run in filter_runs(runs, filters) {
        match run.tier() {
            Some(tier) => by_tier.entry(tier).or_default().push(run),
            None => untiered += 1,
        }
    }
    if untiered > 0 {
        log::warn!("skipping {untiered} run(s) without a tier in tier stats");
    }

    let stats: Vec<TierStats> = by_tier
        .into_iter()
        .rev()
        .map(|(tier, tier_runs)| {
            let fields = numeric_field_names(tier_runs.iter().copied())
                .into_iter()
                .filter_map(|name| {
                    field_stats(tier_runs.iter().copied(), &name).map(|stats| (name, stats))
                })
                .collect();
            TierStats {
                tier,
                run_count: tier_runs.len(),
                fields,
            }
        })
        .collect();
    log::debug!(
        "tier stats: {} tier(s) from {} run(s) ({})",
        stats.len(),
        runs.len(),
        filters.run_type
    );
    stats
}
