//! Nearest-rank percentiles that remember which run produced each value.
//!
//! A percentile is always a value some real run achieved, so it can carry
//! that run's duration. Rates derived from a percentile divide by this
//! duration and never by an average across runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::numbers::nearest_rank_index;
use crate::run::{Run, RunRef};

/// Percentile ranks tracked for every field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Percentile {
    P50,
    P75,
    P90,
    P99,
}

impl Percentile {
    pub const ALL: [Self; 4] = [Self::P50, Self::P75, Self::P90, Self::P99];

    #[must_use]
    pub const fn fraction(self) -> f64 {
        match self {
            Self::P50 => 0.50,
            Self::P75 => 0.75,
            Self::P90 => 0.90,
            Self::P99 => 0.99,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P50 => "p50",
            Self::P75 => "p75",
            Self::P90 => "p90",
            Self::P99 => "p99",
        }
    }
}

impl fmt::Display for Percentile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Percentile {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ParseError::Aggregation(s.to_string()))
    }
}

/// A percentile value plus the run that sits at that rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileValue {
    pub value: f64,
    pub source_run: RunRef,
    /// Real-time duration (seconds) of `source_run`
    pub duration: f64,
}

/// P50/P75/P90/P99 for one field; all `None` when no run had a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FieldPercentiles {
    pub p50: Option<PercentileValue>,
    pub p75: Option<PercentileValue>,
    pub p90: Option<PercentileValue>,
    pub p99: Option<PercentileValue>,
}

impl FieldPercentiles {
    #[must_use]
    pub const fn get(&self, percentile: Percentile) -> Option<&PercentileValue> {
        match percentile {
            Percentile::P50 => self.p50.as_ref(),
            Percentile::P75 => self.p75.as_ref(),
            Percentile::P90 => self.p90.as_ref(),
            Percentile::P99 => self.p99.as_ref(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.p50.is_none()
    }
}

/// Compute the four percentiles of `extract` over `runs`.
///
/// Runs where `extract` yields `None` (or a non-finite number) are skipped.
/// The remaining values are stable-sorted ascending and the rank for `p` is
/// `floor(p * n)` clamped to `n - 1`; no interpolation. With equal values
/// the run that came first in `runs` keeps the lower rank.
pub fn field_percentiles<'a, I, F>(runs: I, extract: F) -> FieldPercentiles
where
    I: IntoIterator<Item = &'a Run>,
    F: Fn(&Run) -> Option<f64>,
{
    let mut ranked: Vec<(f64, &Run)> = runs
        .into_iter()
        .filter_map(|run| {
            extract(run)
                .filter(|value| value.is_finite())
                .map(|value| (value, run))
        })
        .collect();
    if ranked.is_empty() {
        return FieldPercentiles::default();
    }
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let at = |percentile: Percentile| {
        let (value, run) = ranked[nearest_rank_index(percentile.fraction(), ranked.len())];
        Some(PercentileValue {
            value,
            source_run: RunRef::from(run),
            duration: run.real_time(),
        })
    };

    FieldPercentiles {
        p50: at(Percentile::P50),
        p75: at(Percentile::P75),
        p90: at(Percentile::P90),
        p99: at(Percentile::P99),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::numeric_value;
    use crate::run::RunType;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap()
    }

    fn run(id: &str, day: u32, coins: f64, seconds: f64) -> Run {
        Run::new(id, ts(day), RunType::Farm)
            .with_real_time(seconds)
            .with_number("coinsEarned", coins)
    }

    fn coins(run: &Run) -> Option<f64> {
        numeric_value(run, "coinsEarned")
    }

    #[test]
    fn empty_input_yields_no_percentiles() {
        let runs: [Run; 0] = [];
        let result = field_percentiles(&runs, coins);
        assert!(result.is_empty());
        for p in Percentile::ALL {
            assert!(result.get(p).is_none());
        }
    }

    #[test]
    fn runs_without_values_are_ignored() {
        let runs = [
            Run::new("blank", ts(1), RunType::Farm).with_real_time(10.0),
            run("only", 2, 42.0, 600.0),
        ];
        let result = field_percentiles(&runs, coins);
        for p in Percentile::ALL {
            let value = result.get(p).unwrap();
            assert!((value.value - 42.0).abs() < f64::EPSILON);
            assert_eq!(value.source_run.id, "only");
            assert!((value.duration - 600.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn nearest_rank_selects_run_duration() {
        // Values 100..=1000 arrive shuffled; duration encodes the value.
        let order = [7, 2, 9, 4, 1, 10, 3, 8, 6, 5];
        let runs: Vec<Run> = order
            .iter()
            .map(|&n| {
                let n_f = f64::from(n);
                run(&format!("run-{n}"), n, n_f * 100.0, n_f * 60.0)
            })
            .collect();
        let result = field_percentiles(&runs, coins);

        let p50 = result.p50.as_ref().unwrap();
        assert!((p50.value - 600.0).abs() < f64::EPSILON);
        assert!((p50.duration - 360.0).abs() < f64::EPSILON);
        assert_eq!(p50.source_run.id, "run-6");

        let p75 = result.p75.as_ref().unwrap();
        assert!((p75.value - 800.0).abs() < f64::EPSILON);

        let p90 = result.p90.as_ref().unwrap();
        assert!((p90.value - 1000.0).abs() < f64::EPSILON);
        assert_eq!(p90.source_run.id, "run-10");

        let p99 = result.p99.as_ref().unwrap();
        assert!((p99.value - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ties_keep_input_order() {
        let runs = [
            run("first", 1, 500.0, 100.0),
            run("second", 2, 500.0, 900.0),
        ];
        let result = field_percentiles(&runs, coins);
        // floor(0.5 * 2) = 1 -> the second of the tied runs
        assert_eq!(result.p50.as_ref().unwrap().source_run.id, "second");
        let reversed = [runs[1].clone(), runs[0].clone()];
        let result = field_percentiles(&reversed, coins);
        assert_eq!(result.p50.as_ref().unwrap().source_run.id, "first");
    }

    #[test]
    fn percentile_names_parse() {
        assert_eq!("P90".parse::<Percentile>(), Ok(Percentile::P90));
        assert!("p95".parse::<Percentile>().is_err());
    }
}
