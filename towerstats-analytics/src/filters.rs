//! Run-type and tier filters shared by every analysis.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::period::PeriodDuration;
use crate::run::{Run, RunType};

/// Either every run type or exactly one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum RunTypeFilter {
    #[default]
    All,
    Only(RunType),
}

impl RunTypeFilter {
    #[must_use]
    pub fn matches(self, run_type: RunType) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => wanted == run_type,
        }
    }
}

impl fmt::Display for RunTypeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(run_type) => write!(f, "{run_type}"),
        }
    }
}

impl FromStr for RunTypeFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(Self::All)
        } else {
            s.parse().map(Self::Only)
        }
    }
}

/// Either every tier or exactly one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TierFilter {
    #[default]
    All,
    Only(u32),
}

impl TierFilter {
    /// Runs without a tier only pass the `All` filter.
    #[must_use]
    pub fn matches(self, tier: Option<u32>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => tier == Some(wanted),
        }
    }
}

impl fmt::Display for TierFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(tier) => write!(f, "{tier}"),
        }
    }
}

impl FromStr for TierFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        match trimmed.parse::<u32>() {
            Ok(tier) if tier > 0 => Ok(Self::Only(tier)),
            _ => Err(ParseError::Tier(s.to_string())),
        }
    }
}

/// Run-type and tier restrictions; both must match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RunFilters {
    pub run_type: RunTypeFilter,
    pub tier: TierFilter,
}

impl RunFilters {
    #[must_use]
    pub fn matches(&self, run: &Run) -> bool {
        self.run_type.matches(run.run_type()) && self.tier.matches(run.tier())
    }
}

/// Filters for the source breakdown view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAnalysisFilters {
    pub run_type: RunTypeFilter,
    pub tier: TierFilter,
    pub duration: PeriodDuration,
    /// Number of most recent periods to keep
    pub quantity: usize,
}

impl SourceAnalysisFilters {
    #[must_use]
    pub const fn run_filters(&self) -> RunFilters {
        RunFilters {
            run_type: self.run_type,
            tier: self.tier,
        }
    }
}

impl Default for SourceAnalysisFilters {
    fn default() -> Self {
        Self {
            run_type: RunTypeFilter::All,
            tier: TierFilter::All,
            duration: PeriodDuration::PerRun,
            quantity: 10,
        }
    }
}

/// Runs matching `filters`, in their original order.
#[must_use]
pub fn filter_runs<'a>(runs: &'a [Run], filters: &RunFilters) -> Vec<&'a Run> {
    runs.iter().filter(|run| filters.matches(run)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn run(id: &str, run_type: RunType, tier: u32) -> Run {
        let ts = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Run::new(id, ts, run_type).with_tier(tier)
    }

    #[test]
    fn filters_combine_with_and() {
        let runs = [
            run("a", RunType::Farm, 10),
            run("b", RunType::Tournament, 10),
            run("c", RunType::Farm, 11),
            run("d", RunType::Farm, 0),
        ];
        let ids = |filters: RunFilters| {
            filter_runs(&runs, &filters)
                .into_iter()
                .map(Run::id)
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(RunFilters::default()), vec!["a", "b", "c", "d"]);
        assert_eq!(
            ids(RunFilters {
                run_type: RunTypeFilter::Only(RunType::Farm),
                tier: TierFilter::All,
            }),
            vec!["a", "c", "d"]
        );
        assert_eq!(
            ids(RunFilters {
                run_type: RunTypeFilter::Only(RunType::Farm),
                tier: TierFilter::Only(10),
            }),
            vec!["a"]
        );
        assert!(
            ids(RunFilters {
                run_type: RunTypeFilter::Only(RunType::Milestone),
                tier: TierFilter::All,
            })
            .is_empty()
        );
    }

    #[test]
    fn filters_parse_from_flags() {
        assert_eq!("all".parse::<RunTypeFilter>(), Ok(RunTypeFilter::All));
        assert_eq!(
            "tournament".parse::<RunTypeFilter>(),
            Ok(RunTypeFilter::Only(RunType::Tournament))
        );
        assert_eq!("ALL".parse::<TierFilter>(), Ok(TierFilter::All));
        assert_eq!("12".parse::<TierFilter>(), Ok(TierFilter::Only(12)));
        assert!("0".parse::<TierFilter>().is_err());
        assert!("twelve".parse::<TierFilter>().is_err());
        assert_eq!(TierFilter::Only(7).to_string(), "7");
    }
}
