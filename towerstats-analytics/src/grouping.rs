//! Partition runs into period buckets and keep the most recent ones.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::period::{PeriodDuration, compare_period_keys, period_key};
use crate::run::Run;

/// One bucket of runs sharing a period key
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodGroup<'a> {
    pub key: String,
    pub runs: Vec<&'a Run>,
}

/// Bucket `runs` by period key; within a bucket runs keep their input order.
#[must_use]
pub fn group_by_period<'a, I>(runs: I, duration: PeriodDuration) -> BTreeMap<String, Vec<&'a Run>>
where
    I: IntoIterator<Item = &'a Run>,
{
    let mut groups: BTreeMap<String, Vec<&'a Run>> = BTreeMap::new();
    for run in runs {
        groups
            .entry(period_key(run.timestamp(), duration))
            .or_default()
            .push(run);
    }
    groups
}

/// Keep the `quantity` most recent buckets, returned oldest first.
#[must_use]
pub fn limit_to_periods<'a>(
    groups: BTreeMap<String, Vec<&'a Run>>,
    quantity: usize,
    duration: PeriodDuration,
) -> Vec<PeriodGroup<'a>> {
    let mut entries: Vec<PeriodGroup<'a>> = groups
        .into_iter()
        .map(|(key, runs)| PeriodGroup { key, runs })
        .collect();
    entries.sort_by(|a, b| compare_period_keys(&b.key, &a.key, duration));
    entries.truncate(quantity);
    entries.reverse();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunType;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .and_then(|date| date.and_hms_opt(h, 0, 0))
            .unwrap()
    }

    fn run(id: &str, when: NaiveDateTime) -> Run {
        Run::new(id, when, RunType::Farm)
    }

    #[test]
    fn groups_preserve_encounter_order() {
        let runs = [
            run("late", ts(3, 15, 20)),
            run("other-week", ts(3, 18, 9)),
            run("early", ts(3, 11, 8)),
        ];
        let groups = group_by_period(&runs, PeriodDuration::Weekly);
        assert_eq!(groups.len(), 2);
        let ids: Vec<&str> = groups["2024-03-10"].iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["late", "early"]);
        assert_eq!(groups["2024-03-17"].len(), 1);
    }

    #[test]
    fn limit_keeps_most_recent_oldest_first() {
        let runs: Vec<Run> = (1..=6)
            .map(|month| run(&format!("m{month}"), ts(month, 1, 0)))
            .collect();
        let groups = group_by_period(&runs, PeriodDuration::Monthly);
        let kept = limit_to_periods(groups, 3, PeriodDuration::Monthly);
        let keys: Vec<&str> = kept.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["2024-04", "2024-05", "2024-06"]);
    }

    #[test]
    fn limit_orders_per_run_keys_by_time() {
        let runs = [
            run("b", ts(1, 2, 0)),
            run("c", ts(1, 3, 0)),
            run("a", ts(1, 1, 0)),
        ];
        let groups = group_by_period(&runs, PeriodDuration::PerRun);
        let kept = limit_to_periods(groups, 10, PeriodDuration::PerRun);
        let ids: Vec<&str> = kept.iter().map(|g| g.runs[0].id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(limit_to_periods(BTreeMap::new(), 5, PeriodDuration::Daily).is_empty());
    }
}
