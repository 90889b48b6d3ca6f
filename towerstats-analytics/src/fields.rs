//! Field access with alias fallback.
//!
//! Game data keys have been renamed across releases. Instead of migrating
//! stored runs, lookups consult a fixed alias table whenever the primary
//! name is missing or not numeric.

use std::collections::BTreeSet;

use crate::run::Run;

/// Historical names for fields, tried in order on a primary-key miss.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("goldenBotCoinsEarned", &["coinsFromGoldenBot", "goldenBotCoins"]),
    ("coinsFromCoinBonuses", &["coinsFromCoinBonus"]),
    ("projectilesDamage", &["projectileDamage"]),
    ("innerLandMineDamage", &["innerMineDamage"]),
    ("totalEnemies", &["enemiesDestroyed", "totalEnemiesDestroyed"]),
    ("cellsEarned", &["cells"]),
    ("rerollShardsEarned", &["rerollShards", "rerollsEarned"]),
    ("wave", &["waves", "waveReached"]),
];

/// Aliases registered for `field_name`, empty when it has none.
#[must_use]
pub fn aliases_for(field_name: &str) -> &'static [&'static str] {
    for (name, aliases) in FIELD_ALIASES {
        if *name == field_name {
            return aliases;
        }
    }
    &[]
}

/// Numeric value of `field_name` on `run`, resolving aliases.
///
/// `None` when neither the field nor any alias holds a number.
#[must_use]
pub fn numeric_value(run: &Run, field_name: &str) -> Option<f64> {
    std::iter::once(field_name)
        .chain(aliases_for(field_name).iter().copied())
        .find_map(|name| run.field(name).and_then(|field| field.value.as_number()))
}

/// Numeric value of `field_name` on `run`, or 0 when nothing numeric resolves.
#[must_use]
pub fn extract_value(run: &Run, field_name: &str) -> f64 {
    numeric_value(run, field_name).unwrap_or(0.0)
}

/// Canonical name for a stored field key: aliases map back to their primary name.
#[must_use]
pub fn canonical_field_name(field_name: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(_, aliases)| aliases.contains(&field_name))
        .map_or(field_name, |(primary, _)| *primary)
}

/// Every numeric field present in any of `runs`, under its canonical name.
#[must_use]
pub fn numeric_field_names<'a, I>(runs: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Run>,
{
    runs.into_iter()
        .flat_map(|run| {
            run.fields()
                .iter()
                .filter(|(_, field)| field.value.as_number().is_some())
                .map(|(name, _)| canonical_field_name(name).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{RunField, RunType};
    use chrono::NaiveDate;

    fn run() -> Run {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        Run::new("r", ts, RunType::Farm)
    }

    #[test]
    fn primary_name_wins() {
        let run = run()
            .with_number("goldenBotCoinsEarned", 10.0)
            .with_number("coinsFromGoldenBot", 99.0);
        assert!((extract_value(&run, "goldenBotCoinsEarned") - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn aliases_are_tried_in_order() {
        let run = run()
            .with_number("goldenBotCoins", 7.0)
            .with_number("coinsFromGoldenBot", 5.0);
        assert_eq!(numeric_value(&run, "goldenBotCoinsEarned"), Some(5.0));
    }

    #[test]
    fn non_numeric_primary_falls_through_to_alias() {
        let run = run()
            .with_field("wave", RunField::from_raw("Wave", "unknown"))
            .with_number("waveReached", 4500.0);
        assert_eq!(numeric_value(&run, "wave"), Some(4500.0));
    }

    #[test]
    fn missing_field_extracts_zero() {
        let run = run();
        assert_eq!(numeric_value(&run, "coinsEarned"), None);
        assert!(extract_value(&run, "coinsEarned").abs() < f64::EPSILON);
        assert!(aliases_for("coinsEarned").is_empty());
    }

    #[test]
    fn field_names_are_canonicalized() {
        let runs = [
            run().with_number("enemiesDestroyed", 1.0),
            run()
                .with_number("coinsEarned", 2.0)
                .with_field("killedBy", RunField::from_raw("Killed By", "Boss")),
        ];
        let names = numeric_field_names(&runs);
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["coinsEarned".to_string(), "totalEnemies".to_string()]
        );
    }
}
