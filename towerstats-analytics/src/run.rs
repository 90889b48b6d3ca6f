//! Run records: one completed game session and its typed field map.
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::numbers::f64_to_tier;
use crate::parse::{parse_duration, parse_game_number, parse_timestamp, to_field_name};

/// Field names whose raw values are durations rather than plain numbers.
pub const DURATION_FIELDS: [&str; 2] = ["realTime", "gameTime"];

/// Field holding the run's tier when it is supplied through the field map.
pub const TIER_FIELD: &str = "tier";

/// Field holding the run's wall-clock duration when supplied through the field map.
pub const REAL_TIME_FIELD: &str = "realTime";

/// The kind of session a run was recorded in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    #[default]
    Farm,
    Tournament,
    Milestone,
}

impl RunType {
    pub const ALL: [Self; 3] = [Self::Farm, Self::Tournament, Self::Milestone];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Farm => "farm",
            Self::Tournament => "tournament",
            Self::Milestone => "milestone",
        }
    }
}

impl fmt::Display for RunType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ParseError::RunType(s.to_string()))
    }
}

/// Typed value of a single run field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dataType", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Number(f64),
    /// Seconds
    Duration(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl FieldValue {
    /// Numeric view of the value; durations count as numbers (seconds).
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) | Self::Duration(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn data_type(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Duration(_) => "duration",
            Self::Text(_) => "string",
            Self::Date(_) => "date",
        }
    }
}

/// A field value together with the text it was imported from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunField {
    pub value: FieldValue,
    pub raw_value: String,
    pub display_value: String,
    pub original_key: String,
}

impl RunField {
    /// Wrap an already-numeric value; the raw and display text are derived from it.
    #[must_use]
    pub fn number(original_key: &str, value: f64) -> Self {
        Self {
            value: FieldValue::Number(value),
            raw_value: value.to_string(),
            display_value: value.to_string(),
            original_key: original_key.to_string(),
        }
    }

    /// Type a raw report value based on its key and shape.
    #[must_use]
    pub fn from_raw(original_key: &str, raw: &str) -> Self {
        let name = to_field_name(original_key);
        let trimmed = raw.trim();
        let value = if DURATION_FIELDS.contains(&name.as_str()) {
            parse_duration(trimmed)
                .or_else(|| parse_game_number(trimmed))
                .map_or_else(|| FieldValue::Text(trimmed.to_string()), FieldValue::Duration)
        } else if let Some(number) = parse_game_number(trimmed) {
            FieldValue::Number(number)
        } else if let Some(date) = parse_timestamp(trimmed) {
            FieldValue::Date(date)
        } else {
            FieldValue::Text(trimmed.to_string())
        };
        Self {
            value,
            raw_value: raw.to_string(),
            display_value: trimmed.to_string(),
            original_key: original_key.to_string(),
        }
    }
}

/// One completed game session.
///
/// Runs are built once and then only read; there are no setters, and the
/// timestamp in particular never changes after construction.
///
/// Deserialization goes through the builders, so a stored tier of 0 reads
/// back as absent and a negative real time as 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredRun")]
pub struct Run {
    id: String,
    timestamp: NaiveDateTime,
    tier: Option<u32>,
    run_type: RunType,
    /// Real-time duration in seconds
    real_time: f64,
    fields: BTreeMap<String, RunField>,
}

/// Serialized shape of a [`Run`] before its invariants are applied
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRun {
    id: String,
    timestamp: NaiveDateTime,
    #[serde(default)]
    tier: Option<u32>,
    #[serde(default)]
    run_type: RunType,
    #[serde(default)]
    real_time: f64,
    #[serde(default)]
    fields: BTreeMap<String, RunField>,
}

impl From<StoredRun> for Run {
    fn from(stored: StoredRun) -> Self {
        let run = Self {
            fields: stored.fields,
            ..Self::new(stored.id, stored.timestamp, stored.run_type)
        }
        .with_real_time(stored.real_time);
        match stored.tier {
            Some(tier) => run.with_tier(tier),
            None => run,
        }
    }
}

impl Run {
    #[must_use]
    pub fn new(id: impl Into<String>, timestamp: NaiveDateTime, run_type: RunType) -> Self {
        Self {
            id: id.into(),
            timestamp,
            tier: None,
            run_type,
            real_time: 0.0,
            fields: BTreeMap::new(),
        }
    }

    /// Build a run from display-key/raw-text pairs, lifting `tier` and
    /// `realTime` out of the field map.
    #[must_use]
    pub fn from_raw_fields<I, K, V>(
        id: impl Into<String>,
        timestamp: NaiveDateTime,
        run_type: RunType,
        raw_fields: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut run = Self::new(id, timestamp, run_type);
        for (key, raw) in raw_fields {
            let key = key.as_ref();
            let name = to_field_name(key);
            if name.is_empty() {
                continue;
            }
            run.fields.insert(name, RunField::from_raw(key, raw.as_ref()));
        }
        if let Some(tier) = run
            .fields
            .get(TIER_FIELD)
            .and_then(|field| field.value.as_number())
            .and_then(f64_to_tier)
        {
            run.tier = Some(tier);
        }
        if let Some(seconds) = run
            .fields
            .get(REAL_TIME_FIELD)
            .and_then(|field| field.value.as_number())
        {
            run.real_time = seconds.max(0.0);
        }
        run
    }

    /// Set the tier; zero means "unknown" and clears it.
    #[must_use]
    pub fn with_tier(mut self, tier: u32) -> Self {
        self.tier = (tier > 0).then_some(tier);
        self
    }

    #[must_use]
    pub fn with_real_time(mut self, seconds: f64) -> Self {
        self.real_time = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, field: RunField) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Shorthand for a plain numeric field keyed by its own name.
    #[must_use]
    pub fn with_number(self, name: &str, value: f64) -> Self {
        self.with_field(name, RunField::number(name, value))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    #[must_use]
    pub const fn tier(&self) -> Option<u32> {
        self.tier
    }

    #[must_use]
    pub const fn run_type(&self) -> RunType {
        self.run_type
    }

    #[must_use]
    pub const fn real_time(&self) -> f64 {
        self.real_time
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, RunField> {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RunField> {
        self.fields.get(name)
    }
}

/// Lightweight handle identifying the run a statistic came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRef {
    pub id: String,
    pub timestamp: NaiveDateTime,
    pub tier: Option<u32>,
    pub real_time: f64,
}

impl From<&Run> for RunRef {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id.clone(),
            timestamp: run.timestamp,
            tier: run.tier,
            real_time: run.real_time,
        }
    }
}
