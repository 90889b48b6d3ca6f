use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use towerstats_analytics::parse::parse_timestamp;
use towerstats_analytics::{Run, RunSource, RunType};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed run file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run #{index}: unreadable timestamp '{raw}'")]
    InvalidTimestamp { index: usize, raw: String },
    #[error("run #{index}: unknown run type '{raw}'")]
    InvalidRunType { index: usize, raw: String },
}

/// One entry of a run export file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunRecord {
    #[serde(default)]
    id: Option<String>,
    timestamp: String,
    #[serde(default)]
    tier: Option<u32>,
    #[serde(default)]
    run_type: Option<String>,
    /// Display key to raw cell text (numbers are accepted too)
    #[serde(default)]
    fields: serde_json::Map<String, Value>,
}

impl RunRecord {
    fn into_run(self, index: usize) -> Result<Run, LoadError> {
        let timestamp =
            parse_timestamp(&self.timestamp).ok_or_else(|| LoadError::InvalidTimestamp {
                index,
                raw: self.timestamp.clone(),
            })?;
        let run_type = match self.run_type.as_deref() {
            None => RunType::default(),
            Some(raw) => raw.parse().map_err(|_| LoadError::InvalidRunType {
                index,
                raw: raw.to_string(),
            })?,
        };
        let id = self
            .id
            .unwrap_or_else(|| format!("run-{}", timestamp.format("%Y%m%d-%H%M%S")));
        let raw_fields = self
            .fields
            .into_iter()
            .filter_map(|(key, value)| raw_text(value).map(|raw| (key, raw)));

        let run = Run::from_raw_fields(id, timestamp, run_type, raw_fields);
        Ok(match self.tier {
            Some(tier) => run.with_tier(tier),
            None => run,
        })
    }
}

fn raw_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

/// Decode a JSON array of run records.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or a record has an unreadable
/// timestamp or run type.
pub fn parse_runs(json: &str) -> Result<Vec<Run>, LoadError> {
    let records: Vec<RunRecord> = serde_json::from_str(json)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| record.into_run(index))
        .collect()
}

/// Runs read from a JSON export on disk
#[derive(Debug, Clone)]
pub struct JsonRunSource {
    path: PathBuf,
}

impl JsonRunSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RunSource for JsonRunSource {
    type Error = LoadError;

    fn load_runs(&self) -> Result<Vec<Run>, Self::Error> {
        let json = std::fs::read_to_string(&self.path).map_err(|source| LoadError::Io {
            path: self.path.clone(),
            source,
        })?;
        let runs = parse_runs(&json)?;
        log::debug!("loaded {} run(s) from {}", runs.len(), self.path.display());
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_become_typed_runs() {
        let json = r#"[
            {
                "id": "a",
                "timestamp": "2024-03-15T20:15:00",
                "runType": "Tournament",
                "fields": {
                    "Tier": "11",
                    "Real Time": "2h 30m",
                    "Coins Earned": "1.5M",
                    "Wave": 4200,
                    "Killed By": "Boss",
                    "Notes": null
                }
            },
            { "timestamp": "2024-03-16 08:00:00", "tier": 3, "fields": {} }
        ]"#;
        let runs = parse_runs(json).unwrap();
        assert_eq!(runs.len(), 2);

        let first = &runs[0];
        assert_eq!(first.id(), "a");
        assert_eq!(first.run_type(), RunType::Tournament);
        assert_eq!(first.tier(), Some(11));
        assert!((first.real_time() - 9000.0).abs() < f64::EPSILON);
        assert_eq!(
            first.field("coinsEarned").and_then(|f| f.value.as_number()),
            Some(1_500_000.0)
        );
        assert_eq!(
            first.field("wave").and_then(|f| f.value.as_number()),
            Some(4200.0)
        );
        assert!(first.field("notes").is_none());

        let second = &runs[1];
        assert_eq!(second.id(), "run-20240316-080000");
        assert_eq!(second.run_type(), RunType::Farm);
        assert_eq!(second.tier(), Some(3));
    }

    #[test]
    fn bad_records_are_reported_with_their_position() {
        let err = parse_runs(r#"[{"timestamp": "2024-01-01"}, {"timestamp": "yesterday"}]"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidTimestamp { index: 1, .. }));

        let err = parse_runs(r#"[{"timestamp": "2024-01-01", "runType": "speedrun"}]"#)
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidRunType { index: 0, .. }));

        assert!(matches!(parse_runs("{}"), Err(LoadError::Json(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let source = JsonRunSource::new("/definitely/not/here/runs.json");
        let err = source.load_runs().unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("runs.json"));
    }
}
