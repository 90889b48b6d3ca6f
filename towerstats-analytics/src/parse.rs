//! Raw battle-report value parsing.
//!
//! Game reports display large numbers with magnitude suffixes (`12.5M`,
//! `3.1q`) and durations as `1d 2h 3m 4s`. These helpers turn the raw
//! strings into plain numbers so the analytics never see display text.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Magnitude suffixes used by the game, smallest first.
const MAGNITUDE_SUFFIXES: [(char, f64); 11] = [
    ('K', 1e3),
    ('M', 1e6),
    ('B', 1e9),
    ('T', 1e12),
    ('q', 1e15),
    ('Q', 1e18),
    ('s', 1e21),
    ('S', 1e24),
    ('O', 1e27),
    ('N', 1e30),
    ('D', 1e33),
];

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?(?:\d+\.?\d*|\.\d+))\s*([KMBTqQsSOND])?$").expect("number pattern")
});

static DURATION_PART_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*([dhms])").expect("duration pattern"));

static CLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{2})$").expect("clock pattern"));

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Convert a display key such as `"Coins From Death Wave"` into the
/// camelCase field name used for lookups (`coinsFromDeathWave`).
///
/// Keys that are already camelCase pass through unchanged.
#[must_use]
pub fn to_field_name(display_key: &str) -> String {
    let mut name = String::with_capacity(display_key.len());
    for (idx, word) in display_key
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        let Some(first) = chars.next() else {
            continue;
        };
        if idx == 0 {
            name.push(first.to_ascii_lowercase());
        } else {
            name.push(first.to_ascii_uppercase());
        }
        name.extend(chars);
    }
    name
}

/// Parse a game-formatted number (`"1,234"`, `"12.5M"`, `"x3.1"`, `"$4.2q"`).
#[must_use]
pub fn parse_game_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['x', '$'])
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    let captures = NUMBER_PATTERN.captures(cleaned.trim())?;
    let base: f64 = captures.get(1)?.as_str().parse().ok()?;
    let multiplier = captures
        .get(2)
        .and_then(|m| m.as_str().chars().next())
        .and_then(|suffix| {
            MAGNITUDE_SUFFIXES
                .iter()
                .find(|(symbol, _)| *symbol == suffix)
                .map(|(_, factor)| *factor)
        })
        .unwrap_or(1.0);
    let value = base * multiplier;
    value.is_finite().then_some(value)
}

/// Parse a duration such as `"1d 2h 3m 4s"`, `"2h3m"` or `"1:02:03"` into seconds.
///
/// Every non-whitespace character must belong to a recognized component.
#[must_use]
pub fn parse_duration(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(captures) = CLOCK_PATTERN.captures(trimmed) {
        let hours: f64 = match captures.get(1) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0.0,
        };
        let minutes: f64 = captures.get(2)?.as_str().parse().ok()?;
        let seconds: f64 = captures.get(3)?.as_str().parse().ok()?;
        return Some(hours * 3600.0 + minutes * 60.0 + seconds);
    }

    let mut total = 0.0;
    let mut consumed = 0usize;
    let mut matched_any = false;
    for captures in DURATION_PART_PATTERN.captures_iter(trimmed) {
        let whole = captures.get(0)?;
        if !trimmed[consumed..whole.start()].trim().is_empty() {
            return None;
        }
        consumed = whole.end();
        let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
        let unit = match captures.get(2)?.as_str() {
            "d" => 86_400.0,
            "h" => 3_600.0,
            "m" => 60.0,
            _ => 1.0,
        };
        total += amount * unit;
        matched_any = true;
    }
    if !matched_any || !trimmed[consumed..].trim().is_empty() {
        return None;
    }
    Some(total)
}

/// Parse a timestamp into local wall-clock time.
///
/// Accepts naive ISO-8601 (with `T` or space, optional fraction), RFC 3339
/// with an offset (converted to the local zone), and bare dates (midnight).
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(with_offset.with_timezone(&Local).naive_local());
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_names_are_camel_cased() {
        assert_eq!(to_field_name("Coins Earned"), "coinsEarned");
        assert_eq!(to_field_name("Coins From Death Wave"), "coinsFromDeathWave");
        assert_eq!(to_field_name("Real Time"), "realTime");
        assert_eq!(to_field_name("coinsEarned"), "coinsEarned");
        assert_eq!(to_field_name("  Damage   Dealt "), "damageDealt");
        assert_eq!(to_field_name("Tier"), "tier");
    }

    #[test]
    fn patterns_compile() {
        assert!(NUMBER_PATTERN.is_match("12.5M"));
        assert!(DURATION_PART_PATTERN.is_match("3m"));
        assert!(CLOCK_PATTERN.is_match("1:02:03"));
    }

    #[test]
    fn game_numbers_expand_suffixes() {
        assert_eq!(parse_game_number("1,234"), Some(1234.0));
        assert_eq!(parse_game_number("12.5M"), Some(12_500_000.0));
        assert_eq!(parse_game_number("3K"), Some(3000.0));
        assert_eq!(parse_game_number("2q"), Some(2e15));
        assert_eq!(parse_game_number("x1.5"), Some(1.5));
        assert_eq!(parse_game_number("$7B"), Some(7e9));
        assert_eq!(parse_game_number("-4"), Some(-4.0));
        assert_eq!(parse_game_number("Boss"), None);
        assert_eq!(parse_game_number(""), None);
        assert_eq!(parse_game_number("5X"), None);
    }

    #[test]
    fn durations_sum_components() {
        assert_eq!(parse_duration("1h 2m 3s"), Some(3723.0));
        assert_eq!(parse_duration("1d 0h"), Some(86_400.0));
        assert_eq!(parse_duration("2h3m"), Some(7380.0));
        assert_eq!(parse_duration("45m"), Some(2700.0));
        assert_eq!(parse_duration("1:02:03"), Some(3723.0));
        assert_eq!(parse_duration("02:03"), Some(123.0));
        assert_eq!(parse_duration("2h oops"), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn timestamps_accept_common_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(10, 30, 0))
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-15T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15 10:30:00.000"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-15 10:30"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-15"),
            NaiveDate::from_ymd_opt(2024, 3, 15).and_then(|d| d.and_hms_opt(0, 0, 0))
        );
        assert!(parse_timestamp("2024-03-15T10:30:00Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
