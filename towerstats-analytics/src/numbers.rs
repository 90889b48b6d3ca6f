//! Numeric conversion helpers centralizing safe numeric casts and rate math.

use num_traits::cast::cast;

/// Seconds in one hour, the normalization window for hourly rates.
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Nearest-rank index for `fraction` over a sorted slice of `len` items.
///
/// Returns `floor(fraction * len)` clamped to `len - 1`. Callers must not
/// pass `len == 0`; the result is 0 in that case.
#[must_use]
pub fn nearest_rank_index(fraction: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    let raw = (fraction * usize_to_f64(len)).floor();
    if !raw.is_finite() || raw <= 0.0 {
        return 0;
    }
    cast::<f64, usize>(raw).map_or(last, |idx| idx.min(last))
}

/// Share of `part` in `whole` as a percentage, 0 when `whole` is not positive.
#[must_use]
pub fn percentage_of(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

/// Normalize `value` earned over `seconds` to a per-hour rate.
///
/// `None` when the duration is zero, negative, or not finite.
#[must_use]
pub fn hourly_rate(value: f64, seconds: f64) -> Option<f64> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some(value / seconds * SECONDS_PER_HOUR)
}

/// Round a duration to whole seconds; negative or non-finite input gives 0.
#[must_use]
pub fn whole_seconds(seconds: f64) -> u64 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    cast::<f64, u64>(seconds.round()).unwrap_or(u64::MAX)
}

/// Round a f64 and clamp it to the u32 range, returning `None` for NaN or negatives.
#[must_use]
pub fn f64_to_tier(value: f64) -> Option<u32> {
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    let max = cast::<u32, f64>(u32::MAX).unwrap_or(f64::MAX);
    cast::<f64, u32>(value.round().min(max))
}
