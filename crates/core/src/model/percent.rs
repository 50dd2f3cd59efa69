use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Error for integer inputs outside 0..=100.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("percent out of range: {0}")]
pub struct PercentOutOfRange(pub i64);

/// Completion percentage, always an integer in 0..=100.
///
/// Every write path constructs a `Percent` through [`Percent::from_raw`],
/// which rounds and clamps, so a stored value can never violate the range
/// invariant.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    /// Rounds `raw` to the nearest integer and clamps it into 0..=100.
    ///
    /// NaN maps to 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_raw(raw: f64) -> Self {
        if raw.is_nan() {
            return Self::ZERO;
        }
        let rounded = raw.round();
        if rounded <= 0.0 {
            Self::ZERO
        } else if rounded >= 100.0 {
            Self::COMPLETE
        } else {
            Self(rounded as u8)
        }
    }

    /// Returns the underlying u8 value
    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Returns true when the module is fully viewed.
    #[must_use]
    pub fn is_complete(self) -> bool {
        self.0 == 100
    }

    /// Scroll-position heuristic: fraction of slides viewed when the slide
    /// at zero-based `index` out of `total` is visible.
    ///
    /// `total == 0` yields 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_slide_position(index: usize, total: usize) -> Self {
        if total == 0 {
            return Self::ZERO;
        }
        Self::from_raw((index as f64 + 1.0) / total as f64 * 100.0)
    }

    /// Arithmetic mean of percentages, rounded and clamped.
    ///
    /// Empty input yields 0 by definition, not an error.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(values: &[Percent]) -> Self {
        if values.is_empty() {
            return Self::ZERO;
        }
        let sum: u32 = values.iter().map(|p| u32::from(p.0)).sum();
        Self::from_raw(f64::from(sum) / values.len() as f64)
    }
}

impl TryFrom<i64> for Percent {
    type Error = PercentOutOfRange;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Percent)
            .ok_or(PercentOutOfRange(value))
    }
}

impl fmt::Debug for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Percent({})", self.0)
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Percent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Percent {
    /// Persisted values outside 0..=100 are clamped on read rather than
    /// rejected, so a corrupted snapshot entry degrades to a valid value.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Self::from_raw(raw))
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_clamps_above_range() {
        assert_eq!(Percent::from_raw(137.0), Percent::COMPLETE);
    }

    #[test]
    fn from_raw_clamps_below_range() {
        assert_eq!(Percent::from_raw(-20.0), Percent::ZERO);
    }

    #[test]
    fn from_raw_rounds_to_nearest() {
        assert_eq!(Percent::from_raw(49.4).value(), 49);
        assert_eq!(Percent::from_raw(49.5).value(), 50);
        assert_eq!(Percent::from_raw(72.0).value(), 72);
    }

    #[test]
    fn from_raw_maps_nan_to_zero() {
        assert_eq!(Percent::from_raw(f64::NAN), Percent::ZERO);
    }

    #[test]
    fn try_from_rejects_out_of_range() {
        assert_eq!(Percent::try_from(100), Ok(Percent::COMPLETE));
        assert_eq!(Percent::try_from(101), Err(PercentOutOfRange(101)));
        assert_eq!(Percent::try_from(-1), Err(PercentOutOfRange(-1)));
    }

    #[test]
    fn slide_position_heuristic() {
        // round((index + 1) / total * 100)
        assert_eq!(Percent::from_slide_position(0, 4).value(), 25);
        assert_eq!(Percent::from_slide_position(2, 3).value(), 100);
        assert_eq!(Percent::from_slide_position(0, 3).value(), 33);
    }

    #[test]
    fn slide_position_with_no_slides_is_zero() {
        assert_eq!(Percent::from_slide_position(0, 0), Percent::ZERO);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(Percent::mean(&[]), Percent::ZERO);
    }

    #[test]
    fn mean_rounds_result() {
        let values = [
            Percent::from_raw(100.0),
            Percent::from_raw(50.0),
            Percent::from_raw(0.0),
        ];
        assert_eq!(Percent::mean(&values).value(), 50);

        let values = [Percent::from_raw(33.0), Percent::from_raw(34.0)];
        // (33 + 34) / 2 = 33.5 rounds to 34
        assert_eq!(Percent::mean(&values).value(), 34);
    }

    #[test]
    fn deserialization_clamps_corrupted_values() {
        let p: Percent = serde_json::from_str("250").unwrap();
        assert_eq!(p, Percent::COMPLETE);
        let p: Percent = serde_json::from_str("-5").unwrap();
        assert_eq!(p, Percent::ZERO);
    }

    #[test]
    fn serializes_as_bare_integer() {
        let raw = serde_json::to_string(&Percent::from_raw(75.0)).unwrap();
        assert_eq!(raw, "75");
    }
}
