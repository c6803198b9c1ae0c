//! Validated quality/confidence scores.

use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A quality or confidence score in `0..=100`.
///
/// Thresholds are scores too, so a gate never compares against a value
/// that could not have been produced by a stage.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    /// Lowest possible score.
    pub const MIN: Self = Self(0.0);
    /// Highest possible score.
    pub const MAX: Self = Self(100.0);

    /// Creates a score, rejecting NaN and values outside `0..=100`.
    pub fn new(value: f64) -> Result<Self, GateError> {
        if value.is_nan() || !(0.0..=100.0).contains(&value) {
            return Err(GateError::InvalidScore(value));
        }
        Ok(Self(value))
    }

    /// Creates a score from a `0.0..=1.0` confidence ratio.
    pub fn from_ratio(ratio: f64) -> Result<Self, GateError> {
        Self::new(ratio * 100.0).map_err(|_| GateError::InvalidScore(ratio))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Score {
    type Error = GateError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
