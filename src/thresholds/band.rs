//! Threshold band evaluator.
//!
//! A numeric reading falls into exactly one of five bands:
//!
//! ```text
//!   CRITICAL_LOW | WARNING_LOW |      safe       | WARNING_HIGH | CRITICAL_HIGH
//! ---------------+-------------+-----------------+--------------+---------------
//!              s_minus_minus  s_minus          s_plus        s_plus_plus
//! ```
//!
//! Lower boundaries are inclusive on the upper band (`s_minus_minus <= v < s_minus`
//! is WARNING_LOW), upper boundaries inclusive on the lower band
//! (`s_plus < v <= s_plus_plus` is WARNING_HIGH). The safe range
//! `[s_minus, s_plus]` is closed.

use super::level::{ResolutionMode, ThresholdLevel};
use crate::error::{Result, ThresholdsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Four strictly increasing boundaries.
///
/// Only constructible through [`Thresholds::new`], so evaluation never has to
/// re-check the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThresholds", into = "RawThresholds")]
pub struct Thresholds {
    s_minus_minus: f64,
    s_minus: f64,
    s_plus: f64,
    s_plus_plus: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawThresholds {
    s_minus_minus: f64,
    s_minus: f64,
    s_plus: f64,
    s_plus_plus: f64,
}

impl TryFrom<RawThresholds> for Thresholds {
    type Error = ThresholdsError;

    fn try_from(raw: RawThresholds) -> Result<Self> {
        Thresholds::new(raw.s_minus_minus, raw.s_minus, raw.s_plus, raw.s_plus_plus)
    }
}

impl From<Thresholds> for RawThresholds {
    fn from(t: Thresholds) -> Self {
        Self {
            s_minus_minus: t.s_minus_minus,
            s_minus: t.s_minus,
            s_plus: t.s_plus,
            s_plus_plus: t.s_plus_plus,
        }
    }
}

impl Thresholds {
    /// Validate and build a set of boundaries.
    ///
    /// Fails with [`ThresholdsError::InvalidThresholds`] unless
    /// `s_minus_minus < s_minus < s_plus < s_plus_plus`. NaN never satisfies
    /// the ordering and is rejected the same way.
    pub fn new(s_minus_minus: f64, s_minus: f64, s_plus: f64, s_plus_plus: f64) -> Result<Self> {
        if s_minus_minus < s_minus && s_minus < s_plus && s_plus < s_plus_plus {
            Ok(Self {
                s_minus_minus,
                s_minus,
                s_plus,
                s_plus_plus,
            })
        } else {
            Err(ThresholdsError::InvalidThresholds)
        }
    }

    pub fn critical_low(&self) -> f64 {
        self.s_minus_minus
    }

    pub fn warning_low(&self) -> f64 {
        self.s_minus
    }

    pub fn warning_high(&self) -> f64 {
        self.s_plus
    }

    pub fn critical_high(&self) -> f64 {
        self.s_plus_plus
    }

    /// Band the value falls into, `None` for the safe range.
    pub fn classify(&self, value: f64) -> Option<ThresholdLevel> {
        if value < self.s_minus_minus {
            Some(ThresholdLevel::CriticalLow)
        } else if value < self.s_minus {
            Some(ThresholdLevel::WarningLow)
        } else if value > self.s_plus_plus {
            Some(ThresholdLevel::CriticalHigh)
        } else if value > self.s_plus {
            Some(ThresholdLevel::WarningHigh)
        } else {
            None
        }
    }

    /// `s_minus <= value <= s_plus`, independent of which levels are active.
    pub fn in_safe_range(&self, value: f64) -> bool {
        self.s_minus <= value && value <= self.s_plus
    }
}

/// Validated configuration of one monitored numeric sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub sensor_entity: String,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    pub active_thresholds: BTreeSet<ThresholdLevel>,
    pub resolution_mode: ResolutionMode,
}

impl SensorConfig {
    pub fn is_active(&self, level: ThresholdLevel) -> bool {
        self.active_thresholds.contains(&level)
    }
}

/// Outcome of evaluating one reading.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BandEvaluation {
    /// Active levels breached by the reading, low side first.
    pub triggered: Vec<ThresholdLevel>,
    pub in_safe_range: bool,
}

/// Evaluate a reading against a sensor's bands.
///
/// Per side only the outermost breached band is reported, so a critical
/// breach suppresses the warning on the same side. A breached level that is
/// not active is not reported and does not fall back to the inner level.
pub fn evaluate_band(value: f64, config: &SensorConfig) -> BandEvaluation {
    let triggered = config
        .thresholds
        .classify(value)
        .filter(|level| config.is_active(*level))
        .into_iter()
        .collect();

    BandEvaluation {
        triggered,
        in_safe_range: config.thresholds.in_safe_range(value),
    }
}
