//! Threshold evaluation for numeric and binary sensors.
//!
//! Everything in here is stateless: evaluators map a reading plus its
//! configuration to the set of conditions that currently hold. Deciding
//! which alarms exist is the orchestrator's job.

pub mod band;
pub mod binary;
pub mod level;

pub use band::{BandEvaluation, SensorConfig, Thresholds, evaluate_band};
pub use binary::{BinarySensorConfig, evaluate_binary};
pub use level::{ResolutionMode, ThresholdLevel};
