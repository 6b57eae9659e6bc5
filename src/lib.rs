//! Easy Thresholds library.
//!
//! Evaluates numeric and binary sensor readings against configurable
//! threshold bands and keeps the set of active alarms, with debounced
//! notifications and a guarded clear-alarm service.

pub mod alarms;
pub mod config;
pub mod entries;
pub mod error;
pub mod input;
pub mod monitor;
pub mod thresholds;
