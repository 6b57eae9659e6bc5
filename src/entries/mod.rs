//! Configuration entries.
//!
//! The configuration set is an ordered list of entries: one setup marker plus
//! one entry per monitored sensor. Entries are validated when accepted, so the
//! monitor only ever sees well-formed [`SensorConfig`](crate::thresholds::SensorConfig)s.

pub mod entry;
pub mod store;

pub use entry::{ConfigEntry, EntryData, SensorForm};
pub use store::ConfigEntries;
