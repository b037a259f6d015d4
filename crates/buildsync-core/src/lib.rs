//! Foundational low-level utilities shared across buildsync crates.
//!
//! Provides atomic file-write helpers for persisted syncer state and time
//! utilities used by snapshots and integration summaries.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{
    current_unix_timestamp, current_unix_timestamp_ms, format_natural_duration, rfc3339_from_unix,
};
