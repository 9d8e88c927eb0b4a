//! Default values for settings documents.
//!
//! # Design
//! - Centralize defaults so the model, loader, and validation agree.

/// Sampling period in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 2_000;
/// Shortest accepted sampling period in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 100;
/// Longest accepted sampling period in milliseconds.
pub const MAX_TICK_INTERVAL_MS: u64 = 3_600_000;
/// Pending session commands before callers wait.
pub const COMMAND_BUFFER: usize = 128;
/// Events retained for replay.
pub const EVENT_BUFFER: usize = 1_024;
/// Log level when nothing else is configured.
pub const LOG_LEVEL: &str = "info";
