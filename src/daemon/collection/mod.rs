//! Producers of activity records. Each source runs as its own task, owns its
//! private state (cursor, repository list, watch set), and only meets the
//! rest of the system through the [LogSink](super::sink::LogSink) it holds.
//! Records from one source keep that source's order; nothing is guaranteed
//! across sources.

pub mod browser;
pub mod files;
pub mod git;

use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
