//! Best-effort activity logger for a single machine. Polls the browser's
//! history database, polls git working trees, watches directories for
//! modifications, and appends every observation as one JSON record per line.
//!

pub mod daemon;
pub mod utils;
