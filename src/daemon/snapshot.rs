//! Snapshot-copy access to a live database file.
//!
//! The browser keeps its history database open and takes exclusive locks
//! while writing, so querying it in place can block or fail at any moment.
//! Copying the file first sidesteps the lock contention entirely; the copy is
//! at most one poll interval stale, which is acceptable for telemetry. The
//! copy may still catch the browser mid-write, in which case the query
//! against it fails and the cycle is retried on the next tick.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

/// Failure to obtain a consistent copy of the source database.
#[derive(Debug, Error)]
pub enum CopyError {
    #[error("snapshot source {0:?} does not exist")]
    Missing(PathBuf),
    #[error("failed to copy {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bounded retry applied to transient copy failures, independent of the
/// poller's own scheduling interval.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// A temporary read-only copy of the source database, scoped to one poll
/// cycle. The backing file is removed when the snapshot is dropped, on every
/// exit path.
pub struct HistorySnapshot {
    file: NamedTempFile,
}

impl HistorySnapshot {
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

pub struct SnapshotReader {
    retry: RetryPolicy,
    temp_dir: Option<PathBuf>,
}

impl SnapshotReader {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            retry,
            temp_dir: None,
        }
    }

    /// Places snapshot copies in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    /// Copies `source` to a fresh temporary file. A missing source fails
    /// immediately; any other failure is retried with a fixed delay before
    /// giving up for this cycle.
    pub async fn snapshot(&self, source: &Path) -> Result<HistorySnapshot, CopyError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_copy(source).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e @ CopyError::Missing(_)) => return Err(e),
                Err(e) if attempt < self.retry.max_attempts => {
                    warn!("snapshot attempt {attempt} of {source:?} failed, retrying: {e}");
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_copy(&self, source: &Path) -> Result<HistorySnapshot, CopyError> {
        let file = match &self.temp_dir {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(|e| CopyError::Io {
            path: source.to_owned(),
            source: e,
        })?;

        match tokio::fs::copy(source, file.path()).await {
            Ok(_) => Ok(HistorySnapshot { file }),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(CopyError::Missing(source.to_owned())),
            Err(e) => Err(CopyError::Io {
                path: source.to_owned(),
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use tempfile::tempdir;

    use super::{CopyError, RetryPolicy, SnapshotReader};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_snapshot_copies_contents() -> Result<()> {
        let source_dir = tempdir()?;
        let temp_dir = tempdir()?;
        let source = source_dir.path().join("History");
        std::fs::write(&source, b"payload")?;

        let reader =
            SnapshotReader::new(fast_retry()).with_temp_dir(temp_dir.path().to_owned());
        let snapshot = reader.snapshot(&source).await?;

        assert_ne!(snapshot.path(), source);
        assert_eq!(std::fs::read(snapshot.path())?, b"payload");

        drop(snapshot);
        assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_source_fails_without_orphans() -> Result<()> {
        let temp_dir = tempdir()?;
        let reader =
            SnapshotReader::new(fast_retry()).with_temp_dir(temp_dir.path().to_owned());

        let result = reader
            .snapshot(std::path::Path::new("/nonexistent/History"))
            .await;
        assert!(matches!(result, Err(CopyError::Missing(_))));
        assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_source_retries_then_fails() -> Result<()> {
        let source_dir = tempdir()?;
        let temp_dir = tempdir()?;

        let reader =
            SnapshotReader::new(fast_retry()).with_temp_dir(temp_dir.path().to_owned());
        // A directory can't be copied as a file, and it exists, so every
        // attempt fails with a non-NotFound error.
        let result = reader.snapshot(source_dir.path()).await;

        assert!(matches!(result, Err(CopyError::Io { .. })));
        assert_eq!(std::fs::read_dir(temp_dir.path())?.count(), 0);
        Ok(())
    }
}
