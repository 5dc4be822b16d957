use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    daemon::sink::{
        record::{ActivityRecord, ChangedFile},
        LogSink,
    },
    utils::clock::Clock,
};

/// Polls every discovered repository with `git status --porcelain` and
/// aggregates a repository's changes into one record per cycle.
///
/// The repository set is fixed at construction; working trees created later
/// are picked up on the next process start.
pub struct GitChangePoller {
    next: LogSink,
    repositories: Vec<PathBuf>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
}

impl GitChangePoller {
    pub fn new(
        next: LogSink,
        repositories: Vec<PathBuf>,
        shutdown: CancellationToken,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            repositories,
            shutdown,
            poll_interval,
            clock,
        }
    }

    /// Executes the poll loop until cancelled. A stop request takes effect at
    /// the next interval boundary.
    pub async fn run(self) -> Result<()> {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;

            self.poll_once().await;

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }

    async fn poll_once(&self) {
        for repository in &self.repositories {
            match repository_status(repository).await {
                Ok(changes) if changes.is_empty() => (),
                Ok(changes) => {
                    debug!("{} changes in {repository:?}", changes.len());
                    self.next.submit(ActivityRecord::GitChange {
                        timestamp: self.clock.time(),
                        repository: repository.clone(),
                        changes,
                    });
                }
                // One broken repository must not starve the others.
                Err(e) => warn!("Status of {repository:?} failed {:?}", e),
            }
        }
    }
}

/// Finds every directory under `roots` marked by a `.git` subdirectory. The
/// marker itself is never entered, so markers nested inside a marker don't
/// produce repositories; the rest of a repository is still walked, which
/// means working trees nested under another one are discovered on their own.
pub fn discover_repositories(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut repositories = Vec::new();
    for root in roots {
        let mut pending = vec![root.clone()];
        while let Some(directory) = pending.pop() {
            let entries = match std::fs::read_dir(&directory) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Can't scan {directory:?}: {e}");
                    continue;
                }
            };

            let mut is_repository = false;
            for entry in entries.flatten() {
                let file_type = match entry.file_type() {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if !file_type.is_dir() {
                    continue;
                }
                if entry.file_name() == ".git" {
                    is_repository = true;
                } else {
                    pending.push(entry.path());
                }
            }
            if is_repository {
                repositories.push(directory);
            }
        }
    }
    repositories.sort();
    repositories
}

async fn repository_status(repository: &Path) -> Result<Vec<ChangedFile>> {
    let output = Command::new("git")
        .arg("-C")
        .arg(repository)
        .args(["status", "--porcelain"])
        .output()
        .await
        .context("failed to run git")?;

    if !output.status.success() {
        bail!(
            "git status exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(parse_porcelain(&String::from_utf8_lossy(&output.stdout)))
}

/// Splits every non-empty porcelain line into a status code and a path on
/// the first run of whitespace.
fn parse_porcelain(output: &str) -> Vec<ChangedFile> {
    output
        .lines()
        .filter_map(|line| {
            let (status, file) = line.trim_start().split_once(char::is_whitespace)?;
            let file = file.trim_start();
            if file.is_empty() {
                return None;
            }
            Some(ChangedFile {
                file: file.to_string(),
                status: status.to_string(),
            })
        })
        .collect()
}
