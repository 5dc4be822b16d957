use std::path::PathBuf;

use anyhow::Result;
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::daemon::sink::{record::ActivityRecord, LogSink};

/// Event-driven source: emits a record for every modification below the
/// configured roots, exactly as the native notification facility reports
/// them. No debouncing or coalescing, a burst of native events produces
/// equally many records.
pub struct FileChangeWatcher {
    next: LogSink,
    directories: Vec<PathBuf>,
    shutdown: CancellationToken,
}

impl FileChangeWatcher {
    pub fn new(next: LogSink, directories: Vec<PathBuf>, shutdown: CancellationToken) -> Self {
        Self {
            next,
            directories,
            shutdown,
        }
    }

    /// Registers the watches and forwards events until cancelled. The notify
    /// backend delivers events on its own thread; an unbounded channel
    /// bridges them into this task.
    pub async fn run(self) -> Result<()> {
        let (events, mut receiver) = mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = recommended_watcher(move |event| {
            let _ = events.send(event);
        })?;

        for directory in &self.directories {
            if let Err(e) = watcher.watch(directory, RecursiveMode::Recursive) {
                // Telemetry stays best-effort, the remaining roots still count.
                warn!("Can't watch {directory:?}: {e}");
            }
        }

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = receiver.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        Ok(event) if matches!(event.kind, EventKind::Modify(_)) => {
                            for path in event.paths {
                                self.next.submit(ActivityRecord::FileChange { path });
                            }
                        }
                        Ok(_) => (),
                        Err(e) => warn!("Watch error {:?}", e),
                    }
                }
            }
        }

        // Dropping the watcher tears down every registered watch.
        Ok(())
    }
}
