//! Single-writer append log shared by every source.
//!
//! Producers hold a cloneable [LogSink] and submit records without blocking.
//! The [SinkModule] is the only owner of the destination file: it drains the
//! queue in order, writes one JSON line per record, and flushes after every
//! write so a crash loses at most the in-flight record. Dropping the last
//! [LogSink] closes the queue; joining [SinkModule::run] after that point
//! guarantees everything submitted earlier is durably written.

pub mod record;

use std::path::PathBuf;

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::mpsc,
};
use tracing::{debug, error, warn};

use record::ActivityRecord;

/// Producer handle to the activity log. `submit` enqueues and returns; it is
/// safe to call from any number of tasks concurrently.
#[derive(Clone)]
pub struct LogSink {
    sender: mpsc::UnboundedSender<ActivityRecord>,
}

impl LogSink {
    pub fn submit(&self, record: ActivityRecord) {
        if self.sender.send(record).is_err() {
            // Only possible once the writer is gone, during shutdown.
            warn!("activity sink is closed, dropping record");
        }
    }
}

/// Creates the producer handle and the consuming writer for `destination`.
pub fn channel(destination: PathBuf) -> (LogSink, SinkModule) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        LogSink { sender },
        SinkModule {
            receiver,
            destination,
        },
    )
}

/// Consuming half of the activity log. Owns the destination file for the
/// whole process lifetime.
pub struct SinkModule {
    receiver: mpsc::UnboundedReceiver<ActivityRecord>,
    destination: PathBuf,
}

impl SinkModule {
    /// Executes the writer event loop. Returns after every producer handle
    /// has been dropped and all queued records are on disk.
    pub async fn run(mut self) -> Result<()> {
        if let Some(parent) = self.destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = File::options()
            .append(true)
            .create(true)
            .open(&self.destination)
            .await?;

        // Semi-safe acquire-release for the destination file
        file.lock_exclusive()?;
        let result = self.consume(&mut file).await;
        file.unlock_async().await?;
        result
    }

    async fn consume(&mut self, file: &mut File) -> Result<()> {
        while let Some(record) = self.receiver.recv().await {
            debug!("Writing record {:?}", record);
            if let Err(e) = Self::append_record(file, &record).await {
                error!("Error writing record {:?}: {e:?}", record);
            }
        }

        self.receiver.close();
        file.flush().await?;
        Ok(())
    }

    async fn append_record(file: &mut File, record: &ActivityRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
