use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Result;
use rusqlite::{Connection, OpenFlags};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    daemon::{
        sink::{record::ActivityRecord, LogSink},
        snapshot::SnapshotReader,
    },
    utils::{
        clock::Clock,
        time::{history_micros_to_utc, utc_day_window, utc_to_history_micros},
    },
};

const VISITS_IN_WINDOW: &str = "\
    SELECT urls.url, visits.visit_time
    FROM visits
    JOIN urls ON visits.url = urls.id
    WHERE visits.visit_time >= ?1 AND visits.visit_time < ?2
    ORDER BY visits.visit_time ASC";

/// Periodically snapshots the browser history database and emits one record
/// per visit inside the current UTC day.
///
/// The window is recomputed every cycle, so it keeps extending as the day
/// progresses and visits are re-emitted within the day. Visits made before
/// the current day never appear, even right after a restart.
pub struct BrowserHistoryPoller {
    next: LogSink,
    reader: SnapshotReader,
    history_db: PathBuf,
    browser: Arc<str>,
    shutdown: CancellationToken,
    poll_interval: Duration,
    clock: Box<dyn Clock>,
    /// Highest native visit time seen so far. Diagnostic only, the window
    /// bounds the query by itself.
    cursor: i64,
}

impl BrowserHistoryPoller {
    pub fn new(
        next: LogSink,
        reader: SnapshotReader,
        history_db: PathBuf,
        browser: Arc<str>,
        shutdown: CancellationToken,
        poll_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            reader,
            history_db,
            browser,
            shutdown,
            poll_interval,
            clock,
            cursor: 0,
        }
    }

    /// Executes the poll loop until cancelled. A stop request takes effect at
    /// the next interval boundary.
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.clock.instant();
        loop {
            poll_point += self.poll_interval;

            if let Err(e) = self.poll_once().await {
                warn!("History poll failed {:?}", e);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(poll_point) => ()
            }
        }
    }

    async fn poll_once(&mut self) -> Result<()> {
        let snapshot = match self.reader.snapshot(&self.history_db).await {
            Ok(v) => v,
            Err(e) => {
                // Missing, or still busy after the retry budget. Wait for the
                // next cycle.
                warn!("Skipping history poll: {e}");
                return Ok(());
            }
        };

        let (window_start, window_end) = utc_day_window(self.clock.time());
        let visits = match query_visits(
            snapshot.path().to_owned(),
            utc_to_history_micros(window_start),
            utc_to_history_micros(window_end),
        )
        .await
        {
            Ok(v) => v,
            Err(e) => {
                // The copy may have caught the browser mid-write. Treated as
                // an empty result, the next snapshot will be consistent again.
                warn!("Query against history snapshot failed {:?}", e);
                Vec::new()
            }
        };

        debug!("{} visits in the current window", visits.len());
        for (url, visit_time) in visits {
            let Some(timestamp) = history_micros_to_utc(visit_time) else {
                warn!("Visit time {visit_time} is out of range");
                continue;
            };
            self.next.submit(ActivityRecord::BrowserHistory {
                timestamp,
                browser: self.browser.clone(),
                url,
            });
            self.cursor = self.cursor.max(visit_time);
        }
        Ok(())
        // The snapshot drops here, deleting the temporary copy.
    }
}

/// Runs the window query on the blocking pool; rusqlite is synchronous.
async fn query_visits(snapshot: PathBuf, from: i64, to: i64) -> Result<Vec<(String, i64)>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<(String, i64)>> {
        let connection = Connection::open_with_flags(
            &snapshot,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let mut statement = connection.prepare(VISITS_IN_WINDOW)?;
        let visits = statement
            .query_map([from, to], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(visits)
    })
    .await?
}
