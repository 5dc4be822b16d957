use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::utils::clock::{Clock, DefaultClock};

pub mod args;
pub mod collection;
pub mod config;
pub mod shutdown;
pub mod sink;
pub mod snapshot;

use collection::{
    browser::BrowserHistoryPoller,
    files::FileChangeWatcher,
    git::{discover_repositories, GitChangePoller},
    DEFAULT_POLL_INTERVAL,
};
use config::Config;
use sink::LogSink;
use snapshot::{RetryPolicy, SnapshotReader};

/// Represents the starting point for the logger. Wires every component to
/// the sink, then runs them to completion.
///
/// The only fatal condition is a missing history database at startup; after
/// that, source failures are logged and the process keeps going.
pub async fn start_daemon(config: Config) -> Result<()> {
    if !config.history_db.exists() {
        bail!(
            "browser history database {:?} does not exist",
            config.history_db
        );
    }

    let (sink, writer) = sink::channel(config.log_destination.clone());
    let shutdown_token = CancellationToken::new();

    let repositories = discover_repositories(&config.directories);
    info!("Polling {} repositories", repositories.len());

    let browser = create_browser_poller(&config, sink.clone(), &shutdown_token, DefaultClock);
    let git = create_git_poller(repositories, sink.clone(), &shutdown_token, DefaultClock);
    let files = FileChangeWatcher::new(sink, config.directories.clone(), shutdown_token.clone());

    // Cancellation stops the sources; once their sink handles drop, the
    // writer drains what is left and exits. Sources always stop before the
    // sink this way.
    let (_, browser_result, git_result, files_result, writer_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        browser.run(),
        git.run(),
        files.run(),
        writer.run(),
    );

    for (component, result) in [
        ("browser poller", browser_result),
        ("git poller", git_result),
        ("file watcher", files_result),
        ("sink", writer_result),
    ] {
        if let Err(e) = result {
            error!("{component} finished with an error {:?}", e);
        }
    }

    Ok(())
}

fn create_browser_poller(
    config: &Config,
    next: LogSink,
    shutdown: &CancellationToken,
    clock: impl Clock,
) -> BrowserHistoryPoller {
    BrowserHistoryPoller::new(
        next,
        SnapshotReader::new(RetryPolicy::default()),
        config.history_db.clone(),
        config.browser.clone(),
        shutdown.clone(),
        DEFAULT_POLL_INTERVAL,
        Box::new(clock),
    )
}

fn create_git_poller(
    repositories: Vec<std::path::PathBuf>,
    next: LogSink,
    shutdown: &CancellationToken,
    clock: impl Clock,
) -> GitChangePoller {
    GitChangePoller::new(
        next,
        repositories,
        shutdown.clone(),
        DEFAULT_POLL_INTERVAL,
        Box::new(clock),
    )
}

#[cfg(test)]
mod daemon_tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::Utc;
    use rusqlite::Connection;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            collection::{browser::BrowserHistoryPoller, files::FileChangeWatcher},
            config::Config,
            sink::{self, record::ActivityRecord},
            snapshot::{RetryPolicy, SnapshotReader},
            start_daemon,
        },
        utils::{
            clock::DefaultClock,
            logging::TEST_LOGGING,
            time::utc_to_history_micros,
        },
    };

    #[tokio::test]
    async fn test_missing_history_database_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        let config = Config {
            directories: vec![dir.path().to_owned()],
            browser: "Edge".into(),
            log_destination: dir.path().join("activity.log"),
            history_db: dir.path().join("nonexistent/History"),
        };
        assert!(start_daemon(config).await.is_err());
        Ok(())
    }

    /// Smoke test over browser poller, file watcher, and sink together:
    /// everything submitted before shutdown ends up in the log file.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_test_components() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let watched = dir.path().join("watched");
        std::fs::create_dir_all(&watched)?;
        let tracked = watched.join("tracked.txt");
        std::fs::write(&tracked, "before")?;

        let history_db = dir.path().join("History");
        let connection = Connection::open(&history_db)?;
        connection.execute_batch(
            "CREATE TABLE urls (id INTEGER PRIMARY KEY, url TEXT NOT NULL);
             CREATE TABLE visits (id INTEGER PRIMARY KEY, url INTEGER NOT NULL, visit_time INTEGER NOT NULL);
             INSERT INTO urls (id, url) VALUES (1, 'https://example.com/');",
        )?;
        connection.execute(
            "INSERT INTO visits (id, url, visit_time) VALUES (1, 1, ?1)",
            [utc_to_history_micros(Utc::now())],
        )?;
        drop(connection);

        let destination = dir.path().join("log/activity.log");
        let (sink, module) = sink::channel(destination.clone());
        let shutdown_token = CancellationToken::new();

        let browser = BrowserHistoryPoller::new(
            sink.clone(),
            SnapshotReader::new(RetryPolicy::default()),
            history_db,
            "Edge".into(),
            shutdown_token.clone(),
            Duration::from_secs(60),
            Box::new(DefaultClock),
        );
        let files = FileChangeWatcher::new(
            sink,
            vec![watched.clone()],
            shutdown_token.clone(),
        );

        let (_, browser_result, files_result, writer_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                std::fs::write(&tracked, "after").unwrap();
                tokio::time::sleep(Duration::from_millis(500)).await;
                shutdown_token.cancel()
            },
            browser.run(),
            files.run(),
            module.run(),
        );
        browser_result?;
        files_result?;
        writer_result?;

        let written = std::fs::read_to_string(&destination)?;
        let records = written
            .lines()
            .map(serde_json::from_str::<ActivityRecord>)
            .collect::<Result<Vec<_>, _>>()?;

        assert!(records.iter().any(|record| matches!(
            record,
            ActivityRecord::BrowserHistory { url, .. } if url == "https://example.com/"
        )));
        assert!(records.iter().any(|record| matches!(
            record,
            ActivityRecord::FileChange { path } if path.ends_with("tracked.txt")
        )));
        Ok(())
    }
}
