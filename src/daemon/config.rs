use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::utils::dir::home_dir;

/// The activity log always lands here, relative to the working directory,
/// regardless of what the config file says.
pub const DEFAULT_LOG_DESTINATION: &str = "log/activity.log";

/// History database of the browser being observed. Not configurable.
const HISTORY_DB_RELATIVE: &str = ".config/microsoft-edge/Default/History";

/// Options recognized in the JSON config file. Every field is optional;
/// omitted ones fall back to defaults, so a partial file merges over them.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    directories: Option<Vec<PathBuf>>,
    browser: Option<Arc<str>>,
    log_destination: Option<PathBuf>,
}

/// Resolved configuration, loaded once at startup and never reloaded.
#[derive(Debug, Clone)]
pub struct Config {
    /// Roots that are both watched for file changes and scanned for
    /// repositories.
    pub directories: Vec<PathBuf>,
    /// Display label stamped into browser records.
    pub browser: Arc<str>,
    pub log_destination: PathBuf,
    pub history_db: PathBuf,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        Self::load_with_home(path, home_dir()?)
    }

    fn load_with_home(path: &Path, home: PathBuf) -> Result<Config> {
        let raw = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {path:?}"))?;
            serde_json::from_str::<RawConfig>(&contents)
                .with_context(|| format!("failed to parse config {path:?}"))?
        } else {
            RawConfig::default()
        };

        if let Some(requested) = &raw.log_destination {
            debug!("config log_destination {requested:?} is ignored, the log stays local");
        }

        Ok(Config {
            directories: raw.directories.unwrap_or_else(|| vec![home.clone()]),
            browser: raw.browser.unwrap_or_else(|| "Chrome".into()),
            log_destination: PathBuf::from(DEFAULT_LOG_DESTINATION),
            history_db: home.join(HISTORY_DB_RELATIVE),
        })
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() -> Result<()> {
        let home = PathBuf::from("/home/someone");
        let config =
            Config::load_with_home(Path::new("/nonexistent/config.json"), home.clone())?;

        assert_eq!(config.directories, vec![home.clone()]);
        assert_eq!(&*config.browser, "Chrome");
        assert_eq!(config.log_destination, PathBuf::from("log/activity.log"));
        assert_eq!(
            config.history_db,
            home.join(".config/microsoft-edge/Default/History")
        );
        Ok(())
    }

    #[test]
    fn test_partial_file_merges_over_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"browser": "Edge"}"#)?;

        let config = Config::load_with_home(&path, PathBuf::from("/home/someone"))?;
        assert_eq!(&*config.browser, "Edge");
        assert_eq!(config.directories, vec![PathBuf::from("/home/someone")]);
        Ok(())
    }

    #[test]
    fn test_log_destination_is_forced_local() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"directories": ["/srv/code"], "log_destination": "/var/log/elsewhere.log"}"#,
        )?;

        let config = Config::load_with_home(&path, PathBuf::from("/home/someone"))?;
        assert_eq!(config.directories, vec![PathBuf::from("/srv/code")]);
        assert_eq!(config.log_destination, PathBuf::from("log/activity.log"));
        Ok(())
    }

    #[test]
    fn test_malformed_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json")?;

        assert!(Config::load_with_home(&path, PathBuf::from("/home/someone")).is_err());
        Ok(())
    }
}
