use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use serde::Deserialize;
use serde::Serialize;

/// One changed path inside a repository working tree, with its porcelain
/// status code.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ChangedFile {
    pub file: String,
    pub status: String,
}

/// The atomic unit of output. Each record is serialized as a single JSON
/// object on its own line of the activity log. Records are immutable once
/// constructed; their order in the log is the order they reached the sink,
/// not event order across sources.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityRecord {
    BrowserHistory {
        #[serde(with = "iso8601")]
        timestamp: DateTime<Utc>,
        browser: Arc<str>,
        url: String,
    },
    GitChange {
        #[serde(with = "iso8601")]
        timestamp: DateTime<Utc>,
        repository: PathBuf,
        changes: Vec<ChangedFile>,
    },
    // File events carry no timestamp. They are appended as observed.
    FileChange {
        path: PathBuf,
    },
}

mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(moment: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&moment.to_rfc3339_opts(SecondsFormat::Secs, false))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|v| v.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
