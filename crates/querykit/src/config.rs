//! Execution settings for [`crate::Db`].

use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Level of the per-statement SQL event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    #[default]
    Debug,
    Trace,
}

/// Timeouts and SQL logging.
///
/// Deserializable from any serde format; durations are given in
/// milliseconds:
///
/// ```ignore
/// let config: DbConfig = serde_json::from_str(r#"{"query_timeout_ms": 5000, "log_level": "info"}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Bound on each driver call. `None` means no timeout (default).
    #[serde(rename = "query_timeout_ms", deserialize_with = "millis")]
    pub query_timeout: Option<Duration>,
    /// Statements slower than this are logged at WARN.
    #[serde(rename = "slow_query_threshold_ms", deserialize_with = "millis")]
    pub slow_query_threshold: Option<Duration>,
    /// Truncate logged SQL (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
    pub log_level: LogLevel,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            slow_query_threshold: None,
            max_sql_length: Some(200),
            log_level: LogLevel::Debug,
        }
    }
}

impl DbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query timeout duration.
    ///
    /// Queries exceeding this duration return [`crate::OrmError::Timeout`].
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// `sql` cut to `max_sql_length` bytes on a char boundary, with `...`.
    pub(crate) fn truncate_sql<'a>(&self, sql: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_sql_length {
            Some(max) if sql.len() > max => {
                let mut end = max;
                while !sql.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &sql[..end]).into()
            }
            _ => sql.into(),
        }
    }
}

fn millis<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
}
