//! Emulator configuration and logging setup

use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::error::{Error, Result};

/// Emulator settings. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Project used when a request does not name one
    pub default_project_id: String,
    /// Prefix of generated job ids
    pub job_id_prefix: String,
    /// `tracing` filter directive, e.g. `info` or `tinyquery=debug`
    pub log_filter: String,
    /// Page size cap for query results when the caller passes no `maxResults`
    pub max_result_rows: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_project_id: "test_project".to_string(),
            job_id_prefix: "job_".to_string(),
            log_filter: "info".to_string(),
            max_result_rows: None,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Create from environment variables.
    ///
    /// Reads `TINYQUERY_PROJECT`, `TINYQUERY_JOB_ID_PREFIX`, `TINYQUERY_LOG` and
    /// `TINYQUERY_MAX_RESULT_ROWS`; unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if `TINYQUERY_MAX_RESULT_ROWS` is not a number
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(project) = lookup("TINYQUERY_PROJECT") {
            config.default_project_id = project;
        }
        if let Some(prefix) = lookup("TINYQUERY_JOB_ID_PREFIX") {
            config.job_id_prefix = prefix;
        }
        if let Some(filter) = lookup("TINYQUERY_LOG") {
            config.log_filter = filter;
        }
        if let Some(rows) = lookup("TINYQUERY_MAX_RESULT_ROWS") {
            config.max_result_rows = Some(rows.trim().parse().map_err(|_| {
                Error::InvalidArgument(format!("TINYQUERY_MAX_RESULT_ROWS must be a number, got {}", rows))
            })?);
        }
        Ok(config)
    }
}

/// Installs a global fmt subscriber filtered by `filter`.
///
/// Only the first successful call installs a subscriber; later calls leave it in place.
///
/// # Errors
///
/// Returns `InvalidArgument` if `filter` is not a valid filter directive
pub fn init_tracing(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|err| Error::InvalidArgument(format!("invalid log filter {:?}: {}", filter, err)))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
    Ok(())
}
