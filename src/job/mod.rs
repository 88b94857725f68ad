//! Query and copy jobs
//!
//! Jobs run to completion inside `insert_job`; the state machine and
//! identity-keyed lookup mirror the asynchronous contract of the emulated
//! service so polling clients see a terminal state right away.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    sql::{schema::Schema, types::Row},
    storage::Table,
};

mod configuration;
mod registry;

pub use configuration::{CopyConfig, JobConfiguration, QueryConfig};
pub use registry::JobRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobKind {
    Query,
    Copy,
}

/// Identity of a job within a project's job namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
}

impl JobReference {
    pub fn new(project_id: impl Into<String>, job_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            job_id: job_id.into(),
        }
    }
}

impl Display for JobReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.project_id, self.job_id)
    }
}

/// Timing and size information, times in epoch milliseconds on the wire
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatistics {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub creation_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Unfinished,
    Result(Table),
    Error(Error),
}

/// A query or copy job.
///
/// A finished job holds either a result table or an error, never both.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    reference: JobReference,
    configuration: JobConfiguration,
    state: JobState,
    statistics: JobStatistics,
    outcome: Outcome,
}

impl Job {
    pub(crate) fn new(reference: JobReference, configuration: JobConfiguration) -> Self {
        Self {
            reference,
            configuration,
            state: JobState::Pending,
            statistics: JobStatistics {
                creation_time: Utc::now(),
                start_time: None,
                end_time: None,
                total_rows: None,
            },
            outcome: Outcome::Unfinished,
        }
    }

    pub(crate) fn start(&mut self) {
        self.state = JobState::Running;
        self.statistics.start_time = Some(Utc::now());
    }

    pub(crate) fn finish(&mut self, result: crate::error::Result<Table>) {
        self.state = JobState::Done;
        self.statistics.end_time = Some(Utc::now());
        self.outcome = match result {
            Ok(table) => {
                self.statistics.total_rows = Some(table.num_rows());
                Outcome::Result(table)
            }
            Err(err) => Outcome::Error(err),
        };
    }

    pub fn reference(&self) -> &JobReference {
        &self.reference
    }

    pub fn id(&self) -> &str {
        &self.reference.job_id
    }

    pub fn kind(&self) -> JobKind {
        match self.configuration {
            JobConfiguration::Query(_) => JobKind::Query,
            JobConfiguration::Copy(_) => JobKind::Copy,
        }
    }

    pub fn configuration(&self) -> &JobConfiguration {
        &self.configuration
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn statistics(&self) -> &JobStatistics {
        &self.statistics
    }

    /// Result table of a successfully finished job
    pub fn result(&self) -> Option<&Table> {
        match &self.outcome {
            Outcome::Result(table) => Some(table),
            _ => None,
        }
    }

    /// Failure of a job that finished with an error
    pub fn error(&self) -> Option<&Error> {
        match &self.outcome {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }
}

/// One page of a finished job's result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResults {
    pub job_reference: JobReference,
    /// False while the job has not reached DONE; the caller should poll again
    pub job_complete: bool,
    pub schema: Schema,
    pub total_rows: usize,
    pub rows: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::{Job, JobConfiguration, JobKind, JobReference, JobState, QueryConfig};
    use crate::{
        error::{Error, Result},
        sql::{
            schema::{Field, Schema},
            types::{DataType, Value},
        },
        storage::Table,
    };

    fn job() -> Job {
        Job::new(
            JobReference::new("p", "job_1"),
            JobConfiguration::Query(QueryConfig::new("SELECT 1")),
        )
    }

    #[test]
    fn test_job_lifecycle() -> Result<()> {
        let mut job = job();
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.kind(), JobKind::Query);
        assert!(job.result().is_none() && job.error().is_none());

        job.start();
        assert_eq!(job.state(), JobState::Running);

        let table = Table::from_rows(
            Schema::new(vec![Field::new("f0_", DataType::Integer)]),
            vec![vec![Value::Integer(1)]],
        )?;
        job.finish(Ok(table.clone()));
        assert_eq!(job.state(), JobState::Done);
        assert_eq!(job.result(), Some(&table));
        assert!(job.error().is_none());
        assert_eq!(job.statistics().total_rows, Some(1));
        assert!(job.statistics().end_time >= job.statistics().start_time);
        Ok(())
    }

    #[test]
    fn test_failed_job_has_no_result() {
        let mut job = job();
        job.start();
        job.finish(Err(Error::NotFound("table p:d.t".into())));
        assert_eq!(job.state(), JobState::Done);
        assert!(job.result().is_none());
        assert_eq!(job.error(), Some(&Error::NotFound("table p:d.t".into())));
        assert_eq!(job.statistics().total_rows, None);
    }
}
