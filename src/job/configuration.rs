use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    storage::{CreateDisposition, DatasetRef, TableRef, WriteDisposition},
};

/// `configuration.query` of a job insert request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_table: Option<TableRef>,
    /// Dataset used to resolve bare table names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_dataset: Option<DatasetRef>,
    #[serde(default)]
    pub create_disposition: CreateDisposition,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl QueryConfig {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            destination_table: None,
            default_dataset: None,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

/// `configuration.copy` of a job insert request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyConfig {
    pub source_table: TableRef,
    pub destination_table: TableRef,
    #[serde(default)]
    pub create_disposition: CreateDisposition,
    #[serde(default)]
    pub write_disposition: WriteDisposition,
}

impl CopyConfig {
    pub fn new(source_table: TableRef, destination_table: TableRef) -> Self {
        Self {
            source_table,
            destination_table,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

/// What a job does. On the wire this is an object holding exactly one of
/// `query` or `copy`; anything else is rejected while deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawConfiguration", into = "RawConfiguration")]
pub enum JobConfiguration {
    Query(QueryConfig),
    Copy(CopyConfig),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<QueryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    copy: Option<CopyConfig>,
}

impl TryFrom<RawConfiguration> for JobConfiguration {
    type Error = Error;

    fn try_from(raw: RawConfiguration) -> Result<Self, Self::Error> {
        match (raw.query, raw.copy) {
            (Some(query), None) => Ok(JobConfiguration::Query(query)),
            (None, Some(copy)) => Ok(JobConfiguration::Copy(copy)),
            (Some(_), Some(_)) => Err(Error::InvalidArgument(
                "job configuration has both query and copy".into(),
            )),
            (None, None) => Err(Error::InvalidArgument(
                "job configuration needs one of query or copy".into(),
            )),
        }
    }
}

impl From<JobConfiguration> for RawConfiguration {
    fn from(config: JobConfiguration) -> Self {
        match config {
            JobConfiguration::Query(query) => RawConfiguration {
                query: Some(query),
                copy: None,
            },
            JobConfiguration::Copy(copy) => RawConfiguration {
                query: None,
                copy: Some(copy),
            },
        }
    }
}
