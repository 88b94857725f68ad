//! In-memory table store
//!
//! Projects partition the address space; each (project, dataset) pair holds
//! named tables. All data lives in columnar [`Table`]s behind one lock: every
//! mutation runs under the write guard, so no caller ever observes a partially
//! applied write.

use std::{
    collections::BTreeMap,
    fmt::Display,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    error::{Error, Result},
    sql::{schema::Schema, types::Value},
};

pub mod column;
pub mod table;

pub use table::Table;

/// Address of a dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRef {
    pub project_id: String,
    pub dataset_id: String,
}

impl DatasetRef {
    pub fn new(project_id: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
        }
    }

    pub fn table(&self, table_id: impl Into<String>) -> TableRef {
        TableRef {
            project_id: self.project_id.clone(),
            dataset_id: self.dataset_id.clone(),
            table_id: table_id.into(),
        }
    }
}

impl Display for DatasetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.project_id, self.dataset_id)
    }
}

/// Address of a table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl TableRef {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }

    pub fn dataset(&self) -> DatasetRef {
        DatasetRef::new(self.project_id.clone(), self.dataset_id.clone())
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// Whether a missing destination may be created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateDisposition {
    #[default]
    CreateIfNeeded,
    CreateNever,
}

/// How new data merges with an existing destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
    WriteAppend,
    WriteTruncate,
    #[default]
    WriteEmpty,
}

#[derive(Debug, Default)]
struct Dataset {
    tables: BTreeMap<String, Table>,
}

/// Shared handle to the in-memory store. Clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct TableStore {
    datasets: Arc<RwLock<BTreeMap<DatasetRef, Dataset>>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_dataset(&self, dataset_ref: &DatasetRef) -> Result<()> {
        let mut datasets = self.datasets.write()?;
        if datasets.contains_key(dataset_ref) {
            return Err(Error::AlreadyExists(format!("dataset {}", dataset_ref)));
        }
        datasets.insert(dataset_ref.clone(), Dataset::default());
        info!(dataset = %dataset_ref, "created dataset");
        Ok(())
    }

    /// Fails with NotFound unless the dataset exists
    pub fn get_dataset(&self, dataset_ref: &DatasetRef) -> Result<DatasetRef> {
        let datasets = self.datasets.read()?;
        if !datasets.contains_key(dataset_ref) {
            return Err(Error::NotFound(format!("dataset {}", dataset_ref)));
        }
        Ok(dataset_ref.clone())
    }

    /// Names of the tables in a dataset, in name order
    pub fn list_tables(&self, dataset_ref: &DatasetRef) -> Result<Vec<String>> {
        let datasets = self.datasets.read()?;
        let dataset = datasets
            .get(dataset_ref)
            .ok_or_else(|| Error::NotFound(format!("dataset {}", dataset_ref)))?;
        Ok(dataset.tables.keys().cloned().collect())
    }

    /// Datasets of a project, in id order
    pub fn list_datasets(&self, project_id: &str) -> Result<Vec<DatasetRef>> {
        let datasets = self.datasets.read()?;
        Ok(datasets
            .keys()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }

    /// Removes a dataset. A non-empty dataset is only removed with `delete_contents`.
    pub fn delete_dataset(&self, dataset_ref: &DatasetRef, delete_contents: bool) -> Result<()> {
        let mut datasets = self.datasets.write()?;
        let dataset = datasets
            .get(dataset_ref)
            .ok_or_else(|| Error::NotFound(format!("dataset {}", dataset_ref)))?;
        if !dataset.tables.is_empty() && !delete_contents {
            return Err(Error::InvalidArgument(format!(
                "dataset {} is still in use",
                dataset_ref
            )));
        }
        datasets.remove(dataset_ref);
        info!(dataset = %dataset_ref, "deleted dataset");
        Ok(())
    }

    /// Creates an empty table. The dataset is created on first use.
    pub fn create_table(&self, table_ref: &TableRef, schema: Schema) -> Result<()> {
        schema.validate()?;
        let mut datasets = self.datasets.write()?;
        let dataset = datasets.entry(table_ref.dataset()).or_default();
        if dataset.tables.contains_key(&table_ref.table_id) {
            return Err(Error::AlreadyExists(format!("table {}", table_ref)));
        }
        dataset
            .tables
            .insert(table_ref.table_id.clone(), Table::new(schema));
        info!(table = %table_ref, "created table");
        Ok(())
    }

    /// Returns a snapshot of the table; later writes do not show through it
    pub fn get_table(&self, table_ref: &TableRef) -> Result<Table> {
        let datasets = self.datasets.read()?;
        datasets
            .get(&table_ref.dataset())
            .and_then(|d| d.tables.get(&table_ref.table_id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("table {}", table_ref)))
    }

    pub fn get_schema(&self, table_ref: &TableRef) -> Result<Schema> {
        let datasets = self.datasets.read()?;
        datasets
            .get(&table_ref.dataset())
            .and_then(|d| d.tables.get(&table_ref.table_id))
            .map(|t| t.schema().clone())
            .ok_or_else(|| Error::NotFound(format!("table {}", table_ref)))
    }

    pub fn delete_table(&self, table_ref: &TableRef) -> Result<()> {
        let mut datasets = self.datasets.write()?;
        datasets
            .get_mut(&table_ref.dataset())
            .and_then(|d| d.tables.remove(&table_ref.table_id))
            .ok_or_else(|| Error::NotFound(format!("table {}", table_ref)))?;
        info!(table = %table_ref, "deleted table");
        Ok(())
    }

    /// Streams named rows into an existing table. Missing nullable fields are
    /// NULL-filled; the rows go through `write_result` as an append.
    pub fn insert_rows(&self, table_ref: &TableRef, rows: Vec<Vec<(String, Value)>>) -> Result<usize> {
        let schema = self.get_schema(table_ref)?;
        let rows = rows
            .into_iter()
            .map(|named| schema.row_from_named(named))
            .collect::<Result<Vec<_>>>()?;
        let count = rows.len();
        let data = Table::from_rows(schema, rows)?;
        self.write_result(
            table_ref,
            data,
            CreateDisposition::CreateNever,
            WriteDisposition::WriteAppend,
        )?;
        debug!(table = %table_ref, rows = count, "inserted rows");
        Ok(count)
    }

    /// Writes `data` to the destination according to the dispositions.
    ///
    /// This is the only path that changes the rows of an existing table. It
    /// either applies completely or leaves the destination untouched.
    pub fn write_result(
        &self,
        table_ref: &TableRef,
        data: Table,
        create: CreateDisposition,
        write: WriteDisposition,
    ) -> Result<()> {
        data.schema().validate()?;
        let mut datasets = self.datasets.write()?;
        let exists = datasets
            .get(&table_ref.dataset())
            .is_some_and(|d| d.tables.contains_key(&table_ref.table_id));
        if !exists {
            if create == CreateDisposition::CreateNever {
                return Err(Error::NotFound(format!("table {}", table_ref)));
            }
            debug!(table = %table_ref, rows = data.num_rows(), "creating destination table");
            datasets
                .entry(table_ref.dataset())
                .or_default()
                .tables
                .insert(table_ref.table_id.clone(), data);
            return Ok(());
        }

        let dest = datasets
            .get_mut(&table_ref.dataset())
            .and_then(|d| d.tables.get_mut(&table_ref.table_id))
            .ok_or_else(|| Error::Internal(format!("table {} vanished during write", table_ref)))?;

        match write {
            WriteDisposition::WriteTruncate => {
                debug!(table = %table_ref, rows = data.num_rows(), "truncating destination table");
                *dest = data;
            }
            WriteDisposition::WriteAppend => {
                debug!(table = %table_ref, rows = data.num_rows(), "appending to destination table");
                dest.append(&data)?;
            }
            WriteDisposition::WriteEmpty => {
                if !dest.is_empty() {
                    return Err(Error::AlreadyExists(format!(
                        "table {} already contains data",
                        table_ref
                    )));
                }
                debug!(table = %table_ref, rows = data.num_rows(), "writing empty destination table");
                *dest = data;
            }
        }
        Ok(())
    }
}
