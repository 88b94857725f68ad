use tracing::info;

use crate::{
    api::{
        named_row, DatasetInsertRequest, DatasetResource, InsertAllRequest, InsertAllResponse,
        JobInsertRequest, JobResource, QueryResultsResponse, TableInsertRequest, TableResource,
    },
    config::{self, Config},
    error::{Error, Result},
    job::JobRegistry,
    sql::engine::Catalog,
    storage::{DatasetRef, Table, TableRef, TableStore},
};

/// In-memory emulator of the query service.
///
/// Every operation is keyed the way the service's REST methods are and
/// returns the service's resource shapes.
#[derive(Debug, Clone)]
pub struct TinyQuery {
    config: Config,
    store: TableStore,
    jobs: JobRegistry,
}

impl Default for TinyQuery {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl TinyQuery {
    pub fn new(config: Config) -> Self {
        let store = TableStore::new();
        let jobs = JobRegistry::new(store.clone(), &config);
        Self { config, store, jobs }
    }

    /// Builds an emulator from `TINYQUERY_*` environment variables and installs
    /// the global `tracing` subscriber with the configured `logFilter`.
    pub fn from_env() -> Result<Self> {
        let emulator = Self::new(Config::from_env()?);
        emulator.init_tracing()?;
        Ok(emulator)
    }

    /// Installs the global `tracing` subscriber filtered by `logFilter`
    pub fn init_tracing(&self) -> Result<()> {
        config::init_tracing(&self.config.log_filter)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// Runs a query directly in the default project, bypassing the job layer
    pub fn evaluate_query(&self, sql: &str, default_dataset: Option<DatasetRef>) -> Result<Table> {
        self.store
            .session(self.config.default_project_id.clone(), default_dataset)
            .execute(sql)
    }

    pub fn insert_dataset(&self, project_id: &str, request: DatasetInsertRequest) -> Result<DatasetResource> {
        let dataset_ref = request.dataset_reference;
        if dataset_ref.project_id != project_id {
            return Err(Error::InvalidArgument(format!(
                "dataset {} does not belong to project {}",
                dataset_ref, project_id
            )));
        }
        self.store.create_dataset(&dataset_ref)?;
        Ok(dataset_ref.into())
    }

    pub fn get_dataset(&self, project_id: &str, dataset_id: &str) -> Result<DatasetResource> {
        Ok(self.store.get_dataset(&DatasetRef::new(project_id, dataset_id))?.into())
    }

    pub fn list_datasets(&self, project_id: &str) -> Result<Vec<DatasetResource>> {
        Ok(self
            .store
            .list_datasets(project_id)?
            .into_iter()
            .map(DatasetResource::from)
            .collect())
    }

    pub fn delete_dataset(&self, project_id: &str, dataset_id: &str, delete_contents: bool) -> Result<()> {
        self.store
            .delete_dataset(&DatasetRef::new(project_id, dataset_id), delete_contents)
    }

    pub fn insert_table(
        &self,
        project_id: &str,
        dataset_id: &str,
        request: TableInsertRequest,
    ) -> Result<TableResource> {
        let table_ref = request.table_reference;
        if table_ref.project_id != project_id || table_ref.dataset_id != dataset_id {
            return Err(Error::InvalidArgument(format!(
                "table {} does not belong to dataset {}:{}",
                table_ref, project_id, dataset_id
            )));
        }
        self.store.create_table(&table_ref, request.schema)?;
        let table = self.store.get_table(&table_ref)?;
        Ok(TableResource::new(table_ref, &table))
    }

    pub fn get_table(&self, project_id: &str, dataset_id: &str, table_id: &str) -> Result<TableResource> {
        let table_ref = TableRef::new(project_id, dataset_id, table_id);
        let table = self.store.get_table(&table_ref)?;
        Ok(TableResource::new(table_ref, &table))
    }

    pub fn list_tables(&self, project_id: &str, dataset_id: &str) -> Result<Vec<TableResource>> {
        let dataset_ref = DatasetRef::new(project_id, dataset_id);
        self.store
            .list_tables(&dataset_ref)?
            .into_iter()
            .map(|table_id| self.get_table(project_id, dataset_id, &table_id))
            .collect()
    }

    pub fn delete_table(&self, project_id: &str, dataset_id: &str, table_id: &str) -> Result<()> {
        self.store
            .delete_table(&TableRef::new(project_id, dataset_id, table_id))
    }

    /// Streams JSON rows into an existing table. All rows land or none do.
    pub fn insert_all(
        &self,
        project_id: &str,
        dataset_id: &str,
        table_id: &str,
        request: InsertAllRequest,
    ) -> Result<InsertAllResponse> {
        let table_ref = TableRef::new(project_id, dataset_id, table_id);
        let schema = self.store.get_schema(&table_ref)?;
        let rows = request
            .rows
            .iter()
            .map(|row| named_row(&schema, &row.json))
            .collect::<Result<Vec<_>>>()?;
        let count = self.store.insert_rows(&table_ref, rows)?;
        info!(table = %table_ref, rows = count, "streamed rows");
        Ok(InsertAllResponse::default())
    }

    /// Inserts and runs a job. Query and copy failures are reported on the
    /// returned job's status, not as an error.
    pub fn insert_job(&self, project_id: &str, request: JobInsertRequest) -> Result<JobResource> {
        let job_id = match request.job_reference {
            Some(reference) => {
                if reference.project_id.as_deref().is_some_and(|p| p != project_id) {
                    return Err(Error::InvalidArgument(format!(
                        "job reference project does not match {}",
                        project_id
                    )));
                }
                reference.job_id
            }
            None => None,
        };
        let job = self.jobs.insert_job(project_id, job_id, request.configuration)?;
        Ok(JobResource::from(&job))
    }

    pub fn get_job(&self, project_id: &str, job_id: &str) -> Result<JobResource> {
        Ok(JobResource::from(&self.jobs.get_job(project_id, job_id)?))
    }

    pub fn list_jobs(&self, project_id: &str) -> Result<Vec<JobResource>> {
        Ok(self
            .jobs
            .list_jobs(project_id)?
            .iter()
            .map(JobResource::from)
            .collect())
    }

    pub fn get_query_results(
        &self,
        project_id: &str,
        job_id: &str,
        start_index: Option<usize>,
        max_results: Option<usize>,
    ) -> Result<QueryResultsResponse> {
        let results = self.jobs.get_query_results(
            project_id,
            job_id,
            start_index.unwrap_or_default(),
            max_results,
        )?;
        Ok(results.into())
    }
}
