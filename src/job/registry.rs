use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{Error, Result},
    job::{Job, JobConfiguration, JobReference, JobState, QueryResults},
    sql::{engine::Catalog, schema::Schema},
    storage::{Table, TableStore},
};

/// Jobs of one project, kept in insertion order
#[derive(Debug, Default)]
struct ProjectJobs {
    order: Vec<String>,
    jobs: HashMap<String, Job>,
}

/// Creates, runs and looks up jobs. Clones share the same jobs.
#[derive(Debug, Clone)]
pub struct JobRegistry {
    store: TableStore,
    id_prefix: String,
    max_result_rows: Option<usize>,
    projects: Arc<RwLock<BTreeMap<String, ProjectJobs>>>,
}

impl JobRegistry {
    pub fn new(store: TableStore, config: &Config) -> Self {
        Self {
            store,
            id_prefix: config.job_id_prefix.clone(),
            max_result_rows: config.max_result_rows,
            projects: Arc::default(),
        }
    }

    /// Inserts a job and runs it to completion.
    ///
    /// The returned job is DONE; a failed run is recorded on the job rather
    /// than returned as an error. Only an unusable job id fails the call.
    pub fn insert_job(
        &self,
        project_id: &str,
        job_id: Option<String>,
        configuration: JobConfiguration,
    ) -> Result<Job> {
        let mut job = self.reserve(project_id, job_id, configuration)?;
        info!(job = %job.reference(), kind = ?job.kind(), "inserted job");

        job.start();
        let result = self.run(project_id, job.configuration());
        job.finish(result);
        match job.error() {
            Some(err) => warn!(job = %job.reference(), error = %err, "job failed"),
            None => info!(
                job = %job.reference(),
                rows = job.statistics().total_rows.unwrap_or_default(),
                "job done"
            ),
        }

        let mut projects = self.projects.write()?;
        let jobs = projects.entry(project_id.to_string()).or_default();
        jobs.jobs.insert(job.id().to_string(), job.clone());
        Ok(job)
    }

    /// Allocates the job id and records a PENDING job under it
    fn reserve(
        &self,
        project_id: &str,
        job_id: Option<String>,
        configuration: JobConfiguration,
    ) -> Result<Job> {
        let mut projects = self.projects.write()?;
        let jobs = projects.entry(project_id.to_string()).or_default();
        let job_id = match job_id {
            Some(id) => {
                validate_job_id(&id)?;
                if jobs.jobs.contains_key(&id) {
                    return Err(Error::AlreadyExists(format!("job {}:{}", project_id, id)));
                }
                id
            }
            None => loop {
                let id = format!("{}{}", self.id_prefix, Uuid::new_v4().simple());
                if !jobs.jobs.contains_key(&id) {
                    break id;
                }
            },
        };
        let job = Job::new(JobReference::new(project_id, job_id.clone()), configuration);
        jobs.order.push(job_id.clone());
        jobs.jobs.insert(job_id, job.clone());
        Ok(job)
    }

    fn run(&self, project_id: &str, configuration: &JobConfiguration) -> Result<Table> {
        match configuration {
            JobConfiguration::Query(query) => {
                let session = self.store.session(project_id, query.default_dataset.clone());
                let result = session.execute(&query.query)?;
                if let Some(dest) = &query.destination_table {
                    debug!(table = %dest, "writing query result to destination");
                    self.store.write_result(
                        dest,
                        result.clone(),
                        query.create_disposition,
                        query.write_disposition,
                    )?;
                }
                Ok(result)
            }
            JobConfiguration::Copy(copy) => {
                let data = self.store.get_table(&copy.source_table)?;
                debug!(source = %copy.source_table, dest = %copy.destination_table, "copying table");
                self.store.write_result(
                    &copy.destination_table,
                    data.clone(),
                    copy.create_disposition,
                    copy.write_disposition,
                )?;
                Ok(data)
            }
        }
    }

    pub fn get_job(&self, project_id: &str, job_id: &str) -> Result<Job> {
        let projects = self.projects.read()?;
        projects
            .get(project_id)
            .and_then(|p| p.jobs.get(job_id))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("job {}:{}", project_id, job_id)))
    }

    /// Jobs of a project in insertion order
    pub fn list_jobs(&self, project_id: &str) -> Result<Vec<Job>> {
        let projects = self.projects.read()?;
        Ok(projects
            .get(project_id)
            .map(|p| p.order.iter().filter_map(|id| p.jobs.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    /// Returns a page of a job's result.
    ///
    /// A job that failed hands back its own error. `max_results` falls back to
    /// the configured cap; the stored result is never consumed.
    pub fn get_query_results(
        &self,
        project_id: &str,
        job_id: &str,
        start_index: usize,
        max_results: Option<usize>,
    ) -> Result<QueryResults> {
        let job = self.get_job(project_id, job_id)?;
        if job.state() != JobState::Done {
            return Ok(QueryResults {
                job_reference: job.reference().clone(),
                job_complete: false,
                schema: Schema::default(),
                total_rows: 0,
                rows: vec![],
            });
        }
        if let Some(err) = job.error() {
            return Err(err.clone());
        }
        let table = job
            .result()
            .ok_or_else(|| Error::Internal(format!("job {} is done without an outcome", job.reference())))?;
        Ok(QueryResults {
            job_reference: job.reference().clone(),
            job_complete: true,
            schema: table.schema().clone(),
            total_rows: table.num_rows(),
            rows: table.page(start_index, max_results.or(self.max_result_rows)),
        })
    }
}

/// Client-supplied ids: letters, digits, `_` and `-`, at most 1024 characters
fn validate_job_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 1024
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(Error::InvalidArgument(format!("invalid job id {:?}", id)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use super::JobRegistry;
    use crate::{
        config::Config,
        error::{Error, Result},
        job::{CopyConfig, JobConfiguration, JobKind, JobState, QueryConfig},
        sql::{
            schema::{Field, Mode, Schema},
            types::{DataType, Value},
        },
        storage::{CreateDisposition, Table, TableRef, TableStore, WriteDisposition},
    };

    fn registry() -> JobRegistry {
        JobRegistry::new(TableStore::new(), &Config::default())
    }

    fn table_ref(name: &str) -> TableRef {
        TableRef::new("test_project", "test_dataset", name)
    }

    fn query(sql: &str) -> JobConfiguration {
        JobConfiguration::Query(QueryConfig::new(sql))
    }

    fn append_copy(from: &str, to: &str) -> JobConfiguration {
        let mut copy = CopyConfig::new(table_ref(from), table_ref(to));
        copy.create_disposition = CreateDisposition::CreateIfNeeded;
        copy.write_disposition = WriteDisposition::WriteAppend;
        JobConfiguration::Copy(copy)
    }

    #[test]
    fn test_simple_query() -> Result<()> {
        let registry = registry();
        let job = registry.insert_job("test_project", None, query("SELECT 7 as foo"))?;
        assert_eq!(job.state(), JobState::Done);
        assert_eq!(job.kind(), JobKind::Query);
        assert!(job.id().starts_with("job_"));

        let results = registry.get_query_results("test_project", job.id(), 0, None)?;
        assert!(results.job_complete);
        assert_eq!(results.total_rows, 1);
        assert_eq!(results.rows, vec![vec![Value::Integer(7)]]);
        assert_eq!(
            results.schema,
            Schema::new(vec![Field::required("foo", DataType::Integer)])
        );
        Ok(())
    }

    #[test]
    fn test_query_to_destination_then_copy() -> Result<()> {
        let registry = registry();
        let mut config = QueryConfig::new("SELECT 7 as foo");
        config.destination_table = Some(table_ref("table1"));
        registry.insert_job("test_project", None, JobConfiguration::Query(config))?;

        for _ in 0..5 {
            let job = registry.insert_job("test_project", None, append_copy("table1", "table2"))?;
            assert!(job.error().is_none());
            assert_eq!(job.result().map(|t| t.num_rows()), Some(1));
        }

        let job = registry.insert_job(
            "test_project",
            None,
            query("SELECT foo FROM test_dataset.table2"),
        )?;
        let results = registry.get_query_results("test_project", job.id(), 0, None)?;
        assert_eq!(results.rows, vec![vec![Value::Integer(7)]; 5]);
        assert_eq!(results.schema.fields[0].mode, Mode::Required);
        Ok(())
    }

    #[test]
    fn test_failed_job_propagates_error() -> Result<()> {
        let registry = registry();
        let job = registry.insert_job(
            "test_project",
            None,
            query("SELECT foo FROM test_dataset.missing"),
        )?;
        assert_eq!(job.state(), JobState::Done);
        let err = job.error().cloned();
        assert!(matches!(err, Some(Error::NotFound(_))));

        let results = registry.get_query_results("test_project", job.id(), 0, None);
        assert_eq!(results.err(), err);

        let job = registry.insert_job("test_project", None, append_copy("missing", "dest"))?;
        assert!(matches!(job.error(), Some(Error::NotFound(_))));
        Ok(())
    }

    #[test]
    fn test_unknown_job() {
        let registry = registry();
        assert!(matches!(
            registry.get_query_results("test_project", "never_inserted", 0, None),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.get_job("test_project", "never_inserted"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_client_job_ids() -> Result<()> {
        let registry = registry();
        let job = registry.insert_job("p", Some("my-job_1".into()), query("SELECT 1"))?;
        assert_eq!(job.id(), "my-job_1");
        assert!(matches!(
            registry.insert_job("p", Some("my-job_1".into()), query("SELECT 2")),
            Err(Error::AlreadyExists(_))
        ));
        assert!(matches!(
            registry.insert_job("p", Some("bad id!".into()), query("SELECT 2")),
            Err(Error::InvalidArgument(_))
        ));
        // Same id in another project is a different job
        registry.insert_job("other", Some("my-job_1".into()), query("SELECT 3"))?;
        Ok(())
    }

    #[test]
    fn test_list_jobs_and_paging() -> Result<()> {
        let store = TableStore::new();
        store.write_result(
            &table_ref("numbers"),
            Table::from_rows(
                Schema::new(vec![Field::new("n", DataType::Integer)]),
                (0..10).map(|i| vec![Value::Integer(i)]).collect(),
            )?,
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteEmpty,
        )?;
        let config = Config {
            max_result_rows: Some(4),
            ..Config::default()
        };
        let registry = JobRegistry::new(store, &config);

        let first = registry.insert_job("test_project", None, query("SELECT 1"))?;
        let second = registry.insert_job("test_project", None, query("SELECT n FROM test_dataset.numbers"))?;
        let ids: Vec<String> = registry
            .list_jobs("test_project")?
            .iter()
            .map(|j| j.id().to_string())
            .collect();
        assert_eq!(ids, vec![first.id().to_string(), second.id().to_string()]);
        assert!(registry.list_jobs("nobody")?.is_empty());

        let page = registry.get_query_results("test_project", second.id(), 0, None)?;
        assert_eq!(page.total_rows, 10);
        assert_eq!(page.rows.len(), 4);

        let page = registry.get_query_results("test_project", second.id(), 8, Some(5))?;
        assert_eq!(page.rows, vec![vec![Value::Integer(8)], vec![Value::Integer(9)]]);

        // Paging does not consume the stored result
        let again = registry.get_query_results("test_project", second.id(), 0, Some(10))?;
        assert_eq!(again.rows.len(), 10);
        Ok(())
    }

    #[test]
    fn test_concurrent_job_ids_are_unique() -> Result<()> {
        const THREADS: usize = 8;
        const JOBS_PER_THREAD: usize = 25;

        let registry = registry();
        std::thread::scope(|scope| {
            for _ in 0..THREADS {
                let registry = &registry;
                scope.spawn(move || {
                    for _ in 0..JOBS_PER_THREAD {
                        registry.insert_job("test_project", None, query("SELECT 1")).unwrap();
                    }
                });
            }
        });

        let jobs = registry.list_jobs("test_project")?;
        assert_eq!(jobs.len(), THREADS * JOBS_PER_THREAD);
        assert!(jobs.iter().all(|j| j.state() == JobState::Done));
        let ids: HashSet<&str> = jobs.iter().map(|j| j.id()).collect();
        assert_eq!(ids.len(), THREADS * JOBS_PER_THREAD);
        Ok(())
    }

    #[test]
    fn test_readers_never_see_partial_appends() -> Result<()> {
        const BATCH: usize = 3;
        const WRITERS: usize = 4;
        const APPENDS_PER_WRITER: usize = 20;

        let registry = registry();
        registry.store.write_result(
            &table_ref("batch"),
            Table::from_rows(
                Schema::new(vec![Field::new("n", DataType::Integer)]),
                (0..BATCH as i64).map(|i| vec![Value::Integer(i)]).collect(),
            )?,
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteEmpty,
        )?;
        registry.insert_job("test_project", None, append_copy("batch", "dest"))?;

        std::thread::scope(|scope| {
            for _ in 0..WRITERS {
                let registry = &registry;
                scope.spawn(move || {
                    for _ in 0..APPENDS_PER_WRITER {
                        let job = registry
                            .insert_job("test_project", None, append_copy("batch", "dest"))
                            .unwrap();
                        assert!(job.error().is_none());
                    }
                });
            }
            for _ in 0..2 {
                let registry = &registry;
                scope.spawn(move || {
                    for _ in 0..200 {
                        let rows = registry.store.get_table(&table_ref("dest")).unwrap().num_rows();
                        assert_eq!(rows % BATCH, 0, "saw {} rows", rows);
                    }
                });
            }
        });

        let table = registry.store.get_table(&table_ref("dest"))?;
        assert_eq!(table.num_rows(), BATCH * (WRITERS * APPENDS_PER_WRITER + 1));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_repeated_copy_appends(n in 1usize..8) {
            let registry = registry();
            let mut config = QueryConfig::new("SELECT 7 as foo, 'x' as bar");
            config.destination_table = Some(table_ref("source"));
            registry.insert_job("test_project", None, JobConfiguration::Query(config)).unwrap();
            for _ in 0..n {
                registry.insert_job("test_project", None, append_copy("source", "dest")).unwrap();
            }
            let table = registry.store.get_table(&table_ref("dest")).unwrap();
            prop_assert_eq!(table.num_rows(), n);
            for row in table.rows() {
                prop_assert_eq!(row, vec![Value::Integer(7), Value::String("x".into())]);
            }
        }
    }
}
