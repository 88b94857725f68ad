use tracing::debug;

use crate::{
    error::Result,
    sql::{
        parser::Parser,
        plan::{Plan, Planner},
        schema::Schema,
    },
    storage::{DatasetRef, Table, TableRef},
};

mod store;

/// Read access to table schemas and data for planning and execution
///
/// The planner only needs schemas; the executor takes data snapshots.
pub trait Catalog: Clone {
    fn get_schema(&self, table_ref: &TableRef) -> Result<Schema>;

    /// Returns an owned snapshot of the table
    fn scan_table(&self, table_ref: &TableRef) -> Result<Table>;

    fn session(&self, project_id: impl Into<String>, default_dataset: Option<DatasetRef>) -> Session<Self> {
        Session {
            catalog: self.clone(),
            project_id: project_id.into(),
            default_dataset,
        }
    }
}

/// Query session bound to an issuing project and an optional default dataset
pub struct Session<C: Catalog> {
    catalog: C,
    project_id: String,
    default_dataset: Option<DatasetRef>,
}

impl<C: Catalog + 'static> Session<C> {
    /// Parses and plans a query without executing it
    pub fn plan(&self, sql: &str) -> Result<Plan> {
        let stmt = Parser::new(sql).parse()?;
        Planner::new(&self.catalog, &self.project_id, self.default_dataset.as_ref()).build(stmt)
    }

    /// Executes a query, returning the result table
    pub fn execute(&self, sql: &str) -> Result<Table> {
        let plan = self.plan(sql)?;
        let result = plan.execute(&self.catalog)?;
        debug!(project = %self.project_id, rows = result.num_rows(), "executed query");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::Catalog;
    use crate::{
        error::{Error, Result},
        sql::{
            schema::{Field, Schema},
            types::{DataType, Value},
        },
        storage::{DatasetRef, Table, TableRef, TableStore},
    };

    #[test]
    fn test_session_execute() -> Result<()> {
        let store = TableStore::new();
        let table_ref = TableRef::new("p", "ds", "t");
        store.write_result(
            &table_ref,
            Table::from_rows(
                Schema::new(vec![Field::new("foo", DataType::Integer)]),
                vec![vec![Value::Integer(1)], vec![Value::Integer(2)]],
            )?,
            Default::default(),
            Default::default(),
        )?;

        let session = store.session("p", Some(DatasetRef::new("p", "ds")));
        let result = session.execute("SELECT foo + 1 AS bar FROM t")?;
        assert_eq!(
            result.rows(),
            vec![vec![Value::Integer(2)], vec![Value::Integer(3)]]
        );

        let plan = session.plan("SELECT foo FROM ds.t")?;
        assert_eq!(plan.schema.fields[0].name, "foo");

        let session = store.session("other", None);
        assert!(matches!(session.execute("SELECT foo FROM ds.t"), Err(Error::NotFound(_))));
        Ok(())
    }
}
