use bitvec::prelude::*;

use crate::{
    error::{Error, Result},
    sql::{
        engine::Catalog,
        executor::eval::evaluate,
        plan::Expr,
        schema::Schema,
        types::{ops, Value},
    },
    storage::{column::Column, Table, TableRef},
};

use super::Executor;

/// Produces one row with no fields, the source of queries without FROM
pub struct SingleRow;

impl SingleRow {
    pub fn new() -> Box<Self> {
        Box::new(Self)
    }
}

impl<C: Catalog> Executor<C> for SingleRow {
    fn execute(self: Box<Self>, _catalog: &C) -> Result<Table> {
        Table::from_columns(Schema::default(), vec![], 1)
    }
}

/// Table scan executor
pub struct Scan {
    table: TableRef,
    schema: Schema,
}

impl Scan {
    pub fn new(table: TableRef, schema: Schema) -> Box<Self> {
        Box::new(Self { table, schema })
    }
}

impl<C: Catalog> Executor<C> for Scan {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Table> {
        let table = catalog.scan_table(&self.table)?;
        // Column positions in the plan are only valid for the planned schema
        if table.schema() != &self.schema {
            return Err(Error::Internal(format!(
                "schema of table {} changed after the query was planned",
                self.table
            )));
        }
        Ok(table)
    }
}

/// WHERE executor - keeps rows whose predicate is TRUE; FALSE and NULL drop
pub struct Filter<C: Catalog> {
    source: Box<dyn Executor<C>>,
    predicate: Expr,
}

impl<C: Catalog> Filter<C> {
    pub fn new(source: Box<dyn Executor<C>>, predicate: Expr) -> Box<Self> {
        Box::new(Self { source, predicate })
    }
}

impl<C: Catalog> Executor<C> for Filter<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Table> {
        let batch = self.source.execute(catalog)?;
        let mask: BitVec = evaluate(&self.predicate, &batch)?
            .iter()
            .map(|v| matches!(v, Value::Boolean(true)))
            .collect();
        batch.filter(&mask)
    }
}

/// LIMIT executor
pub struct Limit<C: Catalog> {
    source: Box<dyn Executor<C>>,
    limit: usize,
}

impl<C: Catalog> Limit<C> {
    pub fn new(source: Box<dyn Executor<C>>, limit: usize) -> Box<Self> {
        Box::new(Self { source, limit })
    }
}

impl<C: Catalog> Executor<C> for Limit<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Table> {
        Ok(self.source.execute(catalog)?.head(self.limit))
    }
}

/// Projection executor - evaluates the output expressions column by column
pub struct Projection<C: Catalog> {
    source: Box<dyn Executor<C>>,
    exprs: Vec<Expr>,
    schema: Schema,
}

impl<C: Catalog> Projection<C> {
    pub fn new(source: Box<dyn Executor<C>>, exprs: Vec<Expr>, schema: Schema) -> Box<Self> {
        Box::new(Self {
            source,
            exprs,
            schema,
        })
    }
}

impl<C: Catalog> Executor<C> for Projection<C> {
    fn execute(self: Box<Self>, catalog: &C) -> Result<Table> {
        let batch = self.source.execute(catalog)?;
        let columns = self
            .exprs
            .iter()
            .zip(self.schema.fields.iter())
            .map(|(expr, field)| {
                let values = evaluate(expr, &batch)?
                    .into_iter()
                    .map(|v| ops::coerce(v, field.datatype))
                    .collect::<Result<Vec<_>>>()?;
                Column::from_values(field.datatype, values)
            })
            .collect::<Result<Vec<_>>>()?;
        Table::from_columns(self.schema, columns, batch.num_rows())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::{
        error::{Error, Result},
        sql::{
            engine::Catalog,
            schema::{Field, Schema},
            types::{DataType, Value},
        },
        storage::{CreateDisposition, DatasetRef, Table, TableRef, TableStore, WriteDisposition},
    };

    fn table_ref() -> TableRef {
        TableRef::new("test_project", "test_dataset", "t")
    }

    fn store_with(rows: Vec<Vec<Value>>) -> Result<TableStore> {
        let store = TableStore::new();
        store.write_result(
            &table_ref(),
            Table::from_rows(
                Schema::new(vec![
                    Field::new("n", DataType::Integer),
                    Field::new("s", DataType::String),
                ]),
                rows,
            )?,
            CreateDisposition::CreateIfNeeded,
            WriteDisposition::WriteTruncate,
        )?;
        Ok(store)
    }

    fn query(store: &TableStore, sql: &str) -> Result<Table> {
        store
            .session("test_project", Some(DatasetRef::new("test_project", "test_dataset")))
            .execute(sql)
    }

    fn sample() -> Vec<Vec<Value>> {
        vec![
            vec![Value::Integer(1), Value::String("a".into())],
            vec![Value::Integer(2), Value::Null],
            vec![Value::Null, Value::String("c".into())],
            vec![Value::Integer(4), Value::String("d".into())],
            vec![Value::Integer(5), Value::String("e".into())],
        ]
    }

    #[test]
    fn test_select_literal_without_from() -> Result<()> {
        let store = store_with(sample())?;
        let result = query(&store, "SELECT 7 AS foo")?;
        assert_eq!(result.rows(), vec![vec![Value::Integer(7)]]);
        assert_eq!(result.schema().fields[0].name, "foo");

        let result = query(&store, "SELECT 1 / 2, 'x', NULL, TRUE OR NULL")?;
        assert_eq!(
            result.rows(),
            vec![vec![
                Value::Float(0.5),
                Value::String("x".into()),
                Value::Null,
                Value::Boolean(true),
            ]]
        );
        Ok(())
    }

    #[test]
    fn test_projection_preserves_rows() -> Result<()> {
        let store = store_with(sample())?;
        let result = query(&store, "SELECT n FROM t")?;
        assert_eq!(result.num_rows(), 5);
        assert_eq!(
            result.rows(),
            sample().into_iter().map(|r| vec![r[0].clone()]).collect::<Vec<_>>()
        );

        let result = query(&store, "SELECT s, n * 1.5 AS f, 0 AS zero FROM t")?;
        assert_eq!(result.num_rows(), 5);
        assert_eq!(result.value(0, "f"), Some(Value::Float(1.5)));
        assert_eq!(result.value(2, "f"), Some(Value::Null));
        assert_eq!(result.value(4, "zero"), Some(Value::Integer(0)));
        Ok(())
    }

    #[test]
    fn test_filter_and_limit() -> Result<()> {
        let store = store_with(sample())?;
        // The NULL row drops: n > 1 is NULL there
        let result = query(&store, "SELECT n FROM t WHERE n > 1")?;
        assert_eq!(
            result.rows(),
            vec![
                vec![Value::Integer(2)],
                vec![Value::Integer(4)],
                vec![Value::Integer(5)],
            ]
        );

        let result = query(&store, "SELECT s FROM t WHERE s IS NULL OR n = 5")?;
        assert_eq!(
            result.rows(),
            vec![vec![Value::Null], vec![Value::String("e".into())]]
        );

        let result = query(&store, "SELECT * FROM t WHERE n >= 2 LIMIT 2")?;
        assert_eq!(result.num_rows(), 2);
        assert_eq!(result.value(1, "n"), Some(Value::Integer(4)));

        assert_eq!(query(&store, "SELECT n FROM t LIMIT 0")?.num_rows(), 0);
        Ok(())
    }

    #[test]
    fn test_runtime_error_fails_query() -> Result<()> {
        let store = store_with(sample())?;
        assert!(matches!(
            query(&store, "SELECT 10 / (n - 1) FROM t"),
            Err(Error::Evaluation(_))
        ));
        assert!(matches!(
            query(&store, "SELECT 9223372036854775807 + 1"),
            Err(Error::Evaluation(_))
        ));
        Ok(())
    }

    #[test]
    fn test_stale_schema_is_internal_error() -> Result<()> {
        let store = store_with(sample())?;
        let session = store.session("test_project", None);
        let plan = session.plan("SELECT n FROM test_dataset.t")?;

        store.write_result(
            &table_ref(),
            Table::from_rows(
                Schema::new(vec![Field::new("n", DataType::String)]),
                vec![vec![Value::String("x".into())]],
            )?,
            CreateDisposition::CreateNever,
            WriteDisposition::WriteTruncate,
        )?;
        assert!(matches!(plan.execute(&store), Err(Error::Internal(_))));
        Ok(())
    }

    proptest! {
        #[test]
        fn prop_projection_row_count(values in prop::collection::vec(prop::option::of(any::<i32>()), 0..40)) {
            let rows: Vec<Vec<Value>> = values
                .iter()
                .map(|v| vec![v.map_or(Value::Null, |v| Value::Integer(v as i64)), Value::Null])
                .collect();
            let store = store_with(rows.clone()).unwrap();
            let result = query(&store, "SELECT n, n * 2 AS doubled, s FROM t").unwrap();
            prop_assert_eq!(result.num_rows(), rows.len());
            for (i, row) in rows.iter().enumerate() {
                prop_assert_eq!(result.value(i, "n"), Some(row[0].clone()));
            }
        }
    }
}
