use bitvec::slice::BitSlice;

use crate::{
    error::{Error, Result},
    sql::{
        schema::Schema,
        types::{Row, Value},
    },
    storage::column::Column,
};

/// Table data: a schema plus one column per field.
///
/// Every row view matches the schema in length, per-field type and
/// nullability; all constructors enforce that.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    schema: Schema,
    columns: Vec<Column>,
    num_rows: usize,
}

impl Table {
    /// Creates an empty table
    pub fn new(schema: Schema) -> Self {
        let columns = schema
            .fields
            .iter()
            .map(|field| Column::new(field.datatype))
            .collect();
        Self {
            schema,
            columns,
            num_rows: 0,
        }
    }

    pub fn from_rows(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::new(schema);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Assembles a table from evaluated columns. `num_rows` is explicit so a
    /// table with no fields still knows its row count.
    pub fn from_columns(schema: Schema, columns: Vec<Column>, num_rows: usize) -> Result<Self> {
        if columns.len() != schema.len() {
            return Err(Error::Internal(format!(
                "{} columns for a schema of {} fields",
                columns.len(),
                schema.len()
            )));
        }
        for (field, column) in schema.fields.iter().zip(columns.iter()) {
            if column.datatype() != field.datatype {
                return Err(Error::Type(format!(
                    "field {} has type {} but column has type {}",
                    field.name,
                    field.datatype,
                    column.datatype()
                )));
            }
            if column.len() != num_rows {
                return Err(Error::Internal(format!(
                    "column {} has {} values, expected {}",
                    field.name,
                    column.len(),
                    num_rows
                )));
            }
            if !field.nullable() && column.has_nulls() {
                return Err(Error::Type(format!("field {} cannot be null", field.name)));
            }
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn column(&self, idx: usize) -> Option<&Column> {
        self.columns.get(idx)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Appends one row after validating it against the schema
    pub fn push_row(&mut self, row: Row) -> Result<()> {
        self.schema.check_row(&row)?;
        for (column, value) in self.columns.iter_mut().zip(row) {
            column.push(value)?;
        }
        self.num_rows += 1;
        Ok(())
    }

    /// Materializes the row at `idx`
    pub fn row(&self, idx: usize) -> Option<Row> {
        if idx >= self.num_rows {
            return None;
        }
        self.columns.iter().map(|col| col.get(idx)).collect()
    }

    /// Materializes every row in order
    pub fn rows(&self) -> Vec<Row> {
        (0..self.num_rows).filter_map(|idx| self.row(idx)).collect()
    }

    /// Appends all rows of `other`, whose schema must be append-compatible.
    /// Nothing is appended if any check fails.
    pub fn append(&mut self, other: &Table) -> Result<()> {
        if !self.schema.is_append_compatible(&other.schema) {
            return Err(Error::Type(format!(
                "cannot append rows with schema [{}] to schema [{}]",
                describe(&other.schema),
                describe(&self.schema)
            )));
        }
        for (field, column) in self.schema.fields.iter().zip(other.columns.iter()) {
            if !field.nullable() && column.has_nulls() {
                return Err(Error::Type(format!("field {} cannot be null", field.name)));
            }
        }
        let mut columns = self.columns.clone();
        for (column, extra) in columns.iter_mut().zip(other.columns.iter()) {
            column.extend(extra)?;
        }
        self.columns = columns;
        self.num_rows += other.num_rows;
        Ok(())
    }

    /// Keeps only the rows whose bit is set in `mask`
    pub fn filter(&self, mask: &BitSlice) -> Result<Self> {
        let columns = self
            .columns
            .iter()
            .map(|col| col.filter(mask))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: self.schema.clone(),
            columns,
            num_rows: mask.count_ones(),
        })
    }

    /// Keeps the first `n` rows
    pub fn head(&self, n: usize) -> Self {
        Self {
            schema: self.schema.clone(),
            columns: self.columns.iter().map(|col| col.head(n)).collect(),
            num_rows: n.min(self.num_rows),
        }
    }

    /// Returns a page of rows starting at `start`, at most `max` long
    pub fn page(&self, start: usize, max: Option<usize>) -> Vec<Row> {
        let end = max.map_or(self.num_rows, |m| start.saturating_add(m).min(self.num_rows));
        (start..end).filter_map(|idx| self.row(idx)).collect()
    }

    /// Value at (row, field), for tests and debugging
    pub fn value(&self, row: usize, field: &str) -> Option<Value> {
        let idx = self.schema.get_field_index(field)?;
        self.columns[idx].get(row)
    }
}

fn describe(schema: &Schema) -> String {
    schema
        .fields
        .iter()
        .map(|f| format!("{}:{}", f.name, f.datatype))
        .collect::<Vec<_>>()
        .join(", ")
}
