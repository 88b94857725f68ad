use bitvec::prelude::*;
use chrono::{DateTime, Utc};

use crate::{
    error::{Error, Result},
    sql::types::{DataType, Value},
};

/// Physical storage for column data, one contiguous vector per type.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Integer(Vec<i64>),
    Float(Vec<f64>),
    /// Compact bit-vector for boolean values.
    Boolean(BitVec),
    String(Vec<String>),
    Timestamp(Vec<DateTime<Utc>>),
}

/// A typed column of values plus a null bitmap.
///
/// A `true` bit in `nulls` marks the value at that index as NULL; the data
/// vector then holds a placeholder so both stay index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    datatype: DataType,
    data: ColumnData,
    nulls: BitVec,
}

impl Column {
    /// Creates a new, empty column of the given type.
    pub fn new(datatype: DataType) -> Self {
        let data = match datatype {
            DataType::Integer => ColumnData::Integer(vec![]),
            DataType::Float => ColumnData::Float(vec![]),
            DataType::Boolean => ColumnData::Boolean(bitvec!()),
            DataType::String => ColumnData::String(vec![]),
            DataType::Timestamp => ColumnData::Timestamp(vec![]),
        };
        Self {
            datatype,
            data,
            nulls: bitvec!(),
        }
    }

    /// Builds a column from values, all of which must match `datatype` or be NULL.
    pub fn from_values(datatype: DataType, values: impl IntoIterator<Item = Value>) -> Result<Self> {
        let mut column = Self::new(datatype);
        for value in values {
            column.push(value)?;
        }
        Ok(column)
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    /// Appends a value to the end of the column.
    ///
    /// # Errors
    /// Returns a type error if the value's type does not match the column's.
    pub fn push(&mut self, value: Value) -> Result<()> {
        if value.is_null() {
            self.nulls.push(true);
            match &mut self.data {
                ColumnData::Integer(v) => v.push(0),
                ColumnData::Float(v) => v.push(0.0),
                ColumnData::Boolean(v) => v.push(false),
                ColumnData::String(v) => v.push(String::new()),
                ColumnData::Timestamp(v) => v.push(DateTime::<Utc>::default()),
            }
            return Ok(());
        }

        match (&mut self.data, value) {
            (ColumnData::Integer(col), Value::Integer(v)) => col.push(v),
            (ColumnData::Float(col), Value::Float(v)) => col.push(v),
            (ColumnData::Boolean(col), Value::Boolean(v)) => col.push(v),
            (ColumnData::String(col), Value::String(v)) => col.push(v),
            (ColumnData::Timestamp(col), Value::Timestamp(v)) => col.push(v),
            (_, value) => {
                return Err(Error::Type(format!(
                    "value {} does not fit a {} column",
                    value, self.datatype
                )));
            }
        }
        self.nulls.push(false);
        Ok(())
    }

    /// Returns the number of values stored in the column.
    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any value in the column is NULL.
    pub fn has_nulls(&self) -> bool {
        self.nulls.any()
    }

    /// Retrieves the value at the given index, or `None` if out of bounds.
    pub fn get(&self, idx: usize) -> Option<Value> {
        if idx >= self.len() {
            return None;
        }
        if self.nulls[idx] {
            return Some(Value::Null);
        }
        Some(match &self.data {
            ColumnData::Integer(col) => Value::Integer(col[idx]),
            ColumnData::Float(col) => Value::Float(col[idx]),
            ColumnData::Boolean(col) => Value::Boolean(col[idx]),
            ColumnData::String(col) => Value::String(col[idx].clone()),
            ColumnData::Timestamp(col) => Value::Timestamp(col[idx]),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(|idx| self.get(idx))
    }

    /// Keeps only the values whose bit is set in `mask`.
    pub fn filter(&self, mask: &BitSlice) -> Result<Self> {
        if mask.len() != self.len() {
            return Err(Error::Internal(format!(
                "filter mask has {} bits for a column of {} values",
                mask.len(),
                self.len()
            )));
        }
        Self::from_values(self.datatype, mask.iter_ones().filter_map(|idx| self.get(idx)))
    }

    /// Keeps the first `n` values.
    pub fn head(&self, n: usize) -> Self {
        let mut column = self.clone();
        let n = n.min(self.len());
        column.nulls.truncate(n);
        match &mut column.data {
            ColumnData::Integer(v) => v.truncate(n),
            ColumnData::Float(v) => v.truncate(n),
            ColumnData::Boolean(v) => v.truncate(n),
            ColumnData::String(v) => v.truncate(n),
            ColumnData::Timestamp(v) => v.truncate(n),
        }
        column
    }

    /// Appends every value of `other`, which must have the same type.
    pub fn extend(&mut self, other: &Column) -> Result<()> {
        if other.datatype != self.datatype {
            return Err(Error::Type(format!(
                "cannot append a {} column to a {} column",
                other.datatype, self.datatype
            )));
        }
        for value in other.iter() {
            self.push(value)?;
        }
        Ok(())
    }
}
