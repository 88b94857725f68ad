use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    sql::types::{DataType, Row, Value},
};

/// Field nullability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    #[default]
    Nullable,
    Required,
}

/// Field (column) definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub datatype: DataType,
    #[serde(default)]
    pub mode: Mode,
}

impl Field {
    pub fn new(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            datatype,
            mode: Mode::Nullable,
        }
    }

    pub fn required(name: impl Into<String>, datatype: DataType) -> Self {
        Self {
            name: name.into(),
            datatype,
            mode: Mode::Required,
        }
    }

    pub fn nullable(&self) -> bool {
        self.mode == Mode::Nullable
    }
}

/// Ordered field list describing a table's row shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Validates the schema: field names are non-empty and unique
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(Error::InvalidArgument("field name cannot be empty".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::InvalidArgument(format!(
                    "duplicate field name {}",
                    field.name
                )));
            }
        }
        Ok(())
    }

    /// Returns the position of a field by name
    pub fn get_field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether rows of `other` can be appended to a table with this schema:
    /// same field names, types and order. Modes are not compared.
    pub fn is_append_compatible(&self, other: &Schema) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.name == b.name && a.datatype == b.datatype)
    }

    /// Checks a row against the schema in length, per-field type and nullability
    pub fn check_row(&self, row: &Row) -> Result<()> {
        if row.len() != self.fields.len() {
            return Err(Error::Type(format!(
                "row has {} values but schema has {} fields",
                row.len(),
                self.fields.len()
            )));
        }
        for (field, value) in self.fields.iter().zip(row.iter()) {
            match value.datatype() {
                None if field.nullable() => {}
                None => {
                    return Err(Error::Type(format!(
                        "field {} cannot be null",
                        field.name
                    )))
                }
                Some(dt) if dt != field.datatype => {
                    return Err(Error::Type(format!(
                        "field {} has type {} but got {}",
                        field.name, field.datatype, value
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Builds a row from named values, filling absent nullable fields with NULL
    pub fn row_from_named(&self, mut named: Vec<(String, Value)>) -> Result<Row> {
        let mut row = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            match named.iter().position(|(n, _)| *n == field.name) {
                Some(pos) => row.push(named.swap_remove(pos).1),
                None if field.nullable() => row.push(Value::Null),
                None => {
                    return Err(Error::InvalidArgument(format!(
                        "missing required field {}",
                        field.name
                    )))
                }
            }
        }
        if let Some((name, _)) = named.first() {
            return Err(Error::InvalidArgument(format!("no such field: {}", name)));
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::{Field, Mode, Schema};
    use crate::{
        error::{Error, Result},
        sql::types::{DataType, Value},
    };

    fn simple_schema() -> Schema {
        Schema::new(vec![
            Field::new("foo", DataType::Integer),
            Field::required("bar", DataType::Boolean),
        ])
    }

    #[test]
    fn test_schema_json() -> Result<()> {
        let schema: Schema = serde_json::from_str(
            r#"{"fields": [{"name": "foo", "type": "INTEGER"}, {"name": "bar", "type": "BOOLEAN", "mode": "REQUIRED"}]}"#,
        )?;
        assert_eq!(schema, simple_schema());

        let json = serde_json::to_value(&schema.fields[0])?;
        assert_eq!(
            json,
            serde_json::json!({"name": "foo", "type": "INTEGER", "mode": "NULLABLE"})
        );

        let bad: std::result::Result<Field, _> =
            serde_json::from_str(r#"{"name": "foo", "type": "INTEGER", "mode": "REPEATED"}"#);
        assert!(bad.is_err());
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(simple_schema().validate().is_ok());
        let dup = Schema::new(vec![
            Field::new("a", DataType::Integer),
            Field::new("a", DataType::String),
        ]);
        assert!(matches!(dup.validate(), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_check_row() {
        let schema = simple_schema();
        assert!(schema.check_row(&vec![Value::Null, Value::Boolean(true)]).is_ok());
        assert!(schema.check_row(&vec![Value::Integer(1), Value::Null]).is_err());
        assert!(schema.check_row(&vec![Value::Float(1.0), Value::Boolean(true)]).is_err());
        assert!(schema.check_row(&vec![Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_append_compatible() {
        let schema = simple_schema();
        let mut relaxed = schema.clone();
        relaxed.fields[1].mode = Mode::Nullable;
        assert!(schema.is_append_compatible(&relaxed));

        let reordered = Schema::new(vec![
            Field::new("bar", DataType::Boolean),
            Field::new("foo", DataType::Integer),
        ]);
        assert!(!schema.is_append_compatible(&reordered));
    }

    #[test]
    fn test_row_from_named() -> Result<()> {
        let schema = simple_schema();
        let row = schema.row_from_named(vec![("bar".into(), Value::Boolean(false))])?;
        assert_eq!(row, vec![Value::Null, Value::Boolean(false)]);

        assert!(schema.row_from_named(vec![("foo".into(), Value::Integer(1))]).is_err());
        assert!(schema
            .row_from_named(vec![
                ("bar".into(), Value::Boolean(true)),
                ("baz".into(), Value::Integer(1)),
            ])
            .is_err());
        Ok(())
    }
}
