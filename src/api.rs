//! Request and response bodies in the emulated service's JSON shapes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::{
    error::{Error, Result},
    job::{Job, JobConfiguration, JobReference, JobState, JobStatistics, QueryResults},
    sql::{
        schema::Schema,
        types::{format_float, DataType, Value},
    },
    storage::{DatasetRef, Table, TableRef},
};

/// `tables().insert` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInsertRequest {
    pub table_reference: TableRef,
    #[serde(default)]
    pub schema: Schema,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableResource {
    pub kind: String,
    pub id: String,
    pub table_reference: TableRef,
    pub schema: Schema,
    /// Decimal string, as the service renders 64-bit counts
    pub num_rows: String,
}

impl TableResource {
    pub fn new(table_ref: TableRef, table: &Table) -> Self {
        Self {
            kind: "bigquery#table".to_string(),
            id: table_ref.to_string(),
            table_reference: table_ref,
            schema: table.schema().clone(),
            num_rows: table.num_rows().to_string(),
        }
    }
}

/// `datasets().insert` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetInsertRequest {
    pub dataset_reference: DatasetRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetResource {
    pub kind: String,
    pub id: String,
    pub dataset_reference: DatasetRef,
}

impl From<DatasetRef> for DatasetResource {
    fn from(dataset_ref: DatasetRef) -> Self {
        Self {
            kind: "bigquery#dataset".to_string(),
            id: dataset_ref.to_string(),
            dataset_reference: dataset_ref,
        }
    }
}

/// `tabledata().insertAll` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRequest {
    pub rows: Vec<InsertAllRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    pub json: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertAllResponse {
    pub kind: String,
}

impl Default for InsertAllResponse {
    fn default() -> Self {
        Self {
            kind: "bigquery#tableDataInsertAllResponse".to_string(),
        }
    }
}

/// `jobReference` of a job insert request; the project defaults to the path's
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestedJobReference {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
}

/// `jobs().insert` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInsertRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_reference: Option<RequestedJobReference>,
    pub configuration: JobConfiguration,
}

impl JobInsertRequest {
    pub fn new(configuration: JobConfiguration) -> Self {
        Self {
            job_reference: None,
            configuration,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorProto {
    pub reason: String,
    pub message: String,
}

impl From<&Error> for ErrorProto {
    fn from(err: &Error) -> Self {
        Self {
            reason: err.reason().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_result: Option<ErrorProto>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResource {
    pub kind: String,
    pub id: String,
    pub job_reference: JobReference,
    pub configuration: JobConfiguration,
    pub status: JobStatus,
    pub statistics: JobStatistics,
}

impl From<&Job> for JobResource {
    fn from(job: &Job) -> Self {
        Self {
            kind: "bigquery#job".to_string(),
            id: job.reference().to_string(),
            job_reference: job.reference().clone(),
            configuration: job.configuration().clone(),
            status: JobStatus {
                state: job.state(),
                error_result: job.error().map(ErrorProto::from),
            },
            statistics: job.statistics().clone(),
        }
    }
}

/// One result cell: `{"v": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub v: JsonValue,
}

/// One result row: `{"f": [cells]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub f: Vec<TableCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResultsResponse {
    pub kind: String,
    pub job_reference: JobReference,
    pub schema: Schema,
    pub rows: Vec<TableRow>,
    pub total_rows: String,
    pub job_complete: bool,
}

impl From<QueryResults> for QueryResultsResponse {
    fn from(results: QueryResults) -> Self {
        Self {
            kind: "bigquery#getQueryResultsResponse".to_string(),
            job_reference: results.job_reference,
            schema: results.schema,
            rows: results
                .rows
                .iter()
                .map(|row| TableRow {
                    f: row.iter().map(|v| TableCell { v: render_cell(v) }).collect(),
                })
                .collect(),
            total_rows: results.total_rows.to_string(),
            job_complete: results.job_complete,
        }
    }
}

/// Error body the facade sends along with `status()`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    pub errors: Vec<ErrorProto>,
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self {
            error: ErrorBody {
                code: err.status(),
                message: err.to_string(),
                errors: vec![ErrorProto::from(err)],
            },
        }
    }
}

/// Renders a value as the text the service puts in a result cell
pub fn render_cell(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::String(b.to_string()),
        Value::Integer(i) => JsonValue::String(i.to_string()),
        Value::Float(f) => JsonValue::String(format_float(*f)),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Timestamp(ts) => {
            JsonValue::String(format_float(ts.timestamp_micros() as f64 / 1_000_000.0))
        }
    }
}

/// Converts a JSON row value to a typed value of the field's type
pub fn value_from_json(json: &JsonValue, datatype: DataType) -> Result<Value> {
    let invalid = || Error::InvalidArgument(format!("cannot convert {} to {}", json, datatype));
    Ok(match (datatype, json) {
        (_, JsonValue::Null) => Value::Null,
        (DataType::Integer, JsonValue::Number(n)) => Value::Integer(n.as_i64().ok_or_else(invalid)?),
        (DataType::Integer, JsonValue::String(s)) => {
            Value::Integer(s.trim().parse().map_err(|_| invalid())?)
        }
        (DataType::Float, JsonValue::Number(n)) => Value::Float(n.as_f64().ok_or_else(invalid)?),
        (DataType::Float, JsonValue::String(s)) => Value::Float(s.trim().parse().map_err(|_| invalid())?),
        (DataType::Boolean, JsonValue::Bool(b)) => Value::Boolean(*b),
        (DataType::Boolean, JsonValue::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            _ => return Err(invalid()),
        },
        (DataType::String, JsonValue::String(s)) => Value::String(s.clone()),
        (DataType::Timestamp, JsonValue::String(s)) => {
            Value::Timestamp(Value::parse_timestamp(s).ok_or_else(invalid)?)
        }
        (DataType::Timestamp, JsonValue::Number(n)) => {
            let micros = (n.as_f64().ok_or_else(invalid)? * 1_000_000.0).round() as i64;
            Value::Timestamp(chrono::DateTime::from_timestamp_micros(micros).ok_or_else(invalid)?)
        }
        _ => return Err(invalid()),
    })
}

/// Converts a JSON row object to named values against `schema`
pub fn named_row(schema: &Schema, json: &Map<String, JsonValue>) -> Result<Vec<(String, Value)>> {
    json.iter()
        .map(|(name, value)| {
            let idx = schema
                .get_field_index(name)
                .ok_or_else(|| Error::InvalidArgument(format!("no such field: {}", name)))?;
            Ok((name.clone(), value_from_json(value, schema.fields[idx].datatype)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{named_row, render_cell, value_from_json, JobInsertRequest, TableInsertRequest, TableResource};
    use crate::{
        error::{Error, Result},
        job::JobConfiguration,
        sql::{
            schema::{Field, Schema},
            types::{DataType, Value},
        },
        storage::{Table, TableRef},
    };

    #[test]
    fn test_render_cells() {
        assert_eq!(render_cell(&Value::Integer(7)), json!("7"));
        assert_eq!(render_cell(&Value::Float(7.0)), json!("7.0"));
        assert_eq!(render_cell(&Value::Float(0.25)), json!("0.25"));
        assert_eq!(render_cell(&Value::Boolean(true)), json!("true"));
        assert_eq!(render_cell(&Value::String("hi".into())), json!("hi"));
        assert_eq!(render_cell(&Value::Null), json!(null));
        let ts = Value::parse_timestamp("2014-06-06 00:00:00").map(Value::Timestamp);
        assert_eq!(ts.as_ref().map(render_cell), Some(json!("1402012800.0")));
    }

    #[test]
    fn test_value_from_json() -> Result<()> {
        assert_eq!(value_from_json(&json!(3), DataType::Integer)?, Value::Integer(3));
        assert_eq!(value_from_json(&json!("3"), DataType::Integer)?, Value::Integer(3));
        assert_eq!(value_from_json(&json!(3), DataType::Float)?, Value::Float(3.0));
        assert_eq!(value_from_json(&json!("TRUE"), DataType::Boolean)?, Value::Boolean(true));
        assert_eq!(value_from_json(&json!(null), DataType::String)?, Value::Null);
        assert!(matches!(
            value_from_json(&json!(1.5), DataType::Integer),
            Err(Error::InvalidArgument(_))
        ));
        assert!(value_from_json(&json!(true), DataType::String).is_err());
        assert!(value_from_json(&json!("soon"), DataType::Timestamp).is_err());
        Ok(())
    }

    #[test]
    fn test_named_row() -> Result<()> {
        let schema = Schema::new(vec![
            Field::new("foo", DataType::Integer),
            Field::new("bar", DataType::Boolean),
        ]);
        let row = json!({"bar": false, "foo": "12"});
        let named = named_row(&schema, row.as_object().ok_or_else(|| Error::Internal("object".into()))?)?;
        assert_eq!(schema.row_from_named(named)?, vec![Value::Integer(12), Value::Boolean(false)]);

        let row = json!({"baz": 1});
        assert!(named_row(&schema, row.as_object().ok_or_else(|| Error::Internal("object".into()))?).is_err());
        Ok(())
    }

    #[test]
    fn test_table_resource_shape() -> Result<()> {
        let request: TableInsertRequest = serde_json::from_value(json!({
            "tableReference": {"projectId": "test_project", "datasetId": "test_dataset", "tableId": "test_table"},
            "schema": {"fields": [
                {"name": "foo", "type": "INTEGER"},
                {"name": "bar", "type": "BOOLEAN"},
            ]},
        }))?;
        let table = Table::new(request.schema.clone());
        let resource = TableResource::new(request.table_reference.clone(), &table);
        let value = serde_json::to_value(&resource)?;
        assert_eq!(
            value["schema"]["fields"][1],
            json!({"name": "bar", "type": "BOOLEAN", "mode": "NULLABLE"})
        );
        assert_eq!(value["numRows"], json!("0"));
        assert_eq!(value["id"], json!("test_project:test_dataset.test_table"));
        assert_eq!(request.table_reference, TableRef::new("test_project", "test_dataset", "test_table"));
        Ok(())
    }

    #[test]
    fn test_job_insert_request() -> Result<()> {
        let request = JobInsertRequest::from_json(
            r#"{"projectId": "test_project", "configuration": {"query": {"query": "SELECT 7 as foo"}}}"#,
        )?;
        assert!(request.job_reference.is_none());
        assert!(matches!(request.configuration, JobConfiguration::Query(_)));

        let request = JobInsertRequest::from_json(
            r#"{"jobReference": {"jobId": "abc"}, "configuration": {"query": {"query": "SELECT 1"}}}"#,
        )?;
        assert_eq!(request.job_reference.and_then(|r| r.job_id), Some("abc".to_string()));

        assert!(matches!(
            JobInsertRequest::from_json(r#"{"configuration": {}}"#),
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }
}
