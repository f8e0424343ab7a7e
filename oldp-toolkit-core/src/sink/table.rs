//! In-memory columnar table built from materialized records.
//!
//! The schema is the union of all record fields, inferred over the whole dataset.
//! Scalar conflicts (number vs string) widen to strings; a field seen both as a
//! scalar and as a nested object or list cannot be reconciled. Fields that only ever
//! hold empty objects are dropped, since Parquet has no empty group type. Integers
//! above `i64::MAX` are kept exact as `UInt64` when the field has no other kind of
//! number.

use std::io::Write;
use std::sync::Arc;

use arrow::datatypes::{DataType, FieldRef, Fields, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::json::reader::infer_json_schema_from_iterator;
use arrow::json::ReaderBuilder;
use arrow::record_batch::RecordBatch;
use parquet::arrow::{arrow_to_parquet_schema, ArrowWriter};
use parquet::basic::Compression;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::contract::Record;
use crate::error::ConvertError;

pub struct Table {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
    pub num_rows: usize,
}

fn schema_error(e: ArrowError) -> ConvertError {
    ConvertError::SchemaInference(e.to_string())
}

/// Build a table from all records, encoding them in chunks of `chunk_size` rows.
pub fn build_table(records: Vec<Record>, chunk_size: usize) -> Result<Table, ConvertError> {
    let rows: Vec<Value> = records.into_iter().map(Value::Object).collect();
    let inferred = infer_json_schema_from_iterator(rows.iter().map(Ok::<_, ArrowError>))
        .map_err(schema_error)?;
    let schema = Arc::new(widen_unsigned(prune_empty_structs(&inferred), &rows));
    debug!(fields = schema.fields().len(), rows = rows.len(), "Inferred union schema");

    let chunk_size = chunk_size.max(1);
    let mut decoder = ReaderBuilder::new(Arc::clone(&schema))
        .with_batch_size(chunk_size)
        .with_coerce_primitive(true)
        .build_decoder()
        .map_err(schema_error)?;

    let mut batches = Vec::with_capacity(rows.len().div_ceil(chunk_size));
    for chunk in rows.chunks(chunk_size) {
        decoder.serialize(chunk).map_err(schema_error)?;
        if let Some(batch) = decoder.flush().map_err(schema_error)? {
            batches.push(batch);
        }
    }

    Ok(Table {
        schema,
        batches,
        num_rows: rows.len(),
    })
}

fn prune_field(field: &FieldRef) -> Option<FieldRef> {
    let data_type = prune_type(field.data_type())?;
    Some(Arc::new(field.as_ref().clone().with_data_type(data_type)))
}

fn prune_type(data_type: &DataType) -> Option<DataType> {
    match data_type {
        DataType::Struct(fields) => {
            let kept: Vec<FieldRef> = fields.iter().filter_map(prune_field).collect();
            if kept.is_empty() {
                None
            } else {
                Some(DataType::Struct(Fields::from(kept)))
            }
        }
        DataType::List(item) => prune_field(item).map(DataType::List),
        other => Some(other.clone()),
    }
}

/// Remove struct fields with no children, recursively. The decoder skips the
/// corresponding JSON keys.
fn prune_empty_structs(schema: &Schema) -> Schema {
    let kept: Vec<FieldRef> = schema.fields().iter().filter_map(prune_field).collect();
    if kept.len() != schema.fields().len() {
        let dropped: Vec<&str> = schema
            .fields()
            .iter()
            .filter(|f| !kept.iter().any(|k| k.name() == f.name()))
            .map(|f| f.name().as_str())
            .collect();
        warn!(fields = ?dropped, "Dropping fields that only hold empty objects");
    }
    Schema::new(kept)
}

/// Top-level `Float64` fields whose values are all unsigned integers, at least one
/// beyond `i64::MAX`, become `UInt64` instead of losing precision.
fn widen_unsigned(schema: Schema, rows: &[Value]) -> Schema {
    let fields: Vec<FieldRef> = schema
        .fields()
        .iter()
        .map(|field| {
            if field.data_type() != &DataType::Float64 {
                return Arc::clone(field);
            }
            let values = || rows.iter().filter_map(|row| row.get(field.name()));
            let all_unsigned = values().all(|v| v.is_null() || v.is_u64());
            let beyond_i64 = values().any(|v| v.as_u64().is_some_and(|n| n > i64::MAX as u64));
            if all_unsigned && beyond_i64 {
                debug!(field = %field.name(), "Storing large unsigned integers as uint64");
                Arc::new(field.as_ref().clone().with_data_type(DataType::UInt64))
            } else {
                Arc::clone(field)
            }
        })
        .collect();
    Schema::new(fields)
}

/// Fail with [`ConvertError::SchemaInference`] if the table has no Parquet mapping.
/// Run before any destination is touched.
pub fn check_parquet_schema(table: &Table) -> Result<(), ConvertError> {
    arrow_to_parquet_schema(&table.schema)
        .map(|_| ())
        .map_err(|e| ConvertError::SchemaInference(e.to_string()))
}

/// Write the table as one snappy-compressed Parquet file.
pub fn write_parquet<W: Write + Send>(writer: W, table: &Table) -> Result<(), ParquetError> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(writer, Arc::clone(&table.schema), Some(props))?;
    for batch in &table.batches {
        writer.write(batch)?;
    }
    writer.close()?;
    Ok(())
}

/// Dataset-library feature description of an Arrow type.
pub fn feature_of(data_type: &DataType) -> Value {
    let dtype = match data_type {
        DataType::List(field) | DataType::LargeList(field) => {
            return json!([feature_of(field.data_type())]);
        }
        DataType::Struct(fields) => {
            let mut features = serde_json::Map::new();
            for field in fields {
                features.insert(field.name().clone(), feature_of(field.data_type()));
            }
            return Value::Object(features);
        }
        DataType::Null => "null",
        DataType::Boolean => "bool",
        DataType::Int8 => "int8",
        DataType::Int16 => "int16",
        DataType::Int32 => "int32",
        DataType::Int64 => "int64",
        DataType::UInt8 => "uint8",
        DataType::UInt16 => "uint16",
        DataType::UInt32 => "uint32",
        DataType::UInt64 => "uint64",
        DataType::Float32 => "float32",
        DataType::Float64 => "float64",
        DataType::LargeUtf8 => "large_string",
        _ => "string",
    };
    json!({ "dtype": dtype, "_type": "Value" })
}
