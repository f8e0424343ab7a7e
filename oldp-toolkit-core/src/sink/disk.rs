//! Structured on-disk dataset sink.
//!
//! Layout under `root/<config>/`:
//!
//! ```text
//! dataset_dict.json
//! <split>/data-00000-of-00001.arrow   (Arrow IPC stream)
//! <split>/dataset_info.json
//! <split>/state.json
//! ```

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use arrow::ipc::writer::StreamWriter;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::table::{build_table, feature_of, Table};
use crate::batch::Batch;
use crate::contract::Record;
use crate::error::ConvertError;

const DATA_FILE: &str = "data-00000-of-00001.arrow";

pub struct DiskSink {
    root: PathBuf,
    config_name: String,
    split: String,
    chunk_size: usize,
    records: Vec<Record>,
}

impl DiskSink {
    pub fn new(root: &Path, config_name: &str, split: &str, chunk_size: usize) -> Self {
        Self {
            root: root.to_path_buf(),
            config_name: config_name.to_string(),
            split: split.to_string(),
            chunk_size,
            records: Vec::new(),
        }
    }

    pub fn write_batch(&mut self, batch: Batch) {
        self.records.extend(batch.into_records());
    }

    pub fn finish(self) -> Result<usize, ConvertError> {
        let config_dir = self.root.join(&self.config_name);
        let split_dir = config_dir.join(&self.split);
        if self.records.is_empty() {
            warn!(path = %split_dir.display(), "No records to write, skipping save to disk");
            return Ok(0);
        }
        info!(
            path = %self.root.display(),
            config = %self.config_name,
            split = %self.split,
            records = self.records.len(),
            "Saving dataset to disk"
        );

        let table = build_table(self.records, self.chunk_size)?;
        fs::create_dir_all(&split_dir).map_err(|e| ConvertError::io(&split_dir, e))?;

        write_arrow_stream(&split_dir.join(DATA_FILE), &table)?;
        write_json(&split_dir.join("dataset_info.json"), &dataset_info(&table))?;
        write_json(&split_dir.join("state.json"), &state(&self.split))?;
        update_dataset_dict(&config_dir.join("dataset_dict.json"), &self.split)?;

        info!(path = %split_dir.display(), records = table.num_rows, "Dataset save to disk completed");
        Ok(table.num_rows)
    }
}

fn write_arrow_stream(path: &Path, table: &Table) -> Result<(), ConvertError> {
    let to_io = |e: arrow::error::ArrowError| {
        ConvertError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
    };
    let file = File::create(path).map_err(|e| ConvertError::io(path, e))?;
    let mut writer = StreamWriter::try_new(BufWriter::new(file), &table.schema).map_err(to_io)?;
    for batch in &table.batches {
        writer.write(batch).map_err(to_io)?;
    }
    writer.finish().map_err(to_io)?;
    debug!(path = %path.display(), batches = table.batches.len(), "Wrote Arrow stream");
    Ok(())
}

fn write_json(path: &Path, value: &Value) -> Result<(), ConvertError> {
    let body = serde_json::to_vec_pretty(value).map_err(|e| ConvertError::io(path, e.into()))?;
    fs::write(path, body).map_err(|e| ConvertError::io(path, e))
}

fn dataset_info(table: &Table) -> Value {
    let mut features = serde_json::Map::new();
    for field in table.schema.fields() {
        features.insert(field.name().clone(), feature_of(field.data_type()));
    }
    json!({
        "citation": "",
        "description": "",
        "features": features,
        "homepage": "",
        "license": "",
    })
}

fn state(split: &str) -> Value {
    let fingerprint = Uuid::new_v4().simple().to_string();
    json!({
        "_data_files": [{ "filename": DATA_FILE }],
        "_fingerprint": &fingerprint[..16],
        "_format_columns": null,
        "_format_kwargs": {},
        "_format_type": null,
        "_output_all_columns": false,
        "_split": split,
    })
}

/// Register `split` in `dataset_dict.json`, keeping splits saved earlier.
fn update_dataset_dict(path: &Path, split: &str) -> Result<(), ConvertError> {
    let mut splits: Vec<String> = match fs::read_to_string(path) {
        Ok(existing) => serde_json::from_str::<Value>(&existing)
            .ok()
            .and_then(|v| v.get("splits").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(ConvertError::io(path, e)),
    };
    if !splits.iter().any(|s| s == split) {
        splits.push(split.to_string());
    }
    write_json(path, &json!({ "splits": splits }))
}
