//! Columnar file sink. Holds every record until the single Parquet write.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::table::{build_table, check_parquet_schema, write_parquet};
use crate::batch::Batch;
use crate::contract::Record;
use crate::error::ConvertError;

pub struct ParquetSink {
    path: PathBuf,
    chunk_size: usize,
    records: Vec<Record>,
}

impl ParquetSink {
    pub fn new(path: &Path, chunk_size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            chunk_size,
            records: Vec::new(),
        }
    }

    pub fn write_batch(&mut self, batch: Batch) {
        self.records.extend(batch.into_records());
    }

    pub fn finish(self) -> Result<usize, ConvertError> {
        if self.records.is_empty() {
            warn!(path = %self.path.display(), "No records to write, skipping Parquet export");
            return Ok(0);
        }
        info!(path = %self.path.display(), records = self.records.len(), "Saving dataset to Parquet");

        let table = build_table(self.records, self.chunk_size)?;
        check_parquet_schema(&table)?;
        let file = File::create(&self.path).map_err(|e| ConvertError::io(&self.path, e))?;
        if let Err(e) = write_parquet(BufWriter::new(file), &table) {
            if let Err(remove) = fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %remove, "Could not remove partial Parquet file");
            }
            return Err(ConvertError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::Other, e),
            ));
        }

        info!(path = %self.path.display(), records = table.num_rows, "Parquet export completed");
        Ok(table.num_rows)
    }
}
