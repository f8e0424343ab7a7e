//! Streaming line-delimited JSON sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::batch::Batch;
use crate::error::ConvertError;

enum Output {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Output {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Output::Plain(w) => w,
            Output::Gzip(w) => w,
        }
    }

    fn finish(self) -> std::io::Result<()> {
        match self {
            Output::Plain(mut w) => w.flush(),
            Output::Gzip(w) => w.finish()?.flush(),
        }
    }
}

/// Writes every record as one JSON line as batches arrive.
pub struct JsonlSink {
    path: PathBuf,
    out: Output,
    written: usize,
}

impl JsonlSink {
    /// Create (or truncate) the destination file. A `.gz` destination is gzip-compressed.
    pub fn create(path: &Path) -> Result<Self, ConvertError> {
        let file = File::create(path).map_err(|e| {
            ConvertError::config(format!(
                "destination {} is not writable: {e}",
                path.display()
            ))
        })?;
        let buffered = BufWriter::new(file);
        let gzip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        let out = if gzip {
            Output::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            Output::Plain(buffered)
        };
        info!(path = %path.display(), gzip, "Saving dataset to JSONL");
        Ok(Self {
            path: path.to_path_buf(),
            out,
            written: 0,
        })
    }

    pub fn write_batch(&mut self, batch: Batch) -> Result<(), ConvertError> {
        let count = batch.len();
        let writer = self.out.writer();
        for record in batch.records() {
            serde_json::to_writer(&mut *writer, record)
                .map_err(|e| ConvertError::io(&self.path, e.into()))?;
            writer
                .write_all(b"\n")
                .map_err(|e| ConvertError::io(&self.path, e))?;
        }
        self.written += count;
        debug!(path = %self.path.display(), records = count, "Wrote batch");
        Ok(())
    }

    pub fn finish(self) -> Result<usize, ConvertError> {
        let Self { path, out, written } = self;
        out.finish().map_err(|e| ConvertError::io(&path, e))?;
        info!(path = %path.display(), records = written, "JSONL export completed");
        Ok(written)
    }
}
