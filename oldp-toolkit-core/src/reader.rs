//! Line-delimited JSON record reader with transparent gzip support.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::bufread::MultiGzDecoder;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::contract::Record;
use crate::error::ConvertError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Lazy sequence of records, one per non-blank input line.
///
/// Ends after the first error. The file handle is released when the reader is dropped.
pub struct RecordReader {
    path: PathBuf,
    lines: Box<dyn BufRead + Send>,
    line_no: usize,
    records_read: usize,
    buf: String,
    done: bool,
}

impl RecordReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            error!(path = %path.display(), "Input file not found");
            return Err(ConvertError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "input file not found"),
            ));
        }

        let file = File::open(&path).map_err(|e| ConvertError::io(&path, e))?;
        let mut inner = BufReader::new(file);
        let gzipped = is_gzip(&path, &mut inner).map_err(|e| ConvertError::io(&path, e))?;
        info!(path = %path.display(), gzipped, "Loading records");

        let lines: Box<dyn BufRead + Send> = if gzipped {
            Box::new(BufReader::new(MultiGzDecoder::new(inner)))
        } else {
            Box::new(inner)
        };

        Ok(Self {
            path,
            lines,
            line_no: 0,
            records_read: 0,
            buf: String::new(),
            done: false,
        })
    }

    /// Number of records produced so far.
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    fn fail(&mut self, err: ConvertError) -> Option<Result<Record, ConvertError>> {
        self.done = true;
        error!(path = %self.path.display(), line = self.line_no, error = %err, "Failed to read record");
        Some(Err(err))
    }
}

fn is_gzip(path: &Path, reader: &mut BufReader<File>) -> std::io::Result<bool> {
    let by_extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    if by_extension {
        return Ok(true);
    }
    let head = reader.fill_buf()?;
    Ok(head.starts_with(&GZIP_MAGIC))
}

impl Iterator for RecordReader {
    type Item = Result<Record, ConvertError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.buf.clear();
            let read = match self.lines.read_line(&mut self.buf) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                    self.line_no += 1;
                    let line = self.line_no;
                    return self.fail(ConvertError::MalformedInput {
                        line,
                        reason: "line is not valid UTF-8".into(),
                    });
                }
                Err(e) => {
                    let path = self.path.clone();
                    return self.fail(ConvertError::io(path, e));
                }
            };
            if read == 0 {
                self.done = true;
                debug!(path = %self.path.display(), records = self.records_read, "Reached end of input");
                return None;
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            return match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(record)) => {
                    self.records_read += 1;
                    Some(Ok(record))
                }
                Ok(other) => {
                    let line = self.line_no;
                    self.fail(ConvertError::MalformedInput {
                        line,
                        reason: format!("expected a JSON object, found {}", json_kind(&other)),
                    })
                }
                Err(e) => {
                    let line = self.line_no;
                    self.fail(ConvertError::MalformedInput {
                        line,
                        reason: e.to_string(),
                    })
                }
            };
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
