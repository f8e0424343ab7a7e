//! # sink: output targets for the batch stream
//!
//! A [`SinkConfig`] is resolved and validated from user options before any input is
//! read; [`OpenSink::open`] then performs the per-target precondition checks
//! (destination writability, hub credential) and consumes batches.

pub mod disk;
pub mod hub;
pub mod jsonl;
pub mod parquet;
pub mod table;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::batch::Batch;
use crate::contract::HubUploader;
use crate::error::ConvertError;

use self::disk::DiskSink;
use self::hub::HubSink;
use self::jsonl::JsonlSink;
use self::parquet::ParquetSink;

pub const DEFAULT_SPLIT: &str = "train";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    HfHub,
    Jsonl,
    Parquet,
    HfDisk,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::HfHub => "hf_hub",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Parquet => "parquet",
            OutputFormat::HfDisk => "hf_disk",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hf_hub" => Ok(OutputFormat::HfHub),
            "jsonl" => Ok(OutputFormat::Jsonl),
            "parquet" => Ok(OutputFormat::Parquet),
            "hf_disk" => Ok(OutputFormat::HfDisk),
            other => Err(ConvertError::config(format!(
                "unknown output format '{other}' (expected hf_hub, jsonl, parquet or hf_disk)"
            ))),
        }
    }
}

/// Validated output target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkConfig {
    HubUpload {
        repo_id: String,
        config_name: String,
        split: String,
        private: bool,
    },
    Jsonl {
        destination: PathBuf,
    },
    Parquet {
        destination: PathBuf,
    },
    Disk {
        destination: PathBuf,
        config_name: String,
        split: String,
    },
}

fn split_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\w+(\.\w+)*$").expect("static split pattern"))
}

fn repo_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.-]+(/[\w.-]+)?$").expect("static repo id pattern"))
}

fn require_config_name(
    format: OutputFormat,
    config_name: Option<&str>,
) -> Result<String, ConvertError> {
    match config_name.map(str::trim) {
        Some(name) if !name.is_empty() => {
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(ConvertError::config(format!("invalid config name '{name}'")));
            }
            Ok(name.to_string())
        }
        _ => Err(ConvertError::config(format!(
            "--config-name is required for the {format} format"
        ))),
    }
}

fn validate_split(split: &str) -> Result<String, ConvertError> {
    if split_pattern().is_match(split) {
        Ok(split.to_string())
    } else {
        Err(ConvertError::config(format!(
            "invalid split name '{split}' (must match \\w+(\\.\\w+)*)"
        )))
    }
}

/// Map a destination to a local path. Plain paths and `file://` URIs are accepted.
pub fn local_destination(output: &str) -> Result<PathBuf, ConvertError> {
    if let Some(path) = output.strip_prefix("file://") {
        if path.is_empty() {
            return Err(ConvertError::config("empty file:// destination"));
        }
        return Ok(PathBuf::from(path));
    }
    if let Some((scheme, _)) = output.split_once("://") {
        return Err(ConvertError::config(format!(
            "unsupported destination scheme '{scheme}://' (only local paths and file:// are supported)"
        )));
    }
    if output.is_empty() {
        return Err(ConvertError::config("empty destination"));
    }
    Ok(PathBuf::from(output))
}

impl SinkConfig {
    /// Resolve user options for `format` into a validated target.
    pub fn resolve(
        format: OutputFormat,
        output: &str,
        config_name: Option<&str>,
        split: &str,
        private: bool,
    ) -> Result<Self, ConvertError> {
        let resolved = match format {
            OutputFormat::HfHub => {
                let config_name = require_config_name(format, config_name)?;
                let split = validate_split(split)?;
                if !repo_id_pattern().is_match(output) || output.contains("..") {
                    return Err(ConvertError::config(format!(
                        "invalid repository id '{output}' (expected 'namespace/name' or 'name')"
                    )));
                }
                SinkConfig::HubUpload {
                    repo_id: output.to_string(),
                    config_name,
                    split,
                    private,
                }
            }
            OutputFormat::Jsonl => SinkConfig::Jsonl {
                destination: local_destination(output)?,
            },
            OutputFormat::Parquet => SinkConfig::Parquet {
                destination: local_destination(output)?,
            },
            OutputFormat::HfDisk => {
                let config_name = require_config_name(format, config_name)?;
                let split = validate_split(split)?;
                SinkConfig::Disk {
                    destination: local_destination(output)?,
                    config_name,
                    split,
                }
            }
        };
        debug!(?resolved, "Resolved sink configuration");
        Ok(resolved)
    }

    pub fn format(&self) -> OutputFormat {
        match self {
            SinkConfig::HubUpload { .. } => OutputFormat::HfHub,
            SinkConfig::Jsonl { .. } => OutputFormat::Jsonl,
            SinkConfig::Parquet { .. } => OutputFormat::Parquet,
            SinkConfig::Disk { .. } => OutputFormat::HfDisk,
        }
    }
}

/// A file destination must not be a directory and its parent must exist.
fn check_file_destination(path: &Path) -> Result<(), ConvertError> {
    if path.is_dir() {
        return Err(ConvertError::config(format!(
            "destination {} is a directory",
            path.display()
        )));
    }
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        if !parent.is_dir() {
            return Err(ConvertError::config(format!(
                "destination directory {} does not exist",
                parent.display()
            )));
        }
    }
    Ok(())
}

/// An output target ready to consume batches.
pub enum OpenSink<'a> {
    Hub(HubSink<'a>),
    Jsonl(JsonlSink),
    Parquet(ParquetSink),
    Disk(DiskSink),
}

impl<'a> OpenSink<'a> {
    /// Run the target's precondition checks and open it.
    ///
    /// `chunk_size` is the row count per columnar chunk of materializing targets.
    pub async fn open(
        config: &SinkConfig,
        hub: Option<&'a dyn HubUploader>,
        chunk_size: usize,
    ) -> Result<OpenSink<'a>, ConvertError> {
        debug!(format = %config.format(), "Opening sink");
        match config {
            SinkConfig::HubUpload {
                repo_id,
                config_name,
                split,
                private,
            } => {
                let Some(hub) = hub else {
                    error!(repo_id = %repo_id, "No dataset hub client available");
                    return Err(ConvertError::Authentication(
                        "no dataset hub credential available (set HF_TOKEN)".into(),
                    ));
                };
                let sink =
                    HubSink::open(hub, repo_id, config_name, split, *private, chunk_size).await?;
                Ok(OpenSink::Hub(sink))
            }
            SinkConfig::Jsonl { destination } => {
                check_file_destination(destination)?;
                Ok(OpenSink::Jsonl(JsonlSink::create(destination)?))
            }
            SinkConfig::Parquet { destination } => {
                check_file_destination(destination)?;
                Ok(OpenSink::Parquet(ParquetSink::new(destination, chunk_size)))
            }
            SinkConfig::Disk {
                destination,
                config_name,
                split,
            } => {
                if destination.exists() && !destination.is_dir() {
                    return Err(ConvertError::config(format!(
                        "destination {} exists and is not a directory",
                        destination.display()
                    )));
                }
                Ok(OpenSink::Disk(DiskSink::new(
                    destination,
                    config_name,
                    split,
                    chunk_size,
                )))
            }
        }
    }

    pub fn write_batch(&mut self, batch: Batch) -> Result<(), ConvertError> {
        match self {
            OpenSink::Hub(sink) => sink.write_batch(batch),
            OpenSink::Jsonl(sink) => sink.write_batch(batch)?,
            OpenSink::Parquet(sink) => sink.write_batch(batch),
            OpenSink::Disk(sink) => sink.write_batch(batch),
        }
        Ok(())
    }

    /// Flush or materialize everything. Returns the number of records written.
    pub async fn finish(self) -> Result<usize, ConvertError> {
        match self {
            OpenSink::Hub(sink) => sink.finish().await,
            OpenSink::Jsonl(sink) => sink.finish(),
            OpenSink::Parquet(sink) => sink.finish(),
            OpenSink::Disk(sink) => sink.finish(),
        }
    }
}
