//! Dataset hub sink: one Parquet file per config/split plus a dataset card.

use serde_yaml::{Mapping, Value as Yaml};
use tracing::{debug, info, warn};

use super::table::{build_table, check_parquet_schema, write_parquet};
use crate::batch::Batch;
use crate::contract::{HubError, HubFile, HubUploader, Record};
use crate::error::ConvertError;

const CARD_PATH: &str = "README.md";

fn hub_error(e: HubError) -> ConvertError {
    match e {
        HubError::Unauthorized(msg) => ConvertError::Authentication(msg),
        HubError::Request(msg) => ConvertError::Upload(msg),
    }
}

/// Repository path of the data file for a config/split.
pub fn data_file_path(config_name: &str, split: &str) -> String {
    format!("{config_name}/{split}-00000-of-00001.parquet")
}

pub struct HubSink<'a> {
    hub: &'a dyn HubUploader,
    repo_id: String,
    config_name: String,
    split: String,
    private: bool,
    chunk_size: usize,
    records: Vec<Record>,
}

impl<'a> HubSink<'a> {
    /// Check the credential before any input is read.
    pub async fn open(
        hub: &'a dyn HubUploader,
        repo_id: &str,
        config_name: &str,
        split: &str,
        private: bool,
        chunk_size: usize,
    ) -> Result<HubSink<'a>, ConvertError> {
        let user = hub.whoami().await.map_err(hub_error)?;
        info!(user = %user, repo_id, "Authenticated with dataset hub");
        Ok(Self {
            hub,
            repo_id: repo_id.to_string(),
            config_name: config_name.to_string(),
            split: split.to_string(),
            private,
            chunk_size,
            records: Vec::new(),
        })
    }

    pub fn write_batch(&mut self, batch: Batch) {
        self.records.extend(batch.into_records());
    }

    pub async fn finish(self) -> Result<usize, ConvertError> {
        if self.records.is_empty() {
            warn!(repo_id = %self.repo_id, "No records to write, skipping upload");
            return Ok(0);
        }
        info!(
            repo_id = %self.repo_id,
            config = %self.config_name,
            split = %self.split,
            records = self.records.len(),
            "Pushing dataset to hub"
        );

        let table = build_table(self.records, self.chunk_size)?;
        check_parquet_schema(&table)?;
        let mut parquet = Vec::new();
        write_parquet(&mut parquet, &table)
            .map_err(|e| ConvertError::SchemaInference(e.to_string()))?;
        debug!(bytes = parquet.len(), "Encoded Parquet payload");

        self.hub
            .create_repo(&self.repo_id, self.private)
            .await
            .map_err(hub_error)?;

        let data_path = data_file_path(&self.config_name, &self.split);
        let existing = self
            .hub
            .fetch_file(&self.repo_id, CARD_PATH)
            .await
            .map_err(hub_error)?;
        let card = merge_dataset_card(
            existing.as_deref(),
            &self.repo_id,
            &self.config_name,
            &self.split,
        )?;

        let files = vec![
            HubFile {
                path: data_path.clone(),
                content: parquet,
            },
            HubFile {
                path: CARD_PATH.to_string(),
                content: card.into_bytes(),
            },
        ];
        let summary = format!("Upload {}/{}", self.config_name, self.split);
        self.hub
            .commit(&self.repo_id, &summary, files)
            .await
            .map_err(hub_error)?;

        info!(repo_id = %self.repo_id, path = %data_path, records = table.num_rows, "Upload completed");
        Ok(table.num_rows)
    }
}

/// Split a card into its YAML front matter and the remaining body.
fn split_front_matter(card: &str) -> (Option<&str>, &str) {
    let Some(rest) = card.strip_prefix("---\n") else {
        return (None, card);
    };
    if let Some(body) = rest.strip_prefix("---\n") {
        return (Some(""), body);
    }
    match rest.find("\n---\n") {
        Some(end) => (Some(&rest[..end + 1]), &rest[end + 5..]),
        None => match rest.strip_suffix("\n---") {
            Some(front) => (Some(front), ""),
            None => (None, card),
        },
    }
}

fn key(name: &str) -> Yaml {
    Yaml::String(name.to_string())
}

/// Register `config_name`/`split` in the card's `configs` front matter.
///
/// Other configs, other splits and the card body are kept. A missing card gets a
/// minimal body titled with the repository id.
pub fn merge_dataset_card(
    existing: Option<&str>,
    repo_id: &str,
    config_name: &str,
    split: &str,
) -> Result<String, ConvertError> {
    let (front, body) = match existing {
        Some(card) => split_front_matter(card),
        None => (None, ""),
    };
    let body = if existing.is_none() {
        format!("# {repo_id}\n")
    } else {
        body.to_string()
    };

    let mut meta = match front {
        Some(yaml) if !yaml.trim().is_empty() => match serde_yaml::from_str::<Yaml>(yaml) {
            Ok(Yaml::Mapping(map)) => map,
            Ok(_) | Err(_) => {
                warn!(repo_id, "Dataset card front matter is not a mapping, replacing it");
                Mapping::new()
            }
        },
        _ => Mapping::new(),
    };

    let data_files_entry = {
        let mut entry = Mapping::new();
        entry.insert(key("split"), key(split));
        entry.insert(key("path"), key(&format!("{config_name}/{split}-*")));
        Yaml::Mapping(entry)
    };

    let configs = meta
        .entry(key("configs"))
        .or_insert_with(|| Yaml::Sequence(Vec::new()));
    if !configs.is_sequence() {
        *configs = Yaml::Sequence(Vec::new());
    }
    let Yaml::Sequence(configs) = configs else {
        return Err(ConvertError::Upload("dataset card configs is not a list".into()));
    };

    let existing_config = configs.iter_mut().find_map(|c| match c {
        Yaml::Mapping(m) if m.get("config_name").and_then(Yaml::as_str) == Some(config_name) => {
            Some(m)
        }
        _ => None,
    });
    match existing_config {
        Some(config) => {
            let data_files = config
                .entry(key("data_files"))
                .or_insert_with(|| Yaml::Sequence(Vec::new()));
            if !data_files.is_sequence() {
                *data_files = Yaml::Sequence(Vec::new());
            }
            if let Yaml::Sequence(files) = data_files {
                files.retain(|f| f.get("split").and_then(Yaml::as_str) != Some(split));
                files.push(data_files_entry);
            }
        }
        None => {
            let mut config = Mapping::new();
            config.insert(key("config_name"), key(config_name));
            config.insert(key("data_files"), Yaml::Sequence(vec![data_files_entry]));
            configs.push(Yaml::Mapping(config));
        }
    }

    let yaml = serde_yaml::to_string(&Yaml::Mapping(meta))
        .map_err(|e| ConvertError::Upload(format!("could not render dataset card: {e}")))?;
    Ok(format!("---\n{yaml}---\n{body}"))
}
