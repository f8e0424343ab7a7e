#![doc = "Dataset hub client for the CLI: implements the core `HubUploader` trait over the hub's HTTP API."]
//
//! # Hub client (CLI <-> Core)
//!
//! The core pipeline only knows the [`HubUploader`] trait. This module provides
//! [`HfHubClient`], the networked implementation used by the `oldpt` binary.
//!
//! ## Client Usage
//!
//! - Construct with [`HfHubClient::new_from_env`]: the token comes from `HF_TOKEN` or
//!   `HUGGING_FACE_HUB_TOKEN`, falling back to the token file written by the hub's own
//!   login tooling (`$HF_HOME/token`, default `~/.cache/huggingface/token`).
//!   `HF_ENDPOINT` overrides the base URL.
//! - A commit classifies files with the preupload endpoint, pushes large or binary
//!   files through the Git LFS batch API and then creates one commit referencing
//!   them; small text files are inlined into the commit.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use oldp_toolkit_core::contract::{HubError, HubFile, HubUploader};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const DEFAULT_ENDPOINT: &str = "https://huggingface.co";

/// Bytes of each file sent to the preupload endpoint for classification.
const SAMPLE_SIZE: usize = 512;

pub struct HfHubClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

/// Location of the token file: `$HF_HOME/token`, else `$HOME/.cache/huggingface/token`.
pub fn token_file_path(hf_home: Option<&str>, home: Option<&str>) -> Option<PathBuf> {
    match (hf_home, home) {
        (Some(hf_home), _) if !hf_home.is_empty() => Some(PathBuf::from(hf_home).join("token")),
        (_, Some(home)) if !home.is_empty() => Some(
            PathBuf::from(home)
                .join(".cache")
                .join("huggingface")
                .join("token"),
        ),
        _ => None,
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Token from the environment or the token file, if any.
pub fn resolve_token() -> Option<String> {
    if let Some(token) = non_empty_var("HF_TOKEN").or_else(|| non_empty_var("HUGGING_FACE_HUB_TOKEN")) {
        tracing::debug!("Using hub token from environment");
        return Some(token);
    }
    let path = token_file_path(
        env::var("HF_HOME").ok().as_deref(),
        env::var("HOME").ok().as_deref(),
    )?;
    match std::fs::read_to_string(&path) {
        Ok(token) if !token.trim().is_empty() => {
            tracing::debug!(path = %path.display(), "Using hub token from token file");
            Some(token.trim().to_string())
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "No hub token file");
            None
        }
    }
}

fn split_repo_id(repo_id: &str) -> (Option<&str>, &str) {
    match repo_id.split_once('/') {
        Some((namespace, name)) => (Some(namespace), name),
        None => (None, repo_id),
    }
}

fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

fn request_error(e: reqwest::Error) -> HubError {
    HubError::Request(e.to_string())
}

/// Map non-success responses to [`HubError`], keeping the body for context.
async fn check(response: Response, what: &str) -> Result<Response, HubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    tracing::error!(%status, what, body = %body, "Hub request failed");
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(HubError::Unauthorized(format!("{what}: {status}")))
    } else {
        Err(HubError::Request(format!("{what}: {status} {body}")))
    }
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PreuploadResponse {
    files: Vec<PreuploadFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PreuploadFile {
    path: String,
    upload_mode: String,
}

#[derive(Debug, Deserialize)]
struct LfsBatchResponse {
    objects: Vec<LfsObject>,
}

#[derive(Debug, Deserialize)]
struct LfsObject {
    oid: String,
    size: usize,
    #[serde(default)]
    actions: Option<LfsActions>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct LfsActions {
    upload: Option<LfsAction>,
    verify: Option<LfsAction>,
}

#[derive(Debug, Deserialize)]
struct LfsAction {
    href: String,
    #[serde(default)]
    header: HashMap<String, String>,
}

impl HfHubClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        HfHubClient {
            http: reqwest::Client::new(),
            endpoint,
            token: token.into(),
        }
    }

    pub fn new_from_env() -> Result<Self, HubError> {
        dotenvy::dotenv().ok(); // loads environment variables from .env if present
        let endpoint = non_empty_var("HF_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        match resolve_token() {
            Some(token) => {
                tracing::info!(endpoint = %endpoint, "Initialized hub client from environment");
                Ok(HfHubClient::new(endpoint, token))
            }
            None => {
                tracing::error!("No hub token in HF_TOKEN, HUGGING_FACE_HUB_TOKEN or token file");
                Err(HubError::Unauthorized(
                    "no token found (set HF_TOKEN or log in to the hub)".into(),
                ))
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ask the hub which files must go through LFS. Returns the LFS paths.
    async fn preupload(&self, repo_id: &str, files: &[HubFile]) -> Result<Vec<String>, HubError> {
        let payload: Vec<Value> = files
            .iter()
            .map(|f| {
                let sample = &f.content[..f.content.len().min(SAMPLE_SIZE)];
                json!({
                    "path": f.path,
                    "size": f.content.len(),
                    "sample": BASE64.encode(sample),
                })
            })
            .collect();
        let url = format!("{}/api/datasets/{repo_id}/preupload/main", self.endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&json!({ "files": payload }))
            .send()
            .await
            .map_err(request_error)?;
        let response: PreuploadResponse = check(response, "preupload")
            .await?
            .json()
            .await
            .map_err(request_error)?;
        Ok(response
            .files
            .into_iter()
            .filter(|f| f.upload_mode == "lfs")
            .map(|f| f.path)
            .collect())
    }

    /// Upload one file's bytes through the LFS batch API. Skipped if already stored.
    async fn upload_lfs(&self, repo_id: &str, file: &HubFile, oid: &str) -> Result<(), HubError> {
        let url = format!("{}/datasets/{repo_id}.git/info/lfs/objects/batch", self.endpoint);
        let body = json!({
            "operation": "upload",
            "transfers": ["basic"],
            "hash_algo": "sha256",
            "objects": [{ "oid": oid, "size": file.content.len() }],
        });
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.git-lfs+json")
            .header("Content-Type", "application/vnd.git-lfs+json")
            .body(body.to_string())
            .send()
            .await
            .map_err(request_error)?;
        let batch: LfsBatchResponse = check(response, "lfs batch")
            .await?
            .json()
            .await
            .map_err(request_error)?;

        for object in batch.objects {
            if let Some(error) = object.error {
                return Err(HubError::Request(format!("lfs object {}: {error}", object.oid)));
            }
            let Some(actions) = object.actions else {
                tracing::debug!(path = %file.path, oid = %object.oid, "LFS object already present");
                continue;
            };
            if let Some(upload) = actions.upload {
                let mut request = self.http.put(&upload.href).body(file.content.clone());
                for (name, value) in &upload.header {
                    request = request.header(name, value);
                }
                let response = request.send().await.map_err(request_error)?;
                check(response, "lfs upload").await?;
                tracing::info!(path = %file.path, size = object.size, "Uploaded LFS object");
            }
            if let Some(verify) = actions.verify {
                let mut request = self
                    .http
                    .post(&verify.href)
                    .bearer_auth(&self.token)
                    .json(&json!({ "oid": object.oid, "size": object.size }));
                for (name, value) in &verify.header {
                    request = request.header(name, value);
                }
                let response = request.send().await.map_err(request_error)?;
                check(response, "lfs verify").await?;
            }
        }
        Ok(())
    }
}

/// Newline-delimited commit payload: a header line, then one line per file.
pub fn commit_payload(summary: &str, regular: &[&HubFile], lfs: &[(&HubFile, String)]) -> String {
    let mut lines = vec![json!({
        "key": "header",
        "value": { "summary": summary, "description": "" },
    })];
    for file in regular {
        lines.push(json!({
            "key": "file",
            "value": {
                "content": BASE64.encode(&file.content),
                "path": file.path,
                "encoding": "base64",
            },
        }));
    }
    for (file, oid) in lfs {
        lines.push(json!({
            "key": "lfsFile",
            "value": {
                "path": file.path,
                "algo": "sha256",
                "oid": oid,
                "size": file.content.len(),
            },
        }));
    }
    lines
        .iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl HubUploader for HfHubClient {
    async fn whoami(&self) -> Result<String, HubError> {
        let url = format!("{}/api/whoami-v2", self.endpoint);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(request_error)?;
        let who: WhoAmI = check(response, "whoami")
            .await?
            .json()
            .await
            .map_err(request_error)?;
        tracing::info!(user = %who.name, "Hub token accepted");
        Ok(who.name)
    }

    async fn create_repo(&self, repo_id: &str, private: bool) -> Result<(), HubError> {
        let (organization, name) = split_repo_id(repo_id);
        let mut body = json!({ "name": name, "type": "dataset", "private": private });
        if let Some(organization) = organization {
            body["organization"] = json!(organization);
        }
        let url = format!("{}/api/repos/create", self.endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        if response.status() == StatusCode::CONFLICT {
            tracing::info!(repo_id, "Dataset repository already exists");
            return Ok(());
        }
        check(response, "create repository").await?;
        tracing::info!(repo_id, private, "Created dataset repository");
        Ok(())
    }

    async fn fetch_file(&self, repo_id: &str, path: &str) -> Result<Option<String>, HubError> {
        let url = format!("{}/datasets/{repo_id}/resolve/main/{path}", self.endpoint);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(request_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(repo_id, path, "File not present in repository");
            return Ok(None);
        }
        let text = check(response, "download file")
            .await?
            .text()
            .await
            .map_err(request_error)?;
        Ok(Some(text))
    }

    async fn commit(
        &self,
        repo_id: &str,
        summary: &str,
        files: Vec<HubFile>,
    ) -> Result<(), HubError> {
        let lfs_paths = self.preupload(repo_id, &files).await?;

        let mut regular = Vec::new();
        let mut lfs = Vec::new();
        for file in &files {
            if lfs_paths.contains(&file.path) {
                let oid = sha256_hex(&file.content);
                self.upload_lfs(repo_id, file, &oid).await?;
                lfs.push((file, oid));
            } else {
                regular.push(file);
            }
        }

        let url = format!("{}/api/datasets/{repo_id}/commit/main", self.endpoint);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/x-ndjson")
            .body(commit_payload(summary, &regular, &lfs))
            .send()
            .await
            .map_err(request_error)?;
        check(response, "commit").await?;
        tracing::info!(
            repo_id,
            regular = regular.len(),
            lfs = lfs.len(),
            "Committed files to dataset repository"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_ids_split_into_namespace_and_name() {
        assert_eq!(split_repo_id("openlegaldata/cases"), (Some("openlegaldata"), "cases"));
        assert_eq!(split_repo_id("cases"), (None, "cases"));
    }

    #[test]
    fn sha256_matches_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn commit_payload_lines() {
        let card = HubFile {
            path: "README.md".into(),
            content: b"# cases\n".to_vec(),
        };
        let data = HubFile {
            path: "de/train-00000-of-00001.parquet".into(),
            content: vec![1, 2, 3],
        };
        let payload = commit_payload("Upload de/train", &[&card], &[(&data, "abc".into())]);
        let lines: Vec<Value> = payload
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["key"], "header");
        assert_eq!(lines[0]["value"]["summary"], "Upload de/train");
        assert_eq!(lines[1]["key"], "file");
        assert_eq!(lines[1]["value"]["content"], BASE64.encode(b"# cases\n"));
        assert_eq!(lines[2]["key"], "lfsFile");
        assert_eq!(lines[2]["value"]["oid"], "abc");
        assert_eq!(lines[2]["value"]["size"], 3);
    }

    #[test]
    fn token_file_location() {
        assert_eq!(
            token_file_path(Some("/opt/hf"), Some("/home/u")),
            Some(PathBuf::from("/opt/hf/token"))
        );
        assert_eq!(
            token_file_path(None, Some("/home/u")),
            Some(PathBuf::from("/home/u/.cache/huggingface/token"))
        );
        assert_eq!(token_file_path(Some(""), None), None);
    }
}
