mod common;

use std::sync::{Arc, Mutex};

use oldp_toolkit_core::contract::{HubError, HubFile, MockHubUploader};
use oldp_toolkit_core::{convert, ConvertConfig, ConvertError, OutputFormat};
use tempfile::tempdir;

use common::{case_lines, write_dump};

fn hub_config(input: &std::path::Path, config_name: Option<&str>) -> ConvertConfig {
    let mut config = ConvertConfig::new(input, "openlegaldata/cases", OutputFormat::HfHub);
    config.config_name = config_name.map(str::to_string);
    config
}

#[tokio::test]
async fn missing_config_name_fails_before_any_hub_call() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    // No expectations: any call on the mock panics.
    let hub = MockHubUploader::new();

    let err = convert(&hub_config(&input, None), Some(&hub)).await.unwrap_err();
    assert!(matches!(err, ConvertError::Configuration(_)), "{err}");
}

#[tokio::test]
async fn malformed_repo_id_is_configuration_error() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    let hub = MockHubUploader::new();

    let mut config = hub_config(&input, Some("de"));
    config.output = "not/a/repo".into();
    let err = convert(&config, Some(&hub)).await.unwrap_err();
    assert!(matches!(err, ConvertError::Configuration(_)), "{err}");
}

#[tokio::test]
async fn no_client_is_authentication_error() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());

    let err = convert(&hub_config(&input, Some("de")), None).await.unwrap_err();
    assert!(matches!(err, ConvertError::Authentication(_)), "{err}");
}

#[tokio::test]
async fn rejected_token_stops_before_upload() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    let mut hub = MockHubUploader::new();
    hub.expect_whoami()
        .times(1)
        .returning(|| Err(HubError::Unauthorized("invalid token".into())));

    let err = convert(&hub_config(&input, Some("de")), Some(&hub)).await.unwrap_err();
    assert!(matches!(err, ConvertError::Authentication(_)), "{err}");
}

#[tokio::test]
async fn uploads_parquet_and_dataset_card() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    let committed: Arc<Mutex<Vec<HubFile>>> = Arc::default();

    let mut hub = MockHubUploader::new();
    hub.expect_whoami().times(1).returning(|| Ok("alice".into()));
    hub.expect_create_repo()
        .withf(|repo_id, private| repo_id == "openlegaldata/cases" && *private)
        .times(1)
        .returning(|_, _| Ok(()));
    hub.expect_fetch_file()
        .withf(|repo_id, path| repo_id == "openlegaldata/cases" && path == "README.md")
        .times(1)
        .returning(|_, _| Ok(None));
    let sink = Arc::clone(&committed);
    hub.expect_commit()
        .times(1)
        .returning(move |_, summary, files| {
            assert!(summary.contains("de/validation"));
            sink.lock().unwrap().extend(files);
            Ok(())
        });

    let mut config = hub_config(&input, Some("de"));
    config.split = "validation".into();
    config.private = true;
    let summary = convert(&config, Some(&hub)).await.unwrap();
    assert_eq!(summary.records_written, 3);

    let files = committed.lock().unwrap();
    assert_eq!(files.len(), 2);
    let data = files
        .iter()
        .find(|f| f.path == "de/validation-00000-of-00001.parquet")
        .expect("parquet data file");
    assert!(data.content.starts_with(b"PAR1"));
    let card = files
        .iter()
        .find(|f| f.path == "README.md")
        .expect("dataset card");
    let card = String::from_utf8(card.content.clone()).unwrap();
    assert!(card.starts_with("---\n"));
    assert!(card.contains("config_name: de"));
    assert!(card.contains("path: de/validation-*"));
    assert!(card.contains("# openlegaldata/cases"));
}

#[tokio::test]
async fn existing_card_is_merged() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    let card: Arc<Mutex<String>> = Arc::default();

    let mut hub = MockHubUploader::new();
    hub.expect_whoami().returning(|| Ok("alice".into()));
    hub.expect_create_repo().returning(|_, _| Ok(()));
    hub.expect_fetch_file().returning(|_, _| {
        Ok(Some(
            "---\nlicense: cc-by-4.0\nconfigs:\n- config_name: en\n  data_files:\n  - split: train\n    path: en/train-*\n---\nOpen Legal Data cases.\n".into(),
        ))
    });
    let sink = Arc::clone(&card);
    hub.expect_commit().returning(move |_, _, files| {
        for file in files.into_iter().filter(|f| f.path == "README.md") {
            *sink.lock().unwrap() = String::from_utf8(file.content).unwrap();
        }
        Ok(())
    });

    convert(&hub_config(&input, Some("de")), Some(&hub)).await.unwrap();

    let card = card.lock().unwrap();
    assert!(card.contains("license: cc-by-4.0"));
    assert!(card.contains("config_name: en"));
    assert!(card.contains("config_name: de"));
    assert!(card.ends_with("Open Legal Data cases.\n"));
}

#[tokio::test]
async fn failed_commit_is_upload_error() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());

    let mut hub = MockHubUploader::new();
    hub.expect_whoami().returning(|| Ok("alice".into()));
    hub.expect_create_repo().returning(|_, _| Ok(()));
    hub.expect_fetch_file().returning(|_, _| Ok(None));
    hub.expect_commit()
        .returning(|_, _, _| Err(HubError::Request("500 Internal Server Error".into())));

    let err = convert(&hub_config(&input, Some("de")), Some(&hub)).await.unwrap_err();
    assert!(matches!(err, ConvertError::Upload(_)), "{err}");
}

#[tokio::test]
async fn empty_window_skips_upload() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());

    let mut hub = MockHubUploader::new();
    hub.expect_whoami().times(1).returning(|| Ok("alice".into()));

    let mut config = hub_config(&input, Some("de"));
    config.window.limit = Some(0);
    let summary = convert(&config, Some(&hub)).await.unwrap();
    assert_eq!(summary.records_written, 0);
}
