mod common;

use std::fs::File;

use arrow::array::UInt64Array;
use arrow::ipc::reader::StreamReader;
use oldp_toolkit_core::{convert, ConvertConfig, ConvertError, OutputFormat, Window};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::reader::{FileReader, SerializedFileReader};
use serde_json::Value;
use tempfile::tempdir;

use common::{case_lines, write_dump};

#[tokio::test]
async fn parquet_holds_union_schema() {
    let dir = tempdir().unwrap();
    let input = write_dump(
        dir.path(),
        "dump.jsonl",
        &[
            r#"{"id": 1, "title": "Urteil", "content": "<p>§ 1 BGB</p>"}"#,
            r#"{"id": 2, "court": {"name": "BGH", "level": 1}}"#,
            r#"{"id": 3, "tags": ["a", "b"]}"#,
        ],
    );
    let output = dir.path().join("out.parquet");

    let config = ConvertConfig::new(&input, output.to_string_lossy(), OutputFormat::Parquet);
    let summary = convert(&config, None).await.unwrap();
    assert_eq!(summary.records_written, 3);

    let reader = SerializedFileReader::new(File::open(&output).unwrap()).unwrap();
    let metadata = reader.metadata().file_metadata();
    assert_eq!(metadata.num_rows(), 3);
    let columns: Vec<String> = metadata
        .schema_descr()
        .root_schema()
        .get_fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    for expected in ["id", "title", "content", "court", "tags", "markdown_content", "reference_markers"] {
        assert!(columns.iter().any(|c| c == expected), "missing column {expected}: {columns:?}");
    }
}

#[tokio::test]
async fn parquet_rejects_irreconcilable_types() {
    let dir = tempdir().unwrap();
    let input = write_dump(
        dir.path(),
        "dump.jsonl",
        &[r#"{"court": "BGH"}"#, r#"{"court": {"name": "BGH"}}"#],
    );
    let output = dir.path().join("out.parquet");

    let mut config = ConvertConfig::new(&input, output.to_string_lossy(), OutputFormat::Parquet);
    config.process = false;
    let err = convert(&config, None).await.unwrap_err();
    assert!(matches!(err, ConvertError::SchemaInference(_)), "{err}");
    assert!(!output.exists());
}

#[tokio::test]
async fn empty_objects_are_dropped_from_columnar_outputs() {
    let dir = tempdir().unwrap();
    let input = write_dump(
        dir.path(),
        "dump.jsonl",
        &[r#"{"id": 1, "meta": {}}"#, r#"{"id": 2, "meta": {}}"#],
    );

    let output = dir.path().join("out.parquet");
    let mut config = ConvertConfig::new(&input, output.to_string_lossy(), OutputFormat::Parquet);
    config.process = false;
    let summary = convert(&config, None).await.unwrap();
    assert_eq!(summary.records_written, 2);
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&output).unwrap()).unwrap();
    assert!(reader.schema().field_with_name("meta").is_err());
    assert!(reader.schema().field_with_name("id").is_ok());

    let root = dir.path().join("dataset");
    let mut config = ConvertConfig::new(&input, root.to_string_lossy(), OutputFormat::HfDisk);
    config.process = false;
    config.config_name = Some("de".into());
    let summary = convert(&config, None).await.unwrap();
    assert_eq!(summary.records_written, 2);
    let info = read_json(&root.join("de").join("train").join("dataset_info.json"));
    assert!(info["features"].get("meta").is_none());
    assert_eq!(info["features"]["id"]["dtype"], "int64");
}

#[tokio::test]
async fn parquet_keeps_large_unsigned_ids_exact() {
    let dir = tempdir().unwrap();
    let input = write_dump(
        dir.path(),
        "dump.jsonl",
        &[r#"{"id": 18446744073709551615}"#, r#"{"id": 7}"#],
    );
    let output = dir.path().join("out.parquet");

    let mut config = ConvertConfig::new(&input, output.to_string_lossy(), OutputFormat::Parquet);
    config.process = false;
    convert(&config, None).await.unwrap();

    let batches: Vec<_> = ParquetRecordBatchReaderBuilder::try_new(File::open(&output).unwrap())
        .unwrap()
        .build()
        .unwrap()
        .map(|b| b.unwrap())
        .collect();
    let ids = batches[0]
        .column_by_name("id")
        .unwrap()
        .as_any()
        .downcast_ref::<UInt64Array>()
        .expect("id stored as uint64");
    assert_eq!(ids.value(0), u64::MAX);
    assert_eq!(ids.value(1), 7);
}

#[tokio::test]
async fn parquet_skips_write_for_empty_window() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    let output = dir.path().join("out.parquet");

    let mut config = ConvertConfig::new(&input, output.to_string_lossy(), OutputFormat::Parquet);
    config.window = Window::new(5, None);
    let summary = convert(&config, None).await.unwrap();
    assert_eq!(summary.records_written, 0);
    assert!(!output.exists());
}

fn read_json(path: &std::path::Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn disk_layout_and_split_merge() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());
    let root = dir.path().join("dataset");

    let mut config = ConvertConfig::new(&input, root.to_string_lossy(), OutputFormat::HfDisk);
    config.config_name = Some("de".into());
    config.batch_size = 2;
    let summary = convert(&config, None).await.unwrap();
    assert_eq!(summary.records_written, 3);

    let split_dir = root.join("de").join("train");
    let stream = StreamReader::try_new(File::open(split_dir.join("data-00000-of-00001.arrow")).unwrap(), None)
        .unwrap();
    let rows: usize = stream.map(|b| b.unwrap().num_rows()).sum();
    assert_eq!(rows, 3);

    let info = read_json(&split_dir.join("dataset_info.json"));
    assert_eq!(info["features"]["court"]["dtype"], "string");
    assert_eq!(info["features"]["id"]["dtype"], "int64");
    assert!(info["features"]["reference_markers"].is_array());

    let state = read_json(&split_dir.join("state.json"));
    assert_eq!(state["_split"], "train");
    assert_eq!(state["_data_files"][0]["filename"], "data-00000-of-00001.arrow");
    assert_eq!(state["_fingerprint"].as_str().unwrap().len(), 16);

    config.split = "test".into();
    convert(&config, None).await.unwrap();
    let dict = read_json(&root.join("de").join("dataset_dict.json"));
    assert_eq!(dict["splits"], serde_json::json!(["train", "test"]));
}

#[tokio::test]
async fn disk_requires_config_name_and_directory() {
    let dir = tempdir().unwrap();
    let input = write_dump(dir.path(), "dump.jsonl", &case_lines());

    let missing_name = ConvertConfig::new(&input, dir.path().join("ds").to_string_lossy(), OutputFormat::HfDisk);
    assert!(matches!(
        convert(&missing_name, None).await,
        Err(ConvertError::Configuration(_))
    ));

    let file = dir.path().join("occupied");
    std::fs::write(&file, "x").unwrap();
    let mut onto_file = ConvertConfig::new(&input, file.to_string_lossy(), OutputFormat::HfDisk);
    onto_file.config_name = Some("de".into());
    assert!(matches!(
        convert(&onto_file, None).await,
        Err(ConvertError::Configuration(_))
    ));

    let mut bad_split = ConvertConfig::new(&input, dir.path().join("ds").to_string_lossy(), OutputFormat::HfDisk);
    bad_split.config_name = Some("de".into());
    bad_split.split = "train/../x".into();
    assert!(matches!(
        convert(&bad_split, None).await,
        Err(ConvertError::Configuration(_))
    ));
}
