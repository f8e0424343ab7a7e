#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;

/// Write `lines` as a dump file under `dir`. A `.gz` name is gzip-compressed.
pub fn write_dump(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.join(name);
    let body = lines.iter().map(|l| format!("{l}\n")).collect::<String>();
    if name.ends_with(".gz") {
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();
    } else {
        std::fs::write(&path, body).unwrap();
    }
    path
}

/// Three small court decisions with HTML content.
pub fn case_lines() -> Vec<&'static str> {
    vec![
        r#"{"id": 1, "court": "BGH", "content": "<p>Der Anspruch folgt aus § 823 Abs. 1 BGB.</p>"}"#,
        r#"{"id": 2, "court": "BVerfG", "content": "<p>Vgl. BVerfG, 1 BvR 2017/21.</p><ul><li>Art. 3 GG</li></ul>"}"#,
        r#"{"id": 3, "court": "OLG Köln", "content": "<p>Keine Verweise.</p>"}"#,
    ]
}

pub fn read_jsonl(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
