//! Top-level pipeline: reader → windower → enricher → batcher → sink.
//!
//! A run is single-pass and pull-based. Everything that can be checked without
//! reading input is checked first, in this order:
//!   1. batch size
//!   2. sink options (config name, split name, repository id, destination scheme)
//!   3. input file exists and is readable
//!   4. sink preconditions (destination writability, hub credential)
//!
//! Only then are records pulled. Windowing happens before enrichment so skipped
//! records are never rendered. Enrichment failures are counted and logged, never
//! fatal; every other error ends the run.
//!
//! # Navigation
//! - Entrypoints: [`convert`], [`convert_with_progress`], [`convert_with_enricher`]
//! - Result: [`Summary`]

use std::cell::Cell;

use serde::Serialize;
use tracing::{debug, info};

use crate::batch::{validate_batch_size, Batcher};
use crate::config::ConvertConfig;
use crate::contract::HubUploader;
use crate::enrich::{Enricher, HtmlTextRenderer};
use crate::error::ConvertError;
use crate::reader::RecordReader;
use crate::refs::RegexReferenceExtractor;
use crate::sink::{OpenSink, SinkConfig};

/// Counters of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Records parsed from the input, skipped ones included.
    pub records_read: usize,
    pub records_skipped: usize,
    /// Records enriched without a warning. Zero when processing is off.
    pub records_enriched: usize,
    pub enrichment_warnings: usize,
    pub batches: usize,
    pub records_written: usize,
}

/// Reported after every batch handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub batches: usize,
    pub records: usize,
}

pub type ProgressFn<'p> = dyn FnMut(&Progress) + Send + 'p;

pub async fn convert(
    config: &ConvertConfig,
    hub: Option<&dyn HubUploader>,
) -> Result<Summary, ConvertError> {
    convert_with_progress(config, hub, &mut |_| {}).await
}

pub async fn convert_with_progress(
    config: &ConvertConfig,
    hub: Option<&dyn HubUploader>,
    progress: &mut ProgressFn<'_>,
) -> Result<Summary, ConvertError> {
    let enricher = Enricher::new(
        config.enrich.clone(),
        Box::new(HtmlTextRenderer),
        Box::new(RegexReferenceExtractor),
    );
    convert_with_enricher(config, hub, &enricher, progress).await
}

/// Run with a caller-supplied enricher. Used when `config.process` is set.
pub async fn convert_with_enricher(
    config: &ConvertConfig,
    hub: Option<&dyn HubUploader>,
    enricher: &Enricher,
    progress: &mut ProgressFn<'_>,
) -> Result<Summary, ConvertError> {
    config.trace_loaded();

    validate_batch_size(config.batch_size)?;
    let sink_config = SinkConfig::resolve(
        config.format,
        &config.output,
        config.config_name.as_deref(),
        &config.split,
        config.private,
    )?;
    let mut reader = RecordReader::open(&config.input)?;
    let mut sink = OpenSink::open(&sink_config, hub, config.batch_size).await?;

    let mut summary = Summary::default();
    {
        let enriched = Cell::new(0usize);
        let warnings = Cell::new(0usize);
        let process = config.process;
        let position = Cell::new(config.window.skip);

        let records = config.window.apply(reader.by_ref()).map(|item| {
            item.map(|record| {
                let index = position.get();
                position.set(index + 1);
                if !process {
                    return record;
                }
                let out = enricher.enrich_at(index, record);
                if out.warning.is_some() {
                    warnings.set(warnings.get() + 1);
                } else {
                    enriched.set(enriched.get() + 1);
                }
                out.record
            })
        });

        for batch in Batcher::new(records, config.batch_size)? {
            let batch = batch?;
            let size = batch.len();
            sink.write_batch(batch)?;
            summary.batches += 1;
            summary.records_written += size;
            debug!(batch = summary.batches, records = size, "Batch written");
            progress(&Progress {
                batches: summary.batches,
                records: summary.records_written,
            });
        }

        summary.records_enriched = enriched.get();
        summary.enrichment_warnings = warnings.get();
    }
    summary.records_read = reader.records_read();
    summary.records_skipped = config.window.skip.min(summary.records_read);
    drop(reader);

    summary.records_written = sink.finish().await?;

    info!(
        format = %config.format,
        records_read = summary.records_read,
        records_skipped = summary.records_skipped,
        records_written = summary.records_written,
        enrichment_warnings = summary.enrichment_warnings,
        batches = summary.batches,
        "Conversion completed"
    );
    Ok(summary)
}
