//!
//! This module implements the CLI interface for oldp-toolkit: command parsing,
//! argument validation and the async entrypoint.
//!
//! All conversion logic (reader, enrichment, windowing, batching, sinks) lives in the
//! [`oldp-toolkit-core`] crate. This module is CLI glue only.
//!
//! ## How To Use
//! - For command-line users: use the installed `oldpt` binary with `--help`.
//! - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
//!
//! ## Extending
//! Each subcommand is one variant of [`Commands`] owning its arguments, with its
//! handler called from [`run`].
//!
//! [`oldp-toolkit-core`]: ../../oldp-toolkit-core/
use crate::upload::HfHubClient;
use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use oldp_toolkit_core::contract::HubUploader;
use oldp_toolkit_core::{convert_with_progress, ConvertConfig, OutputFormat, Progress, Window};
use std::path::PathBuf;

/// CLI for oldp-toolkit: tools for Open Legal Data dumps.
#[derive(Parser, Debug)]
#[command(
    name = "oldpt",
    version,
    about = "Convert Open Legal Data dumps into dataset formats"
)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert a JSONL dump into a hub dataset, JSONL, Parquet or an on-disk dataset
    #[command(name = "convert_dump_to_hf")]
    ConvertDumpToHf(ConvertArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    #[value(name = "hf_hub")]
    HfHub,
    #[value(name = "jsonl")]
    Jsonl,
    #[value(name = "parquet")]
    Parquet,
    #[value(name = "hf_disk")]
    HfDisk,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::HfHub => OutputFormat::HfHub,
            FormatArg::Jsonl => OutputFormat::Jsonl,
            FormatArg::Parquet => OutputFormat::Parquet,
            FormatArg::HfDisk => OutputFormat::HfDisk,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Input JSONL dump, optionally gzip-compressed
    pub input_file: PathBuf,

    /// Repository id for hf_hub, a path or file:// URI for the other formats
    pub output: String,

    /// Output format
    #[arg(long, value_enum, default_value = "hf_hub")]
    pub format: FormatArg,

    /// Skip the first N records
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Convert at most N records
    #[arg(long)]
    pub limit: Option<usize>,

    /// Records per batch
    #[arg(long, default_value_t = oldp_toolkit_core::batch::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Create the hub repository as private
    #[arg(long)]
    pub private: bool,

    /// Dataset config name (required for hf_hub and hf_disk)
    #[arg(long)]
    pub config_name: Option<String>,

    /// Split name
    #[arg(long, default_value = "train")]
    pub split: String,

    /// Do not render markup or extract references
    #[arg(long)]
    pub no_process: bool,
}

impl ConvertArgs {
    pub fn to_config(&self) -> ConvertConfig {
        let mut config = ConvertConfig::new(&self.input_file, &self.output, self.format.into());
        config.config_name = self.config_name.clone();
        config.split = self.split.clone();
        config.private = self.private;
        config.window = Window::new(self.skip, self.limit);
        config.batch_size = self.batch_size;
        config.process = !self.no_process;
        config
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!(debug = cli.debug, "trace_initialised");

    match cli.command {
        Commands::ConvertDumpToHf(args) => convert_dump_to_hf(args).await,
    }
}

async fn convert_dump_to_hf(args: ConvertArgs) -> Result<()> {
    let config = args.to_config();
    tracing::info!(command = "convert_dump_to_hf", format = %config.format, "Starting conversion");

    // The client is only built for hub uploads; a missing token surfaces as an
    // authentication error from the core once the options are validated.
    let client = match config.format {
        OutputFormat::HfHub => match HfHubClient::new_from_env() {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "Hub client unavailable");
                None
            }
        },
        _ => None,
    };
    let hub = client.as_ref().map(|c| c as &dyn HubUploader);

    let mut report = |p: &Progress| {
        tracing::info!(batches = p.batches, records = p.records, "Progress");
    };
    match convert_with_progress(&config, hub, &mut report).await {
        Ok(summary) => {
            tracing::info!(command = "convert_dump_to_hf", ?summary, "Conversion complete");
            println!(
                "Converted {} records ({} read, {} skipped, {} enrichment warnings) in {} batches",
                summary.records_written,
                summary.records_read,
                summary.records_skipped,
                summary.enrichment_warnings,
                summary.batches
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(command = "convert_dump_to_hf", error = %e, "Conversion failed");
            Err(e.into())
        }
    }
}
