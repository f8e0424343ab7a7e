use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::batch::DEFAULT_BATCH_SIZE;
use crate::enrich::EnrichConfig;
use crate::sink::{OutputFormat, DEFAULT_SPLIT};
use crate::window::Window;

/// Options of one conversion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Line-delimited JSON dump, optionally gzip-compressed.
    pub input: PathBuf,
    /// Repository id for `hf_hub`, a local path or `file://` URI otherwise.
    pub output: String,
    pub format: OutputFormat,
    pub config_name: Option<String>,
    pub split: String,
    pub private: bool,
    #[serde(skip)]
    pub window: Window,
    pub batch_size: usize,
    /// Render markup and extract references.
    pub process: bool,
    #[serde(skip)]
    pub enrich: EnrichConfig,
}

impl ConvertConfig {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<String>, format: OutputFormat) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            format,
            config_name: None,
            split: DEFAULT_SPLIT.to_string(),
            private: false,
            window: Window::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            process: true,
            enrich: EnrichConfig::default(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            input = %self.input.display(),
            output = %self.output,
            format = %self.format,
            skip = self.window.skip,
            limit = ?self.window.limit,
            batch_size = self.batch_size,
            process = self.process,
            "Loaded conversion config"
        );
        debug!(?self, "Conversion config loaded (full debug)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConvertConfig::new("dump.jsonl.gz", "org/cases", OutputFormat::HfHub);
        assert_eq!(config.split, "train");
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.window, Window::new(0, None));
        assert!(config.process);
        assert!(!config.private);
        assert!(config.config_name.is_none());
    }
}
