//! Per-record enrichment: markup to plain text plus legal reference markers.

use serde_json::Value;
use tracing::{debug, warn};

use crate::contract::{MarkupRenderer, Record, ReferenceExtractor, RenderError};
use crate::error::EnrichmentWarning;
use crate::refs::RegexReferenceExtractor;

/// Line width handed to the renderer; wide enough that paragraphs are not re-wrapped.
const RENDER_WIDTH: usize = 10_000;

/// Renders HTML with `html2text`, keeping paragraphs and list items on their own lines.
///
/// Parsing is lenient: unclosed or mis-nested tags are rendered as best as possible
/// and do not produce an error, so malformed markup never triggers the raw fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlTextRenderer;

impl MarkupRenderer for HtmlTextRenderer {
    fn render(&self, markup: &str) -> Result<String, RenderError> {
        let text = html2text::from_read(markup.as_bytes(), RENDER_WIDTH)?;
        Ok(text)
    }
}

/// Field names used by the enricher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichConfig {
    /// Field holding the markup to render.
    pub markup_field: String,
    /// Field receiving the rendered text. Equal to `markup_field` to replace in place.
    pub text_field: String,
    /// Field receiving the reference markers.
    pub references_field: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            markup_field: "content".into(),
            text_field: "markdown_content".into(),
            references_field: "reference_markers".into(),
        }
    }
}

/// Result of enriching one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub record: Record,
    pub warning: Option<EnrichmentWarning>,
}

pub struct Enricher {
    config: EnrichConfig,
    renderer: Box<dyn MarkupRenderer>,
    extractor: Box<dyn ReferenceExtractor>,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new(
            EnrichConfig::default(),
            Box::new(HtmlTextRenderer),
            Box::new(RegexReferenceExtractor),
        )
    }
}

impl Enricher {
    pub fn new(
        config: EnrichConfig,
        renderer: Box<dyn MarkupRenderer>,
        extractor: Box<dyn ReferenceExtractor>,
    ) -> Self {
        Self {
            config,
            renderer,
            extractor,
        }
    }

    pub fn config(&self) -> &EnrichConfig {
        &self.config
    }

    /// Enrich one record. Rendering failures fall back to the raw markup and are
    /// reported through [`Enriched::warning`]; they never fail the record.
    pub fn enrich(&self, record: Record) -> Enriched {
        self.enrich_record(None, record)
    }

    /// Like [`Enricher::enrich`], tagging any warning with the record's input position.
    pub fn enrich_at(&self, index: usize, record: Record) -> Enriched {
        self.enrich_record(Some(index), record)
    }

    fn enrich_record(&self, index: Option<usize>, mut record: Record) -> Enriched {
        let mut warning = None;
        let fallback = |reason: String, record: &Record| {
            let w = EnrichmentWarning {
                field: self.config.markup_field.clone(),
                reason,
                record: index,
            };
            warn!(
                record = ?index,
                id = ?record.get("id"),
                warning = %w,
                "Falling back to raw markup"
            );
            w
        };

        let text = match record.get(&self.config.markup_field) {
            None | Some(Value::Null) => {
                debug!(field = %self.config.markup_field, "Markup field missing");
                String::new()
            }
            Some(Value::String(markup)) if markup.is_empty() => String::new(),
            Some(Value::String(markup)) => match self.renderer.render(markup) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    warning = Some(fallback(e.to_string(), &record));
                    markup.clone()
                }
            },
            Some(other) => {
                warning = Some(fallback("markup field is not a string".into(), &record));
                other.to_string()
            }
        };

        let markers = if text.is_empty() {
            Vec::new()
        } else {
            self.extractor.extract(&text)
        };
        let markers = serde_json::to_value(markers).unwrap_or_else(|e| {
            warn!(error = %e, "Could not serialize reference markers");
            Value::Array(Vec::new())
        });

        record.insert(self.config.text_field.clone(), Value::String(text));
        record.insert(self.config.references_field.clone(), markers);

        Enriched { record, warning }
    }
}
