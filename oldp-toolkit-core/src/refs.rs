//! Regex based extractor for German statute and case references.
//!
//! Recognises statute citations such as `§ 823 Abs. 1 BGB`, `§§ 280, 281 BGB` and
//! `Art. 3 GG`, and case file numbers such as `VI ZR 123/12` or `1 BvR 2017/21`.
//! A case reference is attributed to the closest court abbreviation preceding it on
//! the same line.

use std::sync::OnceLock;

use regex::Regex;

use crate::contract::{Reference, ReferenceExtractor, ReferenceMarker};

/// How far back (in bytes) to look for a court name before a file number.
const COURT_LOOKBEHIND: usize = 120;

fn law_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?x)
            (?:§§?|Art\.|Artikel)\s*
            (?P<sections>
                \d+[a-z]?(?:\s*(?:Abs\.|Absatz|S\.|Satz|Nr\.)\s*\d+[a-z]?)*
                (?:\s*(?:,|und|bis|-|–)\s*\d+[a-z]?(?:\s*(?:Abs\.|Absatz|S\.|Satz|Nr\.)\s*\d+[a-z]?)*)*
            )
            \s+
            (?P<book>[A-ZÄÖÜ][A-Za-zÄÖÜäöüß]*[A-ZÄÖÜ])\b
            ",
        )
        .expect("static law pattern")
    })
}

fn section_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*(?:,|und|bis|-|–)\s*").expect("static separator pattern"))
}

fn section_number() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[a-z]?").expect("static section pattern"))
}

fn file_number_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:[IVX]{1,5}|\d{1,2})\s+[A-Z][A-Za-z]{0,5}\s+\d{1,5}/\d{2}(?:\d{2})?\b")
            .expect("static file number pattern")
    })
}

fn court_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:BVerfG|BVerwG|BGH|BAG|BSG|BFH|BPatG|EuGH|EGMR|(?:OLG|OVG|VGH|LAG|LSG|ArbG|LG|AG|VG|SG|FG)(?:\s+[A-ZÄÖÜ][a-zäöüß]+(?:-[A-ZÄÖÜ][a-zäöüß]+)?)?)\b",
        )
        .expect("static court pattern")
    })
}

/// Default [`ReferenceExtractor`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexReferenceExtractor;

impl RegexReferenceExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl ReferenceExtractor for RegexReferenceExtractor {
    fn extract(&self, text: &str) -> Vec<ReferenceMarker> {
        let mut markers = Vec::new();

        for caps in law_pattern().captures_iter(text) {
            let whole = caps.get(0).expect("group 0 always matches");
            let book = caps["book"].to_lowercase();
            let references: Vec<Reference> = section_separator()
                .split(&caps["sections"])
                .filter_map(|piece| section_number().find(piece.trim()))
                .map(|m| Reference::Law {
                    book: book.clone(),
                    section: m.as_str().to_string(),
                })
                .collect();
            if references.is_empty() {
                continue;
            }
            markers.push(marker(text, whole.start(), whole.end(), references));
        }

        for m in file_number_pattern().find_iter(text) {
            let court = preceding_court(text, m.start());
            let reference = Reference::Case {
                court,
                file_number: m.as_str().split_whitespace().collect::<Vec<_>>().join(" "),
            };
            markers.push(marker(text, m.start(), m.end(), vec![reference]));
        }

        markers.sort_by_key(|m| m.start);
        markers
    }
}

fn marker(text: &str, start: usize, end: usize, references: Vec<Reference>) -> ReferenceMarker {
    let prefix = &text[..start];
    ReferenceMarker {
        start: prefix.chars().count(),
        end: prefix.chars().count() + text[start..end].chars().count(),
        line: prefix.matches('\n').count() + 1,
        text: text[start..end].to_string(),
        references,
    }
}

fn preceding_court(text: &str, start: usize) -> Option<String> {
    let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut from = start.saturating_sub(COURT_LOOKBEHIND).max(line_start);
    while !text.is_char_boundary(from) {
        from += 1;
    }
    court_pattern()
        .find_iter(&text[from..start])
        .last()
        .map(|m| m.as_str().to_string())
}
