//! Finds link occurrences in free-form notes.
//!
//! Two passes over the same text: inline markdown links first, then raw URL
//! tokens. Both the text and the target of a markdown link are reserved so the
//! raw pass never counts them a second time.

use crate::normalizer;
use regex::Regex;
use serde::Serialize;
use std::ops::Range;
use std::sync::LazyLock;

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(?P<text>[^\]]+)\]\((?P<target>[^)]+)\)").expect("MARKDOWN_LINK_RE should compile")
});

// Explicit http(s) schemes, `www.` hosts, or bare `domain.tld[/path]`.
static RAW_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://|www\.)[^\s)]+|[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}(?:/[^\s)]*)?")
        .expect("RAW_URL_RE should compile")
});

/// One syntactic appearance of a link inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkOccurrence {
    /// 1-based, assigned in document order.
    pub id: usize,
    pub original_form: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset of the last character (inclusive).
    pub end: usize,
    pub canonical_key: String,
    pub summary: String,
    #[serde(skip)]
    pub(crate) bytes: Range<usize>,
}

impl LinkOccurrence {
    /// Fill in the canonical key from the original form.
    pub fn canonicalize(&mut self) {
        self.canonical_key = normalizer::normalize(&self.original_form);
    }

    /// Byte range of the occurrence within its source text.
    pub fn byte_span(&self) -> Range<usize> {
        self.bytes.clone()
    }
}

/// Extract every link occurrence from `text`, ordered by start offset.
/// `canonical_key` and `summary` are left empty.
pub fn extract(text: &str) -> Vec<LinkOccurrence> {
    let mut found: Vec<(Range<usize>, String)> = Vec::new();
    let mut occupied: Vec<Range<usize>> = Vec::new();

    for caps in MARKDOWN_LINK_RE.captures_iter(text) {
        let (Some(label), Some(target)) = (caps.name("text"), caps.name("target")) else {
            continue;
        };
        occupied.push(target.range());
        occupied.push(label.range());
        found.push((target.range(), target.as_str().trim().to_string()));
    }

    for m in RAW_URL_RE.find_iter(text) {
        let span = m.range();
        if occupied.iter().any(|taken| overlaps(taken, &span)) {
            continue;
        }
        occupied.push(span.clone());
        found.push((span, m.as_str().trim().to_string()));
    }

    found.sort_by_key(|(span, _)| span.start);

    let offsets = CharOffsets::new(text);
    found
        .into_iter()
        .enumerate()
        .map(|(idx, (bytes, original_form))| LinkOccurrence {
            id: idx + 1,
            original_form,
            start: offsets.char_at(bytes.start),
            end: offsets.char_at(bytes.end).saturating_sub(1),
            canonical_key: String::new(),
            summary: String::new(),
            bytes,
        })
        .collect()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Byte offset to character offset lookup.
struct CharOffsets {
    boundaries: Vec<usize>,
}

impl CharOffsets {
    fn new(text: &str) -> Self {
        Self {
            boundaries: text.char_indices().map(|(idx, _)| idx).collect(),
        }
    }

    fn char_at(&self, byte: usize) -> usize {
        match self.boundaries.binary_search(&byte) {
            Ok(idx) | Err(idx) => idx,
        }
    }
}
