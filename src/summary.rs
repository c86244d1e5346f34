//! Captures the prose that follows a link, used as a selection signal.

use crate::extractor::LinkOccurrence;

/// Text strictly between the end of `occurrence` and the byte offset
/// `boundary` (the next occurrence with a different key, or end of text).
pub fn summary_for(text: &str, occurrence: &LinkOccurrence, boundary: usize) -> String {
    let from = occurrence.byte_span().end;
    let chunk = text.get(from..boundary.max(from)).unwrap_or_default();
    tidy(chunk)
}

/// Attach a summary to every occurrence. Runs of adjacent occurrences that
/// share a canonical key are treated as one block, so each of them captures
/// the blurb after the whole run.
pub fn attach_summaries(text: &str, occurrences: &mut [LinkOccurrence]) {
    for idx in 0..occurrences.len() {
        let key = &occurrences[idx].canonical_key;
        let boundary = occurrences[idx + 1..]
            .iter()
            .find(|next| &next.canonical_key != key)
            .map(|next| next.byte_span().start)
            .unwrap_or(text.len());
        let summary = summary_for(text, &occurrences[idx], boundary);
        occurrences[idx].summary = summary;
    }
}

fn tidy(chunk: &str) -> String {
    let lines: Vec<&str> = chunk.lines().map(str::trim_end).collect();
    let Some(first) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return String::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);

    let mut kept: Vec<&str> = lines[first..=last].to_vec();
    // Leftovers of the markdown link that precedes the summary.
    kept[0] = kept[0].trim_start_matches([' ', ')', ']', '\t']);
    kept.join("\n").trim().to_string()
}
