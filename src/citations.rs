use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::models::{Citation, RawCitation};

/// Filters the backend citations down to the ones the answer actually
/// references, renumbers them 1..N in their original order and rewrites the
/// inline `[k]` markers to match. When nothing is referenced, every citation
/// is kept and the answer text is left alone.
pub fn remap(raw_answer: &str, raw_citations: &[RawCitation]) -> (String, Vec<Citation>) {
    let candidates: Vec<(u64, &RawCitation)> = raw_citations
        .iter()
        .filter_map(|raw| original_index(raw).map(|index| (index, raw)))
        .collect();

    let referenced = referenced_indices(raw_answer);
    let explicit: Vec<(u64, &RawCitation)> = candidates
        .iter()
        .copied()
        .filter(|(index, _)| referenced.contains(index))
        .collect();
    let to_show = if explicit.is_empty() {
        candidates
    } else {
        explicit
    };

    if to_show.is_empty() {
        return (raw_answer.to_string(), vec![]);
    }

    let mut mapping: HashMap<u64, u32> = HashMap::with_capacity(to_show.len());
    let mut citations = Vec::with_capacity(to_show.len());
    for (position, (original, raw)) in to_show.into_iter().enumerate() {
        let index = position as u32 + 1;
        // A repeated original index keeps the marker of its first occurrence.
        mapping.entry(original).or_insert(index);
        citations.push(Citation {
            index,
            title: raw.title.clone(),
            source: raw.source.clone(),
            snippet: raw.snippet.clone(),
        });
    }

    (rewrite_markers(raw_answer, &mapping), citations)
}

fn original_index(raw: &RawCitation) -> Option<u64> {
    raw.i
        .and_then(|i| u64::try_from(i).ok())
        .filter(|index| *index > 0)
}

fn marker_regex() -> &'static Regex {
    static MARKER_RE: OnceLock<Regex> = OnceLock::new();
    MARKER_RE.get_or_init(|| {
        Regex::new(r"\[([0-9]+)\]").unwrap_or_else(|_| Regex::new(r"^\b$").unwrap())
    })
}

/// Parses the digits of a marker, accepting only the canonical decimal form
/// so `[02]` or `[007]` never stand in for `[2]` or `[7]`.
fn marker_index(digits: &str) -> Option<u64> {
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn referenced_indices(answer: &str) -> HashSet<u64> {
    marker_regex()
        .captures_iter(answer)
        .filter_map(|captures| captures.get(1).and_then(|m| marker_index(m.as_str())))
        .collect()
}

/// Single pass over the answer; each marker is rewritten at most once, so
/// swapped numbers like `[2]->[1]` and `[1]->[2]` never chain.
fn rewrite_markers(answer: &str, mapping: &HashMap<u64, u32>) -> String {
    marker_regex()
        .replace_all(answer, |captures: &Captures| {
            let new_index = captures
                .get(1)
                .and_then(|m| marker_index(m.as_str()))
                .and_then(|old| mapping.get(&old));
            match new_index {
                Some(new_index) => format!("[{new_index}]"),
                None => captures[0].to_string(),
            }
        })
        .into_owned()
}
