//! Pin-point citations: `Clause 7.2` and `Schedule 5(10)` references found in
//! extracted lease text, for grounding generated report sections.

mod select;

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use select::{score_citation, select_for_section};

/// Group 2 takes the word characters and dots trailing the number, so
/// `Clause 7.2a` cannot backtrack to `Clause 7`. A tail holding anything but
/// dots rejects the match.
static RE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bclause\s+(\d+(?:\.\d+)*)([.\w]*)").unwrap());
static RE_SCHEDULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bschedule\s+(\d+)\b(?:\s*\(([^()\n]{1,40})\))?").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiteKind {
    Clause,
    Schedule,
}

impl fmt::Display for CiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CiteKind::Clause => write!(f, "clause"),
            CiteKind::Schedule => write!(f, "schedule"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCite {
    pub kind: CiteKind,
    /// Normalized, e.g. `Clause 7.2` or `Schedule 5(10)`.
    pub label: String,
    /// 1-based page, when found in per-page text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Byte offset of the match. In per-page mode the offset is into the
    /// pages joined with `\n`.
    pub index: usize,
}

/// Citations in flat text, deduplicated and ordered by position.
pub fn find_citations(text: &str) -> Vec<PinCite> {
    let mut found = Vec::new();
    scan(text, None, 0, &mut found);
    dedup(found)
}

/// Citations across per-page text. Pages are 1-based; the same label on
/// two pages yields two citations.
pub fn find_citations_with_pages<S: AsRef<str>>(pages: &[S]) -> Vec<PinCite> {
    let mut found = Vec::new();
    let mut offset = 0;
    for (i, page) in pages.iter().enumerate() {
        let page = page.as_ref();
        scan(page, Some(i + 1), offset, &mut found);
        offset += page.len() + 1;
    }
    dedup(found)
}

fn scan(text: &str, page: Option<usize>, offset: usize, out: &mut Vec<PinCite>) {
    for caps in RE_CLAUSE.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let tail = caps.get(2).map_or("", |m| m.as_str());
        if tail.chars().any(|c| c.is_alphanumeric() || c == '_') {
            continue;
        }
        out.push(PinCite {
            kind: CiteKind::Clause,
            label: format!("Clause {}", number.as_str()),
            page,
            index: offset + whole.start(),
        });
    }

    for caps in RE_SCHEDULE.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let label = match caps.get(2) {
            Some(part) => format!("Schedule {}({})", number.as_str(), part.as_str().trim()),
            None => format!("Schedule {}", number.as_str()),
        };
        out.push(PinCite {
            kind: CiteKind::Schedule,
            label,
            page,
            index: offset + whole.start(),
        });
    }
}

/// Keeps the earliest occurrence per `(kind, label, page)` and sorts by index.
fn dedup(found: Vec<PinCite>) -> Vec<PinCite> {
    let mut earliest: HashMap<(CiteKind, String, usize), PinCite> = HashMap::new();
    for cite in found {
        let key = (cite.kind, cite.label.clone(), cite.page.unwrap_or(0));
        match earliest.get(&key) {
            Some(existing) if existing.index <= cite.index => {}
            _ => {
                earliest.insert(key, cite);
            }
        }
    }

    let mut cites: Vec<PinCite> = earliest.into_values().collect();
    cites.sort_by(|a, b| a.index.cmp(&b.index).then(a.kind.cmp(&b.kind)));
    cites
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_normalized() {
        let cites = find_citations("see CLAUSE   12.3.1 and schedule 4 ( Part A )");
        let labels: Vec<&str> = cites.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Clause 12.3.1", "Schedule 4(Part A)"]);
    }

    #[test]
    fn test_word_boundaries() {
        assert!(find_citations("subclause 3 and reschedule 2").is_empty());
        assert!(find_citations("Clause A applies").is_empty());
    }

    #[test]
    fn test_number_with_letter_suffix_is_not_cited() {
        assert!(find_citations("Clause 7.2a applies").is_empty());
        assert!(find_citations("Clause 7.2.b applies").is_empty());
        assert!(find_citations("Clause 12x").is_empty());

        let cites = find_citations("Clause 7.2a, then Clause 7.3");
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].label, "Clause 7.3");
        assert_eq!(cites[0].index, 18);
    }

    #[test]
    fn test_trailing_period_not_part_of_number() {
        let cites = find_citations("As per Clause 7.2.");
        assert_eq!(cites[0].label, "Clause 7.2");
    }

    #[test]
    fn test_unbalanced_parenthetical_ignored() {
        let cites = find_citations("Schedule 3 (see below");
        assert_eq!(cites[0].label, "Schedule 3");
    }

    #[test]
    fn test_page_offsets_are_cumulative() {
        let cites = find_citations_with_pages(&["ab", "Clause 1"]);
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].page, Some(2));
        assert_eq!(cites[0].index, 3);
    }

    #[test]
    fn test_same_label_on_two_pages_kept() {
        let cites = find_citations_with_pages(&["Clause 2", "Clause 2 and Clause 2"]);
        assert_eq!(cites.len(), 2);
        assert_eq!(cites[0].page, Some(1));
        assert_eq!(cites[1].page, Some(2));
        assert_eq!(cites[1].index, 9);
    }

    #[test]
    fn test_serialized_shape() {
        let cite = PinCite {
            kind: CiteKind::Schedule,
            label: "Schedule 5(10)".to_string(),
            page: None,
            index: 38,
        };
        let json = serde_json::to_value(&cite).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "schedule", "label": "Schedule 5(10)", "index": 38})
        );
    }
}
