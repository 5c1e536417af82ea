//! Cheap, filename- and text-based signals computed alongside extraction.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Lease,
    Certificate,
    Report,
    Other,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Lease => "lease",
            DocType::Certificate => "certificate",
            DocType::Report => "report",
            DocType::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lease" => Some(DocType::Lease),
            "certificate" => Some(DocType::Certificate),
            "report" => Some(DocType::Report),
            "other" => Some(DocType::Other),
            _ => None,
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const LEASE_WORDS: &[&str] = &["lease", "tenancy", "agreement"];
const CERTIFICATE_WORDS: &[&str] = &["certificate", "cert", "eicr", "fra", "insurance"];
const REPORT_WORDS: &[&str] = &["report", "assessment", "survey"];

/// Guesses the document family from its filename. Checked in order
/// lease, certificate, report.
pub fn guess_doc_type(filename: &str) -> DocType {
    let lower = filename.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();

    let hit = |words: &[&str]| {
        tokens.iter().any(|token| {
            words
                .iter()
                .any(|w| *token == *w || (w.len() >= 5 && token.starts_with(w)))
        })
    };

    if hit(LEASE_WORDS) {
        DocType::Lease
    } else if hit(CERTIFICATE_WORDS) {
        DocType::Certificate
    } else if hit(REPORT_WORDS) {
        DocType::Report
    } else {
        DocType::Other
    }
}

const READABLE_PUNCTUATION: &str = ".,;:!'\"()[]-/&%£$€@#*+=_–—’‘“”";

/// Share of characters that look like ordinary prose, `0.0..=1.0`.
pub fn text_quality(text: &str) -> f32 {
    let trimmed = text.trim();
    let total = trimmed.chars().count();
    if total == 0 {
        return 0.0;
    }
    let readable = trimmed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || READABLE_PUNCTUATION.contains(*c))
        .count();
    readable as f32 / total as f32
}
