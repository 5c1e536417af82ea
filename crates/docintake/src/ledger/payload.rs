//! Typed stage results. Only the ledger boundary sees the serialized form.

use serde::{Deserialize, Serialize};

use super::model::JobStatus;
use crate::citations::PinCite;
use crate::extraction::{DocType, ExtractionAttempt, ExtractionOutcome};

/// Results applied by one `advance` call.
#[derive(Debug, Clone, PartialEq)]
pub enum StagePayload {
    Ocr(OcrStage),
    Extract(ExtractStage),
    Summarise(SummariseStage),
    Ready(ReadyStage),
}

impl StagePayload {
    pub fn stage(&self) -> JobStatus {
        match self {
            StagePayload::Ocr(_) => JobStatus::Ocr,
            StagePayload::Extract(_) => JobStatus::Extract,
            StagePayload::Summarise(_) => JobStatus::Summarise,
            StagePayload::Ready(_) => JobStatus::Ready,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrStage {
    pub page_count: Option<u32>,
    pub ocr_artifact_url: Option<String>,
    pub doc_type_guess: Option<DocType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractStage {
    pub extracted_text: String,
    pub extracted: ExtractedPayload,
    pub page_count: u32,
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummariseStage {
    pub token_usage: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadyStage {
    pub summary: SummaryPayload,
    pub token_usage: Option<u64>,
    pub latency_ms: Option<u64>,
}

/// `extracted_json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedPayload {
    Text(TextExtraction),
    Lease {
        extraction: TextExtraction,
        citations: Vec<PinCite>,
    },
}

impl ExtractedPayload {
    pub fn extraction(&self) -> &TextExtraction {
        match self {
            ExtractedPayload::Text(extraction) => extraction,
            ExtractedPayload::Lease { extraction, .. } => extraction,
        }
    }

    pub fn citations(&self) -> &[PinCite] {
        match self {
            ExtractedPayload::Text(_) => &[],
            ExtractedPayload::Lease { citations, .. } => citations,
        }
    }
}

/// How the text was obtained and how far to trust it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextExtraction {
    pub source: Option<String>,
    pub confidence: Option<f32>,
    pub low_confidence: bool,
    pub page_count: u32,
    pub ocr_tried: bool,
    pub ocr_needed: bool,
    #[serde(default)]
    pub attempts: Vec<ExtractionAttempt>,
}

impl TextExtraction {
    pub fn from_outcome(outcome: &ExtractionOutcome, low_confidence_threshold: f32) -> Self {
        let low_confidence = match outcome.confidence {
            Some(score) => score < low_confidence_threshold,
            None => true,
        };
        Self {
            source: outcome.source.clone(),
            confidence: outcome.confidence,
            low_confidence,
            page_count: outcome.page_count,
            ocr_tried: outcome.ocr_tried,
            ocr_needed: outcome.ocr_needed,
            attempts: outcome.attempts.clone(),
        }
    }
}

/// `summary_json`, produced by the summariser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummaryPayload {
    Lease {
        headline: String,
        #[serde(default)]
        sections: Vec<SummarySection>,
    },
    Certificate {
        headline: String,
        #[serde(default)]
        expires_on: Option<String>,
    },
    General {
        headline: String,
        body: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySection {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub citations: Vec<PinCite>,
}
