use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::payload::{ExtractedPayload, SummaryPayload};
use super::LedgerError;
use crate::db::job_repo::JobRow;
use crate::error::ErrorCode;
use crate::extraction::DocType;

/// Lifecycle state of a document job.
///
/// `Queued → Ocr → Extract → Summarise → Ready`, with `Failed` reachable
/// from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Ocr,
    Extract,
    Summarise,
    Ready,
    Failed,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Queued,
        JobStatus::Ocr,
        JobStatus::Extract,
        JobStatus::Summarise,
        JobStatus::Ready,
        JobStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Ocr => "OCR",
            JobStatus::Extract => "EXTRACT",
            JobStatus::Summarise => "SUMMARISE",
            JobStatus::Ready => "READY",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Position on the forward path. `Failed` is off the path.
    pub fn rank(&self) -> Option<u8> {
        match self {
            JobStatus::Queued => Some(0),
            JobStatus::Ocr => Some(1),
            JobStatus::Extract => Some(2),
            JobStatus::Summarise => Some(3),
            JobStatus::Ready => Some(4),
            JobStatus::Failed => None,
        }
    }

    /// Whether `extracted_text` must be present in this state.
    pub fn requires_text(&self) -> bool {
        matches!(
            self,
            JobStatus::Extract | JobStatus::Summarise | JobStatus::Ready
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner and external links, fixed at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOwner {
    pub user_id: String,
    pub agency_id: Option<String>,
    pub building_id: Option<String>,
    pub unit_id: Option<String>,
}

impl JobOwner {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub filename: String,
    pub mime: String,
    pub size_bytes: u64,
    pub owner: JobOwner,
    pub file_hash: Option<String>,
    pub correlation_id: Option<String>,
}

/// Typed view of a `document_jobs` row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentJob {
    pub id: String,
    pub filename: String,
    pub status: JobStatus,
    pub size_bytes: u64,
    pub mime: String,
    pub page_count: Option<u32>,
    pub doc_type_guess: Option<DocType>,
    pub linked_building_id: Option<String>,
    pub linked_unit_id: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub ocr_artifact_url: Option<String>,
    pub extracted_text: Option<String>,
    pub extracted: Option<ExtractedPayload>,
    pub summary: Option<SummaryPayload>,
    pub token_usage: Option<u64>,
    pub latency_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user_id: String,
    pub agency_id: Option<String>,
    pub file_hash: Option<String>,
    pub correlation_id: Option<String>,
}

impl TryFrom<JobRow> for DocumentJob {
    type Error = LedgerError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let id = row.id.clone();
        let corrupt = |detail: String| LedgerError::Corrupt {
            id: id.clone(),
            detail,
        };

        let status = JobStatus::parse(&row.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", row.status)))?;
        let error_code = row
            .error_code
            .as_deref()
            .map(|c| ErrorCode::parse(c).ok_or_else(|| corrupt(format!("unknown error code '{}'", c))))
            .transpose()?;
        let doc_type_guess = row
            .doc_type_guess
            .as_deref()
            .map(|d| DocType::parse(d).ok_or_else(|| corrupt(format!("unknown doc type '{}'", d))))
            .transpose()?;
        let extracted = row
            .extracted_json
            .as_deref()
            .map(serde_json::from_str::<ExtractedPayload>)
            .transpose()
            .map_err(|e| corrupt(format!("extracted_json: {}", e)))?;
        let summary = row
            .summary_json
            .as_deref()
            .map(serde_json::from_str::<SummaryPayload>)
            .transpose()
            .map_err(|e| corrupt(format!("summary_json: {}", e)))?;

        Ok(Self {
            status,
            size_bytes: non_negative(row.size_bytes),
            page_count: row.page_count.map(|n| non_negative(n) as u32),
            doc_type_guess,
            error_code,
            extracted,
            summary,
            token_usage: row.token_usage.map(non_negative),
            latency_ms: row.latency_ms.map(non_negative),
            created_at: parse_timestamp(&row.created_at).map_err(&corrupt)?,
            updated_at: parse_timestamp(&row.updated_at).map_err(&corrupt)?,
            id: row.id,
            filename: row.filename,
            mime: row.mime,
            linked_building_id: row.linked_building_id,
            linked_unit_id: row.linked_unit_id,
            error_message: row.error_message,
            ocr_artifact_url: row.ocr_artifact_url,
            extracted_text: row.extracted_text,
            user_id: row.user_id,
            agency_id: row.agency_id,
            file_hash: row.file_hash,
            correlation_id: row.correlation_id,
        })
    }
}

fn non_negative(n: i64) -> u64 {
    n.max(0) as u64
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("timestamp '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> JobRow {
        JobRow {
            id: "job-1".to_string(),
            filename: "lease.pdf".to_string(),
            status: "OCR".to_string(),
            size_bytes: 10,
            mime: "application/pdf".to_string(),
            page_count: Some(3),
            doc_type_guess: Some("lease".to_string()),
            created_at: "2026-03-01T10:00:00+00:00".to_string(),
            updated_at: "2026-03-01T10:00:05+00:00".to_string(),
            user_id: "user-1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_round_trip_and_order() {
        for status in JobStatus::ALL {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
        assert!(JobStatus::Ocr.rank() < JobStatus::Extract.rank());
        assert_eq!(JobStatus::Failed.rank(), None);
        assert_eq!(JobStatus::parse("ready"), None);
    }

    #[test]
    fn test_row_conversion() {
        let job = DocumentJob::try_from(row()).unwrap();
        assert_eq!(job.status, JobStatus::Ocr);
        assert_eq!(job.page_count, Some(3));
        assert_eq!(job.doc_type_guess, Some(DocType::Lease));
        assert!(job.updated_at > job.created_at);
    }

    #[test]
    fn test_unknown_status_is_corrupt() {
        let mut row = row();
        row.status = "DONE".to_string();
        assert!(matches!(
            DocumentJob::try_from(row),
            Err(LedgerError::Corrupt { .. })
        ));
    }

    #[test]
    fn test_bad_extracted_json_is_corrupt() {
        let mut row = row();
        row.extracted_json = Some("{\"kind\":\"spreadsheet\"}".to_string());
        assert!(matches!(
            DocumentJob::try_from(row),
            Err(LedgerError::Corrupt { .. })
        ));
    }
}
