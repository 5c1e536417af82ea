//! The job ledger: one persisted row per uploaded document and the state
//! machine that moves it forward.

mod model;
mod payload;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

pub use model::{DocumentJob, JobOwner, JobStatus, NewJob};
pub use payload::{
    ExtractStage, ExtractedPayload, OcrStage, ReadyStage, StagePayload, SummariseStage,
    SummaryPayload, SummarySection, TextExtraction,
};

use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::{Database, DatabaseError};
use crate::error::ErrorCode;
use crate::sanitize::redact_filename;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job {id} is {status} and can no longer change")]
    Terminal { id: String, status: JobStatus },

    #[error("Job {id} would enter {status} without {missing}")]
    InvariantViolation {
        id: String,
        status: JobStatus,
        missing: &'static str,
    },

    #[error("Job {id} has a corrupt row: {detail}")]
    Corrupt { id: String, detail: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Failed to serialize stage payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Listing filter over typed values.
#[derive(Debug, Clone, Default)]
pub struct JobQuery {
    pub status: Option<JobStatus>,
    /// Hide one status, typically `FAILED` in user-facing listings.
    pub exclude_status: Option<JobStatus>,
    pub user_id: Option<String>,
    pub agency_id: Option<String>,
    pub file_hash: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Job ledger over the `document_jobs` table.
///
/// Each job owns exactly one row, so concurrent jobs never contend beyond
/// the connection mutex.
#[derive(Clone)]
pub struct JobLedger {
    db: Database,
}

impl JobLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts a new job at `QUEUED`.
    pub fn create(&self, job: NewJob) -> Result<DocumentJob, LedgerError> {
        let now = Utc::now().to_rfc3339();
        let row = JobRow {
            id: uuid::Uuid::new_v4().to_string(),
            filename: job.filename,
            status: JobStatus::Queued.as_str().to_string(),
            size_bytes: i64::try_from(job.size_bytes).unwrap_or(i64::MAX),
            mime: job.mime,
            linked_building_id: job.owner.building_id,
            linked_unit_id: job.owner.unit_id,
            created_at: now.clone(),
            updated_at: now,
            user_id: job.owner.user_id,
            agency_id: job.owner.agency_id,
            file_hash: job.file_hash,
            correlation_id: job.correlation_id,
            ..Default::default()
        };
        job_repo::insert(&self.db, &row)?;

        info!(
            job_id = %row.id,
            file = %redact_filename(&row.filename),
            mime = %row.mime,
            "job queued"
        );
        DocumentJob::try_from(row)
    }

    pub fn get(&self, id: &str) -> Result<DocumentJob, LedgerError> {
        self.row(id).and_then(DocumentJob::try_from)
    }

    /// Applies a stage's results.
    ///
    /// The status moves forward to `payload.stage()` and never backwards:
    /// re-applying an earlier stage overwrites that stage's fields and keeps
    /// the current status. `FAILED` jobs reject every payload.
    pub fn advance(&self, id: &str, payload: StagePayload) -> Result<DocumentJob, LedgerError> {
        let mut row = self.row(id)?;
        let current = parse_status(&row)?;
        let (Some(current_rank), Some(stage_rank)) = (current.rank(), payload.stage().rank())
        else {
            return Err(LedgerError::Terminal {
                id: id.to_string(),
                status: current,
            });
        };

        let target = payload.stage();
        let next = if stage_rank > current_rank { target } else { current };

        apply(&mut row, payload)?;

        if next.requires_text() && row.extracted_text.is_none() {
            return Err(LedgerError::InvariantViolation {
                id: id.to_string(),
                status: next,
                missing: "extracted_text",
            });
        }
        if row.summary_json.is_some() && next != JobStatus::Ready {
            return Err(LedgerError::InvariantViolation {
                id: id.to_string(),
                status: next,
                missing: "READY status for summary",
            });
        }

        row.status = next.as_str().to_string();
        row.updated_at = Utc::now().to_rfc3339();
        self.write(&row)?;

        if next == current {
            debug!(job_id = %id, stage = %target, status = %current, "stage re-applied");
        } else {
            info!(job_id = %id, from = %current, to = %next, "job advanced");
        }
        DocumentJob::try_from(row)
    }

    /// Moves a job to `FAILED`, keeping every partial result.
    ///
    /// Failing an already failed job is a no-op that keeps the first error.
    pub fn fail(
        &self,
        id: &str,
        code: ErrorCode,
        message: &str,
    ) -> Result<DocumentJob, LedgerError> {
        let mut row = self.row(id)?;
        match parse_status(&row)? {
            JobStatus::Failed => {
                debug!(job_id = %id, code = code.as_str(), "job already failed");
                return DocumentJob::try_from(row);
            }
            JobStatus::Ready => {
                return Err(LedgerError::Terminal {
                    id: id.to_string(),
                    status: JobStatus::Ready,
                })
            }
            _ => {}
        }

        row.status = JobStatus::Failed.as_str().to_string();
        row.error_code = Some(code.as_str().to_string());
        row.error_message = Some(message.to_string());
        row.updated_at = Utc::now().to_rfc3339();
        self.write(&row)?;

        warn!(job_id = %id, code = code.as_str(), error = %message, "job failed");
        DocumentJob::try_from(row)
    }

    /// Newest first. Returns the page and the total matching count.
    pub fn list(&self, query: &JobQuery) -> Result<(Vec<DocumentJob>, u64), LedgerError> {
        let filter = JobFilter {
            status: query.status.map(|s| s.as_str().to_string()),
            user_id: query.user_id.clone(),
            agency_id: query.agency_id.clone(),
            file_hash: query.file_hash.clone(),
            exclude_status: query.exclude_status.map(|s| s.as_str().to_string()),
            created_from: query.created_after.map(|t| t.to_rfc3339()),
            created_to: query.created_before.map(|t| t.to_rfc3339()),
            limit: query.limit,
            offset: query.offset,
        };
        let (rows, total) = job_repo::query(&self.db, &filter)?;
        let jobs = rows
            .into_iter()
            .map(DocumentJob::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((jobs, total))
    }

    pub fn count_by_status(&self, status: JobStatus) -> Result<u64, LedgerError> {
        Ok(job_repo::count_by_status(&self.db, status.as_str())?)
    }

    fn row(&self, id: &str) -> Result<JobRow, LedgerError> {
        job_repo::find_by_id(&self.db, id)?.ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    fn write(&self, row: &JobRow) -> Result<(), LedgerError> {
        match job_repo::update(&self.db, row)? {
            0 => Err(LedgerError::NotFound(row.id.clone())),
            _ => Ok(()),
        }
    }
}

fn parse_status(row: &JobRow) -> Result<JobStatus, LedgerError> {
    JobStatus::parse(&row.status).ok_or_else(|| LedgerError::Corrupt {
        id: row.id.clone(),
        detail: format!("unknown status '{}'", row.status),
    })
}

fn apply(row: &mut JobRow, payload: StagePayload) -> Result<(), LedgerError> {
    match payload {
        StagePayload::Ocr(stage) => {
            row.page_count = stage.page_count.map(i64::from);
            row.ocr_artifact_url = stage.ocr_artifact_url;
            row.doc_type_guess = stage.doc_type_guess.map(|d| d.as_str().to_string());
        }
        StagePayload::Extract(stage) => {
            row.extracted_json = Some(serde_json::to_string(&stage.extracted)?);
            row.extracted_text = Some(stage.extracted_text);
            row.page_count = Some(i64::from(stage.page_count));
            row.latency_ms = stage.latency_ms.map(to_i64);
        }
        StagePayload::Summarise(stage) => {
            row.token_usage = stage.token_usage.map(to_i64);
        }
        StagePayload::Ready(stage) => {
            row.summary_json = Some(serde_json::to_string(&stage.summary)?);
            row.token_usage = stage.token_usage.map(to_i64);
            row.latency_ms = stage.latency_ms.map(to_i64);
        }
    }
    Ok(())
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
