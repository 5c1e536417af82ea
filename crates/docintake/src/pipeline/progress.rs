use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ErrorCode;
use crate::ledger::JobStatus;

/// Events emitted by the pipeline while a job moves through its stages.
/// Extracted text is never part of an event.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Stage { status: JobStatus, message: String },
    CacheHit { correlation_id: String },
    /// A downstream response did not carry this upload's correlation id.
    /// The job continues; the caller decides whether to retry.
    EchoMismatch {
        expected: String,
        received: Option<String>,
    },
    Completed { status: JobStatus },
    Failed { code: ErrorCode, error: String },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, job_id: &str, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _job_id: &str, _event: ProgressEvent) {}
}

/// Progress event for streaming to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgressEvent {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    pub timestamp: DateTime<Utc>,
}

/// Fans pipeline events out over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastProgress {
    sender: Arc<broadcast::Sender<JobProgressEvent>>,
}

impl BroadcastProgress {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastProgress {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, job_id: &str, event: ProgressEvent) {
        let (status, message, error_code) = match event {
            ProgressEvent::Stage { status, message } => (status, message, None),
            ProgressEvent::CacheHit { correlation_id } => (
                JobStatus::Ocr,
                format!("Using cached extraction from {}", correlation_id),
                None,
            ),
            ProgressEvent::EchoMismatch { expected, received } => (
                JobStatus::Summarise,
                format!(
                    "Response carried correlation id {} instead of {}",
                    received.as_deref().unwrap_or("<missing>"),
                    expected
                ),
                Some(ErrorCode::StaleCacheMismatch),
            ),
            ProgressEvent::Completed { status } => {
                (status, "Processing finished".to_string(), None)
            }
            ProgressEvent::Failed { code, error } => (JobStatus::Failed, error, Some(code)),
        };

        // No active receivers is fine.
        let _ = self.sender.send(JobProgressEvent {
            job_id: job_id.to_string(),
            status,
            message,
            error_code,
            timestamp: Utc::now(),
        });
    }
}
