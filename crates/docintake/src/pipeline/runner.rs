use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::citations::{find_citations, find_citations_with_pages};
use crate::config::Config;
use crate::db::{default_database_path, Database};
use crate::error::{ConfigError, ErrorCode};
use crate::extraction::{
    guess_doc_type, resolve_mime, DocType, DocumentKind, ExtractionCascade, ExtractionOutcome,
};
use crate::ledger::{
    DocumentJob, ExtractStage, ExtractedPayload, JobLedger, JobOwner, JobStatus, NewJob,
    OcrStage, ReadyStage, StagePayload, SummariseStage, SummaryPayload, TextExtraction,
};
use crate::providers::ProviderFactory;
use crate::sanitize::{redact_filename, short_hash};
use crate::upload::{ExtractionCache, UploadGuard, UploadStamp, CORRELATION_ID_HEADER};

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

/// One uploaded document, as handed over by the upload handler.
#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub bytes: Vec<u8>,
    /// Declared mime type; may be empty.
    pub mime: String,
    pub filename: String,
    pub owner: JobOwner,
    pub force_reprocess: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub payload: SummaryPayload,
    pub token_usage: Option<u64>,
    /// Identity headers returned by the summarisation service.
    pub echoed: HeaderMap,
}

#[derive(Error, Debug)]
#[error("{message}")]
pub struct SummariserError {
    pub message: String,
}

impl SummariserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Downstream summarisation, driving a job from `EXTRACT` to `READY`.
///
/// `headers` carry the upload's fingerprint and correlation id; the service
/// is expected to echo them back in [`Summary::echoed`].
#[async_trait]
pub trait Summariser: Send + Sync {
    async fn summarise(
        &self,
        job: &DocumentJob,
        headers: &HeaderMap,
    ) -> Result<Summary, SummariserError>;
}

enum CascadeSource {
    Fixed(ExtractionCascade),
    /// Adapters and credentials are rebuilt for every job.
    PerJob(ProviderFactory),
}

impl CascadeSource {
    fn cascade(&self) -> ExtractionCascade {
        match self {
            CascadeSource::Fixed(cascade) => cascade.clone(),
            CascadeSource::PerJob(factory) => ExtractionCascade::from_factory(factory),
        }
    }
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    guard: UploadGuard,
    cache: ExtractionCache,
    cascade: CascadeSource,
    ledger: JobLedger,
    summariser: Option<Arc<dyn Summariser>>,
}

impl Pipeline {
    /// Opens the configured ledger and wires production components.
    pub fn open(config: &Config) -> crate::Result<Self> {
        let path = match &config.database_path {
            Some(path) => path.clone(),
            None => default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "database_path is not set and no home directory was found"
                    .to_string(),
            })?,
        };
        let db = Database::open(&path)?;
        Ok(Self::from_config(config, JobLedger::new(db)))
    }

    /// Production constructor: providers, limits and cache from config.
    pub fn from_config(config: &Config, ledger: JobLedger) -> Self {
        Self {
            config: Arc::new(PipelineConfig::from_config(config)),
            guard: UploadGuard::from_config(&config.limits),
            cache: ExtractionCache::from_config(&config.cache),
            cascade: CascadeSource::PerJob(ProviderFactory::from_config(config)),
            ledger,
            summariser: None,
        }
    }

    /// Inject specific sub-components.
    pub fn new(
        config: PipelineConfig,
        guard: UploadGuard,
        cache: ExtractionCache,
        cascade: ExtractionCascade,
        ledger: JobLedger,
    ) -> Self {
        Self {
            config: Arc::new(config),
            guard,
            cache,
            cascade: CascadeSource::Fixed(cascade),
            ledger,
            summariser: None,
        }
    }

    pub fn with_summariser(mut self, summariser: Arc<dyn Summariser>) -> Self {
        self.summariser = Some(summariser);
        self
    }

    pub fn ledger(&self) -> &JobLedger {
        &self.ledger
    }

    pub fn cache(&self) -> &ExtractionCache {
        &self.cache
    }

    /// Runs one upload through every stage.
    ///
    /// Job-level failures come back as a `FAILED` job carrying an error
    /// code; `Err` means the ledger itself could not be written.
    pub async fn run(
        &self,
        request: IntakeRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<DocumentJob, PipelineError> {
        let mime = resolve_mime(&request.mime, &request.filename);
        let span = info_span!(
            "pipeline",
            file = %redact_filename(&request.filename),
            mime = %mime,
            bytes = request.bytes.len(),
        );
        let job = self
            .run_inner(request, mime, progress)
            .instrument(span)
            .await?;
        progress.report(&job.id, terminal_event(&job));
        Ok(job)
    }

    async fn run_inner(
        &self,
        request: IntakeRequest,
        mime: String,
        progress: &dyn ProgressReporter,
    ) -> Result<DocumentJob, PipelineError> {
        let started = Instant::now();

        // Step 1: Stamp the upload and open the job
        let stamped = self
            .guard
            .stamp(&request.filename, &request.bytes, request.force_reprocess)
            .instrument(info_span!("stamp"))
            .await;
        let stamp = match stamped {
            Ok(stamp) => stamp,
            Err(e) => {
                let job = self.ledger.create(new_job(&request, &mime, None))?;
                return Ok(self
                    .ledger
                    .fail(&job.id, ErrorCode::UploadError, &e.to_string())?);
            }
        };
        let job = self.ledger.create(new_job(&request, &mime, Some(&stamp)))?;
        let job_id = job.id.clone();
        let doc_type = guess_doc_type(&request.filename);
        progress.report(
            &job_id,
            ProgressEvent::Stage {
                status: JobStatus::Queued,
                message: "Job queued".to_string(),
            },
        );

        // Step 2: OCR stage
        self.ledger.advance(
            &job_id,
            StagePayload::Ocr(OcrStage {
                doc_type_guess: Some(doc_type),
                ..Default::default()
            }),
        )?;
        progress.report(
            &job_id,
            ProgressEvent::Stage {
                status: JobStatus::Ocr,
                message: "Extracting text...".to_string(),
            },
        );
        let outcome = match self
            .extract(&job_id, &stamp, &request.bytes, &mime, progress)
            .instrument(info_span!("ocr", job_id = %job_id))
            .await
        {
            Some(outcome) => outcome,
            None => {
                let message = format!(
                    "Extraction exceeded {}s",
                    self.config.stage_timeout.as_secs()
                );
                return Ok(self.ledger.fail(&job_id, ErrorCode::Timeout, &message)?);
            }
        };
        self.ledger.advance(
            &job_id,
            StagePayload::Ocr(OcrStage {
                page_count: Some(outcome.page_count),
                ocr_artifact_url: None,
                doc_type_guess: Some(doc_type),
            }),
        )?;

        if outcome.kind == DocumentKind::Other {
            let message = format!("Unsupported file type: {}", display_mime(&mime));
            return Ok(self
                .ledger
                .fail(&job_id, ErrorCode::UnsupportedType, &message)?);
        }
        if !outcome.has_text() && outcome.ocr_needed {
            return Ok(self.ledger.fail(
                &job_id,
                ErrorCode::ExtractionFailed,
                &exhausted_message(&outcome),
            )?);
        }

        // Step 3: Record text
        let extraction =
            TextExtraction::from_outcome(&outcome, self.config.low_confidence_threshold);
        if extraction.low_confidence {
            warn!(
                job_id = %job_id,
                confidence = ?outcome.confidence,
                source = outcome.source.as_deref().unwrap_or("none"),
                "low confidence extraction"
            );
        }
        let extracted = match doc_type {
            DocType::Lease => ExtractedPayload::Lease {
                citations: lease_citations(&outcome),
                extraction,
            },
            _ => ExtractedPayload::Text(extraction),
        };
        progress.report(
            &job_id,
            ProgressEvent::Stage {
                status: JobStatus::Extract,
                message: format!("Extracted {} pages", outcome.page_count),
            },
        );
        let mut job = {
            let _step = info_span!("extract", job_id = %job_id).entered();
            self.ledger.advance(
                &job_id,
                StagePayload::Extract(ExtractStage {
                    extracted_text: outcome.text.clone(),
                    extracted,
                    page_count: outcome.page_count,
                    latency_ms: Some(elapsed_ms(started)),
                }),
            )?
        };

        // Step 4: Summarise
        if let Some(summariser) = &self.summariser {
            progress.report(
                &job_id,
                ProgressEvent::Stage {
                    status: JobStatus::Summarise,
                    message: "Summarising...".to_string(),
                },
            );
            job = match self
                .summarise(summariser.as_ref(), &job, &stamp, started, progress)
                .instrument(info_span!("summarise", job_id = %job_id))
                .await?
            {
                Ok(job) => job,
                Err((code, message)) => self.ledger.fail(&job_id, code, &message)?,
            };
        }

        info!(
            job_id = %job.id,
            status = %job.status,
            elapsed_ms = elapsed_ms(started),
            "pipeline finished"
        );
        Ok(job)
    }

    /// Cached outcome for this upload, or a fresh cascade run. `None` when
    /// the stage timed out.
    async fn extract(
        &self,
        job_id: &str,
        stamp: &UploadStamp,
        bytes: &[u8],
        mime: &str,
        progress: &dyn ProgressReporter,
    ) -> Option<ExtractionOutcome> {
        let kind = DocumentKind::from_mime(mime);
        let cached = match kind {
            DocumentKind::Other => None,
            kind => self.cache.lookup(stamp, kind),
        };
        if let Some(hit) = cached {
            info!(
                fingerprint = short_hash(&stamp.fingerprint),
                cached_from = %hit.correlation_id,
                "serving cached extraction"
            );
            progress.report(
                job_id,
                ProgressEvent::CacheHit {
                    correlation_id: hit.correlation_id.clone(),
                },
            );
            return Some(hit.outcome.clone());
        }

        let cascade = self.cascade.cascade();
        let outcome = tokio::time::timeout(self.config.stage_timeout, cascade.run(bytes, mime))
            .await
            .ok()?;

        if outcome.kind != DocumentKind::Other && !outcome.ocr_needed {
            self.cache.insert(stamp, outcome.clone());
        } else {
            debug!(
                fingerprint = short_hash(&stamp.fingerprint),
                "not caching unusable extraction"
            );
        }
        Some(outcome)
    }

    async fn summarise(
        &self,
        summariser: &dyn Summariser,
        job: &DocumentJob,
        stamp: &UploadStamp,
        started: Instant,
        progress: &dyn ProgressReporter,
    ) -> Result<Result<DocumentJob, (ErrorCode, String)>, PipelineError> {
        let job = self.ledger.advance(
            &job.id,
            StagePayload::Summarise(SummariseStage::default()),
        )?;

        let summary =
            match tokio::time::timeout(
                self.config.stage_timeout,
                summariser.summarise(&job, &stamp.headers()),
            )
            .await
            {
                Ok(Ok(summary)) => summary,
                Ok(Err(e)) => return Ok(Err((ErrorCode::ProviderError, e.to_string()))),
                Err(_) => {
                    return Ok(Err((
                        ErrorCode::Timeout,
                        format!(
                            "Summarisation exceeded {}s",
                            self.config.stage_timeout.as_secs()
                        ),
                    )))
                }
            };

        if !stamp.verify_echo(&summary.echoed) {
            progress.report(
                &job.id,
                ProgressEvent::EchoMismatch {
                    expected: stamp.correlation_id.clone(),
                    received: echoed_correlation(&summary.echoed),
                },
            );
        }

        let job = self.ledger.advance(
            &job.id,
            StagePayload::Ready(ReadyStage {
                summary: summary.payload,
                token_usage: summary.token_usage,
                latency_ms: Some(elapsed_ms(started)),
            }),
        )?;
        Ok(Ok(job))
    }
}

fn new_job(request: &IntakeRequest, mime: &str, stamp: Option<&UploadStamp>) -> NewJob {
    NewJob {
        filename: redact_filename(&request.filename),
        mime: mime.to_string(),
        size_bytes: request.bytes.len() as u64,
        owner: request.owner.clone(),
        file_hash: stamp.map(|s| s.fingerprint.clone()),
        correlation_id: stamp.map(|s| s.correlation_id.clone()),
    }
}

fn lease_citations(outcome: &ExtractionOutcome) -> Vec<crate::citations::PinCite> {
    if outcome.pages.len() > 1 {
        find_citations_with_pages(&outcome.pages)
    } else {
        find_citations(&outcome.text)
    }
}

fn exhausted_message(outcome: &ExtractionOutcome) -> String {
    if outcome.attempts.is_empty() {
        return format!("No extraction strategy available for {} files", outcome.kind);
    }
    let tried: Vec<String> = outcome
        .attempts
        .iter()
        .map(|a| match &a.error_code {
            Some(code) => format!("{}: {}", a.strategy_name, code),
            None => a.strategy_name.clone(),
        })
        .collect();
    format!("No text could be extracted ({})", tried.join(", "))
}

fn display_mime(mime: &str) -> &str {
    if mime.is_empty() {
        "unknown"
    } else {
        mime
    }
}

fn terminal_event(job: &DocumentJob) -> ProgressEvent {
    match (job.status, job.error_code) {
        (JobStatus::Failed, Some(code)) => ProgressEvent::Failed {
            code,
            error: job.error_message.clone().unwrap_or_default(),
        },
        (status, _) => ProgressEvent::Completed { status },
    }
}

fn echoed_correlation(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
