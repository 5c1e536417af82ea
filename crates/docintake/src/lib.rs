pub mod citations;
pub mod config;
pub mod db;
pub mod error;
pub mod extraction;
pub mod ledger;
pub mod pipeline;
pub mod providers;
pub mod sanitize;
pub mod secrets;
pub mod telemetry;
pub mod upload;

pub use citations::{find_citations, find_citations_with_pages, select_for_section, CiteKind, PinCite};
pub use config::{load_config, load_config_from_str, Config};
pub use db::{Database, DatabaseError};
pub use error::{ConfigError, ErrorCode, IntakeError, Result};
pub use extraction::{DocumentKind, ExtractionCascade, ExtractionOutcome};
pub use ledger::{DocumentJob, JobLedger, JobStatus, LedgerError, NewJob, StagePayload};
pub use pipeline::{IntakeRequest, Pipeline, PipelineConfig};
pub use providers::{OcrProvider, ProviderError, ProviderErrorCode, ProviderFactory, Recognition};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use upload::{ExtractionCache, UploadGuard, UploadStamp};
