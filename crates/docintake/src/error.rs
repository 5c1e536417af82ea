use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IntakeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),

    #[error("Upload error: {0}")]
    Upload(#[from] crate::upload::UploadError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Stable, user-facing failure codes recorded on a job.
///
/// Provider-level detail (`AUTH_FAILED`, `QUOTA_EXCEEDED`, ...) lives in
/// [`crate::providers::ProviderErrorCode`]; only these codes reach the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UploadError,
    UnsupportedType,
    ExtractionFailed,
    ProviderError,
    Timeout,
    StaleCacheMismatch,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UploadError => "UPLOAD_ERROR",
            ErrorCode::UnsupportedType => "UNSUPPORTED_TYPE",
            ErrorCode::ExtractionFailed => "EXTRACTION_FAILED",
            ErrorCode::ProviderError => "PROVIDER_ERROR",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::StaleCacheMismatch => "STALE_CACHE_MISMATCH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPLOAD_ERROR" => Some(ErrorCode::UploadError),
            "UNSUPPORTED_TYPE" => Some(ErrorCode::UnsupportedType),
            "EXTRACTION_FAILED" => Some(ErrorCode::ExtractionFailed),
            "PROVIDER_ERROR" => Some(ErrorCode::ProviderError),
            "TIMEOUT" => Some(ErrorCode::Timeout),
            "STALE_CACHE_MISMATCH" => Some(ErrorCode::StaleCacheMismatch),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type Result<T> = std::result::Result<T, IntakeError>;
