//! OCR / vision provider adapters.
//!
//! Every backend implements [`OcrProvider`]. Adapters are built per call from
//! configuration by [`ProviderFactory`] and never hold process-wide state.

pub mod document_ai;
pub mod http;
pub mod policy;
pub mod registry;
pub mod tesseract;
pub mod vision;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use policy::{call_with_policy, RetryPolicy};
pub use registry::{ProbeReport, ProviderFactory};

/// Confidence reported when a backend gives none.
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Generic failure classes. Callers never see provider-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderErrorCode {
    AuthFailed,
    QuotaExceeded,
    InvalidInput,
    Unknown,
}

impl ProviderErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorCode::AuthFailed => "AUTH_FAILED",
            ProviderErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ProviderErrorCode::InvalidInput => "INVALID_INPUT",
            ProviderErrorCode::Unknown => "UNKNOWN",
        }
    }

    /// Only transient-looking failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderErrorCode::Unknown)
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct ProviderError {
    pub code: ProviderErrorCode,
    pub message: String,
    pub timed_out: bool,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthFailed, message)
    }

    pub fn quota(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::QuotaExceeded, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidInput, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::Unknown, message)
    }

    pub fn timeout(provider: &str, after: std::time::Duration) -> Self {
        Self {
            code: ProviderErrorCode::Unknown,
            message: format!("{} timed out after {:?}", provider, after),
            timed_out: true,
        }
    }

    pub fn not_configured(provider: &str) -> Self {
        Self::auth(format!("{} is not configured", provider))
    }
}

/// Text recognised by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
    pub source: String,
    /// Per-page text when the backend reports pages (document OCR).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<String>,
}

impl Recognition {
    /// Builds a result, substituting [`DEFAULT_CONFIDENCE`] for a missing or
    /// non-finite score and clamping to `0.0..=1.0`.
    pub fn new(text: impl Into<String>, confidence: Option<f32>, source: impl Into<String>) -> Self {
        let confidence = match confidence {
            Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
            _ => DEFAULT_CONFIDENCE,
        };
        Self {
            text: text.into(),
            confidence,
            source: source.into(),
            pages: Vec::new(),
        }
    }

    pub fn with_pages(mut self, pages: Vec<String>) -> Self {
        self.pages = pages;
        self
    }
}

#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Stable identifier, e.g. `tesseract`.
    fn name(&self) -> &str;

    /// Whether the credentials/identifiers this adapter needs are present.
    /// Must not fail or do I/O.
    fn is_configured(&self) -> bool;

    async fn recognize(&self, bytes: &[u8], mime: &str) -> Result<Recognition, ProviderError>;

    /// A trivial round trip proving the backend answers.
    async fn health_check(&self) -> Result<(), ProviderError> {
        self.recognize(&probe_image(), "image/png").await.map(|_| ())
    }
}

/// A blank 8×8 PNG used for health-check round trips.
pub fn probe_image() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
    let mut buf = std::io::Cursor::new(Vec::new());
    match img.write_to(&mut buf, image::ImageFormat::Png) {
        Ok(()) => buf.into_inner(),
        Err(_) => Vec::new(),
    }
}
