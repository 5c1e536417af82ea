use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CACHE_CONTROL, PRAGMA};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::fingerprint::fingerprint;
use super::UploadError;
use crate::config::LimitsConfig;
use crate::error::ErrorCode;
use crate::sanitize::{redact_filename, sanitize_filename, short_hash};

pub const FILE_HASH_HEADER: &str = "x-file-hash";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const FORCE_REPROCESS_HEADER: &str = "x-force-reprocess";

/// Identity of a single upload, carried through processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStamp {
    /// SHA-256 of the full content, lowercase hex.
    pub fingerprint: String,
    /// `{unix_ms}-{sanitized filename}-{size}`, unique per guard.
    pub correlation_id: String,
    pub force_reprocess: bool,
    pub filename: String,
    pub size_bytes: u64,
    pub issued_at: DateTime<Utc>,
}

impl UploadStamp {
    /// Request metadata for a processing call. Always asks intermediaries
    /// not to serve a memoized response.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        insert(&mut headers, FILE_HASH_HEADER, &self.fingerprint);
        insert(&mut headers, CORRELATION_ID_HEADER, &self.correlation_id);
        insert(
            &mut headers,
            FORCE_REPROCESS_HEADER,
            if self.force_reprocess { "true" } else { "false" },
        );
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
        headers
    }

    /// Checks that a response echoed this upload's correlation id.
    ///
    /// A mismatch is logged and reported, never raised; the caller decides
    /// whether to retry.
    pub fn verify_echo(&self, response: &HeaderMap) -> bool {
        let echoed = response
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok());
        self.verify_correlation(echoed)
    }

    pub fn verify_correlation(&self, echoed: Option<&str>) -> bool {
        match echoed {
            Some(id) if id == self.correlation_id => true,
            other => {
                warn!(
                    code = ErrorCode::StaleCacheMismatch.as_str(),
                    expected = %self.correlation_id,
                    received = other.unwrap_or("<missing>"),
                    fingerprint = short_hash(&self.fingerprint),
                    "correlation id mismatch"
                );
                false
            }
        }
    }
}

fn insert(headers: &mut HeaderMap, name: &'static str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

/// Copies the identity headers of a request into a response.
pub fn echo_headers(request: &HeaderMap) -> HeaderMap {
    let mut echoed = HeaderMap::new();
    for name in [FILE_HASH_HEADER, CORRELATION_ID_HEADER] {
        if let Some(value) = request.get(name) {
            echoed.insert(HeaderName::from_static(name), value.clone());
        }
    }
    echoed
}

/// Stamps uploads with a fingerprint and a correlation id.
pub struct UploadGuard {
    max_upload_bytes: u64,
    clock: Arc<dyn Clock>,
    last_ms: AtomicI64,
}

impl UploadGuard {
    pub fn new(max_upload_bytes: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_upload_bytes,
            clock,
            last_ms: AtomicI64::new(0),
        }
    }

    pub fn from_config(limits: &LimitsConfig) -> Self {
        Self::new(limits.max_upload_bytes, Arc::new(SystemClock))
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub async fn stamp(
        &self,
        filename: &str,
        bytes: &[u8],
        force_reprocess: bool,
    ) -> Result<UploadStamp, UploadError> {
        let size = bytes.len() as u64;
        if size == 0 {
            return Err(UploadError::Empty {
                filename: redact_filename(filename),
            });
        }
        if size > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                filename: redact_filename(filename),
                size,
                max: self.max_upload_bytes,
            });
        }

        let fingerprint = fingerprint(bytes).await?;
        let correlation_id = self.correlation_id(filename, size);
        debug!(
            file = %redact_filename(filename),
            size,
            fingerprint = short_hash(&fingerprint),
            %correlation_id,
            force_reprocess,
            "upload stamped"
        );

        Ok(UploadStamp {
            fingerprint,
            correlation_id,
            force_reprocess,
            filename: redact_filename(filename),
            size_bytes: size,
            issued_at: self.clock.now(),
        })
    }

    /// `{unix_ms}-{sanitized filename}-{size}`. The millisecond component
    /// strictly increases across calls on one guard.
    pub fn correlation_id(&self, filename: &str, size: u64) -> String {
        let now = self.clock.now().timestamp_millis();
        let previous = self
            .last_ms
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        let ms = now.max(previous + 1);
        format!("{}-{}-{}", ms, sanitize_filename(filename), size)
    }
}
