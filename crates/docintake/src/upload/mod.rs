//! Upload guard: content fingerprints, correlation ids and the
//! fingerprint-keyed extraction cache.

pub mod cache;
pub mod clock;
pub mod fingerprint;
pub mod guard;

use thiserror::Error;

pub use cache::{CachedExtraction, ExtractionCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use fingerprint::{fingerprint, fingerprint_blocking};
pub use guard::{
    echo_headers, UploadGuard, UploadStamp, CORRELATION_ID_HEADER, FILE_HASH_HEADER,
    FORCE_REPROCESS_HEADER,
};

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload '{filename}' is empty")]
    Empty { filename: String },

    #[error("Upload '{filename}' is {size} bytes, limit is {max}")]
    TooLarge {
        filename: String,
        size: u64,
        max: u64,
    },

    #[error("Failed to fingerprint upload: {0}")]
    Fingerprint(String),
}
