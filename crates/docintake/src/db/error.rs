use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cannot prepare ledger directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("schema step {version} failed: {reason}")]
    Migration { version: u32, reason: String },

    /// A recorded schema step no longer matches the SQL shipped in the binary.
    #[error("schema step {version} was modified after it was applied (recorded {found}, shipped {expected})")]
    ChecksumMismatch {
        version: u32,
        expected: String,
        found: String,
    },

    #[error("ledger connection mutex poisoned")]
    LockPoisoned,
}
