use thiserror::Error;

/// Failures that leave no usable job row behind. Everything else is recorded
/// on the job itself as `FAILED` with an error code.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Job ledger failed: {0}")]
    Ledger(#[from] crate::ledger::LedgerError),
}
