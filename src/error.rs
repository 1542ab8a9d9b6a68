use thiserror::Error;

/// Failure taxonomy for the dataset build.
///
/// `MissingColumn` is batch-fatal but run-recoverable: the orchestrator skips
/// the batch and keeps going. `EmptyResult` is run-fatal: nothing is written
/// and the process exits non-zero. Row-level parse failures never surface
/// here at all; they drop the row and are reported only as aggregate counts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("batch {batch}: required column `{column}` not found")]
    MissingColumn { batch: String, column: String },

    #[error("no records survived filtering for any batch; refusing to write an empty dataset")]
    EmptyResult,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
