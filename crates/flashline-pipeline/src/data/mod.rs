//! Plain data types shared by the pipeline stages and its callers.

pub mod options;
pub mod result;

pub use options::{
    DEFAULT_HANDOFF_CAPACITY, DEFAULT_READ_CHUNK_SIZE, DEFAULT_WRITE_CHUNK_SIZE, PipelineOptions, Progress,
    TransferPhase, WritePolicy,
};
pub use result::{FailureClass, FailureReason, Outcome, TransferResult, Verdict};
