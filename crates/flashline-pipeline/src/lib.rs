//! Verified streaming transfer of compressed disk images.
//!
//! One source byte stream is teed into two concurrent paths:
//!
//! - the **verifier** (own thread) hashes its copy and checks a detached
//!   signature once the stream ends;
//! - the **decompress → write chain** (calling thread) pulls the other copy
//!   through a bounded [`HandoffBuffer`], decompresses it and writes it
//!   sequentially to the destination.
//!
//! Neither the compressed nor the decompressed image is ever held in memory
//! as a whole. A failure on either path aborts the handoff, which unblocks
//! the other path; [`Pipeline::run`] joins both and returns exactly one
//! [`TransferResult`]. Success requires a valid verdict *and* a clean
//! decompress/write, so a corrupt, truncated or unsigned image is never
//! reported as good.
//!
//! # Architecture
//!
//! - [`data`] - Options, progress and result types
//! - [`handoff`] - Bounded conduit with close and abort signals
//! - [`tee`] - Source duplication
//! - [`decompress`] - Streaming codec seam
//! - [`writer`] - Sequential destination writes
//! - [`pipeline`] - The coordinator

pub mod data;
pub mod decompress;
mod error;
pub mod handoff;
pub mod pipeline;
pub mod tee;
mod verifier;
pub mod writer;

pub use data::{
    DEFAULT_HANDOFF_CAPACITY, DEFAULT_READ_CHUNK_SIZE, DEFAULT_WRITE_CHUNK_SIZE, FailureClass, FailureReason, Outcome,
    PipelineOptions, Progress, TransferPhase, TransferResult, Verdict, WritePolicy,
};
pub use decompress::{Bzip2, Decompressor, decompress};
pub use error::{AbortReason, ChainError, HandoffError};
pub use handoff::{Handoff, HandoffBuffer, HandoffReader};
pub use pipeline::{Pipeline, run_pipeline};
pub use tee::{TeeReader, tee};
pub use writer::{Destination, write_sequential};
