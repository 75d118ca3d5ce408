//! Error types for flashline-pipeline.

use std::io;

use thiserror::Error;

/// Why the handoff between the verifier path and the decompress/write path
/// was torn down. The first reason recorded is the one a run reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbortReason {
    #[error("source read failed: {0}")]
    Source(String),

    #[error("malformed signature: {0}")]
    SignatureMalformed(String),

    #[error("decompression failed: {0}")]
    Decode(String),

    #[error("destination write failed: {0}")]
    Write(String),

    #[error("internal fault: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    #[error("handoff aborted: {0}")]
    Aborted(AbortReason),

    #[error("handoff already closed")]
    Closed,
}

impl From<HandoffError> for io::Error {
    fn from(e: HandoffError) -> Self { io::Error::new(io::ErrorKind::ConnectionAborted, e) }
}

/// Failure of the decompress → write chain.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("reading decompressed data: {0}")]
    Decode(#[source] io::Error),

    #[error("writing destination: {0}")]
    Write(#[source] io::Error),
}
