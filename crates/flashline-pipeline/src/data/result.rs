use std::fmt;

use thiserror::Error;

use crate::error::AbortReason;

/// The verifier's judgment, produced once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid,
    Error(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool { matches!(self, Verdict::Valid) }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Valid => write!(f, "valid"),
            Verdict::Invalid => write!(f, "invalid"),
            Verdict::Error(cause) => write!(f, "error ({cause})"),
        }
    }
}

/// Which remediation a failure calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Re-download and re-verify; the artifact or its signature is not trusted.
    Verification,
    /// Check the network, the source or the destination device.
    Io,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("signature verification failed")]
    VerificationFailed,

    #[error("verifier error: {0}")]
    VerifierError(String),

    #[error("malformed signature: {0}")]
    SignatureMalformed(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl FailureReason {
    pub fn class(&self) -> FailureClass {
        match self {
            FailureReason::VerificationFailed
            | FailureReason::VerifierError(_)
            | FailureReason::SignatureMalformed(_) => FailureClass::Verification,
            FailureReason::Source(_)
            | FailureReason::Decode(_)
            | FailureReason::Write(_)
            | FailureReason::Internal(_) => FailureClass::Io,
        }
    }
}

impl From<AbortReason> for FailureReason {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::Source(cause) => FailureReason::Source(cause),
            AbortReason::SignatureMalformed(cause) => FailureReason::SignatureMalformed(cause),
            AbortReason::Decode(cause) => FailureReason::Decode(cause),
            AbortReason::Write(cause) => FailureReason::Write(cause),
            AbortReason::Internal(cause) => FailureReason::Internal(cause),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Aborted(FailureReason),
}

/// The terminal artifact of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferResult {
    /// Compressed bytes consumed from the source.
    pub bytes_read:    u64,
    /// Decompressed bytes that reached the destination.
    pub bytes_written: u64,
    pub verdict:       Verdict,
    pub outcome:       Outcome,
}

impl TransferResult {
    pub fn is_success(&self) -> bool { self.outcome == Outcome::Success }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            Outcome::Success => None,
            Outcome::Aborted(reason) => Some(reason),
        }
    }

    /// Bytes written on success, the failure otherwise.
    pub fn into_result(self) -> Result<u64, FailureReason> {
        match self.outcome {
            Outcome::Success => Ok(self.bytes_written),
            Outcome::Aborted(reason) => Err(reason),
        }
    }
}
