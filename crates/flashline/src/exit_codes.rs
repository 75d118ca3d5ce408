//! Process exit codes. Scripts rely on these: 1 means check the network or
//! the device and retry, 2 means the image must not be trusted.

use flashline_pipeline::{FailureClass, TransferResult};
use flashline_verify::VerifyError;

pub const SUCCESS: u8 = 0;
pub const IO_FAILURE: u8 = 1;
pub const VERIFICATION_FAILURE: u8 = 2;

pub fn for_result(result: &TransferResult) -> u8 {
    match result.failure().map(|reason| reason.class()) {
        None => SUCCESS,
        Some(FailureClass::Io) => IO_FAILURE,
        Some(FailureClass::Verification) => VERIFICATION_FAILURE,
    }
}

/// Setup failures: bad keys or signatures are verification problems,
/// everything else (config, network, device) is I/O.
pub fn for_error(err: &anyhow::Error) -> u8 {
    if err.chain().any(|cause| cause.downcast_ref::<VerifyError>().is_some()) {
        VERIFICATION_FAILURE
    } else {
        IO_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use flashline_pipeline::{FailureReason, Outcome, Verdict};

    fn result(outcome: Outcome) -> TransferResult {
        TransferResult {
            bytes_read: 0,
            bytes_written: 0,
            verdict: Verdict::Invalid,
            outcome,
        }
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(for_result(&result(Outcome::Success)), SUCCESS);
        assert_eq!(
            for_result(&result(Outcome::Aborted(FailureReason::VerificationFailed))),
            VERIFICATION_FAILURE
        );
        assert_eq!(
            for_result(&result(Outcome::Aborted(FailureReason::Decode("bad block".into())))),
            IO_FAILURE
        );
    }

    #[test]
    fn test_error_codes() {
        let key: anyhow::Result<()> = Err(VerifyError::KeyMalformed("short".into())).context("loading key");
        assert_eq!(for_error(&key.unwrap_err()), VERIFICATION_FAILURE);

        let io = anyhow::anyhow!("device busy");
        assert_eq!(for_error(&io), IO_FAILURE);
    }
}
