//! The verifier path: drains its copy of the source through a signature check.

use std::io::{self, Read};

use flashline_verify::{SignatureVerifier, VerifiedReader, VerifyError};
use tracing::{debug, warn};

use crate::data::Verdict;
use crate::error::AbortReason;
use crate::handoff::HandoffBuffer;

/// What the verifier path hands back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VerifierReport {
    pub(crate) verdict:    Verdict,
    pub(crate) bytes_read: u64,
}

/// Check `signature` against everything `data` yields.
///
/// `data` is always drained to the end first. Then `handoff` is closed
/// whatever the verdict, so the decompressor sees end of data, unless the
/// signature blob is malformed, which aborts `handoff` with
/// [`AbortReason::SignatureMalformed`]. A read failure aborts `handoff`
/// instead (a no-op when the tee already did).
pub(crate) fn verify<R, V>(
    data: R,
    signature: &[u8],
    verifier: V,
    handoff: &HandoffBuffer,
    chunk_size: usize,
) -> VerifierReport
where
    R: Read,
    V: SignatureVerifier,
{
    let signature = verifier.parse_signature(signature);
    if let Err(e) = &signature {
        warn!(error = %e, "signature is malformed, transfer will abort once the source is drained");
    }

    let mut reader = VerifiedReader::new(data, verifier);
    let drained = drain(&mut reader, chunk_size);
    let bytes_read = reader.bytes_read();

    let verdict = match (drained, signature) {
        (Err(e), _) => {
            handoff.abort(AbortReason::Source(e.to_string()));
            debug!(error = %e, bytes_read, "verifier stopped reading");
            Verdict::Error(format!("reading image: {e}"))
        }
        (Ok(()), Err(e)) => {
            handoff.abort(AbortReason::SignatureMalformed(e.to_string()));
            Verdict::Error(e.to_string())
        }
        (Ok(()), Ok(signature)) => {
            handoff.close();
            match reader.finish_signature(&signature) {
                Ok(()) => Verdict::Valid,
                Err(VerifyError::BadSignature | VerifyError::Mismatch { .. }) => Verdict::Invalid,
                Err(e) => Verdict::Error(e.to_string()),
            }
        }
    };

    debug!(%verdict, bytes_read, "verifier finished");
    VerifierReport { verdict, bytes_read }
}

fn drain<R: Read>(reader: &mut R, chunk_size: usize) -> io::Result<()> {
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}
