//! Pipeline coordinator.
//!
//! Wires the tee into the verifier (own thread) and the
//! decompress → write chain (calling thread), waits for both, and reconciles
//! them into one [`TransferResult`].
//!
//! ```text
//!             ┌──────────────► verifier ──► Verdict
//! source ─► tee
//!             └─► handoff ─► decompressor ─► writer ─► destination
//! ```

use std::fs::File;
use std::any::Any;
use std::io::{Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use flashline_verify::SignatureVerifier;
use tracing::{debug, error, info, info_span, warn};

use crate::data::{
    FailureReason, Outcome, PipelineOptions, Progress, TransferPhase, TransferResult, Verdict, WritePolicy,
};
use crate::decompress::{Bzip2, Decompressor};
use crate::error::{AbortReason, ChainError};
use crate::handoff::{AbortOnUnwind, HandoffBuffer, HandoffReader};
use crate::tee::tee;
use crate::verifier::{self, VerifierReport};
use crate::writer::{Destination, copy_sequential};

/// Coordinator state. `Succeeded` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PipelineState {
    Idle,
    Running,
    Succeeded,
    Failed(FailureReason),
}

impl PipelineState {
    pub(crate) fn is_terminal(&self) -> bool { matches!(self, PipelineState::Succeeded | PipelineState::Failed(_)) }
}

/// Where the decompress → write chain left the image.
enum Staged {
    Written,
    Spooled { spool: File, len: u64 },
}

/// A single-shot verified streaming transfer.
///
/// ```no_run
/// use flashline_pipeline::{Pipeline, PipelineOptions};
/// use flashline_verify::{Ed25519Verifier, PublicKey};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let key = PublicKey::parse(std::fs::read("release.pub")?.as_slice())?;
/// let signature = std::fs::read("image.bin.bz2.sig")?;
/// let source = std::fs::File::open("image.bin.bz2")?;
/// let mut device = std::fs::OpenOptions::new().write(true).open("/dev/sdz")?;
///
/// let result = Pipeline::new(PipelineOptions::default())
///     .run(source, &signature, Ed25519Verifier::new(key), &mut device);
/// println!("{:?}", result.outcome);
/// # Ok(())
/// # }
/// ```
pub struct Pipeline {
    options:      PipelineOptions,
    decompressor: Box<dyn Decompressor>,
    state:        PipelineState,
}

impl Pipeline {
    /// A pipeline decompressing bzip2.
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            options,
            decompressor: Box::new(Bzip2),
            state: PipelineState::Idle,
        }
    }

    pub fn with_decompressor<D: Decompressor + 'static>(mut self, decompressor: D) -> Self {
        self.decompressor = Box::new(decompressor);
        self
    }

    pub fn options(&self) -> &PipelineOptions { &self.options }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(!self.state.is_terminal(), "no transitions out of {:?}", self.state);
        debug!(from = ?self.state, to = ?next, "pipeline state");
        self.state = next;
    }

    /// Run the transfer to completion.
    ///
    /// Blocks until both the verifier and the decompress → write chain have
    /// stopped; no thread outlives this call. The destination receives data
    /// according to [`PipelineOptions::write_policy`].
    pub fn run<R, V, D>(mut self, source: R, signature: &[u8], verifier: V, destination: &mut D) -> TransferResult
    where
        R: std::io::Read + Send,
        V: SignatureVerifier,
        D: Destination + ?Sized,
    {
        let span = info_span!(
            "transfer",
            codec = self.decompressor.name(),
            capacity = self.options.handoff_capacity,
            policy = ?self.options.write_policy,
        );
        let _entered = span.enter();

        self.transition(PipelineState::Running);
        let handoff = HandoffBuffer::new(self.options.handoff_capacity);
        let (tee_reader, handoff_reader) = tee(source, &handoff);

        let mut written = 0u64;
        let mut decoded = 0u64;
        let verifier_span = span.clone();
        let (report, staged) = thread::scope(|scope| {
            let read_chunk_size = self.options.read_chunk_size;
            let handoff = &handoff;
            let verifier_thread = scope.spawn(move || {
                let _entered = verifier_span.entered();
                let _guard = AbortOnUnwind { handoff, path: "verifier" };
                verifier::verify(tee_reader, signature, verifier, handoff, read_chunk_size)
            });

            let staged = panic::catch_unwind(AssertUnwindSafe(|| {
                let _guard = AbortOnUnwind { handoff, path: "writer" };
                self.run_chain(handoff_reader, handoff, destination, &mut written, &mut decoded)
            }))
            .unwrap_or_else(|payload| {
                Err(fail(handoff, AbortReason::Internal(format!("writer path panicked: {}", panic_message(&*payload)))))
            });

            let report = verifier_thread.join().unwrap_or_else(|_| VerifierReport {
                verdict:    Verdict::Error("verifier thread panicked".to_string()),
                bytes_read: 0,
            });
            (report, staged)
        });

        self.options.report(Progress {
            phase:              TransferPhase::Verifying,
            bytes_decompressed: decoded,
            bytes_written:      written,
        });

        let failure = match (handoff.abort_reason(), &report.verdict) {
            (Some(reason), _) => Some(FailureReason::from(reason)),
            (None, Verdict::Valid) => None,
            (None, Verdict::Invalid) => Some(FailureReason::VerificationFailed),
            (None, Verdict::Error(cause)) => Some(FailureReason::VerifierError(cause.clone())),
        };

        let failure = match (failure, staged) {
            (None, Ok(Staged::Spooled { spool, len })) => {
                panic::catch_unwind(AssertUnwindSafe(|| self.commit(spool, len, destination, &mut written)))
                    .unwrap_or_else(|payload| {
                        Err(FailureReason::Internal(format!("commit panicked: {}", panic_message(&*payload))))
                    })
                    .err()
            }
            (failure, _) => failure,
        };

        self.finish(report, written, decoded, failure)
    }

    /// Decompress the handoff into the destination (eager) or a spool file.
    /// Errors abort the handoff; the recorded reason is the first one.
    /// `decoded` counts decompressed bytes wherever they went.
    fn run_chain<D: Destination + ?Sized>(
        &self,
        mut input: HandoffReader<'_>,
        handoff: &HandoffBuffer,
        destination: &mut D,
        written: &mut u64,
        decoded: &mut u64,
    ) -> Result<Staged, AbortReason> {
        match &self.options.write_policy {
            WritePolicy::Eager => {
                let copied = self.decode_into(&mut input, handoff, destination, written, true);
                *decoded = *written;
                copied.map(|()| Staged::Written)
            }
            WritePolicy::VerifyFirst { spool_dir } => {
                let spool = match spool_dir {
                    Some(dir) => tempfile::tempfile_in(dir),
                    None => tempfile::tempfile(),
                };
                let mut spool = spool.map_err(|e| fail(handoff, AbortReason::Write(format!("creating spool: {e}"))))?;
                self.decode_into(&mut input, handoff, &mut spool, decoded, false)?;
                Ok(Staged::Spooled { spool, len: *decoded })
            }
        }
    }

    fn decode_into<D: Destination + ?Sized>(
        &self,
        input: &mut HandoffReader<'_>,
        handoff: &HandoffBuffer,
        sink: &mut D,
        count: &mut u64,
        is_destination: bool,
    ) -> Result<(), AbortReason> {
        let decoder = self.decompressor.decoder(Box::new(&mut *input));
        let copied = copy_sequential(decoder, sink, self.options.write_chunk_size, count, |n| {
            self.options.report(Progress {
                phase:              TransferPhase::Streaming,
                bytes_decompressed: n,
                bytes_written:      if is_destination { n } else { 0 },
            });
        });

        let reason = match copied {
            Ok(()) => match input.expect_eof() {
                Ok(()) => return Ok(()),
                Err(e) => AbortReason::Decode(e.to_string()),
            },
            Err(ChainError::Decode(e)) => AbortReason::Decode(e.to_string()),
            Err(ChainError::Write(e)) => AbortReason::Write(e.to_string()),
        };
        Err(fail(handoff, reason))
    }

    /// Copy a verified spool onto the destination.
    fn commit<D: Destination + ?Sized>(
        &self,
        mut spool: File,
        len: u64,
        destination: &mut D,
        written: &mut u64,
    ) -> Result<(), FailureReason> {
        info!(bytes = len, "signature valid, committing spooled image");
        spool
            .seek(SeekFrom::Start(0))
            .map_err(|e| FailureReason::Write(format!("rewinding spool: {e}")))?;

        copy_sequential(spool, destination, self.options.write_chunk_size, written, |n| {
            self.options.report(Progress {
                phase:              TransferPhase::Committing,
                bytes_decompressed: len,
                bytes_written:      n,
            });
        })
        .map_err(|e| match e {
            ChainError::Decode(e) => FailureReason::Write(format!("reading spool: {e}")),
            ChainError::Write(e) => FailureReason::Write(e.to_string()),
        })
    }

    fn finish(
        mut self,
        report: VerifierReport,
        written: u64,
        decoded: u64,
        failure: Option<FailureReason>,
    ) -> TransferResult {
        let outcome = match failure {
            None => {
                info!(bytes_read = report.bytes_read, bytes_written = written, "transfer verified and written");
                self.transition(PipelineState::Succeeded);
                Outcome::Success
            }
            Some(reason) => {
                error!(%reason, verdict = %report.verdict, bytes_written = written, "transfer failed");
                if written > 0 {
                    warn!(
                        bytes_written = written,
                        "destination holds data from a transfer that was not verified; do not boot it"
                    );
                }
                self.transition(PipelineState::Failed(reason.clone()));
                Outcome::Aborted(reason)
            }
        };

        self.options.report(Progress {
            phase:              TransferPhase::Completed,
            bytes_decompressed: decoded,
            bytes_written:      written,
        });

        TransferResult {
            bytes_read: report.bytes_read,
            bytes_written: written,
            verdict: report.verdict,
            outcome,
        }
    }
}

/// Abort `handoff` with `reason` and return whichever reason won.
fn fail(handoff: &HandoffBuffer, reason: AbortReason) -> AbortReason {
    handoff.abort(reason.clone());
    handoff.abort_reason().unwrap_or(reason)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Run one verified streaming transfer with default options and the given
/// handoff capacity.
pub fn run_pipeline<R, V, D>(
    source: R,
    signature: &[u8],
    verifier: V,
    destination: &mut D,
    handoff_capacity: usize,
) -> TransferResult
where
    R: std::io::Read + Send,
    V: SignatureVerifier,
    D: Destination + ?Sized,
{
    Pipeline::new(PipelineOptions::default().handoff_capacity(handoff_capacity)).run(
        source,
        signature,
        verifier,
        destination,
    )
}
