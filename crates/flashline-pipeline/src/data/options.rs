use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default bound on bytes queued between the tee and the decompressor.
pub const DEFAULT_HANDOFF_CAPACITY: usize = 1 << 20;

/// Default size of each read the verifier issues against the source.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 << 10;

/// Default size of each write issued against the destination.
pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 1 << 20;

/// Phases of a transfer.
///
/// Streaming → Verifying → (Committing) → Completed. Committing only occurs
/// under [`WritePolicy::VerifyFirst`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferPhase {
    /// Source bytes are being teed, decompressed and written (or spooled).
    #[default]
    Streaming,

    /// The decompressed image is complete; waiting for the verdict.
    Verifying,

    /// The verdict was valid; the spooled image is being copied to the
    /// destination.
    Committing,

    /// Terminal, successful or not.
    Completed,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Streaming => write!(f, "Streaming"),
            TransferPhase::Verifying => write!(f, "Verifying"),
            TransferPhase::Committing => write!(f, "Committing"),
            TransferPhase::Completed => write!(f, "Completed"),
        }
    }
}

/// Progress snapshot handed to [`PipelineOptions::on_progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub phase:              TransferPhase,
    /// Decompressed bytes produced so far.
    pub bytes_decompressed: u64,
    /// Bytes committed to the destination so far.
    pub bytes_written:      u64,
}

/// When decompressed bytes reach the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// Write while the signature is still being checked. Nothing is buffered,
    /// but a failed verification leaves an unverified image on the
    /// destination (the failure is still reported).
    #[default]
    Eager,

    /// Spool the decompressed image to an anonymous temporary file and copy
    /// it to the destination only after the verdict is valid. Needs free
    /// space for the whole decompressed image in `spool_dir` (the system
    /// temporary directory when `None`).
    VerifyFirst { spool_dir: Option<PathBuf> },
}

/// Configuration for a pipeline run.
///
/// # Examples
///
/// ```
/// use flashline_pipeline::{PipelineOptions, WritePolicy};
///
/// let options = PipelineOptions::default()
///     .handoff_capacity(256 * 1024)
///     .write_policy(WritePolicy::VerifyFirst { spool_dir: None });
/// ```
#[derive(Clone)]
pub struct PipelineOptions {
    /// Bytes the tee may run ahead of the decompressor. Clamped to at least 1.
    ///
    /// Default: 1 MiB
    pub handoff_capacity: usize,

    /// Read size used by the verifier when pulling the source.
    ///
    /// Default: 64 KiB
    pub read_chunk_size: usize,

    /// Write size used against the destination.
    ///
    /// Default: 1 MiB
    pub write_chunk_size: usize,

    pub write_policy: WritePolicy,

    /// Invoked after every destination (or spool) write and on phase changes.
    /// Always called from the thread that called `run`.
    pub on_progress: Option<Arc<dyn Fn(&Progress) + Send + Sync>>,
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("handoff_capacity", &self.handoff_capacity)
            .field("read_chunk_size", &self.read_chunk_size)
            .field("write_chunk_size", &self.write_chunk_size)
            .field("write_policy", &self.write_policy)
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            handoff_capacity: DEFAULT_HANDOFF_CAPACITY,
            read_chunk_size:  DEFAULT_READ_CHUNK_SIZE,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
            write_policy:     WritePolicy::default(),
            on_progress:      None,
        }
    }
}

impl PipelineOptions {
    #[must_use]
    pub fn handoff_capacity(mut self, capacity: usize) -> Self {
        self.handoff_capacity = capacity.max(1);
        self
    }

    #[must_use]
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    #[must_use]
    pub fn write_chunk_size(mut self, size: usize) -> Self {
        self.write_chunk_size = size.max(1);
        self
    }

    #[must_use]
    pub fn write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    #[must_use]
    pub fn on_progress(mut self, on_progress: Arc<dyn Fn(&Progress) + Send + Sync>) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    pub(crate) fn report(&self, progress: Progress) {
        if let Some(ref callback) = self.on_progress {
            callback(&progress);
        }
    }
}
