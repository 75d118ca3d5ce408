use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a detached signature download.
pub const DEFAULT_MAX_SIGNATURE_SIZE: usize = 64 * 1024;

/// Transport timeouts handed to the HTTP client.
///
/// No whole-request timeout is applied: only a stalled connection is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to establish a connection.
    pub connect: Option<Duration>,
    /// Time allowed between two successful reads from the connection.
    pub read:    Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Some(Duration::from_secs(30)),
            read:    Some(Duration::from_secs(60)),
        }
    }
}

/// Configuration for release retrieval.
///
/// # Examples
///
/// ```
/// use flashline_fetch::FetchOptions;
/// use std::time::Duration;
///
/// let options = FetchOptions::default()
///     .max_retries(5)
///     .retry_backoff(Duration::from_millis(200))
///     .header("User-Agent", "flashline");
/// ```
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Retries after the first attempt for HEAD and signature requests.
    ///
    /// Only transport errors and 5xx answers are retried. The image stream
    /// is never retried since the pipeline consumes it as it arrives.
    ///
    /// Default: 3
    pub max_retries: u32,

    /// Base delay for exponential backoff; retry N waits `retry_backoff * 2^N`.
    ///
    /// Default: 100ms
    pub retry_backoff: Duration,

    /// Custom headers sent with every request.
    pub headers: Arc<[(String, String)]>,

    /// Signatures longer than this are rejected without being buffered.
    ///
    /// Default: 64 KiB
    pub max_signature_size: usize,

    pub timeouts: Timeouts,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_retries:        3,
            retry_backoff:      Duration::from_millis(100),
            headers:            Arc::new([]),
            max_signature_size: DEFAULT_MAX_SIGNATURE_SIZE,
            timeouts:           Timeouts::default(),
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Add a single custom HTTP header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut headers: Vec<_> = self.headers.iter().cloned().collect();
        headers.push((key.into(), value.into()));
        self.headers = Arc::from(headers);
        self
    }

    /// Replace all custom headers.
    #[must_use]
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = Arc::from(headers);
        self
    }

    #[must_use]
    pub fn max_signature_size(mut self, max_signature_size: usize) -> Self {
        self.max_signature_size = max_signature_size;
        self
    }

    #[must_use]
    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}
