//! Configuration and naming types for release retrieval.

pub mod options;
pub mod release;

pub use options::{DEFAULT_MAX_SIGNATURE_SIZE, FetchOptions, Timeouts};
pub use release::ReleaseLocator;
