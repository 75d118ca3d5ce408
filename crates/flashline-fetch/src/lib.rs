//! Release retrieval for flashline: the source side of an install.
//!
//! # Architecture
//!
//! - [`data`] - options and release naming
//! - [`core`] - pure helpers (backoff, URL and status checks)
//! - [`effects`] - HTTP behind the [`HttpClient`] trait
//!
//! A [`SourceFetcher`] probes the image, buffers its detached signature and
//! opens the image body as a stream, in that order. The body is never
//! buffered; [`StreamReader`] turns it into a blocking `Read` for the
//! synchronous transfer pipeline.

pub mod core;
pub mod data;
pub mod effects;
mod error;

pub use crate::core::{is_ok, retry_delay, validate_url};
pub use data::{DEFAULT_MAX_SIGNATURE_SIZE, FetchOptions, ReleaseLocator, Timeouts};
#[cfg(feature = "reqwest")]
pub use effects::ReqwestClient;
pub use effects::{BoxStream, HeadResponse, HttpClient, ImageStream, ReleaseSource, Response, SourceFetcher, StreamReader};
pub use error::{FetchError, Result};
