//! Network I/O behind the [`HttpClient`] seam.

mod fetcher;
mod http;
mod reader;

pub use fetcher::{ImageStream, ReleaseSource, SourceFetcher};
pub use http::{BoxStream, HeadResponse, HttpClient, Response};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use reader::StreamReader;
