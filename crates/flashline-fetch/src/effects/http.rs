use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Status line and length of a HEAD request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadResponse {
    pub status:         u16,
    pub content_length: Option<u64>,
}

/// A GET response whose body has not been read yet.
pub struct Response<E> {
    pub status:         u16,
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, Result<Bytes, E>>,
}

impl<E> std::fmt::Debug for Response<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Asynchronous HTTP client abstraction.
///
/// The minimal interface needed to retrieve a release: implementations
/// follow redirects and apply their own transport timeouts. Any status code
/// is a successful call; judging it is up to the caller.
///
/// # Implementations
///
/// - [`ReqwestClient`]: production implementation using `reqwest`
/// - in-memory mocks in tests
pub trait HttpClient: Send + Sync {
    /// Transport error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Issue a HEAD request.
    fn head(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<HeadResponse, Self::Error>> + Send;

    /// Issue a GET request and hand back the body as a stream.
    ///
    /// # Errors
    ///
    /// Connection-level failures only (DNS, refused, TLS). Body read
    /// failures surface as items of the returned stream.
    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response<Self::Error>, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use futures_util::StreamExt;

    use super::*;
    use crate::data::Timeouts;

    /// Production HTTP client implementation using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(timeouts: Timeouts) -> Result<Self, reqwest::Error> {
            let mut builder = reqwest::Client::builder().user_agent(concat!("flashline/", env!("CARGO_PKG_VERSION")));
            if let Some(connect) = timeouts.connect {
                builder = builder.connect_timeout(connect);
            }
            if let Some(read) = timeouts.read {
                builder = builder.read_timeout(read);
            }
            Ok(Self { client: builder.build()? })
        }

        fn request(&self, method: reqwest::Method, url: &str, headers: &[(String, String)]) -> reqwest::RequestBuilder {
            headers
                .iter()
                .fold(self.client.request(method, url), |request, (key, value)| request.header(key, value))
        }
    }

    impl HttpClient for ReqwestClient {
        type Error = reqwest::Error;

        async fn head(&self, url: &str, headers: &[(String, String)]) -> Result<HeadResponse, Self::Error> {
            let response = self.request(reqwest::Method::HEAD, url, headers).send().await?;
            let content_length = response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            Ok(HeadResponse {
                status: response.status().as_u16(),
                content_length,
            })
        }

        async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response<Self::Error>, Self::Error> {
            let response = self.request(reqwest::Method::GET, url, headers).send().await?;
            Ok(Response {
                status:         response.status().as_u16(),
                content_length: response.content_length(),
                body:           response.bytes_stream().boxed(),
            })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
