use std::future::Future;
use std::io;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::http::{BoxStream, HttpClient};
use super::reader::StreamReader;
use crate::core::{is_ok, retry_delay, validate_url};
use crate::data::{FetchOptions, ReleaseLocator};
use crate::error::{FetchError, Result};

/// An open image download, not yet consumed.
pub struct ImageStream {
    pub url:            String,
    pub content_length: Option<u64>,
    pub body:           BoxStream<'static, io::Result<Bytes>>,
}

impl ImageStream {
    /// Blocking reader over the body; see [`StreamReader`] for where it may run.
    pub fn into_reader(self, handle: Handle) -> StreamReader { StreamReader::new(self.body, handle) }
}

impl std::fmt::Debug for ImageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageStream")
            .field("url", &self.url)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Everything the pipeline needs for one release: the buffered detached
/// signature and the still-unread image stream.
#[derive(Debug)]
pub struct ReleaseSource {
    pub signature: Vec<u8>,
    pub image:     ImageStream,
}

/// Retrieves release images and their signatures from a mirror.
pub struct SourceFetcher<C: HttpClient> {
    client:  C,
    options: FetchOptions,
}

impl<C: HttpClient> SourceFetcher<C> {
    pub fn new(client: C, options: FetchOptions) -> Self { Self { client, options } }

    pub fn options(&self) -> &FetchOptions { &self.options }

    pub fn client(&self) -> &C { &self.client }

    /// Check that `url` answers a HEAD with 200; returns its advertised length.
    pub async fn probe(&self, url: &str) -> Result<Option<u64>> {
        validate_url(url)?;
        self.with_retry("probe", url, || self.head_once(url)).await
    }

    /// Download a detached signature, bounded by `max_signature_size`.
    pub async fn fetch_signature(&self, url: &str) -> Result<Vec<u8>> {
        validate_url(url)?;
        self.with_retry("signature", url, || self.signature_once(url)).await
    }

    /// Start the image download. Never retried: once handed out, the stream
    /// is consumed as it arrives.
    pub async fn open_image(&self, url: &str) -> Result<ImageStream> {
        validate_url(url)?;
        let response = self.client.get(url, &self.options.headers).await.map_err(network)?;
        if !is_ok(response.status) {
            return Err(unavailable(url, response.status));
        }

        debug!(url, content_length = ?response.content_length, "image stream open");
        Ok(ImageStream {
            url:            url.to_string(),
            content_length: response.content_length,
            body:           response.body.map(|chunk| chunk.map_err(io::Error::other)).boxed(),
        })
    }

    /// Probe the image, download its signature, then open the image stream.
    pub async fn fetch_release(&self, locator: &ReleaseLocator) -> Result<ReleaseSource> {
        let image_url = locator.image_url();
        let signature_url = locator.signature_url();

        info!(url = %image_url, "checking image availability");
        let advertised = self.probe(&image_url).await?;

        info!(url = %signature_url, "downloading signature");
        let signature = self.fetch_signature(&signature_url).await?;

        info!(url = %image_url, bytes = ?advertised, "downloading image");
        let mut image = self.open_image(&image_url).await?;
        image.content_length = image.content_length.or(advertised);

        Ok(ReleaseSource { signature, image })
    }

    async fn head_once(&self, url: &str) -> Result<Option<u64>> {
        let head = self.client.head(url, &self.options.headers).await.map_err(network)?;
        if !is_ok(head.status) {
            return Err(unavailable(url, head.status));
        }
        Ok(head.content_length)
    }

    async fn signature_once(&self, url: &str) -> Result<Vec<u8>> {
        let limit = self.options.max_signature_size;
        let too_large = || FetchError::SignatureTooLarge { limit };

        let response = self.client.get(url, &self.options.headers).await.map_err(network)?;
        if !is_ok(response.status) {
            return Err(unavailable(url, response.status));
        }
        if response.content_length.is_some_and(|len| len > limit as u64) {
            return Err(too_large());
        }

        let mut body = response.body;
        let mut signature = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(network)?;
            if signature.len() + chunk.len() > limit {
                return Err(too_large());
            }
            signature.extend_from_slice(&chunk);
        }
        Ok(signature)
    }

    /// Run `attempt` until it succeeds, fails for good, or retries run out.
    async fn with_retry<T, F, Fut>(&self, what: &'static str, url: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0;
        loop {
            let err = match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() || self.options.max_retries == 0 {
                return Err(err);
            }
            if retries == self.options.max_retries {
                return Err(FetchError::MaxRetriesExceeded {
                    count: retries + 1,
                    last:  err.to_string(),
                });
            }

            let delay = retry_delay(retries, self.options.retry_backoff);
            retries += 1;
            warn!(what, url, error = %err, retry = retries, ?delay, "request failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

fn network(e: impl std::error::Error) -> FetchError { FetchError::Network(e.to_string()) }

fn unavailable(url: &str, status: u16) -> FetchError {
    FetchError::Unavailable {
        url: url.to_string(),
        status,
    }
}
