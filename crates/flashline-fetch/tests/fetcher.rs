use std::collections::HashMap;
use std::io::Read;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use flashline_fetch::{
    FetchError, FetchOptions, HeadResponse, HttpClient, ReleaseLocator, Response, SourceFetcher,
};
use futures_util::{StreamExt, stream};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct MockError(String);

#[derive(Clone, Default)]
struct Route {
    status:         u16,
    body:           Vec<u8>,
    advertise_len:  bool,
    /// Transport failures before the route starts answering.
    failures:       u32,
    /// Break the body stream after the first chunk.
    truncated_body: bool,
}

impl Route {
    fn ok(body: &[u8]) -> Self {
        Self {
            status: 200,
            body: body.to_vec(),
            advertise_len: true,
            ..Self::default()
        }
    }

    fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// In-memory mirror keyed by URL; unknown URLs answer 404.
#[derive(Default)]
struct MockClient {
    routes:   Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

impl MockClient {
    fn route(self, url: impl Into<String>, route: Route) -> Self {
        self.routes.lock().unwrap().insert(url.into(), route);
        self
    }

    fn requests(&self) -> Vec<String> { self.requests.lock().unwrap().clone() }

    fn answer(&self, method: &str, url: &str) -> Result<Route, MockError> {
        self.requests.lock().unwrap().push(format!("{method} {url}"));
        let mut routes = self.routes.lock().unwrap();
        let Some(route) = routes.get_mut(url) else {
            return Ok(Route::status(404));
        };
        if route.failures > 0 {
            route.failures -= 1;
            return Err(MockError("connection reset by peer".into()));
        }
        Ok(route.clone())
    }
}

impl HttpClient for MockClient {
    type Error = MockError;

    async fn head(&self, url: &str, _headers: &[(String, String)]) -> Result<HeadResponse, MockError> {
        let route = self.answer("HEAD", url)?;
        Ok(HeadResponse {
            status:         route.status,
            content_length: route.advertise_len.then_some(route.body.len() as u64),
        })
    }

    async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<Response<MockError>, MockError> {
        let route = self.answer("GET", url)?;
        let mut chunks: Vec<Result<Bytes, MockError>> =
            route.body.chunks(3).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
        if route.truncated_body {
            chunks.truncate(1);
            chunks.push(Err(MockError("unexpected end of body".into())));
        }
        Ok(Response {
            status:         route.status,
            content_length: route.advertise_len.then_some(route.body.len() as u64),
            body:           stream::iter(chunks).boxed(),
        })
    }
}

const IMAGE: &str = "http://mirror.test/amd64-usr/current/coreos_production_image.bin.bz2";
const SIG: &str = "http://mirror.test/amd64-usr/current/coreos_production_image.bin.bz2.sig";

fn locator() -> ReleaseLocator { ReleaseLocator::default().base_url("http://mirror.test/amd64-usr") }

fn fast_retries() -> FetchOptions { FetchOptions::default().retry_backoff(Duration::from_millis(1)) }

#[tokio::test]
async fn fetch_release_probes_then_signs_then_streams() {
    let image: Vec<u8> = (0..100u8).collect();
    let client = MockClient::default()
        .route(IMAGE, Route::ok(&image))
        .route(SIG, Route::ok(b"signature-bytes"));
    let fetcher = SourceFetcher::new(client, fast_retries());

    let release = fetcher.fetch_release(&locator()).await.unwrap();
    assert_eq!(release.signature, b"signature-bytes");
    assert_eq!(release.image.url, IMAGE);
    assert_eq!(release.image.content_length, Some(100));

    let body: Vec<Bytes> = release.image.body.map(|chunk| chunk.unwrap()).collect().await;
    assert_eq!(body.concat(), image);

    assert_eq!(fetcher.client().requests(), [format!("HEAD {IMAGE}"), format!("GET {SIG}"), format!("GET {IMAGE}")]);
}

#[tokio::test]
async fn missing_image_is_not_retried() {
    let fetcher = SourceFetcher::new(MockClient::default(), fast_retries());

    let err = fetcher.fetch_release(&locator()).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::Unavailable {
            url:    IMAGE.into(),
            status: 404,
        }
    );
    assert_eq!(fetcher.client().requests(), [format!("HEAD {IMAGE}")]);
}

#[tokio::test]
async fn missing_signature_stops_before_the_image() {
    let client = MockClient::default().route(IMAGE, Route::ok(b"image"));
    let fetcher = SourceFetcher::new(client, fast_retries());

    let err = fetcher.fetch_release(&locator()).await.unwrap_err();
    assert_eq!(
        err,
        FetchError::Unavailable {
            url:    SIG.into(),
            status: 404,
        }
    );
    assert!(!fetcher.client().requests().contains(&format!("GET {IMAGE}")));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let client = MockClient::default().route(
        IMAGE,
        Route {
            failures: 2,
            ..Route::ok(b"image")
        },
    );
    let fetcher = SourceFetcher::new(client, fast_retries());

    assert_eq!(fetcher.probe(IMAGE).await.unwrap(), Some(5));
    assert_eq!(fetcher.client().requests().len(), 3);
}

#[tokio::test]
async fn server_errors_exhaust_retries() {
    let client = MockClient::default().route(SIG, Route::status(503));
    let fetcher = SourceFetcher::new(client, fast_retries().max_retries(2));

    match fetcher.fetch_signature(SIG).await.unwrap_err() {
        FetchError::MaxRetriesExceeded { count, last } => {
            assert_eq!(count, 3);
            assert!(last.contains("503"), "{last}");
        }
        other => panic!("expected retries to run out, got {other:?}"),
    }
    assert_eq!(fetcher.client().requests().len(), 3);
}

#[tokio::test]
async fn zero_retries_reports_the_error_itself() {
    let client = MockClient::default().route(
        IMAGE,
        Route {
            failures: 1,
            ..Route::ok(b"image")
        },
    );
    let fetcher = SourceFetcher::new(client, fast_retries().max_retries(0));

    assert_eq!(
        fetcher.probe(IMAGE).await.unwrap_err(),
        FetchError::Network("connection reset by peer".into())
    );
}

#[tokio::test]
async fn oversized_signatures_are_rejected() {
    let big = vec![b'x'; 64];
    let client = MockClient::default()
        .route(SIG, Route::ok(&big))
        .route(
            IMAGE,
            Route {
                advertise_len: false,
                ..Route::ok(&big)
            },
        );
    let fetcher = SourceFetcher::new(client, fast_retries().max_signature_size(63));

    // Advertised length and streamed length are both checked.
    assert_eq!(fetcher.fetch_signature(SIG).await.unwrap_err(), FetchError::SignatureTooLarge { limit: 63 });
    assert_eq!(fetcher.fetch_signature(IMAGE).await.unwrap_err(), FetchError::SignatureTooLarge { limit: 63 });

    let fetcher = SourceFetcher::new(MockClient::default().route(SIG, Route::ok(&big)), FetchOptions::default().max_signature_size(64));
    assert_eq!(fetcher.fetch_signature(SIG).await.unwrap().len(), 64);
}

#[tokio::test]
async fn broken_signature_body_is_retried_as_network_error() {
    let client = MockClient::default().route(
        SIG,
        Route {
            truncated_body: true,
            ..Route::ok(b"0123456789")
        },
    );
    let fetcher = SourceFetcher::new(client, fast_retries().max_retries(1));

    assert!(matches!(
        fetcher.fetch_signature(SIG).await.unwrap_err(),
        FetchError::MaxRetriesExceeded { count: 2, .. }
    ));
}

#[tokio::test]
async fn image_open_is_never_retried() {
    let client = MockClient::default().route(IMAGE, Route::status(502));
    let fetcher = SourceFetcher::new(client, fast_retries());

    assert_eq!(
        fetcher.open_image(IMAGE).await.unwrap_err(),
        FetchError::Unavailable {
            url:    IMAGE.into(),
            status: 502,
        }
    );
    assert_eq!(fetcher.client().requests().len(), 1);
}

#[tokio::test]
async fn invalid_base_url_sends_nothing() {
    let fetcher = SourceFetcher::new(MockClient::default(), fast_retries());
    let locator = ReleaseLocator::default().base_url("mirror.test/amd64-usr");

    assert!(matches!(fetcher.fetch_release(&locator).await.unwrap_err(), FetchError::InvalidUrl(_)));
    assert!(fetcher.client().requests().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn image_reads_as_blocking_reader() {
    let image: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let client = MockClient::default().route(IMAGE, Route::ok(&image));
    let fetcher = SourceFetcher::new(client, fast_retries());

    let stream = fetcher.open_image(IMAGE).await.unwrap();
    let handle = tokio::runtime::Handle::current();
    let read = tokio::task::spawn_blocking(move || {
        let mut reader = stream.into_reader(handle);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).map(|_| out)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(read, image);
}

#[tokio::test(flavor = "multi_thread")]
async fn broken_image_body_surfaces_as_io_error() {
    let client = MockClient::default().route(
        IMAGE,
        Route {
            truncated_body: true,
            ..Route::ok(b"abcdefgh")
        },
    );
    let fetcher = SourceFetcher::new(client, fast_retries());

    let stream = fetcher.open_image(IMAGE).await.unwrap();
    let handle = tokio::runtime::Handle::current();
    let err = tokio::task::spawn_blocking(move || {
        let mut out = Vec::new();
        stream.into_reader(handle).read_to_end(&mut out).unwrap_err()
    })
    .await
    .unwrap();

    assert_eq!(err.to_string(), "unexpected end of body");
}
