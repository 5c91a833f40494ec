//! HTTP fetch abstraction for tile downloads.
//!
//! [`HttpClient`] is the seam between the download pipeline and the network;
//! it is dyn-compatible so the pipeline can hold `Arc<dyn HttpClient>` and
//! tests can substitute scripted clients. [`ReqwestClient`] is the real
//! implementation; [`RelayClient`] routes requests through an intermediary
//! relay endpoint for deployments where the tile service cannot be reached
//! directly (cross-origin restrictions).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised by tile fetches.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Could not construct the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// Transport-level failure (connection refused, timeout, etc.).
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Async HTTP client seam.
pub trait HttpClient: Send + Sync {
    /// Performs a GET request and returns the response body bytes.
    ///
    /// A non-success status is an error, not a body.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Real HTTP client implementation using reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default 30s request timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            response
                .bytes()
                .await
                .map(|b| b.to_vec())
                .map_err(|e| FetchError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                })
        })
    }
}

/// Client decorator that forwards every request through a relay endpoint.
///
/// The relay receives the true tile URL as its query string, mirroring the
/// common `proxy?{url}` convention. The relay itself is an opaque external
/// collaborator; the rest of the core only sees "identity in, bytes out".
pub struct RelayClient {
    inner: Arc<dyn HttpClient>,
    endpoint: String,
}

impl RelayClient {
    /// Wraps `inner` so every fetch goes to `{endpoint}?{url}`.
    pub fn new(inner: Arc<dyn HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            inner,
            endpoint: endpoint.into(),
        }
    }

    fn relay_url(&self, url: &str) -> String {
        format!("{}?{}", self.endpoint, url)
    }
}

impl HttpClient for RelayClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        let relayed = self.relay_url(url);
        Box::pin(async move { self.inner.get(&relayed).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mock client recording requested URLs and replaying queued responses.
    struct MockClient {
        requests: Mutex<Vec<String>>,
        responses: Mutex<Vec<Result<Vec<u8>, FetchError>>>,
    }

    impl MockClient {
        fn new(responses: Vec<Result<Vec<u8>, FetchError>>) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responses: Mutex::new(responses),
            }
        }
    }

    impl HttpClient for MockClient {
        fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
            self.requests.lock().unwrap().push(url.to_string());
            let response = self.responses.lock().unwrap().remove(0);
            Box::pin(async move { response })
        }
    }

    #[tokio::test]
    async fn test_relay_client_rewrites_url() {
        let inner = Arc::new(MockClient::new(vec![Ok(vec![1, 2, 3])]));
        let relay = RelayClient::new(inner.clone(), "https://relay.example.com/proxy");

        let bytes = relay.get("https://tiles.example.com/svc/5/7/3").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        let requests = inner.requests.lock().unwrap();
        assert_eq!(
            requests.as_slice(),
            ["https://relay.example.com/proxy?https://tiles.example.com/svc/5/7/3"]
        );
    }

    #[tokio::test]
    async fn test_relay_client_propagates_errors() {
        let inner = Arc::new(MockClient::new(vec![Err(FetchError::Status {
            status: 404,
            url: "x".to_string(),
        })]));
        let relay = RelayClient::new(inner, "https://relay.example.com/proxy");

        let result = relay.get("https://tiles.example.com/svc/5/7/3").await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            status: 503,
            url: "https://tiles.example.com/svc/1/2/3".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("svc/1/2/3"));
    }
}
