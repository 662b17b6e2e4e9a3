//! Remote call seam and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::debug;

use super::dispatch::{Method, RemoteRequest};

/// Why a remote call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The service answered outside the 2xx range.
    #[error("API error: {status} {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase, may be empty.
        reason: String,
    },
    /// The request URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Something that can deliver a resolved request to the service.
///
/// `Ok` means the service accepted the mutation.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Issues one call and waits for its outcome.
    async fn send(&self, request: &RemoteRequest) -> Result<(), RemoteError>;
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Service root that route paths are appended to.
    pub base_url: String,
    /// Per-request timeout.
    pub request_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_timeout_ms: 30_000,
        }
    }
}

/// [`RemoteClient`] over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    base_url: Url,
    client: Client,
}

impl HttpRemote {
    /// Builds a client for `config`.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(config.base_url.clone()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        Ok(Self { base_url, client })
    }

    /// Absolute URL for `request`; segments are percent-encoded.
    pub fn url_for(&self, request: &RemoteRequest) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(request.segments.iter());
        Ok(url)
    }
}

#[async_trait]
impl RemoteClient for HttpRemote {
    async fn send(&self, request: &RemoteRequest) -> Result<(), RemoteError> {
        let url = self.url_for(request)?;
        let mut builder = match request.method {
            Method::Post => self.client.post(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(
            method = %request.method,
            path = %request.path(),
            status = status.as_u16(),
            "remote call finished"
        );
        if status.is_success() {
            Ok(())
        } else {
            Err(RemoteError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(segments: &[&str]) -> RemoteRequest {
        RemoteRequest {
            method: Method::Patch,
            segments: segments.iter().map(|s| s.to_string()).collect(),
            body: None,
        }
    }

    #[test]
    fn url_appends_encoded_segments_to_base() {
        let remote = HttpRemote::new(&RemoteConfig::default()).unwrap();
        let url = remote.url_for(&request(&["journals", "a b/c"])).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/journals/a%20b%2Fc");
    }

    #[test]
    fn trailing_slash_in_base_is_tolerated() {
        let remote = HttpRemote::new(&RemoteConfig {
            base_url: "https://example.test/api/".to_string(),
            ..RemoteConfig::default()
        })
        .unwrap();
        let url = remote.url_for(&request(&["tasks"])).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/tasks");
    }

    #[test]
    fn rejects_unusable_base() {
        let err = HttpRemote::new(&RemoteConfig {
            base_url: "mailto:nobody@example.test".to_string(),
            ..RemoteConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, RemoteError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        let remote = HttpRemote::new(&RemoteConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            request_timeout_ms: 2_000,
        })
        .unwrap();
        let err = remote.send(&request(&["tasks", "1"])).await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }
}
