use log::debug;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{CircleError, Result};

const TOKEN_HEADER: &str = "Circle-Token";
pub const DEFAULT_BASE_URL: &str = "https://circleci.com";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 8;

/// Everything needed to talk to one CircleCI instance.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub token: Option<Token>,
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

pub struct CircleCiClient {
    client: Client,
    api_url: Url,
    token: Option<Token>,
    semaphore: Arc<Semaphore>,
}

impl CircleCiClient {
    /// Builds a client for the v2 REST API under `settings.base_url`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` if the base URL cannot be parsed, or `Config`
    /// if the HTTP client cannot be constructed.
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("circlewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| CircleError::Config(format!("Failed to create HTTP client: {e}")))?;

        let mut base = settings.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        let api_url = Url::parse(&base)
            .map_err(|e| CircleError::InvalidEndpoint(format!("{}: {e}", settings.base_url)))?
            .join("api/v2/")
            .map_err(|e| CircleError::InvalidEndpoint(format!("Invalid API base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            token: settings.token,
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
        })
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    /// Resolves `path` against the API root and appends `query` pairs, URL-encoded.
    pub(super) fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .api_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CircleError::InvalidEndpoint(format!("{path}: {e}")))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url)
    }

    /// Performs an authenticated GET and returns the body of a 2xx response.
    pub(super) async fn get_bytes(&self, url: Url) -> Result<Vec<u8>> {
        let token = self.token.as_ref().ok_or(CircleError::NoCredential)?;

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| CircleError::Config("request limiter closed".into()))?;

        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .header(TOKEN_HEADER, token.as_str())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        debug!(
            "GET {} -> {} in {}ms",
            url.path(),
            status.as_u16(),
            started.elapsed().as_millis()
        );

        classify_status(status.as_u16())?;

        let body = response.bytes().await.map_err(classify_transport_error)?;
        Ok(body.to_vec())
    }

    pub(super) async fn get_json<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.endpoint(path, query)?;
        let body = self.get_bytes(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Maps an HTTP status code onto the error taxonomy. Any 2xx is success.
pub fn classify_status(code: u16) -> Result<()> {
    match code {
        200..=299 => Ok(()),
        401 => Err(CircleError::Unauthorized),
        429 => Err(CircleError::RateLimited),
        other => Err(CircleError::HttpError(other)),
    }
}

fn classify_transport_error(error: reqwest::Error) -> CircleError {
    if error.is_decode() || error.is_body() || is_malformed_http(&error) {
        CircleError::InvalidResponse(error.to_string())
    } else {
        CircleError::Network(error)
    }
}

/// The server answered, but not with well-formed HTTP.
fn is_malformed_http(error: &reqwest::Error) -> bool {
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        if let Some(hyper_error) = cause.downcast_ref::<hyper::Error>() {
            return hyper_error.is_parse() || hyper_error.is_incomplete_message();
        }
        source = cause.source();
    }
    false
}
