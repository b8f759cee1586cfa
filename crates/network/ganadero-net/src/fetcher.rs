//! The network boundary: anything that turns a request into a response

use crate::error::{FetchError, FetchResult};
use async_trait::async_trait;
use ganadero_core::{Headers, Method, Request, Response};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Performs HTTP requests.
///
/// `Ok` means *some* HTTP response arrived, whatever its status. `Err` means
/// the network could not produce one.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform `request`. The URL must be absolute.
    async fn fetch(&self, request: &Request) -> FetchResult<Response>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: &Request) -> FetchResult<Response> {
        (**self).fetch(request).await
    }
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Whole-request deadline
    pub timeout: Duration,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("ganadero-worker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// [`Fetcher`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    config: HttpFetcherConfig,
}

impl HttpFetcher {
    /// Client with default settings
    pub fn new() -> FetchResult<Self> {
        Self::with_config(HttpFetcherConfig::default())
    }

    /// Client with explicit settings
    pub fn with_config(config: HttpFetcherConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| FetchError::NetworkUnavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn map_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.config.timeout)
        } else {
            FetchError::from(err)
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> FetchResult<Response> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", request.url)))?;

        let mut builder = self.client.request(to_reqwest_method(request.method), url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        trace!(method = %request.method, url = %request.url, "Sending request");
        let response = builder.send().await.map_err(|e| {
            let err = self.map_error(e);
            debug!(method = %request.method, url = %request.url, error = %err, "Request failed");
            metrics::counter!("ganadero_fetch_total", "outcome" => "error").increment(1);
            err
        })?;

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_ascii_lowercase(), value.to_owned()))
            })
            .collect();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;

        metrics::counter!("ganadero_fetch_total", "outcome" => "response").increment(1);
        debug!(method = %request.method, url = %request.url, status, "Received response");

        let mut snapshot = Response::new(status, body);
        snapshot.headers = headers;
        Ok(snapshot)
    }
}
