//! The HTTP round trip behind the dispatcher.

use futures_util::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_tracing::TracingMiddleware;
use url::Url;

use crate::error::KrakenError;

/// An outgoing request, fully built and (for private calls) signed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP method; Kraken REST calls are POSTs.
    pub method: Method,
    /// Absolute URL of the endpoint.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// URL-encoded form body.
    pub body: String,
}

impl ApiRequest {
    /// The URL path, e.g. `/0/private/Balance`.
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// A received response, before any envelope parsing.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw body.
    pub body: Vec<u8>,
}

/// Sends a request and returns the response.
///
/// Implementations perform exactly one round trip per call and must not retry.
pub trait Transport: Send + Sync {
    /// Perform the round trip.
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, KrakenError>>;
}

/// The default transport: `reqwest` with tracing middleware.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: ClientWithMiddleware,
}

impl HttpTransport {
    /// Create a transport sending the given `User-Agent`.
    pub fn new(user_agent: &str) -> Result<Self, KrakenError> {
        let mut headers = HeaderMap::new();
        let header_value = HeaderValue::from_str(user_agent)
            .map_err(|_| KrakenError::Config(format!("invalid user agent: {user_agent:?}")))?;
        headers.insert(USER_AGENT, header_value);

        let reqwest_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        // No retry middleware: a failed round trip is reported to the caller as is.
        let http_client = ClientBuilder::new(reqwest_client)
            .with(TracingMiddleware::default())
            .build();

        Ok(Self { http_client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, KrakenError>> {
        Box::pin(async move {
            let response = self
                .http_client
                .request(request.method, request.url)
                .headers(request.headers)
                .body(request.body)
                .send()
                .await?;

            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }
}
