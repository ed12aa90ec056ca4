//! Kraken REST API client implementation.

use std::sync::Arc;

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use url::Url;

use crate::auth::{ClockNonce, Credentials, NonceProvider, sign_request};
use crate::clock::{Clock, TokioClock};
use crate::error::KrakenError;
use crate::rate_limit::{RateLimiter, limits};
use crate::response::{ErrorPolicy, ResponseEnvelope, parse_envelope};
use crate::rest::endpoints::KRAKEN_BASE_URL;
use crate::rest::interceptor::{Interceptors, RequestInterceptor, ResponseInterceptor};
use crate::rest::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use crate::types::RateLimitTier;

const API_KEY_HEADER: &str = "api-key";
const API_SIGN_HEADER: &str = "api-sign";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Source of the two-factor password sent with private calls.
pub type TwoFactorProvider = Arc<dyn Fn() -> String + Send + Sync>;

/// The Kraken REST API client.
///
/// Every call goes through the same pipeline: rate-limit admission, request building,
/// signing (private calls only), one HTTP round trip, envelope parsing and classification
/// against the client's [`ErrorPolicy`]. Nothing is retried.
///
/// Cloning is cheap and clones share rate limiters and the private-call lock. Separately
/// built clients do not share the lock, so nonces sent under the same API key by two such
/// clients may reach Kraken out of order. Use one client (or its clones) per API key.
///
/// # Example
///
/// ```rust,no_run
/// use kraken_core::rest::KrakenClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = KrakenClient::new()?;
///     let time = client.get_server_time().await?;
///     println!("Server time: {}", time.unixtime);
///     Ok(())
/// }
/// ```
///
/// For private endpoints, provide credentials and the account's rate limit tier:
///
/// ```rust,no_run
/// use kraken_core::auth::Credentials;
/// use kraken_core::rest::KrakenClient;
/// use kraken_core::types::RateLimitTier;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = KrakenClient::builder()
///         .credentials(Credentials::from_env()?)
///         .rate_limit_tier(RateLimitTier::Tier3)
///         .build()?;
///
///     let balance = client.get_account_balance().await?;
///     println!("Balance: {:?}", balance);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct KrakenClient {
    transport: Arc<dyn Transport>,
    base_url: Url,
    credentials: Option<Arc<Credentials>>,
    nonce_provider: Arc<dyn NonceProvider>,
    two_factor: Option<TwoFactorProvider>,
    error_policy: ErrorPolicy,
    public_limiter: Arc<RateLimiter>,
    private_limiter: Arc<RateLimiter>,
    /// Held from nonce claim until the private request has been sent.
    private_lock: Arc<Mutex<()>>,
    interceptors: Interceptors,
}

impl KrakenClient {
    /// Create a new client with default settings.
    ///
    /// This client can only access public endpoints and does no rate limiting.
    /// Use [`KrakenClient::builder()`] to configure credentials and limits.
    pub fn new() -> Result<Self, KrakenError> {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> KrakenClientBuilder {
        KrakenClientBuilder::new()
    }

    /// The error policy applied to every response.
    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Send a public request.
    ///
    /// `args` is form-encoded; `None` values are left out of the body. `cost` is charged
    /// against the public rate limiter before anything is sent.
    pub async fn query_public<T, P>(
        &self,
        path: &str,
        args: &P,
        cost: u32,
    ) -> Result<ResponseEnvelope<T>, KrakenError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        tracing::debug!(path, cost, "dispatching public request");
        self.public_limiter.admit(cost).await;

        let body = serde_urlencoded::to_string(args)?;
        let request = self.build_request(path, HeaderMap::new(), body)?;
        let response = self.send(request).await?;

        self.classify(path, response)
    }

    /// Send a private (signed) request.
    ///
    /// A fresh nonce and, if configured, a two-factor password are prepended to `args`.
    /// Nonce claim and send are serialized across all clones of this client so nonces
    /// reach Kraken in increasing order.
    pub async fn query_private<T, P>(
        &self,
        path: &str,
        args: &P,
        cost: u32,
    ) -> Result<ResponseEnvelope<T>, KrakenError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(KrakenError::MissingCredentials)?;

        tracing::debug!(path, cost, "dispatching private request");
        self.private_limiter.admit(cost).await;

        let args = serde_urlencoded::to_string(args)?;

        let response = {
            let _guard = self.private_lock.lock().await;

            let nonce = self.nonce_provider.next_nonce();
            let otp = self.two_factor.as_ref().map(|provider| provider());
            let body = private_body(nonce, otp.as_deref(), &args)?;
            let signature = sign_request(credentials, path, nonce, &body)?;

            let mut headers = HeaderMap::new();
            headers.insert(API_KEY_HEADER, credentials.api_key_header().clone());
            headers.insert(
                API_SIGN_HEADER,
                HeaderValue::from_str(&signature)
                    .map_err(|e| KrakenError::Auth(format!("Invalid signature header: {e}")))?,
            );

            let request = self.build_request(path, headers, body)?;
            self.send(request).await?
        };

        self.classify(path, response)
    }

    fn build_request(
        &self,
        path: &str,
        mut headers: HeaderMap,
        body: String,
    ) -> Result<ApiRequest, KrakenError> {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        Ok(ApiRequest {
            method: Method::POST,
            url: self.base_url.join(path)?,
            headers,
            body,
        })
    }

    /// Run interceptors around exactly one transport call and reject non-2xx statuses.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, KrakenError> {
        let request = self.interceptors.on_request(request);
        let response = self.transport.send(request).await?;
        let response = self.interceptors.on_response(response);

        if !response.status.is_success() {
            return Err(KrakenError::HttpStatus {
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            });
        }
        Ok(response)
    }

    fn classify<T>(
        &self,
        path: &str,
        response: ApiResponse,
    ) -> Result<ResponseEnvelope<T>, KrakenError>
    where
        T: DeserializeOwned,
    {
        let envelope = parse_envelope::<T>(&response.body)?;
        if !envelope.errors.is_empty() {
            tracing::debug!(
                path,
                count = envelope.errors.len(),
                first = %envelope.errors[0],
                "response carries errors or warnings"
            );
        }
        envelope.classify(self.error_policy)
    }
}

/// `nonce=<n>[&otp=<otp>][&<args>]`
fn private_body(nonce: u64, otp: Option<&str>, args: &str) -> Result<String, KrakenError> {
    let mut body = format!("nonce={nonce}");
    if let Some(otp) = otp {
        body.push('&');
        body.push_str(&serde_urlencoded::to_string([("otp", otp)])?);
    }
    if !args.is_empty() {
        body.push('&');
        body.push_str(args);
    }
    Ok(body)
}

impl std::fmt::Debug for KrakenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (request_interceptors, response_interceptors) = self.interceptors.len();
        f.debug_struct("KrakenClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_credentials", &self.credentials.is_some())
            .field("error_policy", &self.error_policy)
            .field("public_limiter", &self.public_limiter)
            .field("private_limiter", &self.private_limiter)
            .field("request_interceptors", &request_interceptors)
            .field("response_interceptors", &response_interceptors)
            .finish()
    }
}

/// Builder for [`KrakenClient`].
pub struct KrakenClientBuilder {
    base_url: String,
    credentials: Option<Credentials>,
    nonce_provider: Option<Arc<dyn NonceProvider>>,
    two_factor: Option<TwoFactorProvider>,
    rate_limit_tier: RateLimitTier,
    clock: Option<Arc<dyn Clock>>,
    error_policy: ErrorPolicy,
    interceptors: Interceptors,
    transport: Option<Arc<dyn Transport>>,
    user_agent: Option<String>,
}

impl KrakenClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: KRAKEN_BASE_URL.to_string(),
            credentials: None,
            nonce_provider: None,
            two_factor: None,
            rate_limit_tier: RateLimitTier::None,
            clock: None,
            error_policy: ErrorPolicy::default(),
            interceptors: Interceptors::default(),
            transport: None,
            user_agent: None,
        }
    }

    /// Set the base URL (useful for testing with a mock server).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the credentials for authenticated requests.
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set a custom nonce provider.
    pub fn nonce_provider(mut self, provider: Arc<dyn NonceProvider>) -> Self {
        self.nonce_provider = Some(provider);
        self
    }

    /// Send a two-factor password with every private request.
    pub fn two_factor(mut self, provider: impl Fn() -> String + Send + Sync + 'static) -> Self {
        self.two_factor = Some(Arc::new(provider));
        self
    }

    /// Enable rate limiting for the account's tier.
    pub fn rate_limit_tier(mut self, tier: RateLimitTier) -> Self {
        self.rate_limit_tier = tier;
        self
    }

    /// Set the clock used for rate limiting.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Whether `E` entries fail the call (default: true).
    pub fn errors_as_failures(mut self, enabled: bool) -> Self {
        self.error_policy.errors_as_failures = enabled;
        self
    }

    /// Whether `W` entries fail the call (default: false).
    pub fn warnings_as_failures(mut self, enabled: bool) -> Self {
        self.error_policy.warnings_as_failures = enabled;
        self
    }

    /// Append a request interceptor.
    pub fn intercept_request(
        mut self,
        interceptor: impl Fn(ApiRequest) -> ApiRequest + Send + Sync + 'static,
    ) -> Self {
        let interceptor: RequestInterceptor = Arc::new(interceptor);
        self.interceptors.push_request(interceptor);
        self
    }

    /// Append a response interceptor.
    pub fn intercept_response(
        mut self,
        interceptor: impl Fn(ApiResponse) -> ApiResponse + Send + Sync + 'static,
    ) -> Self {
        let interceptor: ResponseInterceptor = Arc::new(interceptor);
        self.interceptors.push_response(interceptor);
        self
    }

    /// Replace the HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set a custom user agent for the default transport.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<KrakenClient, KrakenError> {
        let base_url = Url::parse(&self.base_url)?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let user_agent = self
                    .user_agent
                    .unwrap_or_else(|| format!("kraken-core/{}", env!("CARGO_PKG_VERSION")));
                Arc::new(HttpTransport::new(&user_agent)?)
            }
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(TokioClock));
        let private_policy = self.rate_limit_tier.policy();
        let public_policy = private_policy.map(|_| limits::PUBLIC);

        Ok(KrakenClient {
            transport,
            base_url,
            credentials: self.credentials.map(Arc::new),
            nonce_provider: self
                .nonce_provider
                .unwrap_or_else(|| Arc::new(ClockNonce)),
            two_factor: self.two_factor,
            error_policy: self.error_policy,
            public_limiter: Arc::new(RateLimiter::with_clock(public_policy, clock.clone())),
            private_limiter: Arc::new(RateLimiter::with_clock(private_policy, clock)),
            private_lock: Arc::new(Mutex::new(())),
            interceptors: self.interceptors,
        })
    }
}

impl Default for KrakenClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CounterNonce;
    use crate::clock::ManualClock;
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use futures_util::future::BoxFuture;
    use reqwest::StatusCode;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    /// Records requests on arrival and answers with a canned body.
    ///
    /// Each request is in flight for a while before it arrives. With `shrinking_delays`
    /// every call travels 10ms faster than the one before, so requests sent concurrently
    /// arrive in reverse order.
    #[derive(Default)]
    struct RecordingTransport {
        requests: StdMutex<Vec<ApiRequest>>,
        body: Vec<u8>,
        status: Option<StatusCode>,
        shrinking_delays: bool,
        calls: AtomicU64,
    }

    impl RecordingTransport {
        fn ok(body: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                body: serde_json::to_vec(&body).unwrap(),
                ..Default::default()
            })
        }

        fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse, KrakenError>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = if self.shrinking_delays {
                Duration::from_millis(40u64.saturating_sub(call * 10))
            } else {
                Duration::from_millis(5)
            };
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                self.requests.lock().unwrap().push(request);
                Ok(ApiResponse {
                    status: self.status.unwrap_or(StatusCode::OK),
                    headers: HeaderMap::new(),
                    body: self.body.clone(),
                })
            })
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("test_key", BASE64.encode("test_secret")).unwrap()
    }

    fn nonce_of(request: &ApiRequest) -> u64 {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(&request.body).unwrap();
        pairs
            .iter()
            .find(|(k, _)| k == "nonce")
            .and_then(|(_, v)| v.parse().ok())
            .unwrap()
    }

    #[test]
    fn test_private_body_layout() {
        assert_eq!(private_body(5, None, "").unwrap(), "nonce=5");
        assert_eq!(
            private_body(5, Some("123456"), "asset=ZUSD").unwrap(),
            "nonce=5&otp=123456&asset=ZUSD"
        );
    }

    #[tokio::test]
    async fn test_public_call_consumes_no_nonce() {
        let transport = RecordingTransport::ok(serde_json::json!({"error": [], "result": 1}));
        let nonces = Arc::new(CounterNonce::starting_at(1));
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .credentials(credentials())
            .nonce_provider(nonces.clone())
            .build()
            .unwrap();

        let envelope: ResponseEnvelope<u32> = client
            .query_public("/0/public/Time", &[("pair", Some("XBTUSD")), ("since", None)], 1)
            .await
            .unwrap();

        assert_eq!(envelope.result, Some(1));
        assert_eq!(nonces.next_nonce(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, "pair=XBTUSD");
        assert!(!requests[0].headers.contains_key(API_SIGN_HEADER));
    }

    #[tokio::test]
    async fn test_private_call_signs_and_consumes_one_nonce() {
        let transport = RecordingTransport::ok(serde_json::json!({"error": [], "result": 1}));
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .credentials(credentials())
            .nonce_provider(Arc::new(CounterNonce::starting_at(100)))
            .build()
            .unwrap();

        let _: ResponseEnvelope<u32> = client
            .query_private("/0/private/Balance", &[("asset", "ZUSD")], 1)
            .await
            .unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.body, "nonce=100&asset=ZUSD");
        assert_eq!(request.headers[API_KEY_HEADER], "test_key");

        let expected = sign_request(&credentials(), "/0/private/Balance", 100, &request.body).unwrap();
        assert_eq!(request.headers[API_SIGN_HEADER], expected.as_str());
    }

    #[tokio::test]
    async fn test_private_call_without_credentials() {
        let transport = RecordingTransport::ok(serde_json::json!({"error": [], "result": 1}));
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();

        let result: Result<ResponseEnvelope<u32>, _> =
            client.query_private("/0/private/Balance", &(), 1).await;

        assert!(matches!(result, Err(KrakenError::MissingCredentials)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_private_nonces_follow_issue_order() {
        let transport = Arc::new(RecordingTransport {
            body: br#"{"error":[],"result":1}"#.to_vec(),
            shrinking_delays: true,
            ..Default::default()
        });
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .credentials(credentials())
            .nonce_provider(Arc::new(CounterNonce::starting_at(1)))
            .build()
            .unwrap();

        let calls = (0..4).map(|_| {
            let client = client.clone();
            async move {
                client
                    .query_private::<u32, _>("/0/private/Balance", &(), 1)
                    .await
            }
        });
        for result in futures_util::future::join_all(calls).await {
            result.unwrap();
        }

        let sent: Vec<u64> = transport.requests().iter().map(nonce_of).collect();
        assert_eq!(sent, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_interceptors_see_signed_request() {
        let transport = RecordingTransport::ok(serde_json::json!({"error": [], "result": 1}));
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .credentials(credentials())
            .intercept_request(|mut request| {
                assert!(request.headers.contains_key(API_SIGN_HEADER));
                request
                    .headers
                    .insert("x-trace", HeaderValue::from_static("on"));
                request
            })
            .intercept_response(|mut response| {
                response.body = br#"{"error":[],"result":7}"#.to_vec();
                response
            })
            .build()
            .unwrap();

        let envelope: ResponseEnvelope<u32> = client
            .query_private("/0/private/Balance", &(), 1)
            .await
            .unwrap();

        assert_eq!(envelope.result, Some(7));
        assert_eq!(transport.requests()[0].headers["x-trace"], "on");
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_parsed() {
        let transport = Arc::new(RecordingTransport {
            body: b"upstream down".to_vec(),
            status: Some(StatusCode::BAD_GATEWAY),
            ..Default::default()
        });
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .build()
            .unwrap();

        let result = client.query_public::<u32, _>("/0/public/Time", &(), 1).await;

        match result {
            Err(KrakenError::HttpStatus { status, body }) => {
                assert_eq!(status, StatusCode::BAD_GATEWAY);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_tier_delays_private_calls() {
        let transport = RecordingTransport::ok(serde_json::json!({"error": [], "result": 1}));
        let clock = Arc::new(ManualClock::new());
        let client = KrakenClient::builder()
            .transport(transport.clone())
            .credentials(credentials())
            .rate_limit_tier(RateLimitTier::Tier2)
            .clock(clock.clone())
            .build()
            .unwrap();

        for _ in 0..15 {
            client
                .query_private::<u32, _>("/0/private/Balance", &(), 1)
                .await
                .unwrap();
        }
        assert_eq!(clock.elapsed(), Duration::ZERO);

        client
            .query_private::<u32, _>("/0/private/Balance", &(), 1)
            .await
            .unwrap();
        assert_eq!(clock.elapsed(), Duration::from_secs(3));

        // Public calls are metered separately.
        client
            .query_public::<u32, _>("/0/public/Time", &(), 1)
            .await
            .unwrap();
        assert_eq!(clock.elapsed(), Duration::from_secs(3));
    }
}
