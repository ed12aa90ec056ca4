//! Error types for the Kraken client library.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for all Kraken client operations.
#[derive(Error, Debug)]
pub enum KrakenError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request with middleware failed
    #[error("HTTP request failed: {0}")]
    HttpMiddleware(#[from] reqwest_middleware::Error),

    /// The server answered with a non-success HTTP status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code of the response
        status: reqwest::StatusCode,
        /// Raw response body, lossily decoded
        body: String,
    },

    /// The response body is not a valid `{error, result}` envelope
    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    /// An entry of the envelope's `error` array does not follow the Kraken error grammar
    #[error("Malformed error string: {0}")]
    MalformedErrorString(#[from] ErrorStringParseError),

    /// Kraken API returned errors or warnings that the error policy treats as failures
    #[error("Kraken API error: {0}")]
    Api(ApiErrors),

    /// Request arguments could not be form-encoded
    #[error("Failed to encode request arguments: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    /// URL parsing error
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Missing required credentials
    #[error("Missing credentials: API key and secret required for private endpoints")]
    MissingCredentials,
}

impl KrakenError {
    /// The API errors carried by this failure, if it is an API-level failure.
    pub fn api_errors(&self) -> Option<&ApiErrors> {
        match self {
            KrakenError::Api(errors) => Some(errors),
            _ => None,
        }
    }
}

/// Severity prefix of a Kraken error string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// `E` prefix
    Error,
    /// `W` prefix
    Warning,
}

impl Severity {
    /// Wire character for an error.
    pub const ERROR_CODE: char = 'E';
    /// Wire character for a warning.
    pub const WARNING_CODE: char = 'W';

    /// Parse a severity from its wire character.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            Self::ERROR_CODE => Some(Severity::Error),
            Self::WARNING_CODE => Some(Severity::Warning),
            _ => None,
        }
    }

    /// The wire character of this severity.
    pub fn code(&self) -> char {
        match self {
            Severity::Error => Self::ERROR_CODE,
            Severity::Warning => Self::WARNING_CODE,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// Reason an error string was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} in {raw:?}")]
pub struct ErrorStringParseError {
    /// The offending string as received
    pub raw: String,
    /// What was wrong with it
    pub reason: &'static str,
}

/// An error or warning string returned by Kraken.
///
/// The wire grammar is `Severity Category ':' Type [ ':' ExtraInfo ]`, for example
/// `EGeneral:Invalid arguments:volume`. Category and type are free text so that categories
/// Kraken adds later still parse; only the delimiters and the severity prefix are enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ErrorString {
    raw: String,
    severity: Severity,
    // Byte ranges into `raw`.
    category: (usize, usize),
    error_type: (usize, usize),
    extra_info: Option<(usize, usize)>,
}

impl ErrorString {
    /// Parse a raw error string.
    pub fn parse(raw: impl Into<String>) -> Result<Self, ErrorStringParseError> {
        let raw = raw.into();
        let reject = |raw: String, reason| Err(ErrorStringParseError { raw, reason });

        let Some(severity) = raw.chars().next().and_then(Severity::from_code) else {
            return reject(raw, "severity must be 'E' or 'W'");
        };

        // Severity codes are ASCII, so the remainder starts at byte 1.
        let mut ranges = Vec::with_capacity(3);
        let mut start = 1;
        for part in raw[1..].split(':') {
            ranges.push((start, start + part.len()));
            start += part.len() + 1;
        }
        if ranges.iter().any(|(start, end)| start == end) {
            return reject(raw, "empty category, type or extra info");
        }

        match ranges.as_slice() {
            [category, error_type] => Ok(Self {
                severity,
                category: *category,
                error_type: *error_type,
                extra_info: None,
                raw,
            }),
            [category, error_type, extra] => Ok(Self {
                severity,
                category: *category,
                error_type: *error_type,
                extra_info: Some(*extra),
                raw,
            }),
            _ => reject(raw, "expected two or three ':'-separated parts"),
        }
    }

    /// Check whether a string follows the error grammar.
    pub fn is_valid(raw: &str) -> bool {
        Self::parse(raw).is_ok()
    }

    /// The raw string as received.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Severity of the entry.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Error category, e.g. `General` or `Order`.
    pub fn category(&self) -> &str {
        &self.raw[self.category.0..self.category.1]
    }

    /// Error type, e.g. `Invalid arguments`.
    pub fn error_type(&self) -> &str {
        &self.raw[self.error_type.0..self.error_type.1]
    }

    /// Optional extra information, e.g. the offending argument name.
    pub fn extra_info(&self) -> Option<&str> {
        self.extra_info.map(|(start, end)| &self.raw[start..end])
    }

    /// Everything up to the extra info, comparable with [`error_codes`] entries.
    fn code(&self) -> &str {
        &self.raw[..self.error_type.1]
    }

    /// Check if this entry has error severity.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Check if this entry has warning severity.
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Check if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self.category(), category::API | category::ORDER)
            && self.error_type().contains("Rate limit")
    }

    /// Check if this is an invalid nonce error.
    pub fn is_invalid_nonce(&self) -> bool {
        self.code() == error_codes::INVALID_NONCE
    }

    /// Check if this is an invalid key error.
    pub fn is_invalid_key(&self) -> bool {
        self.code() == error_codes::INVALID_KEY
    }

    /// Check if this is an invalid signature error.
    pub fn is_invalid_signature(&self) -> bool {
        self.code() == error_codes::INVALID_SIGNATURE
    }

    /// Check if this is a permission denied error.
    pub fn is_permission_denied(&self) -> bool {
        self.code() == error_codes::PERMISSION_DENIED
    }

    /// Check if this is a service unavailable error.
    pub fn is_service_unavailable(&self) -> bool {
        self.category() == category::SERVICE
            && matches!(self.error_type(), "Unavailable" | "Busy")
    }
}

impl FromStr for ErrorString {
    type Err = ErrorStringParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ErrorString {
    type Error = ErrorStringParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ErrorString> for String {
    fn from(value: ErrorString) -> Self {
        value.raw
    }
}

impl fmt::Display for ErrorString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The complete, ordered list of entries from a response that failed the error policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiErrors(Vec<ErrorString>);

impl ApiErrors {
    /// Wrap a list of parsed entries.
    pub fn new(errors: Vec<ErrorString>) -> Self {
        Self(errors)
    }

    /// All entries, in the order Kraken returned them.
    pub fn errors(&self) -> &[ErrorString] {
        &self.0
    }

    /// The first entry.
    pub fn first(&self) -> Option<&ErrorString> {
        self.0.first()
    }

    /// Consume into the underlying list.
    pub fn into_inner(self) -> Vec<ErrorString> {
        self.0
    }

    /// Check if any entry reports an invalid nonce.
    pub fn has_invalid_nonce(&self) -> bool {
        self.0.iter().any(ErrorString::is_invalid_nonce)
    }

    /// Check if any entry reports a rate limit violation.
    pub fn is_rate_limit(&self) -> bool {
        self.0.iter().any(ErrorString::is_rate_limit)
    }
}

impl fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

/// Known error categories. Kraken may return others.
pub mod category {
    pub const GENERAL: &str = "General";
    pub const API: &str = "API";
    pub const ORDER: &str = "Order";
    pub const QUERY: &str = "Query";
    pub const SERVICE: &str = "Service";
    pub const TRADE: &str = "Trade";
    pub const FUNDING: &str = "Funding";
    pub const AUTH: &str = "Auth";
    pub const SESSION: &str = "Session";
}

/// Known Kraken error codes for pattern matching.
pub mod error_codes {
    /// General errors
    pub const INVALID_ARGUMENTS: &str = "EGeneral:Invalid arguments";
    pub const PERMISSION_DENIED: &str = "EGeneral:Permission denied";
    pub const UNKNOWN_METHOD: &str = "EGeneral:Unknown method";
    pub const INTERNAL_ERROR: &str = "EGeneral:Internal error";

    /// API errors
    pub const INVALID_KEY: &str = "EAPI:Invalid key";
    pub const INVALID_SIGNATURE: &str = "EAPI:Invalid signature";
    pub const INVALID_NONCE: &str = "EAPI:Invalid nonce";
    pub const RATE_LIMIT_EXCEEDED: &str = "EAPI:Rate limit exceeded";

    /// Order errors
    pub const ORDER_RATE_LIMIT: &str = "EOrder:Rate limit exceeded";
    pub const INSUFFICIENT_FUNDS: &str = "EOrder:Insufficient funds";

    /// Service errors
    pub const SERVICE_UNAVAILABLE: &str = "EService:Unavailable";
    pub const SERVICE_BUSY: &str = "EService:Busy";

    /// Query errors
    pub const UNKNOWN_ASSET_PAIR: &str = "EQuery:Unknown asset pair";
    pub const UNKNOWN_ASSET: &str = "EQuery:Unknown asset";
}
