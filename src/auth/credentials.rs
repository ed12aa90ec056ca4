//! Credential management for Kraken API authentication.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretSlice};

use crate::error::KrakenError;

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "KRAKEN_API_KEY";
/// Environment variable holding the base64 API secret.
pub const API_SECRET_VAR: &str = "KRAKEN_API_SECRET";

/// API credentials containing the key and the decoded secret.
///
/// The secret is decoded from base64 once, when the credentials are created, so a bad
/// secret is reported here instead of on the first private call.
pub struct Credentials {
    api_key: HeaderValue,
    api_secret: SecretSlice<u8>,
}

impl Credentials {
    /// Create credentials from an API key and its base64-encoded secret.
    pub fn new(api_key: impl AsRef<str>, api_secret: impl AsRef<str>) -> Result<Self, KrakenError> {
        let mut api_key = HeaderValue::from_str(api_key.as_ref())
            .map_err(|_| KrakenError::Auth("API key is not a valid header value.".to_string()))?;
        api_key.set_sensitive(true);

        let decoded = BASE64
            .decode(api_secret.as_ref().trim())
            .map_err(|_| KrakenError::Auth("API secret must be valid base64.".to_string()))?;
        if decoded.is_empty() {
            return Err(KrakenError::Auth("API secret must not be empty.".to_string()));
        }

        Ok(Self {
            api_key,
            api_secret: SecretSlice::from(decoded),
        })
    }

    /// Read credentials from `KRAKEN_API_KEY` and `KRAKEN_API_SECRET`.
    pub fn from_env() -> Result<Self, KrakenError> {
        Self::from_env_vars(API_KEY_VAR, API_SECRET_VAR)
    }

    /// Read credentials from custom environment variable names.
    pub fn from_env_vars(key_var: &str, secret_var: &str) -> Result<Self, KrakenError> {
        let read = |var: &str| {
            std::env::var(var)
                .map_err(|_| KrakenError::Auth(format!("Environment variable {var} not set")))
        };
        Self::new(read(key_var)?, read(secret_var)?)
    }

    /// The API key as sent in the `API-Key` header.
    pub fn api_key_header(&self) -> &HeaderValue {
        &self.api_key
    }

    /// The decoded signing secret.
    ///
    /// This method exposes the secret - use carefully.
    pub(crate) fn secret(&self) -> &[u8] {
        self.api_secret.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.to_str().unwrap_or("[INVALID]"))
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}
