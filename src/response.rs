//! The `{error, result}` envelope wrapped around every Kraken response.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ApiErrors, ErrorString, KrakenError, Severity};

/// Which entry severities turn a response into a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPolicy {
    /// Fail when the response carries any `E` entry.
    pub errors_as_failures: bool,
    /// Fail when the response carries any `W` entry.
    pub warnings_as_failures: bool,
}

impl ErrorPolicy {
    /// Check whether an entry of the given severity fails the call.
    pub fn fails_on(&self, severity: Severity) -> bool {
        match severity {
            Severity::Error => self.errors_as_failures,
            Severity::Warning => self.warnings_as_failures,
        }
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            errors_as_failures: true,
            warnings_as_failures: false,
        }
    }
}

/// A parsed Kraken response.
///
/// `result` is always `None` when `errors` holds an entry of error severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    /// Errors and warnings, in the order Kraken sent them.
    #[serde(rename = "error")]
    pub errors: Vec<ErrorString>,
    /// The endpoint's payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> ResponseEnvelope<T> {
    /// Check whether any entry has error severity.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(ErrorString::is_error)
    }

    /// Entries of warning severity.
    pub fn warnings(&self) -> impl Iterator<Item = &ErrorString> {
        self.errors.iter().filter(|e| e.is_warning())
    }

    /// Apply an error policy.
    ///
    /// If any entry's severity is enabled in `policy`, the whole list is returned as
    /// [`KrakenError::Api`], not just the triggering entry.
    pub fn classify(self, policy: ErrorPolicy) -> Result<Self, KrakenError> {
        if self.errors.iter().any(|e| policy.fails_on(e.severity())) {
            return Err(KrakenError::Api(ApiErrors::new(self.errors)));
        }
        Ok(self)
    }

    /// Take the payload.
    ///
    /// A missing payload is reported through the carried entries when there are any.
    pub fn into_result(self) -> Result<T, KrakenError> {
        match self.result {
            Some(result) => Ok(result),
            None if !self.errors.is_empty() => Err(KrakenError::Api(ApiErrors::new(self.errors))),
            None => Err(KrakenError::MalformedEnvelope(
                "response missing 'result' field".to_string(),
            )),
        }
    }
}

/// Envelope as it comes off the wire, before error strings are validated.
#[derive(Deserialize)]
struct RawEnvelope<T> {
    error: Vec<String>,
    result: Option<T>,
}

/// Parse a response body into an envelope.
///
/// Fails with [`KrakenError::MalformedEnvelope`] when the body is not an envelope or has
/// neither errors nor a result, and with [`KrakenError::MalformedErrorString`] when an
/// entry of `error` breaks the error grammar.
pub fn parse_envelope<T>(body: &[u8]) -> Result<ResponseEnvelope<T>, KrakenError>
where
    T: DeserializeOwned,
{
    let raw: RawEnvelope<T> = serde_json::from_slice(body).map_err(|e| {
        KrakenError::MalformedEnvelope(format!(
            "{e}. Body: {}",
            String::from_utf8_lossy(body)
        ))
    })?;

    let errors = raw
        .error
        .into_iter()
        .map(ErrorString::parse)
        .collect::<Result<Vec<_>, _>>()?;

    if errors.is_empty() && raw.result.is_none() {
        return Err(KrakenError::MalformedEnvelope(
            "response has neither errors nor a result".to_string(),
        ));
    }

    let result = if errors.iter().any(ErrorString::is_error) {
        None
    } else {
        raw.result
    };

    Ok(ResponseEnvelope { errors, result })
}
