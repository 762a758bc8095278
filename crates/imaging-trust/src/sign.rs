//! Signing service round trip
//!
//! A [`SignRequest`] carrying the content hash, the device MAC addresses, the
//! requested resource path and the trust seed is POSTed as JSON to the signing
//! endpoint. The answer is accepted only if every check passes, in order:
//!
//! 1. the transport delivered a response
//! 2. the HTTP status is exactly 200
//! 3. the body parses as a [`SignResponse`]
//! 4. `Status` is `"Success"`
//! 5. `SignedURL` equals the submitted hash, byte for byte
//!
//! There are no retries here; a failed call is reported once and the caller
//! decides what to do next.

use crate::seed::Seed;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Connection-level failure of the HTTP transport
///
/// An empty `url` marks a failure to set up the client itself, before any
/// request was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    /// Target URL
    pub url: String,
    /// Transport-specific description
    pub reason: String,
}

impl TransportError {
    /// Create a transport error for a request to `url`
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error for a client that could not be built
    pub fn client_setup(reason: impl Into<String>) -> Self {
        Self::new("", reason)
    }

    /// Whether the client failed before any request was sent
    pub fn is_client_setup(&self) -> bool {
        self.url.is_empty()
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_client_setup() {
            write!(f, "failed to build HTTP client: {}", self.reason)
        } else {
            write!(f, "request to {} failed: {}", self.url, self.reason)
        }
    }
}

impl std::error::Error for TransportError {}

/// Raw HTTP answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Blocking HTTP POST
pub trait HttpTransport: Send + Sync {
    /// POST a JSON `body` to `url`
    ///
    /// Non-2xx statuses are not errors at this layer; only failing to obtain a
    /// response at all is.
    fn post(&self, url: &str, body: &[u8]) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] over `reqwest::blocking`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// Build a client with the given request timeout
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialised.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::client_setup(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post(&self, url: &str, body: &[u8]) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .map_err(|e| TransportError::new(url, e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError::new(url, format!("failed to read body: {e}")))?;

        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Body POSTed to the signing endpoint
///
/// Fields serialize in lexicographic order. `Seed` and `Signature` are the
/// seed file's own fields, placed at the top level of the body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignRequest {
    /// Content hash of the install media
    #[serde(rename = "Hash")]
    pub hash: String,
    /// Device MAC addresses
    #[serde(rename = "Mac")]
    pub mac: Vec<String>,
    /// Resource being requested
    #[serde(rename = "Path")]
    pub path: String,
    /// Seed object from the seed file
    #[serde(rename = "Seed")]
    pub seed: serde_json::Value,
    /// Seed signature
    #[serde(rename = "Signature")]
    pub signature: String,
}

impl SignRequest {
    /// Assemble a request from its parts, consuming the seed
    pub fn new(
        hash: impl Into<String>,
        mac: Vec<String>,
        path: impl Into<String>,
        seed: Seed,
    ) -> Self {
        Self {
            hash: hash.into(),
            mac,
            path: path.into(),
            seed: seed.seed,
            signature: seed.signature,
        }
    }
}

/// `Status` field of a [`SignResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignStatus {
    /// The service signed the request
    Success,
    /// The service refused the request
    Failed,
    /// Any other status string
    Other(String),
}

impl From<String> for SignStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Success" => Self::Success,
            "Failed" => Self::Failed,
            _ => Self::Other(value),
        }
    }
}

impl From<SignStatus> for String {
    fn from(value: SignStatus) -> Self {
        match value {
            SignStatus::Success => "Success".to_string(),
            SignStatus::Failed => "Failed".to_string(),
            SignStatus::Other(other) => other,
        }
    }
}

impl std::fmt::Display for SignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::Failed => f.write_str("Failed"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Answer from the signing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResponse {
    /// Outcome reported by the service
    #[serde(rename = "Status")]
    pub status: SignStatus,
    /// Service error code, 0 on success
    #[serde(rename = "ErrorCode", default)]
    pub error_code: i64,
    /// Hash echoed back by the service
    #[serde(rename = "SignedURL", default)]
    pub signed_url: String,
    /// Resource path echoed back by the service
    #[serde(rename = "Path", default)]
    pub path: String,
}

/// Signing failures, one variant per validation step
#[derive(Error, Debug)]
pub enum SignError {
    /// The request body could not be encoded
    #[error("failed to encode sign request: {0}")]
    Encode(#[source] serde_json::Error),

    /// No response was obtained
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The service answered with a status other than 200
    #[error("sign endpoint returned HTTP {status}")]
    BadStatus {
        /// HTTP status code
        status: u16,
    },

    /// The body is not a valid sign response
    #[error("malformed sign response: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// The service reported a failure
    #[error("sign endpoint rejected the request: status {status}, error code {error_code}")]
    RemoteRejected {
        /// Reported status
        status: SignStatus,
        /// Reported error code
        error_code: i64,
    },

    /// The echoed hash differs from the submitted one
    #[error("signed hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hash that was submitted
        expected: String,
        /// Hash the service returned
        actual: String,
    },
}

impl SignError {
    /// Whether the failure happened before any response was received
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Performs one signing round trip
#[derive(Clone)]
pub struct SignRequestClient {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for SignRequestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignRequestClient").finish_non_exhaustive()
    }
}

impl SignRequestClient {
    /// Create a client over `transport`
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Submit `request` to `endpoint` and return the verified hash
    ///
    /// # Errors
    ///
    /// Returns the [`SignError`] of the first validation step that fails.
    pub fn sign(&self, request: &SignRequest, endpoint: &str) -> Result<String, SignError> {
        let body = serde_json::to_vec(request).map_err(SignError::Encode)?;
        debug!(endpoint, path = %request.path, macs = request.mac.len(), "Sending sign request");

        let response = self.transport.post(endpoint, &body).map_err(|e| {
            warn!(endpoint, error = %e, "Sign request transport failure");
            SignError::Transport(e)
        })?;

        if response.status != 200 {
            warn!(endpoint, status = response.status, "Sign endpoint returned non-200 status");
            return Err(SignError::BadStatus {
                status: response.status,
            });
        }

        let parsed: SignResponse = serde_json::from_slice(&response.body).map_err(|e| {
            warn!(endpoint, error = %e, "Sign endpoint returned a malformed response");
            SignError::MalformedResponse(e)
        })?;

        if parsed.status != SignStatus::Success {
            warn!(
                endpoint,
                status = %parsed.status,
                error_code = parsed.error_code,
                "Sign endpoint rejected request"
            );
            return Err(SignError::RemoteRejected {
                status: parsed.status,
                error_code: parsed.error_code,
            });
        }

        let matches: bool = parsed
            .signed_url
            .as_bytes()
            .ct_eq(request.hash.as_bytes())
            .into();
        if !matches {
            warn!(endpoint, "Signed hash does not match submitted hash");
            return Err(SignError::HashMismatch {
                expected: request.hash.clone(),
                actual: parsed.signed_url,
            });
        }

        info!(endpoint, path = %request.path, "Sign request verified");
        Ok(parsed.signed_url)
    }
}
