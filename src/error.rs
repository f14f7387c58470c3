use reqwest::StatusCode;
use thiserror::Error;

/// Everything that can go wrong between a form and the GreenMates API.
///
/// `Validation` is raised locally before any request is built; the other
/// cases come out of the transport layer. The `Display` output is the
/// message shown to the user.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("Network failure on {endpoint}: {source}")]
    NetworkFailure {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("Failed to decode response from {endpoint}: {source}")]
    DecodeFailure {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected status {status} from {endpoint}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    #[error("No bearer token configured for {0}, sign in first")]
    MissingToken(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}
