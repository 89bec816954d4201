//! Error types for model gateway operations.

use thiserror::Error;

/// Errors surfaced by a [`ModelGateway`](crate::ModelGateway) call.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway is misconfigured (missing API key, bad URL, ...).
    #[error("gateway configuration error: {0}")]
    Configuration(String),

    /// The request never produced a usable HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// A streaming response failed mid-flight or could not be decoded.
    #[error("stream error: {0}")]
    Stream(String),

    /// The provider returned a response with no content.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl GatewayError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Transport failures and throttling/server-side statuses are
    /// retryable; everything else is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network(_) => true,
            GatewayError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(GatewayError::Network("timeout".to_string()).is_retryable());
        assert!(GatewayError::Api {
            status: 429,
            message: "slow down".to_string()
        }
        .is_retryable());
        assert!(GatewayError::Api {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());

        assert!(!GatewayError::Api {
            status: 401,
            message: "bad key".to_string()
        }
        .is_retryable());
        assert!(!GatewayError::Configuration("no key".to_string()).is_retryable());
        assert!(!GatewayError::EmptyResponse.is_retryable());
    }
}
