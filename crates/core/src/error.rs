//! Error types shared across AgentCost crates.
//!
//! Uses `thiserror` for ergonomic error definitions. Errors that belong to a
//! single subsystem (pricing, delivery, configuration) live in that
//! subsystem's crate; only errors crossing crate boundaries are defined here.

use thiserror::Error;

/// Failure of a wrapped provider call.
///
/// This is the error a caller sees from a tracked client; the tracked
/// decorator returns it untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// A provider name that does not correspond to any supported family.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown provider: {0}")]
pub struct InvalidProvider(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = ProviderError::ApiError {
            status_code: 500,
            message: "overloaded".into(),
        };
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[test]
    fn invalid_provider_names_the_input() {
        let err = InvalidProvider("mistral".into());
        assert_eq!(err.to_string(), "unknown provider: mistral");
    }
}
