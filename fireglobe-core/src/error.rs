//! Fireglobe core error types
//!
//! Re-exports fireglobe-error and provides domain-specific conveniences.

pub use fireglobe_error::{Error, ErrorKind, ErrorStatus, Result};

use crate::provider::ProviderError;

// =============================================================================
// Domain-specific error constructors
// =============================================================================

/// Convert a provider failure into a gateway error.
///
/// Rate limiting keeps its own kind so callers can tell it apart; every other
/// failure becomes `GatewayFailed` with the HTTP status and body attached.
pub fn from_provider(err: ProviderError) -> Error {
    match err {
        ProviderError::RateLimited { retry_after } => {
            let mut e = Error::new(ErrorKind::RateLimited, "completion endpoint rate limited");
            if let Some(secs) = retry_after {
                e = e.with_context("retry_after", secs.to_string());
            }
            e
        }
        ProviderError::Api { status, message } => Error::gateway_failed(status, message),
        other => {
            let status = other.status();
            Error::gateway_failed(status, other.to_string()).set_source(other)
        }
    }
}

/// Create a ParseFailed error from a JSON error
pub fn json_parse(what: &str, err: serde_json::Error) -> Error {
    Error::parse_failed(format!("{} is not valid JSON: {}", what, err))
        .with_context("line", err.line().to_string())
        .set_source(err)
}

/// Create a SerializationFailed error
pub fn serialization_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::SerializationFailed, message)
}

/// Create an IoFailed error
pub fn io_error(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::IoFailed, message)
}

/// Create an empty-completion error
pub fn empty_completion() -> Error {
    Error::new(ErrorKind::GatewayFailed, "completion contained no text")
        .with_context("status", "200")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_provider_api_error() {
        let err = from_provider(ProviderError::Api { status: 500, message: "boom".into() });
        assert_eq!(err.kind(), ErrorKind::GatewayFailed);
        assert!(err.context().contains(&("status", "500".to_string())));
        assert!(err.context().contains(&("body", "boom".to_string())));
    }

    #[test]
    fn test_from_provider_rate_limit() {
        let err = from_provider(ProviderError::RateLimited { retry_after: Some(7) });
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_from_provider_network_has_zero_status() {
        let err = from_provider(ProviderError::Network("timed out".into()));
        assert_eq!(err.kind(), ErrorKind::GatewayFailed);
        assert_eq!(err.context()[0], ("status", "0".to_string()));
        assert!(err.source_ref().is_some());
    }
}
