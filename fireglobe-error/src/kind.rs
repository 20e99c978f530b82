//! Error kinds for fireglobe operations

use std::fmt;

/// The kind of error that occurred.
///
/// This enum categorizes errors to help users write clear error handling logic.
/// Users can match on ErrorKind to decide whether to serve a fallback value,
/// report a boolean failure, or surface the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // =========================================================================
    // General errors
    // =========================================================================
    /// An unexpected error occurred - catch-all for unhandled cases
    Unexpected,

    /// The requested feature or operation is not supported
    Unsupported,

    /// Invalid configuration or parameters
    ConfigInvalid,

    /// Invalid argument passed to function
    InvalidArgument,

    // =========================================================================
    // LLM gateway errors
    // =========================================================================
    /// The completion endpoint failed (transport error or non-success status)
    GatewayFailed,

    /// The completion endpoint rejected the call for rate limiting
    RateLimited,

    // =========================================================================
    // Response handling errors
    // =========================================================================
    /// Sanitized text is not valid JSON or lacks required keys
    ParseFailed,

    /// Well-formed JSON with the wrong shape (e.g. wrong array length)
    ValidationFailed,

    /// Serialization/deserialization of our own types failed
    SerializationFailed,

    // =========================================================================
    // Storage errors
    // =========================================================================
    /// Writing a transcript to disk failed
    StorageFailed,

    // =========================================================================
    // Relay errors
    // =========================================================================
    /// The peer analysis service is unreachable or answered with a failure
    RelayUnavailable,

    // =========================================================================
    // IO errors
    // =========================================================================
    /// File not found
    FileNotFound,

    /// Permission denied
    PermissionDenied,

    /// IO operation failed
    IoFailed,

    /// Network error
    NetworkFailed,
}

impl ErrorKind {
    /// Returns the error kind as a static string
    pub fn as_str(&self) -> &'static str {
        match self {
            // General
            ErrorKind::Unexpected => "Unexpected",
            ErrorKind::Unsupported => "Unsupported",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::InvalidArgument => "InvalidArgument",

            // Gateway
            ErrorKind::GatewayFailed => "GatewayFailed",
            ErrorKind::RateLimited => "RateLimited",

            // Response handling
            ErrorKind::ParseFailed => "ParseFailed",
            ErrorKind::ValidationFailed => "ValidationFailed",
            ErrorKind::SerializationFailed => "SerializationFailed",

            // Storage
            ErrorKind::StorageFailed => "StorageFailed",

            // Relay
            ErrorKind::RelayUnavailable => "RelayUnavailable",

            // IO
            ErrorKind::FileNotFound => "FileNotFound",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::IoFailed => "IoFailed",
            ErrorKind::NetworkFailed => "NetworkFailed",
        }
    }

    /// Check if this error kind is retryable by default
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::GatewayFailed
                | ErrorKind::NetworkFailed
                | ErrorKind::RateLimited
                | ErrorKind::RelayUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::GatewayFailed.to_string(), "GatewayFailed");
        assert_eq!(ErrorKind::RelayUnavailable.to_string(), "RelayUnavailable");
    }

    #[test]
    fn test_is_retryable() {
        assert!(ErrorKind::NetworkFailed.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(ErrorKind::RelayUnavailable.is_retryable());
        assert!(!ErrorKind::ParseFailed.is_retryable());
        assert!(!ErrorKind::ValidationFailed.is_retryable());
        assert!(!ErrorKind::StorageFailed.is_retryable());
    }
}
