//! The fireglobe `Error`

use crate::{ErrorKind, ErrorStatus};
use std::fmt;
use std::io;

/// Error returned by every fallible fireglobe call.
///
/// Besides its [`ErrorKind`] and message an error records where it happened
/// (`operation`, with earlier operations kept as `called` context), free-form
/// context pairs, an optional source and an [`ErrorStatus`] telling retry
/// loops what to do with it.
///
/// ```rust
/// use fireglobe_error::{Error, ErrorKind};
///
/// let err = Error::gateway_failed(502, "bad gateway")
///     .with_operation("gateway::complete")
///     .with_context("model", "asi1-mini");
///
/// assert_eq!(err.kind(), ErrorKind::GatewayFailed);
/// assert_eq!(err.context_value("status"), Some("502"));
/// assert!(err.is_retryable());
/// ```
pub struct Error {
    kind: ErrorKind,
    message: String,
    status: ErrorStatus,
    operation: &'static str,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Status starts as `Temporary` for retryable kinds, `Permanent` otherwise
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: ErrorStatus::default_for(kind),
            kind,
            message: message.into(),
            operation: "",
            context: Vec::new(),
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> ErrorStatus {
        self.status
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// Latest value recorded under `key`
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn source_ref(&self) -> Option<&anyhow::Error> {
        self.source.as_ref()
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    pub fn with_status(mut self, status: ErrorStatus) -> Self {
        self.status = status;
        self
    }

    pub fn temporary(self) -> Self {
        self.with_status(ErrorStatus::Temporary)
    }

    pub fn permanent(self) -> Self {
        self.with_status(ErrorStatus::Permanent)
    }

    /// A temporary error that kept failing; no longer retryable
    pub fn persist(self) -> Self {
        let status = self.status.persist();
        self.with_status(status)
    }

    /// Record the failing operation. A previously set operation is kept as
    /// `called` context.
    pub fn with_operation(mut self, operation: &'static str) -> Self {
        let previous = std::mem::replace(&mut self.operation, operation);
        if !previous.is_empty() {
            self.context.push(("called", previous.to_string()));
        }
        self
    }

    pub fn with_context(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.context.push((key, value.into()));
        self
    }

    /// Attach the underlying error. Only one source may be set.
    pub fn set_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        debug_assert!(self.source.is_none(), "source error already set");
        self.source = Some(source.into());
        self
    }
}

// Constructors for the kinds callers build most often
impl Error {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Completion endpoint failure. `status` is `0` when no response arrived.
    pub fn gateway_failed(status: u16, body: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::GatewayFailed,
            format!("completion call failed with status {}", status),
        )
        .with_context("status", status.to_string())
        .with_context("body", body)
    }

    pub fn parse_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ParseFailed, message)
    }

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationFailed, message)
    }

    pub fn storage_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::StorageFailed, message)
    }

    pub fn relay_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RelayUnavailable, message)
    }
}

/// One line for logs: `op: Kind (status) message [k=v, ...]`
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.operation.is_empty() {
            write!(f, "{}: ", self.operation)?;
        }
        write!(f, "{} ({})", self.kind, self.status)?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        if let Some(((first_key, first_value), rest)) = self.context.split_first() {
            write!(f, " [{}={}", first_key, first_value)?;
            for (key, value) in rest {
                write!(f, ", {}={}", key, value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Error");
        debug
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("operation", &self.operation)
            .field("message", &self.message);
        if !self.context.is_empty() {
            debug.field("context", &self.context);
        }
        if let Some(source) = &self.source {
            debug.field("source", source);
        }
        debug.finish()
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::NotFound => ErrorKind::FileNotFound,
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            _ => ErrorKind::IoFailed,
        };
        Self::new(kind, err.to_string()).with_operation("io").set_source(err)
    }
}
