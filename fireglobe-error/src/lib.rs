//! # fireglobe-error
//!
//! Unified error handling for fireglobe, following OpenDAL's error handling practices.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., GatewayFailed, ParseFailed)
//! - **ErrorStatus**: Decide how to handle it (Permanent, Temporary, Persistent)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use fireglobe_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::GatewayFailed, "completion endpoint returned 502")
//!         .with_operation("gateway::complete")
//!         .with_context("status", "502")
//!         .with_context("model", "asi1-mini"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, fireglobe_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using fireglobe Error
pub type Result<T> = std::result::Result<T, Error>;
