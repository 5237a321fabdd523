//! mgmt-core – attribute access and error reporting for a router's
//! management layer
//!
//! This crate provides:
//! - A typed facade over managed entities whose attributes live in an
//!   embedded dynamic runtime, with list-append and default-value semantics
//! - Thread-scoped error state with stable, wire-visible error codes
//! - A bridge that turns pending foreign exceptions into logged host errors
//! - A native in-process runtime implementing the foreign contracts

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Error reporting configuration
pub mod config;
/// Managed entity attribute facade
pub mod entity;
/// Error kinds, per-thread error state and the foreign exception bridge
pub mod error;
/// Contracts and native implementation of the embedded runtime
pub mod foreign;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience
pub use config::CoreConfig;
pub use entity::Entity;
pub use error::{ErrorCode, ErrorContext, ErrorKind, StructuredError};
pub use foreign::{DynamicMap, ForeignRuntime, NativeMap, NativeRuntime, Value};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
