//! Error kinds and thread-scoped error state
//!
//! Failures in the management layer are reported as a (code, message) pair
//! held in a per-thread [`ErrorContext`]. The codes are wire-visible and
//! stable; their display names live in a table whose length is checked
//! against the kind count at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Foreign exception capture
pub mod bridge;
/// Per-thread error state
pub mod context;

pub use bridge::{ForeignFailure, capture_exception};
pub use context::{DEFAULT_LOG_SOURCE, DEFAULT_MESSAGE_LIMIT, ErrorContext, NO_ERROR_MESSAGE};

/// Closed set of failure categories.
///
/// The discriminants are the wire codes; `None` (zero) means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
#[repr(u32)]
pub enum ErrorKind {
    /// No error
    None = 0,
    /// A named object or attribute does not exist
    NotFound = 1,
    /// A named object already exists
    AlreadyExists = 2,
    /// Resource allocation failed
    Allocation = 3,
    /// A message or document was malformed
    InvalidMessage = 4,
    /// The embedded dynamic runtime raised an exception
    ForeignRuntime = 5,
    /// Configuration is missing or invalid
    Configuration = 6,
}

/// Display names, indexed by wire code.
const ERROR_NAMES: &[&str] = &[
    "No Error",
    "Not found",
    "Already exists",
    "Allocation",
    "Invalid message",
    "Foreign runtime",
    "Configuration",
];

const _: () = assert!(
    ERROR_NAMES.len() == ErrorKind::COUNT,
    "error name table does not match the number of error kinds"
);

impl ErrorKind {
    /// Number of defined kinds, including `None`.
    pub const COUNT: usize = ErrorKind::Configuration as usize + 1;

    /// Every kind in wire-code order.
    pub const ALL: [ErrorKind; ErrorKind::COUNT] = [
        ErrorKind::None,
        ErrorKind::NotFound,
        ErrorKind::AlreadyExists,
        ErrorKind::Allocation,
        ErrorKind::InvalidMessage,
        ErrorKind::ForeignRuntime,
        ErrorKind::Configuration,
    ];

    /// Wire code of this kind.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Human-readable display name.
    pub fn name(self) -> &'static str {
        ERROR_NAMES[self as usize]
    }

    /// Look up the kind for a wire code.
    pub fn from_code(code: u32) -> Option<ErrorKind> {
        Self::ALL.get(code as usize).copied()
    }
}

impl From<ErrorKind> for u32 {
    fn from(kind: ErrorKind) -> Self {
        kind.code()
    }
}

impl TryFrom<u32> for ErrorKind {
    type Error = StructuredError;

    fn try_from(code: u32) -> std::result::Result<Self, Self::Error> {
        ErrorKind::from_code(code).ok_or_else(|| {
            StructuredError::new(
                ErrorKind::InvalidMessage,
                format!("unknown error code {}", code),
            )
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wire-level error code.
///
/// Usually one of the [`ErrorKind`] codes, but hosts may carry codes from a
/// newer peer; those render as their decimal value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ErrorCode(u32);

impl ErrorCode {
    /// The success code.
    pub const NONE: ErrorCode = ErrorCode(0);

    /// Wrap a raw wire code.
    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    /// Raw wire value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// True for the success code.
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// True for any failure code.
    pub const fn is_error(self) -> bool {
        self.0 != 0
    }

    /// Known kind for this code, if any.
    pub fn kind(self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.0)
    }
}

impl From<ErrorKind> for ErrorCode {
    fn from(kind: ErrorKind) -> Self {
        ErrorCode(kind.code())
    }
}

impl PartialEq<ErrorKind> for ErrorCode {
    fn eq(&self, other: &ErrorKind) -> bool {
        self.0 == other.code()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => f.write_str(kind.name()),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Owned copy of an error state, for callers that prefer `Result`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StructuredError {
    /// Failure code
    pub code: ErrorCode,
    /// Kind-prefixed message
    pub message: String,
}

impl StructuredError {
    /// Build an error whose message carries the usual kind prefix.
    pub fn new(kind: ErrorKind, detail: impl fmt::Display) -> Self {
        Self {
            code: kind.into(),
            message: format!("{}: {}", kind.name(), detail),
        }
    }

    /// Known kind of this error, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.code.kind()
    }
}

/// Result alias for operations reporting a [`StructuredError`].
pub type Result<T> = std::result::Result<T, StructuredError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ErrorKind::None.code(), 0);
        assert_eq!(ErrorKind::NotFound.code(), 1);
        assert_eq!(ErrorKind::AlreadyExists.code(), 2);
        assert_eq!(ErrorKind::Allocation.code(), 3);
        assert_eq!(ErrorKind::InvalidMessage.code(), 4);
        assert_eq!(ErrorKind::ForeignRuntime.code(), 5);
        assert_eq!(ErrorKind::Configuration.code(), 6);
        assert_eq!(ErrorKind::COUNT, 7);
    }

    #[test]
    fn test_from_code_round_trips_every_kind() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code(7), None);
    }

    #[test]
    fn test_unknown_code_displays_as_number() {
        assert_eq!(ErrorCode::new(42).to_string(), "42");
        assert_eq!(ErrorCode::from(ErrorKind::Allocation).to_string(), "Allocation");
        assert!(ErrorCode::new(42).kind().is_none());
    }

    #[test]
    fn test_kind_serializes_as_wire_code() {
        assert_eq!(serde_json::to_string(&ErrorKind::ForeignRuntime).unwrap(), "5");
        assert_eq!(
            serde_json::from_str::<ErrorKind>("6").unwrap(),
            ErrorKind::Configuration
        );
        assert!(serde_json::from_str::<ErrorKind>("9").is_err());
        assert!(serde_json::from_str::<ErrorKind>("\"ForeignRuntime\"").is_err());
    }

    #[test]
    fn test_structured_error_prefixes_kind() {
        let err = StructuredError::new(ErrorKind::NotFound, "router 'r1'");
        assert_eq!(err.to_string(), "Not found: router 'r1'");
        assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    }
}
