//! Per-thread error state
//!
//! An [`ErrorContext`] is created once per thread and passed by `&mut` to
//! every fallible operation. It holds the outcome of the most recent
//! operation; callers inspect it right after the call, before making another
//! fallible call on the same thread.

use std::fmt::{self, Write as _};
use std::marker::PhantomData;

use super::{ErrorCode, ErrorKind, StructuredError};
use crate::config::{CoreConfig, MIN_MESSAGE_LIMIT};

/// Message held while no error is recorded.
pub const NO_ERROR_MESSAGE: &str = "No Error";

/// Default upper bound on the stored message, in bytes.
pub const DEFAULT_MESSAGE_LIMIT: usize = 2048;

/// Default log source tag for error records.
pub const DEFAULT_LOG_SOURCE: &str = "ERROR";

/// Thread-scoped (code, message) pair.
///
/// The context is neither `Send` nor `Sync`: state raised on one thread can
/// only be observed on that thread.
#[derive(Debug)]
pub struct ErrorContext {
    code: ErrorCode,
    message: String,
    message_limit: usize,
    log_source: String,
    log_tracebacks: bool,
    _thread: PhantomData<*const ()>,
}

impl ErrorContext {
    /// Create a context with default settings, in the "no error" state.
    pub fn new() -> Self {
        Self::with_config(&CoreConfig::default())
    }

    /// Create a context using the limits and log source from `config`.
    ///
    /// A message limit below [`MIN_MESSAGE_LIMIT`] is raised to it.
    pub fn with_config(config: &CoreConfig) -> Self {
        Self {
            code: ErrorCode::NONE,
            message: NO_ERROR_MESSAGE.to_string(),
            message_limit: config.message_limit.max(MIN_MESSAGE_LIMIT),
            log_source: config.log_source.clone(),
            log_tracebacks: config.log_tracebacks,
            _thread: PhantomData,
        }
    }

    /// Record an error and log it.
    ///
    /// The stored message is `"<kind name>: <message>"`, or
    /// `"<code>: <message>"` for codes outside the known table, truncated to
    /// the message limit. A zero code behaves like [`clear`](Self::clear).
    /// Returns `code` unchanged so callers can end with `return ctx.raise(..)`.
    pub fn raise(&mut self, code: impl Into<ErrorCode>, message: impl fmt::Display) -> ErrorCode {
        let code = code.into();
        if code.is_none() {
            self.clear();
            return ErrorCode::NONE;
        }

        self.code = code;
        self.message.clear();
        let _ = write!(self.message, "{}: {}", code, message);
        truncate_at_boundary(&mut self.message, self.message_limit);

        tracing::error!(source = %self.log_source, "{}", self.message);
        code
    }

    /// Record an error from a raw wire code.
    pub fn raise_code(&mut self, code: u32, message: impl fmt::Display) -> ErrorCode {
        self.raise(ErrorCode::new(code), message)
    }

    /// Reset to the "no error" state.
    pub fn clear(&mut self) {
        self.code = ErrorCode::NONE;
        self.message.clear();
        self.message.push_str(NO_ERROR_MESSAGE);
    }

    /// Current error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Current message. The borrow ends before the next mutating call.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True while a failure is recorded.
    pub fn is_error(&self) -> bool {
        self.code.is_error()
    }

    /// Lift the current state into a `Result`.
    pub fn check(&self) -> Result<(), StructuredError> {
        if self.code.is_none() {
            Ok(())
        } else {
            Err(self.to_error())
        }
    }

    /// Owned snapshot of the current state.
    pub fn to_error(&self) -> StructuredError {
        StructuredError {
            code: self.code,
            message: self.message.clone(),
        }
    }

    /// Record a previously captured error, logging it again.
    pub fn report(&mut self, error: &StructuredError) -> ErrorCode {
        match error.kind() {
            Some(ErrorKind::None) => {
                self.clear();
                ErrorCode::NONE
            }
            _ => {
                self.code = error.code;
                self.message.clear();
                self.message.push_str(&error.message);
                truncate_at_boundary(&mut self.message, self.message_limit);
                tracing::error!(source = %self.log_source, "{}", self.message);
                self.code
            }
        }
    }

    /// Log source tag attached to error records.
    pub fn log_source(&self) -> &str {
        &self.log_source
    }

    /// Maximum stored message length in bytes.
    pub fn message_limit(&self) -> usize {
        self.message_limit
    }

    pub(crate) fn log_tracebacks(&self) -> bool {
        self.log_tracebacks
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_at_boundary(text: &mut String, limit: usize) {
    if text.len() <= limit {
        return;
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::capture_logs;

    #[test]
    fn test_new_context_has_no_error() {
        let ctx = ErrorContext::new();
        assert_eq!(ctx.code(), ErrorCode::NONE);
        assert_eq!(ctx.message(), NO_ERROR_MESSAGE);
        assert!(ctx.check().is_ok());
    }

    #[test]
    fn test_raise_formats_kind_prefix() {
        let mut ctx = ErrorContext::new();
        let code = ctx.raise(ErrorKind::AlreadyExists, format_args!("dup {}", "x"));

        assert_eq!(code, ErrorKind::AlreadyExists);
        assert_eq!(ctx.code(), ErrorKind::AlreadyExists);
        assert_eq!(ctx.message(), "Already exists: dup x");
    }

    #[test]
    fn test_raise_unknown_code_uses_number() {
        let mut ctx = ErrorContext::new();
        ctx.raise_code(99, "from a newer peer");
        assert_eq!(ctx.code().value(), 99);
        assert_eq!(ctx.message(), "99: from a newer peer");
    }

    #[test]
    fn test_raise_none_clears() {
        let mut ctx = ErrorContext::new();
        ctx.raise(ErrorKind::Configuration, "bad");
        let code = ctx.raise(ErrorKind::None, "ignored");

        assert!(code.is_none());
        assert_eq!(ctx.message(), NO_ERROR_MESSAGE);
    }

    #[test]
    fn test_message_truncated_on_char_boundary() {
        let config = CoreConfig {
            message_limit: 20,
            ..CoreConfig::default()
        };
        let mut ctx = ErrorContext::with_config(&config);
        ctx.raise(ErrorKind::NotFound, "ééééééééééééé");

        assert!(ctx.message().len() <= 20);
        assert!(ctx.message().starts_with("Not found: é"));
    }

    #[test]
    fn test_tiny_limit_is_clamped() {
        let config = CoreConfig {
            message_limit: 0,
            ..CoreConfig::default()
        };
        let mut ctx = ErrorContext::with_config(&config);
        assert_eq!(ctx.message_limit(), MIN_MESSAGE_LIMIT);

        ctx.raise(ErrorKind::NotFound, "address 'amqp:/to'");
        assert_eq!(ctx.message(), "Not found: addre");
        assert_eq!(ctx.message().len(), MIN_MESSAGE_LIMIT);
    }

    #[test]
    fn test_raise_logs_once_at_error() {
        let logs = capture_logs(|| {
            let mut ctx = ErrorContext::new();
            ctx.raise(ErrorKind::InvalidMessage, "truncated frame");
            ctx.clear();
        });

        assert_eq!(logs.matches("Invalid message: truncated frame").count(), 1);
        assert!(logs.contains("ERROR"));
    }

    #[test]
    fn test_check_returns_structured_error() {
        let mut ctx = ErrorContext::new();
        ctx.raise(ErrorKind::Allocation, "pool exhausted");

        let err = ctx.check().unwrap_err();
        assert_eq!(err.code, ErrorKind::Allocation);
        assert_eq!(err.to_string(), "Allocation: pool exhausted");
    }

    #[test]
    fn test_report_restores_captured_error() {
        let mut ctx = ErrorContext::new();
        let err = StructuredError::new(ErrorKind::Configuration, "missing listener");
        ctx.report(&err);

        assert_eq!(ctx.code(), ErrorKind::Configuration);
        assert_eq!(ctx.message(), "Configuration: missing listener");
    }
}
