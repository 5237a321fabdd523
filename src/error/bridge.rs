//! Conversion of pending foreign exceptions into host errors
//!
//! [`capture_exception`] is the only place that looks at a foreign
//! exception. Everything past it deals in [`ForeignFailure`] and the
//! thread's [`ErrorContext`].

use super::{ErrorCode, ErrorContext, ErrorKind};
use crate::foreign::{ExceptionTriple, ForeignRuntime, Raised};

/// Text used when the exception value cannot be rendered.
pub const UNKNOWN_EXCEPTION_TEXT: &str = "Unknown";

/// A foreign exception reduced to host terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignFailure {
    /// Exception type name reported by the runtime
    pub exc_type: String,
    /// Rendered exception value, or [`UNKNOWN_EXCEPTION_TEXT`]
    pub text: String,
    /// Multi-line traceback, when one could be formatted
    pub traceback: Option<String>,
}

/// Fetch and clear the calling thread's pending exception.
///
/// Returns `None` when nothing is pending. The exception can be observed
/// only once. Rendering failures fall back to [`UNKNOWN_EXCEPTION_TEXT`] and
/// traceback failures to `None`; neither leaves a new exception pending.
pub fn capture_exception(
    runtime: &dyn ForeignRuntime,
    with_traceback: bool,
) -> Option<ForeignFailure> {
    if !runtime.exception_pending() {
        return None;
    }
    let exception = runtime.fetch_exception()?;

    let text = exception
        .value
        .as_ref()
        .and_then(|value| match runtime.render(value) {
            Ok(text) => Some(text),
            Err(Raised) => {
                runtime.clear_exception();
                None
            }
        })
        .unwrap_or_else(|| UNKNOWN_EXCEPTION_TEXT.to_string());

    let traceback = if with_traceback {
        format_traceback(runtime, &exception)
    } else {
        None
    };

    Some(ForeignFailure {
        exc_type: exception.exc_type,
        text,
        traceback,
    })
}

fn format_traceback(runtime: &dyn ForeignRuntime, exception: &ExceptionTriple) -> Option<String> {
    if exception.value.is_none() || exception.traceback.is_none() {
        return None;
    }
    let formatted = runtime.format_exception(exception);
    if formatted.is_none() && runtime.exception_pending() {
        runtime.clear_exception();
    }
    formatted
}

impl ErrorContext {
    /// Turn the runtime's pending exception, if any, into this thread's
    /// error state.
    ///
    /// With nothing pending this clears the state and returns
    /// [`ErrorCode::NONE`]. Otherwise the exception value is raised as
    /// [`ErrorKind::ForeignRuntime`] and, when a traceback can be formatted,
    /// it is logged as a second error record.
    pub fn bridge_foreign_exception(&mut self, runtime: &dyn ForeignRuntime) -> ErrorCode {
        match capture_exception(runtime, self.log_tracebacks()) {
            None => {
                self.clear();
                ErrorCode::NONE
            }
            Some(failure) => {
                let code = self.raise(ErrorKind::ForeignRuntime, &failure.text);
                if let Some(traceback) = &failure.traceback {
                    tracing::error!(
                        source = %self.log_source(),
                        exc_type = %failure.exc_type,
                        "{}",
                        traceback
                    );
                }
                code
            }
        }
    }
}
