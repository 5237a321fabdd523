//! Seam between the host and the embedded dynamic runtime
//!
//! The runtime owns the managed objects and reports failures the way a
//! dynamic language does: by leaving an exception pending on the calling
//! thread. Host code sees only the [`Raised`] marker; the pending exception
//! itself is turned into a host error by the bridge in
//! [`crate::error::bridge`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Native runtime and object implementation
pub mod native;
/// Foreign value representation
pub mod value;

pub use native::{MapOp, NativeMap, NativeRuntime};
pub use value::Value;

/// Marker returned by a runtime operation that left an exception pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Raised;

/// One entry of a foreign stack trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Source file of the frame
    pub file: String,
    /// Line number within `file`
    pub line: u32,
    /// Function executing in this frame
    pub function: String,
}

impl Frame {
    /// Build a frame.
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            function: function.into(),
        }
    }
}

/// A fetched exception: type, value and traceback.
///
/// Value and traceback are optional; exceptions raised from native code
/// usually carry no traceback.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionTriple {
    /// Exception type name
    pub exc_type: String,
    /// Exception value
    pub value: Option<Value>,
    /// Frames, outermost first
    pub traceback: Option<Vec<Frame>>,
}

impl ExceptionTriple {
    /// Exception with a textual value and no traceback.
    pub fn new(exc_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exc_type: exc_type.into(),
            value: Some(Value::String(message.into())),
            traceback: None,
        }
    }

    /// Attach a traceback.
    pub fn with_traceback(mut self, frames: Vec<Frame>) -> Self {
        self.traceback = Some(frames);
        self
    }

    /// Replace the exception value.
    pub fn with_value(mut self, value: Option<Value>) -> Self {
        self.value = value;
        self
    }
}

/// Services the embedded runtime offers to the host.
///
/// Every query may come back empty: the runtime may already have been torn
/// down.
pub trait ForeignRuntime: Send + Sync {
    /// Is an exception pending on the calling thread?
    fn exception_pending(&self) -> bool;

    /// Fetch and clear the calling thread's pending exception.
    fn fetch_exception(&self) -> Option<ExceptionTriple>;

    /// Leave `exception` pending on the calling thread.
    fn raise(&self, exception: ExceptionTriple) -> Raised;

    /// Render a value to text.
    fn render(&self, value: &Value) -> Result<String, Raised>;

    /// Render a fetched exception, traceback included, as multi-line text.
    fn format_exception(&self, exception: &ExceptionTriple) -> Option<String>;

    /// Discard any pending exception on the calling thread.
    fn clear_exception(&self) {
        let _ = self.fetch_exception();
    }

    /// Convert a value to an integer.
    fn to_integer(&self, value: &Value) -> Result<i64, Raised> {
        match value {
            Value::Integer(num) => Ok(*num),
            Value::Boolean(flag) => Ok(i64::from(*flag)),
            Value::Float(num) if num.is_finite() && num.abs() < i64::MAX as f64 => {
                Ok(num.trunc() as i64)
            }
            Value::Float(num) => Err(self.raise(ExceptionTriple::new(
                "Overflow",
                format!("cannot convert float {} to integer", num),
            ))),
            other => Err(self.raise(ExceptionTriple::new(
                "TypeMismatch",
                format!("an integer is required, got {}", other.type_name()),
            ))),
        }
    }

    /// Truth value of a value.
    fn is_true(&self, value: &Value) -> Result<bool, Raised> {
        Ok(value.is_truthy())
    }
}

/// Key-value object living in the foreign runtime.
///
/// Failing operations leave an exception pending on [`runtime`](Self::runtime)
/// and return [`Raised`].
pub trait DynamicMap: Send + Sync {
    /// Runtime that owns this object.
    fn runtime(&self) -> &dyn ForeignRuntime;

    /// Stable identity of the object, for diagnostics.
    fn object_id(&self) -> Uuid;

    /// Read the value under `key`; a missing key raises.
    fn get(&self, key: &str) -> Result<Value, Raised>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Value) -> Result<(), Raised>;

    /// Remove `key`. A missing key is tolerated; returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, Raised>;

    /// Append `value` to the list stored under `key`.
    fn append(&self, key: &str, value: Value) -> Result<(), Raised>;
}
