//! Typed attribute access on managed entities
//!
//! An [`Entity`] is a counted reference to a [`DynamicMap`] owned by the
//! foreign runtime. Every operation that touches the object clears the
//! caller's [`ErrorContext`] first; on failure the pending foreign exception
//! is bridged into the context and a sentinel is returned.
//!
//! An absent attribute is not an error for `has`, the `get_opt_*` family,
//! or deletion. It is an error for the plain getters.

use std::fmt;
use std::sync::Arc;

use crate::error::{ErrorCode, ErrorContext, ErrorKind};
use crate::foreign::{DynamicMap, ForeignRuntime, Raised, Value};

/// Message used when an operation failed but the runtime had nothing pending.
const RUNTIME_UNAVAILABLE: &str = "runtime unavailable";

/// Handle to a managed entity.
///
/// Cloning takes another reference to the same object. Each handle is
/// released once, by [`free`](Self::free) or by going out of scope.
#[derive(Clone)]
pub struct Entity {
    object: Arc<dyn DynamicMap>,
}

impl Entity {
    /// Take a reference to a shared foreign object.
    pub fn new(object: Arc<dyn DynamicMap>) -> Self {
        Self { object }
    }

    /// Wrap a freshly created object.
    pub fn from_map<M>(map: M) -> Self
    where
        M: DynamicMap + 'static,
    {
        Self::new(Arc::new(map))
    }

    /// Underlying foreign object.
    pub fn object(&self) -> &Arc<dyn DynamicMap> {
        &self.object
    }

    /// Number of live references to the underlying object.
    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.object)
    }

    /// Release this handle's reference. The object lives on while other
    /// references exist.
    pub fn free(self) {
        tracing::debug!(
            object = %self.object.object_id(),
            remaining = self.reference_count() - 1,
            "entity reference released"
        );
    }

    fn runtime(&self) -> &dyn ForeignRuntime {
        self.object.runtime()
    }

    /// True if the attribute is present and readable. Any exception raised
    /// by the probe is discarded.
    pub fn has(&self, name: &str) -> bool {
        match self.object.get(name) {
            Ok(_) => true,
            Err(Raised) => {
                self.runtime().clear_exception();
                false
            }
        }
    }

    fn fetch<T>(
        &self,
        name: &str,
        convert: impl FnOnce(&dyn ForeignRuntime, &Value) -> Result<T, Raised>,
    ) -> Result<T, Raised> {
        let value = self.object.get(name)?;
        convert(self.runtime(), &value)
    }

    fn fail(&self, ctx: &mut ErrorContext) -> ErrorCode {
        let code = ctx.bridge_foreign_exception(self.runtime());
        if code.is_none() {
            ctx.raise(ErrorKind::ForeignRuntime, RUNTIME_UNAVAILABLE)
        } else {
            code
        }
    }

    /// Read an attribute as text.
    ///
    /// Returns a new owned string, or `None` with the error recorded in
    /// `ctx` if the attribute is missing or cannot be rendered.
    pub fn get_string(&self, ctx: &mut ErrorContext, name: &str) -> Option<String> {
        ctx.clear();
        match self.fetch(name, |runtime, value| runtime.render(value)) {
            Ok(text) => Some(text),
            Err(Raised) => {
                self.fail(ctx);
                None
            }
        }
    }

    /// Read an integer attribute; `-1` with the error recorded on failure.
    pub fn get_integer(&self, ctx: &mut ErrorContext, name: &str) -> i64 {
        ctx.clear();
        match self.fetch(name, |runtime, value| runtime.to_integer(value)) {
            Ok(num) => num,
            Err(Raised) => {
                self.fail(ctx);
                -1
            }
        }
    }

    /// Read a boolean attribute by truth value; `false` with the error
    /// recorded on failure.
    pub fn get_bool(&self, ctx: &mut ErrorContext, name: &str) -> bool {
        ctx.clear();
        match self.fetch(name, |runtime, value| runtime.is_true(value)) {
            Ok(flag) => flag,
            Err(Raised) => {
                self.fail(ctx);
                false
            }
        }
    }

    /// Read a string attribute, falling back to `default`.
    ///
    /// The default is returned when the attribute is absent (no error) and
    /// when reading it fails (error left in `ctx`).
    pub fn get_opt_string(
        &self,
        ctx: &mut ErrorContext,
        name: &str,
        default: Option<&str>,
    ) -> Option<String> {
        ctx.clear();
        if !self.has(name) {
            return default.map(str::to_string);
        }
        self.get_string(ctx, name).or_else(|| default.map(str::to_string))
    }

    /// Read an integer attribute, falling back to `default`.
    pub fn get_opt_integer(&self, ctx: &mut ErrorContext, name: &str, default: i64) -> i64 {
        ctx.clear();
        if !self.has(name) {
            return default;
        }
        let num = self.get_integer(ctx, name);
        if ctx.is_error() { default } else { num }
    }

    /// Read a boolean attribute, falling back to `default`.
    pub fn get_opt_bool(&self, ctx: &mut ErrorContext, name: &str, default: bool) -> bool {
        ctx.clear();
        if !self.has(name) {
            return default;
        }
        let flag = self.get_bool(ctx, name);
        if ctx.is_error() { default } else { flag }
    }

    /// Store or remove an attribute.
    ///
    /// `None` removes the attribute; removing an absent attribute succeeds.
    /// If the current value is a list, `value` is appended to it instead of
    /// replacing it.
    pub fn set(&self, ctx: &mut ErrorContext, name: &str, value: Option<Value>) -> ErrorCode {
        ctx.clear();
        let outcome = match value {
            None => self.object.delete(name).map(|_| ()),
            Some(value) => self.store(name, value),
        };
        match outcome {
            Ok(()) => {
                tracing::trace!(object = %self.object.object_id(), name, "attribute updated");
                ErrorCode::NONE
            }
            Err(Raised) => self.fail(ctx),
        }
    }

    fn store(&self, name: &str, value: Value) -> Result<(), Raised> {
        let appends = match self.object.get(name) {
            Ok(current) => current.is_list(),
            Err(Raised) => {
                self.runtime().clear_exception();
                false
            }
        };
        if appends {
            self.object.append(name, value)
        } else {
            self.object.set(name, value)
        }
    }

    /// Store a string attribute; `None` clears it.
    pub fn set_string(&self, ctx: &mut ErrorContext, name: &str, value: Option<&str>) -> ErrorCode {
        self.set(ctx, name, value.map(Value::from))
    }

    /// Store an integer attribute; `None` clears it.
    pub fn set_integer(&self, ctx: &mut ErrorContext, name: &str, value: Option<i64>) -> ErrorCode {
        self.set(ctx, name, value.map(Value::from))
    }

    /// Store a boolean attribute; `None` clears it.
    pub fn set_bool(&self, ctx: &mut ErrorContext, name: &str, value: Option<bool>) -> ErrorCode {
        self.set(ctx, name, value.map(Value::from))
    }

    /// Store a string built from format arguments.
    ///
    /// ```ignore
    /// entity.set_formatted_string(&mut ctx, "address", format_args!("{}:{}", host, port));
    /// ```
    pub fn set_formatted_string(
        &self,
        ctx: &mut ErrorContext,
        name: &str,
        args: fmt::Arguments<'_>,
    ) -> ErrorCode {
        self.set(ctx, name, Some(Value::String(args.to_string())))
    }

    /// Remove an attribute; same as `set(ctx, name, None)`.
    pub fn clear(&self, ctx: &mut ErrorContext, name: &str) -> ErrorCode {
        self.set(ctx, name, None)
    }

    /// Replace the attribute with an empty list. Later `set` calls on the
    /// same name append to it.
    pub fn set_list(&self, ctx: &mut ErrorContext, name: &str) -> ErrorCode {
        let code = self.clear(ctx, name);
        if code.is_error() {
            return code;
        }
        self.set(ctx, name, Some(Value::empty_list()))
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("object", &self.object.object_id())
            .field("references", &self.reference_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foreign::{ExceptionTriple, MapOp, NativeMap, NativeRuntime};

    fn entity() -> (Entity, Arc<NativeRuntime>) {
        let runtime = NativeRuntime::new();
        (Entity::from_map(runtime.new_map()), runtime)
    }

    #[test]
    fn test_get_clears_stale_error() {
        let (entity, _runtime) = entity();
        let mut ctx = ErrorContext::new();
        entity.set_string(&mut ctx, "host", Some("0.0.0.0"));
        ctx.raise(ErrorKind::Configuration, "stale");

        assert_eq!(entity.get_string(&mut ctx, "host").as_deref(), Some("0.0.0.0"));
        assert!(ctx.code().is_none());
    }

    #[test]
    fn test_set_failure_reports_foreign_error() {
        let runtime = NativeRuntime::new();
        let map = runtime.new_map();
        map.inject_fault(MapOp::Set, ExceptionTriple::new("ReadOnly", "entity is frozen"));
        let entity = Entity::from_map(map);

        let mut ctx = ErrorContext::new();
        let code = entity.set_integer(&mut ctx, "port", Some(5672));

        assert_eq!(code, ErrorKind::ForeignRuntime);
        assert_eq!(ctx.message(), "Foreign runtime: entity is frozen");
        assert!(!runtime.exception_pending());
    }

    #[test]
    fn test_failure_after_shutdown_still_reports() {
        let (entity, runtime) = entity();
        runtime.shutdown();
        let mut ctx = ErrorContext::new();

        assert_eq!(entity.get_integer(&mut ctx, "port"), -1);
        assert_eq!(ctx.code(), ErrorKind::ForeignRuntime);
        assert_eq!(ctx.message(), "Foreign runtime: runtime unavailable");
    }

    #[test]
    fn test_has_is_strict_bool_and_clears_probe() {
        let (entity, runtime) = entity();
        let mut ctx = ErrorContext::new();
        entity.set_bool(&mut ctx, "enabled", Some(false));

        assert!(entity.has("enabled"));
        assert!(!entity.has("missing"));
        assert!(!runtime.exception_pending());
    }

    #[test]
    fn test_free_releases_one_reference() {
        let runtime = NativeRuntime::new();
        let shared: Arc<dyn DynamicMap> = Arc::new(NativeMap::new(runtime));
        let first = Entity::new(Arc::clone(&shared));
        let second = first.clone();
        assert_eq!(Arc::strong_count(&shared), 3);

        first.free();
        assert_eq!(second.reference_count(), 2);
        second.free();
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
