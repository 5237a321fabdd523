//! In-process implementation of the foreign runtime contracts
//!
//! `NativeRuntime` keeps one pending exception slot per thread, like an
//! embedded interpreter does, and `NativeMap` is an insertion-ordered
//! attribute map living in it. Hosts use them when no interpreter is
//! embedded; tests use the fault hooks to drive the error bridge.

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use thread_local::ThreadLocal;
use uuid::Uuid;

use super::{DynamicMap, ExceptionTriple, ForeignRuntime, Raised, Value};
use crate::error::{ErrorKind, StructuredError};

/// Pending exception slot. Slots are recycled when a thread exits, so each
/// one remembers the thread that raised into it.
type PendingSlot = Mutex<Option<(ThreadId, ExceptionTriple)>>;

/// Runtime with per-thread pending exceptions.
#[derive(Debug)]
pub struct NativeRuntime {
    pending: ThreadLocal<PendingSlot>,
    alive: AtomicBool,
}

impl NativeRuntime {
    /// Start a runtime.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            pending: ThreadLocal::new(),
            alive: AtomicBool::new(true),
        })
    }

    /// Tear the runtime down. Pending exceptions are dropped and every
    /// later operation fails without raising.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        for slot in self.pending.iter() {
            *slot.lock() = None;
        }
        tracing::debug!("native runtime shut down");
    }

    /// False once [`shutdown`](Self::shutdown) has run.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Create an empty object in this runtime.
    pub fn new_map(self: &Arc<Self>) -> NativeMap {
        NativeMap::new(Arc::clone(self))
    }

    fn slot(&self) -> &PendingSlot {
        self.pending.get_or_default()
    }

    /// Number of per-thread slots allocated so far.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.pending.iter().count()
    }

    fn render_into(&self, value: &Value, nested: bool, out: &mut String) -> Result<(), Raised> {
        match value {
            Value::String(text) if nested => out.push_str(&format!("{:?}", text)),
            Value::String(text) => out.push_str(text),
            Value::Integer(num) => out.push_str(&num.to_string()),
            Value::Float(num) => out.push_str(&format!("{:?}", num)),
            Value::Boolean(flag) => out.push_str(if *flag { "true" } else { "false" }),
            Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => self.render_into(&Value::from(text), nested, out)?,
                Err(err) => {
                    return Err(self.raise(ExceptionTriple::new(
                        "InvalidText",
                        format!("invalid utf-8 at byte offset {}", err.valid_up_to()),
                    )));
                }
            },
            Value::List(items) => {
                out.push('[');
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(item, true, out)?;
                }
                out.push(']');
            }
        }
        Ok(())
    }
}

impl ForeignRuntime for NativeRuntime {
    fn exception_pending(&self) -> bool {
        if !self.is_alive() {
            return false;
        }
        let me = thread::current().id();
        matches!(&*self.slot().lock(), Some((owner, _)) if *owner == me)
    }

    fn fetch_exception(&self) -> Option<ExceptionTriple> {
        if !self.is_alive() {
            return None;
        }
        let me = thread::current().id();
        let mut slot = self.slot().lock();
        match slot.take() {
            Some((owner, exception)) if owner == me => Some(exception),
            _ => None,
        }
    }

    fn raise(&self, exception: ExceptionTriple) -> Raised {
        if self.is_alive() {
            *self.slot().lock() = Some((thread::current().id(), exception));
        }
        Raised
    }

    fn render(&self, value: &Value) -> Result<String, Raised> {
        let mut out = String::new();
        self.render_into(value, false, &mut out)?;
        Ok(out)
    }

    fn format_exception(&self, exception: &ExceptionTriple) -> Option<String> {
        if !self.is_alive() {
            return None;
        }
        let frames = exception.traceback.as_ref()?;

        let mut lines = vec!["stack trace (most recent call last):".to_string()];
        for frame in frames {
            lines.push(format!(
                "  in {} at {}:{}",
                frame.function, frame.file, frame.line
            ));
        }

        let summary = match &exception.value {
            None => exception.exc_type.clone(),
            Some(value) => match self.render(value) {
                Ok(text) => format!("{}: {}", exception.exc_type, text),
                Err(Raised) => {
                    self.clear_exception();
                    format!("{}: <unprintable {}>", exception.exc_type, value.type_name())
                }
            },
        };
        lines.push(summary);

        Some(lines.join("\n"))
    }
}

/// Operation kinds that can be made to fail with [`NativeMap::inject_fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapOp {
    /// Attribute read
    Get,
    /// Attribute store
    Set,
    /// Attribute removal
    Delete,
    /// List append
    Append,
}

/// Insertion-ordered attribute map owned by a [`NativeRuntime`].
#[derive(Debug)]
pub struct NativeMap {
    id: Uuid,
    runtime: Arc<NativeRuntime>,
    entries: RwLock<Vec<(String, Value)>>,
    faults: Mutex<Vec<(MapOp, ExceptionTriple)>>,
}

impl NativeMap {
    /// Create an empty map in `runtime`.
    pub fn new(runtime: Arc<NativeRuntime>) -> Self {
        Self {
            id: Uuid::new_v4(),
            runtime,
            entries: RwLock::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
        }
    }

    /// Build a map from a JSON object document.
    ///
    /// `null` attributes are treated as absent. Nested objects are rejected.
    pub fn from_json(
        runtime: Arc<NativeRuntime>,
        document: &JsonValue,
    ) -> Result<Self, StructuredError> {
        let object = document.as_object().ok_or_else(|| {
            StructuredError::new(
                ErrorKind::InvalidMessage,
                "entity document must be a JSON object",
            )
        })?;

        let map = Self::new(runtime);
        {
            let mut entries = map.entries.write();
            for (key, raw) in object {
                if raw.is_null() {
                    continue;
                }
                let value = Value::from_json(raw).ok_or_else(|| {
                    StructuredError::new(
                        ErrorKind::InvalidMessage,
                        format!("attribute '{}' has an unsupported value", key),
                    )
                })?;
                entries.push((key.clone(), value));
            }
        }
        Ok(map)
    }

    /// Make the next `op` on this map raise `exception`.
    pub fn inject_fault(&self, op: MapOp, exception: ExceptionTriple) {
        self.faults.lock().push((op, exception));
    }

    /// Runtime owning this map.
    pub fn native_runtime(&self) -> &Arc<NativeRuntime> {
        &self.runtime
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Attribute names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Copy of every attribute in insertion order.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.entries.read().clone()
    }

    /// Render the map as a JSON object.
    pub fn to_json(&self) -> JsonValue {
        let object: Map<String, JsonValue> = self
            .entries
            .read()
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        JsonValue::Object(object)
    }

    fn enter(&self, op: MapOp) -> Result<(), Raised> {
        if !self.runtime.is_alive() {
            return Err(Raised);
        }
        let mut faults = self.faults.lock();
        match faults.iter().position(|(fault_op, _)| *fault_op == op) {
            Some(pos) => {
                let (_, exception) = faults.remove(pos);
                Err(self.runtime.raise(exception))
            }
            None => Ok(()),
        }
    }

    fn missing(&self, key: &str) -> Raised {
        self.runtime.raise(ExceptionTriple::new(
            "MissingKey",
            format!("attribute '{}' not found", key),
        ))
    }
}

impl DynamicMap for NativeMap {
    fn runtime(&self) -> &dyn ForeignRuntime {
        &*self.runtime
    }

    fn object_id(&self) -> Uuid {
        self.id
    }

    fn get(&self, key: &str) -> Result<Value, Raised> {
        self.enter(MapOp::Get)?;
        let entries = self.entries.read();
        match entries.iter().find(|(name, _)| name == key) {
            Some((_, value)) => Ok(value.clone()),
            None => Err(self.missing(key)),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), Raised> {
        self.enter(MapOp::Set)?;
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(name, _)| name == key) {
            Some((_, slot)) => *slot = value,
            None => entries.push((key.to_string(), value)),
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, Raised> {
        self.enter(MapOp::Delete)?;
        let mut entries = self.entries.write();
        match entries.iter().position(|(name, _)| name == key) {
            Some(pos) => {
                entries.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append(&self, key: &str, value: Value) -> Result<(), Raised> {
        self.enter(MapOp::Append)?;
        let mut entries = self.entries.write();
        match entries.iter_mut().find(|(name, _)| name == key) {
            Some((_, Value::List(items))) => {
                items.push(value);
                Ok(())
            }
            Some((_, other)) => Err(self.runtime.raise(ExceptionTriple::new(
                "TypeMismatch",
                format!("cannot append to {}", other.type_name()),
            ))),
            None => Err(self.missing(key)),
        }
    }
}
