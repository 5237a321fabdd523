use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};

/// Value stored in a foreign object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// UTF-8 string.
    String(String),
    /// Signed integer.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Boolean.
    Boolean(bool),
    /// Raw bytes; only renders to text when they are valid UTF-8.
    Bytes(Vec<u8>),
    /// Heterogeneous ordered list.
    List(Vec<Value>),
}

impl Value {
    /// Empty list, ready for appends.
    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    /// True for list values.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Short type name used in runtime diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "str",
            Value::Integer(_) => "int",
            Value::Float(_) => "float",
            Value::Boolean(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
        }
    }

    /// Truth value: empty containers, zero and `false` are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::String(text) => !text.is_empty(),
            Value::Integer(num) => *num != 0,
            Value::Float(num) => *num != 0.0,
            Value::Boolean(flag) => *flag,
            Value::Bytes(bytes) => !bytes.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Convenience accessor for string references.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Convenience accessor for list items.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert into a plain JSON value.
    ///
    /// Bytes become a string with invalid sequences replaced.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String(text) => JsonValue::String(text.clone()),
            Value::Integer(num) => JsonValue::from(*num),
            Value::Float(num) => Number::from_f64(*num)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::Boolean(flag) => JsonValue::Bool(*flag),
            Value::Bytes(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
            Value::List(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
        }
    }

    /// Attempt to build a [`Value`] from plain JSON.
    ///
    /// `null` and objects have no counterpart and yield `None`, as does any
    /// array containing them.
    pub fn from_json(value: &JsonValue) -> Option<Value> {
        match value {
            JsonValue::Null | JsonValue::Object(_) => None,
            JsonValue::Bool(flag) => Some(Value::Boolean(*flag)),
            JsonValue::Number(num) => num
                .as_i64()
                .map(Value::Integer)
                .or_else(|| num.as_f64().map(Value::Float)),
            JsonValue::String(text) => Some(Value::String(text.clone())),
            JsonValue::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::String(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::String(text)
    }
}

impl From<i64> for Value {
    fn from(num: i64) -> Self {
        Value::Integer(num)
    }
}

impl From<i32> for Value {
    fn from(num: i32) -> Self {
        Value::Integer(i64::from(num))
    }
}

impl From<u32> for Value {
    fn from(num: u32) -> Self {
        Value::Integer(i64::from(num))
    }
}

impl From<f64> for Value {
    fn from(num: f64) -> Self {
        Value::Float(num)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::Boolean(flag)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}
