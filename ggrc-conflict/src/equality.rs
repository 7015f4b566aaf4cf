//! Deep equality used for change detection.
//!
//! Same shape rules as structural equality (scalars, ordered arrays, keyed
//! maps) except that JSON numbers compare by value, so `5` and `5.0` are
//! equal. Servers are free to send either form back.

use serde_json::{Map, Number, Value};

/// Equality as seen by the resolvers.
pub trait DeepEq {
    fn deep_eq(&self, other: &Self) -> bool;
}

/// Deep equality between two JSON values.
///
/// ```
/// use ggrc_conflict::json_eq;
/// use serde_json::json;
///
/// assert!(json_eq(&json!({"a": [5, "x"]}), &json!({"a": [5.0, "x"]})));
/// assert!(!json_eq(&json!([1, 2]), &json!([2, 1])));
/// ```
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => number_eq(a, b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => map_eq(a, b),
        _ => false,
    }
}

fn number_eq(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn map_eq(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(key, x)| b.get(key).is_some_and(|y| json_eq(x, y)))
}

impl DeepEq for Value {
    fn deep_eq(&self, other: &Self) -> bool {
        json_eq(self, other)
    }
}

impl DeepEq for Map<String, Value> {
    fn deep_eq(&self, other: &Self) -> bool {
        map_eq(self, other)
    }
}

impl DeepEq for str {
    fn deep_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl DeepEq for String {
    fn deep_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T: DeepEq + ?Sized> DeepEq for &T {
    fn deep_eq(&self, other: &Self) -> bool {
        (**self).deep_eq(*other)
    }
}

// Absent only equals absent; an explicit null is a value
impl<T: DeepEq> DeepEq for Option<T> {
    fn deep_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.deep_eq(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T: DeepEq> DeepEq for [T] {
    fn deep_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.deep_eq(b))
    }
}

impl<T: DeepEq> DeepEq for Vec<T> {
    fn deep_eq(&self, other: &Self) -> bool {
        self.as_slice().deep_eq(other.as_slice())
    }
}
