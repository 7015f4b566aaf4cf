//! Dot-path access into JSON attribute maps.
//!
//! Paths look like `"title"`, `"owner.email"` or `"0.attribute_value"`.
//! A segment that parses as an integer indexes into an array; otherwise it
//! is an object key.

use serde_json::{Map, Value};

/// Look up a dot-path. `None` means the path does not exist.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Write `value` at a dot-path. `None` removes the field.
///
/// Missing intermediate nodes are created as objects. Writing through a
/// scalar replaces it with an object. Array segments past the end are
/// ignored, as are removals of paths that do not exist.
pub fn set_path(root: &mut Value, path: &str, value: Option<Value>) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(last) = segments.pop() else {
        return;
    };

    let mut node = root;
    for segment in segments {
        node = match child_mut(node, segment, value.is_some()) {
            Some(child) => child,
            None => return,
        };
    }

    match (node, value) {
        (Value::Array(items), value) => {
            if let Ok(i) = last.parse::<usize>() {
                if let Some(slot) = items.get_mut(i) {
                    *slot = value.unwrap_or(Value::Null);
                }
            }
        }
        (Value::Object(map), Some(value)) => {
            map.insert(last.to_string(), value);
        }
        (Value::Object(map), None) => {
            map.remove(last);
        }
        (node, Some(value)) => {
            let mut map = Map::new();
            map.insert(last.to_string(), value);
            *node = Value::Object(map);
        }
        (_, None) => {}
    }
}

fn child_mut<'a>(node: &'a mut Value, segment: &str, create: bool) -> Option<&'a mut Value> {
    if !node.is_object() && !node.is_array() {
        if !create {
            return None;
        }
        *node = Value::Object(Map::new());
    }

    match node {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        Value::Object(map) => {
            if create {
                Some(
                    map.entry(segment.to_string())
                        .or_insert_with(|| Value::Object(Map::new())),
                )
            } else {
                map.get_mut(segment)
            }
        }
        _ => None,
    }
}
