//! Dotted-path access into JSON records
//!
//! Property paths are dot-joined segment chains ("name.first", "auth.hash").
//! Absence of a key is distinct from a `null` value: a key set to `null` is
//! present, and only present values are visible to validators.

use serde_json::Value;

/// Look up the value at a dotted path, descending through objects only.
pub fn get<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set the value at a dotted path, creating intermediate objects as needed.
///
/// An intermediate that exists but is not an object blocks the write; the
/// record is left untouched in that case.
pub fn set(record: &mut Value, path: &str, value: Value) {
    let mut current = record;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }
}

/// Remove the value at a dotted path if present.
pub fn delete(record: &mut Value, path: &str) {
    let mut current = record;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(map) = current.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            map.remove(segment);
            return;
        }
        match map.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
}
