//! Deep-merge engine for JSON objects
//!
//! Two variants over the same recursion: [`extend`] overwrites target keys
//! with source keys, [`fill_defaults`] only fills keys the target lacks.
//! Recursion happens only when both sides are plain objects; arrays and every
//! other value are atomic. Source values are cloned on insert, so merge
//! output never aliases a source object.

use serde_json::map::Entry;
use serde_json::Value;

/// Merge one or more sources into `target`, left to right. Later sources win
/// ties. With `deep`, object values common to both sides merge recursively.
pub fn extend(deep: bool, target: &mut Value, sources: &[&Value]) {
    for source in sources {
        extend_one(deep, target, source);
    }
}

fn extend_one(deep: bool, target: &mut Value, source: &Value) {
    let Some(source) = source.as_object() else {
        return;
    };
    let Some(map) = target.as_object_mut() else {
        return;
    };
    for (key, value) in source {
        match map.entry(key.clone()) {
            Entry::Occupied(mut entry) if deep && entry.get().is_object() && value.is_object() => {
                extend_one(deep, entry.get_mut(), value);
            }
            Entry::Occupied(mut entry) => {
                entry.insert(value.clone());
            }
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
            }
        }
    }
}

/// Fill `target` with defaults from one or more sources, left to right. Keys
/// the target already defines are kept; with `deep`, object values common to
/// both sides are filled recursively.
pub fn fill_defaults(deep: bool, target: &mut Value, sources: &[&Value]) {
    for source in sources {
        fill_one(deep, target, source);
    }
}

fn fill_one(deep: bool, target: &mut Value, source: &Value) {
    let Some(source) = source.as_object() else {
        return;
    };
    let Some(map) = target.as_object_mut() else {
        return;
    };
    for (key, value) in source {
        match map.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if deep && entry.get().is_object() && value.is_object() {
                    fill_one(deep, entry.get_mut(), value);
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shallow_extend() {
        let mut target = json!({"a": {"x": 1}, "b": 2});
        extend(false, &mut target, &[&json!({"a": {"y": 2}, "c": 3})]);
        assert_eq!(target, json!({"a": {"y": 2}, "b": 2, "c": 3}));
    }

    #[test]
    fn test_deep_extend() {
        let mut target = json!({"a": {"x": 1, "y": 1}});
        extend(true, &mut target, &[&json!({"a": {"y": 2, "z": 3}})]);
        assert_eq!(target, json!({"a": {"x": 1, "y": 2, "z": 3}}));
    }

    #[test]
    fn test_disjoint_keys_commute() {
        let mut a = json!({"a": 1});
        extend(true, &mut a, &[&json!({"b": 2})]);
        let mut b = json!({"b": 2});
        extend(true, &mut b, &[&json!({"a": 1})]);
        assert_eq!(a, b);
        assert_eq!(a, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_arrays_are_atomic() {
        let mut target = json!({"tags": [1, 2], "a": {"list": [1]}});
        extend(true, &mut target, &[&json!({"tags": [3], "a": {"list": [2]}})]);
        assert_eq!(target, json!({"tags": [3], "a": {"list": [2]}}));
    }

    #[test]
    fn test_multiple_sources_later_wins() {
        let mut target = json!({});
        extend(true, &mut target, &[&json!({"a": 1, "b": 1}), &json!({"b": 2})]);
        assert_eq!(target, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_fill_defaults_target_wins() {
        let mut target = json!({"a": 1, "nested": {"x": 1}});
        fill_defaults(
            true,
            &mut target,
            &[&json!({"a": 9, "b": 2, "nested": {"x": 9, "y": 2}})],
        );
        assert_eq!(target, json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 2}}));
    }

    #[test]
    fn test_no_aliasing_of_sources() {
        let source = json!({"nested": {"x": 1}});
        let mut target = json!({});
        extend(true, &mut target, &[&source]);
        // Mutating the merge output must not reach back into the source.
        target["nested"]["x"] = json!(99);
        assert_eq!(source, json!({"nested": {"x": 1}}));
    }

    #[test]
    fn test_null_replaces_under_extend() {
        let mut target = json!({"a": {"x": 1}});
        extend(true, &mut target, &[&json!({"a": null})]);
        assert_eq!(target, json!({"a": null}));
    }
}
