//! Index descriptors and the index-merge algebra
//!
//! Index lists never go through the generic deep merge. Two descriptors over
//! the same field set are "the same index": merging replaces the existing
//! entry in place (position preserved, keys and options updated) instead of
//! appending a duplicate. Independent indexes accumulate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

type KeyMap = serde_json::Map<String, Value>;

/// A backend index declaration: a key-map (field name to direction or other
/// backend-specific value) plus optional backend options.
///
/// Serializes as a bare key-map, or as a `[keys, options]` pair when options
/// are present, matching the declarative forms schemas are written in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "IndexForm", into = "IndexForm")]
pub struct IndexDescriptor {
    pub keys: KeyMap,
    pub options: Option<KeyMap>,
}

impl IndexDescriptor {
    /// Descriptor with keys only
    pub fn new(keys: KeyMap) -> Self {
        Self { keys, options: None }
    }

    /// Descriptor with keys and backend options
    pub fn with_options(keys: KeyMap, options: KeyMap) -> Self {
        Self {
            keys,
            options: Some(options),
        }
    }

    /// Field-set identity: sorted, space-joined field names of the key-map.
    /// Two descriptors with equal identities describe the same index.
    pub fn field_set(&self) -> String {
        let mut names: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(" ")
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IndexForm {
    Pair(KeyMap, KeyMap),
    Keys(KeyMap),
}

impl From<IndexForm> for IndexDescriptor {
    fn from(form: IndexForm) -> Self {
        match form {
            IndexForm::Pair(keys, options) => IndexDescriptor::with_options(keys, options),
            IndexForm::Keys(keys) => IndexDescriptor::new(keys),
        }
    }
}

impl From<IndexDescriptor> for IndexForm {
    fn from(descriptor: IndexDescriptor) -> Self {
        match descriptor.options {
            Some(options) => IndexForm::Pair(descriptor.keys, options),
            None => IndexForm::Keys(descriptor.keys),
        }
    }
}

/// Merge a source index list into a target list: replace in place on
/// field-set identity match, append otherwise. Source order is preserved.
pub fn merge_list(target: &mut Vec<IndexDescriptor>, source: &[IndexDescriptor]) {
    for index in source {
        let identity = index.field_set();
        let position = target
            .iter()
            .position(|existing| existing.field_set() == identity);
        match position {
            Some(i) => target[i] = index.clone(),
            None => target.push(index.clone()),
        }
    }
}

/// Merge per-backend index lists from `source` into `target`.
pub fn merge_indexes(
    target: &mut BTreeMap<String, Vec<IndexDescriptor>>,
    source: &BTreeMap<String, Vec<IndexDescriptor>>,
) {
    for (backend, list) in source {
        merge_list(target.entry(backend.clone()).or_default(), list);
    }
}
