//! Raw schema definitions
//!
//! A definition is the declarative input to compilation: a nested property
//! tree plus per-backend index lists and identifying metadata. The data shape
//! round-trips through serde; the executable parts (prepare transforms and
//! validator predicates) are attached through the builder API and are skipped
//! by serialization.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::index::{self, IndexDescriptor};
use crate::merge;

/// Derives a value for one property from the whole record
pub type PrepareFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Predicate over a present property value
pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// A named validator: a predicate plus an optional custom failure message.
///
/// The name feeds the generated message ("Validator <name> failed for
/// property <path>") when no custom message is supplied.
#[derive(Clone)]
pub struct ValidatorSpec {
    pub name: String,
    pub predicate: Predicate,
    pub message: Option<String>,
}

impl ValidatorSpec {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            message: None,
        }
    }

    /// Attach a custom message, reported instead of the generated one
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Debug for ValidatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorSpec")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A leaf property definition, identified by its `type`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LeafSpec {
    /// Declared value type (e.g. "string"); presence of this key is what
    /// makes a node a leaf
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Value to set at create time when the property is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Private properties are redacted by sanitize regardless of strict mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,

    #[serde(skip)]
    pub prepare: Option<PrepareFn>,

    #[serde(skip)]
    pub validators: Vec<ValidatorSpec>,
}

impl LeafSpec {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            required: None,
            default: None,
            private: None,
            prepare: None,
            validators: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = Some(true);
        self
    }

    pub fn private(mut self) -> Self {
        self.private = Some(true);
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn prepare(mut self, prepare: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.prepare = Some(Arc::new(prepare));
        self
    }

    pub fn validator(mut self, validator: ValidatorSpec) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    pub fn is_private(&self) -> bool {
        self.private.unwrap_or(false)
    }
}

impl fmt::Debug for LeafSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeafSpec")
            .field("type", &self.type_name)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("private", &self.private)
            .field("prepare", &self.prepare.is_some())
            .field("validators", &self.validators.len())
            .finish()
    }
}

/// One node of a property tree.
///
/// A node either terminates descent with a typed leaf, nests further path
/// segments, or carries several leaf variants under one name (rare, but a
/// definition may declare alternatives for the same path).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyNode {
    Leaf(LeafSpec),
    Repeat(Vec<PropertyNode>),
    Branch(BTreeMap<String, PropertyNode>),
}

impl From<LeafSpec> for PropertyNode {
    fn from(leaf: LeafSpec) -> Self {
        PropertyNode::Leaf(leaf)
    }
}

/// Walk a property tree, invoking `visit` exactly once per leaf with its
/// dot-joined path. Branches extend the path per child key; repeat members
/// share their parent's path.
pub fn walk<'a>(prefix: &str, node: &'a PropertyNode, visit: &mut dyn FnMut(&str, &'a LeafSpec)) {
    match node {
        PropertyNode::Leaf(leaf) => visit(prefix, leaf),
        PropertyNode::Repeat(members) => {
            for member in members {
                walk(prefix, member, visit);
            }
        }
        PropertyNode::Branch(children) => {
            for (key, child) in children {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                walk(&path, child, visit);
            }
        }
    }
}

/// A raw schema definition.
///
/// `name` and `version` are optional here so that extension overlays can omit
/// them; [`crate::Schema::new`] rejects a definition that still lacks either
/// after merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// When not explicitly false, undeclared record properties are stripped
    /// at save and sanitize time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, PropertyNode>,

    /// Backend name to ordered index declarations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, Vec<IndexDescriptor>>,

    /// Any other top-level definition keys; deep-merged on extension
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

impl SchemaDef {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
            ..Default::default()
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = Some(strict);
        self
    }

    pub fn property(mut self, name: impl Into<String>, node: impl Into<PropertyNode>) -> Self {
        self.properties.insert(name.into(), node.into());
        self
    }

    pub fn index(mut self, backend: impl Into<String>, descriptor: IndexDescriptor) -> Self {
        self.indexes.entry(backend.into()).or_default().push(descriptor);
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict != Some(false)
    }

    /// Collect every leaf with its dotted path, in tree order.
    pub fn leaves(&self) -> Vec<(String, &LeafSpec)> {
        let mut leaves = Vec::new();
        for (name, node) in &self.properties {
            walk(name, node, &mut |path, leaf| {
                leaves.push((path.to_string(), leaf));
            });
        }
        leaves
    }

    /// Build a new definition from this one plus overlays, applied left to
    /// right. Index lists merge through the index algebra exclusively; every
    /// other field deep-merges, with overlay values winning. Neither this
    /// definition nor any overlay is mutated.
    pub fn extended(&self, overlays: &[&SchemaDef]) -> SchemaDef {
        let mut merged = self.clone();
        // Indexes are held out of the generic merge and folded separately.
        let mut indexes = std::mem::take(&mut merged.indexes);
        for overlay in overlays {
            merged.merge_from(overlay);
            index::merge_indexes(&mut indexes, &overlay.indexes);
        }
        merged.indexes = indexes;
        merged
    }

    fn merge_from(&mut self, overlay: &SchemaDef) {
        if overlay.name.is_some() {
            self.name = overlay.name.clone();
        }
        if overlay.version.is_some() {
            self.version = overlay.version.clone();
        }
        if overlay.strict.is_some() {
            self.strict = overlay.strict;
        }
        for (key, node) in &overlay.properties {
            match self.properties.entry(key.clone()) {
                Entry::Occupied(mut entry) => merge_nodes(entry.get_mut(), node),
                Entry::Vacant(entry) => {
                    entry.insert(node.clone());
                }
            }
        }
        for (key, value) in &overlay.extras {
            match self.extras.entry(key.clone()) {
                Entry::Occupied(mut entry) if entry.get().is_object() && value.is_object() => {
                    merge::extend(true, entry.get_mut(), &[value]);
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
}

/// Deep-merge semantics over the property tree: matching branches merge
/// child-wise, matching leaves merge field-wise (overlay's explicit fields
/// win), anything else is replaced by the overlay wholesale.
fn merge_nodes(base: &mut PropertyNode, overlay: &PropertyNode) {
    match (base, overlay) {
        (PropertyNode::Branch(children), PropertyNode::Branch(overlay_children)) => {
            for (key, node) in overlay_children {
                match children.entry(key.clone()) {
                    Entry::Occupied(mut entry) => merge_nodes(entry.get_mut(), node),
                    Entry::Vacant(entry) => {
                        entry.insert(node.clone());
                    }
                }
            }
        }
        (PropertyNode::Leaf(leaf), PropertyNode::Leaf(overlay_leaf)) => {
            leaf.type_name = overlay_leaf.type_name.clone();
            if overlay_leaf.required.is_some() {
                leaf.required = overlay_leaf.required;
            }
            if overlay_leaf.private.is_some() {
                leaf.private = overlay_leaf.private;
            }
            if let Some(value) = &overlay_leaf.default {
                let mergeable = value.is_object()
                    && matches!(&leaf.default, Some(existing) if existing.is_object());
                if mergeable {
                    if let Some(existing) = leaf.default.as_mut() {
                        merge::extend(true, existing, &[value]);
                    }
                } else {
                    leaf.default = Some(value.clone());
                }
            }
            if overlay_leaf.prepare.is_some() {
                leaf.prepare = overlay_leaf.prepare.clone();
            }
            // Validator lists are atomic, like arrays under the deep merge.
            if !overlay_leaf.validators.is_empty() {
                leaf.validators = overlay_leaf.validators.clone();
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
