//! Schema compilation
//!
//! A single pass over a definition's leaves contributes closures into the
//! lifecycle buckets: defaults (create time), prepare transforms, required
//! checks, validators, plus the schema-level strict filter and version stamp
//! that close out the save sequence. The output is immutable; extension never
//! patches compiled state, it recompiles a freshly merged definition.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::definition::{PropertyNode, SchemaDef};
use crate::error::PropertyError;
use crate::path;

/// A synchronous record mutation (create-time defaults, prepare transforms,
/// the save tail). No completion signal.
pub type SyncOp = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// A per-property check: `None` means pass. Shared by the aggregating
/// `validate` operation and the short-circuiting save pipeline.
pub type CheckOp = Arc<dyn Fn(&Value) -> Option<PropertyError> + Send + Sync>;

/// The six lifecycle phases a schema contributes behavior to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Create,
    Save,
    AfterSave,
    Load,
    Destroy,
    AfterDestroy,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Create,
        Bucket::Save,
        Bucket::AfterSave,
        Bucket::Load,
        Bucket::Destroy,
        Bucket::AfterDestroy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Bucket::Create => "create",
            Bucket::Save => "save",
            Bucket::AfterSave => "afterSave",
            Bucket::Load => "load",
            Bucket::Destroy => "destroy",
            Bucket::AfterDestroy => "afterDestroy",
        }
    }

    /// Hook channel key for this bucket of a named schema
    pub fn channel(&self, schema: &str) -> String {
        format!("schema:{}:{}", schema, self.name())
    }
}

/// Compiled lifecycle contributions for one schema definition.
#[derive(Default)]
pub struct Compiled {
    /// Create-time default setters, registration order
    pub defaults: Vec<SyncOp>,
    /// Derived-value transforms, registration order
    pub prepare: Vec<SyncOp>,
    /// Required-presence checks; front-inserted so they always precede
    /// validators and report before them
    pub required: Vec<CheckOp>,
    /// Per-leaf validator checks, registration order
    pub validators: Vec<CheckOp>,
    /// Save tail: strict filter (when enabled) then the version stamp, which
    /// is always last so filtering can never strip it
    pub finishers: Vec<SyncOp>,
    /// Dotted paths flagged private, ordered, deduplicated
    pub private_properties: Vec<String>,
}

impl Compiled {
    /// All checks in report order: required first, then validators.
    pub fn checks(&self) -> impl Iterator<Item = &CheckOp> {
        self.required.iter().chain(self.validators.iter())
    }
}

/// Compile a definition's property tree into lifecycle contributions.
///
/// Usable standalone when only the bucket structure is wanted; `Schema::new`
/// layers the name/version construction checks on top.
pub fn compile(def: &SchemaDef) -> Compiled {
    let mut compiled = Compiled::default();

    for (path, leaf) in def.leaves() {
        if leaf.is_private() && !compiled.private_properties.contains(&path) {
            compiled.private_properties.push(path.clone());
        }

        if let Some(default) = leaf.default.clone() {
            let path = path.clone();
            compiled.defaults.push(Arc::new(move |record| {
                if path::get(record, &path).is_none() {
                    path::set(record, &path, default.clone());
                }
            }));
        }

        if let Some(prepare) = leaf.prepare.clone() {
            let path = path.clone();
            compiled.prepare.push(Arc::new(move |record| {
                let value = prepare(record);
                path::set(record, &path, value);
            }));
        }

        if leaf.is_required() {
            let path = path.clone();
            compiled.required.insert(
                0,
                Arc::new(move |record| {
                    if path::get(record, &path).is_none() {
                        Some(PropertyError::missing(&path))
                    } else {
                        None
                    }
                }),
            );
        }

        if !leaf.validators.is_empty() {
            let validators = leaf.validators.clone();
            compiled.validators.push(Arc::new(move |record| {
                // Validators only run against present values.
                let value = path::get(record, &path)?;
                for validator in &validators {
                    if !(validator.predicate)(value) {
                        return Some(match &validator.message {
                            Some(message) => PropertyError::custom(&path, message),
                            None => PropertyError::failed(&path, &validator.name),
                        });
                    }
                }
                None
            }));
        }
    }

    if def.is_strict() && !def.properties.is_empty() {
        let properties = def.properties.clone();
        compiled.finishers.push(Arc::new(move |record| {
            filter_record(record, &properties);
        }));
    }

    if let Some(version) = def.version.clone() {
        compiled.finishers.push(Arc::new(move |record| {
            if let Some(map) = record.as_object_mut() {
                map.insert("_version".to_string(), Value::String(version.clone()));
            }
        }));
    }

    tracing::debug!(
        schema = def.name.as_deref().unwrap_or("<unnamed>"),
        defaults = compiled.defaults.len(),
        prepare = compiled.prepare.len(),
        required = compiled.required.len(),
        validators = compiled.validators.len(),
        private = compiled.private_properties.len(),
        "compiled schema definition"
    );

    compiled
}

/// Strict structural whitelist: recursively delete record keys the property
/// tree does not declare. Values under a leaf or repeat position are kept
/// as-is; only branches are descended.
pub fn filter_record(record: &mut Value, properties: &BTreeMap<String, PropertyNode>) {
    let Some(map) = record.as_object_mut() else {
        return;
    };
    map.retain(|key, _| properties.contains_key(key));
    for (key, value) in map.iter_mut() {
        if let Some(PropertyNode::Branch(children)) = properties.get(key) {
            filter_record(value, children);
        }
    }
}
