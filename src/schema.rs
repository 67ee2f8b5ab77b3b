//! Compiled schemas and their lifecycle pipelines
//!
//! A raw definition is compiled once, at construction, into an immutable
//! `Schema`. The schema exposes the standalone operations (`defaults`,
//! `prepare`, `validate`, `sanitize`), the save pipeline, hook-bus
//! registration, collection-option composition, and extension.
//!
//! `defaults`, `prepare`, `sanitize`, and the save pipeline mutate the record
//! they are given and hand the same record back: callers that need pristine
//! data must clone before calling.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::compiler::{self, Bucket, Compiled, SyncOp};
use crate::definition::SchemaDef;
use crate::error::{Result, SchemaError, ValidationError};
use crate::hooks::{HookBus, Priority};
use crate::index::IndexDescriptor;
use crate::path;

/// A fallible lifecycle operation for the asynchronous buckets; the first
/// `Err` in a sequence aborts the remainder and propagates verbatim.
pub type HookOp = Arc<dyn Fn(&mut Value) -> Result<()> + Send + Sync>;

/// A compiled schema: definition plus its lifecycle contributions.
pub struct Schema {
    def: SchemaDef,
    name: String,
    version: String,
    strict: bool,
    compiled: Compiled,
}

impl Schema {
    /// Compile a definition. Fails when it lacks a (non-empty) name or a
    /// version; every other well-formed definition constructs.
    pub fn new(def: SchemaDef) -> Result<Self> {
        let name = match def.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(SchemaError::MissingName),
        };
        let version = def.version.clone().ok_or(SchemaError::MissingVersion)?;
        let strict = def.is_strict();
        let compiled = compiler::compile(&def);
        Ok(Self {
            def,
            name,
            version,
            strict,
            compiled,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// The definition this schema was compiled from
    pub fn definition(&self) -> &SchemaDef {
        &self.def
    }

    pub fn indexes(&self) -> &BTreeMap<String, Vec<IndexDescriptor>> {
        &self.def.indexes
    }

    /// Dotted paths flagged private, in compile order
    pub fn private_properties(&self) -> &[String] {
        &self.compiled.private_properties
    }

    pub(crate) fn compiled(&self) -> &Compiled {
        &self.compiled
    }

    /// Apply create-time defaults to absent properties. Mutates and returns
    /// the record.
    pub fn defaults<'a>(&self, record: &'a mut Value) -> &'a mut Value {
        for op in &self.compiled.defaults {
            op(record);
        }
        record
    }

    /// Set derived values from their prepare transforms. Mutates and returns
    /// the record.
    pub fn prepare<'a>(&self, record: &'a mut Value) -> &'a mut Value {
        for op in &self.compiled.prepare {
            op(record);
        }
        record
    }

    /// Run every check, required checks first, and aggregate all failures in
    /// order. Unlike the save pipeline, this never short-circuits.
    pub fn validate(&self, record: &Value) -> std::result::Result<(), ValidationError> {
        let properties: Vec<_> = self
            .compiled
            .checks()
            .filter_map(|check| check(record))
            .collect();
        if properties.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { properties })
        }
    }

    /// Redact private properties, then (for strict schemas) strip undeclared
    /// properties. Mutates and returns the record.
    pub fn sanitize<'a>(&self, record: &'a mut Value) -> &'a mut Value {
        for name in &self.compiled.private_properties {
            path::delete(record, name);
        }
        if self.strict && !self.def.properties.is_empty() {
            compiler::filter_record(record, &self.def.properties);
        }
        record
    }

    /// Run the create bucket: the compiled contributions are the default
    /// setters. Synchronous, no completion signal.
    pub fn create(&self, record: &mut Value) {
        for op in &self.compiled.defaults {
            op(record);
        }
    }

    /// Run the save pipeline: prepare transforms, then checks (required
    /// first) short-circuiting on the first failure, then the strict filter
    /// and the version stamp.
    pub fn save(&self, record: &mut Value) -> Result<()> {
        for op in &self.compiled.prepare {
            op(record);
        }
        for check in self.compiled.checks() {
            if let Some(error) = check(record) {
                return Err(ValidationError::single(error).into());
            }
        }
        for op in &self.compiled.finishers {
            op(record);
        }
        Ok(())
    }

    /// The create bucket as a single synchronous operation handle
    pub fn create_op(&self) -> SyncOp {
        let defaults = self.compiled.defaults.clone();
        Arc::new(move |record| {
            for op in &defaults {
                op(record);
            }
        })
    }

    /// The save pipeline as a single fallible operation handle
    pub fn save_op(&self) -> HookOp {
        let prepare = self.compiled.prepare.clone();
        let required = self.compiled.required.clone();
        let validators = self.compiled.validators.clone();
        let finishers = self.compiled.finishers.clone();
        Arc::new(move |record| {
            for op in &prepare {
                op(record);
            }
            for check in required.iter().chain(validators.iter()) {
                if let Some(error) = check(record) {
                    return Err(ValidationError::single(error).into());
                }
            }
            for op in &finishers {
                op(record);
            }
            Ok(())
        })
    }

    /// Register this schema's contributions on a hook bus under
    /// `"schema:<name>:<bucket>"` channels: create contributions as event
    /// listeners, save contributions appended in pipeline order (prepare,
    /// required, validators, finishers), matching [`Schema::save`] exactly.
    /// `Priority::First` is left to callers that need to run ahead of the
    /// schema.
    pub fn register(&self, bus: &mut HookBus) {
        let create_channel = Bucket::Create.channel(&self.name);
        for op in &self.compiled.defaults {
            let op = op.clone();
            bus.on(&create_channel, move |record| op(record));
        }

        let save_channel = Bucket::Save.channel(&self.name);
        for op in &self.compiled.prepare {
            let op = op.clone();
            bus.add(&save_channel, Priority::Last, move |record| {
                op(record);
                Ok(())
            });
        }
        for check in &self.compiled.required {
            let check = check.clone();
            bus.add(&save_channel, Priority::Last, move |record| {
                match check(record) {
                    Some(error) => Err(ValidationError::single(error).into()),
                    None => Ok(()),
                }
            });
        }
        for check in &self.compiled.validators {
            let check = check.clone();
            bus.add(&save_channel, Priority::Last, move |record| {
                match check(record) {
                    Some(error) => Err(ValidationError::single(error).into()),
                    None => Ok(()),
                }
            });
        }
        for op in &self.compiled.finishers {
            let op = op.clone();
            bus.add(&save_channel, Priority::Last, move |record| {
                op(record);
                Ok(())
            });
        }

        tracing::debug!(
            schema = %self.name,
            save_handlers = bus.handler_count(&save_channel),
            create_listeners = bus.listener_count(&create_channel),
            "registered schema on hook bus"
        );
    }

    /// Fire the create event channel for this schema on a bus.
    pub fn create_via(&self, bus: &HookBus, record: &mut Value) {
        bus.emit(&Bucket::Create.channel(&self.name), record);
    }

    /// Compose collection options: our compiled behavior runs first; a
    /// caller-supplied callback for the same bucket runs after it, and for
    /// the fallible buckets only when ours succeeded.
    pub fn collection_options(&self, options: CollectionOptions) -> CollectionOptions {
        let mut options = options;
        options.private_properties = self.compiled.private_properties.clone();

        let ours = self.create_op();
        options.create = Some(match options.create.take() {
            Some(theirs) => Arc::new(move |record: &mut Value| {
                ours(record);
                theirs(record);
            }) as SyncOp,
            None => ours,
        });

        let ours = self.save_op();
        options.save = Some(match options.save.take() {
            Some(theirs) => Arc::new(move |record: &mut Value| {
                ours(record)?;
                theirs(record)
            }) as HookOp,
            None => ours,
        });

        options
    }

    /// Build a new schema from this one plus overlay definitions: index
    /// lists merge through the index algebra, everything else deep-merges,
    /// and the merged definition is recompiled from scratch with full
    /// construction checks. The base schema is left untouched.
    pub fn extend(&self, overlays: &[&SchemaDef]) -> Result<Schema> {
        Schema::new(self.def.extended(overlays))
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("strict", &self.strict)
            .field("private_properties", &self.compiled.private_properties)
            .finish_non_exhaustive()
    }
}

/// Lifecycle callbacks for a storage collection, composable with a schema's
/// compiled behavior. The buckets without compiled contributions pass the
/// caller's callbacks through untouched.
#[derive(Default, Clone)]
pub struct CollectionOptions {
    pub private_properties: Vec<String>,
    pub create: Option<SyncOp>,
    pub save: Option<HookOp>,
    pub after_save: Option<HookOp>,
    pub load: Option<HookOp>,
    pub destroy: Option<HookOp>,
    pub after_destroy: Option<HookOp>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for CollectionOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionOptions")
            .field("private_properties", &self.private_properties)
            .field("create", &self.create.is_some())
            .field("save", &self.save.is_some())
            .field("after_save", &self.after_save.is_some())
            .field("load", &self.load.is_some())
            .field("destroy", &self.destroy.is_some())
            .field("after_destroy", &self.after_destroy.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{LeafSpec, ValidatorSpec};
    use serde_json::json;

    fn minimal() -> SchemaDef {
        SchemaDef::new("p", "1").property("n", LeafSpec::new("string").default_value(json!("x")))
    }

    #[test]
    fn test_construction_requires_name_and_version() {
        let missing_name = SchemaDef {
            version: Some("1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Schema::new(missing_name),
            Err(SchemaError::MissingName)
        ));

        let empty_name = SchemaDef {
            name: Some(String::new()),
            version: Some("1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Schema::new(empty_name),
            Err(SchemaError::MissingName)
        ));

        let missing_version = SchemaDef {
            name: Some("p".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Schema::new(missing_version),
            Err(SchemaError::MissingVersion)
        ));

        assert!(Schema::new(minimal()).is_ok());
    }

    #[test]
    fn test_defaults_then_validate_scenario() {
        let schema = Schema::new(minimal()).unwrap();

        let mut record = json!({});
        schema.defaults(&mut record);
        assert_eq!(record, json!({"n": "x"}));

        // No required declared: the empty record validates clean.
        assert!(schema.validate(&json!({})).is_ok());

        // Adding required to the same leaf yields one aggregated failure.
        let required =
            SchemaDef::new("p", "1").property("n", LeafSpec::new("string").required());
        let schema = Schema::new(required).unwrap();
        let err = schema.validate(&json!({})).unwrap_err();
        assert_eq!(err.properties.len(), 1);
        assert_eq!(err.properties[0].path, "n");
    }

    #[test]
    fn test_validate_aggregates_all_failures() {
        let def = SchemaDef::new("p", "1")
            .property("a", LeafSpec::new("string").required())
            .property(
                "b",
                LeafSpec::new("string").validator(ValidatorSpec::new("never", |_| false)),
            );
        let schema = Schema::new(def).unwrap();
        let err = schema.validate(&json!({"b": "present"})).unwrap_err();
        let paths: Vec<_> = err.properties.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["a", "b"]);
    }

    #[test]
    fn test_save_short_circuits_on_first_failure() {
        let def = SchemaDef::new("p", "1")
            .property("a", LeafSpec::new("string").required())
            .property(
                "b",
                LeafSpec::new("string").validator(ValidatorSpec::new("never", |_| false)),
            );
        let schema = Schema::new(def).unwrap();
        let mut record = json!({"b": "present"});
        let err = schema.save(&mut record).unwrap_err();
        let SchemaError::Validation(err) = err else {
            panic!("expected validation error");
        };
        assert_eq!(err.properties.len(), 1);
        assert_eq!(err.properties[0].path, "a");
        // The pipeline aborted before the version stamp.
        assert_eq!(record.get("_version"), None);
    }

    #[test]
    fn test_save_stamps_version_even_when_lax() {
        let def = SchemaDef::new("p", "2.0").strict(false);
        let schema = Schema::new(def).unwrap();
        let mut record = json!({"free": "form"});
        schema.save(&mut record).unwrap();
        assert_eq!(record, json!({"free": "form", "_version": "2.0"}));
    }

    #[test]
    fn test_save_strict_filter_spares_version_stamp() {
        let def = SchemaDef::new("p", "1").property("id", LeafSpec::new("number"));
        let schema = Schema::new(def).unwrap();
        let mut record = json!({"id": 1, "junk": true});
        schema.save(&mut record).unwrap();
        assert_eq!(record, json!({"id": 1, "_version": "1"}));
    }

    #[test]
    fn test_sanitize_redacts_private_regardless_of_strict() {
        let def: SchemaDef = serde_json::from_value(json!({
            "name": "p",
            "version": "1",
            "strict": false,
            "properties": {
                "auth": {
                    "hash": {"type": "string", "private": true}
                }
            }
        }))
        .unwrap();
        let schema = Schema::new(def).unwrap();
        assert_eq!(schema.private_properties(), ["auth.hash"]);

        let mut record = json!({"auth": {"hash": "h"}, "undeclared": 1});
        schema.sanitize(&mut record);
        // Private redaction applies, strict filtering does not.
        assert_eq!(record, json!({"auth": {}, "undeclared": 1}));
    }

    #[test]
    fn test_sanitize_strict_strips_undeclared() {
        let def: SchemaDef = serde_json::from_value(json!({
            "name": "p",
            "version": "1",
            "properties": {
                "id": {"type": "number"},
                "name": {
                    "first": {"type": "string"},
                    "last": {"type": "string"}
                }
            }
        }))
        .unwrap();
        let schema = Schema::new(def).unwrap();
        let mut record = json!({
            "id": 1,
            "name": {"first": "A", "extra": "x"},
            "other": "y"
        });
        schema.sanitize(&mut record);
        assert_eq!(record, json!({"id": 1, "name": {"first": "A"}}));
    }

    #[test]
    fn test_collection_options_ours_then_theirs() {
        let schema = Schema::new(minimal()).unwrap();
        let mut caller = CollectionOptions::new();
        caller.create = Some(Arc::new(|record: &mut Value| {
            // Runs second: the compiled default is already in place.
            record["after"] = record["n"].clone();
        }));
        caller.save = Some(Arc::new(|record: &mut Value| {
            record["caller_saved"] = json!(true);
            Ok(())
        }));

        let options = schema.collection_options(caller);
        let mut record = json!({});
        (options.create.as_ref().unwrap())(&mut record);
        assert_eq!(record["after"], json!("x"));

        (options.save.as_ref().unwrap())(&mut record).unwrap();
        assert_eq!(record["caller_saved"], json!(true));
        assert_eq!(record["_version"], json!("1"));
    }

    #[test]
    fn test_collection_options_skips_theirs_on_failure() {
        let def = SchemaDef::new("p", "1").property("id", LeafSpec::new("string").required());
        let schema = Schema::new(def).unwrap();
        let mut caller = CollectionOptions::new();
        caller.save = Some(Arc::new(|record: &mut Value| {
            record["caller_saved"] = json!(true);
            Ok(())
        }));

        let options = schema.collection_options(caller);
        let mut record = json!({});
        assert!((options.save.as_ref().unwrap())(&mut record).is_err());
        assert_eq!(record.get("caller_saved"), None);
    }

    #[test]
    fn test_register_runs_pipeline_order() {
        let def = SchemaDef::new("p", "1")
            .property("id", LeafSpec::new("string").required())
            .property(
                "full",
                LeafSpec::new("string").prepare(|_| json!("derived")),
            );
        let schema = Schema::new(def).unwrap();
        let mut bus = HookBus::new();
        schema.register(&mut bus);

        // The required check fires after the prepare transforms, so the
        // failing record has already picked up its derived value.
        let mut record = json!({});
        let err = bus.run_series("schema:p:save", &mut record).unwrap_err();
        assert!(matches!(err, SchemaError::Validation(_)));
        assert_eq!(record, json!({"full": "derived"}));
        assert_eq!(record.get("_version"), None);

        let mut record = json!({"id": "a"});
        bus.run_series("schema:p:save", &mut record).unwrap();
        assert_eq!(record["full"], json!("derived"));
        assert_eq!(record["_version"], json!("1"));
    }

    #[test]
    fn test_register_save_channel_matches_direct_save() {
        // A required leaf whose value comes from its own prepare transform
        // must save through the bus exactly as it does directly.
        let def = SchemaDef::new("p", "1").property(
            "full",
            LeafSpec::new("string").required().prepare(|_| json!("derived")),
        );
        let schema = Schema::new(def).unwrap();

        let mut direct = json!({});
        schema.save(&mut direct).unwrap();

        let mut bus = HookBus::new();
        schema.register(&mut bus);
        let mut hooked = json!({});
        bus.run_series("schema:p:save", &mut hooked).unwrap();

        assert_eq!(direct, hooked);
        assert_eq!(hooked["full"], json!("derived"));
    }

    #[test]
    fn test_create_via_bus() {
        let schema = Schema::new(minimal()).unwrap();
        let mut bus = HookBus::new();
        schema.register(&mut bus);
        let mut record = json!({});
        schema.create_via(&bus, &mut record);
        assert_eq!(record, json!({"n": "x"}));
    }

    #[test]
    fn test_extend_recompiles_with_checks() {
        let schema = Schema::new(minimal()).unwrap();
        let overlay = SchemaDef {
            version: Some("2".to_string()),
            ..Default::default()
        };
        let extended = schema.extend(&[&overlay]).unwrap();
        assert_eq!(extended.version(), "2");
        assert_eq!(schema.version(), "1");

        // An overlay cannot strip name/version, but a base without them
        // cannot be extended into a schema either.
        let nameless = SchemaDef::default();
        assert!(matches!(
            Schema::new(nameless.clone()).err(),
            Some(SchemaError::MissingName)
        ));
    }
}
