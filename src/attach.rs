//! Attaching schemas to storage collections
//!
//! A collection receives operation handles for `sanitize`, `defaults`,
//! `prepare`, and `validate` (no-ops for an empty schema), and index creation
//! is delegated to the indexer registered for the collection's backend. A
//! declared backend with no registered indexer is reported as an error from
//! `attach`, never a panic.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::compiler::{self, SyncOp};
use crate::error::{Result, SchemaError, ValidationError};
use crate::index::IndexDescriptor;
use crate::path;
use crate::schema::Schema;

/// Aggregating validate operation handle
pub type ValidateOp = Arc<dyn Fn(&Value) -> std::result::Result<(), ValidationError> + Send + Sync>;

/// Operation handles a schema installs onto a collection.
#[derive(Clone)]
pub struct SchemaOps {
    pub sanitize: SyncOp,
    pub defaults: SyncOp,
    pub prepare: SyncOp,
    pub validate: ValidateOp,
}

impl std::fmt::Debug for SchemaOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaOps").finish_non_exhaustive()
    }
}

/// A storage collection a schema can attach to. Implementations declare
/// their backend type and accept the schema's operation handles.
pub trait Collection {
    /// Backend type name, matched against the schema's index declarations
    /// and the indexer registry (e.g. "mongo")
    fn backend(&self) -> &str;

    /// Receive the schema's operation handles
    fn install(&mut self, ops: SchemaOps);
}

/// Creates backend indexes for a collection from the schema's declarations
pub type Indexer = Arc<dyn Fn(&mut dyn Collection, &[IndexDescriptor]) -> Result<()> + Send + Sync>;

/// Backend name to indexer function.
#[derive(Default, Clone)]
pub struct IndexerRegistry {
    indexers: HashMap<String, Indexer>,
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        backend: impl Into<String>,
        indexer: impl Fn(&mut dyn Collection, &[IndexDescriptor]) -> Result<()> + Send + Sync + 'static,
    ) {
        self.indexers.insert(backend.into(), Arc::new(indexer));
    }

    pub fn get(&self, backend: &str) -> Option<&Indexer> {
        self.indexers.get(backend)
    }
}

impl std::fmt::Debug for IndexerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerRegistry")
            .field("backends", &self.indexers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Schema {
    /// Operation handles over this schema's compiled state. Handles stay
    /// valid independently of the schema value they came from.
    pub fn ops(&self) -> SchemaOps {
        let compiled = self.compiled();

        let private = compiled.private_properties.clone();
        let strict = self.is_strict();
        let properties = self.definition().properties.clone();
        let sanitize: SyncOp = Arc::new(move |record| {
            for name in &private {
                path::delete(record, name);
            }
            if strict && !properties.is_empty() {
                compiler::filter_record(record, &properties);
            }
        });

        let ops = compiled.defaults.clone();
        let defaults: SyncOp = Arc::new(move |record| {
            for op in &ops {
                op(record);
            }
        });

        let ops = compiled.prepare.clone();
        let prepare: SyncOp = Arc::new(move |record| {
            for op in &ops {
                op(record);
            }
        });

        let required = compiled.required.clone();
        let validators = compiled.validators.clone();
        let validate: ValidateOp = Arc::new(move |record| {
            let properties: Vec<_> = required
                .iter()
                .chain(validators.iter())
                .filter_map(|check| check(record))
                .collect();
            if properties.is_empty() {
                Ok(())
            } else {
                Err(ValidationError { properties })
            }
        });

        SchemaOps {
            sanitize,
            defaults,
            prepare,
            validate,
        }
    }

    /// Install this schema's operations on a collection and create any
    /// indexes declared for the collection's backend.
    pub fn attach(&self, collection: &mut dyn Collection, indexers: &IndexerRegistry) -> Result<()> {
        collection.install(self.ops());

        let backend = collection.backend().to_string();
        if let Some(indexes) = self.indexes().get(&backend) {
            let Some(indexer) = indexers.get(&backend) else {
                return Err(SchemaError::UnsupportedIndexBackend { backend });
            };
            tracing::debug!(
                schema = %self.name(),
                backend = %backend,
                indexes = indexes.len(),
                "creating schema indexes"
            );
            indexer(collection, indexes)?;
        }
        Ok(())
    }
}
