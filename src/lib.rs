//! Model Schemas
//!
//! Compiles declarative, nested schema definitions into the ordered lifecycle
//! pipelines a record-storage layer invokes around persistence, plus the
//! standalone operations `defaults`, `prepare`, `validate`, and `sanitize`.
//!
//! ## Features
//!
//! - **Property trees**: nested definitions with dotted leaf paths
//!   (`name.first`, `auth.hash`), defaults, prepare transforms, required
//!   flags, validators, and private redaction
//! - **Lifecycle buckets**: create, save, afterSave, load, destroy,
//!   afterDestroy, with deterministic ordering and short-circuit failure
//! - **Strict mode**: undeclared record properties are stripped at save and
//!   sanitize time
//! - **Extension**: derive a schema from a base plus overlays with deep-merge
//!   semantics and field-set-aware index merging
//! - **Hook bus**: explicit named-channel registry for lifecycle handlers,
//!   one per application context
//!
//! ## Example
//!
//! ```
//! use model_schemas::{LeafSpec, Schema, SchemaDef};
//! use serde_json::json;
//!
//! let def = SchemaDef::new("user", "1.0")
//!     .property("id", LeafSpec::new("string").required())
//!     .property("role", LeafSpec::new("string").default_value(json!("member")));
//! let schema = Schema::new(def).unwrap();
//!
//! let mut record = json!({"id": "u1"});
//! schema.defaults(&mut record);
//! schema.save(&mut record).unwrap();
//! assert_eq!(record["role"], json!("member"));
//! assert_eq!(record["_version"], json!("1.0"));
//! ```

pub mod attach;
pub mod compiler;
pub mod definition;
pub mod error;
pub mod hooks;
pub mod index;
pub mod loader;
pub mod merge;
pub mod path;
pub mod schema;

pub use attach::{Collection, Indexer, IndexerRegistry, SchemaOps};
pub use compiler::{Bucket, CheckOp, Compiled, SyncOp};
pub use definition::{LeafSpec, PropertyNode, SchemaDef, ValidatorSpec};
pub use error::{PropertyError, Result, SchemaError, ValidationError};
pub use hooks::{HookBus, Priority};
pub use index::IndexDescriptor;
pub use loader::load_dir;
pub use schema::{CollectionOptions, HookOp, Schema};
