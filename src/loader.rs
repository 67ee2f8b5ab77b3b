//! Schema directory loader
//!
//! Walks a directory for `.json` definition files and returns raw
//! definitions keyed by schema name (file stem when a definition omits its
//! name). Prepare transforms and validator predicates cannot be expressed in
//! a data file; callers attach those through the builder API after loading.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::definition::SchemaDef;
use crate::error::{Result, SchemaError};

/// Load every `.json` schema definition under a directory (recursively).
pub fn load_dir(dir: impl AsRef<Path>) -> Result<BTreeMap<String, SchemaDef>> {
    let mut defs = BTreeMap::new();

    for entry in WalkDir::new(dir.as_ref()).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().map(|ext| ext != "json").unwrap_or(true) {
            continue;
        }

        let content = fs::read_to_string(path)?;
        let def: SchemaDef =
            serde_json::from_str(&content).map_err(|e| SchemaError::InvalidDefinition {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        let name = match &def.name {
            Some(name) => name.clone(),
            None => path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        tracing::debug!(schema = %name, file = %path.display(), "loaded schema definition");
        defs.insert(name, def);
    }

    Ok(defs)
}
