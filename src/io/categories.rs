//! Category registry exchange file.
//!
//! The registry is stored as a JSON list of `{id, name, color}` entries so
//! reopening a project reproduces the same category ids and colors.

use std::fs;
use std::path::Path;

use super::atomic::write_atomic;
use crate::error::EditorError;
use crate::model::CategoryRegistry;

/// File name of the registry written next to PASCAL VOC annotations.
pub const CATEGORY_REGISTRY_FILE: &str = "categories.json";

/// Writes a category registry to `path` atomically.
pub fn write_category_registry(path: &Path, registry: &CategoryRegistry) -> Result<(), EditorError> {
    let json = serde_json::to_string_pretty(registry).map_err(|source| EditorError::SimpleWrite {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

/// Reads a category registry written by [`write_category_registry`].
pub fn read_category_registry(path: &Path) -> Result<CategoryRegistry, EditorError> {
    let json = fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|source| EditorError::CategoryRegistryParse {
        path: path.to_path_buf(),
        source,
    })
}
