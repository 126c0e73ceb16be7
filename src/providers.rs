//! External registries: compilation platforms and building blocks
//!
//! Both registries are loaded once per run and treated as immutable: the
//! platform set comes from the OS tree on disk, the building-block catalog
//! from a comment-tolerant JSON description next to the templates.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::campaign::strip_comments;
use crate::patch::ReplacementSet;

/// Subdirectory of the OS tree holding one folder per platform.
const PLATFORM_DIR: &str = "platform";

/// Valid compilation targets: the platform folder names of the OS tree.
pub fn available_platforms(os_root: &Path) -> io::Result<Vec<String>> {
    let mut platforms = Vec::new();
    for entry in fs::read_dir(os_root.join(PLATFORM_DIR))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            platforms.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    platforms.sort();
    Ok(platforms)
}

/// Errors raised while loading the building-block catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("building-block catalog does not exist: {0}")]
    NotFound(PathBuf),
    #[error("failed to read building-block catalog: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse building-block catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Available building blocks for the malicious mote, keyed by block name
///
/// Each block maps field names to values. Upper-case names that are not
/// source filenames define constants; every other name is a file-scoped
/// text replacement `{"filename": ["search", "replace"]}`.
#[derive(Debug, Clone, Default)]
pub struct BlockCatalog {
    blocks: BTreeMap<String, BTreeMap<String, Value>>,
}

impl BlockCatalog {
    /// Load the catalog from a comment-tolerant JSON file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        Self::from_value(serde_json::from_str(&strip_comments(&text))?)
    }

    /// Build the catalog from an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, CatalogError> {
        Ok(Self {
            blocks: serde_json::from_value(value)?,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Split the bindings of the selected blocks into constant definitions
    /// and per-file source replacements.
    ///
    /// A constant already defined by an earlier block keeps its first value;
    /// a source line already replaced in the same file is not replaced
    /// twice. Both collisions are reported.
    pub fn constants_and_replacements(
        &self,
        selected: &[String],
    ) -> (BTreeMap<String, Value>, ReplacementSet) {
        let mut constants: BTreeMap<String, Value> = BTreeMap::new();
        let mut replacements = ReplacementSet::new();
        for block in selected {
            let bindings = match self.blocks.get(block) {
                Some(bindings) => bindings,
                None => continue,
            };
            for (key, value) in bindings {
                if is_constant_key(key) {
                    if let Some(existing) = constants.get(key) {
                        warn!("building-block '{block}': '{key}' is already set to {existing}");
                    } else {
                        constants.insert(key.clone(), value.clone());
                    }
                    continue;
                }
                let pair = match serde_json::from_value::<(String, String)>(value.clone()) {
                    Ok(pair) => pair,
                    Err(_) => {
                        warn!(
                            "building-block '{block}': '{key}' is not a [search, replace] pair (skipped)"
                        );
                        continue;
                    }
                };
                let already_replaced = replacements.contains_key(key)
                    && replacements.values().any(|(search, _)| *search == pair.0);
                if already_replaced {
                    warn!(
                        "building-block '{block}': line '{}' is already replaced in {key}",
                        pair.0
                    );
                } else {
                    replacements.insert(key.clone(), pair);
                }
            }
        }
        (constants, replacements)
    }
}

/// Constant definitions are upper-case keys that are not source filenames.
fn is_constant_key(key: &str) -> bool {
    key.to_uppercase() == key && !key.ends_with(".c") && !key.ends_with(".h")
}
