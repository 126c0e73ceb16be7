//! File-structure schema validation
//!
//! Compares an on-disk directory tree against a declarative schema of
//! expected entries, optionally creating missing structure and pruning
//! unexpected entries. The check is a pure recursive pass over an immutable
//! schema: conformance is computed and returned, never written back into the
//! schema, so one schema value can validate any number of trees.
//!
//! Directory access goes through the [`DirAccess`] trait so matching logic
//! can be unit-tested without touching a real filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Schema key accepting any content beneath a directory without inspection.
pub const MATCH_ANY: &str = "*";

/// Errors raised while walking or healing a directory tree
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SchemaError {
    fn io(path: &Path, source: io::Error) -> Self {
        SchemaError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Declarative description of the expected content of a directory tree
///
/// Keys of a [`Schema::Dir`] are either literal entry names or suffix
/// wildcards of the form `stem.*`, which match `stem.ext` for any non-empty
/// extension but not the bare `stem`.
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// A file entry; required entries must be matched for the tree to conform
    File { required: bool },
    /// A nested directory with its own expected entries
    Dir(BTreeMap<String, Schema>),
}

impl Schema {
    /// A file that must exist.
    pub fn required() -> Self {
        Schema::File { required: true }
    }

    /// A file that may exist.
    pub fn optional() -> Self {
        Schema::File { required: false }
    }

    /// A directory with the given expected entries.
    pub fn dir<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Schema)>,
    {
        Schema::Dir(
            entries
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        )
    }

    /// A directory whose content is accepted without inspection.
    pub fn any_dir() -> Self {
        Schema::dir([(MATCH_ANY, Schema::optional())])
    }

    /// True if this subtree transitively requires any file.
    fn requires_content(&self) -> bool {
        match self {
            Schema::File { required } => *required,
            Schema::Dir(entries) => entries.values().any(Schema::requires_content),
        }
    }
}

/// Directory access used by the conformance check
///
/// The production implementation is [`DiskAccess`]; tests inject an
/// in-memory tree.
pub trait DirAccess {
    fn exists(&self, path: &Path) -> bool;
    fn list(&self, path: &Path) -> io::Result<Vec<String>>;
    fn create_dir(&mut self, path: &Path) -> io::Result<()>;
    /// Remove a file or a whole directory.
    fn remove(&mut self, path: &Path) -> io::Result<()>;
}

/// [`DirAccess`] over the real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskAccess;

impl DirAccess for DiskAccess {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn list(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn create_dir(&mut self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn remove(&mut self, path: &Path) -> io::Result<()> {
        if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }
}

/// Options controlling the healing side effects of a check
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Create missing directories instead of failing on them
    pub create: bool,
    /// Delete entries the schema does not expect
    pub remove: bool,
}

impl CheckOptions {
    /// Validation only: no creation, no removal.
    pub fn validate() -> Self {
        Self::default()
    }

    /// Create missing directories while checking.
    pub fn create() -> Self {
        Self {
            create: true,
            remove: false,
        }
    }
}

/// Check `path` against `schema`, optionally healing the tree.
///
/// Returns whether the tree conforms after any healing. Both healing modes
/// are idempotent: a second run with the same options reports the same
/// result and performs no further filesystem changes.
pub fn check(
    access: &mut dyn DirAccess,
    path: &Path,
    schema: &Schema,
    options: CheckOptions,
) -> Result<bool, SchemaError> {
    match schema {
        Schema::File { required } => Ok(!required || access.exists(path)),
        Schema::Dir(entries) => check_dir(access, path, entries, options),
    }
}

fn check_dir(
    access: &mut dyn DirAccess,
    path: &Path,
    entries: &BTreeMap<String, Schema>,
    options: CheckOptions,
) -> Result<bool, SchemaError> {
    if options.create && !access.exists(path) {
        access
            .create_dir(path)
            .map_err(|source| SchemaError::io(path, source))?;
    }
    if entries.contains_key(MATCH_ANY) {
        return Ok(true);
    }

    let mut found = access
        .list(path)
        .map_err(|source| SchemaError::io(path, source))?;
    if options.create {
        // Visit expected subdirectories even when they do not exist yet, so
        // the whole tree gets created in one pass.
        let mut seeded = Vec::new();
        for (name, expected) in entries {
            if matches!(expected, Schema::Dir(_)) && !found.contains(name) {
                seeded.push(name.clone());
            }
        }
        seeded.append(&mut found);
        found = seeded;
    }

    let mut satisfied: BTreeMap<&str, bool> = BTreeMap::new();
    for item in &found {
        let (pattern, expected) = match match_entry(entries, item) {
            Some(matched) => matched,
            None => {
                if options.remove {
                    let target = path.join(item);
                    access
                        .remove(&target)
                        .map_err(|source| SchemaError::io(&target, source))?;
                }
                continue;
            }
        };
        let ok = match expected {
            // Existence satisfies a file leaf, required or not.
            Schema::File { .. } => true,
            Schema::Dir(sub) => check_dir(access, &path.join(item), sub, options)?,
        };
        satisfied.insert(pattern, ok);
    }

    Ok(entries.iter().all(|(pattern, expected)| {
        satisfied
            .get(pattern.as_str())
            .copied()
            .unwrap_or_else(|| !expected.requires_content())
    }))
}

/// Find the schema entry for a directory item: exact name first, then the
/// `stem.*` wildcard.
fn match_entry<'a>(
    entries: &'a BTreeMap<String, Schema>,
    item: &str,
) -> Option<(&'a str, &'a Schema)> {
    if let Some((name, schema)) = entries.get_key_value(item) {
        return Some((name.as_str(), schema));
    }
    let (stem, ext) = item.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    let wildcard = format!("{stem}.*");
    entries
        .get_key_value(wildcard.as_str())
        .map(|(name, schema)| (name.as_str(), schema))
}

/// Standard entry names of an experiment directory.
pub mod names {
    pub const WITH_FEATURE: &str = "with-malicious";
    pub const WITHOUT_FEATURE: &str = "without-malicious";
    pub const DATA: &str = "data";
    pub const LOGS: &str = "logs";
    pub const RESULTS: &str = "results";
    pub const TEMPLATES: &str = "templates";
    pub const POSITION_INDEX: &str = "motes.json";
}

/// The canonical layout of one experiment directory.
///
/// Used by experiment listing (validation mode) and by the generator to
/// create destination trees before rendering.
pub fn experiment_structure() -> Schema {
    Schema::dir([
        ("REPORT.md", Schema::optional()),
        ("report.*", Schema::optional()),
        (names::DATA, Schema::any_dir()),
        (names::LOGS, Schema::any_dir()),
        (names::RESULTS, Schema::any_dir()),
        (names::TEMPLATES, Schema::any_dir()),
        (names::WITH_FEATURE, variant_structure(true)),
        (names::WITHOUT_FEATURE, variant_structure(false)),
    ])
}

/// Expected content of one variant subtree. The with-feature variant also
/// carries the mote build tree, since its sources are rendered per
/// experiment.
fn variant_structure(with_feature: bool) -> Schema {
    let mut entries = vec![
        ("simulation.csc".to_string(), Schema::required()),
        ("script.js".to_string(), Schema::required()),
        (
            names::DATA.to_string(),
            Schema::dir([(names::POSITION_INDEX, Schema::required())]),
        ),
    ];
    if with_feature {
        entries.push((
            "motes".to_string(),
            Schema::dir([
                ("Makefile", Schema::required()),
                ("root.*", Schema::required()),
                ("sensor.*", Schema::required()),
                ("malicious.*", Schema::required()),
            ]),
        ));
    }
    Schema::Dir(entries.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use pretty_assertions::assert_eq;

    use super::*;

    /// In-memory directory tree for diskless checks.
    #[derive(Debug, Default)]
    struct MemAccess {
        dirs: BTreeSet<PathBuf>,
        files: BTreeSet<PathBuf>,
    }

    impl MemAccess {
        fn with_root(root: &str) -> Self {
            let mut access = Self::default();
            access.dirs.insert(PathBuf::from(root));
            access
        }

        fn add_file(&mut self, path: &str) {
            let path = PathBuf::from(path);
            let mut parent = path.parent().map(Path::to_path_buf);
            while let Some(dir) = parent {
                if dir.as_os_str().is_empty() {
                    break;
                }
                self.dirs.insert(dir.clone());
                parent = dir.parent().map(Path::to_path_buf);
            }
            self.files.insert(path);
        }

        fn add_dir(&mut self, path: &str) {
            let path = PathBuf::from(path);
            let mut current = Some(path);
            while let Some(dir) = current {
                if dir.as_os_str().is_empty() {
                    break;
                }
                self.dirs.insert(dir.clone());
                current = dir.parent().map(Path::to_path_buf);
            }
        }
    }

    impl DirAccess for MemAccess {
        fn exists(&self, path: &Path) -> bool {
            self.dirs.contains(path) || self.files.contains(path)
        }

        fn list(&self, path: &Path) -> io::Result<Vec<String>> {
            if !self.dirs.contains(path) {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such directory"));
            }
            let mut names: Vec<String> = self
                .dirs
                .iter()
                .chain(self.files.iter())
                .filter(|entry| entry.parent() == Some(path))
                .filter_map(|entry| {
                    entry
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                })
                .collect();
            names.sort();
            names.dedup();
            Ok(names)
        }

        fn create_dir(&mut self, path: &Path) -> io::Result<()> {
            let mut current = Some(path.to_path_buf());
            while let Some(dir) = current {
                if dir.as_os_str().is_empty() {
                    break;
                }
                self.dirs.insert(dir.clone());
                current = dir.parent().map(Path::to_path_buf);
            }
            Ok(())
        }

        fn remove(&mut self, path: &Path) -> io::Result<()> {
            self.files.retain(|f| !f.starts_with(path));
            self.dirs.retain(|d| !d.starts_with(path));
            Ok(())
        }
    }

    fn simple_schema() -> Schema {
        Schema::dir([
            ("config.json", Schema::required()),
            ("notes.txt", Schema::optional()),
            (
                "data",
                Schema::dir([("report.*", Schema::required())]),
            ),
        ])
    }

    #[test]
    fn test_conforming_tree_passes() {
        let mut access = MemAccess::with_root("exp");
        access.add_file("exp/config.json");
        access.add_file("exp/data/report.txt");

        let ok = check(
            &mut access,
            Path::new("exp"),
            &simple_schema(),
            CheckOptions::validate(),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_missing_required_file_fails() {
        let mut access = MemAccess::with_root("exp");
        access.add_file("exp/data/report.txt");

        let ok = check(
            &mut access,
            Path::new("exp"),
            &simple_schema(),
            CheckOptions::validate(),
        )
        .unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_missing_optional_file_passes() {
        let mut access = MemAccess::with_root("exp");
        access.add_file("exp/config.json");
        access.add_file("exp/data/report.json");

        let ok = check(
            &mut access,
            Path::new("exp"),
            &simple_schema(),
            CheckOptions::validate(),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_wildcard_matches_any_extension_but_not_bare_stem() {
        let entries = match simple_schema() {
            Schema::Dir(entries) => entries,
            _ => unreachable!(),
        };
        let data = match entries.get("data") {
            Some(Schema::Dir(entries)) => entries.clone(),
            _ => unreachable!(),
        };

        assert!(match_entry(&data, "report.txt").is_some());
        assert!(match_entry(&data, "report.json").is_some());
        assert!(match_entry(&data, "report").is_none());
        assert!(match_entry(&data, "summary.txt").is_none());
    }

    #[test]
    fn test_match_any_short_circuits() {
        let mut access = MemAccess::with_root("exp");
        access.add_file("exp/whatever.bin");

        let ok = check(
            &mut access,
            Path::new("exp"),
            &Schema::any_dir(),
            CheckOptions::validate(),
        )
        .unwrap();
        assert!(ok);
    }

    #[test]
    fn test_create_builds_missing_directories() {
        let mut access = MemAccess::with_root("exp");

        let schema = Schema::dir([
            ("data", Schema::dir([("index.json", Schema::optional())])),
            ("logs", Schema::any_dir()),
        ]);
        let ok = check(&mut access, Path::new("exp"), &schema, CheckOptions::create()).unwrap();

        assert!(ok);
        assert!(access.dirs.contains(Path::new("exp/data")));
        assert!(access.dirs.contains(Path::new("exp/logs")));
    }

    #[test]
    fn test_create_is_idempotent() {
        let mut access = MemAccess::with_root("exp");
        let schema = Schema::dir([("data", Schema::dir([("log.txt", Schema::optional())]))]);

        let first = check(&mut access, Path::new("exp"), &schema, CheckOptions::create()).unwrap();
        let dirs_after_first = access.dirs.clone();
        let files_after_first = access.files.clone();
        let second = check(&mut access, Path::new("exp"), &schema, CheckOptions::create()).unwrap();

        assert_eq!(first, second);
        assert_eq!(dirs_after_first, access.dirs);
        assert_eq!(files_after_first, access.files);
    }

    #[test]
    fn test_remove_prunes_unexpected_entries() {
        let mut access = MemAccess::with_root("exp");
        access.add_file("exp/config.json");
        access.add_file("exp/stray.tmp");
        access.add_dir("exp/junk");
        access.add_file("exp/data/report.txt");

        let options = CheckOptions {
            create: false,
            remove: true,
        };
        let ok = check(&mut access, Path::new("exp"), &simple_schema(), options).unwrap();

        assert!(ok);
        assert!(!access.files.contains(Path::new("exp/stray.tmp")));
        assert!(!access.dirs.contains(Path::new("exp/junk")));
        assert!(access.files.contains(Path::new("exp/config.json")));
    }

    #[test]
    fn test_unmatched_dir_with_required_content_fails() {
        let mut access = MemAccess::with_root("exp");
        let schema = Schema::dir([("data", Schema::dir([("index.json", Schema::required())]))]);

        let ok = check(&mut access, Path::new("exp"), &schema, CheckOptions::validate()).unwrap();
        assert!(!ok);
    }

    #[test]
    fn test_unmatched_dir_with_optional_content_passes() {
        let mut access = MemAccess::with_root("exp");
        let schema = Schema::dir([("cache", Schema::dir([("blob.bin", Schema::optional())]))]);

        let ok = check(&mut access, Path::new("exp"), &schema, CheckOptions::validate()).unwrap();
        assert!(ok);
    }

    #[test]
    fn test_experiment_structure_created_then_conforms_after_rendering() {
        let mut access = MemAccess::with_root("exp");
        let schema = experiment_structure();

        // First pass creates the directories but the rendered files are
        // still missing.
        let before = check(&mut access, Path::new("exp"), &schema, CheckOptions::create()).unwrap();
        assert!(!before);
        assert!(access.dirs.contains(Path::new("exp/with-malicious/data")));
        assert!(access.dirs.contains(Path::new("exp/without-malicious/data")));

        for file in [
            "exp/with-malicious/simulation.csc",
            "exp/with-malicious/script.js",
            "exp/with-malicious/data/motes.json",
            "exp/with-malicious/motes/Makefile",
            "exp/with-malicious/motes/root.c",
            "exp/with-malicious/motes/sensor.c",
            "exp/with-malicious/motes/malicious.c",
            "exp/without-malicious/simulation.csc",
            "exp/without-malicious/script.js",
            "exp/without-malicious/data/motes.json",
        ] {
            access.add_file(file);
        }

        let after = check(&mut access, Path::new("exp"), &schema, CheckOptions::validate()).unwrap();
        assert!(after);
    }
}
