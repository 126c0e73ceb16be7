//! Source patching for the custom library
//!
//! Applies the text replacements associated with the selected building
//! blocks to the custom routing-library sources, and rewrites their debug
//! flags. Replacement pairs come out of the generation step as a
//! [`ReplacementSet`].

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

/// Target file to `(search, replace)` pair, as produced by the generator.
pub type ReplacementSet = BTreeMap<String, (String, String)>;

/// Library sources carrying a `#define DEBUG` flag.
const DEBUG_FILES: &[&str] = &["rpl.c", "rpl-dag.c", "rpl-icmp6.c", "rpl-timers.c"];

/// Errors raised while patching library sources
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to patch {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid replacement pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl PatchError {
    fn io(path: &Path, source: io::Error) -> Self {
        PatchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Replace every occurrence of the literal `search` text in `path`.
pub fn replace_text(path: &Path, search: &str, replace: &str) -> Result<(), PatchError> {
    let content = fs::read_to_string(path).map_err(|source| PatchError::io(path, source))?;
    fs::write(path, content.replace(search, replace))
        .map_err(|source| PatchError::io(path, source))
}

/// Rewrite every line of `path` matching `pattern` to `replacement`,
/// leaving all other lines untouched.
pub fn replace_matching_lines(
    path: &Path,
    pattern: &Regex,
    replacement: &str,
) -> Result<(), PatchError> {
    let content = fs::read_to_string(path).map_err(|source| PatchError::io(path, source))?;
    let patched: Vec<&str> = content
        .lines()
        .map(|line| {
            if pattern.is_match(line) {
                replacement
            } else {
                line
            }
        })
        .collect();
    let mut out = patched.join("\n");
    if content.ends_with('\n') {
        out.push('\n');
    }
    fs::write(path, out).map_err(|source| PatchError::io(path, source))
}

/// Apply every replacement pair to its file under the library root.
pub fn apply_replacements(root: &Path, replacements: &ReplacementSet) -> Result<(), PatchError> {
    for (filename, (search, replace)) in replacements {
        replace_text(&root.join(filename), search, replace)?;
    }
    Ok(())
}

/// Rewrite the debug flag of the known debug-carrying sources.
///
/// Files absent from the library root are skipped: not every library build
/// carries all of them.
pub fn apply_debug_flags(root: &Path, enabled: bool) -> Result<(), PatchError> {
    let pattern_text = r"^#define DEBUG DEBUG_[A-Z]+$";
    let pattern = Regex::new(pattern_text).map_err(|source| PatchError::Pattern {
        pattern: pattern_text.to_string(),
        source,
    })?;
    let level = if enabled { "PRINT" } else { "NONE" };
    let replacement = format!("#define DEBUG DEBUG_{level}");
    for filename in DEBUG_FILES {
        let path = root.join(filename);
        if !path.exists() {
            continue;
        }
        replace_matching_lines(&path, &pattern, &replacement)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_replace_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpl-icmp6.c");
        fs::write(&path, "a = dag->version;\nb = dag->version;\n").unwrap();

        replace_text(&path, "dag->version", "dag->version++").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "a = dag->version++;\nb = dag->version++;\n"
        );
    }

    #[test]
    fn test_apply_replacements() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rpl-timers.c"), "next_dis++;\n").unwrap();

        let mut replacements = ReplacementSet::new();
        replacements.insert(
            "rpl-timers.c".to_string(),
            ("next_dis++;".to_string(), "next_dis += 2;".to_string()),
        );
        apply_replacements(dir.path(), &replacements).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("rpl-timers.c")).unwrap(),
            "next_dis += 2;\n"
        );
    }

    #[test]
    fn test_apply_debug_flags_rewrites_flag_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpl-dag.c");
        fs::write(
            &path,
            "#include \"rpl.h\"\n#define DEBUG DEBUG_NONE\nstatic int x;\n",
        )
        .unwrap();

        apply_debug_flags(dir.path(), true).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#include \"rpl.h\"\n#define DEBUG DEBUG_PRINT\nstatic int x;\n"
        );

        apply_debug_flags(dir.path(), false).unwrap();
        assert!(fs::read_to_string(&path)
            .unwrap()
            .contains("#define DEBUG DEBUG_NONE"));
    }

    #[test]
    fn test_apply_debug_flags_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        // No library sources at all: nothing to do, nothing to fail on.
        apply_debug_flags(dir.path(), true).unwrap();
    }
}
