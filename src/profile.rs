//! Tool configuration
//!
//! A profile tells the tool where the OS tree, the campaign folder and the
//! shared templates live, and pins the topology seed for reproducible runs.
//! Profiles are TOML files with an embedded default.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors raised when loading or parsing profiles
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse profile TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Default profile: everything relative to the working directory.
const DEFAULT_PROFILE: &str = r#"
os-dir = "contiki"
experiments-dir = "experiments"
templates-dir = "templates"
topology-seed = 1
"#;

/// Paths and knobs one invocation operates with
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Profile {
    /// Root of the OS tree (contains `platform/`)
    pub os_dir: PathBuf,
    /// Folder holding campaign files and experiment directories
    pub experiments_dir: PathBuf,
    /// Folder holding the shared template set
    pub templates_dir: PathBuf,
    /// Seed for reproducible topology generation; entropy when unset
    pub topology_seed: Option<u64>,
}

impl Profile {
    /// Load a profile from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load a profile from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ProfileError> {
        let mut profile: Profile = toml::from_str(content)?;
        profile.os_dir = expand_home(&profile.os_dir);
        profile.experiments_dir = expand_home(&profile.experiments_dir);
        profile.templates_dir = expand_home(&profile.templates_dir);
        Ok(profile)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::from_str(DEFAULT_PROFILE).expect("Default profile should be valid TOML")
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = Profile::default();
        assert_eq!(profile.experiments_dir, PathBuf::from("experiments"));
        assert_eq!(profile.templates_dir, PathBuf::from("templates"));
        assert_eq!(profile.topology_seed, Some(1));
    }

    #[test]
    fn test_parse_profile() {
        let profile = Profile::from_str(
            r#"
            os-dir = "/opt/contiki"
            experiments-dir = "/var/experiments"
            templates-dir = "/etc/expforge/templates"
            "#,
        )
        .unwrap();

        assert_eq!(profile.os_dir, PathBuf::from("/opt/contiki"));
        assert_eq!(profile.topology_seed, None);
    }

    #[test]
    fn test_parse_error_is_reported() {
        assert!(matches!(
            Profile::from_str("os-dir = 42"),
            Err(ProfileError::Parse(_))
        ));
    }

    #[test]
    fn test_home_expansion() {
        if std::env::var_os("HOME").is_none() {
            return;
        }
        let profile = Profile::from_str(
            r#"
            os-dir = "~/contiki"
            experiments-dir = "experiments"
            templates-dir = "templates"
            "#,
        )
        .unwrap();
        assert!(!profile.os_dir.starts_with("~"));
        assert!(profile.os_dir.ends_with("contiki"));
    }
}
