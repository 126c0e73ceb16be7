//! Registered defaults for campaign parameters
//!
//! Every key validated in scalar mode has an entry here, so a rejected value
//! always has a documented fallback. The registry is embedded as TOML and
//! parsed once per process; it is read-only afterwards.

use std::sync::OnceLock;

use serde::Deserialize;

use super::MoteRole;

/// Fallback values applied when a campaign parameter is missing or rejected.
const DEFAULT_REGISTRY: &str = r#"
debug = false
title = "Untitled experiment"
goal = ""
notes = ""
duration = 300
number-motes = 10
repeat = 1
target = "z1"
type = "sensor"
building-blocks = []
minimum-distance-from-root = 20.0
transmission-range = 50.0
area-square-side = 200.0
"#;

/// The registered default for every scalar-validated campaign key
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    pub debug: bool,
    pub title: String,
    pub goal: String,
    pub notes: String,
    pub duration: u64,
    #[serde(rename = "number-motes")]
    pub mote_count: u64,
    pub repeat: u64,
    pub target: String,
    #[serde(rename = "type")]
    pub malicious_role: MoteRole,
    #[serde(rename = "building-blocks")]
    pub building_blocks: Vec<String>,
    #[serde(rename = "minimum-distance-from-root")]
    pub minimum_distance: f64,
    #[serde(rename = "transmission-range")]
    pub transmission_range: f64,
    #[serde(rename = "area-square-side")]
    pub area_side: f64,
}

impl Defaults {
    /// The registered defaults, parsed once per process.
    pub fn registry() -> &'static Defaults {
        static REGISTRY: OnceLock<Defaults> = OnceLock::new();
        REGISTRY.get_or_init(|| {
            toml::from_str(DEFAULT_REGISTRY).expect("Default registry should be valid TOML")
        })
    }
}
