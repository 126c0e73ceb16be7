//! Validated experiment parameters
//!
//! [`ParameterSet::build`] orchestrates the resolver across the ordered
//! parameter list of one experiment. Geometry parameters are resolved
//! strictly in dependency order: each predicate closes over the previously
//! resolved binding, so a range is always validated against a validated
//! (possibly defaulted) bound, never against raw input.

mod defaults;
mod resolver;

pub use defaults::Defaults;
pub use resolver::{ResolveOptions, Resolver};

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::campaign::RawConfig;
use crate::providers::BlockCatalog;
use crate::topology::Mote;

/// Role impersonated by the malicious mote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoteRole {
    Root,
    Sensor,
}

impl MoteRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoteRole::Root => "root",
            MoteRole::Sensor => "sensor",
        }
    }
}

impl fmt::Display for MoteRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fully resolved parameter set for one experiment
///
/// Immutable once built: every field either satisfied its validation
/// predicate or carries the registered default for its key.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSet {
    /// Caller-supplied mote list; the topology generator runs when unset
    pub motes: Option<Vec<Mote>>,
    /// Debug build of the mote firmware
    pub debug: bool,
    pub title: String,
    pub goal: String,
    pub notes: String,
    /// Simulated duration in seconds
    pub duration: u64,
    /// Number of sensor motes deployed around the root
    pub mote_count: u64,
    /// Number of simulation runs
    pub repeat: u64,
    /// Compilation platform for regular motes
    pub target: String,
    /// Compilation platform for the malicious mote
    pub malicious_target: String,
    /// Role impersonated by the malicious mote
    pub malicious_role: MoteRole,
    /// Building blocks applied to the malicious mote's source
    pub blocks: Vec<String>,
    /// External library linked into the malicious build
    pub external_library: Option<PathBuf>,
    /// Minimum distance between the root and any other mote
    pub minimum_distance: f64,
    /// Transmission range of a mote
    pub transmission_range: f64,
    /// Interference range of a mote
    pub interference_range: f64,
    /// Side length of the square deployment area
    pub area_side: f64,
    /// Upper bound on a mote's distance from the root; read from the same
    /// raw key as `area_side` but validated independently, so the two may
    /// diverge when exactly one of them falls back to its default
    pub max_range: f64,
}

impl ParameterSet {
    /// Resolve and validate a raw experiment configuration.
    ///
    /// Never fails on user input: rejected values degrade to registered
    /// defaults with a warning. The binding order below is load-bearing for
    /// the geometry block, where each predicate consumes the previous
    /// binding.
    pub fn build(
        raw: &RawConfig,
        platforms: &[String],
        catalog: &BlockCatalog,
        options: ResolveOptions,
    ) -> ParameterSet {
        let defaults = Defaults::registry();
        let resolver = Resolver::new(raw, options);

        // Explicit mote list passes through untouched; topology generation
        // is the generator's concern.
        let motes = match raw.get("motes") {
            None | Some(Value::Null) => None,
            Some(value) => match serde_json::from_value::<Vec<Mote>>(value.clone()) {
                Ok(motes) if !motes.is_empty() => Some(motes),
                Ok(_) => None,
                Err(_) => {
                    if !options.silent {
                        warn!("parameter [motes] is not a list of motes (ignored)");
                    }
                    None
                }
            },
        };

        let debug = resolver.scalar(
            "simulation",
            "debug",
            "is not a boolean",
            defaults.debug,
            |_: &bool| true,
        );
        let title = resolver.scalar(
            "simulation",
            "title",
            "is not a string",
            defaults.title.clone(),
            |_: &String| true,
        );
        let goal = resolver.scalar(
            "simulation",
            "goal",
            "is not a string",
            defaults.goal.clone(),
            |_: &String| true,
        );
        let notes = resolver.scalar(
            "simulation",
            "notes",
            "is not a string",
            defaults.notes.clone(),
            |_: &String| true,
        );
        let duration = resolver.scalar(
            "simulation",
            "duration",
            "is not an integer greater than 0",
            defaults.duration,
            |d: &u64| *d > 0,
        );
        let mote_count = resolver.scalar(
            "simulation",
            "number-motes",
            "is not an integer greater than 0",
            defaults.mote_count,
            |n: &u64| *n > 0,
        );
        let repeat = resolver.scalar(
            "simulation",
            "repeat",
            "is not an integer greater than 0",
            defaults.repeat,
            |r: &u64| *r > 0,
        );
        let target = resolver.scalar(
            "simulation",
            "target",
            "is not a valid platform",
            defaults.target.clone(),
            |t: &String| platforms.contains(t),
        );
        // The malicious platform falls back to the primary one when unset
        // or invalid.
        let malicious_target = resolver.scalar(
            "malicious",
            "target",
            "is not a valid platform",
            target.clone(),
            |t: &String| platforms.contains(t),
        );
        let malicious_role = resolver.scalar(
            "malicious",
            "type",
            "is not 'root' or 'sensor'",
            defaults.malicious_role,
            |_: &MoteRole| true,
        );
        let blocks = resolver.list("malicious", "building-blocks", |b: &String| {
            catalog.contains(b)
        });
        let external_library = resolver.scalar(
            "malicious",
            "external-library",
            "does not exist",
            None,
            |p: &Option<PathBuf>| match p {
                None => true,
                Some(path) => path.is_file(),
            },
        );

        // Geometry: strictly ordered, each bound is checked against the
        // previously resolved one.
        let minimum_distance = resolver.scalar(
            "simulation",
            "minimum-distance-from-root",
            "is not a number greater than 0",
            defaults.minimum_distance,
            |d: &f64| *d > 0.0,
        );
        let transmission_range = resolver.scalar(
            "simulation",
            "transmission-range",
            &format!("is not a number greater than {minimum_distance}"),
            defaults.transmission_range,
            |r: &f64| *r > minimum_distance,
        );
        let interference_range = resolver.scalar(
            "simulation",
            "interference-range",
            &format!("is not a number greater than or equal to {transmission_range}"),
            2.0 * transmission_range,
            |r: &f64| *r >= transmission_range,
        );
        let area_side = resolver.scalar(
            "simulation",
            "area-square-side",
            &format!(
                "is not a number greater than or equal to sqrt(2) * {minimum_distance:.0}"
            ),
            defaults.area_side,
            |s: &f64| *s >= std::f64::consts::SQRT_2 * minimum_distance,
        );
        let max_range = resolver.scalar(
            "simulation",
            "area-square-side",
            &format!("is not a number greater than or equal to {minimum_distance:.0}"),
            defaults.area_side,
            |s: &f64| *s >= minimum_distance,
        );

        ParameterSet {
            motes,
            debug,
            title,
            goal,
            notes,
            duration,
            mote_count,
            repeat,
            target,
            malicious_target,
            malicious_role,
            blocks,
            external_library,
            minimum_distance,
            transmission_range,
            interference_range,
            area_side,
            max_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn raw_config(value: serde_json::Value) -> RawConfig {
        serde_json::from_value(value).unwrap()
    }

    fn platforms() -> Vec<String> {
        vec!["z1".to_string(), "sky".to_string(), "wismote".to_string()]
    }

    fn catalog() -> BlockCatalog {
        BlockCatalog::from_value(json!({
            "b1": { "RPL_CONF_MIN_HOPRANKINC": 128 },
            "b2": { "rpl-icmp6.c": ["dag->version", "dag->version++"] }
        }))
        .unwrap()
    }

    fn build(value: serde_json::Value) -> ParameterSet {
        ParameterSet::build(
            &raw_config(value),
            &platforms(),
            &catalog(),
            ResolveOptions { silent: true },
        )
    }

    #[test]
    fn test_scenario_from_campaign_entry() {
        let params = build(json!({
            "simulation": { "duration": 2, "number-motes": 3, "target": "sky" },
            "malicious": { "type": "root", "building-blocks": ["b1"] }
        }));

        assert_eq!(params.duration, 2);
        assert_eq!(params.mote_count, 3);
        assert_eq!(params.target, "sky");
        assert_eq!(params.malicious_target, "sky");
        assert_eq!(params.malicious_role, MoteRole::Root);
        assert_eq!(params.blocks, vec!["b1".to_string()]);
    }

    #[test]
    fn test_malicious_target_defaults_to_primary() {
        let params = build(json!({
            "simulation": { "target": "wismote" },
            "malicious": { "target": "not-a-platform" }
        }));
        assert_eq!(params.malicious_target, "wismote");
    }

    #[test]
    fn test_unknown_building_blocks_are_filtered() {
        let params = build(json!({
            "malicious": { "building-blocks": ["b2", "nope", "b1"] }
        }));
        assert_eq!(params.blocks, vec!["b2".to_string(), "b1".to_string()]);
    }

    #[test]
    fn test_interference_range_below_transmission_is_replaced_by_twice_it() {
        let params = build(json!({
            "simulation": {
                "minimum-distance-from-root": 10,
                "transmission-range": 30,
                "interference-range": 20
            }
        }));

        assert_eq!(params.minimum_distance, 10.0);
        assert_eq!(params.transmission_range, 30.0);
        // Rejected values land on 2 x the resolved transmission range, not
        // on the raw input.
        assert_eq!(params.interference_range, 60.0);
    }

    #[test]
    fn test_interference_range_unset_defaults_to_twice_transmission() {
        let params = build(json!({
            "simulation": { "transmission-range": 80 }
        }));
        assert_eq!(params.interference_range, 160.0);
    }

    #[test]
    fn test_transmission_range_validated_against_resolved_minimum() {
        // The raw minimum distance is invalid and falls back to the
        // registered default; the transmission range must be checked
        // against that default, not against the raw value.
        let defaults = Defaults::registry();
        let params = build(json!({
            "simulation": {
                "minimum-distance-from-root": -1,
                "transmission-range": defaults.minimum_distance / 2.0
            }
        }));

        assert_eq!(params.minimum_distance, defaults.minimum_distance);
        assert_eq!(params.transmission_range, defaults.transmission_range);
    }

    #[test]
    fn test_area_side_and_max_range_diverge_when_one_defaults() {
        // 25 passes the max-range bound (>= 20) but fails the area-side
        // bound (>= sqrt(2) * 20), so only the area side falls back.
        let params = build(json!({
            "simulation": { "area-square-side": 25 }
        }));

        assert_eq!(params.max_range, 25.0);
        assert_eq!(params.area_side, Defaults::registry().area_side);
    }

    #[test]
    fn test_invalid_role_falls_back_to_default() {
        let params = build(json!({
            "malicious": { "type": "gateway" }
        }));
        assert_eq!(params.malicious_role, Defaults::registry().malicious_role);
    }

    #[test]
    fn test_explicit_mote_list_passes_through() {
        let params = build(json!({
            "motes": [
                { "id": 1, "x": 0.0, "y": 0.0 },
                { "id": 2, "x": 12.5, "y": -3.0 }
            ]
        }));

        let motes = params.motes.expect("mote list should pass through");
        assert_eq!(motes.len(), 2);
        assert_eq!(motes[1].id, 2);
    }

    #[test]
    fn test_all_defaults_on_empty_config() {
        let defaults = Defaults::registry();
        let params = build(json!({}));

        assert_eq!(params.duration, defaults.duration);
        assert_eq!(params.target, defaults.target);
        assert_eq!(params.malicious_target, defaults.target);
        assert_eq!(params.interference_range, 2.0 * defaults.transmission_range);
        assert!(params.motes.is_none());
        assert!(params.blocks.is_empty());
        assert!(params.external_library.is_none());
    }
}
