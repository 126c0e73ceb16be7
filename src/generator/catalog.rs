//! Base template catalog
//!
//! The catalog maps template names to the field bindings handed to the
//! rendering engine. The base catalog is immutable; the generator clones it
//! per invocation so bindings never leak across requests.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// Canonical template names.
pub mod templates {
    pub const MAKEFILE: &str = "motes/Makefile";
    pub const ROOT: &str = "motes/root.c";
    pub const SENSOR: &str = "motes/sensor.c";
    pub const MALICIOUS: &str = "motes/malicious.c";
    pub const SCRIPT: &str = "script.js";
    pub const SIMULATION: &str = "simulation.csc";
}

/// Field bindings for one template.
pub type Bindings = Map<String, Value>;

/// Immutable catalog of templates and their field bindings
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    entries: BTreeMap<String, Bindings>,
}

impl TemplateCatalog {
    /// The canonical template set of one experiment, with neutral bindings.
    pub fn base() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(templates::MAKEFILE.to_string(), bindings(json!({ "target": "" })));
        entries.insert(templates::ROOT.to_string(), bindings(json!({})));
        entries.insert(templates::SENSOR.to_string(), bindings(json!({})));
        entries.insert(
            templates::MALICIOUS.to_string(),
            bindings(json!({ "constants": "" })),
        );
        entries.insert(
            templates::SCRIPT.to_string(),
            bindings(json!({ "timeout": 0, "sampling_period": 0 })),
        );
        entries.insert(
            templates::SIMULATION.to_string(),
            bindings(json!({
                "title": "",
                "goal": "",
                "notes": "",
                "interference_range": 0,
                "transmitting_range": 0,
                "target": "",
                "target_capitalized": "",
                "malicious_target": "",
                "malicious_target_capitalized": "",
                "motes": [],
                "mote_types": [
                    { "name": "root", "description": "DODAG root" },
                    { "name": "sensor", "description": "Sensor node" },
                    { "name": "malicious", "description": "Malicious node" },
                ],
            })),
        );
        Self { entries }
    }

    pub fn get(&self, template: &str) -> Option<&Bindings> {
        self.entries.get(template)
    }

    /// Bind a field on a template; unknown template names are ignored.
    pub fn bind(&mut self, template: &str, field: &str, value: Value) {
        if let Some(bindings) = self.entries.get_mut(template) {
            bindings.insert(field.to_string(), value);
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bindings)> {
        self.entries.iter().map(|(name, b)| (name.as_str(), b))
    }

    /// Catalog restricted to templates whose name passes `keep`.
    pub fn filtered<P>(&self, keep: P) -> Self
    where
        P: Fn(&str) -> bool,
    {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(name, _)| keep(name))
                .map(|(name, b)| (name.clone(), b.clone()))
                .collect(),
        }
    }
}

fn bindings(value: Value) -> Bindings {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
