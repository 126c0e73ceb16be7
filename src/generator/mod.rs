//! Template set generation
//!
//! Renders the experiment templates twice: once with the malicious mote and
//! once without it. Both passes run over a per-invocation clone of the base
//! catalog; the without-feature pass is a declarative filter of the first
//! (drop the mote templates, drop the last mote and its mote type), never a
//! mutation of shared state.

mod catalog;

pub use catalog::{templates, Bindings, TemplateCatalog};

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{json, ser::PrettyFormatter, Serializer, Value};
use thiserror::Error;
use tracing::debug;

use crate::params::ParameterSet;
use crate::patch::ReplacementSet;
use crate::providers::BlockCatalog;
use crate::schema::{self, names, CheckOptions, DiskAccess};
use crate::topology::{Mote, TopologyGenerator};

/// Title suffixes marking feature presence in the two variants.
const WITH_SUFFIX: &str = " (with the malicious mote)";
const WITHOUT_SUFFIX: &str = " (without the malicious mote)";

/// Which artifact trees to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerateMode {
    /// Render every template into both variant trees
    #[default]
    Full,
    /// Render only the malicious mote's source into the with-feature tree
    OnlyMalicious,
}

/// Errors raised while generating artifact trees
///
/// A failing template is a deployment defect, not a user-input defect, so
/// rendering errors propagate and abort the current variant instead of
/// degrading to a default.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to load template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),
    #[error("failed to render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: Box<handlebars::RenderError>,
    },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize position index {path}: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Schema(#[from] schema::SchemaError),
}

/// Renders experiment templates with bound parameters
pub struct Generator<'a> {
    registry: Handlebars<'static>,
    blocks: &'a BlockCatalog,
    topology: &'a dyn TopologyGenerator,
}

impl<'a> Generator<'a> {
    /// Create a generator over the shared template directory.
    ///
    /// Every template of the base catalog must be present and well-formed;
    /// a missing or broken template aborts here.
    pub fn new(
        templates_dir: &Path,
        blocks: &'a BlockCatalog,
        topology: &'a dyn TopologyGenerator,
    ) -> Result<Self, GenerateError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        for name in TemplateCatalog::base().names() {
            registry
                .register_template_file(name, templates_dir.join(name))
                .map_err(Box::new)?;
        }
        Ok(Self {
            registry,
            blocks,
            topology,
        })
    }

    /// Render the artifact trees for one experiment.
    ///
    /// Returns the source replacements associated with the selected building
    /// blocks, to be applied by the patching step.
    pub fn generate(
        &self,
        dest: &Path,
        params: &ParameterSet,
        mode: GenerateMode,
    ) -> Result<ReplacementSet, GenerateError> {
        let mut catalog = TemplateCatalog::base();

        let (constants, replacements) = self.blocks.constants_and_replacements(&params.blocks);
        catalog.bind(
            templates::MALICIOUS,
            "constants",
            Value::String(render_constants(&constants)),
        );

        // Both variant subtrees exist before anything is written.
        let mut access = DiskAccess;
        schema::check(
            &mut access,
            dest,
            &schema::experiment_structure(),
            CheckOptions::create(),
        )?;

        let with_dir = dest.join(names::WITH_FEATURE);
        if mode == GenerateMode::OnlyMalicious {
            if let Some(bindings) = catalog.get(templates::MALICIOUS) {
                self.render_into(&with_dir, templates::MALICIOUS, bindings)?;
            }
            return Ok(replacements);
        }

        let motes = match &params.motes {
            Some(motes) => motes.clone(),
            None => self.topology.generate(params),
        };
        bind_full_mode_fields(&mut catalog, params, &motes);

        for (name, bindings) in catalog.iter() {
            self.render_into(&with_dir, name, bindings)?;
        }
        write_position_index(
            &with_dir.join(names::DATA).join(names::POSITION_INDEX),
            &motes,
        )?;

        // The without-feature variant: same catalog minus the mote
        // templates, same motes minus the malicious one.
        let mut without = catalog.filtered(|name| !name.starts_with("motes/"));
        let deployed = &motes[..motes.len().saturating_sub(1)];
        without.bind(
            templates::SIMULATION,
            "title",
            json!(format!("{}{}", params.title, WITHOUT_SUFFIX)),
        );
        without.bind(
            templates::SIMULATION,
            "motes",
            Value::Array(annotated_motes(deployed, false)),
        );
        without.bind(
            templates::SIMULATION,
            "mote_types",
            Value::Array(drop_last_mote_type(&catalog)),
        );

        let without_dir = dest.join(names::WITHOUT_FEATURE);
        for (name, bindings) in without.iter() {
            self.render_into(&without_dir, name, bindings)?;
        }
        write_position_index(
            &without_dir.join(names::DATA).join(names::POSITION_INDEX),
            deployed,
        )?;

        Ok(replacements)
    }

    fn render_into(
        &self,
        dir: &Path,
        name: &str,
        bindings: &Bindings,
    ) -> Result<(), GenerateError> {
        debug!("rendering template {name}");
        let rendered = self
            .registry
            .render(name, bindings)
            .map_err(|source| GenerateError::Render {
                name: name.to_string(),
                source: Box::new(source),
            })?;
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GenerateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, rendered).map_err(|source| GenerateError::Io { path, source })
    }
}

/// Bind the derived fields of a full generation pass onto the catalog.
fn bind_full_mode_fields(catalog: &mut TemplateCatalog, params: &ParameterSet, motes: &[Mote]) {
    catalog.bind(templates::MAKEFILE, "target", json!(params.target));

    let timeout = 1000 * params.duration;
    catalog.bind(templates::SCRIPT, "timeout", json!(timeout));
    catalog.bind(templates::SCRIPT, "sampling_period", json!(timeout / 100));

    catalog.bind(
        templates::SIMULATION,
        "title",
        json!(format!("{}{}", params.title, WITH_SUFFIX)),
    );
    catalog.bind(templates::SIMULATION, "goal", json!(params.goal));
    catalog.bind(templates::SIMULATION, "notes", json!(params.notes));
    catalog.bind(
        templates::SIMULATION,
        "interference_range",
        json!(params.interference_range),
    );
    catalog.bind(
        templates::SIMULATION,
        "transmitting_range",
        json!(params.transmission_range),
    );
    catalog.bind(templates::SIMULATION, "target", json!(params.target));
    catalog.bind(
        templates::SIMULATION,
        "target_capitalized",
        json!(capitalize(&params.target)),
    );
    catalog.bind(
        templates::SIMULATION,
        "malicious_target",
        json!(params.malicious_target),
    );
    catalog.bind(
        templates::SIMULATION,
        "malicious_target_capitalized",
        json!(capitalize(&params.malicious_target)),
    );
    catalog.bind(
        templates::SIMULATION,
        "motes",
        Value::Array(annotated_motes(motes, true)),
    );

    // The malicious mote type compiles for the secondary platform, all
    // others for the primary one.
    let mote_types = match catalog.get(templates::SIMULATION).and_then(|b| b.get("mote_types")) {
        Some(Value::Array(types)) => types
            .iter()
            .cloned()
            .map(|mut mote_type| {
                let target = if mote_type.get("name").and_then(Value::as_str) == Some("malicious")
                {
                    &params.malicious_target
                } else {
                    &params.target
                };
                if let Some(fields) = mote_type.as_object_mut() {
                    fields.insert("target".to_string(), json!(target));
                }
                mote_type
            })
            .collect(),
        _ => Vec::new(),
    };
    catalog.bind(templates::SIMULATION, "mote_types", Value::Array(mote_types));
}

/// Motes as template values, each carrying its mote-type name: the first is
/// the root, the last is the malicious one when present, everything in
/// between is a sensor.
fn annotated_motes(motes: &[Mote], with_malicious: bool) -> Vec<Value> {
    let last = motes.len().saturating_sub(1);
    motes
        .iter()
        .enumerate()
        .map(|(position, mote)| {
            let mote_type = if position == 0 {
                "root"
            } else if with_malicious && position == last {
                "malicious"
            } else {
                "sensor"
            };
            json!({ "id": mote.id, "x": mote.x, "y": mote.y, "type": mote_type })
        })
        .collect()
}

/// Mote types of the simulation bindings minus the last (malicious) one.
fn drop_last_mote_type(catalog: &TemplateCatalog) -> Vec<Value> {
    match catalog.get(templates::SIMULATION).and_then(|b| b.get("mote_types")) {
        Some(Value::Array(types)) => {
            types[..types.len().saturating_sub(1)].to_vec()
        }
        _ => Vec::new(),
    }
}

/// Render the constant definitions of the selected building blocks as one
/// `#define` block.
fn render_constants(constants: &BTreeMap<String, Value>) -> String {
    constants
        .iter()
        .map(|(name, value)| match value {
            Value::String(text) => format!("#define {name} {text}"),
            other => format!("#define {name} {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write the identifier-to-coordinates index with stable key order and fixed
/// indentation, so repeated runs of the same campaign diff cleanly.
fn write_position_index(path: &Path, motes: &[Mote]) -> Result<(), GenerateError> {
    let index: BTreeMap<u64, (f64, f64)> =
        motes.iter().map(|m| (m.id, (m.x, m.y))).collect();
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    index
        .serialize(&mut serializer)
        .map_err(|source| GenerateError::Index {
            path: path.to_path_buf(),
            source,
        })?;
    buf.push(b'\n');
    fs::write(path, buf).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
