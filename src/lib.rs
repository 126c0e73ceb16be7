//! Expforge - reproducible experiment scaffolding for sensor-network
//! simulation campaigns
//!
//! This library validates campaign parameters and renders per-experiment
//! artifact trees (a with-malicious and a without-malicious variant) from a
//! shared template set.
//!
//! # Example
//!
//! ```no_run
//! use expforge::{prepare, GenerateMode, Profile, RawConfig};
//!
//! let raw: RawConfig = serde_json::from_str(
//!     r#"{ "simulation": { "duration": 120, "number-motes": 8 } }"#,
//! )?;
//! let profile = Profile::default();
//! let replacements = prepare("flooding", &raw, &profile, GenerateMode::Full)?;
//! println!("{} source replacement(s) pending", replacements.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod campaign;
pub mod generator;
pub mod params;
pub mod patch;
pub mod profile;
pub mod providers;
pub mod schema;
pub mod topology;

pub use campaign::{Campaign, CampaignError, RawConfig};
pub use generator::{GenerateError, GenerateMode, Generator, TemplateCatalog};
pub use params::{MoteRole, ParameterSet, ResolveOptions};
pub use patch::ReplacementSet;
pub use profile::{Profile, ProfileError};
pub use providers::{BlockCatalog, CatalogError};
pub use schema::{CheckOptions, Schema};
pub use topology::{Mote, QuasiRandomTopology, TopologyGenerator};

use std::io;

use thiserror::Error;
use tracing::info;

/// Name of the building-block catalog in the shared template folder.
pub const BLOCK_CATALOG_FILE: &str = "building-blocks.json";

/// Errors that can occur during the preparation pipeline
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Error discovering the available platforms
    #[error("failed to discover available platforms: {0}")]
    Platforms(#[from] io::Error),

    /// Error loading the building-block catalog
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Error generating the artifact trees
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Prepare one experiment: validate its raw configuration and render both
/// artifact trees under the experiments folder.
///
/// Invalid parameters degrade to defaults with a warning; structural and
/// template problems abort with an error. Returns the source replacements
/// associated with the selected building blocks.
pub fn prepare(
    name: &str,
    raw: &RawConfig,
    profile: &Profile,
    mode: GenerateMode,
) -> Result<ReplacementSet, PrepareError> {
    let platforms = providers::available_platforms(&profile.os_dir)?;
    let blocks = BlockCatalog::load(&profile.templates_dir.join(BLOCK_CATALOG_FILE))?;
    let params = ParameterSet::build(raw, &platforms, &blocks, ResolveOptions::default());

    let topology = QuasiRandomTopology {
        seed: profile.topology_seed,
    };
    let generator = Generator::new(&profile.templates_dir, &blocks, &topology)?;
    let dest = profile.experiments_dir.join(name);
    info!("generating artifact trees under {}", dest.display());
    Ok(generator.generate(&dest, &params, mode)?)
}
