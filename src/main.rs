//! Expforge CLI
//!
//! Usage:
//!   expforge [OPTIONS] <COMMAND>
//!
//! Commands:
//!   campaigns      List valid campaign files
//!   experiments    List conforming experiment folders
//!   new            Write a campaign skeleton to tune experiments from
//!   generate       Validate a campaign and render its artifact trees
//!   check          Check an experiment folder against the expected layout

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use expforge::schema::{self, CheckOptions, DiskAccess};
use expforge::{campaign, prepare, BlockCatalog, CampaignError, GenerateMode, Profile};

#[derive(Parser)]
#[command(name = "expforge")]
#[command(about = "Reproducible experiment scaffolding for sensor-network simulation campaigns")]
struct Cli {
    /// Profile file overriding the default paths (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose diagnostics
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List valid campaign files
    Campaigns,
    /// List experiment folders with a conforming structure
    Experiments,
    /// Write a campaign skeleton listing the available building blocks
    New {
        /// Campaign name or path
        name: String,
    },
    /// Validate a campaign's parameters and render its artifact trees
    Generate {
        /// Campaign file; bare names resolve into the experiments folder
        campaign: String,
        /// Only prepare the named experiment instead of every entry
        #[arg(short, long)]
        experiment: Option<String>,
        /// Render only the malicious mote's source
        #[arg(long)]
        only_malicious: bool,
    },
    /// Check an experiment folder against the expected structure
    Check {
        /// Experiment folder name
        experiment: String,
        /// Create missing folders
        #[arg(long)]
        create: bool,
        /// Remove entries the structure does not expect
        #[arg(long)]
        clean: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let profile = match &cli.config {
        Some(path) => match Profile::from_file(path) {
            Ok(profile) => profile,
            Err(e) => {
                eprintln!("Error loading profile '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => Profile::default(),
    };

    if let Err(e) = run(cli.command, &profile) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(command: Command, profile: &Profile) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Campaigns => {
            for name in campaign::list_campaigns(&profile.experiments_dir)? {
                println!("{name}");
            }
        }
        Command::Experiments => {
            for name in campaign::list_experiments(&profile.experiments_dir)? {
                println!("{name}");
            }
        }
        Command::New { name } => {
            let catalog =
                BlockCatalog::load(&profile.templates_dir.join(expforge::BLOCK_CATALOG_FILE))?;
            let blocks: Vec<String> = catalog.names().map(str::to_string).collect();
            let dest = campaign::campaign_path(&profile.experiments_dir, &name);
            campaign::write_campaign_skeleton(&profile.templates_dir, &dest, &blocks)?;
            println!("campaign skeleton written to {}", dest.display());
        }
        Command::Generate {
            campaign: campaign_name,
            experiment,
            only_malicious,
        } => {
            let experiments =
                match campaign::load_campaign(&profile.experiments_dir, &campaign_name) {
                    Ok(experiments) => experiments,
                    Err(e @ CampaignError::NotFound(_)) => {
                        error!("{e}");
                        warn!("generate a campaign skeleton first: expforge new <name>");
                        process::exit(1);
                    }
                    Err(e) => return Err(e.into()),
                };
            let mode = if only_malicious {
                GenerateMode::OnlyMalicious
            } else {
                GenerateMode::Full
            };
            for (name, raw) in &experiments {
                if let Some(only) = &experiment {
                    if name != only {
                        continue;
                    }
                }
                info!("preparing experiment '{name}'");
                let replacements = prepare(name, raw, profile, mode)?;
                if !replacements.is_empty() {
                    info!(
                        "{} source replacement(s) pending for '{name}'",
                        replacements.len()
                    );
                }
            }
        }
        Command::Check {
            experiment,
            create,
            clean,
        } => {
            let path = profile.experiments_dir.join(&experiment);
            let options = CheckOptions {
                create,
                remove: clean,
            };
            let mut access = DiskAccess;
            let conforms =
                schema::check(&mut access, &path, &schema::experiment_structure(), options)?;
            if conforms {
                println!("{experiment}: structure conforms");
            } else {
                println!("{experiment}: structure does not conform");
                process::exit(1);
            }
        }
    }
    Ok(())
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
