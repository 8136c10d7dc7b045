//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific
//! modules.

mod building;
mod ingest;
mod init;
mod resale;
mod resolve;
mod unit;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use sumika::config::Settings;

#[derive(Parser)]
#[command(name = "sumika")]
#[command(about = "Real-estate listing consolidation and entity resolution system")]
#[command(version)]
pub struct Cli {
    /// Target directory or database file (overrides config file).
    /// Can be a directory containing sumika.db or a .db file directly.
    #[arg(long, short = 't', global = true)]
    target: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and database
    Init,

    /// Ingest listing observations from a JSON file
    Ingest {
        /// Path to a JSON array of listing observations
        file: PathBuf,
    },

    /// Delist listings a scrape run no longer observed
    Delist {
        /// Source site whose listings to reconcile
        site: String,
        /// JSON file with the array of source IDs the run observed
        #[arg(long)]
        seen_file: Option<PathBuf>,
    },

    /// Inspect and consolidate buildings
    Building {
        #[command(subcommand)]
        command: BuildingCommands,
    },

    /// Consolidate units
    Unit {
        #[command(subcommand)]
        command: UnitCommands,
    },

    /// Recompute majority-voted display attributes
    Resolve {
        /// Building ID (all buildings if not specified)
        building_id: Option<i32>,
    },

    /// Detect resold units
    Resale {
        /// Building ID (all buildings if not specified)
        building_id: Option<i32>,
    },
}

#[derive(Subcommand)]
enum BuildingCommands {
    /// List buildings
    List {
        /// Limit the number of rows shown
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Show one building with its units and aliases
    Show {
        /// Building ID
        id: i32,
    },
    /// List groups of buildings that look like duplicates
    Candidates,
    /// Add a manual alias to a building
    Alias {
        /// Building ID
        id: i32,
        /// Alias name (normalized before storing)
        name: String,
    },
    /// Merge one building into another
    Merge {
        /// Building to consume (deleted after the merge)
        secondary_id: i32,
        /// Building that receives everything
        primary_id: i32,
        /// Actor recorded in the audit trail
        #[arg(long, env = "SUMIKA_ACTOR", default_value = "operator")]
        actor: String,
    },
    /// Revert a building merge by history ID
    Revert {
        /// Merge history ID
        history_id: i32,
        /// Actor recorded in the audit trail
        #[arg(long, env = "SUMIKA_ACTOR", default_value = "operator")]
        actor: String,
        /// Also exclude the pair from future merge suggestions
        #[arg(long)]
        exclude: bool,
    },
    /// List merge exclusions
    Exclusions,
}

#[derive(Subcommand)]
enum UnitCommands {
    /// Merge one unit into another
    Merge {
        /// Unit to consume (deleted after the merge)
        secondary_id: i32,
        /// Unit that receives the listings
        primary_id: i32,
        /// Actor recorded in the audit trail
        #[arg(long, env = "SUMIKA_ACTOR", default_value = "operator")]
        actor: String,
    },
    /// Revert a unit merge by history ID
    Revert {
        /// Merge history ID
        history_id: i32,
        /// Actor recorded in the audit trail
        #[arg(long, env = "SUMIKA_ACTOR", default_value = "operator")]
        actor: String,
        /// Also exclude the pair from future merge suggestions
        #[arg(long)]
        exclude: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref(), cli.target.as_deref());

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Ingest { file } => ingest::cmd_ingest(&settings, &file).await,
        Commands::Delist { site, seen_file } => {
            ingest::cmd_delist(&settings, &site, seen_file.as_deref()).await
        }
        Commands::Building { command } => match command {
            BuildingCommands::List { limit } => building::cmd_building_list(&settings, limit).await,
            BuildingCommands::Show { id } => building::cmd_building_show(&settings, id).await,
            BuildingCommands::Candidates => building::cmd_building_candidates(&settings).await,
            BuildingCommands::Alias { id, name } => {
                building::cmd_building_alias(&settings, id, &name).await
            }
            BuildingCommands::Merge {
                secondary_id,
                primary_id,
                actor,
            } => building::cmd_building_merge(&settings, secondary_id, primary_id, &actor).await,
            BuildingCommands::Revert {
                history_id,
                actor,
                exclude,
            } => building::cmd_building_revert(&settings, history_id, &actor, exclude).await,
            BuildingCommands::Exclusions => building::cmd_building_exclusions(&settings).await,
        },
        Commands::Unit { command } => match command {
            UnitCommands::Merge {
                secondary_id,
                primary_id,
                actor,
            } => unit::cmd_unit_merge(&settings, secondary_id, primary_id, &actor).await,
            UnitCommands::Revert {
                history_id,
                actor,
                exclude,
            } => unit::cmd_unit_revert(&settings, history_id, &actor, exclude).await,
        },
        Commands::Resolve { building_id } => resolve::cmd_resolve(&settings, building_id).await,
        Commands::Resale { building_id } => resale::cmd_resale(&settings, building_id).await,
    }
}
