//! Shapewise CLI.
//!
//! Manages query settings stored in a project's configuration document.
//!
//! # Quick Start
//!
//! ```bash
//! # Initialize a project
//! shapewise init ./shop
//!
//! # Attach settings to the shape of a query
//! shapewise set --project ./shop --ns shop.orders --filter '{"status": "open"}' \
//!     --settings '{"indexHints": {"allowedIndexes": ["status_1"]}}'
//!
//! # Inspect them
//! shapewise list --project ./shop
//! ```

mod commands;
mod style;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shapewise::ShapewiseError;
use shapewise_config::ConfigLoader;
use tracing_subscriber::EnvFilter;

use commands::query::QueryArgs;

/// Shapewise - cluster-wide query settings that cannot lose updates.
#[derive(Parser)]
#[command(name = "shapewise")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory containing shapewise.toml.
    #[arg(short, long, global = true, default_value = ".")]
    project: String,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version information.
    Version,

    /// Initialize a new project with an empty configuration document.
    Init {
        /// Path to the project directory to create.
        path: String,

        /// Project name (defaults to the directory name).
        #[arg(long)]
        name: Option<String>,
    },

    /// Set query settings for a query shape.
    Set {
        #[command(flatten)]
        query: QueryArgs,

        /// Address an existing entry by its shape hash instead of a query.
        #[arg(long, conflicts_with_all = ["namespace", "filter", "sort", "projection", "pipeline", "distinct"])]
        hash: Option<String>,

        /// Settings as a non-empty JSON object.
        #[arg(long)]
        settings: String,
    },

    /// Remove query settings for a query shape.
    Remove {
        #[command(flatten)]
        query: QueryArgs,

        /// Address the entry by its shape hash instead of a query.
        #[arg(long, conflicts_with_all = ["namespace", "filter", "sort", "projection", "pipeline", "distinct"])]
        hash: Option<String>,
    },

    /// Remove every query settings entry.
    RemoveAll,

    /// List query settings entries.
    List {
        /// Output format (table, json).
        #[arg(short, long, default_value = "table")]
        format: String,

        /// Include the normalized query shape of each entry.
        #[arg(long)]
        debug_shape: bool,
    },

    /// Print the shape hash of a query.
    Shape {
        #[command(flatten)]
        query: QueryArgs,

        /// Also print the normalized shape.
        #[arg(long)]
        debug_shape: bool,
    },

    /// Configuration commands.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the merged configuration.
    Show {
        /// Output format (text, json, toml).
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate configuration files.
    Validate,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    style::set_no_color(cli.no_color);
    init_logging(&cli.project);

    match run(cli.command, &cli.project) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = err
                .downcast_ref::<ShapewiseError>()
                .map_or("Error", |e| e.code().as_str());
            style::print_error(&format!("{code}: {err:#}"));
            ExitCode::FAILURE
        }
    }
}

/// Installs the subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(project: &str) {
    let level = ConfigLoader::new()
        .with_project_dir(project)
        .load_or_default()
        .logging
        .level;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Commands, project: &str) -> Result<()> {
    match command {
        Commands::Version => {
            commands::version::run();
            Ok(())
        }
        Commands::Init { path, name } => commands::init::run(&path, name.as_deref()),
        Commands::Set {
            query,
            hash,
            settings,
        } => commands::set::run(project, &query, hash.as_deref(), &settings),
        Commands::Remove { query, hash } => commands::remove::run(project, &query, hash.as_deref()),
        Commands::RemoveAll => commands::remove::run_all(project),
        Commands::List {
            format,
            debug_shape,
        } => commands::list::run(project, &format, debug_shape),
        Commands::Shape { query, debug_shape } => commands::shape::run(&query, debug_shape),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show { format } => commands::config::show(project, &format),
            ConfigCommands::Validate => commands::config::validate(project),
        },
    }
}
