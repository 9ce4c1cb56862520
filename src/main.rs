//! Callpath Profile CLI
//!
//! Replays parallel execution traces into a merged call-path profile.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use callpath_profile::commands::{
    display_schema, display_version, execute_profile, validate_args, validate_profile_file,
    ProfileArgs,
};
use callpath_profile::utils::config::{DEFAULT_ANALYSIS_PROCESSES, DEFAULT_TOP_PATHS};

/// Callpath Profile - call-path aggregation for parallel traces
#[derive(Parser, Debug)]
#[command(name = "callpath")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay traces and write a merged profile
    Profile {
        /// JSON-lines trace files
        #[arg(required = true)]
        traces: Vec<PathBuf>,

        /// Output path for JSON profile
        #[arg(short, long, default_value = "profile.json")]
        output: PathBuf,

        /// Number of simulated analysis processes
        #[arg(short, long, default_value_t = DEFAULT_ANALYSIS_PROCESSES, env = "CALLPATH_PROCESSES")]
        processes: usize,

        /// Number of top hot paths to include
        #[arg(long, default_value_t = DEFAULT_TOP_PATHS)]
        top_paths: usize,

        /// Print text summary to stdout
        #[arg(long)]
        summary: bool,
    },

    /// Validate a profile JSON file
    Validate {
        /// Path to profile JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display schema information
    Schema {
        /// Show full schema details
        #[arg(long)]
        show: bool,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Profile {
            traces,
            output,
            processes,
            top_paths,
            summary,
        } => {
            let args = ProfileArgs {
                traces,
                output_json: output,
                processes,
                top_paths,
                print_summary: summary,
            };

            validate_args(&args)?;
            execute_profile(args)?;
        }

        Commands::Validate { file } => {
            validate_profile_file(file)?;
        }

        Commands::Schema { show } => {
            display_schema(show);
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}
