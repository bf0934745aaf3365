//! Command line interface definition

use clap::{Parser, Subcommand};
use rackfit_types::ColorChoice;
use std::path::PathBuf;

/// rackfit - Hardware resource allocation for server builds
#[derive(Parser)]
#[command(name = "rackfit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check whether a server build physically fits together")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Emit structured debug logs on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Check the shape of a build file without building any pool
    #[command(alias = "check")]
    Validate {
        /// Path to the build JSON
        build: PathBuf,
    },

    /// Show capacity, availability and bottlenecks of a build's platform
    #[command(alias = "stats")]
    Inspect {
        /// Path to the build JSON
        build: PathBuf,
    },

    /// Place every component of a build into the platform's resources
    Plan {
        /// Path to the build JSON
        build: PathBuf,
    },
}

impl Commands {
    /// Build file the command operates on
    pub fn build_path(&self) -> &PathBuf {
        match self {
            Self::Validate { build } | Self::Inspect { build } | Self::Plan { build } => build,
        }
    }
}
