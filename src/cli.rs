// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "Single-host deployment automation for containerized application stacks")]
#[command(version)]
pub struct Cli {
    /// Data root directory (defaults to $DOCKHAND_ROOT, then ~/.local/share/dockhand)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a template stack.yml in the current directory
    Init {
        /// Project name for the template
        #[arg(short, long)]
        project: Option<String>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Submit (create or update) a stack configuration
    Apply {
        /// Path to the stack configuration file (discovered in the current
        /// directory when omitted)
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// Break an existing pipeline lock
        #[arg(long)]
        force: bool,
    },

    /// Run a full build cycle: pull, build, run
    Deploy {
        project: String,

        /// Break an existing pipeline lock
        #[arg(long)]
        force: bool,
    },

    /// Show deployments, or the build cycles of one deployment
    Status {
        project: Option<String>,
    },

    /// Print the captured command log of a stage
    Logs {
        project: String,

        /// Stage to show
        #[arg(short, long, value_enum)]
        stage: StageArg,

        /// Build number (defaults to the most recent)
        #[arg(short, long)]
        build: Option<u32>,
    },

    /// Stop the stack's containers
    Stop {
        project: String,
    },

    /// Remove the stack's containers
    Down {
        project: String,
    },

    /// Delete a deployment and purge its files
    Delete {
        project: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StageArg {
    Pull,
    Build,
    Run,
}

impl StageArg {
    pub fn phase(&self) -> &'static str {
        match self {
            StageArg::Pull => "Pull",
            StageArg::Build => "Build",
            StageArg::Run => "Run",
        }
    }
}
