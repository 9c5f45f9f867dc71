//! CLI module for forticfg
//!
//! This module provides the command-line interface for forticfg,
//! including argument parsing and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Args, Parser, Subcommand, ValueEnum};
use forticfg::session::{Scope, Vdom};
use std::path::PathBuf;

/// forticfg - structural configuration management for FortiOS-style devices
///
/// Parses configuration exports, compares them structurally, plans the
/// commands that turn one into the other, and rehearses commits against a
/// simulated device.
#[derive(Parser, Debug, Clone)]
#[command(name = "forticfg")]
#[command(author = "forticfg Contributors")]
#[command(version)]
#[command(about = "Structural diff and commit planning for FortiOS-style configuration", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Path to settings file
    #[arg(short = 'c', long, global = true, env = "FORTICFG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output with colors
    #[default]
    Human,
    /// JSON output for scripting
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Parse a configuration file and print it in canonical form
    Show(commands::show::ShowArgs),

    /// Compare two configuration files structurally
    Diff(commands::diff::DiffArgs),

    /// Print the commands turning one configuration into another
    Plan(commands::plan::PlanArgs),

    /// Commit a plan against a simulated device, with optional faults
    Simulate(commands::simulate::SimulateArgs),
}

/// Which part of a configuration to work on
#[derive(Args, Debug, Clone, Default)]
pub struct ScopeArgs {
    /// Virtual domain ("global" for the global context)
    #[arg(long)]
    pub vdom: Option<String>,

    /// Path inside the configuration, segments separated by '/'
    /// (e.g. "firewall policy" or "system interface/port1")
    #[arg(long)]
    pub scope: Option<String>,
}

impl ScopeArgs {
    /// The selected scope
    pub fn to_scope(&self) -> Scope {
        let mut scope = match &self.scope {
            Some(path) => Scope::path(
                path.split('/')
                    .map(str::trim)
                    .filter(|segment| !segment.is_empty())
                    .collect::<forticfg::model::ConfigPath>(),
            ),
            None => Scope::whole(),
        };
        if let Some(vdom) = &self.vdom {
            scope = scope.in_vdom(parse_vdom(vdom));
        }
        scope
    }
}

/// Map a `--vdom` value to a domain
pub fn parse_vdom(value: &str) -> Vdom {
    if value.eq_ignore_ascii_case("global") {
        Vdom::Global
    } else {
        Vdom::named(value)
    }
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Get the effective verbosity level (0-3)
    pub fn verbosity(&self) -> u8 {
        self.verbose.min(3)
    }

    /// Check if JSON output is requested
    pub fn is_json(&self) -> bool {
        matches!(self.output, OutputFormat::Json)
    }
}
