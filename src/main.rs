//! forticfg - structural configuration management for FortiOS-style devices
//!
//! This is the main entry point for the forticfg CLI.

mod cli;
mod config;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use config::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Application version information
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_result = Config::load(cli.config.as_ref());
    let config = match &config_result {
        Ok(config) => config.clone(),
        Err(_) => Config::default(),
    };

    // Initialize logging based on verbosity
    init_logging(cli.verbosity(), config.logging.level.as_deref());

    if let Err(e) = &config_result {
        tracing::warn!("Failed to load settings: {:#}", e);
    }

    // Display version if verbose
    if cli.verbosity() >= 2 {
        eprintln!("forticfg v{} by {}", VERSION, AUTHORS);
    }

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let result = match &cli.command {
        Commands::Show(args) => args.execute(&mut ctx).await,
        Commands::Diff(args) => args.execute(&mut ctx).await,
        Commands::Plan(args) => args.execute(&mut ctx).await,
        Commands::Simulate(args) => args.execute(&mut ctx).await,
    };

    let exit_code = match result {
        Ok(code) => code,
        Err(e) => {
            ctx.output.error(&format!("{:#}", e));
            e.downcast_ref::<forticfg::Error>()
                .map_or(1, forticfg::Error::exit_code)
        }
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8, configured: Option<&str>) {
    let filter = match (verbosity, configured) {
        (0, Some(level)) => level,
        (0, None) => "warn",
        (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(VERSION, forticfg::version());
    }
}
