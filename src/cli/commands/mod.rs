//! Subcommands module for forticfg CLI
//!
//! This module contains all the subcommand implementations.

pub mod diff;
pub mod plan;
pub mod show;
pub mod simulate;

use crate::cli::output::OutputFormatter;
use crate::config::Config;
use anyhow::{Context, Result};
use forticfg::command::Command;
use forticfg::commit::CommitOptions;
use forticfg::policy::ConfigPolicy;
use forticfg::session::{LoadTarget, Scope, Session};
use forticfg::transport::FileFetcher;
use std::path::Path;

/// Common context shared between commands
pub struct CommandContext {
    /// Settings
    pub config: Config,
    /// Output formatter
    pub output: OutputFormatter,
    /// Table ordering and ignored attributes
    pub policy: ConfigPolicy,
    /// Timeouts, retries and force mode
    pub commit_options: CommitOptions,
}

impl CommandContext {
    /// Create a new command context from CLI arguments
    pub fn new(cli: &crate::cli::Cli, config: Config) -> Self {
        let use_color = !cli.no_color && config.output.color;
        let output = OutputFormatter::new(use_color, cli.is_json(), cli.verbosity());

        Self {
            policy: config.to_policy(),
            commit_options: config.to_commit_options(),
            config,
            output,
        }
    }

    /// Indentation for rendered command scripts
    pub fn indent(&self) -> usize {
        self.config.output.indent
    }

    /// An empty session using the configured policy and commit options
    pub fn session(&self) -> Session {
        Session::new(self.policy.clone(), self.commit_options.clone())
    }

    /// Load a configuration file into a session
    pub async fn load(&self, session: &mut Session, path: &Path, target: LoadTarget) -> Result<()> {
        self.output
            .debug(&format!("Loading {} into {:?}", path.display(), target));
        let fetcher = FileFetcher::new(path, self.policy.clone());
        session
            .load_config(&fetcher, Scope::whole(), target)
            .await
            .with_context(|| format!("Failed to load {}", path.display()))
    }

    /// A session whose running model comes from `running` and whose
    /// candidate comes from `candidate`
    pub async fn load_pair(&self, running: &Path, candidate: &Path) -> Result<Session> {
        let mut session = self.session();
        self.load(&mut session, running, LoadTarget::Running).await?;
        self.load(&mut session, candidate, LoadTarget::Candidate).await?;
        Ok(session)
    }
}

/// One command as reported in JSON output
pub fn command_json(command: &Command) -> serde_json::Value {
    serde_json::json!({
        "path": command.path,
        "verb": command.verb(),
        "line": command.to_line(),
    })
}

/// A command sequence as reported in JSON output
pub fn commands_json(commands: &[Command]) -> Vec<serde_json::Value> {
    commands.iter().map(command_json).collect()
}
