//! Plan command - print the commands for a change
//!
//! Prints the command script that turns the running configuration into the
//! candidate, or the script that undoes it.

use super::{commands_json, CommandContext};
use crate::cli::ScopeArgs;
use anyhow::Result;
use clap::Parser;
use forticfg::command::render_script;
use std::path::PathBuf;

/// Arguments for the plan command
#[derive(Parser, Debug, Clone)]
pub struct PlanArgs {
    /// The configuration the device holds
    pub running: PathBuf,

    /// The configuration the device should hold
    pub candidate: PathBuf,

    /// Limit the plan to one scope
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Print the commands turning the candidate back into the running
    /// configuration
    #[arg(long)]
    pub rollback: bool,

    /// Print a plain script without colors, ready to paste on a console
    #[arg(long)]
    pub raw: bool,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let session = ctx.load_pair(&self.running, &self.candidate).await?;
        let scope = self.scope.to_scope();

        let commands = if self.rollback {
            if !scope.is_whole() {
                ctx.output
                    .warning("--rollback plans the whole configuration; the scope is ignored");
            }
            session.plan_rollback()
        } else if scope.is_whole() {
            session.plan()
        } else {
            session.plan_scope(&scope)
        };
        ctx.output
            .info(&format!("{} command(s) for {}", commands.len(), scope));

        if ctx.output.is_json() {
            ctx.output.json(&serde_json::json!({
                "scope": scope.to_string(),
                "rollback": self.rollback,
                "commands": commands_json(&commands),
            }));
        } else if commands.is_empty() {
            ctx.output.success("No changes");
        } else if self.raw {
            ctx.output.text(&render_script(&commands, ctx.indent()));
        } else {
            ctx.output.script(&commands, ctx.indent());
        }
        Ok(0)
    }
}
