//! Diff command - compare two configurations
//!
//! Reports the structural difference between a running and a candidate
//! configuration, or a unified diff of their canonical text.

use super::{commands_json, CommandContext};
use anyhow::Result;
use clap::Parser;
use forticfg::diff::TextDiffOptions;
use std::path::PathBuf;

/// Arguments for the diff command
#[derive(Parser, Debug, Clone)]
pub struct DiffArgs {
    /// The configuration the device holds
    pub running: PathBuf,

    /// The configuration the device should hold
    pub candidate: PathBuf,

    /// Show a unified diff of the canonical text
    #[arg(long)]
    pub text: bool,

    /// Context lines around text changes
    #[arg(long, default_value = "3")]
    pub context: usize,

    /// Exit with status 1 when the configurations differ
    #[arg(long)]
    pub exit_code: bool,
}

impl DiffArgs {
    /// Execute the diff command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let session = ctx.load_pair(&self.running, &self.candidate).await?;
        let diff = session.compare();
        let stats = diff.stats();

        if ctx.output.is_json() {
            ctx.output.json(&serde_json::json!({
                "running": self.running,
                "candidate": self.candidate,
                "stats": stats,
                "diff": diff,
                "commands": commands_json(&session.plan()),
            }));
        } else if self.text {
            let options = TextDiffOptions::default()
                .with_context_lines(self.context)
                .with_labels(
                    self.running.display().to_string(),
                    self.candidate.display().to_string(),
                );
            let lines = session.compare_text(&options);
            if lines.has_changes() {
                ctx.output.text(&lines.to_unified(ctx.output.use_color()));
            }
            ctx.output.stats(&stats);
        } else {
            ctx.output.stats(&stats);
            if stats.has_changes() {
                ctx.output.section("Changes");
                ctx.output.script(&session.plan(), ctx.indent());
            }
        }

        Ok(if self.exit_code && !diff.is_empty() { 1 } else { 0 })
    }
}
