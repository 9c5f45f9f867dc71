//! Show command - parse and print a configuration
//!
//! Prints a configuration file (or one scope of it) in canonical form, which
//! also validates its syntax.

use super::CommandContext;
use crate::cli::ScopeArgs;
use anyhow::Result;
use clap::Parser;
use forticfg::session::LoadTarget;
use forticfg::transport::excerpt;
use std::path::PathBuf;

/// Arguments for the show command
#[derive(Parser, Debug, Clone)]
pub struct ShowArgs {
    /// Configuration file
    pub file: PathBuf,

    /// Part of the configuration to print
    #[command(flatten)]
    pub scope: ScopeArgs,

    /// Print the SHA-256 checksum of the canonical text instead
    #[arg(long)]
    pub checksum: bool,
}

impl ShowArgs {
    /// Execute the show command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut session = ctx.session();
        ctx.load(&mut session, &self.file, LoadTarget::Running).await?;

        let scope = self.scope.to_scope();
        let text = excerpt(session.running(), &scope)?;
        let part = session.running().extract(&scope.full_path());

        if ctx.output.is_json() {
            ctx.output.json(&serde_json::json!({
                "file": self.file,
                "scope": scope.to_string(),
                "checksum": session.running().checksum(),
                "config": part,
            }));
            return Ok(0);
        }

        if self.checksum {
            ctx.output.text(&session.running().checksum());
        } else if text.is_empty() {
            ctx.output.warning(&format!("Nothing configured at {}", scope));
        } else {
            ctx.output.text(&text);
        }
        Ok(0)
    }
}
