//! Simulate command - rehearse a commit
//!
//! Commits the plan between two configuration files against an in-memory
//! device, optionally scripted to reject or ignore a command, and reports
//! what the commit and its rollback did.

use super::{commands_json, CommandContext};
use anyhow::Result;
use clap::Parser;
use forticfg::transport::{Fault, SimulatedDevice, COMMAND_PARSE_ERROR};
use forticfg::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments for the simulate command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// The configuration the device holds
    pub running: PathBuf,

    /// The configuration the device should hold
    pub candidate: PathBuf,

    /// Reject the command arriving after this many accepted commands
    #[arg(long)]
    pub fail_at: Option<usize>,

    /// Status code reported by the rejection
    #[arg(long, default_value_t = COMMAND_PARSE_ERROR, allow_hyphen_values = true)]
    pub code: i32,

    /// Reject that many times before accepting (a transient rejection)
    #[arg(long, default_value = "1")]
    pub times: usize,

    /// Never answer the command arriving after this many accepted commands
    #[arg(long)]
    pub hang_at: Option<usize>,

    /// Per-command timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Keep sending after a failure and skip rollback
    #[arg(long)]
    pub force: bool,
}

impl SimulateArgs {
    /// Execute the simulate command
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if let Some(ms) = self.timeout_ms {
            ctx.commit_options.command_timeout = Duration::from_millis(ms);
        }
        if self.force {
            ctx.commit_options.force = true;
        }

        let mut session = ctx.load_pair(&self.running, &self.candidate).await?;
        let plan = session.plan();
        let mut device = self.device(session.running().clone(), ctx);

        ctx.output.banner("COMMIT SIMULATION");
        ctx.output.section("Plan");
        ctx.output.script(&plan, ctx.indent());

        let outcome = session.commit(&mut device).await;
        let device_matches = |expected: &forticfg::model::ConfigTree| {
            device.is_balanced() && device.tree() == expected
        };

        let error_code = outcome.as_ref().err().map_or(0, Error::exit_code);
        let code = match &outcome {
            Ok(report) => {
                let consistent = device_matches(session.candidate());
                ctx.output.json(&serde_json::json!({
                    "status": "committed",
                    "applied": commands_json(&report.applied),
                    "retries": report.retries,
                    "device_matches_candidate": consistent,
                }));
                ctx.output.success(&format!(
                    "Committed {} command(s) with {} retry(ies)",
                    report.applied.len(),
                    report.retries
                ));
                if !consistent {
                    ctx.output
                        .warning("The device configuration differs from the candidate");
                }
                if consistent {
                    0
                } else {
                    1
                }
            }
            Err(Error::CommitFailed(failure)) => {
                let restored = device_matches(session.running());
                ctx.output.json(&serde_json::json!({
                    "status": "rolled_back",
                    "failure": failure.failure.to_string(),
                    "applied": commands_json(&failure.applied),
                    "rollback": commands_json(&failure.rollback),
                    "device_restored": restored,
                }));
                ctx.output.error(&failure.failure.to_string());
                ctx.output.section("Rollback");
                ctx.output.script(&failure.rollback, ctx.indent());
                if restored {
                    ctx.output.success("Device restored to its running configuration");
                } else {
                    ctx.output
                        .warning("The device configuration differs from the running configuration");
                }
                error_code
            }
            Err(Error::RollbackFailed(failure)) => {
                ctx.output.json(&serde_json::json!({
                    "status": "rollback_failed",
                    "error": failure.to_string(),
                    "applied": commands_json(&failure.applied),
                    "rollback_confirmed": commands_json(&failure.rollback_confirmed),
                    "unconfirmed": commands_json(&failure.unconfirmed),
                }));
                ctx.output.error(&failure.to_string());
                ctx.output.section("Unconfirmed rollback commands");
                ctx.output.script(&failure.unconfirmed, ctx.indent());
                error_code
            }
            Err(Error::ForcedCommit(report)) => {
                let failures: Vec<String> =
                    report.failures.iter().map(ToString::to_string).collect();
                ctx.output.json(&serde_json::json!({
                    "status": "forced",
                    "applied": commands_json(&report.applied),
                    "failures": failures,
                }));
                for failure in &failures {
                    ctx.output.error(failure);
                }
                ctx.output.warning(&report.to_string());
                error_code
            }
            Err(e) => {
                ctx.output.error(&e.to_string());
                error_code
            }
        };

        ctx.output.elapsed();
        ctx.output.flush();
        Ok(code)
    }

    fn device(&self, running: forticfg::model::ConfigTree, ctx: &CommandContext) -> SimulatedDevice {
        let mut device = SimulatedDevice::new(running, ctx.policy.clone());
        if let Some(index) = self.fail_at {
            ctx.output.debug(&format!(
                "Rejecting command after {} accepted with code {} ({} time(s))",
                index, self.code, self.times
            ));
            device = device.with_fault(
                index,
                Fault::Reject {
                    code: self.code,
                    reason: "command rejected by simulated device".to_string(),
                    times: self.times.max(1),
                },
            );
        }
        if let Some(index) = self.hang_at {
            ctx.output
                .debug(&format!("Hanging on command after {} accepted", index));
            device = device.with_hang(index);
        }
        device
    }
}
