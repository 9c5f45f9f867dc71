//! Commit and rollback orchestration.
//!
//! The [`Orchestrator`] sends a command sequence through a [`CommandSink`]
//! and drives this state machine:
//!
//! ```text
//! Idle ──> Applying ──> Committed
//!              │
//!              └──> Failed ──> RollingBack ──> RolledBack
//!                                   │
//!                                   └──> RollbackFailed
//! ```
//!
//! Every transport call runs under [`CommitOptions::command_timeout`]; a
//! timeout counts as a command failure. Rejections whose status code the
//! [`RetryPolicy`] names are retried before they count.
//!
//! When command `k` fails, only the executed prefix `0..k` is undone. The
//! prefix is replayed on a copy of the running model to learn the device's
//! partial state; the rollback is then the `next`/`end` commands closing the
//! contexts the prefix left open, followed by the commands turning the
//! partial state back into the running model.

use crate::command::{generate, Applier, Command};
use crate::diff::Differ;
use crate::error::{Error, Result};
use crate::model::ConfigTree;
use crate::policy::ConfigPolicy;
use crate::retry::RetryPolicy;
use crate::transport::{CommandSink, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// State and options
// ============================================================================

/// Phase of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    /// Nothing sent yet.
    #[default]
    Idle,
    /// Sending the commit's commands.
    Applying,
    /// Every command was accepted (or, when forced, attempted).
    Committed,
    /// A command failed; the executed prefix must be undone.
    Failed,
    /// Sending the rollback commands.
    RollingBack,
    /// The device is back in its pre-commit state.
    RolledBack,
    /// Rollback failed; the device state is unknown.
    RollbackFailed,
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommitState::Idle => "idle",
            CommitState::Applying => "applying",
            CommitState::Committed => "committed",
            CommitState::Failed => "failed",
            CommitState::RollingBack => "rolling back",
            CommitState::RolledBack => "rolled back",
            CommitState::RollbackFailed => "rollback failed",
        };
        f.write_str(name)
    }
}

/// How a commit talks to the device.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitOptions {
    /// Upper bound for every transport call.
    pub command_timeout: Duration,
    /// Retries for transient rejections.
    pub retry: RetryPolicy,
    /// Keep sending after a failure and skip rollback.
    pub force: bool,
}

impl Default for CommitOptions {
    fn default() -> Self {
        Self {
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            retry: RetryPolicy::default(),
            force: false,
        }
    }
}

impl CommitOptions {
    /// Set the per-command timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enable or disable best-effort mode.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

// ============================================================================
// Reports
// ============================================================================

/// A command the device did not accept.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFailure {
    /// Position of the command in its sequence.
    pub index: usize,
    /// The command.
    pub command: Command,
    /// The last transport error.
    pub error: TransportError,
    /// Attempts made, retries included.
    pub attempts: u32,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command #{} '{}' failed after {} attempt(s): {}",
            self.index, self.command, self.attempts, self.error
        )
    }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    /// Commands accepted, in order.
    pub applied: Vec<Command>,
    /// Retries spent on transient rejections.
    pub retries: u32,
}

/// A failed commit whose executed prefix was rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitFailure {
    /// The command that failed.
    pub failure: CommandFailure,
    /// Commands accepted before the failure.
    pub applied: Vec<Command>,
    /// Commands sent to undo them.
    pub rollback: Vec<Command>,
}

impl fmt::Display for CommitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; {} command(s) had been applied and were undone with {} rollback command(s)",
            self.failure,
            self.applied.len(),
            self.rollback.len()
        )
    }
}

/// A forced commit that finished with failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ForcedCommitReport {
    /// Commands accepted.
    pub applied: Vec<Command>,
    /// Commands rejected.
    pub failures: Vec<CommandFailure>,
}

impl fmt::Display for ForcedCommitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} command(s) failed",
            self.failures.len(),
            self.failures.len() + self.applied.len()
        )?;
        if let Some(first) = self.failures.first() {
            write!(f, ", first: {}", first)?;
        }
        Ok(())
    }
}

/// Why a rollback could not complete.
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackCause {
    /// The rollback sequence could not be computed.
    Planning(String),
    /// A rollback command was not accepted.
    Command(CommandFailure),
}

impl fmt::Display for RollbackCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackCause::Planning(message) => write!(f, "rollback planning failed: {}", message),
            RollbackCause::Command(failure) => write!(f, "rollback {}", failure),
        }
    }
}

/// A rollback that did not complete. The device holds `applied` plus the
/// `rollback_confirmed` commands; nothing in `unconfirmed` is known to have
/// taken effect.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackFailure {
    /// The command failure that triggered the rollback.
    pub original: CommandFailure,
    /// Commit commands accepted before that failure.
    pub applied: Vec<Command>,
    /// Rollback commands accepted.
    pub rollback_confirmed: Vec<Command>,
    /// Rollback commands not confirmed, starting with the failed one.
    pub unconfirmed: Vec<Command>,
    /// What stopped the rollback.
    pub cause: RollbackCause,
}

impl fmt::Display for RollbackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {}; {} command(s) applied, {} rollback command(s) confirmed, {} unconfirmed",
            self.cause,
            self.original,
            self.applied.len(),
            self.rollback_confirmed.len(),
            self.unconfirmed.len()
        )
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Commands that undo `applied` on a device whose configuration was
/// `running` before they were sent.
pub fn rollback_commands(
    running: &ConfigTree,
    applied: &[Command],
    policy: &ConfigPolicy,
) -> Result<Vec<Command>> {
    let mut applier = Applier::new(running.clone(), policy.clone());
    applier.apply_all(applied).map_err(|e| {
        Error::DiffInconsistency(format!("applied prefix does not replay on the running model: {}", e))
    })?;
    let mut commands = applier.unwind()?;
    let partial = applier.into_tree()?;
    let diff = Differ::new(policy.clone()).diff(&partial, running);
    commands.extend(generate(&diff));
    Ok(commands)
}

/// Drives commits through a [`CommandSink`].
#[derive(Debug, Clone)]
pub struct Orchestrator {
    policy: ConfigPolicy,
    options: CommitOptions,
    state: CommitState,
    history: Vec<CommitState>,
}

impl Orchestrator {
    /// Create an orchestrator.
    pub fn new(policy: ConfigPolicy, options: CommitOptions) -> Self {
        Self {
            policy,
            options,
            state: CommitState::Idle,
            history: vec![CommitState::Idle],
        }
    }

    /// The current state.
    pub fn state(&self) -> CommitState {
        self.state
    }

    /// Every state of the last commit, in order.
    pub fn history(&self) -> &[CommitState] {
        &self.history
    }

    /// The options in use.
    pub fn options(&self) -> &CommitOptions {
        &self.options
    }

    /// Send `commands` to a device whose configuration is `running`.
    ///
    /// On failure the executed prefix is rolled back and
    /// [`Error::CommitFailed`] describes both the failure and the rollback;
    /// if the rollback fails too, [`Error::RollbackFailed`] lists the
    /// commands whose effect is unconfirmed. In force mode failures are
    /// collected, nothing is rolled back and [`Error::ForcedCommit`] reports
    /// them.
    #[instrument(skip_all, fields(commands = commands.len(), force = self.options.force))]
    pub async fn commit<S>(
        &mut self,
        sink: &mut S,
        running: &ConfigTree,
        commands: &[Command],
    ) -> Result<CommitReport>
    where
        S: CommandSink + ?Sized,
    {
        self.state = CommitState::Idle;
        self.history = vec![CommitState::Idle];
        self.transition(CommitState::Applying);

        let mut applied = Vec::with_capacity(commands.len());
        let mut failures = Vec::new();
        let mut retries = 0;

        for (index, command) in commands.iter().enumerate() {
            match self.send(sink, index, command).await {
                Ok(attempts) => {
                    retries += attempts - 1;
                    applied.push(command.clone());
                }
                Err(failure) if self.options.force => {
                    warn!(%failure, "forced commit continues");
                    failures.push(failure);
                }
                Err(failure) => {
                    warn!(%failure, "command failed");
                    self.transition(CommitState::Failed);
                    return Err(self.roll_back(sink, running, applied, failure).await);
                }
            }
        }

        self.transition(CommitState::Committed);
        if failures.is_empty() {
            info!(applied = applied.len(), retries, "commit complete");
            Ok(CommitReport { applied, retries })
        } else {
            Err(Error::ForcedCommit(Box::new(ForcedCommitReport {
                applied,
                failures,
            })))
        }
    }

    /// Send one command, retrying transient rejections. Returns the number
    /// of attempts it took.
    async fn send<S>(
        &self,
        sink: &mut S,
        index: usize,
        command: &Command,
    ) -> std::result::Result<u32, CommandFailure>
    where
        S: CommandSink + ?Sized,
    {
        let limit = self.options.command_timeout;
        let mut attempt = 0;
        loop {
            let outcome = match timeout(limit, sink.send(command)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(limit)),
            };
            match outcome {
                Ok(()) => {
                    debug!(index, command = %command, "accepted");
                    return Ok(attempt + 1);
                }
                Err(e) if self.options.retry.should_retry(&e, attempt) => {
                    let delay = self.options.retry.delay_for_attempt(attempt);
                    warn!(index, code = ?e.code(), attempt = attempt + 1, ?delay, "command rejected, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(CommandFailure {
                        index,
                        command: command.clone(),
                        error,
                        attempts: attempt + 1,
                    })
                }
            }
        }
    }

    async fn roll_back<S>(
        &mut self,
        sink: &mut S,
        running: &ConfigTree,
        applied: Vec<Command>,
        original: CommandFailure,
    ) -> Error
    where
        S: CommandSink + ?Sized,
    {
        self.transition(CommitState::RollingBack);
        let rollback = match rollback_commands(running, &applied, &self.policy) {
            Ok(rollback) => rollback,
            Err(e) => {
                self.transition(CommitState::RollbackFailed);
                error!(error = %e, "cannot compute rollback");
                return Error::RollbackFailed(Box::new(RollbackFailure {
                    original,
                    applied,
                    rollback_confirmed: Vec::new(),
                    unconfirmed: Vec::new(),
                    cause: RollbackCause::Planning(e.to_string()),
                }));
            }
        };
        info!(
            applied = applied.len(),
            rollback = rollback.len(),
            "rolling back executed prefix"
        );

        for (index, command) in rollback.iter().enumerate() {
            if let Err(failure) = self.send(sink, index, command).await {
                self.transition(CommitState::RollbackFailed);
                error!(%failure, "rollback failed, device state unknown");
                return Error::RollbackFailed(Box::new(RollbackFailure {
                    original,
                    applied,
                    rollback_confirmed: rollback[..index].to_vec(),
                    unconfirmed: rollback[index..].to_vec(),
                    cause: RollbackCause::Command(failure),
                }));
            }
        }

        self.transition(CommitState::RolledBack);
        Error::CommitFailed(Box::new(CommitFailure {
            failure: original,
            applied,
            rollback,
        }))
    }

    fn transition(&mut self, next: CommitState) {
        info!(from = %self.state, to = %next, "commit state");
        self.state = next;
        self.history.push(next);
    }
}
