//! Transport boundary.
//!
//! The core never talks to a device itself: it consumes configuration text
//! from a [`ConfigFetcher`] and pushes commands through a [`CommandSink`].
//! Both are injected by the caller, which owns the device session and is
//! responsible for serializing access to it.
//!
//! Two implementations ship with the crate:
//!
//! - [`FileFetcher`] serves a configuration dump from disk, answering scoped
//!   requests with the matching excerpt.
//! - [`SimulatedDevice`] keeps a configuration model, replays every command
//!   it receives and can be told to reject, hang or slow down, which makes
//!   commit and rollback behaviour observable without hardware.

use crate::command::{Applier, Command};
use crate::error::Error;
use crate::model::ConfigTree;
use crate::parser::Parser;
use crate::policy::ConfigPolicy;
use crate::session::Scope;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Device status for an entry that does not exist.
pub const ENTRY_NOT_FOUND: i32 = -3;

/// Device status for a command the device could not interpret.
pub const COMMAND_PARSE_ERROR: i32 = -61;

// ============================================================================
// Errors
// ============================================================================

/// Failure reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The device could not be reached.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The device refused the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The device rejected a command.
    #[error("Command rejected{}: {reason}", code_suffix(.code))]
    Rejected {
        /// Vendor-reported reason
        reason: String,
        /// Vendor status code, when the device reports one
        code: Option<i32>,
    },

    /// No answer within the allotted time.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|code| format!(" ({})", code)).unwrap_or_default()
}

impl TransportError {
    /// Creates a new rejection.
    pub fn rejected(reason: impl Into<String>, code: Option<i32>) -> Self {
        Self::Rejected {
            reason: reason.into(),
            code,
        }
    }

    /// The vendor status code of a rejection.
    pub fn code(&self) -> Option<i32> {
        match self {
            TransportError::Rejected { code, .. } => *code,
            _ => None,
        }
    }

    /// Returns true if repeating the request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Connection(_) | TransportError::Timeout(_))
    }
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Source of configuration text.
#[async_trait]
pub trait ConfigFetcher: Send + Sync {
    /// Fetch the configuration covered by `scope`, as text relative to the
    /// scope's base.
    async fn fetch(&self, scope: &Scope) -> Result<String, TransportError>;
}

/// Destination of configuration commands.
#[async_trait]
pub trait CommandSink: Send {
    /// Submit one command.
    async fn send(&mut self, command: &Command) -> Result<(), TransportError>;
}

/// The part of `tree` covered by `scope`, rendered relative to the scope's
/// base. Empty when nothing is configured at the scope's path.
pub fn excerpt(tree: &ConfigTree, scope: &Scope) -> Result<String, TransportError> {
    let base = scope.base();
    let view = match tree.block(&base) {
        Some(block) => ConfigTree::view(block.clone()),
        None => {
            return Err(TransportError::rejected(
                format!("scope '{}' does not exist", base),
                Some(ENTRY_NOT_FOUND),
            ))
        }
    };
    Ok(view
        .extract(&scope.path)
        .map(|part| part.to_text())
        .unwrap_or_default())
}

/// Failing `(status, command)` pairs from a device batch log.
///
/// Each log line reads `<status>: <command>`; only negative statuses are
/// failures. Lines in any other shape are ignored.
pub fn parse_batch_lastlog(log: &str) -> Vec<(i32, String)> {
    log.lines()
        .filter_map(|line| {
            let (status, rest) = line.split_once(':')?;
            let status: i32 = status.parse().ok()?;
            let command = rest.trim_start_matches(|c: char| !c.is_alphanumeric() && c != '_');
            if status < 0 && rest.len() > command.len() {
                Some((status, command.to_string()))
            } else {
                None
            }
        })
        .collect()
}

// ============================================================================
// File fetcher
// ============================================================================

/// Serves configuration from a text dump on disk.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
    parser: Parser,
}

impl FileFetcher {
    /// Serve the dump at `path`, parsing scoped requests with `policy`.
    pub fn new(path: impl AsRef<Path>, policy: ConfigPolicy) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            parser: Parser::new(policy).lenient(),
        }
    }

    /// The dump's location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigFetcher for FileFetcher {
    async fn fetch(&self, scope: &Scope) -> Result<String, TransportError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| TransportError::Connection(format!("{}: {}", self.path.display(), e)))?;
        if scope.is_whole() {
            return Ok(text);
        }
        let tree = self
            .parser
            .parse(&text)
            .map_err(|e| TransportError::rejected(e.to_string(), Some(COMMAND_PARSE_ERROR)))?;
        debug!(file = %self.path.display(), scope = %scope, "serving excerpt");
        excerpt(&tree, scope)
    }
}

// ============================================================================
// Simulated device
// ============================================================================

/// A scripted misbehaviour of a [`SimulatedDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Reject the command with `code`, `times` times in a row.
    Reject {
        /// Status code to report
        code: i32,
        /// Reason to report
        reason: String,
        /// Remaining rejections
        times: usize,
    },
    /// Never answer.
    Hang,
}

/// An in-memory device that applies the commands it receives.
///
/// Faults are keyed by the number of commands the device has accepted when
/// the command arrives, so a fault at index 2 hits the third command that
/// would succeed. Every fault fires once (a rejection `times` times) and is
/// then spent, which lets the rollback that follows pass the same index.
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    applier: Applier,
    accepted: Vec<Command>,
    faults: HashMap<usize, Fault>,
}

impl SimulatedDevice {
    /// A device whose running configuration is `running`.
    pub fn new(running: ConfigTree, policy: ConfigPolicy) -> Self {
        Self {
            applier: Applier::new(running, policy),
            accepted: Vec::new(),
            faults: HashMap::new(),
        }
    }

    /// Reject the command arriving after `index` accepted commands once.
    pub fn with_rejection(self, index: usize, code: i32, reason: impl Into<String>) -> Self {
        self.with_fault(
            index,
            Fault::Reject {
                code,
                reason: reason.into(),
                times: 1,
            },
        )
    }

    /// Reject the command arriving after `index` accepted commands `times`
    /// times before accepting it.
    pub fn with_transient_rejection(self, index: usize, code: i32, times: usize) -> Self {
        self.with_fault(
            index,
            Fault::Reject {
                code,
                reason: "device busy".to_string(),
                times,
            },
        )
    }

    /// Never answer the command arriving after `index` accepted commands.
    pub fn with_hang(self, index: usize) -> Self {
        self.with_fault(index, Fault::Hang)
    }

    /// Install a fault.
    pub fn with_fault(mut self, index: usize, fault: Fault) -> Self {
        self.faults.insert(index, fault);
        self
    }

    /// The device's running configuration.
    pub fn tree(&self) -> &ConfigTree {
        self.applier.tree()
    }

    /// Every command accepted so far, in order.
    pub fn accepted(&self) -> &[Command] {
        &self.accepted
    }

    /// True when no `config`/`edit` context is left open.
    pub fn is_balanced(&self) -> bool {
        self.applier.is_balanced()
    }

    /// The running configuration; fails if a context is still open.
    pub fn into_tree(self) -> crate::Result<ConfigTree> {
        self.applier.into_tree()
    }

    fn take_fault(&mut self, index: usize) -> Option<Fault> {
        match self.faults.remove(&index)? {
            Fault::Reject { code, reason, times } if times > 1 => {
                self.faults.insert(
                    index,
                    Fault::Reject {
                        code,
                        reason: reason.clone(),
                        times: times - 1,
                    },
                );
                Some(Fault::Reject {
                    code,
                    reason,
                    times: 1,
                })
            }
            fault => Some(fault),
        }
    }
}

fn device_status(error: &Error) -> i32 {
    match error {
        Error::KeyNotFound { .. } => ENTRY_NOT_FOUND,
        _ => COMMAND_PARSE_ERROR,
    }
}

#[async_trait]
impl CommandSink for SimulatedDevice {
    async fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        let index = self.accepted.len();
        match self.take_fault(index) {
            Some(Fault::Hang) => {
                trace!(index, "simulated device hangs");
                return std::future::pending().await;
            }
            Some(Fault::Reject { code, reason, .. }) => {
                trace!(index, code, "simulated device rejects");
                return Err(TransportError::rejected(reason, Some(code)));
            }
            None => {}
        }
        self.applier
            .apply(command)
            .map_err(|e| TransportError::rejected(e.to_string(), Some(device_status(&e))))?;
        self.accepted.push(command.clone());
        Ok(())
    }
}

#[async_trait]
impl ConfigFetcher for SimulatedDevice {
    async fn fetch(&self, scope: &Scope) -> Result<String, TransportError> {
        excerpt(self.applier.tree(), scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfigPath;
    use crate::parser::parse;
    use crate::session::Vdom;

    #[test]
    fn test_batch_lastlog() {
        let log = "\
0: config firewall address
0: edit \"web\"
-3: delete \"missing\"
-61: set bogus value
garbage line
0: end
";
        assert_eq!(
            parse_batch_lastlog(log),
            vec![
                (-3, "delete \"missing\"".to_string()),
                (-61, "set bogus value".to_string()),
            ]
        );
    }

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::rejected("entry not found", Some(ENTRY_NOT_FOUND));
        assert_eq!(err.to_string(), "Command rejected (-3): entry not found");
        assert_eq!(err.code(), Some(-3));
        assert!(!err.is_retryable());
        assert!(TransportError::Timeout(Duration::from_secs(1)).is_retryable());
        assert_eq!(
            TransportError::rejected("nope", None).to_string(),
            "Command rejected: nope"
        );
    }

    #[test]
    fn test_excerpt_of_scope() {
        let tree = parse(
            "config firewall address\nedit a\nnext\nend\nconfig system global\nset hostname fw\nend\n",
        )
        .unwrap();
        let scope = Scope::path(["system global"]);
        assert_eq!(
            excerpt(&tree, &scope).unwrap(),
            "config system global\n    set hostname fw\nend\n"
        );
        assert_eq!(excerpt(&tree, &Scope::path(["system dns"])).unwrap(), "");
        let err = excerpt(&tree, &Scope::whole().in_vdom(Vdom::named("root"))).unwrap_err();
        assert_eq!(err.code(), Some(ENTRY_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_simulated_device_applies_and_rejects() {
        let mut device = SimulatedDevice::new(ConfigTree::new(), ConfigPolicy::default())
            .with_rejection(1, -7, "out of memory");
        let global = ConfigPath::from(["system global"]);
        device
            .send(&Command::enter_block(ConfigPath::root(), "system global"))
            .await
            .unwrap();
        let set = Command::set(global.clone(), "hostname", "fw");
        let err = device.send(&set).await.unwrap_err();
        assert_eq!(err.code(), Some(-7));
        device.send(&set).await.unwrap();
        device
            .send(&Command::leave(global.clone(), crate::command::LeaveKind::Config))
            .await
            .unwrap();
        assert_eq!(device.accepted().len(), 3);
        assert!(device.is_balanced());
        assert_eq!(
            device.tree().attribute(&global.join("hostname")).unwrap().to_string(),
            "fw"
        );
    }

    #[tokio::test]
    async fn test_simulated_device_reports_model_errors() {
        let mut device = SimulatedDevice::new(
            parse("config firewall address\nedit a\nnext\nend\n").unwrap(),
            ConfigPolicy::default(),
        );
        let table = ConfigPath::from(["firewall address"]);
        device
            .send(&Command::enter_block(ConfigPath::root(), "firewall address"))
            .await
            .unwrap();
        let err = device.send(&Command::delete(table, "b")).await.unwrap_err();
        assert_eq!(err.code(), Some(ENTRY_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_file_fetcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("running.conf");
        std::fs::write(
            &path,
            "#config-version=FGT60F\nconfig system global\nset hostname fw\nend\n",
        )
        .unwrap();
        let fetcher = FileFetcher::new(&path, ConfigPolicy::default());
        let whole = fetcher.fetch(&Scope::whole()).await.unwrap();
        assert!(whole.starts_with("#config-version"));
        let part = fetcher.fetch(&Scope::path(["system global"])).await.unwrap();
        assert_eq!(part, "config system global\n    set hostname fw\nend\n");

        let missing = FileFetcher::new(dir.path().join("nope"), ConfigPolicy::default());
        assert!(matches!(
            missing.fetch(&Scope::whole()).await,
            Err(TransportError::Connection(_))
        ));
    }
}
