//! Device configuration session.
//!
//! A [`Session`] owns the three models of one device:
//!
//! - `running`: what the device holds, as last fetched or committed;
//! - `candidate`: the locally edited target;
//! - `original`: the running model before the last commit, kept so the
//!   commit can be undone with [`Session::rollback`].
//!
//! Configuration is loaded per [`Scope`]. A scope names a part of the tree
//! (`firewall policy`) and optionally the virtual domain it lives in; loading
//! a scope replaces exactly that part of the model.

use crate::command::{apply_commands, generate, Command, LeaveKind};
use crate::commit::{CommitOptions, CommitReport, Orchestrator};
use crate::diff::{line_diff, Diff, Differ, LineDiff, TextDiffOptions};
use crate::error::{Error, Result};
use crate::model::{ConfigPath, ConfigTree, NodeRef, OrderingMode};
use crate::parser::Parser;
use crate::policy::ConfigPolicy;
use crate::retry::RetryPolicy;
use crate::transport::{CommandSink, ConfigFetcher, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

// ============================================================================
// Scopes
// ============================================================================

/// A virtual domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vdom {
    /// The global context (`config global`).
    Global,
    /// A named domain (`config vdom` / `edit <name>`).
    Named(String),
}

impl Vdom {
    /// A named domain.
    pub fn named(name: impl Into<String>) -> Self {
        Vdom::Named(name.into())
    }

    /// Where the domain's configuration lives in a full model.
    pub fn base(&self) -> ConfigPath {
        match self {
            Vdom::Global => ConfigPath::from(["global"]),
            Vdom::Named(name) => ConfigPath::from(["vdom"]).join(name.as_str()),
        }
    }

    /// Issue domain-relative `commands` inside the domain's context.
    pub fn wrap(&self, commands: &[Command]) -> Vec<Command> {
        if commands.is_empty() {
            return Vec::new();
        }
        let base = self.base();
        let mut wrapped = Vec::with_capacity(commands.len() + 4);
        match self {
            Vdom::Global => wrapped.push(Command::enter_block(ConfigPath::root(), "global")),
            Vdom::Named(name) => {
                wrapped.push(Command::enter_block(ConfigPath::root(), "vdom"));
                wrapped.push(Command::enter_entry(ConfigPath::from(["vdom"]), name.as_str()));
            }
        }
        wrapped.extend(commands.iter().map(|command| command.rebase(&base)));
        match self {
            Vdom::Global => wrapped.push(Command::leave(base, LeaveKind::Config)),
            Vdom::Named(_) => {
                wrapped.push(Command::leave(base, LeaveKind::Entry));
                wrapped.push(Command::leave(ConfigPath::from(["vdom"]), LeaveKind::Config));
            }
        }
        wrapped
    }
}

impl fmt::Display for Vdom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vdom::Global => write!(f, "global"),
            Vdom::Named(name) => write!(f, "{}", name),
        }
    }
}

/// A part of a device configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    /// The virtual domain, if the device uses them.
    pub vdom: Option<Vdom>,
    /// Path inside the domain; the root for everything.
    pub path: ConfigPath,
}

impl Scope {
    /// The complete configuration.
    pub fn whole() -> Self {
        Self::default()
    }

    /// The configuration under `path`.
    pub fn path(path: impl Into<ConfigPath>) -> Self {
        Self {
            vdom: None,
            path: path.into(),
        }
    }

    /// The same scope inside `vdom`.
    pub fn in_vdom(mut self, vdom: Vdom) -> Self {
        self.vdom = Some(vdom);
        self
    }

    /// True for the complete configuration outside any domain.
    pub fn is_whole(&self) -> bool {
        self.vdom.is_none() && self.path.is_empty()
    }

    /// Where the scope's text is rooted in a full model.
    pub fn base(&self) -> ConfigPath {
        self.vdom.as_ref().map(Vdom::base).unwrap_or_default()
    }

    /// The scope's node in a full model.
    pub fn full_path(&self) -> ConfigPath {
        self.base().concat(&self.path)
    }

    /// The device command displaying the scope.
    pub fn show_command(&self) -> String {
        if self.path.is_empty() {
            "show".to_string()
        } else {
            format!("show {}", self.path.segments().join(" "))
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(vdom) = &self.vdom {
            write!(f, "[{}] ", vdom)?;
        }
        write!(f, "{}", self.path)
    }
}

// ============================================================================
// Session
// ============================================================================

/// Which model a load updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadTarget {
    /// The running model only.
    Running,
    /// The candidate model only.
    Candidate,
    /// Both models.
    #[default]
    Both,
}

impl LoadTarget {
    fn running(self) -> bool {
        matches!(self, LoadTarget::Running | LoadTarget::Both)
    }

    fn candidate(self) -> bool {
        matches!(self, LoadTarget::Candidate | LoadTarget::Both)
    }
}

/// The models of one device and the operations between them.
#[derive(Debug, Clone)]
pub struct Session {
    running: ConfigTree,
    candidate: ConfigTree,
    original: Option<ConfigTree>,
    scopes: Vec<Scope>,
    policy: ConfigPolicy,
    parser: Parser,
    differ: Differ,
    options: CommitOptions,
    fetch_retry: RetryPolicy,
}

impl Session {
    /// An empty session.
    pub fn new(policy: ConfigPolicy, options: CommitOptions) -> Self {
        Self {
            running: ConfigTree::new(),
            candidate: ConfigTree::new(),
            original: None,
            scopes: Vec::new(),
            parser: Parser::new(policy.clone()).lenient(),
            differ: Differ::new(policy.clone()),
            policy,
            options,
            fetch_retry: RetryPolicy::no_retry(),
        }
    }

    /// Retry connection errors and timeouts while fetching. Without a
    /// policy, the first fetch error is returned to the caller.
    pub fn with_fetch_retry(mut self, retry: RetryPolicy) -> Self {
        self.fetch_retry = retry;
        self
    }

    /// The running model.
    pub fn running(&self) -> &ConfigTree {
        &self.running
    }

    /// The candidate model.
    pub fn candidate(&self) -> &ConfigTree {
        &self.candidate
    }

    /// The candidate model, for local edits.
    pub fn candidate_mut(&mut self) -> &mut ConfigTree {
        &mut self.candidate
    }

    /// The running model before the last commit.
    pub fn original(&self) -> Option<&ConfigTree> {
        self.original.as_ref()
    }

    /// Scopes loaded so far.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// The policy in use.
    pub fn policy(&self) -> &ConfigPolicy {
        &self.policy
    }

    /// Load configuration text for `scope`, replacing what the targeted
    /// models held there. Nothing changes if the text does not parse.
    pub fn load_text(&mut self, scope: &Scope, text: &str, target: LoadTarget) -> Result<()> {
        let part = self.parser.parse(text)?;
        self.install(scope, part, target)
    }

    /// Fetch `scope` and load it.
    pub async fn load_config<F>(&mut self, fetcher: &F, scope: Scope, target: LoadTarget) -> Result<()>
    where
        F: ConfigFetcher + ?Sized,
    {
        let text = fetch(fetcher, &self.fetch_retry, &scope).await?;
        self.load_text(&scope, &text, target)
    }

    /// Fetch several scopes concurrently and load them. Each scope is
    /// parsed on its own; nothing is installed unless every fetch and parse
    /// succeeds.
    pub async fn fetch_scopes<F>(&mut self, fetcher: &F, scopes: &[Scope], target: LoadTarget) -> Result<()>
    where
        F: ConfigFetcher + ?Sized,
    {
        let retry = &self.fetch_retry;
        let texts = futures::future::join_all(
            scopes.iter().map(|scope| fetch(fetcher, retry, scope)),
        )
        .await;

        let mut parts = Vec::with_capacity(scopes.len());
        for (scope, text) in scopes.iter().zip(texts) {
            parts.push((scope, self.parser.parse(&text?)?));
        }
        for (scope, part) in parts {
            self.install(scope, part, target)?;
        }
        Ok(())
    }

    /// Structural difference from running to candidate.
    pub fn compare(&self) -> Diff {
        self.differ.diff(&self.running, &self.candidate)
    }

    /// Unified text difference of the rendered models.
    pub fn compare_text(&self, options: &TextDiffOptions) -> LineDiff {
        line_diff(&self.running.to_text(), &self.candidate.to_text(), options)
    }

    /// Commands turning running into candidate.
    pub fn plan(&self) -> Vec<Command> {
        generate(&self.compare())
    }

    /// Commands turning running into candidate within `scope` only. Scopes
    /// inside a domain produce domain-relative commands wrapped in the
    /// domain's context.
    pub fn plan_scope(&self, scope: &Scope) -> Vec<Command> {
        let old = scoped_view(&self.running, scope);
        let new = scoped_view(&self.candidate, scope);
        let commands = generate(&self.differ.diff(&old, &new));
        match &scope.vdom {
            Some(vdom) => vdom.wrap(&commands),
            None => commands,
        }
    }

    /// Commands turning candidate back into running.
    pub fn plan_rollback(&self) -> Vec<Command> {
        generate(&self.compare().invert())
    }

    /// Send the plan to the device.
    ///
    /// On success the pre-commit running model is kept as `original` and
    /// running becomes the committed model. After a failed commit that was
    /// rolled back the models are unchanged.
    pub async fn commit<S>(&mut self, sink: &mut S) -> Result<CommitReport>
    where
        S: CommandSink + ?Sized,
    {
        let commands = self.plan();
        if commands.is_empty() {
            info!("nothing to commit");
            return Ok(CommitReport {
                applied: Vec::new(),
                retries: 0,
            });
        }
        info!(
            commands = commands.len(),
            running = %self.running.checksum(),
            candidate = %self.candidate.checksum(),
            "committing"
        );

        let mut orchestrator = Orchestrator::new(self.policy.clone(), self.options.clone());
        match orchestrator.commit(sink, &self.running, &commands).await {
            Ok(report) => {
                let committed = apply_commands(&self.running, &report.applied, &self.policy)?;
                info!(checksum = %committed.checksum(), "running configuration updated");
                self.original = Some(std::mem::replace(&mut self.running, committed));
                Ok(report)
            }
            Err(e @ Error::ForcedCommit(_)) => {
                warn!("forced commit left the device partially changed; reload the running configuration");
                self.original = Some(self.running.clone());
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Undo the last commit by committing the original model.
    pub async fn rollback<S>(&mut self, sink: &mut S) -> Result<CommitReport>
    where
        S: CommandSink + ?Sized,
    {
        let original = self.original.clone().ok_or_else(|| Error::Other {
            message: "no commit to roll back".to_string(),
            source: None,
        })?;
        info!(checksum = %original.checksum(), "rolling back to original configuration");
        self.candidate = original;
        self.commit(sink).await
    }

    fn install(&mut self, scope: &Scope, part: ConfigTree, target: LoadTarget) -> Result<()> {
        let running = if target.running() {
            Some(replace_scope(&self.running, scope, part.clone())?)
        } else {
            None
        };
        let candidate = if target.candidate() {
            Some(replace_scope(&self.candidate, scope, part)?)
        } else {
            None
        };
        if let Some(running) = running {
            debug!(scope = %scope, checksum = %running.checksum(), "running configuration loaded");
            self.running = running;
        }
        if let Some(candidate) = candidate {
            self.candidate = candidate;
        }
        if !self.scopes.contains(scope) {
            self.scopes.push(scope.clone());
        }
        Ok(())
    }
}

async fn fetch<F>(fetcher: &F, retry: &RetryPolicy, scope: &Scope) -> Result<String>
where
    F: ConfigFetcher + ?Sized,
{
    debug!(scope = %scope, command = %scope.show_command(), "fetching");
    retry
        .execute(|| fetcher.fetch(scope), TransportError::is_retryable)
        .await
        .map_err(|e| Error::Transport(e.into_inner()))
}

/// The part of `tree` a scope covers, relative to the scope's base.
fn scoped_view(tree: &ConfigTree, scope: &Scope) -> ConfigTree {
    tree.block(&scope.base())
        .map(|block| ConfigTree::view(block.clone()))
        .and_then(|view| view.extract(&scope.path))
        .unwrap_or_default()
}

/// A copy of `tree` whose `scope` holds exactly `part`.
fn replace_scope(tree: &ConfigTree, scope: &Scope, part: ConfigTree) -> Result<ConfigTree> {
    if scope.is_whole() {
        return Ok(part);
    }
    let mut tree = tree.clone();
    let base = ensure_base(&mut tree, scope)?;
    let full = scope.full_path();
    if scope.path.is_empty() {
        *tree.block_mut(&base)? = Default::default();
    } else if let Some((parent, name)) = full.split_last() {
        match tree.get(&parent) {
            Some(NodeRef::Table(_)) => {
                if tree.get(&full).is_some() {
                    tree.remove_entry(&parent, name)?;
                }
            }
            Some(_) => {
                if tree.get(&full).is_some() {
                    tree.remove(&full)?;
                }
            }
            None => {}
        }
    }
    tree.graft(&base, part)?;
    Ok(tree)
}

fn ensure_base(tree: &mut ConfigTree, scope: &Scope) -> Result<ConfigPath> {
    match &scope.vdom {
        None => {}
        Some(Vdom::Global) => {
            tree.add_block(&ConfigPath::root(), "global")?;
        }
        Some(Vdom::Named(name)) => {
            let table = tree.add_table(&ConfigPath::root(), "vdom", OrderingMode::Keyed)?;
            if !table.contains(name) {
                table.push(name.as_str(), Default::default());
            }
        }
    }
    Ok(scope.base())
}
