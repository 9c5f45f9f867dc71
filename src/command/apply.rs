//! Replay of command sequences on a model.
//!
//! The [`Applier`] interprets commands the way a device would: `config`
//! opens (creating if needed) a block, `edit` turns the current context into
//! a table and opens (creating if needed) an entry, `next`/`end` close the
//! context. Every command must be issued in the context its path names.

use super::{Command, LeaveKind, MovePosition, Op};
use crate::error::{Error, Result};
use crate::model::{ConfigPath, ConfigTree, NodeRef, OrderingMode};
use crate::policy::ConfigPolicy;
use tracing::trace;

#[derive(Debug, Clone)]
struct Frame {
    path: ConfigPath,
    kind: LeaveKind,
    created: bool,
}

/// Applies commands to an owned model.
#[derive(Debug, Clone)]
pub struct Applier {
    tree: ConfigTree,
    policy: ConfigPolicy,
    frames: Vec<Frame>,
    root: ConfigPath,
}

impl Applier {
    /// Start applying commands on `tree`.
    pub fn new(tree: ConfigTree, policy: ConfigPolicy) -> Self {
        Self {
            tree,
            policy,
            frames: Vec::new(),
            root: ConfigPath::root(),
        }
    }

    /// The model in its current state.
    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// The current context.
    pub fn context(&self) -> &ConfigPath {
        self.frames.last().map_or(&self.root, |frame| &frame.path)
    }

    /// True when no context is open.
    pub fn is_balanced(&self) -> bool {
        self.frames.is_empty()
    }

    /// Apply one command.
    pub fn apply(&mut self, command: &Command) -> Result<()> {
        if &command.path != self.context() {
            return Err(Error::invalid_path(
                command.path.clone(),
                format!("command issued in context '{}'", self.context()),
            ));
        }
        trace!(path = %command.path, command = %command, "apply");
        let path = &command.path;
        match &command.op {
            Op::EnterBlock { name } => self.enter_block(path, name),
            Op::EnterOrCreateEntry { key } => self.enter_entry(path, key),
            Op::SetAttr { name, value } => {
                self.ensure_block(path)?;
                let child = path.join(name.as_str());
                let vacant_container = match self.tree.get(&child) {
                    Some(NodeRef::Block(block)) => block.is_vacant(),
                    Some(NodeRef::Table(table)) => table.is_empty(),
                    _ => false,
                };
                if vacant_container {
                    self.tree.remove(&child)?;
                }
                self.tree.set_attribute(&child, value.clone())?;
                Ok(())
            }
            Op::UnsetAttr { name } => {
                self.ensure_block(path)?;
                self.tree.unset_attribute(&path.join(name.as_str()))?;
                Ok(())
            }
            Op::DeleteEntry { key } => {
                self.tree.remove_entry(path, key)?;
                Ok(())
            }
            Op::MoveEntry { key, position } => self.move_entry(path, key, position),
            Op::LeaveBlock { kind } => self.leave(*kind),
        }
    }

    /// Apply commands in order, stopping at the first failure.
    pub fn apply_all<'a, I>(&mut self, commands: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Command>,
    {
        for command in commands {
            self.apply(command)?;
        }
        Ok(())
    }

    /// Close every open context, returning the commands that did so.
    pub fn unwind(&mut self) -> Result<Vec<Command>> {
        let mut leaves = Vec::new();
        while let Some(frame) = self.frames.last() {
            let command = Command::leave(frame.path.clone(), frame.kind);
            self.apply(&command)?;
            leaves.push(command);
        }
        Ok(leaves)
    }

    /// The final model; fails if a context is still open.
    pub fn into_tree(self) -> Result<ConfigTree> {
        match self.frames.last() {
            Some(frame) => Err(Error::invalid_path(
                frame.path.clone(),
                "context left open at end of command sequence",
            )),
            None => Ok(self.tree),
        }
    }

    fn enter_block(&mut self, path: &ConfigPath, name: &str) -> Result<()> {
        self.ensure_block(path)?;
        let child = path.join(name);
        let created = match self.tree.get(&child) {
            None => true,
            Some(NodeRef::Attribute(_)) => {
                return Err(Error::invalid_path(child, "cannot enter an attribute"))
            }
            Some(NodeRef::Table(table)) => table.is_empty(),
            Some(node) => node.as_block().is_some_and(|b| b.is_vacant()),
        };
        if !matches!(self.tree.get(&child), Some(NodeRef::Table(_))) {
            self.tree.add_block(path, name)?;
        }
        self.frames.push(Frame {
            path: child,
            kind: LeaveKind::Config,
            created,
        });
        Ok(())
    }

    fn enter_entry(&mut self, path: &ConfigPath, key: &str) -> Result<()> {
        if !matches!(self.frames.last(), Some(Frame { kind: LeaveKind::Config, .. })) {
            return Err(Error::invalid_path(path.clone(), "edit requires a table context"));
        }
        let (parent, name) = path
            .split_last()
            .ok_or_else(|| Error::invalid_path(path.clone(), "edit requires a table context"))?;
        let mode = self.policy.table_mode(name).unwrap_or(OrderingMode::Keyed);
        let table = self.tree.add_table(&parent, name, mode)?;
        if !table.contains(key) {
            table.push(key, Default::default());
        }
        self.frames.push(Frame {
            path: path.join(key),
            kind: LeaveKind::Entry,
            created: false,
        });
        Ok(())
    }

    fn move_entry(&mut self, path: &ConfigPath, key: &str, position: &MovePosition) -> Result<()> {
        let anchor = match position {
            MovePosition::Before(anchor) => Some(anchor.clone()),
            MovePosition::After(anchor) => {
                let table = self
                    .tree
                    .table(path)
                    .ok_or_else(|| Error::invalid_path(path.clone(), "not a table"))?;
                let index = table
                    .index_of(anchor)
                    .ok_or_else(|| Error::key_not_found(path.clone(), anchor.as_str()))?;
                match table.keys().nth(index + 1) {
                    Some(next) if next == key => return Ok(()),
                    Some(next) => Some(next.to_string()),
                    None => None,
                }
            }
        };
        self.tree.move_entry(path, key, anchor.as_deref())?;
        Ok(())
    }

    fn leave(&mut self, kind: LeaveKind) -> Result<()> {
        let frame = match self.frames.pop() {
            Some(frame) if frame.kind == kind => frame,
            Some(frame) => {
                let path = frame.path.clone();
                self.frames.push(frame);
                return Err(Error::invalid_path(path, "mismatched next/end"));
            }
            None => return Err(Error::invalid_path(self.root.clone(), "no open context")),
        };
        if frame.created {
            if let Some((_, name)) = frame.path.split_last() {
                let name = name.to_string();
                if let Ok(table) = self.tree.table_mut(&frame.path) {
                    let mode = self.policy.resolve_mode(&name, table);
                    table.set_mode(mode);
                }
            }
        }
        Ok(())
    }

    /// `set`/`unset`/`config` need a block context; an empty table left
    /// behind by earlier commands is turned back into a block.
    fn ensure_block(&mut self, path: &ConfigPath) -> Result<()> {
        match self.tree.get(path) {
            Some(NodeRef::Block(_)) | Some(NodeRef::Entry { .. }) => Ok(()),
            Some(NodeRef::Table(table)) if table.is_empty() => {
                let (parent, name) = path
                    .split_last()
                    .ok_or_else(|| Error::invalid_path(path.clone(), "not a block"))?;
                self.tree.remove(path)?;
                self.tree.add_block(&parent, name)?;
                Ok(())
            }
            Some(_) => Err(Error::invalid_path(path.clone(), "not a block context")),
            None => Err(Error::invalid_path(path.clone(), "context does not exist")),
        }
    }
}

/// Apply `commands` to a copy of `tree`.
pub fn apply_commands(
    tree: &ConfigTree,
    commands: &[Command],
    policy: &ConfigPolicy,
) -> Result<ConfigTree> {
    let mut applier = Applier::new(tree.clone(), policy.clone());
    applier.apply_all(commands)?;
    applier.into_tree()
}
