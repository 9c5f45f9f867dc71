//! Command generation from a structural diff.
//!
//! Generation runs in two passes over the diff:
//!
//! 1. **Constructive**: creations and value changes, depth-first, parents
//!    before children. Added entries are appended to their table.
//! 2. **Destructive**: unsets and entry deletions, children before parents,
//!    then the moves of every sequenced table touched, after that table's
//!    deletions.
//!
//! A child that changed kind is the exception: its old node is removed
//! where the constructive pass reaches it, immediately before the new node
//! is created, because a name holds one node at a time. The destructive pass
//! skips it.
//!
//! Contexts (`config`/`edit`) are only entered when something inside them is
//! emitted.

use super::{Command, LeaveKind};
use crate::diff::{BlockDiff, ChildChange, Diff, NodeDiff, TableDiff};
use crate::model::{Block, ConfigNode, ConfigPath, Table};
use std::collections::HashSet;

/// Commands transforming the old side of `diff` into the new side.
pub fn generate(diff: &Diff) -> Vec<Command> {
    let mut generator = Generator::default();
    let root = ConfigPath::root();
    generator.construct_block(&root, &diff.root);
    generator.destruct_block(&root, &diff.root);
    generator.commands
}

/// Commands transforming the new side of `diff` back into the old side.
pub fn generate_inverse(diff: &Diff) -> Vec<Command> {
    generate(&diff.invert())
}

#[derive(Default)]
struct Generator {
    commands: Vec<Command>,
}

impl Generator {
    fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Emit `body` inside a context, dropping the enter command if the body
    /// emitted nothing.
    fn scoped<F>(&mut self, enter: Command, kind: LeaveKind, body: F)
    where
        F: FnOnce(&mut Self, &ConfigPath),
    {
        let inner = match enter.entered_path() {
            Some(path) => path,
            None => return,
        };
        let mark = self.commands.len();
        self.push(enter);
        body(self, &inner);
        if self.commands.len() == mark + 1 {
            self.commands.truncate(mark);
        } else {
            self.push(Command::leave(inner, kind));
        }
    }

    // ------------------------------------------------------------------------
    // Constructive pass
    // ------------------------------------------------------------------------

    fn construct_block(&mut self, path: &ConfigPath, diff: &BlockDiff) {
        for change in &diff.changes {
            match change {
                ChildChange::Added { name, node } => self.create(path, name, node),
                ChildChange::Removed { .. } => {}
                ChildChange::Modified { name, diff } => match diff {
                    NodeDiff::Attribute { new, .. } => {
                        self.push(Command::set(path.clone(), name.as_str(), new.clone()))
                    }
                    NodeDiff::Block(block) => {
                        self.scoped(
                            Command::enter_block(path.clone(), name.as_str()),
                            LeaveKind::Config,
                            |g, inner| g.construct_block(inner, block),
                        );
                    }
                    NodeDiff::Table(table) => {
                        self.scoped(
                            Command::enter_block(path.clone(), name.as_str()),
                            LeaveKind::Config,
                            |g, inner| g.construct_table(inner, table),
                        );
                    }
                    NodeDiff::Replaced { old, new } => {
                        self.remove(path, name, old);
                        self.create(path, name, new);
                    }
                },
            }
        }
    }

    fn construct_table(&mut self, path: &ConfigPath, diff: &TableDiff) {
        for entry in &diff.modified {
            self.scoped(
                Command::enter_entry(path.clone(), entry.key.as_str()),
                LeaveKind::Entry,
                |g, inner| g.construct_block(inner, &entry.diff),
            );
        }
        for added in &diff.added {
            self.create_entry(path, &added.key, &added.entry);
        }
    }

    fn create(&mut self, path: &ConfigPath, name: &str, node: &ConfigNode) {
        match node {
            ConfigNode::Attribute(value) => self.push(Command::set(path.clone(), name, value.clone())),
            ConfigNode::Block(block) => self.scoped(
                Command::enter_block(path.clone(), name),
                LeaveKind::Config,
                |g, inner| g.create_content(inner, block),
            ),
            ConfigNode::Table(table) => self.scoped(
                Command::enter_block(path.clone(), name),
                LeaveKind::Config,
                |g, inner| g.create_entries(inner, table),
            ),
        }
    }

    fn create_content(&mut self, path: &ConfigPath, block: &Block) {
        for (name, node) in block.children() {
            self.create(path, name, node);
        }
    }

    fn create_entries(&mut self, path: &ConfigPath, table: &Table) {
        for (key, entry) in table.entries() {
            self.create_entry(path, key, entry);
        }
    }

    /// Entries are significant even when empty, so `edit`/`next` is always
    /// emitted.
    fn create_entry(&mut self, path: &ConfigPath, key: &str, entry: &Block) {
        let inner = path.join(key);
        self.push(Command::enter_entry(path.clone(), key));
        self.create_content(&inner, entry);
        self.push(Command::leave(inner, LeaveKind::Entry));
    }

    // ------------------------------------------------------------------------
    // Destructive pass
    // ------------------------------------------------------------------------

    fn destruct_block(&mut self, path: &ConfigPath, diff: &BlockDiff) {
        for change in &diff.changes {
            match change {
                ChildChange::Removed { name, node } => self.remove(path, name, node),
                ChildChange::Added { .. } => {}
                ChildChange::Modified { name, diff } => match diff {
                    NodeDiff::Block(block) => self.scoped(
                        Command::enter_block(path.clone(), name.as_str()),
                        LeaveKind::Config,
                        |g, inner| g.destruct_block(inner, block),
                    ),
                    NodeDiff::Table(table) => self.scoped(
                        Command::enter_block(path.clone(), name.as_str()),
                        LeaveKind::Config,
                        |g, inner| g.destruct_table(inner, table),
                    ),
                    NodeDiff::Attribute { .. } | NodeDiff::Replaced { .. } => {}
                },
            }
        }
    }

    fn destruct_table(&mut self, path: &ConfigPath, diff: &TableDiff) {
        for entry in &diff.modified {
            self.scoped(
                Command::enter_entry(path.clone(), entry.key.as_str()),
                LeaveKind::Entry,
                |g, inner| g.destruct_block(inner, &entry.diff),
            );
        }
        for removed in &diff.removed {
            self.push(Command::delete(path.clone(), removed.key.as_str()));
        }
        self.moves(path, diff);
    }

    /// Remove an existing node. The grammar cannot delete a block, so a
    /// removed container is emptied instead.
    fn remove(&mut self, path: &ConfigPath, name: &str, node: &ConfigNode) {
        match node {
            ConfigNode::Attribute(_) => self.push(Command::unset(path.clone(), name)),
            ConfigNode::Block(block) => self.scoped(
                Command::enter_block(path.clone(), name),
                LeaveKind::Config,
                |g, inner| {
                    for (child, node) in block.children() {
                        g.remove(inner, child, node);
                    }
                },
            ),
            ConfigNode::Table(table) => self.scoped(
                Command::enter_block(path.clone(), name),
                LeaveKind::Config,
                |g, inner| {
                    for key in table.keys() {
                        g.push(Command::delete(inner.clone(), key));
                    }
                },
            ),
        }
    }

    /// Moves for a sequenced table, in ascending target index.
    ///
    /// After the constructive pass the table holds the surviving old entries
    /// in their old order followed by the added entries in their new order.
    /// Walking the target order front to back, every misplaced entry is
    /// moved before the entry currently occupying its slot; slots already
    /// visited are final, so no slot is ever claimed twice.
    fn moves(&mut self, path: &ConfigPath, diff: &TableDiff) {
        let reorder = match &diff.reorder {
            Some(reorder) => reorder,
            None => return,
        };
        let removed: HashSet<&str> = diff.removed.iter().map(|e| e.key.as_str()).collect();
        let mut current: Vec<&str> = reorder
            .old_order
            .iter()
            .map(String::as_str)
            .filter(|key| !removed.contains(key))
            .chain(diff.added.iter().map(|e| e.key.as_str()))
            .collect();

        for (target, key) in reorder.new_order.iter().enumerate() {
            let occupant = match current.get(target) {
                Some(occupant) => *occupant,
                None => break,
            };
            if occupant == key.as_str() {
                continue;
            }
            let from = match current.iter().position(|k| *k == key.as_str()) {
                Some(from) => from,
                None => continue,
            };
            self.push(Command::move_before(path.clone(), key.as_str(), occupant));
            let moved = current.remove(from);
            current.insert(target, moved);
        }
    }
}
