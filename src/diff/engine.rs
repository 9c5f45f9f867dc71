//! The comparison algorithm.

use super::{BlockDiff, ChildChange, Diff, EntryChange, EntryDiff, Move, NodeDiff, Reorder, TableDiff};
use crate::model::{Block, ConfigNode, ConfigTree, OrderingMode, Table};
use crate::policy::ConfigPolicy;
use std::collections::HashMap;
use tracing::trace;

/// Structural diff engine.
///
/// The policy's ignored attributes are treated as absent on both sides, so
/// device-generated values never show up as changes.
#[derive(Debug, Clone, Default)]
pub struct Differ {
    policy: ConfigPolicy,
}

impl Differ {
    /// Create an engine using `policy`.
    pub fn new(policy: ConfigPolicy) -> Self {
        Self { policy }
    }

    /// Compare two models.
    pub fn diff(&self, old: &ConfigTree, new: &ConfigTree) -> Diff {
        Diff {
            root: self.diff_block(old.root(), new.root()),
        }
    }

    /// Compare two blocks (or entries).
    pub fn diff_block(&self, old: &Block, new: &Block) -> BlockDiff {
        let mut changes = Vec::new();

        for (name, new_node) in new.children() {
            let new_node = match self.visible(name, new_node) {
                Some(node) => node,
                None => continue,
            };
            match old.get(name).and_then(|node| self.visible(name, node)) {
                None => {
                    if !new_node.is_vacant() {
                        trace!(child = name, "added");
                        changes.push(ChildChange::Added {
                            name: name.to_string(),
                            node: new_node.clone(),
                        });
                    }
                }
                Some(old_node) => {
                    if let Some(change) = self.diff_child(name, old_node, new_node) {
                        changes.push(change);
                    }
                }
            }
        }

        for (name, old_node) in old.children() {
            let old_node = match self.visible(name, old_node) {
                Some(node) => node,
                None => continue,
            };
            let still_present = new
                .get(name)
                .and_then(|node| self.visible(name, node))
                .is_some();
            if !still_present && !old_node.is_vacant() {
                trace!(child = name, "removed");
                changes.push(ChildChange::Removed {
                    name: name.to_string(),
                    node: old_node.clone(),
                });
            }
        }

        BlockDiff { changes }
    }

    /// Compare two tables.
    pub fn diff_table(&self, old: &Table, new: &Table) -> TableDiff {
        let ordered = old.mode().is_sequenced() || new.mode().is_sequenced();
        let mode = if ordered {
            OrderingMode::Sequenced
        } else {
            OrderingMode::Keyed
        };

        let added = new
            .entries()
            .enumerate()
            .filter(|(_, (key, _))| !old.contains(key))
            .map(|(index, (key, entry))| EntryChange {
                key: key.to_string(),
                index,
                entry: entry.clone(),
            })
            .collect();

        let removed = old
            .entries()
            .enumerate()
            .filter(|(_, (key, _))| !new.contains(key))
            .map(|(index, (key, entry))| EntryChange {
                key: key.to_string(),
                index,
                entry: entry.clone(),
            })
            .collect();

        let modified = new
            .entries()
            .filter_map(|(key, new_entry)| {
                let old_entry = old.get(key)?;
                let diff = self.diff_block(old_entry, new_entry);
                (!diff.is_empty()).then(|| EntryDiff {
                    key: key.to_string(),
                    diff,
                })
            })
            .collect();

        let reorder = if ordered && !old.keys().eq(new.keys()) {
            Some(reorder(old, new))
        } else {
            None
        };

        TableDiff {
            mode,
            added,
            removed,
            modified,
            reorder,
        }
    }

    fn diff_child(&self, name: &str, old: &ConfigNode, new: &ConfigNode) -> Option<ChildChange> {
        let diff = match (old, new) {
            (ConfigNode::Attribute(a), ConfigNode::Attribute(b)) => {
                if a == b {
                    return None;
                }
                NodeDiff::Attribute {
                    old: a.clone(),
                    new: b.clone(),
                }
            }
            (ConfigNode::Block(a), ConfigNode::Block(b)) => {
                let diff = self.diff_block(a, b);
                if diff.is_empty() {
                    return None;
                }
                NodeDiff::Block(diff)
            }
            (ConfigNode::Table(a), ConfigNode::Table(b)) => {
                let diff = self.diff_table(a, b);
                if diff.is_empty() {
                    return None;
                }
                NodeDiff::Table(diff)
            }
            _ => {
                return match (old.is_vacant(), new.is_vacant()) {
                    (true, true) => None,
                    (true, false) => Some(ChildChange::Added {
                        name: name.to_string(),
                        node: new.clone(),
                    }),
                    (false, true) => Some(ChildChange::Removed {
                        name: name.to_string(),
                        node: old.clone(),
                    }),
                    (false, false) => Some(ChildChange::Modified {
                        name: name.to_string(),
                        diff: NodeDiff::Replaced {
                            old: old.clone(),
                            new: new.clone(),
                        },
                    }),
                };
            }
        };
        trace!(child = name, "modified");
        Some(ChildChange::Modified {
            name: name.to_string(),
            diff,
        })
    }

    fn visible<'a>(&self, name: &str, node: &'a ConfigNode) -> Option<&'a ConfigNode> {
        match node {
            ConfigNode::Attribute(_) if self.policy.is_ignored(name) => None,
            _ => Some(node),
        }
    }
}

/// Compare two models with an empty policy.
pub fn diff(old: &ConfigTree, new: &ConfigTree) -> Diff {
    Differ::default().diff(old, new)
}

/// Positional comparison of the old and new orders restricted to common keys.
fn reorder(old: &Table, new: &Table) -> Reorder {
    let old_common: Vec<&str> = old.keys().filter(|key| new.contains(key)).collect();
    let old_index: HashMap<&str, usize> = old_common
        .iter()
        .enumerate()
        .map(|(index, key)| (*key, index))
        .collect();

    let moves = new
        .keys()
        .filter(|key| old.contains(key))
        .enumerate()
        .filter_map(|(to, key)| {
            let from = *old_index.get(key)?;
            (from != to).then(|| Move {
                key: key.to_string(),
                from,
                to,
            })
        })
        .collect();

    Reorder {
        old_order: old.keys().map(str::to_string).collect(),
        new_order: new.keys().map(str::to_string).collect(),
        moves,
    }
}
