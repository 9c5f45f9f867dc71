//! Diff inversion: swap the old and new sides.

use super::{BlockDiff, ChildChange, EntryDiff, Move, NodeDiff, Reorder, TableDiff};

impl BlockDiff {
    /// Added becomes Removed, Removed becomes Added, and every nested
    /// modification is inverted.
    pub fn invert(&self) -> BlockDiff {
        BlockDiff {
            changes: self.changes.iter().map(ChildChange::invert).collect(),
        }
    }
}

impl ChildChange {
    /// The same change seen from the other side.
    pub fn invert(&self) -> ChildChange {
        match self {
            ChildChange::Added { name, node } => ChildChange::Removed {
                name: name.clone(),
                node: node.clone(),
            },
            ChildChange::Removed { name, node } => ChildChange::Added {
                name: name.clone(),
                node: node.clone(),
            },
            ChildChange::Modified { name, diff } => ChildChange::Modified {
                name: name.clone(),
                diff: diff.invert(),
            },
        }
    }
}

impl NodeDiff {
    /// The same difference seen from the other side.
    pub fn invert(&self) -> NodeDiff {
        match self {
            NodeDiff::Block(diff) => NodeDiff::Block(diff.invert()),
            NodeDiff::Table(diff) => NodeDiff::Table(diff.invert()),
            NodeDiff::Attribute { old, new } => NodeDiff::Attribute {
                old: new.clone(),
                new: old.clone(),
            },
            NodeDiff::Replaced { old, new } => NodeDiff::Replaced {
                old: new.clone(),
                new: old.clone(),
            },
        }
    }
}

impl TableDiff {
    /// Swaps added and removed entries, inverts entry diffs and reverses
    /// every move.
    pub fn invert(&self) -> TableDiff {
        let reorder = self.reorder.as_ref().map(Reorder::invert);
        let mut modified: Vec<EntryDiff> = self
            .modified
            .iter()
            .map(|entry| EntryDiff {
                key: entry.key.clone(),
                diff: entry.diff.invert(),
            })
            .collect();
        if let Some(reorder) = &reorder {
            let position = |key: &str| reorder.new_order.iter().position(|k| k == key);
            modified.sort_by_key(|entry| position(&entry.key));
        }
        TableDiff {
            mode: self.mode,
            added: self.removed.clone(),
            removed: self.added.clone(),
            modified,
            reorder,
        }
    }
}

impl Reorder {
    /// Swap the orders and reverse every move.
    pub fn invert(&self) -> Reorder {
        let mut moves: Vec<Move> = self
            .moves
            .iter()
            .map(|m| Move {
                key: m.key.clone(),
                from: m.to,
                to: m.from,
            })
            .collect();
        moves.sort_by_key(|m| m.to);
        Reorder {
            old_order: self.new_order.clone(),
            new_order: self.old_order.clone(),
            moves,
        }
    }
}
