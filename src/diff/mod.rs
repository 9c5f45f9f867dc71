//! Structural diff engine.
//!
//! Compares two configuration models and describes, at every level of the
//! tree, what was added, removed, modified or moved:
//!
//! - attributes are compared exactly (absent and empty are different);
//! - blocks are compared child by child, regardless of child order;
//! - tables are compared entry by entry, and sequenced tables also report
//!   position changes through a [`Reorder`] descriptor.
//!
//! A [`Diff`] is empty exactly when the two models are equal. The
//! [`Diff::invert`] operation produces the diff from the new side back to
//! the old one, which is how rollback sequences are generated.
//!
//! # Example
//!
//! ```rust,ignore
//! use forticfg::diff::Differ;
//! use forticfg::parser::parse;
//!
//! let running = parse("config system global\n set hostname a\nend\n")?;
//! let candidate = parse("config system global\n set hostname b\nend\n")?;
//! let diff = Differ::default().diff(&running, &candidate);
//! assert!(!diff.is_empty());
//! ```

mod engine;
mod invert;
mod stats;
mod text;

pub use engine::{diff, Differ};
pub use stats::DiffStats;
pub use text::{
    line_diff, unified_diff, ChangeType, DiffHunk, DiffLine, LineDiff, LineStats, TextDiffOptions,
};

use crate::model::{AttrValue, Block, ConfigNode, OrderingMode};
use serde::{Deserialize, Serialize};

/// The structural difference between two models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diff {
    /// Changes below the root block.
    pub root: BlockDiff,
}

impl Diff {
    /// True if the compared models are equal.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// The diff from the new side back to the old side.
    pub fn invert(&self) -> Diff {
        Diff {
            root: self.root.invert(),
        }
    }

    /// Summary counts.
    pub fn stats(&self) -> DiffStats {
        DiffStats::from_diff(self)
    }
}

/// Changes to the children of a block or entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDiff {
    /// Child changes: new-side children first, then removed children.
    pub changes: Vec<ChildChange>,
}

impl BlockDiff {
    /// True if no child changed.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// A change to one named child of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "lowercase")]
pub enum ChildChange {
    /// The child exists only on the new side.
    Added {
        /// Child name
        name: String,
        /// New content
        node: ConfigNode,
    },
    /// The child exists only on the old side.
    Removed {
        /// Child name
        name: String,
        /// Old content
        node: ConfigNode,
    },
    /// The child exists on both sides with different content.
    Modified {
        /// Child name
        name: String,
        /// Nested difference
        diff: NodeDiff,
    },
}

impl ChildChange {
    /// The child's name.
    pub fn name(&self) -> &str {
        match self {
            ChildChange::Added { name, .. }
            | ChildChange::Removed { name, .. }
            | ChildChange::Modified { name, .. } => name,
        }
    }
}

/// The difference between two nodes sharing a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeDiff {
    /// Both sides are blocks.
    Block(BlockDiff),
    /// Both sides are tables.
    Table(TableDiff),
    /// Both sides are attributes with different values.
    Attribute {
        /// Old value
        old: AttrValue,
        /// New value
        new: AttrValue,
    },
    /// The node changed kind; the old node is removed and the new one
    /// created in its place.
    Replaced {
        /// Old content
        old: ConfigNode,
        /// New content
        new: ConfigNode,
    },
}

/// Changes to the entries of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDiff {
    /// Effective ordering: sequenced if either side is sequenced.
    pub mode: OrderingMode,
    /// Entries only on the new side, in new positional order.
    pub added: Vec<EntryChange>,
    /// Entries only on the old side, in old positional order.
    pub removed: Vec<EntryChange>,
    /// Entries on both sides with different content.
    pub modified: Vec<EntryDiff>,
    /// Position changes (sequenced tables only).
    pub reorder: Option<Reorder>,
}

impl TableDiff {
    /// True if no entry changed and the order is unchanged.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && self.reorder.is_none()
    }
}

/// An entry added to or removed from a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryChange {
    /// Entry key
    pub key: String,
    /// Position on the side the entry exists on
    pub index: usize,
    /// Entry content
    pub entry: Block,
}

/// An entry present on both sides with different content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryDiff {
    /// Entry key
    pub key: String,
    /// Content difference
    pub diff: BlockDiff,
}

/// Order change of a sequenced table.
///
/// `old_order` and `new_order` are the complete key orders of both sides.
/// `moves` lists, for keys present on both sides, every position change
/// between the old and new orders restricted to those common keys,
/// ascending by target index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reorder {
    /// Key order of the old table
    pub old_order: Vec<String>,
    /// Key order of the new table
    pub new_order: Vec<String>,
    /// Position changes of common keys
    pub moves: Vec<Move>,
}

/// One entry whose position among the common keys changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    /// Entry key
    pub key: String,
    /// Old index among common keys
    pub from: usize,
    /// New index among common keys
    pub to: usize,
}
