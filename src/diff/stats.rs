//! Diff statistics module.
//!
//! Summary counts for a structural diff, with plain and coloured summaries
//! for terminal output.

use super::{BlockDiff, ChildChange, Diff, NodeDiff, TableDiff};
use crate::model::ConfigNode;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statistics about a structural diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    /// Blocks or tables created
    pub containers_added: usize,
    /// Blocks or tables deleted
    pub containers_removed: usize,
    /// Table entries created
    pub entries_added: usize,
    /// Table entries deleted
    pub entries_removed: usize,
    /// Table entries with changed content
    pub entries_modified: usize,
    /// Table entries whose position changed
    pub entries_moved: usize,
    /// Attributes set where none existed
    pub attributes_added: usize,
    /// Attributes unset
    pub attributes_removed: usize,
    /// Attributes whose value changed
    pub attributes_changed: usize,
    /// Nodes that changed kind
    pub replaced: usize,
}

impl DiffStats {
    /// Create a new empty stats instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect statistics for a diff
    pub fn from_diff(diff: &Diff) -> Self {
        let mut stats = Self::new();
        stats.visit_block(&diff.root);
        stats
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }

    /// Get total number of changes
    pub fn total_changes(&self) -> usize {
        self.additions() + self.removals() + self.modifications()
    }

    /// Everything created
    pub fn additions(&self) -> usize {
        self.containers_added + self.entries_added + self.attributes_added
    }

    /// Everything deleted
    pub fn removals(&self) -> usize {
        self.containers_removed + self.entries_removed + self.attributes_removed
    }

    /// Everything changed in place
    pub fn modifications(&self) -> usize {
        self.entries_modified + self.entries_moved + self.attributes_changed + self.replaced
    }

    /// Merge statistics from another DiffStats instance
    pub fn merge(&mut self, other: &DiffStats) {
        self.containers_added += other.containers_added;
        self.containers_removed += other.containers_removed;
        self.entries_added += other.entries_added;
        self.entries_removed += other.entries_removed;
        self.entries_modified += other.entries_modified;
        self.entries_moved += other.entries_moved;
        self.attributes_added += other.attributes_added;
        self.attributes_removed += other.attributes_removed;
        self.attributes_changed += other.attributes_changed;
        self.replaced += other.replaced;
    }

    /// Format as a short summary string
    pub fn short_summary(&self) -> String {
        format!(
            "+{} -{} ~{}",
            self.additions(),
            self.removals(),
            self.modifications()
        )
    }

    /// Format as a colored short summary
    pub fn short_summary_colored(&self) -> String {
        format!(
            "{} {} {}",
            format!("+{}", self.additions()).green(),
            format!("-{}", self.removals()).red(),
            format!("~{}", self.modifications()).yellow()
        )
    }

    /// Format as a detailed multi-line summary
    pub fn detailed_summary(&self, use_color: bool) -> String {
        if !self.has_changes() {
            return if use_color {
                "No changes".bright_black().to_string()
            } else {
                "No changes".to_string()
            };
        }

        let rows = [
            ("entries", self.entries_added, self.entries_removed, self.entries_modified),
            ("attributes", self.attributes_added, self.attributes_removed, self.attributes_changed),
            ("blocks", self.containers_added, self.containers_removed, self.replaced),
        ];
        let mut lines = Vec::new();
        for (label, added, removed, changed) in rows {
            if added + removed + changed == 0 {
                continue;
            }
            lines.push(if use_color {
                format!(
                    "{:>10}: {} {} {}",
                    label,
                    format!("{} added", added).green(),
                    format!("{} removed", removed).red(),
                    format!("{} changed", changed).yellow()
                )
            } else {
                format!(
                    "{:>10}: {} added, {} removed, {} changed",
                    label, added, removed, changed
                )
            });
        }
        if self.entries_moved > 0 {
            let moved = format!("{:>10}: {} entr{}", "moved", self.entries_moved, if self.entries_moved == 1 { "y" } else { "ies" });
            lines.push(if use_color { moved.cyan().to_string() } else { moved });
        }
        lines.join("\n")
    }

    fn visit_block(&mut self, diff: &BlockDiff) {
        for change in &diff.changes {
            match change {
                ChildChange::Added { node, .. } => self.count_node(node, true),
                ChildChange::Removed { node, .. } => self.count_node(node, false),
                ChildChange::Modified { diff, .. } => match diff {
                    NodeDiff::Block(block) => self.visit_block(block),
                    NodeDiff::Table(table) => self.visit_table(table),
                    NodeDiff::Attribute { .. } => self.attributes_changed += 1,
                    NodeDiff::Replaced { .. } => self.replaced += 1,
                },
            }
        }
    }

    fn visit_table(&mut self, diff: &TableDiff) {
        self.entries_added += diff.added.len();
        self.entries_removed += diff.removed.len();
        self.entries_modified += diff.modified.len();
        if let Some(reorder) = &diff.reorder {
            self.entries_moved += reorder.moves.len();
        }
        for entry in &diff.modified {
            self.visit_block(&entry.diff);
        }
    }

    fn count_node(&mut self, node: &ConfigNode, added: bool) {
        match (node, added) {
            (ConfigNode::Attribute(_), true) => self.attributes_added += 1,
            (ConfigNode::Attribute(_), false) => self.attributes_removed += 1,
            (_, true) => self.containers_added += 1,
            (_, false) => self.containers_removed += 1,
        }
    }
}

impl fmt::Display for DiffStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} addition(s), {} removal(s), {} modification(s)",
            self.additions(),
            self.removals(),
            self.modifications()
        )
    }
}
