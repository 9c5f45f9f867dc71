//! Line-based diff of rendered configuration text.
//!
//! Complements the structural diff with the familiar unified format, used
//! by the session's text comparison and the CLI's `diff --text` output.

use colored::Colorize;
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

/// Type of change in a diff line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Line was inserted
    Insert,
    /// Line was deleted
    Delete,
    /// Line is unchanged (context)
    Equal,
}

/// A single line in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// The content of the line, without its line break
    pub content: String,
    /// The type of change
    pub change_type: ChangeType,
}

/// A hunk (group of changes) in a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// Starting line number in old text
    pub old_start: usize,
    /// Number of lines from old text
    pub old_count: usize,
    /// Starting line number in new text
    pub new_start: usize,
    /// Number of lines from new text
    pub new_count: usize,
    /// Lines in this hunk
    pub lines: Vec<DiffLine>,
}

/// Line counts of a text diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStats {
    /// Number of lines inserted
    pub insertions: usize,
    /// Number of lines deleted
    pub deletions: usize,
    /// Number of hunks
    pub hunks: usize,
}

impl LineStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.insertions > 0 || self.deletions > 0
    }
}

/// Result of a line diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDiff {
    /// Label of the old side
    pub old_label: String,
    /// Label of the new side
    pub new_label: String,
    /// All hunks in the diff
    pub hunks: Vec<DiffHunk>,
    /// Line counts
    pub stats: LineStats,
}

impl LineDiff {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.stats.has_changes()
    }

    /// Format as unified diff text. Empty when nothing changed.
    pub fn to_unified(&self, use_color: bool) -> String {
        if !self.has_changes() {
            return String::new();
        }

        let mut output = Vec::new();
        let old_header = format!("--- {}", self.old_label);
        let new_header = format!("+++ {}", self.new_label);
        if use_color {
            output.push(old_header.red().bold().to_string());
            output.push(new_header.green().bold().to_string());
        } else {
            output.push(old_header);
            output.push(new_header);
        }

        for hunk in &self.hunks {
            let header = format!(
                "@@ -{},{} +{},{} @@",
                hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
            );
            output.push(if use_color {
                header.cyan().to_string()
            } else {
                header
            });
            for line in &hunk.lines {
                output.push(format_line(line, use_color));
            }
        }

        let mut text = output.join("\n");
        text.push('\n');
        text
    }
}

/// Options for text diffs
#[derive(Debug, Clone)]
pub struct TextDiffOptions {
    /// Number of context lines around changes
    pub context_lines: usize,
    /// Whether to use color output
    pub use_color: bool,
    /// Label of the old side
    pub old_label: String,
    /// Label of the new side
    pub new_label: String,
}

impl Default for TextDiffOptions {
    fn default() -> Self {
        Self {
            context_lines: 3,
            use_color: false,
            old_label: "running".to_string(),
            new_label: "candidate".to_string(),
        }
    }
}

impl TextDiffOptions {
    /// Set the number of context lines
    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Enable or disable color
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.use_color = use_color;
        self
    }

    /// Set both labels
    pub fn with_labels(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_label = old.into();
        self.new_label = new.into();
        self
    }
}

/// Compute a line diff between two texts
pub fn line_diff(old: &str, new: &str, options: &TextDiffOptions) -> LineDiff {
    let text_diff = TextDiff::from_lines(old, new);
    let mut unified = text_diff.unified_diff();
    unified.context_radius(options.context_lines);

    let mut hunks = Vec::new();
    let mut stats = LineStats::default();

    for hunk in unified.iter_hunks() {
        let mut lines = Vec::new();
        let (mut old_start, mut old_count, mut new_start, mut new_count) = (None, 0, None, 0);

        for change in hunk.iter_changes() {
            let change_type = match change.tag() {
                ChangeTag::Delete => {
                    stats.deletions += 1;
                    ChangeType::Delete
                }
                ChangeTag::Insert => {
                    stats.insertions += 1;
                    ChangeType::Insert
                }
                ChangeTag::Equal => ChangeType::Equal,
            };
            if let Some(index) = change.old_index() {
                old_start.get_or_insert(index + 1);
                old_count += 1;
            }
            if let Some(index) = change.new_index() {
                new_start.get_or_insert(index + 1);
                new_count += 1;
            }
            lines.push(DiffLine {
                content: change.value().trim_end_matches(['\n', '\r']).to_string(),
                change_type,
            });
        }

        stats.hunks += 1;
        hunks.push(DiffHunk {
            old_start: old_start.unwrap_or(0),
            old_count,
            new_start: new_start.unwrap_or(0),
            new_count,
            lines,
        });
    }

    LineDiff {
        old_label: options.old_label.clone(),
        new_label: options.new_label.clone(),
        hunks,
        stats,
    }
}

/// Quick helper to generate a unified diff string
pub fn unified_diff(before: &str, after: &str, options: &TextDiffOptions) -> String {
    line_diff(before, after, options).to_unified(options.use_color)
}

fn format_line(line: &DiffLine, use_color: bool) -> String {
    match (line.change_type, use_color) {
        (ChangeType::Delete, true) => format!("{}{}", "-".red(), line.content.red()),
        (ChangeType::Delete, false) => format!("-{}", line.content),
        (ChangeType::Insert, true) => format!("{}{}", "+".green(), line.content.green()),
        (ChangeType::Insert, false) => format!("+{}", line.content),
        (ChangeType::Equal, _) => format!(" {}", line.content),
    }
}
