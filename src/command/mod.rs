//! Configuration commands.
//!
//! A [`Command`] is one atomic operation in the configuration language,
//! issued in the context reached by the commands before it. Each command
//! records that context as a [`ConfigPath`], which keeps sequences
//! self-describing: they can be rendered as text, replayed on a model by the
//! [`Applier`], or rebased under another context (see [`Command::rebase`]).
//!
//! ```text
//! config firewall policy          EnterBlock      path: <root>
//!     edit 2                      EnterOrCreate   path: firewall policy
//!         set action accept       SetAttr         path: firewall policy > 2
//!     next                        LeaveBlock      path: firewall policy > 2
//!     move 2 before 1             MoveEntry       path: firewall policy
//! end                             LeaveBlock      path: firewall policy
//! ```

mod apply;
mod generate;

pub use apply::{apply_commands, Applier};
pub use generate::{generate, generate_inverse};

use crate::model::{quote_key, quote_name, quote_token, AttrValue, ConfigPath};
use crate::render::set_line;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The verb of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verb {
    /// `config <name>`
    EnterBlock,
    /// `edit <key>`
    EnterOrCreateEntry,
    /// `set <attr> <value...>`
    SetAttr,
    /// `unset <attr>`
    UnsetAttr,
    /// `delete <key>`
    DeleteEntry,
    /// `move <key> before|after <key>`
    MoveEntry,
    /// `next` or `end`
    LeaveBlock,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Verb::EnterBlock => "ENTER_BLOCK",
            Verb::EnterOrCreateEntry => "ENTER_OR_CREATE_ENTRY",
            Verb::SetAttr => "SET_ATTR",
            Verb::UnsetAttr => "UNSET_ATTR",
            Verb::DeleteEntry => "DELETE_ENTRY",
            Verb::MoveEntry => "MOVE_ENTRY",
            Verb::LeaveBlock => "LEAVE_BLOCK",
        };
        f.write_str(name)
    }
}

/// What a `LeaveBlock` closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveKind {
    /// Closes an entry (`next`).
    Entry,
    /// Closes a block or table (`end`).
    Config,
}

/// Where a moved entry lands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovePosition {
    /// Immediately before the named entry.
    Before(String),
    /// Immediately after the named entry.
    After(String),
}

/// Verb plus payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verb", rename_all = "snake_case")]
pub enum Op {
    /// Enter (creating if needed) a block or table.
    EnterBlock {
        /// Child name
        name: String,
    },
    /// Enter (creating if needed) a table entry.
    EnterOrCreateEntry {
        /// Entry key
        key: String,
    },
    /// Set an attribute.
    SetAttr {
        /// Attribute name
        name: String,
        /// New value
        value: AttrValue,
    },
    /// Remove an attribute.
    UnsetAttr {
        /// Attribute name
        name: String,
    },
    /// Delete a table entry.
    DeleteEntry {
        /// Entry key
        key: String,
    },
    /// Reposition a table entry.
    MoveEntry {
        /// Entry key
        key: String,
        /// Target position
        position: MovePosition,
    },
    /// Close the current context.
    LeaveBlock {
        /// Context kind
        kind: LeaveKind,
    },
}

/// One configuration command and the context it is issued in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Context the command is issued in. For `LeaveBlock`, the context
    /// being closed.
    pub path: ConfigPath,
    /// Verb and payload.
    pub op: Op,
}

impl Command {
    /// Build a command.
    pub fn new(path: ConfigPath, op: Op) -> Self {
        Self { path, op }
    }

    /// `config <name>` in `path`.
    pub fn enter_block(path: ConfigPath, name: impl Into<String>) -> Self {
        Self::new(path, Op::EnterBlock { name: name.into() })
    }

    /// `edit <key>` in the table at `path`.
    pub fn enter_entry(path: ConfigPath, key: impl Into<String>) -> Self {
        Self::new(path, Op::EnterOrCreateEntry { key: key.into() })
    }

    /// `set <name> <value>` in `path`.
    pub fn set(path: ConfigPath, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        Self::new(
            path,
            Op::SetAttr {
                name: name.into(),
                value: value.into(),
            },
        )
    }

    /// `unset <name>` in `path`.
    pub fn unset(path: ConfigPath, name: impl Into<String>) -> Self {
        Self::new(path, Op::UnsetAttr { name: name.into() })
    }

    /// `delete <key>` in the table at `path`.
    pub fn delete(path: ConfigPath, key: impl Into<String>) -> Self {
        Self::new(path, Op::DeleteEntry { key: key.into() })
    }

    /// `move <key> before <anchor>` in the table at `path`.
    pub fn move_before(path: ConfigPath, key: impl Into<String>, anchor: impl Into<String>) -> Self {
        Self::new(
            path,
            Op::MoveEntry {
                key: key.into(),
                position: MovePosition::Before(anchor.into()),
            },
        )
    }

    /// `next` (entry) or `end` (block) closing `path`.
    pub fn leave(path: ConfigPath, kind: LeaveKind) -> Self {
        Self::new(path, Op::LeaveBlock { kind })
    }

    /// The command's verb.
    pub fn verb(&self) -> Verb {
        match self.op {
            Op::EnterBlock { .. } => Verb::EnterBlock,
            Op::EnterOrCreateEntry { .. } => Verb::EnterOrCreateEntry,
            Op::SetAttr { .. } => Verb::SetAttr,
            Op::UnsetAttr { .. } => Verb::UnsetAttr,
            Op::DeleteEntry { .. } => Verb::DeleteEntry,
            Op::MoveEntry { .. } => Verb::MoveEntry,
            Op::LeaveBlock { .. } => Verb::LeaveBlock,
        }
    }

    /// The context entered by this command, if it opens one.
    pub fn entered_path(&self) -> Option<ConfigPath> {
        match &self.op {
            Op::EnterBlock { name } => Some(self.path.join(name.as_str())),
            Op::EnterOrCreateEntry { key } => Some(self.path.join(key.as_str())),
            _ => None,
        }
    }

    /// The same command issued under `base`.
    pub fn rebase(&self, base: &ConfigPath) -> Command {
        Command {
            path: base.concat(&self.path),
            op: self.op.clone(),
        }
    }

    /// The literal configuration line, without indentation.
    pub fn to_line(&self) -> String {
        match &self.op {
            Op::EnterBlock { name } => format!("config {}", quote_name(name)),
            Op::EnterOrCreateEntry { key } => format!("edit {}", quote_key(key)),
            Op::SetAttr { name, value } => set_line(name, value),
            Op::UnsetAttr { name } => format!("unset {}", quote_token(name)),
            Op::DeleteEntry { key } => format!("delete {}", quote_key(key)),
            Op::MoveEntry { key, position } => match position {
                MovePosition::Before(anchor) => {
                    format!("move {} before {}", quote_key(key), quote_key(anchor))
                }
                MovePosition::After(anchor) => {
                    format!("move {} after {}", quote_key(key), quote_key(anchor))
                }
            },
            Op::LeaveBlock { kind: LeaveKind::Entry } => "next".to_string(),
            Op::LeaveBlock { kind: LeaveKind::Config } => "end".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Render a command sequence as an indented script.
pub fn render_script(commands: &[Command], indent: usize) -> String {
    let mut out = String::new();
    let mut depth: usize = 0;
    for command in commands {
        if command.verb() == Verb::LeaveBlock {
            depth = depth.saturating_sub(1);
        }
        for _ in 0..depth * indent {
            out.push(' ');
        }
        out.push_str(&command.to_line());
        out.push('\n');
        if command.entered_path().is_some() {
            depth += 1;
        }
    }
    out
}

/// Commands that close every context a sequence leaves open, innermost
/// first.
pub fn unwind(commands: &[Command]) -> Vec<Command> {
    let mut open: Vec<(ConfigPath, LeaveKind)> = Vec::new();
    for command in commands {
        match &command.op {
            Op::EnterBlock { name } => open.push((command.path.join(name.as_str()), LeaveKind::Config)),
            Op::EnterOrCreateEntry { key } => {
                open.push((command.path.join(key.as_str()), LeaveKind::Entry))
            }
            Op::LeaveBlock { .. } => {
                open.pop();
            }
            _ => {}
        }
    }
    open.into_iter()
        .rev()
        .map(|(path, kind)| Command::leave(path, kind))
        .collect()
}
