//! # forticfg - Structural configuration management for FortiOS-style devices
//!
//! forticfg turns the block configuration language of FortiOS-style network
//! devices into a typed tree, compares two trees structurally, and plans the
//! command sequence that turns one into the other. Commits are driven
//! through an injected transport and undone automatically when a command
//! fails half way.
//!
//! ## Core Concepts
//!
//! - **Model**: a tree of blocks, tables (keyed or sequenced) and attributes
//! - **Running / candidate**: what the device holds and what it should hold
//! - **Diff**: the structural difference between two models
//! - **Commands**: `config`/`edit`/`set`/`unset`/`delete`/`move`/`next`/`end`
//!   operations, generated from a diff in a device-safe order
//! - **Commit**: sending commands with timeouts, retries and prefix rollback
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────┐  text   ┌──────────┐  model  ┌──────────┐  diff  ┌─────────────┐
//! │ ConfigFetcher│ ──────> │  Parser  │ ──────> │  Differ  │ ─────> │  generate() │
//! └──────────────┘         └──────────┘         └──────────┘        └─────────────┘
//!                                                                          │ commands
//!                                                                          ▼
//!                          ┌──────────────┐   send    ┌───────────────────────────┐
//!                          │ CommandSink  │ <──────── │ Orchestrator (commit /    │
//!                          └──────────────┘           │ rollback state machine)   │
//!                                                     └───────────────────────────┘
//! ```
//!
//! ## Quick Example
//!
//! ```rust
//! use forticfg::prelude::*;
//!
//! # fn main() -> forticfg::Result<()> {
//! let parser = Parser::new(ConfigPolicy::fortios());
//! let running = parser.parse("config system global\n    set hostname fw1\nend\n")?;
//! let candidate = parser.parse("config system global\n    set hostname fw2\nend\n")?;
//!
//! let diff = Differ::new(ConfigPolicy::fortios()).diff(&running, &candidate);
//! let commands = generate(&diff);
//! assert_eq!(
//!     render_script(&commands, 4),
//!     "config system global\n    set hostname fw2\nend\n"
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    // Model
    pub use crate::model::{
        AttrValue, Block, ConfigNode, ConfigPath, ConfigTree, NodeKind, NodeRef, OrderingMode,
        Table,
    };
    pub use crate::policy::ConfigPolicy;

    // Text
    pub use crate::parser::{parse, ParseOptions, Parser};
    pub use crate::render::{render, RenderOptions};

    // Diff and commands
    pub use crate::command::{
        apply_commands, generate, generate_inverse, render_script, Applier, Command, Verb,
    };
    pub use crate::diff::{diff, Diff, DiffStats, Differ, TextDiffOptions};

    // Commit
    pub use crate::commit::{CommitOptions, CommitReport, CommitState, Orchestrator};
    pub use crate::retry::RetryPolicy;
    pub use crate::session::{LoadTarget, Scope, Session, Vdom};
    pub use crate::transport::{
        CommandSink, ConfigFetcher, FileFetcher, SimulatedDevice, TransportError,
    };

    // Error handling
    pub use crate::error::{Error, Result};
}

// ============================================================================
// Model
// ============================================================================

/// Error types and result aliases.
pub mod error;

/// The configuration node model.
///
/// A [`ConfigTree`](model::ConfigTree) of blocks, tables and attributes
/// addressed by [`ConfigPath`](model::ConfigPath)s.
pub mod model;

/// Vendor conventions: ordered tables and device-generated attributes.
pub mod policy;

// ============================================================================
// Text
// ============================================================================

/// Parsing of configuration text into a model.
pub mod parser;

/// Rendering of a model back into configuration text.
pub mod render;

// ============================================================================
// Diff and Commands
// ============================================================================

/// Structural and textual comparison of models.
pub mod diff;

/// Configuration commands, their generation from a diff and their replay
/// on a model.
pub mod command;

// ============================================================================
// Device Interaction
// ============================================================================

/// Commit and rollback orchestration.
pub mod commit;

/// Retry policies for transport calls.
pub mod retry;

/// Device sessions: running, candidate and original models.
pub mod session;

/// The transport boundary and its built-in implementations.
pub mod transport;

pub use error::{Error, Result};

// ============================================================================
// Version Information
// ============================================================================

/// Returns the current version of forticfg.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
