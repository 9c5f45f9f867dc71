//! Shared test utilities and fixtures for the forticfg test suite.
//!
//! This module provides:
//! - Configuration text fixtures
//! - Parsing and planning shortcuts
//! - A scripted command sink that records what it is sent
//! - Temporary file helpers
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tempfile::TempDir;

use forticfg::command::{generate, render_script, Command};
use forticfg::diff::Differ;
use forticfg::model::ConfigTree;
use forticfg::parser::Parser;
use forticfg::policy::ConfigPolicy;
use forticfg::transport::{CommandSink, TransportError};

// ============================================================================
// Fixtures
// ============================================================================

/// A small running configuration.
pub const RUNNING: &str = r#"#config-version=FGT60F-7.2.5-FW-build1517:opmode=0:vdom=0
config system global
    set hostname "fw-edge"
    set timezone 04
end
config system interface
    edit "port1"
        set ip 192.0.2.1 255.255.255.0
        set allowaccess ping https ssh
        set status up
    next
    edit "port2"
        set status down
    next
end
config firewall address
    edit "web"
        set uuid 5a3c1e2e-0000-0000-0000-000000000001
        set subnet 198.51.100.10 255.255.255.255
    next
    edit "db"
        set subnet 198.51.100.20 255.255.255.255
    next
end
config firewall policy
    edit 1
        set name "allow-web"
        set srcintf "port1"
        set dstintf "port2"
        set action accept
    next
    edit 2
        set name "deny-db"
        set action deny
    next
    edit 3
        set name "allow-dns"
        set action accept
    next
end
"#;

/// The running configuration after a typical change: a hostname change, a
/// new address, a deleted address, an edited and reordered policy.
pub const CANDIDATE: &str = r#"config system global
    set hostname "fw-edge-2"
    set timezone 04
end
config system interface
    edit "port1"
        set ip 192.0.2.1 255.255.255.0
        set allowaccess ping https
        set status up
    next
    edit "port2"
        set status down
    next
end
config firewall address
    edit "web"
        set subnet 198.51.100.10 255.255.255.255
    next
    edit "mail"
        set subnet 198.51.100.30 255.255.255.255
        set comment "smtp relay"
    next
end
config firewall policy
    edit 2
        set name "deny-db"
        set action accept
    next
    edit 1
        set name "allow-web"
        set srcintf "port1"
        set dstintf "port2"
        set action accept
    next
    edit 3
        set name "allow-dns"
        set action accept
    next
end
"#;

// ============================================================================
// Parsing and planning shortcuts
// ============================================================================

/// The FortiOS policy used by most tests.
pub fn fortios() -> ConfigPolicy {
    ConfigPolicy::fortios()
}

/// Parse text with the FortiOS policy, in lenient mode like device output.
pub fn parse_fortios(text: &str) -> ConfigTree {
    Parser::new(fortios())
        .lenient()
        .parse(text)
        .expect("fixture should parse")
}

/// The commands turning `running` into `candidate` under the FortiOS policy.
pub fn plan(running: &ConfigTree, candidate: &ConfigTree) -> Vec<Command> {
    generate(&Differ::new(fortios()).diff(running, candidate))
}

/// Command lines without indentation.
pub fn lines(commands: &[Command]) -> Vec<String> {
    commands.iter().map(Command::to_line).collect()
}

/// A script with four-space indentation.
pub fn script(commands: &[Command]) -> String {
    render_script(commands, 4)
}

// ============================================================================
// Scripted command sink
// ============================================================================

/// A sink that records every command it is sent and rejects by send count.
///
/// Unlike the simulated device it does not interpret the commands; it is
/// used to observe exactly what the orchestrator sends and in which order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Every command received, accepted or not.
    pub received: Vec<Command>,
    /// Rejections keyed by the zero-based number of the send call.
    pub rejections: HashMap<usize, TransportError>,
}

impl RecordingSink {
    /// A sink accepting everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `call`-th send (zero-based) with `error`.
    pub fn reject_call(mut self, call: usize, error: TransportError) -> Self {
        self.rejections.insert(call, error);
        self
    }

    /// Lines of everything received.
    pub fn received_lines(&self) -> Vec<String> {
        lines(&self.received)
    }
}

#[async_trait]
impl CommandSink for RecordingSink {
    async fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        let call = self.received.len();
        self.received.push(command.clone());
        match self.rejections.remove(&call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Temporary files
// ============================================================================

/// A temporary directory holding named configuration files.
pub struct TestFiles {
    dir: TempDir,
}

impl TestFiles {
    /// An empty directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    /// Write `content` to `name` and return its path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create fixture file");
        file.write_all(content.as_bytes()).expect("write fixture file");
        path
    }

    /// The directory.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}
