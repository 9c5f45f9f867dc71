//! Export of a model to configuration text.
//!
//! Text is the canonical serialized form: [`render`] output parses back into
//! an equal model. Children are emitted in insertion order, table entries in
//! positional order, and vacant containers are omitted.

use crate::model::{
    quote_key, quote_name, quote_token, AttrValue, Block, ConfigNode, ConfigTree, Table,
};
use sha2::{Digest, Sha256};
use std::fmt;

/// Rendering switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Spaces per nesting level.
    pub indent: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { indent: 4 }
    }
}

/// Render a model with default options.
pub fn render(tree: &ConfigTree) -> String {
    render_with(tree, &RenderOptions::default())
}

/// Render a model.
pub fn render_with(tree: &ConfigTree, options: &RenderOptions) -> String {
    let mut writer = Writer::new(options);
    writer.block(tree.root());
    writer.out
}

/// Render a single named node as it would appear inside its parent.
pub fn render_node(name: &str, node: &ConfigNode, options: &RenderOptions) -> String {
    let mut writer = Writer::new(options);
    writer.child(name, node);
    writer.out
}

/// A `set` line body for an attribute (without indentation).
pub fn set_line(name: &str, value: &AttrValue) -> String {
    if value.is_empty() {
        format!("set {}", quote_token(name))
    } else {
        format!("set {} {}", quote_token(name), value.to_tokens())
    }
}

impl ConfigTree {
    /// Canonical text form.
    pub fn to_text(&self) -> String {
        render(self)
    }

    /// SHA-256 of the canonical text form, hex encoded.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_text().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for ConfigTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

struct Writer<'o> {
    options: &'o RenderOptions,
    depth: usize,
    out: String,
}

impl<'o> Writer<'o> {
    fn new(options: &'o RenderOptions) -> Self {
        Self {
            options,
            depth: 0,
            out: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth * self.options.indent {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn block(&mut self, block: &Block) {
        for (name, node) in block.children() {
            self.child(name, node);
        }
    }

    fn child(&mut self, name: &str, node: &ConfigNode) {
        if node.is_vacant() {
            return;
        }
        match node {
            ConfigNode::Attribute(value) => self.line(&set_line(name, value)),
            ConfigNode::Block(block) => {
                self.line(&format!("config {}", quote_name(name)));
                self.depth += 1;
                self.block(block);
                self.depth -= 1;
                self.line("end");
            }
            ConfigNode::Table(table) => {
                self.line(&format!("config {}", quote_name(name)));
                self.depth += 1;
                self.table(table);
                self.depth -= 1;
                self.line("end");
            }
        }
    }

    fn table(&mut self, table: &Table) {
        for (key, entry) in table.entries() {
            self.line(&format!("edit {}", quote_key(key)));
            self.depth += 1;
            self.block(entry);
            self.depth -= 1;
            self.line("next");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConfigPath, OrderingMode};
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn sample() -> ConfigTree {
        let interfaces = Table::new(OrderingMode::Keyed).with_entry(
            "port1",
            Block::new()
                .with_attribute("status", "up")
                .with_attribute("allowaccess", vec!["ping", "https"])
                .with_attribute("description", "uplink to core"),
        );
        ConfigTree::from_root(
            Block::new()
                .with_child("system global", Block::new().with_attribute("hostname", "fw"))
                .with_child("system interface", interfaces)
                .with_child("system dns", Block::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_render_layout() {
        let expected = "\
config system global
    set hostname fw
end
config system interface
    edit \"port1\"
        set status up
        set allowaccess ping https
        set description \"uplink to core\"
    next
end
";
        assert_eq!(render(&sample()), expected);
    }

    #[test]
    fn test_render_round_trip() {
        let tree = sample();
        assert_eq!(parse(&tree.to_text()).unwrap(), tree);
    }

    #[test]
    fn test_empty_list_and_empty_entry() {
        let tree = ConfigTree::from_root(Block::new().with_child(
            "firewall policy",
            Table::new(OrderingMode::Sequenced)
                .with_entry("1", Block::new().with_attribute("groups", AttrValue::empty()))
                .with_entry("2", Block::new()),
        ))
        .unwrap();
        let text = render(&tree);
        assert!(text.contains("    edit 1\n        set groups\n    next\n"));
        assert!(text.contains("    edit 2\n    next\n"));
        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed, tree);
        assert_eq!(
            reparsed.attribute(&ConfigPath::from(["firewall policy", "1", "groups"])),
            Some(&AttrValue::empty())
        );
    }

    #[test]
    fn test_checksum_tracks_content() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a.checksum(), b.checksum());
        assert_eq!(a.checksum().len(), 64);
        b.set_attribute(&ConfigPath::from(["system global", "hostname"]), "fw2")
            .unwrap();
        assert_ne!(a.checksum(), b.checksum());
    }

    #[test]
    fn test_render_node_with_indent() {
        let options = RenderOptions { indent: 2 };
        let node = ConfigNode::Block(Block::new().with_attribute("hostname", "fw"));
        assert_eq!(
            render_node("system global", &node, &options),
            "config system global\n  set hostname fw\nend\n"
        );
    }
}
