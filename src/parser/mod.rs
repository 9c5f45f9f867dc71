//! Configuration text parser.
//!
//! Builds a [`ConfigTree`] from the block grammar:
//!
//! ```text
//! config <block-name>
//!     edit <entry-key>
//!         set <attr> <value...>
//!         unset <attr>
//!     next
//! end
//! ```
//!
//! Parsing keeps an explicit stack of typed frames. Each frame records the
//! [`ConfigPath`] of the node it opened, and every mutation is resolved
//! through that path, so the parser never holds references into the tree
//! across statements.
//!
//! A `config` context becomes a table on its first `edit` and a block when it
//! receives `set`, `unset` or a nested `config`. Tables created while parsing
//! take their ordering mode from the [`ConfigPolicy`] or, when the policy does
//! not name them, from their keys once the context is closed.

mod lexer;

pub use lexer::{Keyword, Lexer, Statement};

use crate::error::{Error, Result};
use crate::model::{Block, ConfigNode, ConfigPath, ConfigTree, NodeRef, OrderingMode};
use crate::policy::ConfigPolicy;
use tracing::{debug, trace};

/// Parser behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Skip statements with unknown keywords instead of failing.
    pub lenient: bool,
}

/// Configuration text parser bound to a policy.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    policy: ConfigPolicy,
    options: ParseOptions,
}

impl Parser {
    /// Create a parser using `policy`.
    pub fn new(policy: ConfigPolicy) -> Self {
        Self {
            policy,
            options: ParseOptions::default(),
        }
    }

    /// Replace the parse options.
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Skip unknown keywords.
    pub fn lenient(mut self) -> Self {
        self.options.lenient = true;
        self
    }

    /// The policy in use.
    pub fn policy(&self) -> &ConfigPolicy {
        &self.policy
    }

    /// Parse a complete configuration or an isolated excerpt.
    pub fn parse(&self, text: &str) -> Result<ConfigTree> {
        self.parse_lines(text.lines())
    }

    /// Parse from a stream of lines.
    pub fn parse_lines<I, L>(&self, lines: I) -> Result<ConfigTree>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        let mut tree = ConfigTree::new();
        self.run(&mut tree, &ConfigPath::root(), lines)?;
        Ok(tree)
    }

    /// Merge `text` into an existing model, re-opening blocks and entries
    /// that already exist. The model is untouched if parsing fails.
    pub fn parse_into(&self, tree: &mut ConfigTree, text: &str) -> Result<()> {
        self.parse_at(tree, &ConfigPath::root(), text)
    }

    /// Merge an excerpt whose statements are relative to `base`, which must
    /// be the root, a block or an entry.
    pub fn parse_at(&self, tree: &mut ConfigTree, base: &ConfigPath, text: &str) -> Result<()> {
        if tree.block(base).is_none() {
            return Err(Error::invalid_path(
                base.clone(),
                "excerpt base must be a block or entry",
            ));
        }
        let mut work = tree.clone();
        self.run(&mut work, base, text.lines())?;
        *tree = work;
        Ok(())
    }

    fn run<I, L>(&self, tree: &mut ConfigTree, base: &ConfigPath, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        let mut state = ParseState {
            policy: &self.policy,
            options: self.options,
            tree,
            base: base.clone(),
            frames: Vec::new(),
        };
        for statement in Lexer::new(lines.into_iter()) {
            state.apply(statement?)?;
        }
        state.finish()
    }
}

/// Parse `text` with an empty policy.
pub fn parse(text: &str) -> Result<ConfigTree> {
    Parser::default().parse(text)
}

// ============================================================================
// Frame stack
// ============================================================================

#[derive(Debug)]
enum Frame {
    Config {
        name: String,
        path: ConfigPath,
        line: usize,
        created: bool,
    },
    Edit {
        key: String,
        path: ConfigPath,
        line: usize,
    },
}

impl Frame {
    fn path(&self) -> &ConfigPath {
        match self {
            Frame::Config { path, .. } | Frame::Edit { path, .. } => path,
        }
    }
}

struct ParseState<'p, 't> {
    policy: &'p ConfigPolicy,
    options: ParseOptions,
    tree: &'t mut ConfigTree,
    base: ConfigPath,
    frames: Vec<Frame>,
}

impl ParseState<'_, '_> {
    fn apply(&mut self, statement: Statement) -> Result<()> {
        let Statement {
            line,
            keyword,
            args,
        } = statement;
        trace!(line, ?keyword, "statement");
        match keyword {
            Keyword::Config => self.open_config(line, args),
            Keyword::Edit => self.open_edit(line, args),
            Keyword::Set => self.set(line, args),
            Keyword::Unset => self.unset(line, args),
            Keyword::Next => self.next(line, &args),
            Keyword::End => self.end(line, &args),
            Keyword::Other(word) if self.options.lenient => {
                debug!(line, keyword = %word, "skipping unknown statement");
                Ok(())
            }
            Keyword::Other(word) => Err(Error::syntax(
                line,
                format!("unknown keyword '{}'", word),
            )),
        }
    }

    fn current_path(&self) -> &ConfigPath {
        self.frames.last().map_or(&self.base, Frame::path)
    }

    fn open_config(&mut self, line: usize, args: Vec<String>) -> Result<()> {
        if args.is_empty() {
            return Err(Error::syntax(line, "config requires a block name"));
        }
        let name = args.join(" ");
        let parent = self.current_path().clone();
        self.require_block_context(line, &parent, "config")?;

        let path = parent.join(name.as_str());
        let created = match self.tree.get(&path) {
            None => true,
            Some(NodeRef::Attribute(_)) => {
                return Err(Error::syntax(
                    line,
                    format!("'{}' is already an attribute", name),
                ))
            }
            Some(NodeRef::Table(table)) => table.is_empty(),
            Some(node) => node.as_block().is_some_and(Block::is_vacant),
        };
        if self.tree.get(&path).is_none() {
            self.tree
                .add_block(&parent, &name)
                .map_err(|e| Error::syntax(line, e.to_string()))?;
        }
        debug!(line, path = %path, "open config");
        self.frames.push(Frame::Config {
            name,
            path,
            line,
            created,
        });
        Ok(())
    }

    fn open_edit(&mut self, line: usize, args: Vec<String>) -> Result<()> {
        let key = match <[String; 1]>::try_from(args) {
            Ok([key]) => key,
            Err(args) if args.is_empty() => {
                return Err(Error::syntax(line, "edit requires an entry key"))
            }
            Err(_) => return Err(Error::syntax(line, "edit takes exactly one key")),
        };
        let (table_path, name) = match self.frames.last() {
            Some(Frame::Config { path, name, .. }) => (path.clone(), name.clone()),
            Some(Frame::Edit { key, .. }) => {
                return Err(Error::syntax(
                    line,
                    format!("edit inside entry '{}' without an enclosing config", key),
                ))
            }
            None => return Err(Error::syntax(line, "edit outside any config context")),
        };

        let (parent, _) = table_path
            .split_last()
            .ok_or_else(|| Error::syntax(line, "edit outside any config context"))?;
        let mode = self
            .policy
            .table_mode(&name)
            .unwrap_or(OrderingMode::Keyed);
        let table = self.tree.add_table(&parent, &name, mode).map_err(|_| {
            Error::syntax(
                line,
                format!("'{}' mixes entries with attributes or blocks", name),
            )
        })?;
        if !table.contains(&key) {
            table.push(key.as_str(), Default::default());
        }
        let path = table_path.join(key.as_str());
        debug!(line, path = %path, "open entry");
        self.frames.push(Frame::Edit { key, path, line });
        Ok(())
    }

    fn set(&mut self, line: usize, mut args: Vec<String>) -> Result<()> {
        if args.is_empty() {
            return Err(Error::syntax(line, "set requires an attribute name"));
        }
        let name = args.remove(0);
        let parent = self.current_path().clone();
        self.require_attribute_context(line, &parent, "set")?;
        if self.policy.is_ignored(&name) {
            trace!(line, attribute = %name, "ignoring attribute");
            return Ok(());
        }
        self.tree
            .set_attribute(&parent.join(name), args)
            .map_err(|e| Error::syntax(line, e.to_string()))?;
        Ok(())
    }

    fn unset(&mut self, line: usize, args: Vec<String>) -> Result<()> {
        let name = match args.as_slice() {
            [name] => name,
            [] => return Err(Error::syntax(line, "unset requires an attribute name")),
            _ => return Err(Error::syntax(line, "unset takes exactly one attribute name")),
        };
        let parent = self.current_path().clone();
        self.require_attribute_context(line, &parent, "unset")?;
        self.tree
            .unset_attribute(&parent.join(name.as_str()))
            .map_err(|e| Error::syntax(line, e.to_string()))?;
        Ok(())
    }

    fn next(&mut self, line: usize, args: &[String]) -> Result<()> {
        if !args.is_empty() {
            return Err(Error::syntax(line, "next takes no arguments"));
        }
        match self.frames.last() {
            Some(Frame::Edit { .. }) => {
                if let Some(frame) = self.frames.pop() {
                    debug!(line, path = %frame.path(), "close entry");
                }
                Ok(())
            }
            _ => Err(Error::syntax(line, "unmatched next")),
        }
    }

    fn end(&mut self, line: usize, args: &[String]) -> Result<()> {
        if !args.is_empty() {
            return Err(Error::syntax(line, "end takes no arguments"));
        }
        while matches!(self.frames.last(), Some(Frame::Edit { .. })) {
            self.frames.pop();
        }
        match self.frames.pop() {
            Some(Frame::Config {
                name,
                path,
                created,
                ..
            }) => {
                debug!(line, path = %path, "close config");
                self.close_table(&name, &path, created);
                Ok(())
            }
            _ => Err(Error::syntax(line, "unmatched end")),
        }
    }

    fn finish(self) -> Result<()> {
        match self.frames.last() {
            Some(Frame::Config { name, line, .. }) => Err(Error::syntax(
                *line,
                format!("'config {}' is never closed", name),
            )),
            Some(Frame::Edit { key, line, .. }) => Err(Error::syntax(
                *line,
                format!("'edit {}' is never closed", key),
            )),
            None => Ok(()),
        }
    }

    /// Settle the ordering mode of a table opened by this parse.
    fn close_table(&mut self, name: &str, path: &ConfigPath, created: bool) {
        if !created {
            return;
        }
        let policy = self.policy;
        if let Ok(table) = self.tree.table_mut(path) {
            let mode = policy.resolve_mode(name, table);
            table.set_mode(mode);
        }
    }

    /// Attributes can only live in a block or an entry, never at the root.
    fn require_attribute_context(&mut self, line: usize, path: &ConfigPath, verb: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::syntax(
                line,
                format!("{} outside any block context", verb),
            ));
        }
        self.require_block_context(line, path, verb)
    }

    /// `set`, `unset` and `config` cannot target a populated table. An empty
    /// table left by an earlier load is turned back into a block.
    fn require_block_context(&mut self, line: usize, path: &ConfigPath, verb: &str) -> Result<()> {
        let empty_table = match self.lookup_child(path) {
            Some(ConfigNode::Table(table)) => Some(table.is_empty()),
            _ => None,
        };
        match empty_table {
            Some(false) => Err(Error::syntax(
                line,
                format!("{} inside table '{}' without edit", verb, path),
            )),
            Some(true) => {
                let (parent, name) = match path.split_last() {
                    Some(split) => split,
                    None => return Ok(()),
                };
                self.tree
                    .remove(path)
                    .and_then(|_| self.tree.add_block(&parent, name).map(|_| ()))
                    .map_err(|e| Error::syntax(line, e.to_string()))
            }
            None => Ok(()),
        }
    }

    fn lookup_child(&self, path: &ConfigPath) -> Option<&ConfigNode> {
        let (parent, name) = path.split_last()?;
        self.tree.block(&parent)?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttrValue;

    #[test]
    fn test_parse_keyed_table() {
        let tree = parse("config system interface\nedit \"port1\"\nset status up\nnext\nend\n").unwrap();
        let table = tree.table(&ConfigPath::from(["system interface"])).unwrap();
        assert_eq!(table.mode(), OrderingMode::Keyed);
        assert_eq!(
            table.get("port1").unwrap().attribute("status"),
            Some(&AttrValue::scalar("up"))
        );
    }

    #[test]
    fn test_numeric_keys_are_sequenced() {
        let tree = parse("config firewall policy\nedit 2\nnext\nedit 1\nnext\nend\n").unwrap();
        let table = tree.table(&ConfigPath::from(["firewall policy"])).unwrap();
        assert_eq!(table.mode(), OrderingMode::Sequenced);
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["2", "1"]);
    }

    #[test]
    fn test_policy_pins_mode() {
        let parser = Parser::new(ConfigPolicy::new().with_table("user local", OrderingMode::Keyed));
        let tree = parser.parse("config user local\nedit 1\nnext\nend\n").unwrap();
        assert_eq!(
            tree.table(&ConfigPath::from(["user local"])).unwrap().mode(),
            OrderingMode::Keyed
        );
    }

    #[test]
    fn test_nested_blocks() {
        let text = "config system interface\n\
                    edit port1\n\
                    config ipv6\n\
                    set ip6-mode static\n\
                    end\n\
                    next\n\
                    end\n";
        let tree = parse(text).unwrap();
        let path = ConfigPath::from(["system interface", "port1", "ipv6", "ip6-mode"]);
        assert_eq!(tree.attribute(&path), Some(&AttrValue::scalar("static")));
    }

    #[test]
    fn test_empty_set_is_empty_list() {
        let tree = parse("config system global\nset alias\nend\n").unwrap();
        assert_eq!(
            tree.attribute(&ConfigPath::from(["system global", "alias"])),
            Some(&AttrValue::empty())
        );
    }

    #[test]
    fn test_end_closes_open_entries() {
        let tree = parse("config firewall address\nedit a\nset subnet 10.0.0.0/8\nend\n").unwrap();
        assert!(tree
            .block(&ConfigPath::from(["firewall address", "a"]))
            .is_some());
    }

    #[test]
    fn test_syntax_errors_carry_line() {
        let cases = [
            ("next\n", 1),
            ("end\n", 1),
            ("set hostname fw\n", 1),
            ("config system global\nnext\n", 2),
            ("config a\nedit 1\nnext\nset x y\nend\n", 4),
            ("config a\nset x y\nedit 1\n", 3),
            ("config a\nedit 1\nedit 2\n", 3),
            ("config a\nedit 1\n", 2),
            ("config a\nbogus\nend\n", 2),
        ];
        for (text, expected) in cases {
            match parse(text) {
                Err(Error::Syntax { line, .. }) => assert_eq!(line, expected, "{:?}", text),
                other => panic!("expected syntax error for {:?}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_lenient_skips_unknown() {
        let parser = Parser::default().lenient();
        let tree = parser
            .parse("FGT # show\nconfig system global\nset hostname fw\nend\n")
            .unwrap();
        assert_eq!(
            tree.attribute(&ConfigPath::from(["system global", "hostname"])),
            Some(&AttrValue::scalar("fw"))
        );
    }

    #[test]
    fn test_ignored_attributes_dropped() {
        let parser = Parser::new(ConfigPolicy::fortios());
        let tree = parser
            .parse("config firewall policy\nedit 1\nset uuid 1234\nset action accept\nnext\nend\n")
            .unwrap();
        let entry = tree.block(&ConfigPath::from(["firewall policy", "1"])).unwrap();
        assert!(entry.attribute("uuid").is_none());
        assert!(entry.attribute("action").is_some());
    }

    #[test]
    fn test_unset_removes_attribute() {
        let mut tree = parse("config system global\nset hostname fw\nset alias x\nend\n").unwrap();
        Parser::default()
            .parse_into(&mut tree, "config system global\nunset alias\nend\n")
            .unwrap();
        let block = tree.block(&ConfigPath::from(["system global"])).unwrap();
        assert!(block.attribute("alias").is_none());
        assert!(block.attribute("hostname").is_some());
    }

    #[test]
    fn test_parse_into_failure_leaves_tree() {
        let mut tree = parse("config system global\nset hostname fw\nend\n").unwrap();
        let before = tree.clone();
        let result = Parser::default().parse_into(&mut tree, "config system global\nset hostname other\n");
        assert!(result.is_err());
        assert_eq!(tree, before);
    }

    #[test]
    fn test_parse_at_entry() {
        let mut tree = parse("config vdom\nedit root\nnext\nend\n").unwrap();
        let base = ConfigPath::from(["vdom", "root"]);
        Parser::default()
            .parse_at(&mut tree, &base, "config system settings\nset opmode nat\nend\n")
            .unwrap();
        let path = base.join("system settings").join("opmode");
        assert_eq!(tree.attribute(&path), Some(&AttrValue::scalar("nat")));
    }

    #[test]
    fn test_excerpt_siblings_absent() {
        let tree = parse("config system dns\nset primary 8.8.8.8\nend\n").unwrap();
        assert_eq!(tree.root().len(), 1);
        assert!(tree.get(&ConfigPath::from(["system global"])).is_none());
    }
}
