//! Configuration Node Model
//!
//! The in-memory tree every other component reads or mutates. A
//! [`ConfigTree`] owns a root [`Block`]; blocks hold named children which are
//! sub-blocks, [`Table`]s or attributes ([`AttrValue`]); tables hold keyed
//! entries which are themselves blocks.
//!
//! ```text
//! config system interface        <- Table "system interface"
//!     edit "port1"               <- Entry "port1" (a Block)
//!         set status up          <- Attribute "status" = ["up"]
//!         config ipv6            <- Block "ipv6"
//!             set ip6-mode static
//!         end
//!     next
//! end
//! ```
//!
//! Ownership is strictly tree-shaped: nothing is shared between parents and
//! `clone()` produces a fully independent copy.
//!
//! # Equality
//!
//! Two trees are equal when they hold the same significant content:
//!
//! - children of a block are compared as a mapping (order is irrelevant);
//! - a block or table without significant content is *vacant* and equal to
//!   being absent (entries are always significant);
//! - tables compare their entries by key, and additionally by position when
//!   either side is [`OrderingMode::Sequenced`];
//! - attribute values are compared exactly, token by token.

mod path;
mod value;
mod walk;

pub use path::ConfigPath;
pub use value::{is_numeric_key, needs_quotes, quote_key, quote_name, quote_token, AttrValue};
pub use walk::Walk;

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// ============================================================================
// Ordering Mode
// ============================================================================

/// How a table's entries are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderingMode {
    /// Entries are addressed by key; their order carries no meaning.
    #[default]
    Keyed,
    /// Entry positions are meaningful (e.g. policy evaluation order).
    Sequenced,
}

impl OrderingMode {
    /// True for [`OrderingMode::Sequenced`].
    pub fn is_sequenced(self) -> bool {
        matches!(self, OrderingMode::Sequenced)
    }
}

impl fmt::Display for OrderingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingMode::Keyed => write!(f, "keyed"),
            OrderingMode::Sequenced => write!(f, "sequenced"),
        }
    }
}

impl std::str::FromStr for OrderingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "keyed" | "key" | "unordered" => Ok(OrderingMode::Keyed),
            "sequenced" | "ordered" | "sequence" => Ok(OrderingMode::Sequenced),
            _ => Err(Error::Config(format!(
                "Unknown ordering mode: {}. Valid options: keyed, sequenced",
                s
            ))),
        }
    }
}

/// Total order on entry keys: numeric keys first, by value (of any length),
/// then every other key lexicographically.
pub fn key_cmp(a: &str, b: &str) -> Ordering {
    match (is_numeric_key(a), is_numeric_key(b)) {
        (true, true) => {
            let (x, y) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
            x.len()
                .cmp(&y.len())
                .then_with(|| x.cmp(y))
                .then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.cmp(b),
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// A node stored in a block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ConfigNode {
    /// A named container of child nodes.
    Block(Block),
    /// A named container of keyed entries.
    Table(Table),
    /// A scalar or list value.
    Attribute(AttrValue),
}

impl ConfigNode {
    /// The kind of this node.
    pub fn kind(&self) -> NodeKind {
        match self {
            ConfigNode::Block(_) => NodeKind::Block,
            ConfigNode::Table(_) => NodeKind::Table,
            ConfigNode::Attribute(_) => NodeKind::Attribute,
        }
    }

    /// True for a block or table with no significant content.
    pub fn is_vacant(&self) -> bool {
        match self {
            ConfigNode::Block(block) => block.is_vacant(),
            ConfigNode::Table(table) => table.is_empty(),
            ConfigNode::Attribute(_) => false,
        }
    }

    /// Borrow as a block.
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            ConfigNode::Block(block) => Some(block),
            _ => None,
        }
    }

    /// Borrow as a table.
    pub fn as_table(&self) -> Option<&Table> {
        match self {
            ConfigNode::Table(table) => Some(table),
            _ => None,
        }
    }

    /// Borrow as an attribute value.
    pub fn as_attribute(&self) -> Option<&AttrValue> {
        match self {
            ConfigNode::Attribute(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for ConfigNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConfigNode::Block(a), ConfigNode::Block(b)) => a == b,
            (ConfigNode::Table(a), ConfigNode::Table(b)) => a == b,
            (ConfigNode::Attribute(a), ConfigNode::Attribute(b)) => a == b,
            _ => self.is_vacant() && other.is_vacant(),
        }
    }
}

impl From<Block> for ConfigNode {
    fn from(block: Block) -> Self {
        ConfigNode::Block(block)
    }
}

impl From<Table> for ConfigNode {
    fn from(table: Table) -> Self {
        ConfigNode::Table(table)
    }
}

impl From<AttrValue> for ConfigNode {
    fn from(value: AttrValue) -> Self {
        ConfigNode::Attribute(value)
    }
}

/// Discriminant of a node, including table entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A block.
    Block,
    /// A table.
    Table,
    /// An entry of a table.
    Entry,
    /// An attribute.
    Attribute,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Block => write!(f, "block"),
            NodeKind::Table => write!(f, "table"),
            NodeKind::Entry => write!(f, "entry"),
            NodeKind::Attribute => write!(f, "attribute"),
        }
    }
}

/// A borrowed view of any node reachable by path.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    /// A block child of a block (or the root).
    Block(&'a Block),
    /// A table child of a block.
    Table(&'a Table),
    /// An entry of a table.
    Entry {
        /// The entry's key.
        key: &'a str,
        /// The entry's content.
        block: &'a Block,
    },
    /// An attribute of a block or entry.
    Attribute(&'a AttrValue),
}

impl<'a> NodeRef<'a> {
    /// The kind of the referenced node.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeRef::Block(_) => NodeKind::Block,
            NodeRef::Table(_) => NodeKind::Table,
            NodeRef::Entry { .. } => NodeKind::Entry,
            NodeRef::Attribute(_) => NodeKind::Attribute,
        }
    }

    /// The block behind a block or an entry.
    pub fn as_block(&self) -> Option<&'a Block> {
        match *self {
            NodeRef::Block(block) | NodeRef::Entry { block, .. } => Some(block),
            _ => None,
        }
    }

    /// The table, if this is one.
    pub fn as_table(&self) -> Option<&'a Table> {
        match *self {
            NodeRef::Table(table) => Some(table),
            _ => None,
        }
    }

    /// The attribute value, if this is one.
    pub fn as_attribute(&self) -> Option<&'a AttrValue> {
        match *self {
            NodeRef::Attribute(value) => Some(value),
            _ => None,
        }
    }

    fn from_child(node: &'a ConfigNode) -> Self {
        match node {
            ConfigNode::Block(block) => NodeRef::Block(block),
            ConfigNode::Table(table) => NodeRef::Table(table),
            ConfigNode::Attribute(value) => NodeRef::Attribute(value),
        }
    }
}

// ============================================================================
// Block
// ============================================================================

/// A named container of child nodes; also the content of a table entry.
///
/// Child names are unique. Insertion order is preserved for emission but
/// does not take part in equality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Block {
    children: IndexMap<String, ConfigNode>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style attribute setter.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.children
            .insert(name.into(), ConfigNode::Attribute(value.into()));
        self
    }

    /// Builder-style child setter.
    pub fn with_child(mut self, name: impl Into<String>, node: impl Into<ConfigNode>) -> Self {
        self.children.insert(name.into(), node.into());
        self
    }

    /// Look up a child by name.
    pub fn get(&self, name: &str) -> Option<&ConfigNode> {
        self.children.get(name)
    }

    /// Look up a child by name, mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut ConfigNode> {
        self.children.get_mut(name)
    }

    /// Look up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.children.get(name).and_then(ConfigNode::as_attribute)
    }

    /// Look up a sub-block.
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.children.get(name).and_then(ConfigNode::as_block)
    }

    /// Look up a table.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.children.get(name).and_then(ConfigNode::as_table)
    }

    /// Insert or replace a child, keeping its position if it already existed.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<ConfigNode>) -> Option<ConfigNode> {
        self.children.insert(name.into(), node.into())
    }

    /// Remove a child, preserving the order of the remaining children.
    pub fn remove(&mut self, name: &str) -> Option<ConfigNode> {
        self.children.shift_remove(name)
    }

    /// True if a child with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.children
            .iter()
            .filter_map(|(k, v)| v.as_attribute().map(|a| (k.as_str(), a)))
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if the block has no children at all.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// True if every child is a vacant container.
    pub fn is_vacant(&self) -> bool {
        self.children.values().all(ConfigNode::is_vacant)
    }

    fn significant(&self) -> impl Iterator<Item = (&String, &ConfigNode)> {
        self.children.iter().filter(|(_, node)| !node.is_vacant())
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.significant()
            .all(|(name, node)| other.children.get(name).is_some_and(|o| node == o))
            && other
                .significant()
                .all(|(name, _)| self.children.get(name).is_some_and(|n| !n.is_vacant()))
    }
}

// ============================================================================
// Table
// ============================================================================

/// A named container of keyed entries.
///
/// Entries keep their position; for [`OrderingMode::Sequenced`] tables the
/// position is part of the table's meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    mode: OrderingMode,
    entries: IndexMap<String, Block>,
}

impl Table {
    /// An empty table with the given ordering mode.
    pub fn new(mode: OrderingMode) -> Self {
        Self {
            mode,
            entries: IndexMap::new(),
        }
    }

    /// Builder-style entry append.
    pub fn with_entry(mut self, key: impl Into<String>, entry: Block) -> Self {
        self.entries.insert(key.into(), entry);
        self
    }

    /// The ordering mode.
    pub fn mode(&self) -> OrderingMode {
        self.mode
    }

    /// Change the ordering mode.
    pub fn set_mode(&mut self, mode: OrderingMode) {
        self.mode = mode;
    }

    /// Look up an entry.
    pub fn get(&self, key: &str) -> Option<&Block> {
        self.entries.get(key)
    }

    /// Look up an entry, mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Block> {
        self.entries.get_mut(key)
    }

    /// True if the key exists.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Position of an entry.
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.entries.get_index_of(key)
    }

    /// Keys in positional order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Entries in positional order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Block)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entries in deterministic traversal order: positional for sequenced
    /// tables, sorted by key for keyed tables.
    pub fn ordered_entries(&self) -> Vec<(&str, &Block)> {
        let mut entries: Vec<_> = self.entries().collect();
        if !self.mode.is_sequenced() {
            entries.sort_by(|a, b| key_cmp(a.0, b.0));
        }
        entries
    }

    /// Append an entry. Returns `false` (and leaves the table untouched) if
    /// the key already exists.
    pub fn push(&mut self, key: impl Into<String>, entry: Block) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, entry);
        true
    }

    /// Remove an entry, preserving the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Block> {
        self.entries.shift_remove(key)
    }

    /// Move an entry so it sits immediately before `anchor`, or to the end
    /// when `anchor` is `None`. Returns the new index.
    pub fn move_before(&mut self, key: &str, anchor: Option<&str>) -> Option<usize> {
        let from = self.entries.get_index_of(key)?;
        let target = match anchor {
            Some(anchor) => {
                let anchor_index = self.entries.get_index_of(anchor)?;
                if anchor_index > from {
                    anchor_index - 1
                } else {
                    anchor_index
                }
            }
            None => self.entries.len() - 1,
        };
        self.entries.move_index(from, target);
        Some(target)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        if self.entries.len() != other.entries.len() {
            return false;
        }
        let ordered = self.mode.is_sequenced() || other.mode.is_sequenced();
        if ordered && !self.entries.keys().eq(other.entries.keys()) {
            return false;
        }
        self.entries
            .iter()
            .all(|(key, entry)| other.entries.get(key).is_some_and(|o| entry == o))
    }
}

fn merge_block(target: &mut Block, source: Block) {
    for (name, node) in source.children {
        let node = match (target.children.get_mut(&name), node) {
            (Some(ConfigNode::Block(existing)), ConfigNode::Block(block)) => {
                merge_block(existing, block);
                continue;
            }
            (Some(ConfigNode::Table(existing)), ConfigNode::Table(table)) => {
                merge_table(existing, table);
                continue;
            }
            (_, node) => node,
        };
        target.children.insert(name, node);
    }
}

fn merge_table(target: &mut Table, source: Table) {
    if target.is_empty() {
        target.mode = source.mode;
    }
    for (key, entry) in source.entries {
        match target.entries.get_mut(&key) {
            Some(existing) => merge_block(existing, entry),
            None => {
                target.entries.insert(key, entry);
            }
        }
    }
}

// ============================================================================
// Config Tree
// ============================================================================

/// A complete configuration model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTree")]
pub struct ConfigTree {
    root: Block,
}

#[derive(Deserialize)]
struct RawTree {
    root: Block,
}

impl TryFrom<RawTree> for ConfigTree {
    type Error = Error;

    fn try_from(raw: RawTree) -> Result<Self> {
        Self::from_root(raw.root)
    }
}

/// A mutable container resolved from a path.
pub(crate) enum ContainerMut<'a> {
    Block(&'a mut Block),
    Table(&'a mut Table),
}

impl ConfigTree {
    /// An empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing root block.
    ///
    /// Attributes cannot live at the top level of a configuration, so a root
    /// holding one is rejected.
    pub fn from_root(root: Block) -> Result<Self> {
        if let Some((name, _)) = root
            .children()
            .find(|(_, node)| matches!(node, ConfigNode::Attribute(_)))
        {
            return Err(Error::invalid_path(
                ConfigPath::root().join(name),
                "attributes are not allowed at the top level",
            ));
        }
        Ok(Self { root })
    }

    /// A tree rooted at some inner block, whose attributes stay where they are.
    pub(crate) fn view(root: Block) -> Self {
        Self { root }
    }

    /// The root block.
    pub fn root(&self) -> &Block {
        &self.root
    }

    /// True if the configuration holds no significant content.
    pub fn is_vacant(&self) -> bool {
        self.root.is_vacant()
    }

    /// Resolve a path. The empty path resolves to the root block.
    pub fn get(&self, path: &ConfigPath) -> Option<NodeRef<'_>> {
        let mut current = NodeRef::Block(&self.root);
        for segment in path.segments() {
            current = match current {
                NodeRef::Block(block) | NodeRef::Entry { block, .. } => {
                    NodeRef::from_child(block.children.get(segment)?)
                }
                NodeRef::Table(table) => {
                    let (key, block) = table.entries.get_key_value(segment)?;
                    NodeRef::Entry { key, block }
                }
                NodeRef::Attribute(_) => return None,
            };
        }
        Some(current)
    }

    /// Resolve a path that must name a block or an entry.
    pub fn block(&self, path: &ConfigPath) -> Option<&Block> {
        self.get(path)?.as_block()
    }

    /// Resolve a path that must name a table.
    pub fn table(&self, path: &ConfigPath) -> Option<&Table> {
        self.get(path)?.as_table()
    }

    /// Resolve a path that must name an attribute.
    pub fn attribute(&self, path: &ConfigPath) -> Option<&AttrValue> {
        self.get(path)?.as_attribute()
    }

    /// Set an attribute. The parent of `path` must resolve to a block or an
    /// entry; returns the previous value.
    pub fn set_attribute(
        &mut self,
        path: &ConfigPath,
        value: impl Into<AttrValue>,
    ) -> Result<Option<AttrValue>> {
        let (parent, name) = Self::split_child(path)?;
        let block = self.block_mut(&parent)?;
        match block.children.get_mut(name) {
            Some(ConfigNode::Attribute(existing)) => {
                Ok(Some(std::mem::replace(existing, value.into())))
            }
            Some(other) => Err(Error::invalid_path(
                path.clone(),
                format!("'{}' is a {}, not an attribute", name, other.kind()),
            )),
            None => {
                block
                    .children
                    .insert(name.to_string(), ConfigNode::Attribute(value.into()));
                Ok(None)
            }
        }
    }

    /// Remove an attribute; returns the removed value, or `None` if it was
    /// already absent.
    pub fn unset_attribute(&mut self, path: &ConfigPath) -> Result<Option<AttrValue>> {
        let (parent, name) = Self::split_child(path)?;
        let block = self.block_mut(&parent)?;
        match block.children.get(name) {
            Some(ConfigNode::Attribute(_)) => Ok(block.remove(name).and_then(|node| match node {
                ConfigNode::Attribute(value) => Some(value),
                _ => None,
            })),
            Some(other) => Err(Error::invalid_path(
                path.clone(),
                format!("'{}' is a {}, not an attribute", name, other.kind()),
            )),
            None => Ok(None),
        }
    }

    /// Open (creating if needed) a sub-block under the block or entry at
    /// `parent`.
    pub fn add_block(&mut self, parent: &ConfigPath, name: &str) -> Result<&mut Block> {
        let block = self.block_mut(parent)?;
        if !block.children.contains_key(name) {
            block
                .children
                .insert(name.to_string(), ConfigNode::Block(Block::new()));
        }
        match block.children.get_mut(name) {
            Some(ConfigNode::Block(child)) => Ok(child),
            Some(other) => Err(Error::invalid_path(
                parent.join(name),
                format!("'{}' is a {}, not a block", name, other.kind()),
            )),
            None => Err(Error::DiffInconsistency(format!(
                "block '{}' vanished after insertion",
                name
            ))),
        }
    }

    /// Open (creating if needed) a table under the block or entry at
    /// `parent`. A vacant block of the same name is converted to a table.
    pub fn add_table(
        &mut self,
        parent: &ConfigPath,
        name: &str,
        mode: OrderingMode,
    ) -> Result<&mut Table> {
        let block = self.block_mut(parent)?;
        let convert = match block.children.get(name) {
            None => true,
            Some(ConfigNode::Block(existing)) => existing.is_vacant(),
            Some(_) => false,
        };
        if convert {
            block
                .children
                .insert(name.to_string(), ConfigNode::Table(Table::new(mode)));
        }
        match block.children.get_mut(name) {
            Some(ConfigNode::Table(table)) => Ok(table),
            Some(other) => Err(Error::invalid_path(
                parent.join(name),
                format!("'{}' is a {}, not a table", name, other.kind()),
            )),
            None => Err(Error::DiffInconsistency(format!(
                "table '{}' vanished after insertion",
                name
            ))),
        }
    }

    /// Append a new entry to the table at `table_path`.
    pub fn add_entry(&mut self, table_path: &ConfigPath, key: &str) -> Result<&mut Block> {
        let table = self.table_mut(table_path)?;
        if !table.push(key, Block::new()) {
            return Err(Error::duplicate_key(table_path.clone(), key));
        }
        table.entries.get_mut(key).ok_or_else(|| {
            Error::DiffInconsistency(format!("entry '{}' vanished after insertion", key))
        })
    }

    /// Remove an entry from the table at `table_path`, returning it.
    pub fn remove_entry(&mut self, table_path: &ConfigPath, key: &str) -> Result<Block> {
        let table = self.table_mut(table_path)?;
        table
            .remove(key)
            .ok_or_else(|| Error::key_not_found(table_path.clone(), key))
    }

    /// Move an entry immediately before `anchor` (or to the end).
    pub fn move_entry(
        &mut self,
        table_path: &ConfigPath,
        key: &str,
        anchor: Option<&str>,
    ) -> Result<usize> {
        let table = self.table_mut(table_path)?;
        if !table.contains(key) {
            return Err(Error::key_not_found(table_path.clone(), key));
        }
        if let Some(anchor) = anchor {
            if !table.contains(anchor) {
                return Err(Error::key_not_found(table_path.clone(), anchor));
            }
        }
        table
            .move_before(key, anchor)
            .ok_or_else(|| Error::key_not_found(table_path.clone(), key))
    }

    /// Remove any child of a block or entry (attribute, sub-block or table).
    pub fn remove(&mut self, path: &ConfigPath) -> Result<ConfigNode> {
        let (parent, name) = Self::split_child(path)?;
        let block = self.block_mut(&parent)?;
        block
            .remove(name)
            .ok_or_else(|| Error::invalid_path(path.clone(), format!("no child named '{}'", name)))
    }

    /// A copy holding only the node at `path` and the containers leading to
    /// it, as a device returns when asked for part of its configuration.
    pub fn extract(&self, path: &ConfigPath) -> Option<ConfigTree> {
        let mut current = match self.get(path)? {
            NodeRef::Block(block) | NodeRef::Entry { block, .. } => ConfigNode::Block(block.clone()),
            NodeRef::Table(table) => ConfigNode::Table(table.clone()),
            NodeRef::Attribute(value) => ConfigNode::Attribute(value.clone()),
        };
        let segments = path.segments();
        for depth in (0..segments.len()).rev() {
            let parent = ConfigPath::new(segments[..depth].iter().cloned());
            let segment = segments[depth].clone();
            current = match self.get(&parent)? {
                NodeRef::Table(table) => match current {
                    ConfigNode::Block(entry) => {
                        ConfigNode::Table(Table::new(table.mode()).with_entry(segment, entry))
                    }
                    _ => return None,
                },
                NodeRef::Block(_) | NodeRef::Entry { .. } => {
                    ConfigNode::Block(Block::new().with_child(segment, current))
                }
                NodeRef::Attribute(_) => return None,
            };
        }
        match current {
            ConfigNode::Block(root) => Some(ConfigTree::view(root)),
            _ => None,
        }
    }

    /// Merge `part` into the block or entry at `base`. Blocks and tables
    /// present on both sides are merged recursively, anything else in `part`
    /// replaces what `self` holds under the same name.
    pub fn graft(&mut self, base: &ConfigPath, part: ConfigTree) -> Result<()> {
        merge_block(self.block_mut(base)?, part.root);
        Ok(())
    }

    /// Iterate over every node in deterministic order.
    ///
    /// Blocks and attributes are visited in insertion order, sequenced
    /// tables in positional order and keyed tables in key order. The
    /// iterator is lazy; calling `walk()` again restarts the traversal.
    pub fn walk(&self) -> Walk<'_> {
        Walk::new(&self.root)
    }

    pub(crate) fn container_mut(&mut self, path: &ConfigPath) -> Result<ContainerMut<'_>> {
        let mut current = ContainerMut::Block(&mut self.root);
        for (depth, segment) in path.segments().iter().enumerate() {
            current = match current {
                ContainerMut::Block(block) => match block.children.get_mut(segment) {
                    Some(ConfigNode::Block(child)) => ContainerMut::Block(child),
                    Some(ConfigNode::Table(table)) => ContainerMut::Table(table),
                    Some(ConfigNode::Attribute(_)) => {
                        return Err(Error::invalid_path(
                            prefix(path, depth),
                            format!("'{}' is an attribute", segment),
                        ))
                    }
                    None => {
                        return Err(Error::invalid_path(
                            prefix(path, depth),
                            format!("no child named '{}'", segment),
                        ))
                    }
                },
                ContainerMut::Table(table) => match table.entries.get_mut(segment) {
                    Some(entry) => ContainerMut::Block(entry),
                    None => {
                        return Err(Error::invalid_path(
                            prefix(path, depth),
                            format!("no entry '{}'", segment),
                        ))
                    }
                },
            };
        }
        Ok(current)
    }

    pub(crate) fn block_mut(&mut self, path: &ConfigPath) -> Result<&mut Block> {
        match self.container_mut(path)? {
            ContainerMut::Block(block) => Ok(block),
            ContainerMut::Table(_) => Err(Error::invalid_path(
                path.clone(),
                "expected a block or entry, found a table",
            )),
        }
    }

    pub(crate) fn table_mut(&mut self, path: &ConfigPath) -> Result<&mut Table> {
        match self.container_mut(path)? {
            ContainerMut::Table(table) => Ok(table),
            ContainerMut::Block(_) => Err(Error::invalid_path(
                path.clone(),
                "expected a table, found a block",
            )),
        }
    }

    fn split_child(path: &ConfigPath) -> Result<(ConfigPath, &str)> {
        match path.split_last() {
            Some((parent, _)) if parent.is_empty() => Err(Error::invalid_path(
                path.clone(),
                "attributes need an enclosing block",
            )),
            Some(split) => Ok(split),
            None => Err(Error::invalid_path(path.clone(), "the root has no parent")),
        }
    }
}

fn prefix(path: &ConfigPath, depth: usize) -> ConfigPath {
    ConfigPath::new(path.segments()[..=depth].iter().cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConfigTree {
        let mut tree = ConfigTree::new();
        let table = ConfigPath::from(["system interface"]);
        tree.add_table(&ConfigPath::root(), "system interface", OrderingMode::Keyed)
            .unwrap();
        tree.add_entry(&table, "port1").unwrap();
        tree.set_attribute(&table.join("port1").join("status"), "up")
            .unwrap();
        tree
    }

    #[test]
    fn test_get_resolves_every_kind() {
        let tree = sample();
        assert_eq!(tree.get(&ConfigPath::root()).unwrap().kind(), NodeKind::Block);
        assert_eq!(
            tree.get(&ConfigPath::from(["system interface"])).unwrap().kind(),
            NodeKind::Table
        );
        assert_eq!(
            tree.get(&ConfigPath::from(["system interface", "port1"]))
                .unwrap()
                .kind(),
            NodeKind::Entry
        );
        let status = ConfigPath::from(["system interface", "port1", "status"]);
        assert_eq!(tree.attribute(&status), Some(&AttrValue::scalar("up")));
        assert!(tree.get(&status.join("deeper")).is_none());
    }

    #[test]
    fn test_set_attribute_invalid_intermediate() {
        let mut tree = sample();
        let err = tree
            .set_attribute(&ConfigPath::from(["system global", "hostname"]), "fw")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));

        let err = tree
            .set_attribute(&ConfigPath::from(["system interface", "mtu"]), "1500")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_root_attributes_rejected() {
        let mut tree = ConfigTree::new();
        let err = tree
            .set_attribute(&ConfigPath::from(["hostname"]), "fw")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }

    #[test]
    fn test_from_root_rejects_attributes() {
        let root = Block::new()
            .with_child("system global", Block::new())
            .with_attribute("hostname", "fw");
        let err = ConfigTree::from_root(root.clone()).unwrap_err();
        assert!(
            matches!(&err, Error::InvalidPath { path, .. } if *path == ConfigPath::from(["hostname"]))
        );

        let json = serde_json::to_string(&ConfigTree::view(root)).unwrap();
        assert!(serde_json::from_str::<ConfigTree>(&json).is_err());

        let tree = ConfigTree::from_root(Block::new().with_child("system global", Block::new()))
            .unwrap();
        let back: ConfigTree = serde_json::from_str(&serde_json::to_string(&tree).unwrap()).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn test_add_entry_duplicate() {
        let mut tree = sample();
        let err = tree
            .add_entry(&ConfigPath::from(["system interface"]), "port1")
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
    }

    #[test]
    fn test_remove_entry_missing() {
        let mut tree = sample();
        let err = tree
            .remove_entry(&ConfigPath::from(["system interface"]), "port2")
            .unwrap_err();
        assert!(matches!(err, Error::KeyNotFound { .. }));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        copy.set_attribute(
            &ConfigPath::from(["system interface", "port1", "status"]),
            "down",
        )
        .unwrap();
        assert_ne!(original, copy);
        assert_eq!(
            original.attribute(&ConfigPath::from(["system interface", "port1", "status"])),
            Some(&AttrValue::scalar("up"))
        );
    }

    #[test]
    fn test_vacant_block_equals_absent() {
        let mut with_empty = sample();
        with_empty.add_block(&ConfigPath::root(), "system global").unwrap();
        assert_eq!(with_empty, sample());
    }

    #[test]
    fn test_empty_entry_is_significant() {
        let mut with_entry = sample();
        with_entry
            .add_entry(&ConfigPath::from(["system interface"]), "port2")
            .unwrap();
        assert_ne!(with_entry, sample());
    }

    #[test]
    fn test_sequenced_order_matters() {
        let a = Table::new(OrderingMode::Sequenced)
            .with_entry("1", Block::new())
            .with_entry("2", Block::new());
        let b = Table::new(OrderingMode::Sequenced)
            .with_entry("2", Block::new())
            .with_entry("1", Block::new());
        assert_ne!(a, b);

        let mut keyed_a = a.clone();
        keyed_a.set_mode(OrderingMode::Keyed);
        let mut keyed_b = b.clone();
        keyed_b.set_mode(OrderingMode::Keyed);
        assert_eq!(keyed_a, keyed_b);
    }

    #[test]
    fn test_move_before() {
        let mut table = Table::new(OrderingMode::Sequenced)
            .with_entry("1", Block::new())
            .with_entry("2", Block::new())
            .with_entry("3", Block::new());
        assert_eq!(table.move_before("3", Some("1")), Some(0));
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["3", "1", "2"]);
        assert_eq!(table.move_before("3", Some("2")), Some(1));
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["1", "3", "2"]);
        assert_eq!(table.move_before("1", None), Some(2));
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["3", "2", "1"]);
    }

    #[test]
    fn test_extract_keeps_ancestors_only() {
        let mut tree = sample();
        tree.add_entry(&ConfigPath::from(["system interface"]), "port2")
            .unwrap();
        tree.add_block(&ConfigPath::root(), "system global").unwrap();
        tree.set_attribute(&ConfigPath::from(["system global", "hostname"]), "fw")
            .unwrap();

        let part = tree
            .extract(&ConfigPath::from(["system interface", "port1"]))
            .unwrap();
        let table = part.table(&ConfigPath::from(["system interface"])).unwrap();
        assert_eq!(table.keys().collect::<Vec<_>>(), vec!["port1"]);
        assert!(part.block(&ConfigPath::from(["system global"])).is_none());
        assert!(tree.extract(&ConfigPath::from(["system dns"])).is_none());
        assert_eq!(tree.extract(&ConfigPath::root()), Some(tree.clone()));
    }

    #[test]
    fn test_graft_merges_recursively() {
        let mut tree = sample();
        let mut part = ConfigTree::new();
        let table = ConfigPath::from(["system interface"]);
        part.add_table(&ConfigPath::root(), "system interface", OrderingMode::Keyed)
            .unwrap();
        part.add_entry(&table, "port2").unwrap();
        part.set_attribute(&table.join("port2").join("status"), "down")
            .unwrap();

        tree.graft(&ConfigPath::root(), part).unwrap();
        let interfaces = tree.table(&table).unwrap();
        assert_eq!(interfaces.keys().collect::<Vec<_>>(), vec!["port1", "port2"]);
        assert!(tree.graft(&table, ConfigTree::new()).is_err());
    }

    #[test]
    fn test_key_cmp_numeric() {
        assert_eq!(key_cmp("2", "10"), Ordering::Less);
        assert_eq!(key_cmp("port10", "port2"), Ordering::Less);
        assert_eq!(key_cmp("10", "port"), Ordering::Less);
        assert_eq!(key_cmp("9", "10a"), Ordering::Less);
        assert_eq!(key_cmp("007", "7"), Ordering::Less);
    }

    #[test]
    fn test_key_cmp_overlong_numbers() {
        let big = "100000000000000000000";
        assert_eq!(key_cmp("2", big), Ordering::Less);
        assert_eq!(key_cmp("10", big), Ordering::Less);
        assert_eq!(key_cmp(big, "100000000000000000001"), Ordering::Less);
        assert_eq!(key_cmp(big, "1a"), Ordering::Less);
    }

    #[test]
    fn test_walk_keyed_table_with_overlong_numeric_keys() {
        let mut keys: Vec<String> = Vec::new();
        for i in 0..20u64 {
            keys.push(format!("1{:020}", i * 7919));
            keys.push(i.to_string());
            keys.push(format!("{}a", i));
        }
        keys.reverse();
        let table = keys
            .iter()
            .fold(Table::new(OrderingMode::Keyed), |t, key| {
                t.with_entry(key.as_str(), Block::new().with_attribute("id", key.as_str()))
            });
        let tree =
            ConfigTree::from_root(Block::new().with_child("firewall policy", table)).unwrap();

        assert_eq!(tree.walk().count(), 1 + keys.len() * 2);

        let ordered: Vec<&str> = tree
            .table(&ConfigPath::from(["firewall policy"]))
            .unwrap()
            .ordered_entries()
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        assert_eq!(ordered[0], "0");
        assert_eq!(ordered[19], "19");
        assert!(ordered[20].starts_with("1000"));
        assert!(ordered[39].len() == 21);
        assert_eq!(ordered[40], "0a");
        for pair in ordered.windows(2) {
            assert_eq!(key_cmp(pair[0], pair[1]), Ordering::Less);
        }
    }
}
