//! Lazy pre-order traversal of a configuration tree.

use super::{key_cmp, Block, ConfigNode, ConfigPath, NodeRef, Table};

/// Iterator over `(path, node)` pairs, created by
/// [`ConfigTree::walk`](super::ConfigTree::walk).
///
/// Uses an explicit stack so arbitrarily deep trees never recurse.
#[derive(Debug, Clone)]
pub struct Walk<'a> {
    stack: Vec<Frame<'a>>,
}

#[derive(Debug, Clone)]
enum Frame<'a> {
    Block {
        path: ConfigPath,
        children: indexmap::map::Iter<'a, String, ConfigNode>,
    },
    Table {
        path: ConfigPath,
        entries: std::vec::IntoIter<(&'a str, &'a Block)>,
    },
}

impl<'a> Frame<'a> {
    fn block(path: ConfigPath, block: &'a Block) -> Self {
        Frame::Block {
            path,
            children: block.children.iter(),
        }
    }

    fn table(path: ConfigPath, table: &'a Table) -> Self {
        let mut entries: Vec<(&'a str, &'a Block)> = table
            .entries
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        if !table.mode.is_sequenced() {
            entries.sort_by(|a, b| key_cmp(a.0, b.0));
        }
        Frame::Table {
            path,
            entries: entries.into_iter(),
        }
    }
}

enum Step<'a> {
    Yield(ConfigPath, NodeRef<'a>, Option<Frame<'a>>),
    Pop,
}

impl<'a> Walk<'a> {
    pub(super) fn new(root: &'a Block) -> Self {
        Self {
            stack: vec![Frame::block(ConfigPath::root(), root)],
        }
    }
}

impl<'a> Iterator for Walk<'a> {
    type Item = (ConfigPath, NodeRef<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let step = match self.stack.last_mut()? {
                Frame::Block { path, children } => match children.next() {
                    Some((name, node)) => {
                        let child_path = path.join(name.as_str());
                        let nested = match node {
                            ConfigNode::Block(block) => {
                                Some(Frame::block(child_path.clone(), block))
                            }
                            ConfigNode::Table(table) => {
                                Some(Frame::table(child_path.clone(), table))
                            }
                            ConfigNode::Attribute(_) => None,
                        };
                        Step::Yield(child_path, NodeRef::from_child(node), nested)
                    }
                    None => Step::Pop,
                },
                Frame::Table { path, entries } => match entries.next() {
                    Some((key, block)) => {
                        let entry_path = path.join(key);
                        let nested = Frame::block(entry_path.clone(), block);
                        Step::Yield(entry_path, NodeRef::Entry { key, block }, Some(nested))
                    }
                    None => Step::Pop,
                },
            };

            match step {
                Step::Yield(path, node, nested) => {
                    if let Some(frame) = nested {
                        self.stack.push(frame);
                    }
                    return Some((path, node));
                }
                Step::Pop => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{AttrValue, Block, ConfigPath, ConfigTree, NodeKind, OrderingMode, Table};

    fn tree() -> ConfigTree {
        let keyed = Table::new(OrderingMode::Keyed)
            .with_entry("port2", Block::new().with_attribute("status", "down"))
            .with_entry("port1", Block::new().with_attribute("status", "up"));
        let sequenced = Table::new(OrderingMode::Sequenced)
            .with_entry("3", Block::new())
            .with_entry("1", Block::new());
        ConfigTree::from_root(
            Block::new()
                .with_child("system global", Block::new().with_attribute("hostname", "fw"))
                .with_child("system interface", keyed)
                .with_child("firewall policy", sequenced),
        )
        .unwrap()
    }

    #[test]
    fn test_walk_order() {
        let tree = tree();
        let paths: Vec<String> = tree.walk().map(|(path, _)| path.to_string()).collect();
        assert_eq!(
            paths,
            vec![
                "system global",
                "system global > hostname",
                "system interface",
                "system interface > port1",
                "system interface > port1 > status",
                "system interface > port2",
                "system interface > port2 > status",
                "firewall policy",
                "firewall policy > 3",
                "firewall policy > 1",
            ]
        );
    }

    #[test]
    fn test_walk_is_restartable() {
        let tree = tree();
        let first: Vec<_> = tree.walk().map(|(p, _)| p).collect();
        let second: Vec<_> = tree.walk().map(|(p, _)| p).collect();
        assert_eq!(first, second);

        let mut walk = tree.walk();
        walk.next();
        let resumed = walk.clone().count();
        assert_eq!(resumed, walk.count());
    }

    #[test]
    fn test_walk_kinds() {
        let tree = tree();
        let (path, node) = tree.walk().nth(1).unwrap();
        assert_eq!(path, ConfigPath::from(["system global", "hostname"]));
        assert_eq!(node.kind(), NodeKind::Attribute);
        assert_eq!(node.as_attribute(), Some(&AttrValue::scalar("fw")));
    }

    #[test]
    fn test_walk_empty_tree() {
        assert_eq!(ConfigTree::new().walk().count(), 0);
    }
}
