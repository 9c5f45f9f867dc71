//! Property-based tests for forticfg using proptest.
//!
//! Random configuration models are generated with a fixed vocabulary per
//! node kind (attributes, blocks, keyed tables, sequenced tables) so that
//! two independently generated models can be diffed against each other
//! without a child changing kind. A separate set of laws covers models that
//! share one child whose kind is drawn at random.

use forticfg::command::{generate, generate_inverse, unwind, Applier, Command, Verb};
use forticfg::commit::rollback_commands;
use forticfg::diff::Differ;
use forticfg::model::{AttrValue, Block, ConfigNode, ConfigTree, OrderingMode, Table};
use forticfg::parser::parse;
use forticfg::policy::ConfigPolicy;
use proptest::collection::{btree_map, vec};
use proptest::prelude::*;
use proptest::sample::Index;

// ============================================================================
// Strategies for generating test data
// ============================================================================

/// Attribute tokens, including empty ones and ones needing quotes.
fn token() -> impl Strategy<Value = String> {
    "[a-z0-9 \"]{0,5}"
}

fn attr_value() -> impl Strategy<Value = AttrValue> {
    vec(token(), 0..3).prop_map(AttrValue::list)
}

fn attr_name() -> impl Strategy<Value = String> {
    "[a-d]{1,3}"
}

/// A block (or entry) nesting containers up to `depth` levels.
fn block(depth: u32) -> BoxedStrategy<Block> {
    let attributes = btree_map(attr_name(), attr_value(), 0..4);
    if depth == 0 {
        return attributes
            .prop_map(|attributes| {
                attributes
                    .into_iter()
                    .fold(Block::new(), |b, (name, value)| b.with_attribute(name, value))
            })
            .boxed();
    }
    (attributes, vec(child(depth - 1), 0..3))
        .prop_map(|(attributes, children)| {
            let block = attributes
                .into_iter()
                .fold(Block::new(), |b, (name, value)| b.with_attribute(name, value));
            children
                .into_iter()
                .fold(block, |b, (name, node)| b.with_child(name, node))
        })
        .boxed()
}

/// Block names, including ones that only survive rendering when quoted.
fn block_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "blk [a-c]{1,2}",
        "blk  [a-c]",
        "blk \"[a-c]\"",
        " blk[a-c]?",
        "blk\\\\[a-c] ",
        Just(String::new()),
    ]
}

/// A named container. Names encode the kind, so a name never changes kind.
fn child(depth: u32) -> BoxedStrategy<(String, ConfigNode)> {
    prop_oneof![
        (block_name(), block(depth)).prop_map(|(name, b)| (name, ConfigNode::Block(b))),
        ("map [a-c]", keyed_table(depth)).prop_map(|(name, t)| (name, ConfigNode::Table(t))),
        ("seq [a-c]", sequenced_table(depth)).prop_map(|(name, t)| (name, ConfigNode::Table(t))),
    ]
    .boxed()
}

fn keyed_table(depth: u32) -> impl Strategy<Value = Table> {
    btree_map("[a-c]{1,2}", block(depth), 1..4).prop_map(|entries| {
        entries
            .into_iter()
            .fold(Table::new(OrderingMode::Keyed), |t, (key, entry)| t.with_entry(key, entry))
    })
}

/// Numeric keys in random order.
fn sequenced_table(depth: u32) -> impl Strategy<Value = Table> {
    btree_map("[1-9][0-9]?", block(depth), 1..5)
        .prop_map(|entries| entries.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
        .prop_map(|entries| {
            entries
                .into_iter()
                .fold(Table::new(OrderingMode::Sequenced), |t, (key, entry)| {
                    t.with_entry(key, entry)
                })
        })
}

/// A complete model. The root holds containers only.
fn config_tree() -> impl Strategy<Value = ConfigTree> {
    vec(child(2), 0..5).prop_map(|children| {
        ConfigTree::from_root(
            children
                .into_iter()
                .fold(Block::new(), |b, (name, node)| b.with_child(name, node)),
        )
        .unwrap()
    })
}

/// Any kind of node, for a child whose kind differs between two models.
fn any_kind(depth: u32) -> BoxedStrategy<ConfigNode> {
    prop_oneof![
        attr_value().prop_map(ConfigNode::Attribute),
        block(depth).prop_map(ConfigNode::Block),
        keyed_table(depth).prop_map(ConfigNode::Table),
        sequenced_table(depth).prop_map(ConfigNode::Table),
    ]
    .boxed()
}

/// A model holding `blk flip/flip`, whose kind is drawn independently.
fn flipping_tree() -> impl Strategy<Value = ConfigTree> {
    (config_tree(), any_kind(1)).prop_map(|(tree, flip)| {
        let root = tree
            .root()
            .clone()
            .with_child("blk flip", Block::new().with_child("flip", flip));
        ConfigTree::from_root(root).unwrap()
    })
}

fn policy() -> ConfigPolicy {
    ConfigPolicy::new()
}

fn plan(old: &ConfigTree, new: &ConfigTree) -> Vec<Command> {
    generate(&Differ::new(policy()).diff(old, new))
}

fn replay(tree: &ConfigTree, commands: &[Command]) -> ConfigTree {
    let mut applier = Applier::new(tree.clone(), policy());
    applier.apply_all(commands).expect("generated commands apply");
    applier.into_tree().expect("generated commands are balanced")
}

// ============================================================================
// Text round trip
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rendered_text_parses_back(tree in config_tree()) {
        let text = tree.to_text();
        let parsed = parse(&text).unwrap();
        prop_assert_eq!(&parsed, &tree);
        prop_assert_eq!(parsed.to_text(), text);
    }

    #[test]
    fn parser_never_panics(text in "(config|edit|set|unset|next|end|[a-z\" ]){0,12}(\n(config|edit|set|next|end|[a-z0-9\" ]){0,8}){0,10}") {
        let _ = parse(&text);
    }
}

// ============================================================================
// Diff and generation laws
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn diff_with_self_is_empty(tree in config_tree()) {
        prop_assert!(Differ::new(policy()).diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn diff_is_empty_iff_equal(a in config_tree(), b in config_tree()) {
        let diff = Differ::new(policy()).diff(&a, &b);
        prop_assert_eq!(diff.is_empty(), a == b);
    }

    #[test]
    fn generated_commands_reach_target(a in config_tree(), b in config_tree()) {
        let commands = plan(&a, &b);
        prop_assert!(unwind(&commands).is_empty());
        prop_assert_eq!(replay(&a, &commands), b);
    }

    #[test]
    fn inverse_commands_restore_source(a in config_tree(), b in config_tree()) {
        let diff = Differ::new(policy()).diff(&a, &b);
        prop_assert_eq!(&diff.invert().invert(), &diff);
        prop_assert_eq!(replay(&b, &generate_inverse(&diff)), a);
    }

    #[test]
    fn destructive_commands_follow_constructive(a in config_tree(), b in config_tree()) {
        let commands = plan(&a, &b);
        let last_construct = commands
            .iter()
            .rposition(|c| matches!(c.verb(), Verb::SetAttr));
        let first_destruct = commands
            .iter()
            .position(|c| matches!(c.verb(), Verb::UnsetAttr | Verb::DeleteEntry | Verb::MoveEntry));
        if let (Some(set), Some(destruct)) = (last_construct, first_destruct) {
            prop_assert!(set < destruct, "{:?}", commands.iter().map(Command::to_line).collect::<Vec<_>>());
        }

        // Within a table, every move comes after every delete.
        for (index, command) in commands.iter().enumerate() {
            if command.verb() == Verb::MoveEntry {
                prop_assert!(!commands[index..]
                    .iter()
                    .any(|c| c.verb() == Verb::DeleteEntry && c.path == command.path));
            }
        }
    }

    #[test]
    fn rollback_of_any_prefix_restores_source(
        a in config_tree(),
        b in config_tree(),
        cut in any::<Index>(),
    ) {
        let commands = plan(&a, &b);
        let k = cut.index(commands.len() + 1);

        let mut applier = Applier::new(a.clone(), policy());
        applier.apply_all(&commands[..k]).unwrap();
        let rollback = rollback_commands(&a, &commands[..k], &policy()).unwrap();
        applier.apply_all(&rollback).unwrap();
        prop_assert_eq!(applier.into_tree().unwrap(), a);
    }
}

// ============================================================================
// Kind changes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(96))]

    #[test]
    fn kind_changes_reach_target(a in flipping_tree(), b in flipping_tree()) {
        let commands = plan(&a, &b);
        prop_assert!(unwind(&commands).is_empty());
        prop_assert_eq!(replay(&a, &commands), b);
    }

    #[test]
    fn kind_changes_invert(a in flipping_tree(), b in flipping_tree()) {
        let diff = Differ::new(policy()).diff(&a, &b);
        prop_assert_eq!(&diff.invert().invert(), &diff);
        prop_assert_eq!(replay(&b, &generate_inverse(&diff)), a);
    }

    #[test]
    fn kind_changes_roll_back_from_any_prefix(
        a in flipping_tree(),
        b in flipping_tree(),
        cut in any::<Index>(),
    ) {
        let commands = plan(&a, &b);
        let k = cut.index(commands.len() + 1);

        let mut applier = Applier::new(a.clone(), policy());
        applier.apply_all(&commands[..k]).unwrap();
        let rollback = rollback_commands(&a, &commands[..k], &policy()).unwrap();
        applier.apply_all(&rollback).unwrap();
        prop_assert_eq!(applier.into_tree().unwrap(), a);
    }
}
