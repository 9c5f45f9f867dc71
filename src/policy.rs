//! Configuration policy.
//!
//! A [`ConfigPolicy`] is an immutable description of vendor conventions the
//! parser and diff engine need: which tables are ordered and which attributes
//! are device-generated and never part of a change. It is built once (from
//! code or from the settings file) and passed to every component that needs
//! it.

use crate::model::{is_numeric_key, OrderingMode, Table};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Tables whose entry order is evaluated by the device.
const FORTIOS_SEQUENCED_TABLES: &[&str] = &[
    "firewall policy",
    "firewall policy6",
    "firewall local-in-policy",
    "firewall proxy-policy",
    "firewall shaping-policy",
    "firewall interface-policy",
    "firewall DoS-policy",
    "router access-list",
    "router prefix-list",
    "router route-map",
];

/// Attributes generated by the device that cannot be set.
const FORTIOS_IGNORED_ATTRIBUTES: &[&str] = &["uuid", "snmp-index"];

/// Immutable per-vendor conventions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPolicy {
    /// Explicit ordering mode per table `config` name.
    #[serde(default)]
    pub tables: HashMap<String, OrderingMode>,
    /// Attribute names dropped by the parser and skipped by the diff engine.
    #[serde(default)]
    pub ignored_attributes: HashSet<String>,
}

impl ConfigPolicy {
    /// An empty policy: ordering is inferred, nothing is ignored.
    pub fn new() -> Self {
        Self::default()
    }

    /// FortiOS defaults: ordered policy tables, `uuid`/`snmp-index` ignored.
    pub fn fortios() -> Self {
        Self {
            tables: FORTIOS_SEQUENCED_TABLES
                .iter()
                .map(|name| (name.to_string(), OrderingMode::Sequenced))
                .collect(),
            ignored_attributes: FORTIOS_IGNORED_ATTRIBUTES
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }

    /// Builder: pin a table's ordering mode.
    pub fn with_table(mut self, name: impl Into<String>, mode: OrderingMode) -> Self {
        self.tables.insert(name.into(), mode);
        self
    }

    /// Builder: ignore an attribute.
    pub fn with_ignored(mut self, name: impl Into<String>) -> Self {
        self.ignored_attributes.insert(name.into());
        self
    }

    /// The configured mode for a table name, if any.
    pub fn table_mode(&self, name: &str) -> Option<OrderingMode> {
        self.tables.get(name).copied()
    }

    /// True if the attribute is device-generated.
    pub fn is_ignored(&self, attribute: &str) -> bool {
        self.ignored_attributes.contains(attribute)
    }

    /// Mode for a table that has just been populated: the configured mode,
    /// else sequenced when every key is a positional number.
    pub fn resolve_mode(&self, name: &str, table: &Table) -> OrderingMode {
        if let Some(mode) = self.table_mode(name) {
            return mode;
        }
        infer_mode(table.keys())
    }
}

/// Sequenced iff there is at least one key and every key is numeric.
pub fn infer_mode<'a>(keys: impl IntoIterator<Item = &'a str>) -> OrderingMode {
    let mut any = false;
    for key in keys {
        if !is_numeric_key(key) {
            return OrderingMode::Keyed;
        }
        any = true;
    }
    if any {
        OrderingMode::Sequenced
    } else {
        OrderingMode::Keyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Block;

    #[test]
    fn test_infer_mode() {
        assert_eq!(infer_mode(["1", "2", "10"]), OrderingMode::Sequenced);
        assert_eq!(infer_mode(["1", "port1"]), OrderingMode::Keyed);
        assert_eq!(infer_mode(Vec::<&str>::new()), OrderingMode::Keyed);
    }

    #[test]
    fn test_policy_overrides_inference() {
        let policy = ConfigPolicy::new().with_table("system interface", OrderingMode::Sequenced);
        let table = Table::new(OrderingMode::Keyed).with_entry("port1", Block::new());
        assert_eq!(
            policy.resolve_mode("system interface", &table),
            OrderingMode::Sequenced
        );

        let numbered = Table::new(OrderingMode::Keyed).with_entry("7", Block::new());
        let policy = ConfigPolicy::new().with_table("user local", OrderingMode::Keyed);
        assert_eq!(policy.resolve_mode("user local", &numbered), OrderingMode::Keyed);
        assert_eq!(policy.resolve_mode("other", &numbered), OrderingMode::Sequenced);
    }

    #[test]
    fn test_fortios_preset() {
        let policy = ConfigPolicy::fortios();
        assert!(policy.is_ignored("uuid"));
        assert!(policy.is_ignored("snmp-index"));
        assert!(!policy.is_ignored("status"));
        assert_eq!(
            policy.table_mode("firewall policy"),
            Some(OrderingMode::Sequenced)
        );
        assert!(ConfigPolicy::default().ignored_attributes.is_empty());
    }
}
