//! Priority resolution over the rule tables.
//!
//! Forward: type-level table, then the global table, then snake_case for
//! opted-in types, then the property name itself. Reverse walks the same
//! tiers in the same order and never fails.

use std::collections::{HashMap, HashSet};

use super::model::{MappingEntry, PriorityTier};
use super::{to_camel, to_snake};

/// The rule tables a registry owns. Pure data; locking and caching live in
/// [`MappingRegistry`](super::registry::MappingRegistry).
#[derive(Debug, Default, Clone)]
pub struct RuleTables {
    pub global: HashMap<String, String>,
    pub types: HashMap<String, HashMap<String, String>>,
    pub snake_case: HashSet<String>,
}

impl RuleTables {
    /// Effective JSON key for `property` on `type_name`.
    pub fn resolve(&self, type_name: &str, property: &str) -> MappingEntry {
        if let Some(key) = self.types.get(type_name).and_then(|t| t.get(property)) {
            return MappingEntry::new(key, PriorityTier::TypeLevel, format!("type:{type_name}"));
        }

        if let Some(key) = self.global.get(property) {
            return MappingEntry::new(key, PriorityTier::Global, "global");
        }

        if self.snake_case.contains(type_name) {
            return MappingEntry::new(to_snake(property), PriorityTier::SnakeCase, "snake_case");
        }

        MappingEntry::new(property, PriorityTier::Default, "default")
    }

    /// Property that reads/writes `json_key` on `type_name`.
    ///
    /// Tables are injective (enforced at registration), so each tier yields
    /// at most one candidate. A global key still names its property on a
    /// type that overrides that property.
    pub fn reverse(&self, type_name: &str, json_key: &str) -> String {
        self.reverse_entry(type_name, json_key).0
    }

    pub(crate) fn reverse_entry(&self, type_name: &str, json_key: &str) -> (String, PriorityTier) {
        if let Some(prop) = self.types.get(type_name).and_then(|t| find_by_key(t, json_key)) {
            return (prop.to_string(), PriorityTier::TypeLevel);
        }

        if let Some(prop) = find_by_key(&self.global, json_key) {
            return (prop.to_string(), PriorityTier::Global);
        }

        if self.snake_case.contains(type_name) {
            let camel = to_camel(json_key);
            // Only accept conversions that survive the trip back unchanged.
            if to_snake(&camel) == json_key {
                return (camel, PriorityTier::SnakeCase);
            }
        }

        (json_key.to_string(), PriorityTier::Default)
    }
}

fn find_by_key<'a>(table: &'a HashMap<String, String>, json_key: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(_, key)| key.as_str() == json_key)
        .map(|(prop, _)| prop.as_str())
}
