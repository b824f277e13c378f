use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Allow/deny sets consulted before a property is transcoded.
///
/// Deny always wins. An empty allow set means "no restriction"; only a
/// non-empty one narrows what is processed, with the global allow set
/// checked before the per-type one.
#[derive(Debug, Default)]
pub struct PropertyFilter {
    rules: Mutex<FilterRules>,
}

/// Serializable snapshot of a [`PropertyFilter`]'s sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRules {
    #[serde(default)]
    pub global_allow: HashSet<String>,
    #[serde(default)]
    pub global_deny: HashSet<String>,
    #[serde(default)]
    pub types: HashMap<String, TypeFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeFilter {
    #[serde(default)]
    pub allow: HashSet<String>,
    #[serde(default)]
    pub deny: HashSet<String>,
}

impl FilterRules {
    pub fn should_process(&self, property: &str, type_name: &str) -> bool {
        let type_rules = self.types.get(type_name);

        if self.global_deny.contains(property) {
            return false;
        }
        if type_rules.is_some_and(|t| t.deny.contains(property)) {
            return false;
        }
        if !self.global_allow.is_empty() {
            return self.global_allow.contains(property);
        }
        if let Some(t) = type_rules {
            if !t.allow.is_empty() {
                return t.allow.contains(property);
            }
        }
        true
    }
}

impl PropertyFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: FilterRules) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    pub fn set_global_allowed<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        debug!(?names, "Set global allowed properties");
        self.rules.lock().global_allow = names;
    }

    pub fn set_global_ignored<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: HashSet<String> = names.into_iter().map(Into::into).collect();
        debug!(?names, "Set global ignored properties");
        self.rules.lock().global_deny = names;
    }

    pub fn clear_global(&self) {
        let mut rules = self.rules.lock();
        rules.global_allow.clear();
        rules.global_deny.clear();
    }

    pub fn set_allowed<I, S>(&self, type_name: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.rules
            .lock()
            .types
            .entry(type_name.to_string())
            .or_default()
            .allow = names;
    }

    pub fn set_ignored<I, S>(&self, type_name: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names.into_iter().map(Into::into).collect();
        self.rules
            .lock()
            .types
            .entry(type_name.to_string())
            .or_default()
            .deny = names;
    }

    pub fn clear_type(&self, type_name: &str) {
        self.rules.lock().types.remove(type_name);
    }

    /// Whether `property` of `type_name` passes the filter.
    pub fn should_process(&self, property: &str, type_name: &str) -> bool {
        self.rules.lock().should_process(property, type_name)
    }

    pub fn snapshot(&self) -> FilterRules {
        self.rules.lock().clone()
    }
}
