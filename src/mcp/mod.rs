pub mod protocol;
pub mod resources;
pub mod tools;
pub mod write_tools;

use std::collections::HashMap;

use anyhow::Result;
use serde_json::Value;

use crate::config::RuleSet;
use crate::mapping::filter::PropertyFilter;
use crate::mapping::registry::MappingRegistry;

/// State shared by every request of one server run.
#[derive(Debug, Default)]
pub struct Session {
    pub registry: MappingRegistry,
    pub filter: PropertyFilter,
}

impl Session {
    pub fn new(registry: MappingRegistry, filter: PropertyFilter) -> Self {
        Self { registry, filter }
    }

    pub fn from_rules(rules: &RuleSet) -> Result<Self> {
        let (registry, filter) = rules.build()?;
        Ok(Self::new(registry, filter))
    }
}

/// Read a required string argument, or describe what is missing.
pub(crate) fn str_arg<'a>(args: &'a Value, name: &str) -> Result<&'a str, String> {
    match args.get(name).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s),
        _ => Err(format!("Missing required string argument '{name}'")),
    }
}

/// Read an object argument whose values are all strings.
pub(crate) fn string_map_arg(args: &Value, name: &str) -> Result<HashMap<String, String>, String> {
    let obj = args
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| format!("Missing required object argument '{name}'"))?;
    obj.iter()
        .map(|(k, v)| match v.as_str() {
            Some(s) => Ok((k.clone(), s.to_string())),
            None => Err(format!("Value for '{k}' in '{name}' must be a string")),
        })
        .collect()
}

/// Read an array-of-strings argument; absent means empty.
pub(crate) fn string_list_arg(args: &Value, name: &str) -> Result<Vec<String>, String> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| format!("Every entry of '{name}' must be a string"))
            })
            .collect(),
        Some(_) => Err(format!("Argument '{name}' must be an array of strings")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_arg() {
        let args = json!({"type": "User", "empty": ""});
        assert_eq!(str_arg(&args, "type").unwrap(), "User");
        assert!(str_arg(&args, "empty").is_err());
        assert!(str_arg(&args, "missing").is_err());
    }

    #[test]
    fn test_string_map_arg_rejects_non_strings() {
        let ok = json!({"mapping": {"id": "user_id"}});
        assert_eq!(string_map_arg(&ok, "mapping").unwrap()["id"], "user_id");

        let bad = json!({"mapping": {"id": 3}});
        assert!(string_map_arg(&bad, "mapping").is_err());
    }

    #[test]
    fn test_string_list_arg() {
        assert!(string_list_arg(&json!({}), "types").unwrap().is_empty());
        assert_eq!(
            string_list_arg(&json!({"types": ["A", "B"]}), "types").unwrap(),
            vec!["A", "B"]
        );
        assert!(string_list_arg(&json!({"types": "A"}), "types").is_err());
    }
}
