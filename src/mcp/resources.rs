use std::collections::BTreeSet;

use serde_json::{json, Value};

use crate::mcp::protocol::*;
use crate::mcp::Session;

const TYPE_PREFIX: &str = "mapping://type/";

/// Returns the resources the server exposes.
pub fn list_resources(session: &Session) -> Vec<ResourceDefinition> {
    let mut resources = vec![
        ResourceDefinition {
            uri: "mapping://global".into(),
            name: "Global Mapping".into(),
            description: "Property -> JSON key table applied to every model type".into(),
            mime_type: "application/json".into(),
        },
        ResourceDefinition {
            uri: "mapping://types".into(),
            name: "Type Mappings".into(),
            description: "Per-type tables and the types opted into snake_case keys".into(),
            mime_type: "application/json".into(),
        },
        ResourceDefinition {
            uri: "mapping://cache".into(),
            name: "Resolution Cache".into(),
            description: "Cache hit/miss counters and entry counts".into(),
            mime_type: "application/json".into(),
        },
    ];

    for type_name in known_types(session) {
        resources.push(ResourceDefinition {
            uri: format!("{TYPE_PREFIX}{type_name}"),
            name: format!("Type: {type_name}"),
            description: format!("Rules and effective JSON keys of '{type_name}'"),
            mime_type: "application/json".into(),
        });
    }

    resources
}

/// Reads a resource by URI.
pub fn read_resource(session: &Session, uri: &str) -> ResourceReadResult {
    let registry = &session.registry;

    let (mime, text) = match uri {
        "mapping://global" => ("application/json", json!(registry.global_mapping()).to_string()),
        "mapping://types" => {
            let tables: serde_json::Map<String, Value> = registry
                .mapped_types()
                .into_iter()
                .map(|t| {
                    let table = registry.type_mapping(&t).unwrap_or_default();
                    (t, json!(table))
                })
                .collect();
            let value = json!({
                "types": tables,
                "snake_case": registry.snake_case_types(),
            });
            ("application/json", value.to_string())
        }
        "mapping://cache" => {
            let stats = registry.cache_stats();
            let value = json!({
                "enabled": registry.is_cache_enabled(),
                "hits": stats.hits,
                "misses": stats.misses,
                "hit_rate": stats.hit_rate(),
                "forward_count": stats.forward_count,
                "reverse_count": stats.reverse_count,
            });
            ("application/json", value.to_string())
        }
        _ if uri.starts_with(TYPE_PREFIX) => {
            let type_name = uri.strip_prefix(TYPE_PREFIX).unwrap_or("");
            if known_types(session).contains(type_name) {
                let value = json!({
                    "type": type_name,
                    "mapping": registry.type_mapping(type_name),
                    "snake_case": registry.is_snake_case(type_name),
                    "properties": registry.declared_properties(type_name),
                    "json_keys": registry.json_keys(type_name),
                });
                ("application/json", value.to_string())
            } else {
                ("text/plain", format!("Type '{type_name}' has no mapping rules"))
            }
        }
        _ => ("text/plain", format!("Unknown resource: {uri}")),
    };

    ResourceReadResult {
        contents: vec![ResourceContent {
            uri: uri.to_string(),
            mime_type: mime.to_string(),
            text,
        }],
    }
}

fn known_types(session: &Session) -> BTreeSet<String> {
    let registry = &session.registry;
    let mut types: BTreeSet<String> = registry.mapped_types().into_iter().collect();
    types.extend(registry.snake_case_types());
    types
}
