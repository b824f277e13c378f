use serde_json::{json, Value};

use crate::mapping::convert::CrossModelConverter;
use crate::mcp::protocol::*;
use crate::mcp::{str_arg, Session};

/// Returns the read-only tools the server exposes.
pub fn list_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "resolve_json_key".into(),
            description: "Returns the JSON key a property of a model type reads and writes, \
                          with the rule tier that produced it (type, global, snake_case, default)."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "description": "Model type name" },
                    "property": { "type": "string", "description": "Property name" }
                },
                "required": ["type", "property"]
            }),
        },
        ToolDefinition {
            name: "resolve_property_name".into(),
            description: "Returns the property of a model type that a JSON key belongs to. \
                          Falls back to the key itself when nothing maps to it."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "description": "Model type name" },
                    "json_key": { "type": "string", "description": "JSON key" }
                },
                "required": ["type", "json_key"]
            }),
        },
        ToolDefinition {
            name: "convert_record".into(),
            description: "Re-keys a flat record of one model type into the property names of \
                          another, matching fields through their resolved JSON keys. Fields \
                          with no counterpart keep their original name."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from": { "type": "string", "description": "Source model type" },
                    "to": { "type": "string", "description": "Destination model type" },
                    "record": { "type": "object", "description": "Source record keyed by property name" }
                },
                "required": ["from", "to", "record"]
            }),
        },
        ToolDefinition {
            name: "get_global_mapping".into(),
            description: "Returns the global property -> JSON key table.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: "get_type_mapping".into(),
            description: "Returns a model type's registered table, snake_case flag, declared \
                          properties, and their effective JSON keys."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "description": "Model type name" }
                },
                "required": ["type"]
            }),
        },
        ToolDefinition {
            name: "cache_stats".into(),
            description: "Returns resolution cache hits, misses, hit rate and entry counts.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: "check_model".into(),
            description: "Lists declared properties of a model type whose effective JSON keys \
                          collide once all rule tiers apply."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "description": "Model type name" }
                },
                "required": ["type"]
            }),
        },
        ToolDefinition {
            name: "should_process".into(),
            description: "Checks whether the property filter lets a property of a model type \
                          through."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string" },
                    "property": { "type": "string" }
                },
                "required": ["type", "property"]
            }),
        },
    ]
}

/// Dispatch a read-only tool call.
pub fn call_tool(session: &Session, name: &str, args: &Value) -> ToolCallResult {
    match run_tool(session, name, args) {
        Ok(value) => ToolCallResult::json(&value),
        Err(message) => ToolCallResult::error(message),
    }
}

fn run_tool(session: &Session, name: &str, args: &Value) -> Result<Value, String> {
    let registry = &session.registry;

    match name {
        "resolve_json_key" => {
            let type_name = str_arg(args, "type")?;
            let property = str_arg(args, "property")?;
            let entry = registry.mapping_entry(type_name, property);
            Ok(json!({
                "type": type_name,
                "property": property,
                "json_key": entry.json_key,
                "tier": entry.tier,
                "source": entry.source,
            }))
        }

        "resolve_property_name" => {
            let type_name = str_arg(args, "type")?;
            let json_key = str_arg(args, "json_key")?;
            Ok(json!({
                "type": type_name,
                "json_key": json_key,
                "property": registry.property_name(type_name, json_key),
            }))
        }

        "convert_record" => {
            let from = str_arg(args, "from")?;
            let to = str_arg(args, "to")?;
            let record = args
                .get("record")
                .and_then(Value::as_object)
                .ok_or("Missing required object argument 'record'")?;
            let converter = CrossModelConverter::new(registry).with_filter(&session.filter);
            Ok(Value::Object(converter.convert_record(record, from, to)))
        }

        "get_global_mapping" => Ok(json!(registry.global_mapping())),

        "get_type_mapping" => {
            let type_name = str_arg(args, "type")?;
            let properties = registry.declared_properties(type_name);
            Ok(json!({
                "type": type_name,
                "mapping": registry.type_mapping(type_name).unwrap_or_default(),
                "snake_case": registry.is_snake_case(type_name),
                "properties": properties,
                "json_keys": registry.json_keys(type_name),
            }))
        }

        "cache_stats" => {
            let stats = registry.cache_stats();
            Ok(json!({
                "hits": stats.hits,
                "misses": stats.misses,
                "hit_rate": stats.hit_rate(),
                "forward_count": stats.forward_count,
                "reverse_count": stats.reverse_count,
                "enabled": registry.is_cache_enabled(),
            }))
        }

        "check_model" => {
            let type_name = str_arg(args, "type")?;
            if registry.declared_properties(type_name).is_none() {
                return Err(format!(
                    "Model '{type_name}' is not declared. Declare it with 'declare_model' first."
                ));
            }
            let collisions: Vec<String> = registry
                .key_collisions(type_name)
                .iter()
                .map(ToString::to_string)
                .collect();
            Ok(json!({
                "type": type_name,
                "ok": collisions.is_empty(),
                "collisions": collisions,
            }))
        }

        "should_process" => {
            let type_name = str_arg(args, "type")?;
            let property = str_arg(args, "property")?;
            Ok(json!({
                "type": type_name,
                "property": property,
                "process": session.filter.should_process(property, type_name),
            }))
        }

        _ => Err(format!("Unknown tool: {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::model::ModelDescriptor;

    fn test_session() -> Session {
        let session = Session::default();
        session
            .registry
            .set_global_mapping([("id", "global_id")])
            .unwrap();
        session
            .registry
            .register_type_mapping("ApiUser", [("userId", "user_id")])
            .unwrap();
        session
            .registry
            .register_type_mapping("AppUser", [("id", "user_id")])
            .unwrap();
        session
            .registry
            .declare_model(ModelDescriptor::new("AppUser", ["id", "name"]))
            .unwrap();
        session.registry.mark_snake_case("Event");
        session
    }

    fn text_of(result: &ToolCallResult) -> &str {
        match &result.content[0] {
            ContentBlock::Text { text } => text,
        }
    }

    fn json_of(result: &ToolCallResult) -> Value {
        serde_json::from_str(text_of(result)).unwrap()
    }

    #[test]
    fn test_resolve_json_key_reports_tier() {
        let session = test_session();
        let result = call_tool(&session, "resolve_json_key", &json!({"type": "Order", "property": "id"}));
        let value = json_of(&result);
        assert_eq!(value["json_key"], "global_id");
        assert_eq!(value["tier"], "global");
    }

    #[test]
    fn test_resolve_property_name_snake_case() {
        let session = test_session();
        let result = call_tool(
            &session,
            "resolve_property_name",
            &json!({"type": "Event", "json_key": "start_time"}),
        );
        assert_eq!(json_of(&result)["property"], "startTime");
    }

    #[test]
    fn test_convert_record() {
        let session = test_session();
        let result = call_tool(
            &session,
            "convert_record",
            &json!({"from": "ApiUser", "to": "AppUser", "record": {"userId": "42", "name": "Ada"}}),
        );
        assert_eq!(json_of(&result), json!({"id": "42", "name": "Ada"}));
    }

    #[test]
    fn test_get_type_mapping() {
        let session = test_session();
        let result = call_tool(&session, "get_type_mapping", &json!({"type": "AppUser"}));
        let value = json_of(&result);
        assert_eq!(value["mapping"]["id"], "user_id");
        assert_eq!(value["json_keys"], json!(["user_id", "name"]));
        assert_eq!(value["snake_case"], false);
    }

    #[test]
    fn test_cache_stats_counts_hits() {
        let session = test_session();
        let args = json!({"type": "Order", "property": "id"});
        call_tool(&session, "resolve_json_key", &args);
        call_tool(&session, "resolve_json_key", &args);
        let value = json_of(&call_tool(&session, "cache_stats", &json!({})));
        assert!(value["hits"].as_u64().unwrap() >= 1);
        assert_eq!(value["enabled"], true);
    }

    #[test]
    fn test_check_model_requires_declaration() {
        let session = test_session();
        let result = call_tool(&session, "check_model", &json!({"type": "Ghost"}));
        assert_eq!(result.is_error, Some(true));

        let result = call_tool(&session, "check_model", &json!({"type": "AppUser"}));
        assert_eq!(json_of(&result)["ok"], true);
    }

    #[test]
    fn test_missing_argument_is_error() {
        let session = test_session();
        let result = call_tool(&session, "resolve_json_key", &json!({"type": "User"}));
        assert_eq!(result.is_error, Some(true));
        assert!(text_of(&result).contains("property"));
    }

    #[test]
    fn test_should_process() {
        let session = test_session();
        session.filter.set_global_ignored(["secret"]);
        let result = call_tool(&session, "should_process", &json!({"type": "User", "property": "secret"}));
        assert_eq!(json_of(&result)["process"], false);
    }

    #[test]
    fn test_unknown_tool() {
        let session = test_session();
        let result = call_tool(&session, "nonexistent_tool", &json!({}));
        assert_eq!(result.is_error, Some(true));
    }

    #[test]
    fn test_list_tools_count() {
        assert_eq!(list_tools().len(), 8);
    }
}
