use serde_json::{json, Value};

use crate::mapping::model::ModelDescriptor;
use crate::mcp::protocol::*;
use crate::mcp::{str_arg, string_list_arg, string_map_arg, Session};

/// Names routed to [`call_write_tool`].
pub const WRITE_TOOLS: &[&str] = &[
    "set_global_mapping",
    "add_global_mapping",
    "clear_global_mapping",
    "register_type_mapping",
    "remove_type_mapping",
    "mark_snake_case",
    "declare_model",
    "clear_cache",
    "warmup",
];

/// Returns the tools that mutate the session's rules or cache.
pub fn list_write_tools() -> Vec<ToolDefinition> {
    let mapping_schema = json!({
        "type": "object",
        "additionalProperties": { "type": "string" },
        "description": "property name -> JSON key"
    });

    vec![
        ToolDefinition {
            name: "set_global_mapping".into(),
            description: "Replaces the global property -> JSON key table. Applies to every \
                          model type unless the type overrides the same property."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": { "mapping": mapping_schema },
                "required": ["mapping"]
            }),
        },
        ToolDefinition {
            name: "add_global_mapping".into(),
            description: "Merges entries into the global table; incoming values win.".into(),
            input_schema: json!({
                "type": "object",
                "properties": { "mapping": mapping_schema },
                "required": ["mapping"]
            }),
        },
        ToolDefinition {
            name: "clear_global_mapping".into(),
            description: "Empties the global table.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: "register_type_mapping".into(),
            description: "Replaces one model type's property -> JSON key table. Rejected when \
                          two properties share a key or a property is not declared."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "description": "Model type name" },
                    "mapping": mapping_schema
                },
                "required": ["type", "mapping"]
            }),
        },
        ToolDefinition {
            name: "remove_type_mapping".into(),
            description: "Deletes a model type's table so its properties fall back to the \
                          global, snake_case and default rules."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string" }
                },
                "required": ["type"]
            }),
        },
        ToolDefinition {
            name: "mark_snake_case".into(),
            description: "Opts a model type into camelCase -> snake_case key conversion.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string" }
                },
                "required": ["type"]
            }),
        },
        ToolDefinition {
            name: "declare_model".into(),
            description: "Declares a model type's properties in order. Used to validate type \
                          mappings and as the destination shape for convert_record."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "properties": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["name", "properties"]
            }),
        },
        ToolDefinition {
            name: "clear_cache".into(),
            description: "Clears cached resolutions: everything, one type, or one property \
                          of a type."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string" },
                    "property": { "type": "string" }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "warmup".into(),
            description: "Resolves every declared property of the given model types so later \
                          lookups are served from cache."
                .into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "types": { "type": "array", "items": { "type": "string" } }
                },
                "required": ["types"]
            }),
        },
    ]
}

/// Dispatch a mutating tool call.
pub fn call_write_tool(session: &Session, name: &str, args: &Value) -> ToolCallResult {
    match run_write_tool(session, name, args) {
        Ok(value) => ToolCallResult::json(&value),
        Err(message) => {
            tracing::warn!(tool = name, %message, "Write tool rejected");
            ToolCallResult::error(message)
        }
    }
}

fn run_write_tool(session: &Session, name: &str, args: &Value) -> Result<Value, String> {
    let registry = &session.registry;

    match name {
        "set_global_mapping" => {
            let mapping = string_map_arg(args, "mapping")?;
            let count = mapping.len();
            registry.set_global_mapping(mapping).map_err(|e| e.to_string())?;
            Ok(json!({ "status": "ok", "entries": count }))
        }

        "add_global_mapping" => {
            let mapping = string_map_arg(args, "mapping")?;
            registry.add_global_mapping(mapping).map_err(|e| e.to_string())?;
            Ok(json!({ "status": "ok", "entries": registry.global_mapping().len() }))
        }

        "clear_global_mapping" => {
            registry.clear_global_mapping();
            Ok(json!({ "status": "ok" }))
        }

        "register_type_mapping" => {
            let type_name = str_arg(args, "type")?;
            let mapping = string_map_arg(args, "mapping")?;
            let count = mapping.len();
            registry
                .register_type_mapping(type_name, mapping)
                .map_err(|e| e.to_string())?;
            Ok(json!({ "status": "ok", "type": type_name, "entries": count }))
        }

        "remove_type_mapping" => {
            let type_name = str_arg(args, "type")?;
            let removed = registry.remove_type_mapping(type_name);
            Ok(json!({ "status": "ok", "type": type_name, "removed": removed }))
        }

        "mark_snake_case" => {
            let type_name = str_arg(args, "type")?;
            registry.mark_snake_case(type_name);
            Ok(json!({ "status": "ok", "type": type_name }))
        }

        "declare_model" => {
            let type_name = str_arg(args, "name")?;
            let properties = string_list_arg(args, "properties")?;
            let count = properties.len();
            registry
                .declare_model(ModelDescriptor::new(type_name, properties))
                .map_err(|e| e.to_string())?;
            Ok(json!({ "status": "ok", "type": type_name, "properties": count }))
        }

        "clear_cache" => {
            let type_name = args.get("type").and_then(Value::as_str);
            let property = args.get("property").and_then(Value::as_str);
            match (type_name, property) {
                (Some(t), Some(p)) => registry.clear_cache_entry(t, p),
                (Some(t), None) => registry.clear_cache_for(t),
                (None, Some(_)) => return Err("'property' requires 'type'".into()),
                (None, None) => registry.clear_cache(),
            }
            Ok(json!({ "status": "ok" }))
        }

        "warmup" => {
            let types = string_list_arg(args, "types")?;
            let resolved = registry.warmup_declared(&types);
            Ok(json!({ "status": "ok", "resolved": resolved }))
        }

        _ => Err(format!("Unknown write tool: {name}")),
    }
}
