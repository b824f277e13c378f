use anyhow::Result;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::mcp::write_tools::{self, WRITE_TOOLS};
use crate::mcp::{protocol::*, resources, tools, Session};

/// Run the MCP server over stdio (stdin/stdout).
pub async fn run(session: Session) -> Result<()> {
    let stdin = BufReader::new(io::stdin());
    let mut stdout = io::stdout();
    let mut lines = stdin.lines();

    tracing::info!("keymapper stdio transport ready");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        tracing::debug!("← {}", line);

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                let resp = JsonRpcResponse::error(None, PARSE_ERROR, format!("Parse error: {e}"));
                send(&mut stdout, &resp).await?;
                continue;
            }
        };

        let response = handle_request(&session, &request);

        // Notifications (no id) don't get a response
        if request.id.is_some() {
            send(&mut stdout, &response).await?;
        }
    }

    tracing::info!("stdin closed, shutting down");
    Ok(())
}

pub fn handle_request(session: &Session, req: &JsonRpcRequest) -> JsonRpcResponse {
    let id = req.id.clone();

    match req.method.as_str() {
        // ── Lifecycle ──────────────────────────────────────────────
        "initialize" => {
            let result = InitializeResult {
                protocol_version: "2025-03-26".into(),
                capabilities: ServerCapabilities {
                    tools: Some(EmptyCapability {}),
                    resources: Some(EmptyCapability {}),
                },
                server_info: ServerInfo {
                    name: "keymapper".into(),
                    version: env!("CARGO_PKG_VERSION").into(),
                },
            };
            JsonRpcResponse::from_serializable(id, &result)
        }

        "notifications/initialized" | "initialized" => JsonRpcResponse::success(id, json!({})),

        // ── Tools ──────────────────────────────────────────────────
        "tools/list" => {
            let mut all_tools = tools::list_tools();
            all_tools.extend(write_tools::list_write_tools());
            JsonRpcResponse::from_serializable(id, &ToolsListResult { tools: all_tools })
        }

        "tools/call" => {
            let params: ToolCallParams = match parse_params(req) {
                Ok(p) => p,
                Err(resp) => return resp,
            };

            tracing::debug!(tool = %params.name, "tools/call");
            let result = if WRITE_TOOLS.contains(&params.name.as_str()) {
                write_tools::call_write_tool(session, &params.name, &params.arguments)
            } else {
                tools::call_tool(session, &params.name, &params.arguments)
            };
            JsonRpcResponse::from_serializable(id, &result)
        }

        // ── Resources ──────────────────────────────────────────────
        "resources/list" => {
            let result = ResourcesListResult {
                resources: resources::list_resources(session),
            };
            JsonRpcResponse::from_serializable(id, &result)
        }

        "resources/read" => {
            let params: ResourceReadParams = match parse_params(req) {
                Ok(p) => p,
                Err(resp) => return resp,
            };
            let result = resources::read_resource(session, &params.uri);
            JsonRpcResponse::from_serializable(id, &result)
        }

        "ping" => JsonRpcResponse::success(id, json!({})),

        method => JsonRpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}")),
    }
}

fn parse_params<T: DeserializeOwned>(req: &JsonRpcRequest) -> Result<T, JsonRpcResponse> {
    let params = req
        .params
        .as_ref()
        .ok_or_else(|| JsonRpcResponse::error(req.id.clone(), INVALID_PARAMS, "Missing params"))?;
    serde_json::from_value(params.clone()).map_err(|e| {
        JsonRpcResponse::error(req.id.clone(), INVALID_PARAMS, format!("Invalid params: {e}"))
    })
}

async fn send(stdout: &mut io::Stdout, resp: &JsonRpcResponse) -> Result<()> {
    let json = serde_json::to_string(resp)?;
    tracing::debug!("→ {}", json);
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn request(method: &str, params: Option<Value>) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".into(),
            id: Some(json!(1)),
            method: method.into(),
            params,
        }
    }

    fn result_of(resp: JsonRpcResponse) -> Value {
        assert!(resp.error.is_none(), "unexpected error: {:?}", resp.error);
        resp.result.unwrap()
    }

    #[test]
    fn test_initialize_advertises_tools_and_resources() {
        let session = Session::default();
        let result = result_of(handle_request(&session, &request("initialize", None)));
        assert_eq!(result["serverInfo"]["name"], "keymapper");
        assert!(result["capabilities"]["tools"].is_object());
        assert!(result["capabilities"]["resources"].is_object());
    }

    #[test]
    fn test_tools_list_includes_read_and_write() {
        let session = Session::default();
        let result = result_of(handle_request(&session, &request("tools/list", None)));
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), tools::list_tools().len() + WRITE_TOOLS.len());
    }

    #[test]
    fn test_write_then_read_through_tools_call() {
        let session = Session::default();
        let write = request(
            "tools/call",
            Some(json!({
                "name": "register_type_mapping",
                "arguments": {"type": "User", "mapping": {"id": "user_id"}}
            })),
        );
        let result = result_of(handle_request(&session, &write));
        assert!(result.get("isError").is_none());

        let read = request(
            "tools/call",
            Some(json!({
                "name": "resolve_property_name",
                "arguments": {"type": "User", "json_key": "user_id"}
            })),
        );
        let result = result_of(handle_request(&session, &read));
        let text = result["content"][0]["text"].as_str().unwrap();
        let value: Value = serde_json::from_str(text).unwrap();
        assert_eq!(value["property"], "id");
    }

    #[test]
    fn test_tools_call_missing_params() {
        let session = Session::default();
        let resp = handle_request(&session, &request("tools/call", None));
        assert_eq!(resp.error.unwrap().code, INVALID_PARAMS);
    }

    #[test]
    fn test_resources_read() {
        let session = Session::default();
        let req = request("resources/read", Some(json!({"uri": "mapping://cache"})));
        let result = result_of(handle_request(&session, &req));
        assert_eq!(result["contents"][0]["uri"], "mapping://cache");
    }

    #[test]
    fn test_unknown_method() {
        let session = Session::default();
        let resp = handle_request(&session, &request("prompts/list", None));
        assert_eq!(resp.error.unwrap().code, METHOD_NOT_FOUND);
    }
}
