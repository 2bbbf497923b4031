//! Translate completed Responses API responses into Chat Completions and
//! Claude Messages responses.

use std::collections::HashSet;

use serde_json::Value;

use super::chat_types::{ChatCompletionResponse, ChatContent, ChatMessage, ChatToolCall, Choice, FunctionCall};
use super::claude_types::{MessagesResponse, ResponseContentBlock, Usage};
use super::responses_types::{ContentItem, OutputItem, ResponseApiResponse};
use super::{ids, stringify_value, usage};

/// Translate a Responses API response into a Chat Completions response.
///
/// Usage is carried only when the upstream reported counts; nothing is fabricated.
pub fn response_to_chat(resp: &ResponseApiResponse) -> ChatCompletionResponse {
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<ChatToolCall> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for item in &resp.output {
        match item.item_type.as_str() {
            "message" if is_assistant(item) => {
                for content in item.content.iter().flatten() {
                    match content {
                        ContentItem::Text(_, part) => text.push_str(&part.text),
                        ContentItem::Json(part) => text.push_str(&json_text(&part.json, &part.extra)),
                        ContentItem::Reasoning(part) => {
                            if let Some(t) = part.text.as_deref() {
                                reasoning.push_str(t);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "reasoning" => reasoning.push_str(&item.summary_text()),
            "function_call" => {
                let call_id = item.call_id.as_deref().unwrap_or_default();
                let name = item.name.as_deref().unwrap_or_default();
                if call_id.is_empty() || name.is_empty() {
                    continue;
                }
                tool_calls.push(ChatToolCall {
                    id: call_id.to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: name.to_string(),
                        arguments: Value::String(item.arguments_string()),
                    },
                    index: None,
                });
                seen.insert(call_id.to_string());
            }
            "mcp_list_tools" | "mcp_call" | "mcp_approval_request" => {
                text.push_str(&mcp_fragment(item));
            }
            _ => {}
        }
    }

    let pending = resp
        .required_action
        .as_ref()
        .and_then(|a| a.submit_tool_outputs.as_ref())
        .map(|s| s.tool_calls.as_slice())
        .unwrap_or_default();
    for call in pending {
        let key = if call.id.is_empty() {
            call.function.name.clone()
        } else {
            call.id.clone()
        };
        if !key.is_empty() && !seen.insert(key) {
            continue;
        }
        let call_type = call.call_type.trim().to_ascii_lowercase();
        tool_calls.push(ChatToolCall {
            id: call.id.clone(),
            call_type: if call_type.is_empty() {
                "function".to_string()
            } else {
                call_type
            },
            function: FunctionCall {
                name: call.function.name.trim().to_string(),
                arguments: Value::String(stringify_value(&call.function.arguments)),
            },
            index: None,
        });
    }

    let finish_reason = if !tool_calls.is_empty() {
        "tool_calls"
    } else if resp.status.as_deref() == Some("incomplete") {
        "length"
    } else {
        "stop"
    };

    let content = if text.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(ChatContent::Text(text))
    };

    ChatCompletionResponse {
        id: resp.id.clone(),
        object: "chat.completion".to_string(),
        created: resp.created_at,
        model: resp.model.clone(),
        choices: vec![Choice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
                ..ChatMessage::default()
            },
            finish_reason: Some(finish_reason.to_string()),
        }],
        usage: usage::reconcile(resp.usage.as_ref()),
        service_tier: resp.service_tier.clone(),
    }
}

fn is_assistant(item: &OutputItem) -> bool {
    item.role.as_deref().map_or(true, |r| r == "assistant")
}

/// Text of an `output_json` block: its JSON payload, else a `text` field.
pub(crate) fn json_text(json: &Value, extra: &serde_json::Map<String, Value>) -> String {
    if !json.is_null() {
        return stringify_value(json);
    }
    extra
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Human-readable rendering of MCP items, which have no Chat Completions counterpart.
pub(crate) fn mcp_fragment(item: &OutputItem) -> String {
    let label = item.server_label.as_deref().unwrap_or_default();
    let name = item.name.as_deref().unwrap_or_default();
    match item.item_type.as_str() {
        "mcp_list_tools" => {
            let count = item.tools.as_ref().map_or(0, Vec::len);
            if label.is_empty() || count == 0 {
                return String::new();
            }
            format!("\nMCP Server '{label}' tools imported: {count} tools available")
        }
        "mcp_call" => {
            let output = item.output.as_ref().map(stringify_value).unwrap_or_default();
            let error = item.error.as_ref().map(stringify_value).unwrap_or_default();
            if !name.is_empty() && !output.is_empty() {
                format!("\nMCP Tool '{name}' result: {output}")
            } else if !error.is_empty() {
                format!("\nMCP Tool '{name}' error: {error}")
            } else {
                String::new()
            }
        }
        "mcp_approval_request" => {
            if label.is_empty() || name.is_empty() {
                return String::new();
            }
            format!("\nMCP Approval Required: Server '{label}' requests approval to call '{name}'")
        }
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Web search accounting
// ---------------------------------------------------------------------------

/// Whether a `web_search_call` item is a billable search (not an open/find action).
fn is_chargeable_web_search(item: &OutputItem) -> bool {
    if item.item_type != "web_search_call" {
        return false;
    }
    let Some(action) = item.action.as_ref().filter(|a| !a.is_null()) else {
        return true;
    };
    let kind = action
        .get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_default();
    kind.is_empty() || kind == "search"
}

fn web_search_key(item: &OutputItem) -> Option<String> {
    if let Some(id) = item.id.as_deref().filter(|id| !id.is_empty()) {
        return Some(id.to_string());
    }
    let action = item.action.as_ref()?;
    if let Some(query) = action.get("query").and_then(Value::as_str).filter(|q| !q.is_empty()) {
        return Some(query.to_string());
    }
    let domains: Vec<&str> = action
        .get("domains")
        .and_then(Value::as_array)
        .map(|d| d.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    (!domains.is_empty()).then(|| domains.join(","))
}

/// Count chargeable web searches not already in `seen`, recording them.
/// Items without any identifying key are always counted.
pub fn count_new_web_search_calls(outputs: &[OutputItem], seen: &mut HashSet<String>) -> usize {
    let mut added = 0;
    for item in outputs.iter().filter(|i| is_chargeable_web_search(i)) {
        let key = web_search_key(item).unwrap_or_else(|| format!("anon-{}", seen.len()));
        if seen.insert(key) {
            added += 1;
        }
    }
    added
}

/// Number of distinct chargeable web searches in a response's output.
pub fn count_web_search_calls(outputs: &[OutputItem]) -> usize {
    count_new_web_search_calls(outputs, &mut HashSet::new())
}

// ---------------------------------------------------------------------------
// Claude Messages
// ---------------------------------------------------------------------------

/// Result of translating a raw upstream body into Claude Messages form.
#[derive(Debug, Clone)]
pub enum ClaudeOutcome {
    Translated(MessagesResponse),
    /// The body was not a Responses API response; forward it unmodified.
    Passthrough { status: u16, body: Vec<u8> },
}

/// Translate a raw upstream body. Non-2xx statuses, non-JSON bodies and JSON that
/// is not a Responses API response pass through untouched.
pub fn response_to_claude(status: u16, body: &[u8]) -> ClaudeOutcome {
    let passthrough = || ClaudeOutcome::Passthrough {
        status,
        body: body.to_vec(),
    };
    if !(200..300).contains(&status) {
        return passthrough();
    }
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return passthrough();
    };
    let looks_like_response = value.get("object").and_then(Value::as_str) == Some("response")
        || value.get("output").is_some_and(Value::is_array);
    if !looks_like_response {
        return passthrough();
    }
    match serde_json::from_value::<ResponseApiResponse>(value) {
        Ok(resp) => ClaudeOutcome::Translated(response_api_to_claude(&resp)),
        Err(e) => {
            tracing::debug!(error = %e, "response body did not decode; passing through");
            passthrough()
        }
    }
}

/// Translate a decoded Responses API response into a Claude Messages response.
pub fn response_api_to_claude(resp: &ResponseApiResponse) -> MessagesResponse {
    let mut content = Vec::new();

    for item in &resp.output {
        match item.item_type.as_str() {
            "reasoning" => {
                for entry in item.summary.iter().flatten() {
                    if entry.entry_type == "summary_text" && !entry.text.is_empty() {
                        content.push(ResponseContentBlock::Thinking {
                            thinking: entry.text.clone(),
                            signature: None,
                        });
                    }
                }
            }
            "message" if is_assistant(item) => {
                for block in item.content.iter().flatten() {
                    let text = match block {
                        ContentItem::Text(_, part) => part.text.clone(),
                        ContentItem::Json(part) => json_text(&part.json, &part.extra).trim().to_string(),
                        _ => continue,
                    };
                    if !text.is_empty() {
                        content.push(ResponseContentBlock::Text { text });
                    }
                }
            }
            "function_call" => {
                let name = item.name.as_deref().unwrap_or_default().trim();
                if name.is_empty() {
                    continue;
                }
                let id = match item.call_id.as_deref().filter(|c| !c.is_empty()) {
                    Some(call_id) => call_id.to_string(),
                    None => ids::decode_opt(item.id.as_deref(), None),
                };
                content.push(ResponseContentBlock::ToolUse {
                    id,
                    name: name.to_string(),
                    input: tool_input(&item.arguments_string()),
                });
            }
            _ => {}
        }
    }

    let mut out = MessagesResponse {
        id: resp.id.clone(),
        response_type: "message".to_string(),
        role: "assistant".to_string(),
        content,
        model: resp.model.clone(),
        stop_reason: None,
        stop_sequence: None,
        usage: resp.usage.as_ref().map(Usage::from).unwrap_or_default(),
    };
    let stop_reason = if out.has_tool_use() { "tool_use" } else { "end_turn" };
    out.stop_reason = Some(stop_reason.to_string());
    out
}

/// Parsed arguments when they are valid JSON, else the raw text as a JSON string.
fn tool_input(arguments: &str) -> Value {
    let trimmed = arguments.trim();
    if trimmed.is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}
