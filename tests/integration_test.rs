use bytes::Bytes;
use futures::StreamExt;
use gateway_translate::channel::{ChannelDescriptor, ChannelPreset};
use gateway_translate::pipeline::responses_sse_to_chat_sse;
use gateway_translate::translate::chat_types::{ChatCompletionRequest, ChatContent};
use gateway_translate::translate::deepseek::apply_deepseek_quirks;
use gateway_translate::translate::diagnostics::RequestDiagnostics;
use gateway_translate::translate::ids;
use gateway_translate::translate::request::{chat_to_response_api, ForwardOptions};
use gateway_translate::translate::response::{response_to_chat, response_to_claude, ClaudeOutcome};
use gateway_translate::translate::responses_types::{ResponseApiInput, ResponseApiRequest, ResponseApiResponse};
use gateway_translate::translate::reverse::response_api_to_chat;
use gateway_translate::translate::usage::{self, web_search_invocation_count, ResponseUsage};
use gateway_translate::ConvertError;
use serde_json::{json, Value};
use std::convert::Infallible;

fn chat_request(value: Value) -> ChatCompletionRequest {
    serde_json::from_value(value).expect("chat request fixture")
}

fn responses_request(value: Value) -> ResponseApiRequest {
    serde_json::from_value(value).expect("responses request fixture")
}

async fn stream_to_chat(parts: Vec<String>) -> Vec<String> {
    let input = futures::stream::iter(parts.into_iter().map(|p| Ok::<_, Infallible>(Bytes::from(p))));
    let out: Vec<Bytes> = responses_sse_to_chat_sse(input, "gpt-4o".to_string(), None)
        .collect()
        .await;
    let body: String = out.iter().map(|b| String::from_utf8_lossy(b).into_owned()).collect();
    body.split("\n\n")
        .filter(|f| !f.is_empty())
        .map(|f| f.trim_start_matches("data: ").to_string())
        .collect()
}

fn sse(event: Value) -> String {
    format!("data: {}\n\n", event)
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_id_codec_round_trip() {
    for id in ["abc", "toolu_01XYZ", "x", "123-456"] {
        let pair = ids::encode(id);
        assert_eq!(pair.fc_id, format!("fc_{id}"));
        assert_eq!(pair.call_id, format!("call_{id}"));
        assert_eq!(ids::decode(&pair.fc_id, &pair.call_id), id);
    }
    let prefixed = ids::encode("call_42");
    assert_eq!(prefixed.fc_id, "fc_42");
    assert_eq!(ids::encode("").fc_id, "");
}

#[test]
fn test_response_input_shape_is_byte_stable() {
    for raw in [r#""hello""#, r#"["hello","world"]"#, r#"[{"role":"user","content":"hi"}]"#] {
        let input: ResponseApiInput = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&input).unwrap(), raw);
    }
}

#[test]
fn test_system_message_only_hoisted_from_position_zero() {
    let req = chat_request(json!({
        "model": "gpt-4o",
        "messages": [
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "hi"},
            {"role": "system", "content": "still here"}
        ]
    }));
    let out = serde_json::to_value(chat_to_response_api(&req, &ForwardOptions::default())).unwrap();
    assert_eq!(out["instructions"], "be brief");
    let input = out["input"].as_array().unwrap();
    assert_eq!(input.len(), 2);
    assert_eq!(input[1]["role"], "system");
    assert_eq!(input[1]["content"][0]["text"], "still here");
}

#[test]
fn test_empty_message_dropped() {
    let req = chat_request(json!({
        "model": "gpt-4o",
        "messages": [
            {"role": "user", "content": ""},
            {"role": "user", "content": "kept"}
        ]
    }));
    let out = chat_to_response_api(&req, &ForwardOptions::default());
    assert_eq!(out.input.len(), 1);
}

#[test]
fn test_image_flattened_and_data_uri_preserved() {
    let data_uri = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB";
    let req = chat_request(json!({
        "model": "gpt-4o",
        "messages": [{"role": "user", "content": [
            {"type": "image_url", "image_url": {"url": data_uri, "detail": "high"}}
        ]}]
    }));
    let out = serde_json::to_value(chat_to_response_api(&req, &ForwardOptions::default())).unwrap();
    let block = &out["input"][0]["content"][0];
    assert_eq!(block["type"], "input_image");
    assert_eq!(block["image_url"], data_uri);
    assert_eq!(block["detail"], "high");

    let back = response_api_to_chat(&serde_json::from_value(out).unwrap()).unwrap();
    let back = serde_json::to_value(&back).unwrap();
    assert_eq!(back["messages"][0]["content"][0]["image_url"]["url"], data_uri);
}

#[test]
fn test_reasoning_summary_becomes_one_text_block() {
    let req = chat_request(json!({
        "model": "gpt-4o",
        "messages": [{"role": "assistant", "content": [
            {"type": "reasoning", "summary": [{"text": " first "}, {"text": ""}, {"text": "second"}]},
            {"type": "reasoning", "encrypted_content": "opaque"}
        ]}]
    }));
    let out = serde_json::to_value(chat_to_response_api(&req, &ForwardOptions::default())).unwrap();
    let content = out["input"][0]["content"].as_array().unwrap();
    assert_eq!(content.len(), 1);
    assert_eq!(content[0], json!({"type": "output_text", "text": "first\nsecond"}));
}

#[test]
fn test_usage_unknown_fields_survive() {
    let raw = json!({
        "input_tokens": 12,
        "output_tokens": 3,
        "total_tokens": 15,
        "input_tokens_details": {"cached_tokens": 4, "future_bucket": {"a": 1}},
        "brand_new": true
    });
    let vendor: ResponseUsage = serde_json::from_value(raw.clone()).unwrap();
    let back = usage::to_vendor_usage(&usage::from_vendor_usage(&vendor));
    assert_eq!(serde_json::to_value(&back).unwrap(), raw);
}

#[test]
fn test_web_search_invocation_count_shapes() {
    assert_eq!(web_search_invocation_count(&json!(3)), 3);
    assert_eq!(web_search_invocation_count(&json!(" 2 ")), 2);
    assert_eq!(web_search_invocation_count(&json!([1, 2])), 3);
    assert_eq!(web_search_invocation_count(&json!(["x", "y"])), 2);
    assert_eq!(web_search_invocation_count(&json!({"request_count": "4"})), 4);
    assert_eq!(web_search_invocation_count(&Value::Null), 0);
}

#[test]
fn test_deepseek_tool_message_flattened_for_deepseek_channel() {
    let mut req = chat_request(json!({
        "model": "deepseek-chat",
        "messages": [
            {"role": "user", "content": "list files"},
            {"role": "tool", "tool_call_id": "call_1", "content": [{"type": "text", "text": "README.md\n"}]}
        ]
    }));
    let channel = ChannelDescriptor::from_preset(
        ChannelPreset::from_name("openai-compatible").unwrap(),
        "deepseek-chat",
    );
    assert!(channel.is_deepseek());
    assert!(!channel.accepts_response_api());

    let report = apply_deepseek_quirks(&mut req);
    assert_eq!(report.tool_messages_flattened, 1);
    assert_eq!(
        req.messages[1].content,
        Some(ChatContent::Text("README.md\n".to_string()))
    );
}

// ============================================================================
// Forward and reverse translation
// ============================================================================

#[test]
fn test_forward_tool_conversation() {
    let req = chat_request(json!({
        "model": "gpt-5",
        "messages": [
            {"role": "system", "content": "You are a shell assistant."},
            {"role": "user", "content": "what is here?"},
            {"role": "assistant", "content": null, "tool_calls": [
                {"id": "abc", "type": "function", "function": {"name": "ls", "arguments": {"path": "."}}}
            ]},
            {"role": "tool", "tool_call_id": "abc", "content": "README.md"}
        ],
        "tools": [{"type": "function", "function": {"name": "ls", "parameters": {"type": "object"}}}],
        "tool_choice": {"type": "function", "function": {"name": "ls"}},
        "max_tokens": 256,
        "reasoning_effort": "high",
        "stream": true
    }));
    let (out, report) = gateway_translate::translate::request::chat_to_response_api_with_report(
        &req,
        &ForwardOptions::default(),
    );
    assert_eq!(report.dropped_messages, 0);
    assert!(!report.reasoning_effort_cleared);
    let out = serde_json::to_value(&out).unwrap();

    assert_eq!(out["instructions"], "You are a shell assistant.");
    assert_eq!(out["max_output_tokens"], 256);
    assert_eq!(out["reasoning"]["effort"], "high");
    assert_eq!(out["tool_choice"], json!({"type": "function", "name": "ls"}));
    assert_eq!(out["tools"][0]["type"], "function");

    let input = out["input"].as_array().unwrap();
    assert_eq!(input.len(), 3);
    assert_eq!(input[0]["content"][0]["type"], "input_text");
    assert_eq!(input[1]["type"], "function_call");
    assert_eq!(input[1]["id"], "fc_abc");
    assert_eq!(input[1]["call_id"], "call_abc");
    let args: Value = serde_json::from_str(input[1]["arguments"].as_str().unwrap()).unwrap();
    assert_eq!(args, json!({"path": "."}));
    assert_eq!(input[2]["type"], "function_call_output");
    assert_eq!(input[2]["call_id"], "call_abc");
    assert_eq!(input[2]["output"], "README.md");
}

#[test]
fn test_reverse_translation_round_trips_tool_ids() {
    let req = responses_request(json!({
        "model": "gpt-4o-mini",
        "instructions": "Be terse.",
        "input": [
            {"role": "user", "content": [{"type": "input_text", "text": "hi"}]},
            {"type": "function_call", "id": "fc_abc", "call_id": "call_abc", "name": "ls", "arguments": "{}"},
            {"type": "function_call_output", "call_id": "call_abc", "output": "[]"}
        ],
        "tools": [
            {"type": "function", "name": "ls", "parameters": {"properties": {}, "additionalProperties": false}},
            {"type": "web_search_preview"}
        ],
        "tool_choice": {"type": "function", "name": "missing"},
        "text": {"verbosity": "low"},
        "stream": true
    }));
    let chat = serde_json::to_value(response_api_to_chat(&req).unwrap()).unwrap();

    let messages = chat["messages"].as_array().unwrap();
    assert_eq!(messages[0], json!({"role": "system", "content": "Be terse."}));
    assert_eq!(messages[1]["content"], "hi");
    assert_eq!(messages[2]["tool_calls"][0]["id"], "abc");
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "abc");

    let tools = chat["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["function"]["parameters"]["type"], "object");
    assert!(tools[0]["function"]["parameters"].get("additionalProperties").is_none());
    assert_eq!(chat["tool_choice"], json!({"type": "auto"}));
    assert_eq!(chat["verbosity"], "low");
    assert_eq!(chat["stream_options"]["include_usage"], true);
}

#[test]
fn test_reverse_translation_rejects_impossible_requests() {
    let prompt = responses_request(json!({"model": "m", "input": "x", "prompt": {"id": "pmpt_1"}}));
    let err = response_api_to_chat(&prompt).unwrap_err();
    assert!(matches!(err, ConvertError::PromptTemplateUnsupported));
    assert!(err.is_client_error());

    let background = responses_request(json!({"model": "m", "input": "x", "background": true}));
    assert!(matches!(
        response_api_to_chat(&background),
        Err(ConvertError::BackgroundUnsupported)
    ));

    let odd = responses_request(json!({"model": "m", "input": ["ok", {"type": "computer_call"}]}));
    match response_api_to_chat(&odd) {
        Err(ConvertError::UnsupportedInputItem { index, item_type }) => {
            assert_eq!(index, 1);
            assert_eq!(item_type, "computer_call");
        }
        other => panic!("unexpected result: {:?}", other.map(|r| r.model)),
    }
}

#[test]
fn test_diagnostics_summarize_malformed_history() {
    let req = responses_request(json!({
        "model": "gpt-4o",
        "input": [
            {"type": "function_call_output", "call_id": "c1"},
            {"type": "function_call", "call_id": "c1", "arguments": "{}"}
        ],
        "tools": [{"type": "web_search"}]
    }));
    let context = RequestDiagnostics::for_response_api(&req).to_context();
    assert_eq!(context["input"]["function_call_output_missing_output"], 1);
    assert_eq!(context["input"]["missing_output_sample_indices"], json!([0]));
    assert_eq!(context["input"]["function_call_missing_name"], 1);
    assert_eq!(context["tools"]["has_web_search"], true);
}

// ============================================================================
// Response translation
// ============================================================================

fn tool_response() -> Value {
    json!({
        "id": "resp_1",
        "object": "response",
        "created_at": 1700000000,
        "model": "gpt-4o",
        "status": "completed",
        "output": [
            {"type": "reasoning", "id": "rs_1", "summary": [{"type": "summary_text", "text": "Need a listing."}]},
            {"type": "message", "id": "msg_1", "role": "assistant",
             "content": [{"type": "output_text", "text": "Checking."}]},
            {"type": "function_call", "id": "fc_abc", "call_id": "call_abc", "name": "ls", "arguments": "{\"path\":\".\"}"}
        ],
        "usage": {"input_tokens": 20, "output_tokens": 7, "total_tokens": 27}
    })
}

#[test]
fn test_response_to_chat_with_tools() {
    let resp: ResponseApiResponse = serde_json::from_value(tool_response()).unwrap();
    let chat = serde_json::to_value(response_to_chat(&resp)).unwrap();
    let choice = &chat["choices"][0];
    assert_eq!(choice["finish_reason"], "tool_calls");
    assert_eq!(choice["message"]["content"], "Checking.");
    assert_eq!(choice["message"]["reasoning_content"], "Need a listing.");
    assert_eq!(choice["message"]["tool_calls"][0]["id"], "call_abc");
    assert_eq!(chat["usage"]["prompt_tokens"], 20);
}

#[test]
fn test_response_without_usage_has_no_usage() {
    let mut raw = tool_response();
    raw.as_object_mut().unwrap().remove("usage");
    let resp: ResponseApiResponse = serde_json::from_value(raw).unwrap();
    assert!(response_to_chat(&resp).usage.is_none());
}

#[test]
fn test_response_to_claude() {
    let body = serde_json::to_vec(&tool_response()).unwrap();
    let ClaudeOutcome::Translated(msg) = response_to_claude(200, &body) else {
        panic!("expected translation");
    };
    let msg = serde_json::to_value(&msg).unwrap();
    assert_eq!(msg["role"], "assistant");
    assert_eq!(msg["stop_reason"], "tool_use");
    assert_eq!(msg["content"][0]["type"], "thinking");
    assert_eq!(msg["content"][1], json!({"type": "text", "text": "Checking."}));
    assert_eq!(msg["content"][2]["input"], json!({"path": "."}));
}

#[test]
fn test_response_to_claude_passes_through_errors() {
    let body = br#"{"error":{"message":"rate limited"}}"#;
    match response_to_claude(429, body) {
        ClaudeOutcome::Passthrough { status, body: out } => {
            assert_eq!(status, 429);
            assert_eq!(out, body.to_vec());
        }
        ClaudeOutcome::Translated(_) => panic!("error bodies must pass through"),
    }
    assert!(matches!(
        response_to_claude(200, b"<html>bad gateway</html>"),
        ClaudeOutcome::Passthrough { status: 200, .. }
    ));
}

// ============================================================================
// Streaming pipeline
// ============================================================================

#[tokio::test]
async fn test_stream_deltas_then_done_emit_text_once() {
    let parts = vec![
        sse(json!({"type": "response.created", "response": {"id": "resp_9", "model": "gpt-4o", "created_at": 1}})),
        sse(json!({"type": "response.output_item.added", "output_index": 0,
                   "item": {"type": "message", "id": "msg_1", "role": "assistant"}})),
        sse(json!({"type": "response.output_text.delta", "item_id": "msg_1", "output_index": 0, "delta": "Hello, "})),
        sse(json!({"type": "response.output_text.delta", "item_id": "msg_1", "output_index": 0, "delta": "world"})),
        sse(json!({"type": "response.output_text.done", "item_id": "msg_1", "output_index": 0, "text": "Hello, world"})),
        sse(json!({"type": "response.output_item.done", "output_index": 0,
                   "item": {"type": "message", "id": "msg_1", "role": "assistant",
                            "content": [{"type": "output_text", "text": "Hello, world"}]}})),
        sse(json!({"type": "response.completed", "response": {"id": "resp_9", "model": "gpt-4o", "status": "completed",
                   "usage": {"input_tokens": 5, "output_tokens": 2, "total_tokens": 7}}})),
        "data: [DONE]\n\n".to_string(),
    ];
    let frames = stream_to_chat(parts).await;
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));

    let chunks: Vec<Value> = frames[..frames.len() - 1]
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect();
    let text: String = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str())
        .collect();
    assert_eq!(text, "Hello, world");

    let usage: Vec<&Value> = chunks.iter().filter(|c| c["usage"].is_object()).collect();
    assert_eq!(usage.len(), 1);
    assert_eq!(usage[0]["usage"]["total_tokens"], 7);
    let finishes: Vec<&Value> = chunks
        .iter()
        .filter(|c| c["choices"][0]["finish_reason"].is_string())
        .collect();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0]["choices"][0]["finish_reason"], "stop");
}

#[tokio::test]
async fn test_stream_tool_call_arguments() {
    let parts = vec![
        sse(json!({"type": "response.output_item.added", "output_index": 0,
                   "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "ls"}})),
        sse(json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "output_index": 0, "delta": "{\"path\":"})),
        sse(json!({"type": "response.function_call_arguments.delta", "item_id": "fc_1", "output_index": 0, "delta": "\".\"}"})),
        sse(json!({"type": "response.function_call_arguments.done", "item_id": "fc_1", "output_index": 0, "arguments": "{\"path\":\".\"}"})),
        sse(json!({"type": "response.completed", "response": {"id": "resp_t", "status": "completed"}})),
    ];
    let frames = stream_to_chat(parts).await;
    let chunks: Vec<Value> = frames
        .iter()
        .filter(|f| f.as_str() != "[DONE]")
        .map(|f| serde_json::from_str(f).unwrap())
        .collect();

    let calls: Vec<&Value> = chunks
        .iter()
        .filter_map(|c| c["choices"][0]["delta"]["tool_calls"].as_array())
        .flatten()
        .collect();
    assert_eq!(calls[0]["id"], "call_1");
    assert_eq!(calls[0]["function"]["name"], "ls");
    assert!(calls.iter().all(|c| c["index"] == 0));
    let args: String = calls
        .iter()
        .filter_map(|c| c["function"]["arguments"].as_str())
        .collect();
    assert_eq!(args, "{\"path\":\".\"}");

    let finish = chunks
        .iter()
        .find_map(|c| c["choices"][0]["finish_reason"].as_str())
        .unwrap();
    assert_eq!(finish, "tool_calls");
}

#[tokio::test]
async fn test_stream_closed_early_is_partial_not_error() {
    let parts = vec![
        sse(json!({"type": "response.created", "response": {"id": "resp_x"}})),
        sse(json!({"type": "response.output_text.delta", "item_id": "m", "output_index": 0, "delta": "par"})),
        "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"m\",\"output_index\":0,\"delta\":\"tial\"}\n\n".to_string(),
    ];
    let frames = stream_to_chat(parts).await;
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
    let text: String = frames
        .iter()
        .filter_map(|f| serde_json::from_str::<Value>(f).ok())
        .filter_map(|c| c["choices"][0]["delta"]["content"].as_str().map(str::to_string))
        .collect();
    assert_eq!(text, "partial");
}

#[test]
fn test_reverse_translation_ignores_mistyped_fields() {
    let req = responses_request(json!({
        "model": "gpt-4o",
        "input": [
            {"type": "message", "role": "user", "content": "hi"},
            {"type": "function_call", "call_id": 42, "name": "ls", "arguments": "{}"}
        ]
    }));
    let chat = serde_json::to_value(response_api_to_chat(&req).unwrap()).unwrap();
    let messages = chat["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "ls");
    assert_eq!(messages[1]["tool_calls"][0]["function"]["arguments"], "{}");
}

#[test]
fn test_extreme_usage_numbers_saturate() {
    assert_eq!(web_search_invocation_count(&json!([1e19, 1e19])), u64::MAX);

    let raw: ResponseUsage =
        serde_json::from_value(json!({"input_tokens": 18446744073709551615u64, "output_tokens": 1})).unwrap();
    let canonical = usage::reconcile(Some(&raw)).unwrap();
    assert_eq!(canonical.total_tokens, u64::MAX);
}

#[tokio::test]
async fn test_stream_survives_extreme_output_index_and_usage() {
    let parts = vec![
        sse(json!({"type": "response.created", "response": {"id": "resp_big"}})),
        sse(json!({"type": "response.output_item.added", "output_index": 4294967295u32, "item": {"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "ls", "arguments": ""}})),
        sse(json!({"type": "response.output_item.added", "item": {"type": "function_call", "id": "fc_2", "call_id": "call_2", "name": "pwd", "arguments": ""}})),
        sse(json!({"type": "response.completed", "response": {"id": "resp_big", "status": "completed", "output": [], "usage": {"input_tokens": 18446744073709551615u64, "output_tokens": 1}}})),
    ];
    let frames = stream_to_chat(parts).await;
    assert_eq!(frames.last().map(String::as_str), Some("[DONE]"));
    let chunks: Vec<Value> = frames
        .iter()
        .filter_map(|f| serde_json::from_str::<Value>(f).ok())
        .collect();
    let usage = chunks.iter().find(|c| c["usage"].is_object()).unwrap();
    assert_eq!(usage["usage"]["total_tokens"], json!(u64::MAX));
    let finish = chunks
        .iter()
        .find_map(|c| c["choices"][0]["finish_reason"].as_str())
        .unwrap();
    assert_eq!(finish, "tool_calls");
}
