//! Translate Responses API requests down into Chat Completions requests.
//!
//! Used when the selected channel cannot speak the Responses API. Request
//! features with no Chat Completions counterpart either fail the whole
//! conversion ([`ConvertError`]) or, for tools, are dropped.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::chat_types::{
    AudioPart, ChatCompletionRequest, ChatContent, ChatMessage, ChatTool, ChatToolCall,
    ContentPart, FilePart, FunctionCall, FunctionDefinition, ImagePart, ImageUrl, ImageUrlObject,
    JsonSchemaFormat, ResponseFormat, StreamOptions,
};
use super::responses_types::{
    ContentItem, FunctionCallItem, FunctionCallOutputItem, InputItem, InputMessage,
    MessageContent, ResponseApiInput, ResponseApiRequest, ResponseApiTool, TextConfig,
};
use super::sanitize::{reasoning_to_text, TextTag};
use super::{ids, json_kind, stringify_value, tool_choice};
use crate::error::{ConvertError, Result};

/// Schema keys no Chat Completions vendor accepts, matched case-insensitively at any depth.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalproperties"];

/// Translate a Responses API request into a Chat Completions request.
pub fn response_api_to_chat(req: &ResponseApiRequest) -> Result<ChatCompletionRequest> {
    if req.prompt.as_ref().is_some_and(|p| !p.is_null()) {
        return Err(ConvertError::PromptTemplateUnsupported);
    }
    if req.background == Some(true) {
        return Err(ConvertError::BackgroundUnsupported);
    }

    let mut messages = Vec::with_capacity(req.input.len() + 1);
    if let Some(instructions) = req.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
        messages.push(ChatMessage::new("system", instructions));
    }
    for (index, item) in req.input.iter().enumerate() {
        if let Some(message) = translate_item(index, item)? {
            messages.push(message);
        }
    }

    let tools = down_convert_tools(req.tools.as_deref().unwrap_or_default());
    let definitions: Vec<FunctionDefinition> = tools
        .iter()
        .filter_map(|t| t.function.clone())
        .collect();

    let tool_choice = req
        .tool_choice
        .as_ref()
        .and_then(tool_choice::normalize_for_chat)
        .map(|choice| tool_choice::sanitize_against_tools(choice, &definitions));

    let (response_format, verbosity) = split_text_config(req.text.as_ref());

    let stream_options = (req.stream == Some(true)).then_some(StreamOptions {
        include_usage: true,
    });

    Ok(ChatCompletionRequest {
        model: req.model.clone(),
        messages,
        max_completion_tokens: req.max_output_tokens.filter(|n| *n > 0),
        temperature: req.temperature,
        top_p: req.top_p,
        stream: req.stream,
        stream_options,
        tools: (!tools.is_empty()).then_some(tools),
        tool_choice,
        parallel_tool_calls: req.parallel_tool_calls,
        user: req.user.clone(),
        store: req.store,
        metadata: req.metadata.clone(),
        service_tier: req.service_tier.clone(),
        reasoning_effort: req
            .reasoning
            .as_ref()
            .and_then(|r| r.effort.clone())
            .filter(|e| !e.trim().is_empty()),
        verbosity,
        response_format,
        ..ChatCompletionRequest::default()
    })
}

fn translate_item(index: usize, item: &InputItem) -> Result<Option<ChatMessage>> {
    match item {
        InputItem::Text(text) => Ok(Some(ChatMessage::new("user", text.clone()))),
        InputItem::Message(message) => translate_message(index, message),
        InputItem::FunctionCall(call) => Ok(Some(translate_function_call(call))),
        InputItem::FunctionCallOutput(output) => Ok(Some(translate_function_output(output))),
        InputItem::Reasoning(part) => Ok(reasoning_to_text(part).map(|text| ChatMessage {
            role: "assistant".to_string(),
            reasoning_content: Some(text),
            ..ChatMessage::default()
        })),
        InputItem::Unrecognized(_) => Err(ConvertError::unsupported_item(index, item.type_name())),
    }
}

fn translate_function_call(call: &FunctionCallItem) -> ChatMessage {
    let id = ids::decode_opt(call.id.as_deref(), call.call_id.as_deref());
    let arguments = call.arguments.as_ref().map(stringify_value).unwrap_or_default();
    ChatMessage {
        role: role_or(call.role.as_deref(), "assistant"),
        tool_calls: Some(vec![ChatToolCall {
            id,
            call_type: "function".to_string(),
            function: FunctionCall {
                name: call.name.clone().unwrap_or_default(),
                arguments: Value::String(arguments),
            },
            index: None,
        }]),
        ..ChatMessage::default()
    }
}

fn translate_function_output(output: &FunctionCallOutputItem) -> ChatMessage {
    let id = ids::decode_opt(output.id.as_deref(), output.call_id.as_deref());
    let text = output
        .output
        .as_ref()
        .map(stringify_value)
        .filter(|s| !s.is_empty())
        .or_else(|| output.content.as_ref().map(stringify_value))
        .unwrap_or_default();
    ChatMessage {
        role: role_or(output.role.as_deref(), "tool"),
        content: Some(ChatContent::Text(text)),
        tool_call_id: Some(id),
        ..ChatMessage::default()
    }
}

fn role_or(role: Option<&str>, default: &str) -> String {
    role.map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Generic content-block conversion for message items.
fn translate_message(index: usize, message: &InputMessage) -> Result<Option<ChatMessage>> {
    let mut out = ChatMessage {
        role: message.role().to_string(),
        name: message.name.clone().filter(|n| !n.is_empty()),
        ..ChatMessage::default()
    };

    match message.content.as_ref() {
        None => {}
        Some(MessageContent::Text(text)) => out.content = Some(ChatContent::Text(text.clone())),
        Some(MessageContent::Invalid(value)) => {
            return Err(ConvertError::UnsupportedContent {
                index,
                kind: json_kind(value).to_string(),
            })
        }
        Some(MessageContent::Items(items)) => {
            let mut parts = Vec::with_capacity(items.len());
            let mut reasoning = Vec::new();
            for item in items {
                match reverse_content_item(item) {
                    Reversed::Part(part) => parts.push(part),
                    Reversed::Reasoning(text) => reasoning.push(text),
                    Reversed::Nothing => {}
                }
            }
            if !reasoning.is_empty() {
                out.reasoning_content = Some(reasoning.join("\n"));
            }
            out.content = collapse_parts(parts);
            if out.content.is_none() && out.reasoning_content.is_none() {
                return Ok(None);
            }
        }
    }
    Ok(Some(out))
}

enum Reversed {
    Part(ContentPart),
    Reasoning(String),
    Nothing,
}

fn reverse_content_item(item: &ContentItem) -> Reversed {
    match item {
        ContentItem::Text(_, part) => Reversed::Part(ContentPart::text(part.text.clone())),
        ContentItem::Image(image) => match image.image_url.as_ref() {
            Some(url) => Reversed::Part(ContentPart::ImageUrl(ImagePart {
                image_url: ImageUrl::Object(ImageUrlObject {
                    url: url.clone(),
                    detail: image.detail.clone(),
                    extra: Map::new(),
                }),
                extra: Map::new(),
            })),
            None => passthrough(item),
        },
        ContentItem::Audio(audio) => Reversed::Part(ContentPart::InputAudio(AudioPart {
            input_audio: audio.input_audio.clone(),
            extra: Map::new(),
        })),
        ContentItem::File(file) => {
            let mut body = Map::new();
            for (key, value) in [
                ("file_id", &file.file_id),
                ("file_data", &file.file_data),
                ("filename", &file.filename),
            ] {
                if let Some(v) = value {
                    body.insert(key.to_string(), Value::String(v.clone()));
                }
            }
            Reversed::Part(ContentPart::File(FilePart {
                file: Value::Object(body),
                extra: Map::new(),
            }))
        }
        ContentItem::Json(part) => Reversed::Part(ContentPart::text(stringify_value(&part.json))),
        ContentItem::Refusal(part) => Reversed::Part(ContentPart::text(part.refusal.clone())),
        ContentItem::Reasoning(part) => match reasoning_to_text(part) {
            Some(text) => Reversed::Reasoning(text),
            None => Reversed::Nothing,
        },
        ContentItem::Other(value) => match value.get("text").and_then(Value::as_str) {
            Some(text) => Reversed::Part(ContentPart::text(text)),
            None => passthrough(item),
        },
    }
}

fn passthrough(item: &ContentItem) -> Reversed {
    match serde_json::to_value(item) {
        Ok(value) => Reversed::Part(ContentPart::Other(value)),
        Err(_) => Reversed::Nothing,
    }
}

/// All-text content collapses into one newline-joined string.
fn collapse_parts(parts: Vec<ContentPart>) -> Option<ChatContent> {
    if parts.is_empty() {
        return None;
    }
    if parts.iter().all(|p| matches!(p, ContentPart::Text(_))) {
        let texts: Vec<String> = parts
            .into_iter()
            .filter_map(|p| match p {
                ContentPart::Text(t) => Some(t.text),
                _ => None,
            })
            .collect();
        return Some(ChatContent::Text(texts.join("\n")));
    }
    Some(ChatContent::Parts(parts))
}

fn split_text_config(text: Option<&TextConfig>) -> (Option<ResponseFormat>, Option<String>) {
    let Some(text) = text else {
        return (None, None);
    };
    let format = text
        .format
        .as_ref()
        .filter(|f| !f.format_type.trim().is_empty())
        .map(|f| {
            let json_schema = (f.format_type == "json_schema").then(|| JsonSchemaFormat {
                name: f.name.clone().unwrap_or_default(),
                description: f.description.clone(),
                schema: f.schema.as_ref().map(sanitize_schema),
                strict: None,
            });
            ResponseFormat {
                format_type: f.format_type.clone(),
                json_schema,
            }
        });
    let verbosity = text
        .verbosity
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    (format, verbosity)
}

/// Keep function tools only. Web search, MCP and other hosted tools have no
/// Chat Completions counterpart and are dropped.
fn down_convert_tools(tools: &[ResponseApiTool]) -> Vec<ChatTool> {
    tools
        .iter()
        .filter_map(|tool| {
            if !tool.is_function() {
                debug!(tool_type = %tool.tool_type, "dropping tool with no chat completions equivalent");
                return None;
            }
            let def = tool.function.as_ref()?;
            let name = def.name.trim();
            if name.is_empty() {
                return None;
            }
            let mut parameters = def
                .parameters
                .as_ref()
                .map(sanitize_schema)
                .filter(Value::is_object)
                .unwrap_or_else(|| Value::Object(Map::new()));
            if let Value::Object(ref mut map) = parameters {
                map.insert("type".to_string(), Value::String("object".to_string()));
            }
            Some(ChatTool {
                tool_type: "function".to_string(),
                function: Some(FunctionDefinition {
                    name: name.to_string(),
                    description: def.description.clone().filter(|d| !d.trim().is_empty()),
                    parameters: Some(parameters),
                    strict: None,
                }),
                ..ChatTool::default()
            })
        })
        .collect()
}

/// Strip schema keywords Chat Completions vendors reject.
pub fn sanitize_schema(schema: &Value) -> Value {
    sanitize_schema_at(schema, 0)
}

fn sanitize_schema_at(value: &Value, depth: usize) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| {
                    let lower = key.to_ascii_lowercase();
                    if UNSUPPORTED_SCHEMA_KEYS.contains(&lower.as_str()) {
                        return false;
                    }
                    !(depth == 0 && matches!(lower.as_str(), "description" | "strict"))
                })
                .map(|(key, v)| (key.clone(), sanitize_schema_at(v, depth + 1)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| sanitize_schema_at(v, depth + 1))
                .collect(),
        ),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Content-type normalization
// ---------------------------------------------------------------------------

/// Counts of text tags rewritten by [`normalize_input_content_types`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    /// Assistant `input_text`/`text` parts retagged `output_text`.
    pub assistant_retagged: usize,
    /// Non-assistant `output_text` parts retagged `input_text`.
    pub non_assistant_retagged: usize,
}

impl NormalizationStats {
    pub fn total(&self) -> usize {
        self.assistant_retagged + self.non_assistant_retagged
    }
}

/// Fix text tags that disagree with the authoring role, in place.
pub fn normalize_input_content_types(input: &mut ResponseApiInput) -> NormalizationStats {
    let mut stats = NormalizationStats::default();
    for item in input.0.iter_mut() {
        let InputItem::Message(message) = item else {
            continue;
        };
        let is_assistant = message.role().eq_ignore_ascii_case("assistant");
        let Some(MessageContent::Items(items)) = message.content.as_mut() else {
            continue;
        };
        for content in items.iter_mut() {
            let ContentItem::Text(tag, _) = content else {
                continue;
            };
            match (is_assistant, *tag) {
                (true, TextTag::InputText | TextTag::Text) => {
                    *tag = TextTag::OutputText;
                    stats.assistant_retagged += 1;
                }
                (false, TextTag::OutputText) => {
                    *tag = TextTag::InputText;
                    stats.non_assistant_retagged += 1;
                }
                _ => {}
            }
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(value: Value) -> ResponseApiRequest {
        serde_json::from_value(value).unwrap()
    }

    fn convert(value: Value) -> Value {
        serde_json::to_value(response_api_to_chat(&request(value)).unwrap()).unwrap()
    }

    #[test]
    fn test_prompt_and_background_are_rejected() {
        let err = response_api_to_chat(&request(json!({
            "model": "gpt-4o", "input": "hi", "prompt": {"id": "pmpt_1"}
        })))
        .unwrap_err();
        assert!(matches!(err, ConvertError::PromptTemplateUnsupported));
        assert!(err.is_client_error());

        let err = response_api_to_chat(&request(json!({
            "model": "gpt-4o", "input": "hi", "background": true
        })))
        .unwrap_err();
        assert!(matches!(err, ConvertError::BackgroundUnsupported));
    }

    #[test]
    fn test_instructions_and_string_input() {
        let out = convert(json!({"model": "gpt-4o", "instructions": "Be terse.", "input": "hello"}));
        assert_eq!(
            out["messages"],
            json!([
                {"role": "system", "content": "Be terse."},
                {"role": "user", "content": "hello"}
            ])
        );
    }

    #[test]
    fn test_function_call_round_trip_items() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": [
                {"role": "user", "content": [{"type": "input_text", "text": "list"}]},
                {"type": "function_call", "id": "fc_abc", "call_id": "call_abc", "name": "ls", "arguments": {"path": "."}},
                {"type": "function_call_output", "call_id": "call_abc", "output": "README.md"}
            ]
        }));
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages[0], json!({"role": "user", "content": "list"}));
        assert_eq!(
            messages[1],
            json!({"role": "assistant", "tool_calls": [
                {"id": "abc", "type": "function", "function": {"name": "ls", "arguments": "{\"path\":\".\"}"}}
            ]})
        );
        assert_eq!(
            messages[2],
            json!({"role": "tool", "content": "README.md", "tool_call_id": "abc"})
        );
    }

    #[test]
    fn test_function_output_falls_back_to_content() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": [{"type": "function_call_output", "call_id": "call_1", "content": [{"type": "text", "text": "x"}]}]
        }));
        let content = out["messages"][0]["content"].as_str().unwrap();
        let decoded: Value = serde_json::from_str(content).unwrap();
        assert_eq!(decoded, json!([{"type": "text", "text": "x"}]));
    }

    #[test]
    fn test_mixed_content_keeps_parts_and_reasoning() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": [{
                "role": "assistant",
                "content": [
                    {"type": "reasoning", "summary": [{"type": "summary_text", "text": "thinking"}]},
                    {"type": "output_text", "text": "look"},
                    {"type": "input_image", "image_url": "data:image/png;base64,AAAA", "detail": "low"}
                ]
            }]
        }));
        let message = &out["messages"][0];
        assert_eq!(message["reasoning_content"], "thinking");
        assert_eq!(
            message["content"],
            json!([
                {"type": "text", "text": "look"},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA", "detail": "low"}}
            ])
        );
    }

    #[test]
    fn test_unsupported_item_names_its_type() {
        let err = response_api_to_chat(&request(json!({
            "model": "gpt-4o",
            "input": ["ok", {"type": "computer_call", "action": {}}]
        })))
        .unwrap_err();
        match err {
            ConvertError::UnsupportedInputItem { index, item_type } => {
                assert_eq!(index, 1);
                assert_eq!(item_type, "computer_call");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_array_content_is_rejected() {
        let err = response_api_to_chat(&request(json!({
            "model": "gpt-4o",
            "input": [{"role": "user", "content": 42}]
        })))
        .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedContent { index: 0, .. }));
    }

    #[test]
    fn test_tools_are_down_converted() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": "hi",
            "tools": [
                {"type": "web_search"},
                {"type": "function", "name": "ls", "description": "List", "strict": true,
                 "parameters": {"$schema": "x", "description": "top", "properties": {"p": {"type": "string", "additionalProperties": false}}}}
            ],
            "tool_choice": {"type": "function", "name": "web_search"}
        }));
        assert_eq!(
            out["tools"],
            json!([{"type": "function", "function": {
                "name": "ls",
                "description": "List",
                "parameters": {"type": "object", "properties": {"p": {"type": "string"}}}
            }}])
        );
        assert_eq!(out["tool_choice"], json!({"type": "auto"}));
    }

    #[test]
    fn test_tool_choice_naming_kept_tool_survives() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": "hi",
            "tools": [{"type": "function", "name": "ls"}],
            "tool_choice": {"type": "function", "name": "ls"}
        }));
        assert_eq!(out["tool_choice"], json!({"type": "function", "function": {"name": "ls"}}));
        assert_eq!(out["tools"][0]["function"]["parameters"], json!({"type": "object"}));
    }

    #[test]
    fn test_text_config_splits() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": "hi",
            "text": {"format": {"type": "json_schema", "name": "a", "strict": true, "schema": {"type": "object", "additionalProperties": false}}, "verbosity": "high"},
            "max_output_tokens": 50,
            "reasoning": {"effort": "low"}
        }));
        assert_eq!(
            out["response_format"],
            json!({"type": "json_schema", "json_schema": {"name": "a", "schema": {"type": "object"}}})
        );
        assert_eq!(out["verbosity"], "high");
        assert_eq!(out["max_completion_tokens"], 50);
        assert_eq!(out["reasoning_effort"], "low");
    }

    #[test]
    fn test_streaming_requests_ask_for_usage() {
        let out = convert(json!({"model": "gpt-4o", "input": "hi", "stream": true}));
        assert_eq!(out["stream_options"], json!({"include_usage": true}));
    }

    #[test]
    fn test_normalize_input_content_types() {
        let mut input: ResponseApiInput = serde_json::from_value(json!([
            {"role": "assistant", "content": [{"type": "input_text", "text": "a"}, {"type": "output_text", "text": "b"}]},
            {"role": "user", "content": [{"type": "output_text", "text": "c"}]},
            "plain"
        ]))
        .unwrap();
        let stats = normalize_input_content_types(&mut input);
        assert_eq!(stats.assistant_retagged, 1);
        assert_eq!(stats.non_assistant_retagged, 1);
        assert_eq!(stats.total(), 2);
        let value = serde_json::to_value(&input).unwrap();
        assert_eq!(value[0]["content"][0]["type"], "output_text");
        assert_eq!(value[1]["content"][0]["type"], "input_text");
    }

    #[test]
    fn test_mistyped_item_fields_are_treated_as_absent() {
        let out = convert(json!({
            "model": "gpt-4o",
            "input": [
                {"type": "message", "role": "user", "content": "hi"},
                {"type": "function_call", "id": "fc_abc", "call_id": 42, "name": "ls", "arguments": "{}", "status": 7},
                {"type": "function_call_output", "call_id": "call_abc", "output": "done", "status": false}
            ]
        }));
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["tool_calls"][0]["function"]["name"], "ls");
        assert_eq!(messages[1]["tool_calls"][0]["id"], "abc");
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "abc");
        assert_eq!(messages[2]["content"], "done");
    }

    #[test]
    fn test_unknown_item_type_is_still_rejected() {
        let err = response_api_to_chat(&request(json!({
            "model": "gpt-4o",
            "input": [{"type": "computer_call", "id": "cu_1"}]
        })))
        .unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedInputItem { index: 0, .. }));
    }
}
