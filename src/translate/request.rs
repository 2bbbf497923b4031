//! Translate Chat Completions requests into Responses API requests.
//!
//! Best effort: recoverable oddities are sanitized rather than rejected. A single
//! assistant message can expand into a message item followed by one
//! `function_call` item per tool call; a tool message becomes a single
//! `function_call_output` item.

use serde::Serialize;
use serde_json::Value;

use super::chat_types::{
    ChatCompletionRequest, ChatContent, ChatMessage, ChatTool, FunctionDefinition, ResponseFormat,
};
use super::ids;
use super::responses_types::{
    ContentItem, FunctionCallItem, FunctionCallOutputItem, InputItem, InputMessage,
    MessageContent, ReasoningConfig, ResponseApiInput, ResponseApiRequest, ResponseApiTool,
    TextConfig, TextFormat,
};
use super::sanitize::{
    count_unsupported_fields, redact_embedded_data_urls, response_api_field_allowed,
    sanitize_block, select_text_tag, DEFAULT_REDACTION_THRESHOLD,
};
use super::{stringify_value, tool_choice, Protocol};
use crate::models;

/// Knobs for the forward translation.
#[derive(Debug, Clone)]
pub struct ForwardOptions {
    /// Inline base64 payloads in assistant text longer than this are redacted.
    pub redaction_threshold: usize,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            redaction_threshold: DEFAULT_REDACTION_THRESHOLD,
        }
    }
}

/// What the forward translation had to repair or drop, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ForwardReport {
    pub dropped_messages: usize,
    pub redactions: usize,
    pub redacted_bytes: usize,
    pub unsupported_content_fields: usize,
    pub reasoning_effort_cleared: bool,
}

/// Translate a Chat Completions request into a Responses API request.
pub fn chat_to_response_api(req: &ChatCompletionRequest, opts: &ForwardOptions) -> ResponseApiRequest {
    chat_to_response_api_with_report(req, opts).0
}

/// Same as [`chat_to_response_api`], also returning what was repaired along the way.
pub fn chat_to_response_api_with_report(
    req: &ChatCompletionRequest,
    opts: &ForwardOptions,
) -> (ResponseApiRequest, ForwardReport) {
    let mut report = ForwardReport::default();

    // A leading system message becomes `instructions`, exactly once.
    let (instructions, rest) = match req.messages.split_first() {
        Some((first, rest)) if first.role == "system" => {
            let text = first.text();
            ((!text.is_empty()).then_some(text), rest)
        }
        _ => (None, req.messages.as_slice()),
    };

    let mut input = ResponseApiInput::default();
    for msg in rest {
        report.unsupported_content_fields += count_unsupported_fields(msg, response_api_field_allowed);
        let before = input.len();
        translate_message(msg, opts, &mut report, &mut input);
        if input.len() == before {
            report.dropped_messages += 1;
        }
    }

    let max_output_tokens = req
        .max_completion_tokens
        .filter(|n| *n > 0)
        .or(req.max_tokens.filter(|n| *n > 0));

    let tools = translate_tools(req);

    let choice = req.tool_choice.clone().or_else(|| {
        req.function_call
            .as_ref()
            .and_then(tool_choice::from_legacy_function_call)
    });
    let tool_choice = choice.as_ref().and_then(tool_choice::normalize_for_response);

    let reasoning = if models::is_reasoning_model(&req.model) {
        let effort = models::normalize_reasoning_effort(&req.model, req.reasoning_effort.as_deref());
        let summary = models::normalize_reasoning_summary(
            &req.model,
            Some(models::default_reasoning_summary(&req.model)),
        );
        Some(ReasoningConfig {
            effort: Some(effort),
            summary,
        })
    } else {
        report.reasoning_effort_cleared = req.reasoning_effort.is_some();
        None
    };

    let text = translate_text_config(req.response_format.as_ref(), req.verbosity.as_deref());

    let translated = ResponseApiRequest {
        model: req.model.clone(),
        input,
        instructions,
        tools,
        tool_choice,
        text,
        reasoning,
        max_output_tokens,
        stream: req.stream,
        store: req.store,
        metadata: req.metadata.clone(),
        parallel_tool_calls: req.parallel_tool_calls,
        service_tier: req.service_tier.clone(),
        temperature: req.temperature,
        top_p: req.top_p,
        user: req.user.clone(),
        ..ResponseApiRequest::default()
    };

    (translated, report)
}

fn translate_message(
    msg: &ChatMessage,
    opts: &ForwardOptions,
    report: &mut ForwardReport,
    input: &mut ResponseApiInput,
) {
    match msg.role.as_str() {
        "tool" => {
            let pair = ids::encode(msg.tool_call_id.as_deref().unwrap_or_default());
            input.push(InputItem::FunctionCallOutput(FunctionCallOutputItem {
                id: non_empty(pair.fc_id),
                call_id: non_empty(pair.call_id),
                output: Some(Value::String(msg.text())),
                ..FunctionCallOutputItem::default()
            }));
        }
        "assistant" => {
            if let Some(converted) = convert_message(msg, opts, report) {
                input.push(InputItem::Message(converted));
            }
            for call in msg.tool_calls.iter().flatten() {
                let pair = ids::encode(&call.id);
                input.push(InputItem::FunctionCall(FunctionCallItem {
                    id: non_empty(pair.fc_id),
                    call_id: non_empty(pair.call_id),
                    name: Some(call.function.name.clone()),
                    arguments: Some(Value::String(stringify_value(&call.function.arguments))),
                    ..FunctionCallItem::default()
                }));
            }
        }
        _ => {
            if let Some(converted) = convert_message(msg, opts, report) {
                input.push(InputItem::Message(converted));
            }
        }
    }
}

/// Convert one message's content; `None` when nothing survives.
fn convert_message(
    msg: &ChatMessage,
    opts: &ForwardOptions,
    report: &mut ForwardReport,
) -> Option<InputMessage> {
    let role = msg.role.as_str();
    let is_assistant = role == "assistant";
    let tag = select_text_tag(role, Protocol::ResponseApi);

    let mut items: Vec<ContentItem> = match msg.content.as_ref()? {
        ChatContent::Text(text) if text.is_empty() => return None,
        ChatContent::Text(text) => vec![ContentItem::text(tag, text.clone())],
        ChatContent::Parts(parts) => parts.iter().flat_map(|p| sanitize_block(p, role)).collect(),
    };
    if items.is_empty() {
        return None;
    }

    if is_assistant {
        for item in &mut items {
            if let ContentItem::Text(_, part) = item {
                let redaction = redact_embedded_data_urls(&part.text, opts.redaction_threshold);
                if redaction.changed {
                    report.redactions += 1;
                    report.redacted_bytes += redaction.redacted_bytes;
                    part.text = redaction.text;
                }
            }
        }
    }

    let mut converted = InputMessage::new(role, MessageContent::Items(items));
    converted.name = msg.name.clone().filter(|n| !n.is_empty());
    Some(converted)
}

fn translate_tools(req: &ChatCompletionRequest) -> Option<Vec<ResponseApiTool>> {
    let mut tools: Vec<ResponseApiTool> = match (&req.tools, &req.functions) {
        (Some(tools), _) => tools.iter().map(translate_tool).collect(),
        (None, Some(functions)) => functions
            .iter()
            .cloned()
            .map(ResponseApiTool::function)
            .collect(),
        (None, None) => Vec::new(),
    };

    if let Some(ref options) = req.web_search_options {
        let has_web_search = tools
            .iter()
            .any(|t| t.tool_type.eq_ignore_ascii_case("web_search"));
        if !has_web_search {
            tools.push(ResponseApiTool {
                tool_type: "web_search".to_string(),
                search_context_size: options.search_context_size.clone(),
                user_location: options.user_location.clone(),
                ..ResponseApiTool::default()
            });
        }
    }

    (!tools.is_empty()).then_some(tools)
}

fn translate_tool(tool: &ChatTool) -> ResponseApiTool {
    let kind = tool.tool_type.trim().to_ascii_lowercase();
    match kind.as_str() {
        "mcp" => ResponseApiTool {
            tool_type: "mcp".to_string(),
            server_label: tool.server_label.clone(),
            server_url: tool.server_url.clone(),
            require_approval: tool.require_approval.clone(),
            allowed_tools: tool.allowed_tools.clone(),
            headers: tool.headers.clone(),
            ..ResponseApiTool::default()
        },
        "web_search" | "web_search_preview" => ResponseApiTool {
            tool_type: kind.clone(),
            search_context_size: tool.search_context_size.clone(),
            filters: tool.filters.clone(),
            user_location: tool.user_location.clone(),
            ..ResponseApiTool::default()
        },
        "function" | "" => ResponseApiTool::function(function_only(tool.function.as_ref())),
        _ => ResponseApiTool {
            tool_type: tool.tool_type.clone(),
            function: tool.function.clone(),
            ..ResponseApiTool::default()
        },
    }
}

/// Keep only the fields a function definition carries.
fn function_only(def: Option<&FunctionDefinition>) -> FunctionDefinition {
    def.map(|d| FunctionDefinition {
        name: d.name.clone(),
        description: d.description.clone(),
        parameters: d.parameters.clone(),
        strict: d.strict,
    })
    .unwrap_or_default()
}

fn translate_text_config(format: Option<&ResponseFormat>, verbosity: Option<&str>) -> Option<TextConfig> {
    let verbosity = verbosity.map(str::trim).filter(|v| !v.is_empty());
    if format.is_none() && verbosity.is_none() {
        return None;
    }
    let format = format.map(|f| {
        let mut out = TextFormat {
            format_type: f.format_type.clone(),
            ..TextFormat::default()
        };
        if let Some(ref schema) = f.json_schema {
            out.name = (!schema.name.is_empty()).then(|| schema.name.clone());
            out.description = schema.description.clone();
            out.schema = schema.schema.clone();
            out.strict = schema.strict;
        }
        out
    });
    Some(TextConfig {
        format,
        verbosity: verbosity.map(str::to_string),
    })
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}
