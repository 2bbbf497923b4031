//! Request fix-ups for DeepSeek-compatible Chat Completions channels.
//!
//! DeepSeek rejects array content on `tool` messages and accepts only
//! `enabled`/`disabled` for `thinking.type`.

use serde::Serialize;
use tracing::debug;

use super::chat_types::{ChatCompletionRequest, ChatContent, ContentPart, ThinkingConfig};

/// What [`apply_deepseek_quirks`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuirkReport {
    pub tool_messages: usize,
    pub tool_messages_flattened: usize,
    pub thinking_type_changed: bool,
}

impl QuirkReport {
    pub fn changed(&self) -> bool {
        self.tool_messages_flattened > 0 || self.thinking_type_changed
    }
}

/// Apply every DeepSeek fix-up to `request` in place.
pub fn apply_deepseek_quirks(request: &mut ChatCompletionRequest) -> QuirkReport {
    let (tool_messages, tool_messages_flattened) = normalize_tool_message_content(request);
    let thinking_type_changed = request
        .thinking
        .as_mut()
        .is_some_and(normalize_thinking_config);

    let report = QuirkReport {
        tool_messages,
        tool_messages_flattened,
        thinking_type_changed,
    };
    if report.changed() {
        debug!(
            model = %request.model,
            tool_messages = report.tool_messages,
            flattened = report.tool_messages_flattened,
            thinking_type_changed = report.thinking_type_changed,
            "applied deepseek request quirks"
        );
    }
    report
}

/// Flatten array content on `tool` messages into a plain string.
///
/// Text parts are concatenated; arrays without any text fall back to their
/// JSON encoding. Returns `(tool message count, flattened count)`.
pub fn normalize_tool_message_content(request: &mut ChatCompletionRequest) -> (usize, usize) {
    let mut seen = 0;
    let mut flattened = 0;
    for (index, message) in request.messages.iter_mut().enumerate() {
        if message.role != "tool" {
            continue;
        }
        seen += 1;
        let Some(ChatContent::Parts(parts)) = message.content.as_ref() else {
            continue;
        };
        let text = flatten_parts(parts);
        debug!(message_index = index, normalized_len = text.len(), "flattened tool message content");
        message.content = Some(ChatContent::Text(text));
        flattened += 1;
    }
    (seen, flattened)
}

fn flatten_parts(parts: &[ContentPart]) -> String {
    let text: String = parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .collect();
    if !text.is_empty() || parts.is_empty() {
        return text;
    }
    match serde_json::to_string(parts) {
        Ok(encoded) => encoded,
        Err(e) => {
            debug!(error = %e, "tool message content could not be encoded");
            String::new()
        }
    }
}

/// Map a `thinking.type` onto the values DeepSeek accepts.
///
/// Returns the normalized type and whether it differs from `raw`.
pub fn normalize_thinking_type(raw: &str, budget_tokens: i64) -> (&'static str, bool) {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "enabled" => ("enabled", raw != "enabled"),
        "disabled" => ("disabled", raw != "disabled"),
        "adaptive" => ("enabled", true),
        _ if budget_tokens > 0 => ("enabled", true),
        _ => ("disabled", true),
    }
}

fn normalize_thinking_config(thinking: &mut ThinkingConfig) -> bool {
    let (normalized, changed) =
        normalize_thinking_type(&thinking.thinking_type, thinking.budget_tokens.unwrap_or(0));
    if changed {
        debug!(
            original = %thinking.thinking_type,
            normalized,
            "normalized thinking type for deepseek"
        );
        thinking.thinking_type = normalized.to_string();
    }
    changed
}
