//! Protocol translation between Chat Completions, the Responses API and Claude Messages.
//!
//! The core of the gateway: converts requests, responses, and streaming events
//! between the three wire formats. Everything here is pure (no I/O); only the
//! [`streaming::StreamAggregator`] carries state, and only for one response.

pub mod chat_types;
pub mod claude_types;
pub mod deepseek;
pub mod diagnostics;
pub mod ids;
pub mod request;
pub mod response;
pub mod responses_types;
pub mod reverse;
pub mod sanitize;
pub mod streaming;
pub mod tool_choice;
pub mod usage;

use serde::{Deserialize, Serialize};

/// Wire protocol spoken by a client or an upstream channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    ChatCompletions,
    ResponseApi,
    ClaudeMessages,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::ChatCompletions => "chat_completions",
            Protocol::ResponseApi => "response_api",
            Protocol::ClaudeMessages => "claude_messages",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render an arbitrary JSON value as the string form the wire expects for
/// tool arguments and outputs: strings pass through, null becomes empty,
/// anything else is JSON-encoded.
pub(crate) fn stringify_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => match serde_json::to_string(other) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::debug!(kind = json_kind(other), error = %e, "falling back to textual rendering");
                other.to_string()
            }
        },
    }
}

/// Name of a JSON value's kind, safe to log in place of its content.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
