//! Non-sensitive request summaries recorded in the diagnostics journal.
//!
//! Nothing here carries payload text: only counts, indices and type names.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::chat_types::{ChatCompletionRequest, ChatTool};
use super::deepseek::QuirkReport;
use super::request::ForwardReport;
use super::responses_types::{InputItem, ResponseApiInput, ResponseApiRequest, ResponseApiTool};
use super::reverse::NormalizationStats;
use super::Protocol;

const MISSING_OUTPUT_SAMPLES: usize = 5;

/// Malformed tool-history records found in Responses API input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputDiagnostics {
    pub function_call_output_missing_output: usize,
    pub function_call_output_missing_call_id: usize,
    pub function_call_missing_name: usize,
    pub function_call_missing_arguments: usize,
    pub invalid_input_item_type: usize,
    /// Indices of the first few `function_call_output` items without `output`.
    pub missing_output_sample_indices: Vec<usize>,
}

impl InputDiagnostics {
    pub fn collect(input: &ResponseApiInput) -> Self {
        let mut diag = Self::default();
        for (index, item) in input.iter().enumerate() {
            match item {
                InputItem::FunctionCallOutput(output) => {
                    if output.output.is_none() {
                        diag.function_call_output_missing_output += 1;
                        if diag.missing_output_sample_indices.len() < MISSING_OUTPUT_SAMPLES {
                            diag.missing_output_sample_indices.push(index);
                        }
                    }
                    if blank(output.call_id.as_deref()) {
                        diag.function_call_output_missing_call_id += 1;
                    }
                }
                InputItem::FunctionCall(call) => {
                    if blank(call.name.as_deref()) {
                        diag.function_call_missing_name += 1;
                    }
                    if call.arguments.is_none() {
                        diag.function_call_missing_arguments += 1;
                    }
                }
                InputItem::Unrecognized(value) if !value.is_object() => {
                    diag.invalid_input_item_type += 1;
                }
                _ => {}
            }
        }
        diag
    }

    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map_or(true, |s| s.trim().is_empty())
}

/// Tool types declared on a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolSummary {
    pub tool_count: usize,
    pub has_web_search: bool,
    pub tool_types: BTreeMap<String, usize>,
}

impl ToolSummary {
    pub fn for_chat(tools: &[ChatTool]) -> Self {
        Self::from_types(tools.iter().map(|tool| {
            let name = tool.tool_type.trim().to_ascii_lowercase();
            if name.is_empty() && tool.function.is_some() {
                "function".to_string()
            } else {
                name
            }
        }))
    }

    pub fn for_response_api(tools: &[ResponseApiTool]) -> Self {
        Self::from_types(tools.iter().map(|tool| tool.tool_type.trim().to_ascii_lowercase()))
    }

    fn from_types(types: impl Iterator<Item = String>) -> Self {
        let mut summary = Self::default();
        for name in types {
            let name = if name.is_empty() {
                "unknown".to_string()
            } else {
                name
            };
            summary.has_web_search |= name.starts_with("web_search");
            summary.tool_count += 1;
            *summary.tool_types.entry(name).or_default() += 1;
        }
        summary
    }
}

/// Everything the journal records about one translated request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDiagnostics {
    pub protocol: Protocol,
    pub model: String,
    pub item_count: usize,
    pub stream: bool,
    pub tools: ToolSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<InputDiagnostics>,
    pub unsupported_content_fields: usize,
    pub dropped_messages: usize,
    pub redactions: usize,
    pub redacted_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalization: Option<NormalizationStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deepseek: Option<QuirkReport>,
}

impl RequestDiagnostics {
    pub fn for_chat(req: &ChatCompletionRequest) -> Self {
        Self {
            protocol: Protocol::ChatCompletions,
            model: req.model.clone(),
            item_count: req.messages.len(),
            stream: req.stream == Some(true),
            tools: ToolSummary::for_chat(req.tools.as_deref().unwrap_or_default()),
            input: None,
            unsupported_content_fields: 0,
            dropped_messages: 0,
            redactions: 0,
            redacted_bytes: 0,
            normalization: None,
            deepseek: None,
        }
    }

    pub fn for_response_api(req: &ResponseApiRequest) -> Self {
        Self {
            protocol: Protocol::ResponseApi,
            model: req.model.clone(),
            item_count: req.input.len(),
            stream: req.stream == Some(true),
            tools: ToolSummary::for_response_api(req.tools.as_deref().unwrap_or_default()),
            input: Some(InputDiagnostics::collect(&req.input)),
            unsupported_content_fields: 0,
            dropped_messages: 0,
            redactions: 0,
            redacted_bytes: 0,
            normalization: None,
            deepseek: None,
        }
    }

    /// Fold in what the forward translation repaired.
    pub fn with_forward_report(mut self, report: &ForwardReport) -> Self {
        self.unsupported_content_fields = report.unsupported_content_fields;
        self.dropped_messages = report.dropped_messages;
        self.redactions = report.redactions;
        self.redacted_bytes = report.redacted_bytes;
        self
    }

    pub fn with_normalization(mut self, stats: NormalizationStats) -> Self {
        self.normalization = Some(stats);
        self
    }

    pub fn with_quirks(mut self, report: QuirkReport) -> Self {
        self.deepseek = Some(report);
        self
    }

    /// Journal context object.
    pub fn to_context(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_diagnostics_counts_malformed_history() {
        let input: ResponseApiInput = serde_json::from_value(json!([
            "hello",
            {"type": "function_call_output", "call_id": "call_missing_output"},
            {"type": "function_call_output", "output": "ok"},
            {"type": "function_call", "call_id": "c", "arguments": "{}"},
            {"type": "function_call", "call_id": "d", "name": "ls"},
            42
        ]))
        .unwrap();
        let diag = InputDiagnostics::collect(&input);
        assert_eq!(diag.function_call_output_missing_output, 1);
        assert_eq!(diag.missing_output_sample_indices, vec![1]);
        assert_eq!(diag.function_call_output_missing_call_id, 1);
        assert_eq!(diag.function_call_missing_name, 1);
        assert_eq!(diag.function_call_missing_arguments, 1);
        assert_eq!(diag.invalid_input_item_type, 1);
        assert!(!diag.is_clean());
    }

    #[test]
    fn test_null_output_and_arguments_count_as_present() {
        let input: ResponseApiInput = serde_json::from_value(json!([
            {"type": "function_call_output", "call_id": "c1", "output": null},
            {"type": "function_call", "call_id": "c1", "name": "ls", "arguments": null}
        ]))
        .unwrap();
        let diag = InputDiagnostics::collect(&input);
        assert_eq!(diag.function_call_output_missing_output, 0);
        assert_eq!(diag.function_call_missing_arguments, 0);
        assert!(diag.missing_output_sample_indices.is_empty());
        assert!(diag.is_clean());
    }

    #[test]
    fn test_missing_output_samples_capped() {
        let items: Vec<Value> = (0..8)
            .map(|i| json!({"type": "function_call_output", "call_id": format!("c{i}")}))
            .collect();
        let input: ResponseApiInput = serde_json::from_value(Value::Array(items)).unwrap();
        let diag = InputDiagnostics::collect(&input);
        assert_eq!(diag.function_call_output_missing_output, 8);
        assert_eq!(diag.missing_output_sample_indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_clean_input() {
        let input: ResponseApiInput = serde_json::from_value(json!([
            {"role": "user", "content": "hi"},
            {"type": "function_call", "call_id": "c", "name": "ls", "arguments": "{}"},
            {"type": "function_call_output", "call_id": "c", "output": "[]"}
        ]))
        .unwrap();
        assert!(InputDiagnostics::collect(&input).is_clean());
    }

    #[test]
    fn test_tool_summary_for_both_protocols() {
        let chat: Vec<ChatTool> = serde_json::from_value(json!([
            {"type": "function", "function": {"name": "a"}},
            {"function": {"name": "b"}},
            {"type": "web_search"}
        ]))
        .unwrap();
        let summary = ToolSummary::for_chat(&chat);
        assert_eq!(summary.tool_count, 3);
        assert!(summary.has_web_search);
        assert_eq!(summary.tool_types.get("function"), Some(&2));

        let responses: Vec<ResponseApiTool> = serde_json::from_value(json!([
            {"type": "web_search_preview"},
            {"type": "mcp", "server_label": "x"},
            {"type": ""}
        ]))
        .unwrap();
        let summary = ToolSummary::for_response_api(&responses);
        assert!(summary.has_web_search);
        assert_eq!(summary.tool_types.get("unknown"), Some(&1));
        assert_eq!(summary.tool_types.get("mcp"), Some(&1));
    }

    #[test]
    fn test_request_diagnostics_context_has_no_payload_text() {
        let req: ResponseApiRequest = serde_json::from_value(json!({
            "model": "gpt-4o",
            "input": [{"role": "user", "content": "secret words"}],
            "stream": true
        }))
        .unwrap();
        let diag = RequestDiagnostics::for_response_api(&req).with_forward_report(&ForwardReport {
            redactions: 2,
            redacted_bytes: 9000,
            ..ForwardReport::default()
        });
        let context = diag.to_context();
        assert_eq!(context["protocol"], "response_api");
        assert_eq!(context["item_count"], 1);
        assert_eq!(context["redacted_bytes"], 9000);
        assert!(context.get("deepseek").is_none());
        assert!(!context.to_string().contains("secret"));
    }
}
