//! State machine for translating Responses API stream events into Chat
//! Completions chunks.
//!
//! The [`StreamAggregator`] consumes one `ResponseStreamEvent` at a time and
//! emits the Chat Completions chunks that event implies. It owns the state of
//! exactly one upstream response and is never shared between requests.
//!
//! Usage:
//!   let mut aggregator = StreamAggregator::new("gpt-5");
//!   for event in events {
//!       let chunks = aggregator.process_event(&event);
//!       // send each chunk as `data: {json}`
//!   }
//!   let final_chunks = aggregator.finish(); // no-op after `response.completed`
//!   // then send `data: [DONE]`

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::chat_types::{
    ChatCompletionChunk, ChunkChoice, ChunkDelta, ChunkToolCall, ChunkToolCallFunction,
};
use super::responses_types::{ContentItem, OutputItem, ResponseApiResponse, ResponseStreamEvent};
use super::response::{count_new_web_search_calls, json_text, mcp_fragment};
use super::usage::{self, ChatUsage, InputTokensDetails, ResponseUsage};
use super::ids;

/// Lifecycle of one streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    Idle,
    Open,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemKind {
    Message,
    FunctionCall,
    Reasoning,
    Other,
}

impl ItemKind {
    fn of(item_type: &str) -> Self {
        match item_type {
            "message" => ItemKind::Message,
            "function_call" => ItemKind::FunctionCall,
            "reasoning" => ItemKind::Reasoning,
            _ => ItemKind::Other,
        }
    }
}

/// Per-output-item state.
#[derive(Debug)]
struct ItemState {
    kind: ItemKind,
    buffer: String,
    had_deltas: bool,
    /// Set exactly once; checked before any terminal emission for the item.
    finalized: bool,
    /// Text deltas per content part.
    part_buffers: HashMap<u32, String>,
    /// Content parts whose `output_text.done` has been handled.
    parts_done: HashSet<u32>,
    tool_index: Option<u32>,
    call_id: String,
    name: String,
    /// Whether the tool-call id/name chunk has gone out.
    announced: bool,
}

impl ItemState {
    fn new(kind: ItemKind) -> Self {
        Self {
            kind,
            buffer: String::new(),
            had_deltas: false,
            finalized: false,
            part_buffers: HashMap::new(),
            parts_done: HashSet::new(),
            tool_index: None,
            call_id: String::new(),
            name: String::new(),
            announced: false,
        }
    }
}

/// Text of one output item, recorded when the item is finalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedItem {
    pub item_id: String,
    pub text: String,
}

/// Non-sensitive summary of a finished stream, safe to journal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StreamSummary {
    pub response_id: String,
    pub completed: bool,
    pub text_chars: usize,
    pub reasoning_chars: usize,
    pub tool_calls: usize,
    pub web_search_calls: usize,
    pub usage: Option<ChatUsage>,
}

/// Translates Responses API stream events into Chat Completions chunks.
#[derive(Debug)]
pub struct StreamAggregator {
    phase: StreamPhase,
    response_id: String,
    model: String,
    created: i64,
    status: Option<String>,
    role_sent: bool,
    /// Set only by `response.completed` and friends, not by [`finish`](Self::finish).
    completed_normally: bool,
    items: HashMap<String, ItemState>,
    keys_by_output_index: HashMap<u32, String>,
    next_tool_index: u32,
    tool_calls: usize,
    text: String,
    reasoning: String,
    finalized: Vec<FinalizedItem>,
    usage: Option<ChatUsage>,
    raw_usage: Option<ResponseUsage>,
    web_search_seen: HashSet<String>,
    web_search_calls: usize,
}

impl StreamAggregator {
    pub fn new(model: &str) -> Self {
        Self {
            phase: StreamPhase::Idle,
            response_id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            model: model.to_string(),
            created: chrono::Utc::now().timestamp(),
            status: None,
            role_sent: false,
            completed_normally: false,
            items: HashMap::new(),
            keys_by_output_index: HashMap::new(),
            next_tool_index: 0,
            tool_calls: 0,
            text: String::new(),
            reasoning: String::new(),
            finalized: Vec::new(),
            usage: None,
            raw_usage: None,
            web_search_seen: HashSet::new(),
            web_search_calls: 0,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    /// Assistant text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Items finalized so far, each exactly once, in finalization order.
    pub fn finalized_items(&self) -> &[FinalizedItem] {
        &self.finalized
    }

    pub fn summary(&self) -> StreamSummary {
        StreamSummary {
            response_id: self.response_id.clone(),
            completed: self.completed_normally,
            text_chars: self.text.chars().count(),
            reasoning_chars: self.reasoning.chars().count(),
            tool_calls: self.tool_calls,
            web_search_calls: self.web_search_calls,
            usage: self.usage.clone(),
        }
    }

    /// Process one upstream event, returning zero or more chunks to forward.
    pub fn process_event(&mut self, event: &ResponseStreamEvent) -> Vec<ChatCompletionChunk> {
        if self.phase == StreamPhase::Completed {
            return Vec::new();
        }

        let mut out = Vec::new();
        if let Some(ref resp) = event.response {
            self.capture_metadata(resp);
        }

        match event.event_type.as_str() {
            "response.created" | "response.in_progress" => self.open(&mut out),
            "response.output_item.added" => {
                self.open(&mut out);
                if let Some(ref item) = event.item {
                    self.on_item_added(item, event.output_index, &mut out);
                }
            }
            "response.output_text.delta" | "response.output_json.delta" | "response.refusal.delta" => {
                self.open(&mut out);
                if let Some(delta) = event.delta_text(&["text", "delta", "partial_json", "json"]) {
                    self.on_text_delta(event, delta, &mut out);
                }
            }
            "response.output_text.done" | "response.output_json.done" | "response.refusal.done" => {
                self.open(&mut out);
                self.on_text_done(event, &mut out);
            }
            "response.reasoning_summary_text.delta" | "response.reasoning_text.delta" => {
                self.open(&mut out);
                if let Some(delta) = event.delta_text(&["text", "delta"]) {
                    self.on_reasoning_delta(event, delta, &mut out);
                }
            }
            "response.reasoning_summary_text.done" | "response.reasoning_text.done" => {
                self.on_reasoning_done(event, &mut out);
            }
            "response.function_call_arguments.delta" => {
                self.open(&mut out);
                if let Some(delta) = event.delta_text(&["partial_json", "text", "arguments", "delta"]) {
                    self.on_arguments_delta(event, delta, &mut out);
                }
            }
            "response.function_call_arguments.done" => {
                self.open(&mut out);
                self.on_arguments_done(event, &mut out);
            }
            "response.output_item.done" => {
                self.open(&mut out);
                if let Some(ref item) = event.item {
                    self.on_item_done(item, event.output_index, &mut out);
                }
            }
            "response.completed" | "response.incomplete" | "response.failed" => {
                self.on_completed(event, &mut out);
            }
            "error" => {
                debug!("upstream stream reported an error event; closing");
                out.extend(self.finish());
            }
            other => debug!(event_type = other, "ignoring stream event"),
        }
        out
    }

    /// Close the stream if `response.completed` never arrived.
    ///
    /// Emits the usage and finish chunks built from whatever was accumulated.
    /// A no-op once the stream has completed.
    pub fn finish(&mut self) -> Vec<ChatCompletionChunk> {
        if self.phase == StreamPhase::Completed {
            return Vec::new();
        }
        if self.phase == StreamPhase::Open {
            debug!(response_id = %self.response_id, "stream closed before completion");
        }
        let mut out = Vec::new();
        self.close(&mut out);
        out
    }

    // -- event handlers -----------------------------------------------------

    fn capture_metadata(&mut self, resp: &ResponseApiResponse) {
        if !resp.id.is_empty() {
            self.response_id = resp.id.clone();
        }
        if !resp.model.is_empty() {
            self.model = resp.model.clone();
        }
        if resp.created_at > 0 {
            self.created = resp.created_at;
        }
        if resp.status.is_some() {
            self.status = resp.status.clone();
        }
    }

    fn open(&mut self, out: &mut Vec<ChatCompletionChunk>) {
        if self.phase == StreamPhase::Idle {
            self.phase = StreamPhase::Open;
        }
        if !self.role_sent {
            self.role_sent = true;
            out.push(self.chunk(
                ChunkDelta {
                    role: Some("assistant".to_string()),
                    content: Some(String::new()),
                    ..ChunkDelta::default()
                },
                None,
            ));
        }
    }

    fn on_item_added(&mut self, item: &OutputItem, output_index: Option<u32>, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(item.id.as_deref(), output_index);
        let kind = ItemKind::of(&item.item_type);
        if kind == ItemKind::FunctionCall {
            let index = self.assign_tool_index(output_index);
            let state = self.slot(&key, kind);
            state.tool_index.get_or_insert(index);
            state.call_id = tool_call_id(item);
            state.name = item.name.clone().unwrap_or_default();
            if let Some(chunk) = self.announce(&key, None) {
                out.push(chunk);
            }
        } else {
            self.slot(&key, kind);
        }
    }

    fn on_text_delta(&mut self, event: &ResponseStreamEvent, delta: String, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(event.item_id.as_deref(), event.output_index);
        let part = event.content_index.unwrap_or(0);
        let state = self.slot(&key, ItemKind::Message);
        state.part_buffers.entry(part).or_default().push_str(&delta);
        state.had_deltas = true;
        self.text.push_str(&delta);
        out.push(self.content_chunk(delta));
    }

    fn on_text_done(&mut self, event: &ResponseStreamEvent, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(event.item_id.as_deref(), event.output_index);
        let part = event.content_index.unwrap_or(0);
        let state = self.slot(&key, ItemKind::Message);
        // Already finalized by `output_item.done`.
        if state.finalized && state.parts_done.is_empty() {
            return;
        }
        if !state.parts_done.insert(part) {
            return;
        }
        let first_part = !state.finalized;
        state.finalized = true;
        let streamed = state.part_buffers.get(&part);
        let emit_whole = streamed.is_none();
        let full = event
            .text
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| streamed.cloned())
            .unwrap_or_default();
        let emit = emit_whole && !full.is_empty();
        if first_part {
            self.record_finalized(key, full.clone());
        } else {
            self.extend_finalized(&key, &full);
        }
        if emit {
            self.text.push_str(&full);
            out.push(self.content_chunk(full));
        }
    }

    fn on_reasoning_delta(&mut self, event: &ResponseStreamEvent, delta: String, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(event.item_id.as_deref(), event.output_index);
        let state = self.slot(&key, ItemKind::Reasoning);
        state.had_deltas = true;
        self.reasoning.push_str(&delta);
        out.push(self.reasoning_chunk(delta));
    }

    fn on_reasoning_done(&mut self, event: &ResponseStreamEvent, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(event.item_id.as_deref(), event.output_index);
        let state = self.slot(&key, ItemKind::Reasoning);
        if state.had_deltas {
            return;
        }
        let Some(text) = event.text.clone().filter(|t| !t.is_empty()) else {
            return;
        };
        state.had_deltas = true;
        self.reasoning.push_str(&text);
        out.push(self.reasoning_chunk(text));
    }

    fn on_arguments_delta(&mut self, event: &ResponseStreamEvent, delta: String, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(event.item_id.as_deref(), event.output_index);
        self.ensure_tool_index(&key, event.output_index);
        let state = self.slot(&key, ItemKind::FunctionCall);
        state.buffer.push_str(&delta);
        state.had_deltas = true;
        if let Some(chunk) = self.announce(&key, Some(delta)) {
            out.push(chunk);
        }
    }

    fn on_arguments_done(&mut self, event: &ResponseStreamEvent, out: &mut Vec<ChatCompletionChunk>) {
        let key = self.key_for(event.item_id.as_deref(), event.output_index);
        self.ensure_tool_index(&key, event.output_index);
        let state = self.slot(&key, ItemKind::FunctionCall);
        if state.finalized {
            return;
        }
        state.finalized = true;
        if state.had_deltas {
            return;
        }
        let arguments = event
            .arguments
            .clone()
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| state.buffer.clone());
        if let Some(chunk) = self.announce(&key, Some(arguments)) {
            out.push(chunk);
        }
    }

    fn on_item_done(&mut self, item: &OutputItem, output_index: Option<u32>, out: &mut Vec<ChatCompletionChunk>) {
        if item.item_type == "web_search_call" {
            self.web_search_calls += count_new_web_search_calls(std::slice::from_ref(item), &mut self.web_search_seen);
            return;
        }

        let key = self.key_for(item.id.as_deref(), output_index);
        let kind = ItemKind::of(&item.item_type);
        if kind == ItemKind::FunctionCall {
            self.ensure_tool_index(&key, output_index);
        }
        let state = self.slot(&key, kind);
        if state.finalized {
            return;
        }
        state.finalized = true;
        let had_deltas = state.had_deltas;

        match kind {
            ItemKind::Message => {
                let full = message_text(item);
                self.record_finalized(key, full.clone());
                if !had_deltas && !full.is_empty() {
                    self.text.push_str(&full);
                    out.push(self.content_chunk(full));
                }
            }
            ItemKind::FunctionCall => {
                if item.name.as_deref().map_or(true, str::is_empty) {
                    return;
                }
                if state.call_id.is_empty() {
                    state.call_id = tool_call_id(item);
                }
                if state.name.is_empty() {
                    state.name = item.name.clone().unwrap_or_default();
                }
                let arguments = (!had_deltas).then(|| item.arguments_string());
                if let Some(chunk) = self.announce(&key, arguments) {
                    out.push(chunk);
                }
            }
            ItemKind::Reasoning => {
                let summary = item.summary_text();
                if !had_deltas && !summary.is_empty() {
                    self.reasoning.push_str(&summary);
                    out.push(self.reasoning_chunk(summary));
                }
            }
            ItemKind::Other => {
                let fragment = mcp_fragment(item);
                if !fragment.is_empty() {
                    self.text.push_str(&fragment);
                    out.push(self.content_chunk(fragment));
                }
            }
        }
    }

    fn on_completed(&mut self, event: &ResponseStreamEvent, out: &mut Vec<ChatCompletionChunk>) {
        self.open(out);
        if let Some(ref resp) = event.response {
            // Items the stream never finalized (no per-item events) still surface once.
            for (index, item) in resp.output.iter().enumerate() {
                let output_index = u32::try_from(index).ok();
                if item.item_type == "function_call" && item.id.is_none() && !self.knows(output_index) {
                    continue;
                }
                self.on_item_done(item, output_index, out);
            }
            self.raw_usage = resp.usage.clone();
            self.usage = usage::reconcile(resp.usage.as_ref());
        }
        if self.status.is_none() {
            self.status = event
                .event_type
                .strip_prefix("response.")
                .map(str::to_string);
        }
        self.completed_normally = true;
        self.close(out);
    }

    /// Emit the single usage chunk and the single finish chunk, then complete.
    fn close(&mut self, out: &mut Vec<ChatCompletionChunk>) {
        let usage = self.final_usage();
        let mut usage_chunk = self.chunk_without_choices();
        usage_chunk.usage = Some(usage);
        out.push(usage_chunk);

        let reason = if self.tool_calls > 0 {
            "tool_calls"
        } else if self.status.as_deref() == Some("incomplete") {
            "length"
        } else {
            "stop"
        };
        out.push(self.chunk(ChunkDelta::default(), Some(reason.to_string())));
        self.phase = StreamPhase::Completed;
    }

    /// Upstream usage when it reported counts; otherwise zero tokens carrying
    /// the web-search invocations seen on the stream.
    fn final_usage(&self) -> ChatUsage {
        if let Some(ref usage) = self.usage {
            return usage.clone();
        }
        let reported = self
            .raw_usage
            .as_ref()
            .map(ResponseUsage::web_search_invocation_count)
            .unwrap_or(0);
        let searches = reported.max(self.web_search_calls as u64);
        let mut usage = ChatUsage::default();
        if searches > 0 {
            usage.prompt_tokens_details = Some(InputTokensDetails {
                web_search: Some(json!({ "requests": searches })),
                ..InputTokensDetails::default()
            });
        }
        usage
    }

    // -- item bookkeeping ---------------------------------------------------

    fn key_for(&mut self, item_id: Option<&str>, output_index: Option<u32>) -> String {
        match (item_id.filter(|id| !id.is_empty()), output_index) {
            (Some(id), Some(index)) => {
                self.keys_by_output_index.entry(index).or_insert_with(|| id.to_string());
                id.to_string()
            }
            (Some(id), None) => id.to_string(),
            (None, Some(index)) => self
                .keys_by_output_index
                .entry(index)
                .or_insert_with(|| format!("output-{index}"))
                .clone(),
            (None, None) => "output".to_string(),
        }
    }

    fn knows(&self, output_index: Option<u32>) -> bool {
        output_index.is_some_and(|i| self.keys_by_output_index.contains_key(&i))
    }

    fn slot(&mut self, key: &str, kind: ItemKind) -> &mut ItemState {
        let state = self
            .items
            .entry(key.to_string())
            .or_insert_with(|| ItemState::new(kind));
        if state.kind == ItemKind::Other && kind != ItemKind::Other {
            state.kind = kind;
        }
        state
    }

    /// An explicit output index is authoritative; otherwise the next free index.
    fn assign_tool_index(&mut self, output_index: Option<u32>) -> u32 {
        match output_index {
            Some(index) => {
                self.next_tool_index = self.next_tool_index.max(index.saturating_add(1));
                index
            }
            None => {
                let index = self.next_tool_index;
                self.next_tool_index = self.next_tool_index.saturating_add(1);
                index
            }
        }
    }

    fn ensure_tool_index(&mut self, key: &str, output_index: Option<u32>) {
        let assigned = self.items.get(key).and_then(|s| s.tool_index);
        if assigned.is_none() {
            let index = self.assign_tool_index(output_index);
            self.slot(key, ItemKind::FunctionCall).tool_index = Some(index);
        }
    }

    fn record_finalized(&mut self, item_id: String, text: String) {
        self.finalized.push(FinalizedItem { item_id, text });
    }

    fn extend_finalized(&mut self, item_id: &str, text: &str) {
        if let Some(entry) = self.finalized.iter_mut().rev().find(|f| f.item_id == item_id) {
            entry.text.push_str(text);
        }
    }

    /// Tool-call chunk for `key`; the first one for an item carries its id and name.
    fn announce(&mut self, key: &str, arguments: Option<String>) -> Option<ChatCompletionChunk> {
        let state = self.items.get_mut(key)?;
        let index = state.tool_index?;
        let first = !state.announced;
        if first && state.name.is_empty() && arguments.is_none() {
            return None;
        }
        let call = ChunkToolCall {
            index,
            id: (first && !state.call_id.is_empty()).then(|| state.call_id.clone()),
            call_type: first.then(|| "function".to_string()),
            function: Some(ChunkToolCallFunction {
                name: (first && !state.name.is_empty()).then(|| state.name.clone()),
                arguments: Some(arguments.unwrap_or_default()),
            }),
        };
        if first {
            state.announced = true;
            self.tool_calls += 1;
        }
        Some(self.chunk(
            ChunkDelta {
                tool_calls: Some(vec![call]),
                ..ChunkDelta::default()
            },
            None,
        ))
    }

    // -- chunk builders -----------------------------------------------------

    fn chunk(&self, delta: ChunkDelta, finish_reason: Option<String>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            ..self.chunk_without_choices()
        }
    }

    fn chunk_without_choices(&self) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.response_id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: Vec::new(),
            usage: None,
        }
    }

    fn content_chunk(&self, text: String) -> ChatCompletionChunk {
        self.chunk(
            ChunkDelta {
                content: Some(text),
                ..ChunkDelta::default()
            },
            None,
        )
    }

    fn reasoning_chunk(&self, text: String) -> ChatCompletionChunk {
        self.chunk(
            ChunkDelta {
                reasoning_content: Some(text),
                ..ChunkDelta::default()
            },
            None,
        )
    }
}

fn tool_call_id(item: &OutputItem) -> String {
    match item.call_id.as_deref().filter(|c| !c.is_empty()) {
        Some(call_id) => call_id.to_string(),
        None => ids::decode_opt(item.id.as_deref(), None),
    }
}

fn message_text(item: &OutputItem) -> String {
    item.content
        .iter()
        .flatten()
        .filter_map(|c| match c {
            ContentItem::Text(_, part) => Some(part.text.clone()),
            ContentItem::Json(part) => Some(json_text(&part.json, &part.extra)),
            _ => None,
        })
        .collect()
}
