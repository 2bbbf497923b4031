//! Type definitions for the Responses API.
//!
//! The request `input` is an ordered list of heterogeneous items. Items and their
//! content are decoded by dispatching on the `type` tag into explicit variants;
//! anything unrecognized is carried as raw JSON rather than dropped.

use serde::de::{DeserializeOwned, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::chat_types::{
    split_type_tag, with_type_tag, AudioPart, ChatToolCall, FunctionDefinition, ReasoningPart,
    TextPart,
};
use super::sanitize::TextTag;
use super::usage::ResponseUsage;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseApiRequest {
    pub model: String,
    #[serde(default)]
    pub input: ResponseApiInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ResponseApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<TextConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    /// Reference to a stored prompt template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Ordered request input. A lone string item serializes as a bare JSON string;
/// every other shape serializes as an array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseApiInput(pub Vec<InputItem>);

#[derive(Debug, Clone, PartialEq)]
pub enum InputItem {
    Text(String),
    Message(InputMessage),
    FunctionCall(FunctionCallItem),
    FunctionCallOutput(FunctionCallOutputItem),
    Reasoning(ReasoningPart),
    /// An item of a type this crate cannot represent, kept verbatim.
    Unrecognized(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputMessage {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Items(Vec<ContentItem>),
    /// Neither a string nor an array.
    Invalid(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `Some` whenever the key is present, even as `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallOutputItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// `Some` whenever the key is present, even as `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Some clients put the result here instead of `output`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Content items
// ---------------------------------------------------------------------------

/// One content block inside a Responses API message.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentItem {
    Text(TextTag, TextPart),
    Image(InputImagePart),
    Audio(AudioPart),
    File(InputFilePart),
    Json(JsonPart),
    Refusal(RefusalPart),
    Reasoning(ReasoningPart),
    Other(Value),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputImagePart {
    /// Always a bare string here, never the nested Chat Completions object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFilePart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonPart {
    #[serde(default)]
    pub json: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefusalPart {
    #[serde(default)]
    pub refusal: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentItem {
    pub fn text(tag: TextTag, text: impl Into<String>) -> Self {
        ContentItem::Text(
            tag,
            TextPart {
                text: text.into(),
                extra: Map::new(),
            },
        )
    }

    pub fn type_tag(&self) -> &str {
        match self {
            ContentItem::Text(tag, _) => tag.as_str(),
            ContentItem::Image(_) => "input_image",
            ContentItem::Audio(_) => "input_audio",
            ContentItem::File(_) => "input_file",
            ContentItem::Json(_) => "output_json",
            ContentItem::Refusal(_) => "refusal",
            ContentItem::Reasoning(_) => "reasoning",
            ContentItem::Other(v) => v.get("type").and_then(Value::as_str).unwrap_or(""),
        }
    }

    fn from_value(value: Value) -> Self {
        let Some((tag, body)) = split_type_tag(&value) else {
            return ContentItem::Other(value);
        };
        let parsed = match tag.as_str() {
            "input_text" => serde_json::from_value(body).map(|p| ContentItem::Text(TextTag::InputText, p)),
            "output_text" => serde_json::from_value(body).map(|p| ContentItem::Text(TextTag::OutputText, p)),
            "text" => serde_json::from_value(body).map(|p| ContentItem::Text(TextTag::Text, p)),
            "input_image" => serde_json::from_value(body).map(ContentItem::Image),
            "input_audio" => serde_json::from_value(body).map(ContentItem::Audio),
            "input_file" => serde_json::from_value(body).map(ContentItem::File),
            "output_json" => serde_json::from_value(body).map(ContentItem::Json),
            "refusal" => serde_json::from_value(body).map(ContentItem::Refusal),
            "reasoning" => serde_json::from_value(body).map(ContentItem::Reasoning),
            _ => return ContentItem::Other(value),
        };
        parsed.unwrap_or(ContentItem::Other(value))
    }
}

impl Serialize for ContentItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            ContentItem::Text(_, p) => serde_json::to_value(p),
            ContentItem::Image(p) => serde_json::to_value(p),
            ContentItem::Audio(p) => serde_json::to_value(p),
            ContentItem::File(p) => serde_json::to_value(p),
            ContentItem::Json(p) => serde_json::to_value(p),
            ContentItem::Refusal(p) => serde_json::to_value(p),
            ContentItem::Reasoning(p) => serde_json::to_value(p),
            ContentItem::Other(v) => return v.serialize(serializer),
        }
        .map_err(serde::ser::Error::custom)?;
        with_type_tag(self.type_tag(), body).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(ContentItem::from_value)
    }
}

// ---------------------------------------------------------------------------
// Input items
// ---------------------------------------------------------------------------

impl InputItem {
    /// Decode one input element by its `type` tag. Objects without a tag are messages.
    pub fn from_value(value: Value) -> Self {
        let item_type = match &value {
            Value::String(s) => return InputItem::Text(s.clone()),
            Value::Object(map) => map.get("type").and_then(Value::as_str).map(str::to_string),
            _ => return InputItem::Unrecognized(value),
        };

        let body = || split_type_tag(&value).map(|(_, body)| body);
        let parsed = match item_type.as_deref() {
            None | Some("message") => decode_lenient(value.clone()).map(InputItem::Message),
            Some("function_call") => body().and_then(decode_lenient).map(InputItem::FunctionCall),
            Some("function_call_output") => {
                body().and_then(decode_lenient).map(InputItem::FunctionCallOutput)
            }
            Some("reasoning") => body().and_then(decode_lenient).map(InputItem::Reasoning),
            Some(_) => None,
        };
        parsed.unwrap_or(InputItem::Unrecognized(value))
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        Ok(match self {
            InputItem::Text(s) => Value::String(s.clone()),
            InputItem::Message(m) => serde_json::to_value(m)?,
            InputItem::FunctionCall(f) => with_type_tag("function_call", serde_json::to_value(f)?),
            InputItem::FunctionCallOutput(f) => {
                with_type_tag("function_call_output", serde_json::to_value(f)?)
            }
            InputItem::Reasoning(r) => with_type_tag("reasoning", serde_json::to_value(r)?),
            InputItem::Unrecognized(v) => v.clone(),
        })
    }

    /// The wire `type` of the item, or the JSON kind for untyped garbage.
    pub fn type_name(&self) -> String {
        match self {
            InputItem::Text(_) => "string".to_string(),
            InputItem::Message(_) => "message".to_string(),
            InputItem::FunctionCall(_) => "function_call".to_string(),
            InputItem::FunctionCallOutput(_) => "function_call_output".to_string(),
            InputItem::Reasoning(_) => "reasoning".to_string(),
            InputItem::Unrecognized(v) => v
                .get("type")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| super::json_kind(v).to_string()),
        }
    }
}

/// Decode a known item body, treating fields of the wrong JSON type as absent.
fn decode_lenient<T: DeserializeOwned>(body: Value) -> Option<T> {
    let Value::Object(map) = body else {
        return None;
    };
    if let Ok(parsed) = serde_json::from_value(Value::Object(map.clone())) {
        return Some(parsed);
    }
    let kept: Map<String, Value> = map
        .into_iter()
        .filter(|(key, value)| {
            let single = Map::from_iter([(key.clone(), value.clone())]);
            let fits = serde_json::from_value::<T>(Value::Object(single)).is_ok();
            if !fits {
                tracing::debug!(field = %key, kind = super::json_kind(value), "ignoring mistyped input item field");
            }
            fits
        })
        .collect();
    serde_json::from_value(Value::Object(kept)).ok()
}

/// Keeps an explicit `null` distinguishable from a missing key.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl Serialize for InputItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InputItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(InputItem::from_value)
    }
}

impl Serialize for ResponseApiInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let [InputItem::Text(text)] = self.0.as_slice() {
            return serializer.serialize_str(text);
        }
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for item in &self.0 {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for ResponseApiInput {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = match Value::deserialize(deserializer)? {
            Value::Null => Vec::new(),
            Value::Array(values) => values.into_iter().map(InputItem::from_value).collect(),
            other => vec![InputItem::from_value(other)],
        };
        Ok(ResponseApiInput(items))
    }
}

impl ResponseApiInput {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, item: InputItem) {
        self.0.push(item);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, InputItem> {
        self.0.iter()
    }
}

impl From<Vec<InputItem>> for ResponseApiInput {
    fn from(items: Vec<InputItem>) -> Self {
        ResponseApiInput(items)
    }
}

impl InputMessage {
    pub fn new(role: impl Into<String>, content: MessageContent) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(content),
            ..Self::default()
        }
    }

    /// Role with the protocol default applied.
    pub fn role(&self) -> &str {
        self.role
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or("user")
    }
}

// ---------------------------------------------------------------------------
// Tools
// ---------------------------------------------------------------------------

/// A tool definition. Function tools keep one canonical [`FunctionDefinition`];
/// the legacy flat `name`/`description`/`parameters` fields are a view derived
/// from it on encode and folded into it on decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseApiTool {
    pub tool_type: String,
    pub function: Option<FunctionDefinition>,
    pub search_context_size: Option<String>,
    pub filters: Option<Value>,
    pub user_location: Option<Value>,
    pub server_label: Option<String>,
    pub server_url: Option<String>,
    pub require_approval: Option<Value>,
    pub allowed_tools: Option<Value>,
    pub headers: Option<Value>,
    /// Fields of tool types this crate does not model.
    pub extra: Map<String, Value>,
}

/// Legacy flat view over a function tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LegacyFunctionView<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub parameters: Option<&'a Value>,
}

#[derive(Deserialize)]
struct RawTool {
    #[serde(rename = "type", default)]
    tool_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<Value>,
    #[serde(default)]
    strict: Option<bool>,
    #[serde(default)]
    function: Option<FunctionDefinition>,
    #[serde(default)]
    search_context_size: Option<String>,
    #[serde(default)]
    filters: Option<Value>,
    #[serde(default)]
    user_location: Option<Value>,
    #[serde(default)]
    server_label: Option<String>,
    #[serde(default)]
    server_url: Option<String>,
    #[serde(default)]
    require_approval: Option<Value>,
    #[serde(default)]
    allowed_tools: Option<Value>,
    #[serde(default)]
    headers: Option<Value>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl ResponseApiTool {
    pub fn function(def: FunctionDefinition) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: Some(def),
            ..Self::default()
        }
    }

    pub fn is_function(&self) -> bool {
        self.tool_type.trim().eq_ignore_ascii_case("function")
    }

    pub fn legacy_view(&self) -> Option<LegacyFunctionView<'_>> {
        let def = self.function.as_ref()?;
        Some(LegacyFunctionView {
            name: def.name.as_str(),
            description: def.description.as_deref(),
            parameters: def.parameters.as_ref(),
        })
    }

    fn from_raw(raw: RawTool) -> Self {
        let legacy_present =
            raw.name.is_some() || raw.description.is_some() || raw.parameters.is_some();
        let function = match raw.function {
            Some(mut def) => {
                if def.name.is_empty() {
                    def.name = raw.name.clone().unwrap_or_default();
                }
                if def.description.is_none() {
                    def.description = raw.description.clone();
                }
                if def.parameters.is_none() {
                    def.parameters = raw.parameters.clone();
                }
                if def.strict.is_none() {
                    def.strict = raw.strict;
                }
                Some(def)
            }
            None if raw.tool_type == "function" && legacy_present => Some(FunctionDefinition {
                name: raw.name.unwrap_or_default(),
                description: raw.description,
                parameters: raw.parameters,
                strict: raw.strict,
            }),
            None => None,
        };
        Self {
            tool_type: raw.tool_type,
            function,
            search_context_size: raw.search_context_size,
            filters: raw.filters,
            user_location: raw.user_location,
            server_label: raw.server_label,
            server_url: raw.server_url,
            require_approval: raw.require_approval,
            allowed_tools: raw.allowed_tools,
            headers: raw.headers,
            extra: raw.extra,
        }
    }

    fn to_map(&self) -> Result<Map<String, Value>, serde_json::Error> {
        let mut out = Map::new();
        let mut put = |key: &str, value: Option<Value>| {
            if let Some(v) = value {
                out.insert(key.to_string(), v);
            }
        };
        put("type", Some(Value::String(self.tool_type.clone())));

        match self.tool_type.trim().to_ascii_lowercase().as_str() {
            "function" => {
                if let Some(def) = self.function.as_ref() {
                    let name = def.name.trim();
                    put("name", (!name.is_empty()).then(|| Value::String(name.to_string())));
                    put(
                        "description",
                        def.description
                            .as_deref()
                            .map(str::trim)
                            .filter(|d| !d.is_empty())
                            .map(|d| Value::String(d.to_string())),
                    );
                    put(
                        "parameters",
                        def.parameters
                            .clone()
                            .filter(|p| p.as_object().map(|m| !m.is_empty()).unwrap_or(false)),
                    );
                    put("strict", def.strict.map(Value::Bool));
                    put("function", Some(serde_json::to_value(def)?));
                }
            }
            "web_search" | "web_search_preview" => {
                put("search_context_size", self.search_context_size.clone().map(Value::String));
                put("filters", self.filters.clone());
                put("user_location", self.user_location.clone());
            }
            "mcp" => {
                put("server_label", self.server_label.clone().map(Value::String));
                put("server_url", self.server_url.clone().map(Value::String));
                put("require_approval", self.require_approval.clone());
                put("allowed_tools", self.allowed_tools.clone());
                put("headers", self.headers.clone());
            }
            _ => {
                if let Some(def) = self.function.as_ref() {
                    put("function", Some(serde_json::to_value(def)?));
                }
                put("search_context_size", self.search_context_size.clone().map(Value::String));
                put("filters", self.filters.clone());
                put("user_location", self.user_location.clone());
                put("server_label", self.server_label.clone().map(Value::String));
                put("server_url", self.server_url.clone().map(Value::String));
                put("require_approval", self.require_approval.clone());
                put("allowed_tools", self.allowed_tools.clone());
                put("headers", self.headers.clone());
                for (k, v) in &self.extra {
                    out.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
        Ok(out)
    }
}

impl Serialize for ResponseApiTool {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResponseApiTool {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawTool::deserialize(deserializer).map(ResponseApiTool::from_raw)
    }
}

// ---------------------------------------------------------------------------
// Text and reasoning configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextFormat {
    #[serde(rename = "type")]
    pub format_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseApiResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<ResponseUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_action: Option<RequiredAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete_details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of a response's `output`. A single tolerant shape covers every
/// item type; fields irrelevant to a given type are simply absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Vec<SummaryEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type", default)]
    pub action_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    #[serde(default)]
    pub tool_calls: Vec<ChatToolCall>,
}

impl OutputItem {
    /// Arguments as the JSON-encoded string Chat Completions expects.
    pub fn arguments_string(&self) -> String {
        self.arguments
            .as_ref()
            .map(super::stringify_value)
            .unwrap_or_default()
    }

    /// Joined `summary_text` entries of a reasoning item.
    pub fn summary_text(&self) -> String {
        self.summary
            .iter()
            .flatten()
            .filter(|s| s.entry_type == "summary_text" || s.entry_type.is_empty())
            .map(|s| s.text.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Streaming events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseStreamEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseApiResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<OutputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_index: Option<u32>,
    /// Usually a string; some vendors send an object such as `{"partial_json": ..}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseStreamEvent {
    /// The delta payload as text. Object deltas yield the first of `keys` present.
    pub fn delta_text(&self, keys: &[&str]) -> Option<String> {
        let text = match self.delta.as_ref()? {
            Value::String(s) => s.clone(),
            Value::Object(map) => keys
                .iter()
                .find_map(|k| map.get(*k))
                .map(super::stringify_value)?,
            Value::Null => return None,
            other => super::stringify_value(other),
        };
        (!text.is_empty()).then_some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_string_input_is_bare_string() {
        let input = ResponseApiInput(vec![InputItem::Text("hello".to_string())]);
        assert_eq!(serde_json::to_string(&input).unwrap(), r#""hello""#);
    }

    #[test]
    fn test_other_inputs_are_arrays() {
        let two = ResponseApiInput(vec![
            InputItem::Text("a".to_string()),
            InputItem::Text("b".to_string()),
        ]);
        assert_eq!(serde_json::to_string(&two).unwrap(), r#"["a","b"]"#);

        let one_message = ResponseApiInput(vec![InputItem::Message(InputMessage::new(
            "user",
            MessageContent::Text("hi".to_string()),
        ))]);
        assert_eq!(
            serde_json::to_value(&one_message).unwrap(),
            json!([{"role": "user", "content": "hi"}])
        );

        assert_eq!(serde_json::to_string(&ResponseApiInput::default()).unwrap(), "[]");
    }

    #[test]
    fn test_input_round_trip_is_stable() {
        for raw in [r#""hello""#, r#"["a","b"]"#, r#"["only"]"#] {
            let input: ResponseApiInput = serde_json::from_str(raw).unwrap();
            let once = serde_json::to_string(&input).unwrap();
            let again: ResponseApiInput = serde_json::from_str(&once).unwrap();
            assert_eq!(serde_json::to_string(&again).unwrap(), once);
        }
        // A one-element string array collapses to the bare form.
        let input: ResponseApiInput = serde_json::from_str(r#"["only"]"#).unwrap();
        assert_eq!(serde_json::to_string(&input).unwrap(), r#""only""#);
    }

    #[test]
    fn test_input_item_dispatch() {
        let input: ResponseApiInput = serde_json::from_value(json!([
            "plain",
            {"role": "user", "content": [{"type": "input_text", "text": "hi"}]},
            {"type": "function_call", "call_id": "call_1", "name": "ls", "arguments": "{}"},
            {"type": "function_call_output", "call_id": "call_1", "output": "ok"},
            {"type": "reasoning", "summary": [{"type": "summary_text", "text": "t"}]},
            {"type": "computer_call", "action": {}},
            42
        ]))
        .unwrap();

        assert!(matches!(input.0[0], InputItem::Text(_)));
        assert!(matches!(input.0[1], InputItem::Message(_)));
        assert!(matches!(input.0[2], InputItem::FunctionCall(_)));
        assert!(matches!(input.0[3], InputItem::FunctionCallOutput(_)));
        assert!(matches!(input.0[4], InputItem::Reasoning(_)));
        assert!(matches!(input.0[5], InputItem::Unrecognized(_)));
        assert_eq!(input.0[5].type_name(), "computer_call");
        assert_eq!(input.0[6].type_name(), "number");
    }

    #[test]
    fn test_function_call_item_keeps_type_tag() {
        let raw = json!({"type": "function_call", "id": "fc_1", "call_id": "call_1", "name": "ls", "arguments": "{}"});
        let item: InputItem = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }

    #[test]
    fn test_legacy_tool_folds_into_function() {
        let tool: ResponseApiTool = serde_json::from_value(json!({
            "type": "function",
            "name": "get_weather",
            "description": "Weather lookup",
            "parameters": {"type": "object", "properties": {}}
        }))
        .unwrap();
        let view = tool.legacy_view().unwrap();
        assert_eq!(view.name, "get_weather");
        assert_eq!(view.description, Some("Weather lookup"));

        let out = serde_json::to_value(&tool).unwrap();
        assert_eq!(out["name"], "get_weather");
        assert_eq!(out["function"]["name"], "get_weather");
        assert_eq!(out["parameters"], out["function"]["parameters"]);
    }

    #[test]
    fn test_modern_tool_fills_legacy_view() {
        let tool: ResponseApiTool = serde_json::from_value(json!({
            "type": "function",
            "function": {"name": "search", "parameters": {"type": "object"}}
        }))
        .unwrap();
        let out = serde_json::to_value(&tool).unwrap();
        assert_eq!(out["name"], "search");
        assert_eq!(out["parameters"], json!({"type": "object"}));
    }

    #[test]
    fn test_mcp_tool_serializes_dedicated_fields_only() {
        let tool: ResponseApiTool = serde_json::from_value(json!({
            "type": "mcp",
            "server_label": "deepwiki",
            "server_url": "https://mcp.deepwiki.com/mcp",
            "require_approval": "never"
        }))
        .unwrap();
        let out = serde_json::to_value(&tool).unwrap();
        assert_eq!(
            out,
            json!({
                "type": "mcp",
                "server_label": "deepwiki",
                "server_url": "https://mcp.deepwiki.com/mcp",
                "require_approval": "never"
            })
        );
    }

    #[test]
    fn test_stream_event_delta_shapes() {
        let plain: ResponseStreamEvent =
            serde_json::from_value(json!({"type": "response.output_text.delta", "delta": "Hel"})).unwrap();
        assert_eq!(plain.delta_text(&["text"]).as_deref(), Some("Hel"));

        let nested: ResponseStreamEvent = serde_json::from_value(
            json!({"type": "response.function_call_arguments.delta", "delta": {"partial_json": "{\"a\""}}),
        )
        .unwrap();
        assert_eq!(nested.delta_text(&["partial_json", "text"]).as_deref(), Some("{\"a\""));

        let empty: ResponseStreamEvent =
            serde_json::from_value(json!({"type": "response.output_text.delta", "delta": ""})).unwrap();
        assert_eq!(empty.delta_text(&["text"]), None);
    }

    #[test]
    fn test_content_items_keep_unknown_types() {
        let raw = json!({"type": "input_video", "video_url": "x"});
        let item: ContentItem = serde_json::from_value(raw.clone()).unwrap();
        assert!(matches!(item, ContentItem::Other(_)));
        assert_eq!(serde_json::to_value(&item).unwrap(), raw);
    }
}
