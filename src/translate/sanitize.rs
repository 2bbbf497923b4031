//! Content-block sanitation shared by every translator.
//!
//! Selects the role-dependent text tag, converts Chat Completions parts into
//! Responses API content, strips fields the target rejects, flattens image URLs,
//! turns reasoning history into plain summaries, and redacts oversized inline
//! base64 payloads from assistant text.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::chat_types::{ChatContent, ChatMessage, ContentPart, ImageUrl, ReasoningPart, TextPart};
use super::responses_types::{ContentItem, InputFilePart, InputImagePart};
use super::Protocol;

/// Fields no downstream protocol accepts on a content block.
const STRIPPED_FIELDS: &[&str] = &["cache_control", "encrypted_content"];

/// Default size above which an inline base64 payload in assistant text is redacted.
pub const DEFAULT_REDACTION_THRESHOLD: usize = 4096;

static DATA_URL_PAYLOAD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:[A-Za-z0-9.+/-]*(?:;[A-Za-z0-9=.+-]+)*;base64,([A-Za-z0-9+/_-]+=*)")
        .expect("data URL pattern is valid")
});

/// Serialized tag of a text block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextTag {
    Text,
    InputText,
    OutputText,
}

impl TextTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextTag::Text => "text",
            TextTag::InputText => "input_text",
            TextTag::OutputText => "output_text",
        }
    }
}

/// The text tag for a block authored by `role` under `protocol`.
///
/// The Responses API distinguishes model output (`output_text`) from everything
/// else (`input_text`); the other protocols use a single `text` tag.
pub fn select_text_tag(role: &str, protocol: Protocol) -> TextTag {
    match protocol {
        Protocol::ResponseApi if role.trim().eq_ignore_ascii_case("assistant") => {
            TextTag::OutputText
        }
        Protocol::ResponseApi => TextTag::InputText,
        Protocol::ChatCompletions | Protocol::ClaudeMessages => TextTag::Text,
    }
}

/// Convert one Chat Completions part into zero or more Responses API content blocks.
///
/// Reasoning parts become a single text block holding their summary (or direct
/// text), or vanish when neither exists. Other parts lose `cache_control` and
/// `encrypted_content` and otherwise pass through.
pub fn sanitize_block(part: &ContentPart, role: &str) -> Vec<ContentItem> {
    let tag = select_text_tag(role, Protocol::ResponseApi);
    match part {
        ContentPart::Text(p) => vec![ContentItem::Text(
            tag,
            TextPart {
                text: p.text.clone(),
                extra: strip_fields(&p.extra),
            },
        )],
        ContentPart::ImageUrl(p) => {
            let (url, detail) = flatten_image_url(&p.image_url);
            let mut extra = strip_fields(&p.extra);
            let detail = detail.or_else(|| {
                extra
                    .remove("detail")
                    .and_then(|d| d.as_str().map(str::to_string))
            });
            vec![ContentItem::Image(InputImagePart {
                image_url: Some(url),
                detail,
                file_id: None,
                extra,
            })]
        }
        ContentPart::InputAudio(p) => {
            let mut audio = p.clone();
            audio.extra = strip_fields(&p.extra);
            vec![ContentItem::Audio(audio)]
        }
        ContentPart::File(p) => {
            let field = |key: &str| {
                p.file
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            vec![ContentItem::File(InputFilePart {
                file_id: field("file_id"),
                file_url: field("file_url"),
                file_data: field("file_data"),
                filename: field("filename"),
                extra: strip_fields(&p.extra),
            })]
        }
        ContentPart::Reasoning(p) => reasoning_to_text(p)
            .map(|text| vec![ContentItem::text(tag, text)])
            .unwrap_or_default(),
        ContentPart::Other(v) => vec![ContentItem::Other(strip_value_fields(v))],
    }
}

/// Flattened form of a reasoning block: its summary, else its text.
pub fn reasoning_to_text(part: &ReasoningPart) -> Option<String> {
    part.summary_text()
        .or_else(|| part.text.clone().filter(|t| !t.trim().is_empty()))
}

/// Bare URL and hoisted detail of an image reference. Data URIs are returned verbatim.
pub fn flatten_image_url(image: &ImageUrl) -> (String, Option<String>) {
    match image {
        ImageUrl::Url(url) => (url.clone(), None),
        ImageUrl::Object(obj) => (obj.url.clone(), obj.detail.clone()),
    }
}

fn strip_fields(extra: &Map<String, Value>) -> Map<String, Value> {
    extra
        .iter()
        .filter(|(k, _)| !STRIPPED_FIELDS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn strip_value_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(strip_fields(map)),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

/// Result of scanning text for oversized inline base64 payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redaction {
    pub text: String,
    pub changed: bool,
    pub redacted_bytes: usize,
}

/// Replace inline base64 payloads longer than `threshold_bytes` with a
/// placeholder carrying the original length. Only the payload after `base64,`
/// is replaced; the `data:` prefix and surrounding text stay intact.
pub fn redact_embedded_data_urls(text: &str, threshold_bytes: usize) -> Redaction {
    let mut redacted_bytes = 0usize;
    let mut out = String::with_capacity(text.len());
    let mut last = 0usize;

    for caps in DATA_URL_PAYLOAD.captures_iter(text) {
        let Some(payload) = caps.get(1) else {
            continue;
        };
        let len = payload.end() - payload.start();
        if len <= threshold_bytes {
            continue;
        }
        out.push_str(&text[last..payload.start()]);
        out.push_str(&format!("[truncated base64 len={len}]"));
        last = payload.end();
        redacted_bytes += len;
    }

    if redacted_bytes == 0 {
        return Redaction {
            text: text.to_string(),
            changed: false,
            redacted_bytes: 0,
        };
    }
    out.push_str(&text[last..]);
    Redaction {
        text: out,
        changed: true,
        redacted_bytes,
    }
}

// ---------------------------------------------------------------------------
// Diagnostics helpers
// ---------------------------------------------------------------------------

/// Whether the Responses API accepts `field` on a content block of `content_type`.
pub fn response_api_field_allowed(content_type: &str, field: &str) -> bool {
    let allowed: &[&str] = match content_type.trim().to_ascii_lowercase().as_str() {
        "input_text" | "output_text" | "text" => &["type", "text"],
        "input_image" | "image_url" => &["type", "image_url", "detail", "file_id"],
        "input_audio" => &["type", "input_audio"],
        "input_file" => &["type", "file_id", "file_url", "file_data", "filename"],
        _ => &["type", "text"],
    };
    allowed.contains(&field)
}

/// Count content-block fields of `message` that `allowed` rejects. Never mutates.
pub fn count_unsupported_fields(
    message: &ChatMessage,
    allowed: impl Fn(&str, &str) -> bool,
) -> usize {
    let Some(ChatContent::Parts(parts)) = message.content.as_ref() else {
        return 0;
    };
    parts
        .iter()
        .filter_map(|part| serde_json::to_value(part).ok())
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .map(|map| {
            let content_type = map.get("type").and_then(Value::as_str).unwrap_or("");
            map.keys()
                .filter(|field| !allowed(content_type, field))
                .count()
        })
        .sum()
}
