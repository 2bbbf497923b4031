//! Token usage records for both OpenAI protocols and the conversion between them.
//!
//! Detail objects are "known fields + opaque remainder": counts we understand are
//! coerced into integers, everything else rides along in `additional` so a
//! conversion round trip never drops fields added by a vendor later on.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Usage as reported by the Responses API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens_details: Option<InputTokensDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens_details: Option<OutputTokensDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Canonical usage record, shaped the way Chat Completions reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<InputTokensDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<OutputTokensDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputTokensDetails {
    pub cached_tokens: u64,
    pub audio_tokens: u64,
    pub text_tokens: u64,
    pub image_tokens: u64,
    /// Raw web-search accounting; its shape varies by vendor.
    pub web_search: Option<Value>,
    pub additional: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputTokensDetails {
    pub reasoning_tokens: u64,
    pub audio_tokens: u64,
    pub accepted_prediction_tokens: u64,
    pub rejected_prediction_tokens: u64,
    pub text_tokens: u64,
    pub cached_tokens: u64,
    pub additional: Map<String, Value>,
}

impl<'de> Deserialize<'de> for InputTokensDetails {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut details = InputTokensDetails::default();
        for (key, value) in raw {
            match key.as_str() {
                "cached_tokens" => details.cached_tokens = coerce_non_negative(&value),
                "audio_tokens" => details.audio_tokens = coerce_non_negative(&value),
                "text_tokens" => details.text_tokens = coerce_non_negative(&value),
                "image_tokens" => details.image_tokens = coerce_non_negative(&value),
                "web_search" if !value.is_null() => details.web_search = Some(value),
                _ => {
                    details.additional.insert(key, value);
                }
            }
        }
        Ok(details)
    }
}

impl Serialize for InputTokensDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut raw = self.additional.clone();
        put_count(&mut raw, "cached_tokens", self.cached_tokens);
        put_count(&mut raw, "audio_tokens", self.audio_tokens);
        put_count(&mut raw, "text_tokens", self.text_tokens);
        put_count(&mut raw, "image_tokens", self.image_tokens);
        if let Some(ref web_search) = self.web_search {
            raw.insert("web_search".to_string(), web_search.clone());
        }
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OutputTokensDetails {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        let mut details = OutputTokensDetails::default();
        for (key, value) in raw {
            match key.as_str() {
                "reasoning_tokens" => details.reasoning_tokens = coerce_non_negative(&value),
                "audio_tokens" => details.audio_tokens = coerce_non_negative(&value),
                "accepted_prediction_tokens" => {
                    details.accepted_prediction_tokens = coerce_non_negative(&value)
                }
                "rejected_prediction_tokens" => {
                    details.rejected_prediction_tokens = coerce_non_negative(&value)
                }
                "text_tokens" => details.text_tokens = coerce_non_negative(&value),
                "cached_tokens" => details.cached_tokens = coerce_non_negative(&value),
                _ => {
                    details.additional.insert(key, value);
                }
            }
        }
        Ok(details)
    }
}

impl Serialize for OutputTokensDetails {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut raw = self.additional.clone();
        put_count(&mut raw, "reasoning_tokens", self.reasoning_tokens);
        put_count(&mut raw, "audio_tokens", self.audio_tokens);
        put_count(&mut raw, "accepted_prediction_tokens", self.accepted_prediction_tokens);
        put_count(&mut raw, "rejected_prediction_tokens", self.rejected_prediction_tokens);
        put_count(&mut raw, "text_tokens", self.text_tokens);
        put_count(&mut raw, "cached_tokens", self.cached_tokens);
        raw.serialize(serializer)
    }
}

fn put_count(raw: &mut Map<String, Value>, key: &str, count: u64) {
    if count != 0 {
        raw.insert(key.to_string(), Value::from(count));
    }
}

impl InputTokensDetails {
    pub fn web_search_invocation_count(&self) -> u64 {
        self.web_search
            .as_ref()
            .map(web_search_invocation_count)
            .unwrap_or(0)
    }
}

impl ResponseUsage {
    /// Whether any token count was actually reported.
    pub fn has_counts(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0 || self.total_tokens > 0
    }

    pub fn web_search_invocation_count(&self) -> u64 {
        self.input_tokens_details
            .as_ref()
            .map(InputTokensDetails::web_search_invocation_count)
            .unwrap_or(0)
    }
}

impl ChatUsage {
    pub fn has_counts(&self) -> bool {
        self.prompt_tokens > 0 || self.completion_tokens > 0 || self.total_tokens > 0
    }
}

/// Map a Responses API usage record onto the canonical form.
///
/// Detail objects move across whole, so their opaque remainder survives.
/// A missing total is derived from input plus output.
pub fn from_vendor_usage(raw: &ResponseUsage) -> ChatUsage {
    let total_tokens = if raw.total_tokens > 0 {
        raw.total_tokens
    } else {
        raw.input_tokens.saturating_add(raw.output_tokens)
    };
    ChatUsage {
        prompt_tokens: raw.input_tokens,
        completion_tokens: raw.output_tokens,
        total_tokens,
        prompt_tokens_details: raw.input_tokens_details.clone(),
        completion_tokens_details: raw.output_tokens_details.clone(),
        extra: raw.extra.clone(),
    }
}

/// Inverse of [`from_vendor_usage`]. Only carries what the canonical record holds;
/// absent details stay absent.
pub fn to_vendor_usage(canonical: &ChatUsage) -> ResponseUsage {
    ResponseUsage {
        input_tokens: canonical.prompt_tokens,
        output_tokens: canonical.completion_tokens,
        total_tokens: canonical.total_tokens,
        input_tokens_details: canonical.prompt_tokens_details.clone(),
        output_tokens_details: canonical.completion_tokens_details.clone(),
        extra: canonical.extra.clone(),
    }
}

/// Canonical usage for a response, or `None` when the upstream reported nothing.
pub fn reconcile(raw: Option<&ResponseUsage>) -> Option<ChatUsage> {
    raw.filter(|u| u.has_counts()).map(from_vendor_usage)
}

/// Coerce a count-like JSON value to a non-negative integer. Numbers are rounded,
/// numeric strings parsed after trimming; anything else is zero.
pub fn coerce_non_negative(value: &Value) -> u64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(f) if f.is_finite() && f > 0.0 => f.round() as u64,
        _ => 0,
    }
}

/// Keys that name a web-search request count, checked case-insensitively in order.
const WEB_SEARCH_COUNT_KEYS: &[&str] = &[
    "requests",
    "request_count",
    "count",
    "total_requests",
    "queries",
    "query_count",
    "calls",
    "invocations",
];

/// Number of web-search invocations described by a vendor's raw accounting value.
///
/// Integers and numeric strings count as themselves; arrays sum their positive
/// counts and fall back to their length; maps prefer a count-like key, then the
/// first nested value that yields a count. Nothing here panics on odd shapes.
pub fn web_search_invocation_count(raw: &Value) -> u64 {
    match raw {
        Value::Null | Value::Bool(_) => 0,
        Value::Number(_) | Value::String(_) => coerce_non_negative(raw),
        Value::Array(items) => {
            let total = items
                .iter()
                .map(web_search_invocation_count)
                .fold(0u64, u64::saturating_add);
            if total > 0 {
                total
            } else {
                items.len() as u64
            }
        }
        Value::Object(map) => {
            for key in WEB_SEARCH_COUNT_KEYS {
                let hit = map
                    .iter()
                    .filter(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| web_search_invocation_count(v))
                    .find(|count| *count > 0);
                if let Some(count) = hit {
                    return count;
                }
            }
            map.values()
                .map(web_search_invocation_count)
                .find(|count| *count > 0)
                .unwrap_or(0)
        }
    }
}
