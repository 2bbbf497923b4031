//! Read-only model capability lookups.
//!
//! Decides which models accept reasoning settings, which effort levels they take,
//! how their reasoning summaries should be requested, and which models can only be
//! served through Chat Completions.

const DEFAULT_REASONING_EFFORT: &str = "medium";
const REASONING_EFFORTS: &[&str] = &["low", "medium", "high"];

/// Lower-cased model name with any `vendor/` routing prefix removed.
fn normalized(model: &str) -> String {
    let lower = model.trim().to_ascii_lowercase();
    match lower.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => lower,
    }
}

/// `o1`, `o3-mini`, `o4-mini-deep-research` and friends.
fn is_o_series(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Numeric version of a `gpt-N[.M]…` model name.
fn gpt_version(model: &str) -> Option<f64> {
    let rest = normalized(model).strip_prefix("gpt-")?.to_string();
    let end = rest
        .find(|c: char| !(c == '.' || c.is_ascii_digit()))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    rest[..end].parse().ok()
}

/// Whether the model accepts a `reasoning` block.
pub fn is_reasoning_model(model: &str) -> bool {
    let name = normalized(model);
    if is_o_series(&name) {
        return true;
    }
    match gpt_version(&name) {
        Some(v) if v >= 5.0 => !(name.starts_with("gpt-5-chat-latest") || name == "gpt-5-chat"),
        _ => false,
    }
}

fn is_medium_only(model: &str) -> bool {
    let name = normalized(model);
    if name.is_empty() {
        return false;
    }
    if name.contains("deep-research") || is_o_series(&name) {
        return true;
    }
    matches!(gpt_version(&name), Some(v) if v >= 5.0) && name.contains("-chat")
}

/// Clamp a requested effort to what the model accepts, defaulting to `medium`.
pub fn normalize_reasoning_effort(model: &str, effort: Option<&str>) -> String {
    let Some(requested) = effort.map(|e| e.trim().to_ascii_lowercase()) else {
        return DEFAULT_REASONING_EFFORT.to_string();
    };
    let allowed = if is_medium_only(model) {
        requested == "medium"
    } else {
        REASONING_EFFORTS.contains(&requested.as_str())
    };
    if allowed {
        requested
    } else {
        DEFAULT_REASONING_EFFORT.to_string()
    }
}

fn is_o4_family(model: &str) -> bool {
    normalized(model).starts_with("o4")
}

/// Summary verbosity to request when the client did not choose one.
pub fn default_reasoning_summary(model: &str) -> &'static str {
    if is_o4_family(model) {
        "detailed"
    } else {
        "auto"
    }
}

/// Trim and lower-case a requested summary; o4 models only produce `detailed`.
/// An empty request means no summary.
pub fn normalize_reasoning_summary(model: &str, summary: Option<&str>) -> Option<String> {
    let trimmed = summary?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if is_o4_family(model) {
        return Some("detailed".to_string());
    }
    Some(trimmed.to_ascii_lowercase())
}

/// Search-specialised chat models.
pub fn is_web_search_model(model: &str) -> bool {
    normalized(model).contains("-search")
}

/// Models the Responses API rejects; they must stay on Chat Completions.
pub fn is_chat_only_model(model: &str) -> bool {
    let name = normalized(model);
    name.contains("gpt") && (name.contains("-search-") || name.contains("-audio-"))
}
