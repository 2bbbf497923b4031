//! Tool-choice normalization.
//!
//! Clients send tool choice as a bare mode string, a Chat Completions object
//! (`{"type":"function","function":{"name":..}}`), a Claude-style object
//! (`{"type":"tool","name":..}`) or a bare `{"name":..}`. These helpers fold all
//! of them into the shape each target protocol expects.

use serde_json::{json, Map, Value};

use super::chat_types::FunctionDefinition;

const MODES: &[&str] = &["auto", "none", "required", "any"];

/// Name selected by a tool-choice value, if it names one.
pub fn selected_name(choice: &Value) -> Option<String> {
    let map = choice.as_object()?;
    let direct = map.get("name").and_then(Value::as_str).map(str::trim);
    let nested = match map.get("function") {
        Some(Value::Object(f)) => f.get("name").and_then(Value::as_str).map(str::trim),
        Some(Value::String(s)) => Some(s.trim()),
        _ => None,
    };
    direct
        .filter(|n| !n.is_empty())
        .or(nested.filter(|n| !n.is_empty()))
        .map(str::to_string)
}

fn type_name(map: &Map<String, Value>) -> String {
    map.get("type")
        .and_then(Value::as_str)
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn trimmed_mode(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| Value::String(trimmed.to_string()))
}

/// Normalize into the Chat Completions shape.
///
/// Strings are trimmed (empty means no choice). Named choices become
/// `{"type":"function","function":{"name":N}}`, keeping `mode`/`reason` hints.
/// Mode objects and unnamed shapes pass through untouched.
pub fn normalize_for_chat(choice: &Value) -> Option<Value> {
    match choice {
        Value::Null => None,
        Value::String(s) => trimmed_mode(s),
        Value::Object(map) => {
            let kind = type_name(map);
            if MODES.contains(&kind.as_str()) {
                return Some(choice.clone());
            }
            let Some(name) = selected_name(choice) else {
                return Some(choice.clone());
            };
            let mut out = Map::new();
            out.insert("type".to_string(), json!("function"));
            out.insert("function".to_string(), json!({ "name": name }));
            for (key, value) in map {
                if !matches!(key.as_str(), "type" | "name" | "function") {
                    out.insert(key.clone(), value.clone());
                }
            }
            Some(Value::Object(out))
        }
        other => Some(other.clone()),
    }
}

/// Normalize into the Responses API shape: `{"type":"function","name":N}`.
///
/// Mode objects collapse to their mode string.
pub fn normalize_for_response(choice: &Value) -> Option<Value> {
    match choice {
        Value::Null => None,
        Value::String(s) => trimmed_mode(s),
        Value::Object(map) => {
            let kind = type_name(map);
            if MODES.contains(&kind.as_str()) {
                return Some(Value::String(kind));
            }
            let mut out = map.clone();
            out.remove("function");
            out.insert("type".to_string(), json!("function"));
            match selected_name(choice) {
                Some(name) => {
                    out.insert("name".to_string(), Value::String(name));
                }
                None => {
                    out.remove("name");
                }
            }
            Some(Value::Object(out))
        }
        other => Some(other.clone()),
    }
}

/// Translate a legacy `function_call` selector into a tool choice.
pub fn from_legacy_function_call(function_call: &Value) -> Option<Value> {
    match function_call {
        Value::String(s) => trimmed_mode(s),
        Value::Object(_) => selected_name(function_call)
            .map(|name| json!({"type": "function", "function": {"name": name}})),
        _ => None,
    }
}

/// Replace a choice naming a tool outside `tools` with `{"type":"auto"}`.
pub fn sanitize_against_tools(choice: Value, tools: &[FunctionDefinition]) -> Value {
    let Some(map) = choice.as_object() else {
        return choice;
    };
    let kind = type_name(map);
    if !matches!(kind.as_str(), "tool" | "function") {
        return choice;
    }
    match selected_name(&choice) {
        Some(name) if !tools.iter().any(|t| t.name == name) => json!({"type": "auto"}),
        _ => choice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_normalization() {
        assert_eq!(normalize_for_chat(&json!("  auto ")), Some(json!("auto")));
        assert_eq!(normalize_for_chat(&json!("   ")), None);
        assert_eq!(
            normalize_for_chat(&json!({"type": "tool", "name": "ls", "reason": "x"})),
            Some(json!({"type": "function", "function": {"name": "ls"}, "reason": "x"}))
        );
        assert_eq!(
            normalize_for_chat(&json!({"name": "ls"})),
            Some(json!({"type": "function", "function": {"name": "ls"}}))
        );
        assert_eq!(
            normalize_for_chat(&json!({"type": "auto"})),
            Some(json!({"type": "auto"}))
        );
    }

    #[test]
    fn test_response_normalization() {
        assert_eq!(
            normalize_for_response(&json!({"type": "function", "function": {"name": "ls"}})),
            Some(json!({"type": "function", "name": "ls"}))
        );
        assert_eq!(
            normalize_for_response(&json!({"type": "tool", "name": " grep "})),
            Some(json!({"type": "function", "name": "grep"}))
        );
        assert_eq!(normalize_for_response(&json!({"type": "required"})), Some(json!("required")));
        assert_eq!(normalize_for_response(&json!("none")), Some(json!("none")));
    }

    #[test]
    fn test_legacy_function_call() {
        assert_eq!(from_legacy_function_call(&json!("auto")), Some(json!("auto")));
        assert_eq!(
            from_legacy_function_call(&json!({"name": "f"})),
            Some(json!({"type": "function", "function": {"name": "f"}}))
        );
        assert_eq!(from_legacy_function_call(&json!(7)), None);
    }

    #[test]
    fn test_sanitize_against_tools() {
        let tools = vec![FunctionDefinition {
            name: "ls".to_string(),
            ..FunctionDefinition::default()
        }];
        let keep = json!({"type": "function", "function": {"name": "ls"}});
        assert_eq!(sanitize_against_tools(keep.clone(), &tools), keep);

        let dangling = json!({"type": "function", "function": {"name": "web_search"}});
        assert_eq!(sanitize_against_tools(dangling, &tools), json!({"type": "auto"}));

        let claude = json!({"type": "tool", "name": "missing"});
        assert_eq!(sanitize_against_tools(claude, &tools), json!({"type": "auto"}));

        assert_eq!(sanitize_against_tools(json!("required"), &tools), json!("required"));
    }
}
