//! Upstream channel descriptors and built-in presets.
//!
//! A channel names an upstream, the wire protocol it speaks and the model it
//! serves. Presets fill in the protocol and base URL for well-known vendors so a
//! config only needs to name one.

use serde::{Deserialize, Serialize};

use crate::models;
use crate::translate::Protocol;

/// Built-in channel preset.
#[derive(Debug, Clone)]
pub struct ChannelPreset {
    pub name: &'static str,
    pub base_url: &'static str,
    pub protocol: Protocol,
}

const PRESETS: &[ChannelPreset] = &[
    ChannelPreset {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        protocol: Protocol::ResponseApi,
    },
    ChannelPreset {
        name: "azure",
        base_url: "https://{resource}.openai.azure.com/openai",
        protocol: Protocol::ResponseApi,
    },
    ChannelPreset {
        name: "openai-compatible",
        base_url: "http://localhost:8000/v1",
        protocol: Protocol::ChatCompletions,
    },
    ChannelPreset {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        protocol: Protocol::ChatCompletions,
    },
    ChannelPreset {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        protocol: Protocol::ChatCompletions,
    },
    ChannelPreset {
        name: "anthropic",
        base_url: "https://api.anthropic.com",
        protocol: Protocol::ClaudeMessages,
    },
];

impl ChannelPreset {
    #[must_use]
    pub fn from_name(name: &str) -> Option<&'static ChannelPreset> {
        let name = name.trim().to_ascii_lowercase();
        PRESETS.iter().find(|p| p.name == name)
    }

    #[must_use]
    pub fn all() -> &'static [ChannelPreset] {
        PRESETS
    }
}

/// Everything the translation core needs to know about the selected upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    pub protocol: Protocol,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
}

impl ChannelDescriptor {
    /// Descriptor for a preset, named after it.
    pub fn from_preset(preset: &ChannelPreset, model: impl Into<String>) -> Self {
        Self {
            name: preset.name.to_string(),
            preset: Some(preset.name.to_string()),
            protocol: preset.protocol,
            base_url: preset.base_url.to_string(),
            model: model.into(),
        }
    }

    /// Same channel serving a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Whether the upstream is DeepSeek or DeepSeek-compatible and needs its request quirks.
    pub fn is_deepseek(&self) -> bool {
        let named = |s: &str| s.trim().eq_ignore_ascii_case("deepseek");
        self.preset.as_deref().is_some_and(named)
            || named(&self.name)
            || self.base_url.to_ascii_lowercase().contains("deepseek")
            || self
                .model
                .trim()
                .to_ascii_lowercase()
                .starts_with("deepseek-")
    }

    /// Whether requests for this channel may be sent as Responses API requests.
    pub fn accepts_response_api(&self) -> bool {
        self.protocol == Protocol::ResponseApi && !models::is_chat_only_model(&self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_presets() {
        assert!(ChannelPreset::from_name("openai").is_some());
        assert!(ChannelPreset::from_name("DeepSeek").is_some());
        assert!(ChannelPreset::from_name("fireworks").is_none());
        assert_eq!(
            ChannelPreset::from_name("anthropic").map(|p| p.protocol),
            Some(Protocol::ClaudeMessages)
        );
    }

    #[test]
    fn test_only_openai_and_azure_speak_responses() {
        for preset in ChannelPreset::all() {
            let expected = matches!(preset.name, "openai" | "azure");
            assert_eq!(
                preset.protocol == Protocol::ResponseApi,
                expected,
                "preset {} has unexpected protocol",
                preset.name
            );
        }
    }

    #[test]
    fn test_is_deepseek_detection() {
        let by_preset = ChannelDescriptor::from_preset(
            ChannelPreset::from_name("deepseek").unwrap(),
            "deepseek-chat",
        );
        assert!(by_preset.is_deepseek());

        let compat = ChannelPreset::from_name("openai-compatible").unwrap();
        let by_url = ChannelDescriptor {
            base_url: "https://api.DeepSeek.com".to_string(),
            ..ChannelDescriptor::from_preset(compat, "chat")
        };
        assert!(by_url.is_deepseek());

        let by_model = ChannelDescriptor::from_preset(compat, "DeepSeek-reasoner");
        assert!(by_model.is_deepseek());

        let other = ChannelDescriptor::from_preset(compat, "gpt-4o-mini");
        assert!(!other.is_deepseek());
    }

    #[test]
    fn test_accepts_response_api() {
        let openai = ChannelPreset::from_name("openai").unwrap();
        assert!(ChannelDescriptor::from_preset(openai, "gpt-4o").accepts_response_api());
        assert!(!ChannelDescriptor::from_preset(openai, "gpt-4o-search-preview").accepts_response_api());
        let router = ChannelPreset::from_name("openrouter").unwrap();
        assert!(!ChannelDescriptor::from_preset(router, "gpt-4o").accepts_response_api());
    }
}
