use crate::channel::{ChannelDescriptor, ChannelPreset};
use crate::error::{ConvertError, Result};
use crate::translate::Protocol;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
    #[serde(default)]
    pub redaction: RedactionConfig,
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    /// Embedded `data:` URLs at or above this size are stripped from assistant history.
    #[serde(default = "default_threshold_bytes")]
    pub threshold_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Client-facing alias -> upstream model name.
    #[serde(default)]
    pub models: HashMap<String, String>,
}

fn default_port() -> u16 {
    4333
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("gateway-translate.jsonl")
}

fn default_threshold_bytes() -> usize {
    4096
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            threshold_bytes: default_threshold_bytes(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            journal_path: default_journal_path(),
            redaction: RedactionConfig::default(),
            channels: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConvertError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > ~/.config > home dir.
    /// Without an explicit path, finding nothing yields the defaults.
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Resolve a configured channel, filling protocol and base URL from its preset.
    pub fn channel(&self, name: &str) -> Option<ChannelDescriptor> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))?;
        channel.descriptor()
    }

    /// Resolve a channel for a client-facing model, mapping the alias to its upstream name.
    pub fn channel_for_model(&self, name: &str, model: &str) -> Option<ChannelDescriptor> {
        let channel = self
            .channels
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name.trim()))?;
        let upstream = channel.resolve_model(model).to_string();
        channel.descriptor().map(|d| d.with_model(upstream))
    }

    /// Every channel that resolves to a descriptor.
    pub fn descriptors(&self) -> Vec<ChannelDescriptor> {
        self.channels.iter().filter_map(ChannelConfig::descriptor).collect()
    }

    fn validate(&self) -> Result<()> {
        for channel in &self.channels {
            if channel.descriptor().is_none() {
                return Err(ConvertError::config(format!(
                    "Channel '{}' has no protocol and no known preset. Known presets: {}",
                    channel.name,
                    ChannelPreset::all()
                        .iter()
                        .map(|p| p.name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
        Ok(())
    }
}

impl ChannelConfig {
    fn preset(&self) -> Option<&'static ChannelPreset> {
        ChannelPreset::from_name(self.preset.as_deref().unwrap_or(&self.name))
    }

    /// Descriptor for this channel, or `None` when the protocol cannot be determined.
    pub fn descriptor(&self) -> Option<ChannelDescriptor> {
        let preset = self.preset();
        let protocol = self.protocol.or_else(|| preset.map(|p| p.protocol))?;
        let base_url = self
            .base_url
            .clone()
            .or_else(|| preset.map(|p| p.base_url.to_string()))
            .unwrap_or_default();
        Some(ChannelDescriptor {
            name: self.name.clone(),
            preset: preset.map(|p| p.name.to_string()),
            protocol,
            base_url,
            model: String::new(),
        })
    }

    /// Upstream model for a client-facing alias; unmapped names pass through.
    pub fn resolve_model<'a>(&'a self, alias: &'a str) -> &'a str {
        self.models.get(alias).map_or(alias, String::as_str)
    }
}

/// Candidate config locations in priority order, excluding an explicit `--config`.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("gateway-translate.toml")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join("gateway-translate").join("config.toml"));
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join("gateway-translate").join("config.toml"));
        paths.push(home.join(".gateway-translate.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
