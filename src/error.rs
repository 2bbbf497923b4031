//! Error types for the translation core.

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConvertError {
    #[error("prompt templates cannot be converted to chat completions")]
    PromptTemplateUnsupported,

    #[error("background responses cannot be converted to chat completions")]
    BackgroundUnsupported,

    #[error("unsupported input item at index {index} of type {item_type}")]
    UnsupportedInputItem { index: usize, item_type: String },

    #[error("unsupported content at input index {index}: expected string or array, got {kind}")]
    UnsupportedContent { index: usize, kind: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl ConvertError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported_item(index: usize, item_type: impl Into<String>) -> Self {
        Self::UnsupportedInputItem {
            index,
            item_type: item_type.into(),
        }
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether the error describes a request the caller must fix, as opposed to a
    /// failure inside the gateway.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::PromptTemplateUnsupported
                | Self::BackgroundUnsupported
                | Self::UnsupportedInputItem { .. }
                | Self::UnsupportedContent { .. }
                | Self::Json(_)
        )
    }

    /// Stable machine-readable code, used as `error.code` in HTTP error bodies.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PromptTemplateUnsupported => "prompt_template_unsupported",
            Self::BackgroundUnsupported => "background_unsupported",
            Self::UnsupportedInputItem { .. } => "unsupported_input_item",
            Self::UnsupportedContent { .. } => "unsupported_content",
            Self::Config { .. } => "config_error",
            Self::Io(_) => "io_error",
            Self::Json(_) => "invalid_json",
            Self::Toml(_) => "config_error",
            Self::Other(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
