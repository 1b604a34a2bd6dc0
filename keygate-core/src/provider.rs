//! Hosted services an API key can belong to.
//!
//! Each [`Provider`] carries the conventions hosts use to locate its key:
//! the environment variable it is usually deployed under and the entry name
//! used in a [`SecretStore`](crate::store::SecretStore).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a provider name is not recognized.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown provider: {name} (expected one of: gemini, openrouter, deepseek, replicate)")]
pub struct ParseProviderError {
    name: String,
}

/// A downstream AI service whose key is gated.
///
/// # Examples
///
/// ```
/// use keygate_core::Provider;
///
/// let provider: Provider = "DeepSeek".parse().unwrap();
/// assert_eq!(provider.env_var(), "DEEPSEEK_API_KEY");
/// assert_eq!(provider.entry_name(), "keygate/deepseek/api_key");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini (image, vision and video models).
    #[default]
    Gemini,

    /// OpenRouter-hosted models.
    OpenRouter,

    /// DeepSeek chat completions.
    DeepSeek,

    /// Replicate predictions.
    Replicate,
}

impl Provider {
    /// All known providers.
    pub const ALL: [Provider; 4] = [
        Provider::Gemini,
        Provider::OpenRouter,
        Provider::DeepSeek,
        Provider::Replicate,
    ];

    /// Lowercase identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenRouter => "openrouter",
            Self::DeepSeek => "deepseek",
            Self::Replicate => "replicate",
        }
    }

    /// Human-readable name for prompts and gate messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Gemini => "Google AI",
            Self::OpenRouter => "OpenRouter",
            Self::DeepSeek => "DeepSeek",
            Self::Replicate => "Replicate",
        }
    }

    /// Environment variable the key is conventionally deployed under.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::Gemini => "API_KEY",
            Self::OpenRouter => "VITE_OPENROUTER_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Replicate => "VITE_REPLICATE_API_TOKEN",
        }
    }

    /// Secret store entry name: `keygate/{provider}/api_key`.
    pub fn entry_name(self) -> String {
        format!("keygate/{}/api_key", self.as_str())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ParseProviderError { name: s.to_string() })
    }
}
