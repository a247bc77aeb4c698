//! OpenAI client configuration.

use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};

/// Configuration for the OpenAI client.
///
/// Also the `[openai]` table of the config file; every field is optional
/// there and falls back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAIConfig {
    /// API key for authentication.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// Base URL for the API (defaults to OpenAI's API).
    pub base_url: String,
    /// Default model to use.
    pub model: String,
    /// Optional organization ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// Request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl OpenAIConfig {
    /// Default OpenAI API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    /// Creates a new configuration with the given API key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Reads from:
    /// - `OPENAI_API_KEY` - Required API key
    /// - `OPENAI_BASE_URL` - Optional base URL
    /// - `OPENAI_MODEL` - Optional default model
    /// - `OPENAI_ORGANIZATION` - Optional organization ID
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::auth("openai", "OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key).with_env())
    }

    /// Fill unset fields from the environment.
    ///
    /// File values win over environment values, except for an empty API key.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if self.api_key.is_empty()
            && let Ok(key) = std::env::var("OPENAI_API_KEY")
        {
            self.api_key = key;
        }
        if self.base_url == Self::DEFAULT_BASE_URL
            && let Ok(url) = std::env::var("OPENAI_BASE_URL")
        {
            self.base_url = url;
        }
        if self.model == Self::DEFAULT_MODEL
            && let Ok(model) = std::env::var("OPENAI_MODEL")
        {
            self.model = model;
        }
        if self.organization.is_none() {
            self.organization = std::env::var("OPENAI_ORGANIZATION").ok();
        }
        self
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the default model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the organization ID.
    #[must_use]
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organization = Some(org.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: Self::DEFAULT_BASE_URL.to_owned(),
            model: Self::DEFAULT_MODEL.to_owned(),
            organization: None,
            timeout_secs: Some(120),
        }
    }
}
