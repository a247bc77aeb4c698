//! Per-run limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds for a single supervised run.
///
/// In TOML every duration is written in seconds under a `*_secs` key:
///
/// ```toml
/// [run]
/// max_iterations = 8
/// timeout_secs = 90
/// tool_timeout_secs = 15.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Executing → Invoking transitions allowed before the run is truncated.
    /// Zero is treated as one.
    pub max_iterations: usize,

    /// Corrective re-prompts allowed per model turn.
    pub max_validation_retries: usize,

    /// Wall-clock budget for the whole run.
    #[serde(rename = "timeout_secs", with = "secs")]
    pub timeout: Duration,

    /// Provider calls attempted per model turn before the run fails.
    pub max_provider_attempts: usize,

    /// Optional bound on a single tool call.
    #[serde(
        rename = "tool_timeout_secs",
        with = "opt_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub tool_timeout: Option<Duration>,

    /// Model identifier forwarded to the provider. `None` uses the
    /// provider's default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RunConfig {
    /// Default iteration bound.
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;
    /// Default corrective re-prompts per turn.
    pub const DEFAULT_MAX_VALIDATION_RETRIES: usize = 2;
    /// Default provider attempts per turn.
    pub const DEFAULT_MAX_PROVIDER_ATTEMPTS: usize = 2;
    /// Default run timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

    /// Create a configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the iteration bound.
    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set the corrective re-prompt bound.
    #[must_use]
    pub const fn max_validation_retries(mut self, max: usize) -> Self {
        self.max_validation_retries = max;
        self
    }

    /// Set the run timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the provider attempt bound.
    #[must_use]
    pub const fn max_provider_attempts(mut self, attempts: usize) -> Self {
        self.max_provider_attempts = attempts;
        self
    }

    /// Bound every tool call.
    #[must_use]
    pub const fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    /// Set the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// The iteration bound actually enforced.
    #[must_use]
    pub fn effective_max_iterations(&self) -> usize {
        self.max_iterations.max(1)
    }

    /// The provider attempt bound actually enforced.
    #[must_use]
    pub fn effective_provider_attempts(&self) -> usize {
        self.max_provider_attempts.max(1)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            max_validation_retries: Self::DEFAULT_MAX_VALIDATION_RETRIES,
            timeout: Self::DEFAULT_TIMEOUT,
            max_provider_attempts: Self::DEFAULT_MAX_PROVIDER_ATTEMPTS,
            tool_timeout: None,
            model: None,
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(value.as_secs_f64())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}

mod opt_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(d)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(D::Error::custom))
            .transpose()
    }
}
