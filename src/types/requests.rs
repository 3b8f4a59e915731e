//! Request-side types: refinement options and per-call requests.

use serde::{Deserialize, Serialize};

use crate::engine::{Processor, Validator};

/// Model used for the primary attempt when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Model used when the primary transport fails and none is configured.
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";

/// Tuning knobs for a single refinement run.
///
/// Every field has a default, so a partially specified `[refinement]` table
/// in `refiner.toml` is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinementOptions {
    /// Upper bound on request/response round-trips, the first one included.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Sampling temperature forwarded to the backend.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Primary model id.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model tried once when the primary transport fails. `None` disables fallback.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,

    /// Wall-clock budget for the whole run (in milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Consult and populate the result cache.
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// Minimum confidence required to stop refining a valid result.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl Default for RefinementOptions {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            temperature: default_temperature(),
            model: default_model(),
            fallback_model: default_fallback_model(),
            timeout_ms: default_timeout_ms(),
            use_cache: true,
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

fn default_max_iterations() -> u32 {
    2
}

fn default_temperature() -> f32 {
    0.2
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_fallback_model() -> Option<String> {
    Some(DEFAULT_FALLBACK_MODEL.to_string())
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.8
}

impl RefinementOptions {
    /// Iteration bound with the minimum of one round-trip applied.
    pub fn effective_max_iterations(&self) -> u32 {
        self.max_iterations.max(1)
    }

    /// The fallback model, if one is configured and differs from `model`.
    pub fn usable_fallback(&self, current_model: &str) -> Option<&str> {
        self.fallback_model
            .as_deref()
            .filter(|m| !m.is_empty() && *m != current_model)
    }

    /// Sets the iteration bound.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the primary model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets or clears the fallback model.
    #[must_use]
    pub fn with_fallback_model(mut self, model: Option<String>) -> Self {
        self.fallback_model = model;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Enables or disables caching.
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    /// Sets the confidence threshold.
    #[must_use]
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }
}

/// A single refinement invocation.
///
/// Borrows its processor and validator; nothing in it is shared with other
/// invocations.
pub struct RefinementRequest<'a, T> {
    /// Unique id, used for logging and hooks only.
    pub request_id: String,

    /// What the model should do with the input.
    pub task: String,

    /// Payload the task operates on.
    pub input: String,

    /// Turns the parsed result text into a typed value.
    pub processor: &'a dyn Processor<T>,

    /// Judges a typed value.
    pub validator: &'a dyn Validator<T>,

    /// Options for this call.
    pub options: RefinementOptions,
}

impl<'a, T> RefinementRequest<'a, T> {
    /// Creates a request with default options.
    pub fn new(
        task: impl Into<String>,
        input: impl Into<String>,
        processor: &'a dyn Processor<T>,
        validator: &'a dyn Validator<T>,
    ) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            task: task.into(),
            input: input.into(),
            processor,
            validator,
            options: RefinementOptions::default(),
        }
    }

    /// Replaces the options.
    #[must_use]
    pub fn with_options(mut self, options: RefinementOptions) -> Self {
        self.options = options;
        self
    }
}

impl<T> std::fmt::Debug for RefinementRequest<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementRequest")
            .field("request_id", &self.request_id)
            .field("task", &self.task)
            .field("input_len", &self.input.len())
            .field("options", &self.options)
            .finish()
    }
}
