//! Response-side types: validation outcomes and refinement results.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::RefinerResult;

/// Verdict produced by a validator for one attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationOutcome {
    /// Whether the attempt is acceptable.
    pub valid: bool,

    /// What is wrong with the attempt, fed into the next refinement prompt.
    #[serde(default)]
    pub feedback: Option<String>,

    /// Validator's own confidence in [0, 1].
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl ValidationOutcome {
    /// A valid outcome with no feedback.
    pub fn valid() -> Self {
        Self {
            valid: true,
            feedback: None,
            confidence: None,
        }
    }

    /// An invalid outcome explaining what to fix.
    pub fn invalid(feedback: impl Into<String>) -> Self {
        Self {
            valid: false,
            feedback: Some(feedback.into()),
            confidence: None,
        }
    }

    /// Attaches a confidence, clamped to [0, 1].
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Attaches feedback.
    #[must_use]
    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }
}

/// Outcome of a refinement run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefinementResult<T> {
    /// Output of the last attempt.
    pub final_result: T,

    /// Output of the first attempt.
    pub initial_result: Option<T>,

    /// Request/response round-trips performed, the first one included.
    pub iterations: u32,

    /// Accumulated reasoning trace.
    pub reasoning: String,

    /// Confidence in [0, 1] of the final result.
    pub confidence: f64,

    /// Model that produced the final result.
    pub model_used: String,

    /// Time from call start to result (in milliseconds).
    pub processing_time_ms: u64,
}

impl<T> RefinementResult<T> {
    /// Maps the typed payload, keeping every piece of metadata.
    pub fn map<U, F>(self, mut f: F) -> RefinementResult<U>
    where
        F: FnMut(T) -> U,
    {
        RefinementResult {
            final_result: f(self.final_result),
            initial_result: self.initial_result.map(&mut f),
            iterations: self.iterations,
            reasoning: self.reasoning,
            confidence: self.confidence,
            model_used: self.model_used,
            processing_time_ms: self.processing_time_ms,
        }
    }

    /// Number of refinement passes beyond the first attempt.
    pub fn refinements(&self) -> u32 {
        self.iterations.saturating_sub(1)
    }
}

impl<T: Serialize> RefinementResult<T> {
    /// Converts the payload into JSON for domain-agnostic storage.
    pub fn to_value(&self) -> RefinerResult<RefinementResult<serde_json::Value>> {
        Ok(RefinementResult {
            final_result: serde_json::to_value(&self.final_result)?,
            initial_result: self
                .initial_result
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            iterations: self.iterations,
            reasoning: self.reasoning.clone(),
            confidence: self.confidence,
            model_used: self.model_used.clone(),
            processing_time_ms: self.processing_time_ms,
        })
    }
}

impl RefinementResult<serde_json::Value> {
    /// Restores a typed payload from stored JSON.
    pub fn into_typed<T: DeserializeOwned>(self) -> RefinerResult<RefinementResult<T>> {
        Ok(RefinementResult {
            final_result: serde_json::from_value(self.final_result)?,
            initial_result: self
                .initial_result
                .map(serde_json::from_value)
                .transpose()?,
            iterations: self.iterations,
            reasoning: self.reasoning,
            confidence: self.confidence,
            model_used: self.model_used,
            processing_time_ms: self.processing_time_ms,
        })
    }
}
