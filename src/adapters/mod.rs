//! Domain adapters for mathematical notation.
//!
//! An adapter bundles a task description with the processor and validator
//! for one kind of output, so a refinement run only needs the input text.
//!
//! - `LatexAdapter`: Notation to LaTeX
//! - `StepByStepAdapter`: LaTeX plus solution steps
//! - `ProofAdapter`: Proofs and explanations
//! - `NotationAdapter`: Conversion into a chosen notation system
//! - `ImageTranscriber`: Image to LaTeX through a vision model

mod image;
mod latex;
mod notation;
mod proof;
mod steps;

pub use image::ImageTranscriber;
pub use latex::{check_latex, LatexAdapter};
pub use notation::{NotationAdapter, NotationTarget};
pub use proof::{ProofAdapter, MIN_PROOF_LENGTH};
pub use steps::{StepByStepAdapter, StepSolution, MIN_STEP_LENGTH};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::engine::{Processor, RefinementEngine, Validator};
use crate::types::requests::{RefinementOptions, RefinementRequest};
use crate::types::responses::RefinementResult;
use crate::RefinerResult;

/// Confidence an adapter reports for a result it accepts.
pub const ACCEPTED_CONFIDENCE: f64 = 0.9;

/// Confidence an adapter reports for a result it rejects.
pub const REJECTED_CONFIDENCE: f64 = 0.3;

/// A processor and validator pair for one output type.
pub trait DomainAdapter<T>: Processor<T> + Validator<T> {
    /// Adapter name, as used on the command line.
    fn name(&self) -> &str;

    /// Task sent to the model.
    fn task(&self) -> String;

    /// Builds a request for `input` with the given options.
    fn request<'a>(
        &'a self,
        input: impl Into<String>,
        options: RefinementOptions,
    ) -> RefinementRequest<'a, T>
    where
        Self: Sized,
    {
        RefinementRequest::new(self.task(), input, self, self).with_options(options)
    }
}

/// Runs `input` through `adapter` on `engine`.
pub async fn refine_with<T, A>(
    engine: &RefinementEngine,
    adapter: &A,
    input: &str,
    options: RefinementOptions,
) -> RefinerResult<RefinementResult<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
    A: DomainAdapter<T>,
{
    engine.refine(adapter.request(input, options)).await
}

/// Removes a surrounding Markdown code fence, if any.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // the first line carries the optional language tag
    let body = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    body.strip_suffix("```").unwrap_or(body).trim()
}
