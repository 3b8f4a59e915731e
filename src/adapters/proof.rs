//! Proof and explanation adapter.

use crate::engine::{Processor, Validator};
use crate::types::responses::ValidationOutcome;

use super::{strip_code_fence, DomainAdapter, ACCEPTED_CONFIDENCE, REJECTED_CONFIDENCE};

/// Shortest proof accepted, in characters.
pub const MIN_PROOF_LENGTH: usize = 200;

const PROOF_TASK: &str = "Write a rigorous proof or explanation of the following statement. \
Justify every step and end with an explicit conclusion.";

/// Phrases that mark a concluding statement, matched case-insensitively.
const CONCLUSION_MARKERS: &[&str] = &[
    "therefore",
    "hence",
    "thus",
    "qed",
    "q.e.d",
    "∎",
    "\\blacksquare",
    "\\qed",
];

/// Generates proofs and explanations.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProofAdapter;

impl ProofAdapter {
    /// Creates a new ProofAdapter.
    pub fn new() -> Self {
        Self
    }

    fn has_conclusion(text: &str) -> bool {
        let lower = text.to_lowercase();
        CONCLUSION_MARKERS.iter().any(|m| lower.contains(m))
    }
}

impl Processor<String> for ProofAdapter {
    fn process(&self, raw: &str) -> String {
        strip_code_fence(raw).to_string()
    }
}

impl Validator<String> for ProofAdapter {
    fn validate(&self, value: &String) -> ValidationOutcome {
        let mut problems = Vec::new();

        let length = value.chars().count();
        if length < MIN_PROOF_LENGTH {
            problems.push(format!(
                "The proof is too short ({} characters, at least {} expected); justify each step.",
                length, MIN_PROOF_LENGTH
            ));
        }
        if !Self::has_conclusion(value) {
            problems.push(
                "The proof lacks a concluding statement (for example \"Therefore ...\")."
                    .to_string(),
            );
        }

        if problems.is_empty() {
            ValidationOutcome::valid().with_confidence(ACCEPTED_CONFIDENCE)
        } else {
            ValidationOutcome::invalid(problems.join(" ")).with_confidence(REJECTED_CONFIDENCE)
        }
    }
}

impl DomainAdapter<String> for ProofAdapter {
    fn name(&self) -> &str {
        "proof"
    }

    fn task(&self) -> String {
        PROOF_TASK.to_string()
    }
}
