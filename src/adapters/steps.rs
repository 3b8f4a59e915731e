//! Step-by-step solution adapter.
//!
//! Expects a JSON object `{"latex": ..., "steps": [...]}` somewhere in the
//! result. Replies that ignore the format are parsed by hand: the LaTeX
//! comes from a `<latex>` block or the first display-math block, the steps
//! from numbered or `Step N:` lines.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::{Processor, Validator};
use crate::types::responses::ValidationOutcome;

use super::latex::check_latex;
use super::{strip_code_fence, DomainAdapter, ACCEPTED_CONFIDENCE, REJECTED_CONFIDENCE};

/// Shortest step text accepted, in characters.
pub const MIN_STEP_LENGTH: usize = 10;

const STEPS_TASK: &str = "Solve the following problem step by step. Answer with a JSON object \
of the form {\"latex\": \"<final answer in LaTeX>\", \"steps\": [\"<step 1>\", \"<step 2>\"]}.";

/// A solution with its derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSolution {
    /// Final answer in LaTeX.
    #[serde(default)]
    pub latex: String,

    /// Derivation, one entry per step.
    #[serde(default)]
    pub steps: Vec<String>,
}

struct StepPatterns {
    latex_tag: Regex,
    display_math: Regex,
    step_line: Regex,
}

fn patterns() -> &'static StepPatterns {
    static PATTERNS: OnceLock<StepPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| StepPatterns {
        latex_tag: Regex::new(r"(?is)<latex>(.*?)</latex>").expect("latex tag pattern is valid"),
        display_math: Regex::new(r"(?s)\$\$(.+?)\$\$|\\\[(.+?)\\\]")
            .expect("display math pattern is valid"),
        step_line: Regex::new(r"(?im)^\s*(?:step\s+\d+\s*[:.)]|\d+\s*[.)])\s*(.+?)\s*$")
            .expect("step line pattern is valid"),
    })
}

/// Parses the JSON object between the first `{` and the last `}`.
///
/// An object carrying neither LaTeX nor steps is not a solution; stray
/// braces in prose (`{}`) would otherwise parse as one.
fn parse_json(text: &str) -> Option<StepSolution> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let solution: StepSolution = serde_json::from_str(&text[start..=end]).ok()?;

    let latex = solution.latex.trim().to_string();
    let steps: Vec<String> = solution
        .steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if latex.is_empty() && steps.is_empty() {
        return None;
    }
    Some(StepSolution { latex, steps })
}

fn parse_manual(text: &str) -> StepSolution {
    let patterns = patterns();

    let latex = patterns
        .latex_tag
        .captures(text)
        .and_then(|caps| caps.get(1))
        .or_else(|| {
            patterns
                .display_math
                .captures(text)
                .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        })
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    let steps = patterns
        .step_line
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect();

    StepSolution { latex, steps }
}

/// Produces a LaTeX answer together with its derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepByStepAdapter;

impl StepByStepAdapter {
    /// Creates a new StepByStepAdapter.
    pub fn new() -> Self {
        Self
    }
}

impl Processor<StepSolution> for StepByStepAdapter {
    fn process(&self, raw: &str) -> StepSolution {
        let text = strip_code_fence(raw);
        parse_json(text).unwrap_or_else(|| parse_manual(text))
    }
}

impl Validator<StepSolution> for StepByStepAdapter {
    fn validate(&self, value: &StepSolution) -> ValidationOutcome {
        let mut problems = Vec::new();

        if let Err(problem) = check_latex(&value.latex) {
            problems.push(problem);
        }
        if value.steps.is_empty() {
            problems.push("The solution has no steps.".to_string());
        }
        let short = value
            .steps
            .iter()
            .filter(|s| s.chars().count() < MIN_STEP_LENGTH)
            .count();
        if short > 0 {
            problems.push(format!(
                "{} step(s) are shorter than {} characters; explain each step.",
                short, MIN_STEP_LENGTH
            ));
        }

        if problems.is_empty() {
            ValidationOutcome::valid().with_confidence(ACCEPTED_CONFIDENCE)
        } else {
            ValidationOutcome::invalid(problems.join(" ")).with_confidence(REJECTED_CONFIDENCE)
        }
    }
}

impl DomainAdapter<StepSolution> for StepByStepAdapter {
    fn name(&self) -> &str {
        "steps"
    }

    fn task(&self) -> String {
        STEPS_TASK.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_with_surrounding_text() {
        let raw = r#"Here you go: {"latex": "x = 2", "steps": ["Subtract 3 from both sides", " "]} done"#;
        let solution = StepByStepAdapter.process(raw);
        assert_eq!(solution.latex, "x = 2");
        assert_eq!(solution.steps, vec!["Subtract 3 from both sides"]);
    }

    #[test]
    fn test_json_in_code_fence() {
        let raw = "```json\n{\"latex\": \"y\", \"steps\": [\"Take the derivative\"]}\n```";
        let solution = StepByStepAdapter.process(raw);
        assert_eq!(solution.latex, "y");
        assert_eq!(solution.steps.len(), 1);
    }

    #[test]
    fn test_manual_fallback() {
        let raw = "Step 1: Expand the square\nStep 2: Collect like terms\n$$x^2 + 2x + 1$$";
        let solution = StepByStepAdapter.process(raw);
        assert_eq!(solution.latex, "x^2 + 2x + 1");
        assert_eq!(
            solution.steps,
            vec!["Expand the square", "Collect like terms"]
        );

        let raw = "<latex>\\frac{1}{2}</latex>\n1. Halve the quantity\n2) Simplify the fraction";
        let solution = StepByStepAdapter.process(raw);
        assert_eq!(solution.latex, r"\frac{1}{2}");
        assert_eq!(solution.steps.len(), 2);
    }

    #[test]
    fn test_braces_in_prose_use_manual_parsing() {
        let raw = "Step 1: Start from the empty set {}\nStep 2: Add the element one\n<latex>S = 1</latex>";
        let solution = StepByStepAdapter.process(raw);
        assert_eq!(solution.latex, "S = 1");
        assert_eq!(
            solution.steps,
            vec!["Start from the empty set {}", "Add the element one"]
        );
    }

    #[test]
    fn test_validation() {
        let good = StepSolution {
            latex: "x = 2".to_string(),
            steps: vec!["Subtract 3 from both sides".to_string()],
        };
        assert!(StepByStepAdapter.validate(&good).valid);

        let no_steps = StepSolution {
            latex: "x = 2".to_string(),
            steps: Vec::new(),
        };
        let outcome = StepByStepAdapter.validate(&no_steps);
        assert!(!outcome.valid);
        assert!(outcome.feedback.unwrap().contains("no steps"));

        let bad_latex = StepSolution {
            latex: "x^{2".to_string(),
            steps: vec!["Square the variable".to_string()],
        };
        let outcome = StepByStepAdapter.validate(&bad_latex);
        assert!(outcome.feedback.unwrap().contains("unbalanced braces"));

        let terse = StepSolution {
            latex: "x".to_string(),
            steps: vec!["ok".to_string()],
        };
        assert!(!StepByStepAdapter.validate(&terse).valid);
    }
}
