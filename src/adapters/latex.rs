//! LaTeX conversion adapter.

use std::sync::OnceLock;

use regex::Regex;

use crate::engine::{Processor, Validator};
use crate::types::responses::ValidationOutcome;

use super::{strip_code_fence, DomainAdapter, ACCEPTED_CONFIDENCE, REJECTED_CONFIDENCE};

const LATEX_TASK: &str = "Convert the following mathematical expression into valid LaTeX. \
Return only the LaTeX source, without surrounding math delimiters.";

fn left_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\left(?:[^A-Za-z]|$)").expect("left pattern is valid"))
}

fn right_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\right(?:[^A-Za-z]|$)").expect("right pattern is valid"))
}

fn environment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\\(begin|end)\s*\{([^{}]*)\}").expect("environment pattern is valid")
    })
}

/// Checks LaTeX markup balance.
///
/// Returns a description of the first problem found. Escaped braces
/// (`\{`, `\}`) are ignored.
pub fn check_latex(latex: &str) -> Result<(), String> {
    if latex.trim().is_empty() {
        return Err("The LaTeX output is empty.".to_string());
    }

    let mut depth: i64 = 0;
    let mut chars = latex.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err("The LaTeX has unbalanced braces: a '}' has no matching '{'.".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(format!(
            "The LaTeX has unbalanced braces: {} '{{' left unclosed.",
            depth
        ));
    }

    let lefts = left_pattern().find_iter(latex).count();
    let rights = right_pattern().find_iter(latex).count();
    if lefts != rights {
        return Err(format!(
            "The LaTeX has {} \\left but {} \\right delimiters.",
            lefts, rights
        ));
    }

    let mut open: Vec<&str> = Vec::new();
    for caps in environment_pattern().captures_iter(latex) {
        let name = caps.get(2).map_or("", |m| m.as_str().trim());
        if &caps[1] == "begin" {
            open.push(name);
            continue;
        }
        match open.pop() {
            Some(expected) if expected == name => {}
            Some(expected) => {
                return Err(format!(
                    "\\end{{{}}} closes \\begin{{{}}}; environments are mismatched.",
                    name, expected
                ));
            }
            None => return Err(format!("\\end{{{}}} has no matching \\begin.", name)),
        }
    }
    if let Some(name) = open.last() {
        return Err(format!("\\begin{{{}}} is never closed.", name));
    }

    Ok(())
}

/// Removes one pair of surrounding math delimiters.
///
/// Only strips when the outer delimiters pair with each other, so
/// `$a$ + $b$` is left untouched.
fn strip_math_delimiters(text: &str) -> &str {
    let trimmed = text.trim();
    for (open, close) in [("$$", "$$"), ("\\[", "\\]"), ("\\(", "\\)"), ("$", "$")] {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            if inner.contains(open) || inner.contains(close) {
                continue;
            }
            return inner.trim();
        }
    }
    trimmed
}

/// Converts notation into LaTeX.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexAdapter;

impl LatexAdapter {
    /// Creates a new LatexAdapter.
    pub fn new() -> Self {
        Self
    }
}

impl Processor<String> for LatexAdapter {
    fn process(&self, raw: &str) -> String {
        strip_math_delimiters(strip_code_fence(raw)).to_string()
    }
}

impl Validator<String> for LatexAdapter {
    fn validate(&self, value: &String) -> ValidationOutcome {
        match check_latex(value) {
            Ok(()) => ValidationOutcome::valid().with_confidence(ACCEPTED_CONFIDENCE),
            Err(problem) => ValidationOutcome::invalid(problem).with_confidence(REJECTED_CONFIDENCE),
        }
    }
}

impl DomainAdapter<String> for LatexAdapter {
    fn name(&self) -> &str {
        "latex"
    }

    fn task(&self) -> String {
        LATEX_TASK.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_braces() {
        assert!(check_latex("{a}{b}").is_ok());
        assert!(check_latex(r"\frac{1}{2}").is_ok());
        assert!(check_latex(r"\{ x \}").is_ok());

        let err = check_latex("{a{b}").unwrap_err();
        assert!(err.contains("unbalanced braces"));
        let err = check_latex("a}{").unwrap_err();
        assert!(err.contains("unbalanced braces"));
    }

    #[test]
    fn test_left_right() {
        assert!(check_latex(r"\left( x \right)").is_ok());
        assert!(check_latex(r"\left( x").is_err());
        // arrows are not delimiters
        assert!(check_latex(r"a \rightarrow b \leftarrow c").is_ok());
    }

    #[test]
    fn test_environments() {
        assert!(check_latex(r"\begin{pmatrix} 1 & 0 \end{pmatrix}").is_ok());
        assert!(check_latex(
            r"\begin{align} \begin{cases} x \end{cases} \end{align}"
        )
        .is_ok());

        let err = check_latex(r"\begin{align} x \end{cases}").unwrap_err();
        assert!(err.contains("mismatched"));
        assert!(check_latex(r"\begin{align} x").is_err());
        assert!(check_latex(r"x \end{align}").is_err());
    }

    #[test]
    fn test_empty_is_invalid() {
        assert!(check_latex("   ").is_err());
        let outcome = LatexAdapter.validate(&String::new());
        assert!(!outcome.valid);
        assert!(outcome.feedback.is_some());
    }

    #[test]
    fn test_processor_strips_wrapping() {
        let adapter = LatexAdapter::new();
        assert_eq!(adapter.process("$$x^2$$"), "x^2");
        assert_eq!(adapter.process("$x^2$"), "x^2");
        assert_eq!(adapter.process(r"\[ x^2 \]"), "x^2");
        assert_eq!(adapter.process("```latex\n$x^2$\n```"), "x^2");
        assert_eq!(adapter.process(r"\frac{a}{b}"), r"\frac{a}{b}");
    }

    #[test]
    fn test_processor_keeps_separate_math_spans() {
        let adapter = LatexAdapter::new();
        assert_eq!(adapter.process("$a$ + $b$"), "$a$ + $b$");
        assert_eq!(adapter.process("$$a$$ = $$b$$"), "$$a$$ = $$b$$");
        assert_eq!(adapter.process(r"\[ a \] and \[ b \]"), r"\[ a \] and \[ b \]");
    }

    #[test]
    fn test_validator_confidence() {
        let outcome = LatexAdapter.validate(&"x^{2}".to_string());
        assert!(outcome.valid);
        assert_eq!(outcome.confidence, Some(ACCEPTED_CONFIDENCE));

        let outcome = LatexAdapter.validate(&"x^{2".to_string());
        assert!(!outcome.valid);
        assert_eq!(outcome.confidence, Some(REJECTED_CONFIDENCE));
    }
}
