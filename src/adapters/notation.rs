//! Notation conversion adapter.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::engine::{Processor, Validator};
use crate::types::responses::ValidationOutcome;

use super::latex::check_latex;
use super::{strip_code_fence, DomainAdapter, ACCEPTED_CONFIDENCE, REJECTED_CONFIDENCE};

fn latex_command() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\\[A-Za-z]+").expect("latex command pattern is valid"))
}

/// Target notation system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotationTarget {
    #[default]
    Latex,
    AsciiMath,
    MathMl,
    Unicode,
}

impl NotationTarget {
    fn description(self) -> &'static str {
        match self {
            NotationTarget::Latex => "LaTeX",
            NotationTarget::AsciiMath => "AsciiMath",
            NotationTarget::MathMl => "presentation MathML, wrapped in a <math> element",
            NotationTarget::Unicode => "plain Unicode text using mathematical symbols",
        }
    }
}

impl fmt::Display for NotationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotationTarget::Latex => write!(f, "latex"),
            NotationTarget::AsciiMath => write!(f, "asciimath"),
            NotationTarget::MathMl => write!(f, "mathml"),
            NotationTarget::Unicode => write!(f, "unicode"),
        }
    }
}

impl FromStr for NotationTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latex" | "tex" => Ok(NotationTarget::Latex),
            "asciimath" | "ascii" => Ok(NotationTarget::AsciiMath),
            "mathml" => Ok(NotationTarget::MathMl),
            "unicode" | "text" => Ok(NotationTarget::Unicode),
            other => Err(format!(
                "unknown notation '{}' (expected latex, asciimath, mathml or unicode)",
                other
            )),
        }
    }
}

/// Converts an expression into a target notation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotationAdapter {
    target: NotationTarget,
}

impl NotationAdapter {
    /// Creates an adapter for `target`.
    pub fn new(target: NotationTarget) -> Self {
        Self { target }
    }

    /// Returns the target notation.
    pub fn target(&self) -> NotationTarget {
        self.target
    }

    fn check(&self, value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("The converted expression is empty.".to_string());
        }

        match self.target {
            NotationTarget::Latex => {
                if value.contains("<math") {
                    return Err("The output is MathML, not LaTeX.".to_string());
                }
                check_latex(value)
            }
            NotationTarget::MathMl => {
                if !value.contains("<math") || !value.contains("</math>") {
                    return Err("MathML output must be wrapped in <math>...</math>.".to_string());
                }
                Ok(())
            }
            NotationTarget::AsciiMath | NotationTarget::Unicode => {
                if let Some(m) = latex_command().find(value) {
                    return Err(format!(
                        "The output contains the LaTeX command {}; use {} only.",
                        m.as_str(),
                        self.target.description()
                    ));
                }
                if value.contains("<math") {
                    return Err(format!(
                        "The output is MathML; use {} only.",
                        self.target.description()
                    ));
                }
                Ok(())
            }
        }
    }
}

impl Processor<String> for NotationAdapter {
    fn process(&self, raw: &str) -> String {
        strip_code_fence(raw).to_string()
    }
}

impl Validator<String> for NotationAdapter {
    fn validate(&self, value: &String) -> ValidationOutcome {
        match self.check(value) {
            Ok(()) => ValidationOutcome::valid().with_confidence(ACCEPTED_CONFIDENCE),
            Err(problem) => ValidationOutcome::invalid(problem).with_confidence(REJECTED_CONFIDENCE),
        }
    }
}

impl DomainAdapter<String> for NotationAdapter {
    fn name(&self) -> &str {
        "notation"
    }

    fn task(&self) -> String {
        format!(
            "Convert the following mathematical expression into {}. \
             Return only the converted expression.",
            self.target.description()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parsing() {
        assert_eq!("LaTeX".parse::<NotationTarget>().unwrap(), NotationTarget::Latex);
        assert_eq!("mathml".parse::<NotationTarget>().unwrap(), NotationTarget::MathMl);
        assert_eq!("ascii".parse::<NotationTarget>().unwrap(), NotationTarget::AsciiMath);
        assert!("troff".parse::<NotationTarget>().is_err());
        assert_eq!(NotationTarget::Unicode.to_string(), "unicode");
    }

    #[test]
    fn test_mathml_target() {
        let adapter = NotationAdapter::new(NotationTarget::MathMl);
        assert!(adapter.validate(&"<math><mi>x</mi></math>".to_string()).valid);
        assert!(!adapter.validate(&"x^2".to_string()).valid);
    }

    #[test]
    fn test_plain_targets_reject_latex() {
        for target in [NotationTarget::AsciiMath, NotationTarget::Unicode] {
            let adapter = NotationAdapter::new(target);
            let outcome = adapter.validate(&r"\frac{1}{2}".to_string());
            assert!(!outcome.valid);
            assert!(outcome.feedback.unwrap().contains(r"\frac"));
        }

        let adapter = NotationAdapter::new(NotationTarget::AsciiMath);
        assert!(adapter.validate(&"sum_(i=1)^n i".to_string()).valid);
        let adapter = NotationAdapter::new(NotationTarget::Unicode);
        assert!(adapter.validate(&"∑ᵢ i²".to_string()).valid);
    }

    #[test]
    fn test_latex_target() {
        let adapter = NotationAdapter::new(NotationTarget::Latex);
        assert!(adapter.validate(&r"\sqrt{2}".to_string()).valid);
        assert!(!adapter.validate(&"<math></math>".to_string()).valid);
        assert!(!adapter.validate(&r"\sqrt{2".to_string()).valid);
    }

    #[test]
    fn test_task_names_target() {
        let adapter = NotationAdapter::new(NotationTarget::AsciiMath);
        assert!(adapter.task().contains("AsciiMath"));
        assert_eq!(adapter.target(), NotationTarget::AsciiMath);
    }
}
