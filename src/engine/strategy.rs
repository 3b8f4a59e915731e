//! Processing and validation strategies.
//!
//! Both strategies must be pure: the same input always yields the same
//! output and nothing outside the value is touched. The cache and the
//! fallback path rely on it.

use crate::types::responses::ValidationOutcome;

/// Turns the text of a `<result>` block into a typed value.
///
/// Processing is total; malformed text maps to a best-effort value that the
/// validator can then reject.
pub trait Processor<T>: Send + Sync {
    /// Converts raw result text.
    fn process(&self, raw: &str) -> T;
}

impl<T, F> Processor<T> for F
where
    F: Fn(&str) -> T + Send + Sync,
{
    fn process(&self, raw: &str) -> T {
        self(raw)
    }
}

/// Judges a processed value.
///
/// Validators never fail: every problem is reported as an invalid outcome.
pub trait Validator<T>: Send + Sync {
    /// Validates a value.
    fn validate(&self, value: &T) -> ValidationOutcome;
}

impl<T, F> Validator<T> for F
where
    F: Fn(&T) -> ValidationOutcome + Send + Sync,
{
    fn validate(&self, value: &T) -> ValidationOutcome {
        self(value)
    }
}

/// Processor returning the result text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Processor<String> for Identity {
    fn process(&self, raw: &str) -> String {
        raw.to_string()
    }
}

/// Validator accepting everything with full confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<T> Validator<T> for AcceptAll {
    fn validate(&self, _value: &T) -> ValidationOutcome {
        ValidationOutcome::valid().with_confidence(1.0)
    }
}
