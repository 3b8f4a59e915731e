//! # Refiner
//!
//! Iterative self-refinement of LLM output for mathematical notation.
//!
//! A request is answered by a model, the answer is parsed, processed and
//! validated, and the model is asked to improve it until it validates with
//! enough confidence or the iteration budget runs out. Results are cached
//! by (task, input, model, temperature).
//!
//! ## Modules
//!
//! - [`adapters`] - LaTeX, step-by-step, proof and notation adapters
//! - [`cache`] - Bounded TTL cache of refinement results
//! - [`cli`] - Command line interface
//! - [`engine`] - The refinement loop
//! - [`executors`] - Completion backends
//! - [`hooks`] - Lifecycle hooks
//! - [`protocol`] - Prompt templates and response parsing
//! - [`types`] - Shared types

pub mod adapters;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod engine;
pub mod executors;
pub mod hooks;
pub mod protocol;
pub mod types;

pub use types::config::Config;
pub use types::errors::{RefinerError, RefinerResult};
