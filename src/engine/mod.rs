//! Refinement engine.
//!
//! Runs the propose → validate → refine loop for one request at a time:
//!
//! 1. Answer from the cache when an unexpired entry exists
//! 2. Otherwise race the loop against the timeout
//! 3. Send the initial prompt, parse, process and validate
//! 4. Refine while the result is invalid or under-confident, up to
//!    `max_iterations` round-trips
//! 5. On a transport failure, try the fallback model once
//! 6. Cache the fresh result
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use refiner::cache::RefinementCache;
//! use refiner::engine::{Identity, RefinementEngine};
//! use refiner::executors::ScriptedClient;
//! use refiner::types::requests::RefinementRequest;
//! use refiner::types::responses::ValidationOutcome;
//!
//! let client = Arc::new(ScriptedClient::new().reply("<result>x</result>"));
//! let engine = RefinementEngine::new(client, RefinementCache::default().shared());
//!
//! let validator = |_: &String| ValidationOutcome::valid().with_confidence(1.0);
//! let request = RefinementRequest::new("echo", "x", &Identity, &validator);
//! let result = engine.refine(request).await?;
//! assert_eq!(result.final_result, "x");
//! ```

mod refinement;
mod strategy;

pub use refinement::{RefinementEngine, FALLBACK_CONFIDENCE, FALLBACK_MARKER};
pub use strategy::{AcceptAll, Identity, Processor, Validator};
