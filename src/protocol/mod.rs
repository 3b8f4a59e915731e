//! Tagged prompt/response protocol spoken with the model.
//!
//! Every prompt asks for three sections, in order:
//!
//! ```text
//! <thinking>step-by-step reasoning</thinking>
//! <confidence>0.0 - 1.0</confidence>
//! <result>final answer only</result>
//! ```
//!
//! [`parse`] reads them back and degrades gracefully when the model ignores
//! the format.

mod parser;
mod prompt;

pub use parser::{parse, ParsedResponse, DEFAULT_CONFIDENCE};
pub use prompt::{
    build_initial_prompt, build_refinement_prompt, DEFAULT_FEEDBACK, IMAGE_SYSTEM_PROMPT,
};
