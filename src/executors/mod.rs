//! Completion backends.
//!
//! The engine talks to models only through [`CompletionClient`]. This
//! module ships a command-line backend and a scripted one.

mod base;
mod command;
mod image;
mod scripted;

pub use base::CompletionClient;
pub use command::CommandClient;
pub use image::ImageInput;
pub use scripted::{RecordedCall, ScriptedClient};
