//! Scripted completion backend.
//!
//! Replays queued replies instead of calling a model. Every call is
//! recorded so callers can assert on prompts, models and round-trip counts.
//! Useful for offline runs and for tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::base::CompletionClient;
use super::image::ImageInput;
use crate::{RefinerError, RefinerResult};

/// One queued reply.
#[derive(Debug, Clone)]
enum ScriptedReply {
    Text(String, Option<Duration>),
    Failure(String),
}

/// A call received by a [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    /// Prompt (or system prompt for image calls).
    pub prompt: String,

    /// Requested model.
    pub model: String,

    /// Requested temperature; `None` for image calls.
    pub temperature: Option<f32>,

    /// Whether an image was attached.
    pub with_image: bool,
}

/// Completion backend that replays a script.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    fallback_reply: Option<String>,
    failing_models: HashSet<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedClient {
    /// Creates an empty script. Calls fail once the script is exhausted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(ScriptedReply::Text(text.into(), None))
    }

    /// Queues a reply that arrives after `delay`.
    #[must_use]
    pub fn reply_after(self, text: impl Into<String>, delay: Duration) -> Self {
        self.push(ScriptedReply::Text(text.into(), Some(delay)))
    }

    /// Queues a transport failure.
    #[must_use]
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(ScriptedReply::Failure(message.into()))
    }

    /// Reply used whenever the queue is empty.
    #[must_use]
    pub fn always(mut self, text: impl Into<String>) -> Self {
        self.fallback_reply = Some(text.into());
        self
    }

    /// Makes every call to `model` fail without consuming the queue.
    #[must_use]
    pub fn fail_model(mut self, model: impl Into<String>) -> Self {
        self.failing_models.insert(model.into());
        self
    }

    fn push(self, reply: ScriptedReply) -> Self {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
        self
    }

    /// Returns every call received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns the number of queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn answer(&self, call: RecordedCall, cancel: &CancellationToken) -> RefinerResult<String> {
        let model = call.model.clone();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        if self.failing_models.contains(&model) {
            return Err(RefinerError::transport(model, "scripted model failure"));
        }

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match next {
            Some(ScriptedReply::Text(text, None)) => Ok(text),
            Some(ScriptedReply::Text(text, Some(delay))) => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(RefinerError::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(text),
                }
            }
            Some(ScriptedReply::Failure(message)) => Err(RefinerError::transport(model, message)),
            None => self
                .fallback_reply
                .clone()
                .ok_or_else(|| RefinerError::transport(model, "script exhausted")),
        }
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        let call = RecordedCall {
            prompt: prompt.to_string(),
            model: model.to_string(),
            temperature: Some(temperature),
            with_image: false,
        };
        self.answer(call, cancel).await
    }

    async fn submit_with_image(
        &self,
        system_prompt: &str,
        _image: &ImageInput,
        model: &str,
        cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        let call = RecordedCall {
            prompt: system_prompt.to_string(),
            model: model.to_string(),
            temperature: None,
            with_image: true,
        };
        self.answer(call, cancel).await
    }
}
