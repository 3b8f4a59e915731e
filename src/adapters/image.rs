//! Image transcription.
//!
//! A vision-capable model reads the image once; the draft it returns is
//! then refined as ordinary LaTeX input.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::{Processor, RefinementEngine};
use crate::executors::ImageInput;
use crate::protocol::{self, IMAGE_SYSTEM_PROMPT};
use crate::types::requests::{RefinementOptions, RefinementRequest};
use crate::types::responses::RefinementResult;
use crate::{RefinerError, RefinerResult};

use super::LatexAdapter;

const TRANSCRIPTION_TASK: &str = "The input is a LaTeX transcription of a handwritten or \
printed formula produced by an OCR model. Correct any transcription or syntax errors and \
return valid LaTeX only.";

/// Turns an image of a formula into refined LaTeX.
#[derive(Debug, Clone, Default)]
pub struct ImageTranscriber {
    adapter: LatexAdapter,
    vision_model: Option<String>,
}

impl ImageTranscriber {
    /// Creates a transcriber that reads images with the run's primary model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads images with a dedicated vision model.
    #[must_use]
    pub fn with_vision_model(mut self, model: impl Into<String>) -> Self {
        self.vision_model = Some(model.into());
        self
    }

    /// Transcribes `image` and refines the draft.
    ///
    /// The transcription call gets its own `timeout_ms` budget; the
    /// refinement run that follows gets another.
    ///
    /// # Errors
    ///
    /// - [`RefinerError::UnsupportedCapability`] when the backend cannot read images
    /// - [`RefinerError::Timeout`] when either phase runs out of time
    /// - any error of [`RefinementEngine::refine`]
    pub async fn transcribe(
        &self,
        engine: &RefinementEngine,
        image: &ImageInput,
        options: RefinementOptions,
    ) -> RefinerResult<RefinementResult<String>> {
        let model = self.vision_model.as_deref().unwrap_or(&options.model);
        let draft = self.read_image(engine, image, model, options.timeout_ms).await?;

        tracing::debug!(model, draft_len = draft.len(), "Image transcribed, refining draft");

        let request = RefinementRequest::new(
            TRANSCRIPTION_TASK,
            draft,
            &self.adapter,
            &self.adapter,
        )
        .with_options(options);
        engine.refine(request).await
    }

    async fn read_image(
        &self,
        engine: &RefinementEngine,
        image: &ImageInput,
        model: &str,
        timeout_ms: u64,
    ) -> RefinerResult<String> {
        let cancel = CancellationToken::new();

        let raw = tokio::select! {
            biased;
            _ = tokio::time::sleep(Duration::from_millis(timeout_ms)) => {
                cancel.cancel();
                return Err(RefinerError::Timeout { timeout_ms });
            }
            res = engine.client().submit_with_image(IMAGE_SYSTEM_PROMPT, image, model, &cancel) => {
                // I/O here happens on the backend's side of the call
                res.map_err(|e| match e {
                    RefinerError::Io(e) => RefinerError::transport(model, e.to_string()),
                    other => other,
                })?
            }
        };

        // vision replies may or may not follow the tagged format
        let parsed = protocol::parse(&raw);
        Ok(self.adapter.process(&parsed.result))
    }
}
