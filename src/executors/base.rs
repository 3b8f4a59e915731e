//! Base trait for completion backends.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::image::ImageInput;
use crate::{RefinerError, RefinerResult};

/// A text-completion backend.
///
/// The engine passes a [`CancellationToken`] with every call and cancels it
/// when the run times out. Implementations should stop work once it fires;
/// whatever they return afterwards is discarded by the engine.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the backend name.
    fn name(&self) -> &str;

    /// Sends `prompt` to `model` and returns the raw reply text.
    async fn submit(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        cancel: &CancellationToken,
    ) -> RefinerResult<String>;

    /// Sends an image with a system prompt to a vision-capable model.
    async fn submit_with_image(
        &self,
        _system_prompt: &str,
        _image: &ImageInput,
        _model: &str,
        _cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        Err(RefinerError::UnsupportedCapability {
            backend: self.name().to_string(),
            capability: "image input".to_string(),
        })
    }

    /// Checks whether the backend can be reached.
    async fn is_available(&self) -> bool {
        true
    }

    /// Returns the backend version.
    async fn version(&self) -> RefinerResult<String> {
        Ok("unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TextOnly;

    #[async_trait]
    impl CompletionClient for TextOnly {
        fn name(&self) -> &str {
            "text-only"
        }

        async fn submit(
            &self,
            prompt: &str,
            _model: &str,
            _temperature: f32,
            _cancel: &CancellationToken,
        ) -> RefinerResult<String> {
            Ok(prompt.to_string())
        }
    }

    #[tokio::test]
    async fn test_vision_unsupported_by_default() {
        let client = TextOnly;
        let image = ImageInput::new("image/png", "AAAA");
        let err = client
            .submit_with_image("sys", &image, "gpt-4o", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, RefinerError::UnsupportedCapability { .. }));
        assert!(client.is_available().await);
        assert_eq!(client.version().await.unwrap(), "unknown");
    }
}
