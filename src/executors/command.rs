//! Completion backend that shells out to a local LLM CLI.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::base::CompletionClient;
use super::image::ImageInput;
use crate::types::config::BackendConfig;
use crate::{RefinerError, RefinerResult};

const MODEL_PLACEHOLDER: &str = "{model}";
const TEMPERATURE_PLACEHOLDER: &str = "{temperature}";
const IMAGE_PLACEHOLDER: &str = "{image}";

/// Backend running an external command per request.
///
/// The prompt is written to the child's stdin and the reply read from its
/// stdout. The child is killed when the engine cancels the request.
pub struct CommandClient {
    command_name: String,
    args: Vec<String>,
    vision_args: Vec<String>,
}

impl CommandClient {
    /// Creates a client for `command` with text completion arguments.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command_name: command.into(),
            args,
            vision_args: Vec::new(),
        }
    }

    /// Creates a client from the TOML configuration.
    pub fn from_config(config: &BackendConfig) -> Self {
        Self {
            command_name: config.command.clone(),
            args: config.args.clone(),
            vision_args: config.vision_args.clone(),
        }
    }

    /// Sets the arguments used for image requests.
    #[must_use]
    pub fn with_vision_args(mut self, args: Vec<String>) -> Self {
        self.vision_args = args;
        self
    }

    /// Returns the command.
    pub fn command(&self) -> &str {
        &self.command_name
    }

    fn render_args(
        template: &[String],
        model: &str,
        temperature: Option<f32>,
        image: Option<&str>,
    ) -> Vec<String> {
        template
            .iter()
            .map(|arg| {
                let mut arg = arg.replace(MODEL_PLACEHOLDER, model);
                if let Some(t) = temperature {
                    arg = arg.replace(TEMPERATURE_PLACEHOLDER, &t.to_string());
                }
                if let Some(path) = image {
                    arg = arg.replace(IMAGE_PLACEHOLDER, path);
                }
                arg
            })
            .collect()
    }

    async fn run(
        &self,
        args: Vec<String>,
        stdin_payload: String,
        model: &str,
        cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        let mut cmd = Command::new(&self.command_name);
        cmd.args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %self.command_name, model, "Spawning completion backend");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RefinerError::BackendNotFound(self.command_name.clone()));
            }
            Err(e) => return Err(RefinerError::transport(model, e.to_string())),
        };

        let stdin = child.stdin.take();
        let write = async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(stdin_payload.as_bytes()).await?;
                stdin.shutdown().await?;
            }
            Ok::<(), std::io::Error>(())
        };

        let (written, output) = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(command = %self.command_name, "Completion cancelled, killing backend");
                return Err(RefinerError::Cancelled);
            }
            res = async { tokio::join!(write, child.wait_with_output()) } => res,
        };

        let output = output.map_err(|e| RefinerError::transport(model, e.to_string()))?;
        if let Err(e) = written {
            tracing::debug!(error = %e, "Backend closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RefinerError::transport(
                model,
                format!("{} exited with {}: {}", self.command_name, output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(RefinerError::transport(model, "backend returned an empty response"));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl CompletionClient for CommandClient {
    fn name(&self) -> &str {
        &self.command_name
    }

    async fn submit(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
        cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        let args = Self::render_args(&self.args, model, Some(temperature), None);
        self.run(args, prompt.to_string(), model, cancel).await
    }

    async fn submit_with_image(
        &self,
        system_prompt: &str,
        image: &ImageInput,
        model: &str,
        cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        if self.vision_args.is_empty() {
            return Err(RefinerError::UnsupportedCapability {
                backend: self.command_name.clone(),
                capability: "image input".to_string(),
            });
        }

        // Either hand the backend a file path or inline the data URL on stdin
        if self.vision_args.iter().any(|a| a.contains(IMAGE_PLACEHOLDER)) {
            let file = TempImage::write(image).await.map_err(|e| match e {
                RefinerError::Io(e) => RefinerError::transport(model, e.to_string()),
                other => other,
            })?;
            let path = file.path.to_string_lossy().to_string();
            let args = Self::render_args(&self.vision_args, model, None, Some(&path));
            self.run(args, system_prompt.to_string(), model, cancel).await
        } else {
            let args = Self::render_args(&self.vision_args, model, None, None);
            let payload = format!("{}\n\n{}", system_prompt, image.to_data_url());
            self.run(args, payload, model, cancel).await
        }
    }

    async fn is_available(&self) -> bool {
        Command::new(&self.command_name)
            .arg("--version")
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn version(&self) -> RefinerResult<String> {
        let output = Command::new(&self.command_name)
            .arg("--version")
            .output()
            .await?;

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("unknown")
            .to_string();

        Ok(version)
    }
}

/// Image written to the temp dir for the lifetime of one request.
struct TempImage {
    path: PathBuf,
}

impl TempImage {
    async fn write(image: &ImageInput) -> RefinerResult<Self> {
        let ext = image.mime_type.rsplit('/').next().unwrap_or("img");
        let path = std::env::temp_dir().join(format!("refiner-{}.{}", uuid::Uuid::new_v4(), ext));
        tokio::fs::write(&path, image.decode()?).await?;
        Ok(Self { path })
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(path = %self.path.display(), error = %e, "Failed to remove temp image");
        }
    }
}
