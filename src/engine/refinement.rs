//! The refinement state machine.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStats, RefinementCache, SharedCache};
use crate::executors::CompletionClient;
use crate::hooks::{HookContext, HookSystem, RunSummary};
use crate::protocol::{self, DEFAULT_CONFIDENCE, DEFAULT_FEEDBACK};
use crate::types::config::Config;
use crate::types::requests::{RefinementOptions, RefinementRequest};
use crate::types::responses::RefinementResult;
use crate::{RefinerError, RefinerResult};

use super::strategy::{Processor, Validator};

/// Confidence reported for a result produced by the fallback model.
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Prefix of the reasoning trace of a fallback result.
pub const FALLBACK_MARKER: &str = "[Fallback";

/// Runs refinement requests against a completion backend.
///
/// Cheap to share behind an `Arc`; concurrent calls only share the cache.
/// Two concurrent calls with the same key may both miss and both populate
/// the cache (last write wins).
pub struct RefinementEngine {
    client: Arc<dyn CompletionClient>,
    cache: SharedCache,
    hooks: HookSystem,
    defaults: RefinementOptions,
}

impl RefinementEngine {
    /// Creates an engine with default options and no hooks.
    pub fn new(client: Arc<dyn CompletionClient>, cache: SharedCache) -> Self {
        Self {
            client,
            cache,
            hooks: HookSystem::new(),
            defaults: RefinementOptions::default(),
        }
    }

    /// Creates an engine from the TOML configuration.
    pub fn from_config(client: Arc<dyn CompletionClient>, config: &Config) -> Self {
        let cache = RefinementCache::new(
            config.cache.capacity,
            Duration::from_secs(config.cache.ttl_secs),
        )
        .shared();

        Self::new(client, cache)
            .with_defaults(config.effective_options())
            .with_hooks(HookSystem::with_defaults())
    }

    /// Sets the options used by [`RefinementEngine::request`].
    #[must_use]
    pub fn with_defaults(mut self, defaults: RefinementOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the hook system.
    #[must_use]
    pub fn with_hooks(mut self, hooks: HookSystem) -> Self {
        self.hooks = hooks;
        self
    }

    /// Returns the completion backend.
    pub fn client(&self) -> &Arc<dyn CompletionClient> {
        &self.client
    }

    /// Returns the shared cache.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Returns the default options.
    pub fn defaults(&self) -> &RefinementOptions {
        &self.defaults
    }

    /// Builds a request carrying this engine's default options.
    pub fn request<'a, T>(
        &self,
        task: impl Into<String>,
        input: impl Into<String>,
        processor: &'a dyn Processor<T>,
        validator: &'a dyn Validator<T>,
    ) -> RefinementRequest<'a, T> {
        RefinementRequest::new(task, input, processor, validator).with_options(self.defaults.clone())
    }

    /// Empties the cache.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    /// Returns cache statistics.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Runs a refinement request.
    ///
    /// # Errors
    ///
    /// - [`RefinerError::Timeout`] when `timeout_ms` elapses first; the
    ///   in-flight request is cancelled and its result never cached
    /// - [`RefinerError::Upstream`] when the primary transport fails and no
    ///   fallback model rescued the run
    ///
    /// A result that never validates is not an error: the last attempt is
    /// returned once `max_iterations` is reached.
    pub async fn refine<T>(
        &self,
        request: RefinementRequest<'_, T>,
    ) -> RefinerResult<RefinementResult<T>>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync,
    {
        let started = Instant::now();
        let options = &request.options;
        let key = RefinementCache::cache_key(
            &request.task,
            &request.input,
            &options.model,
            options.temperature,
        );

        if options.use_cache {
            if let Some(result) = self.lookup::<T>(&request, &key, started).await {
                return Ok(result);
            }
        }

        self.hooks
            .run(HookContext::PreRefine {
                request_id: &request.request_id,
                task: &request.task,
                model: &options.model,
            })
            .await;

        let cancel = CancellationToken::new();
        let timeout = Duration::from_millis(options.timeout_ms);

        let outcome = tokio::select! {
            biased;
            _ = tokio::time::sleep(timeout) => None,
            res = self.run_with_fallback(&request, &cancel) => Some(res),
        };

        let (mut result, fallback_used) = match outcome {
            Some(res) => res?,
            None => {
                // the losing request may still be running inside the backend
                cancel.cancel();
                self.hooks
                    .run(HookContext::OnTimeout {
                        request_id: &request.request_id,
                        timeout_ms: options.timeout_ms,
                    })
                    .await;
                return Err(RefinerError::Timeout {
                    timeout_ms: options.timeout_ms,
                });
            }
        };

        result.processing_time_ms = elapsed_ms(started);

        if options.use_cache {
            match result.to_value() {
                Ok(stored) => self.cache.write().await.insert(key, stored, &request.task),
                Err(e) => tracing::warn!(error = %e, "Result could not be serialized for the cache"),
            }
        }

        let summary = RunSummary {
            iterations: result.iterations,
            confidence: result.confidence,
            model_used: result.model_used.clone(),
            processing_time_ms: result.processing_time_ms,
            from_cache: false,
            fallback_used,
        };
        self.hooks
            .run(HookContext::PostRefine {
                request_id: &request.request_id,
                task: &request.task,
                summary: &summary,
            })
            .await;

        Ok(result)
    }

    async fn lookup<T>(
        &self,
        request: &RefinementRequest<'_, T>,
        key: &str,
        started: Instant,
    ) -> Option<RefinementResult<T>>
    where
        T: DeserializeOwned,
    {
        let stored = self.cache.write().await.get(key, &request.task)?;

        let mut result = match stored.into_typed::<T>() {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(key, error = %e, "Cached payload has a different shape, ignoring");
                return None;
            }
        };
        result.processing_time_ms = elapsed_ms(started);

        tracing::debug!(request_id = %request.request_id, key, "Cache hit");
        self.hooks
            .run(HookContext::OnCacheHit {
                request_id: &request.request_id,
                key,
            })
            .await;

        let summary = RunSummary {
            iterations: result.iterations,
            confidence: result.confidence,
            model_used: result.model_used.clone(),
            processing_time_ms: result.processing_time_ms,
            from_cache: true,
            fallback_used: result.reasoning.starts_with(FALLBACK_MARKER),
        };
        self.hooks
            .run(HookContext::PostRefine {
                request_id: &request.request_id,
                task: &request.task,
                summary: &summary,
            })
            .await;

        Some(result)
    }

    async fn run_with_fallback<T>(
        &self,
        request: &RefinementRequest<'_, T>,
        cancel: &CancellationToken,
    ) -> RefinerResult<(RefinementResult<T>, bool)>
    where
        T: Clone,
    {
        let options = &request.options;

        let error = match self.run_primary(request, cancel).await {
            Ok(result) => return Ok((result, false)),
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e),
        };

        let Some(fallback) = options.usable_fallback(&options.model) else {
            return Err(RefinerError::Upstream {
                model: options.model.clone(),
                message: error.to_string(),
            });
        };

        self.hooks
            .run(HookContext::OnFallback {
                request_id: &request.request_id,
                primary_model: &options.model,
                fallback_model: fallback,
                error: &error,
            })
            .await;

        match self.run_fallback(request, fallback, cancel).await {
            Ok(result) => Ok((result, true)),
            Err(e) if e.is_transport() => Err(RefinerError::Upstream {
                model: fallback.to_string(),
                message: e.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn run_primary<T>(
        &self,
        request: &RefinementRequest<'_, T>,
        cancel: &CancellationToken,
    ) -> RefinerResult<RefinementResult<T>>
    where
        T: Clone,
    {
        let options = &request.options;
        let max_iterations = options.effective_max_iterations();

        let prompt = protocol::build_initial_prompt(&request.task, &request.input);
        let raw = self
            .submit(request, &prompt, &options.model, cancel)
            .await?;
        let parsed = protocol::parse(&raw);

        let mut current = request.processor.process(&parsed.result);
        let initial = current.clone();
        let mut validation = request.validator.validate(&current);
        let mut iterations: u32 = 1;
        let mut confidence = validation
            .confidence
            .map(|c| c.clamp(0.0, 1.0))
            .unwrap_or(DEFAULT_CONFIDENCE);
        let mut reasoning = parsed.reasoning.clone();
        let mut previous = parsed;

        tracing::debug!(
            request_id = %request.request_id,
            iteration = iterations,
            valid = validation.valid,
            confidence,
            "Initial attempt validated"
        );

        while (!validation.valid || confidence < options.confidence_threshold)
            && iterations < max_iterations
        {
            let feedback = validation.feedback.as_deref().unwrap_or(DEFAULT_FEEDBACK);
            let prompt = protocol::build_refinement_prompt(
                &request.task,
                &request.input,
                &previous.result,
                feedback,
                &previous.reasoning,
                confidence,
            );

            let raw = self
                .submit(request, &prompt, &options.model, cancel)
                .await?;
            let parsed = protocol::parse(&raw);

            current = request.processor.process(&parsed.result);
            reasoning.push_str(&format!(
                "\n\n--- Refinement Iteration {} ---\n{}",
                iterations, parsed.reasoning
            ));
            iterations += 1;

            validation = request.validator.validate(&current);
            if let Some(c) = validation.confidence {
                confidence = c.clamp(0.0, 1.0);
            }
            previous = parsed;

            tracing::debug!(
                request_id = %request.request_id,
                iteration = iterations,
                valid = validation.valid,
                confidence,
                "Refinement attempt validated"
            );
        }

        if !validation.valid {
            tracing::info!(
                request_id = %request.request_id,
                iterations,
                "Iterations exhausted without a valid result, returning last attempt"
            );
        }

        Ok(RefinementResult {
            final_result: current,
            initial_result: Some(initial),
            iterations,
            reasoning,
            confidence,
            model_used: options.model.clone(),
            processing_time_ms: 0,
        })
    }

    async fn run_fallback<T>(
        &self,
        request: &RefinementRequest<'_, T>,
        fallback: &str,
        cancel: &CancellationToken,
    ) -> RefinerResult<RefinementResult<T>>
    where
        T: Clone,
    {
        let prompt = protocol::build_initial_prompt(&request.task, &request.input);
        let raw = self.submit(request, &prompt, fallback, cancel).await?;
        let parsed = protocol::parse(&raw);
        let value = request.processor.process(&parsed.result);

        Ok(RefinementResult {
            final_result: value.clone(),
            initial_result: Some(value),
            iterations: 1,
            reasoning: format!("{}: {}] {}", FALLBACK_MARKER, fallback, parsed.reasoning),
            confidence: FALLBACK_CONFIDENCE,
            model_used: fallback.to_string(),
            processing_time_ms: 0,
        })
    }

    async fn submit<T>(
        &self,
        request: &RefinementRequest<'_, T>,
        prompt: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> RefinerResult<String> {
        tracing::debug!(
            request_id = %request.request_id,
            backend = self.client.name(),
            model,
            prompt_len = prompt.len(),
            "Submitting prompt"
        );

        self.client
            .submit(prompt, model, request.options.temperature, cancel)
            .await
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{AcceptAll, Identity};
    use crate::executors::ScriptedClient;
    use crate::types::responses::ValidationOutcome;

    fn reply(reasoning: &str, confidence: f64, result: &str) -> String {
        format!(
            "<thinking>{}</thinking><confidence>{}</confidence><result>{}</result>",
            reasoning, confidence, result
        )
    }

    fn engine(client: Arc<ScriptedClient>) -> RefinementEngine {
        RefinementEngine::new(client, RefinementCache::default().shared())
    }

    #[tokio::test]
    async fn test_echo_end_to_end() {
        let client = Arc::new(ScriptedClient::new().reply(reply("ok", 1.0, "x")));
        let engine = engine(client.clone());

        let request = RefinementRequest::new("echo", "x", &Identity, &AcceptAll);
        let result = engine.refine(request).await.unwrap();

        assert_eq!(result.final_result, "x");
        assert_eq!(result.initial_result.as_deref(), Some("x"));
        assert_eq!(result.iterations, 1);
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reasoning, "ok");
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_validator_confidence_defaults() {
        let client = Arc::new(ScriptedClient::new().always(reply("r", 0.9, "x")));
        let engine = engine(client.clone());

        let validator = |_: &String| ValidationOutcome::valid();
        let options = RefinementOptions::default().with_max_iterations(3);
        let request =
            RefinementRequest::new("echo", "x", &Identity, &validator).with_options(options);
        let result = engine.refine(request).await.unwrap();

        // 0.5 stays under the 0.8 threshold, so every round-trip is used
        assert_eq!(result.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(result.iterations, 3);
    }

    #[tokio::test]
    async fn test_upstream_when_fallback_also_fails() {
        let client = Arc::new(ScriptedClient::new());
        let engine = engine(client.clone());

        // empty script: transport failure on primary, then on fallback
        let request = RefinementRequest::new("echo", "x", &Identity, &AcceptAll);
        let err = engine.refine(request).await.unwrap_err();

        assert!(matches!(err, RefinerError::Upstream { ref model, .. } if model == "gpt-4o-mini"));
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn test_request_uses_engine_defaults() {
        let engine = engine(Arc::new(ScriptedClient::new()))
            .with_defaults(RefinementOptions::default().with_model("local"));
        let request = engine.request("t", "i", &Identity, &AcceptAll);
        assert_eq!(request.options.model, "local");
    }
}
