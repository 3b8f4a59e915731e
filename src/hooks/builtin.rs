//! Built-in hooks.
//!
//! - `LoggingHook`: Logs every finished run, fallback and timeout
//! - `MetricsHook`: Collects run counters

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::RefinerResult;

use super::{Hook, HookContext, HookEvent};

// ═══════════════════════════════════════════════════════════════════════════
// LoggingHook
// ═══════════════════════════════════════════════════════════════════════════

/// Hook that logs run outcomes through tracing.
#[derive(Debug, Default)]
pub struct LoggingHook;

impl LoggingHook {
    /// Creates a new LoggingHook.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Hook for LoggingHook {
    fn name(&self) -> &str {
        "logging"
    }

    fn events(&self) -> &'static [HookEvent] {
        &[
            HookEvent::PostRefine,
            HookEvent::OnFallback,
            HookEvent::OnTimeout,
        ]
    }

    async fn execute(&self, context: &HookContext<'_>) -> RefinerResult<()> {
        match context {
            HookContext::PostRefine {
                request_id,
                task,
                summary,
            } => {
                tracing::info!(
                    request_id = %request_id,
                    task = %task,
                    iterations = summary.iterations,
                    confidence = summary.confidence,
                    model = %summary.model_used,
                    elapsed_ms = summary.processing_time_ms,
                    cached = summary.from_cache,
                    "Refinement completed"
                );
            }
            HookContext::OnFallback {
                request_id,
                primary_model,
                fallback_model,
                error,
            } => {
                tracing::warn!(
                    request_id = %request_id,
                    primary = %primary_model,
                    fallback = %fallback_model,
                    error = %error,
                    "Primary model failed - trying fallback"
                );
            }
            HookContext::OnTimeout {
                request_id,
                timeout_ms,
            } => {
                tracing::warn!(request_id = %request_id, timeout_ms, "Refinement timed out");
            }
            _ => {}
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MetricsHook
// ═══════════════════════════════════════════════════════════════════════════

/// Hook that counts runs, round-trips, cache hits, fallbacks and timeouts.
#[derive(Debug, Default)]
pub struct MetricsHook {
    runs: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
    timeouts: AtomicU64,
    round_trips: AtomicU64,
    /// Sum of final confidences in thousandths.
    confidence_milli_sum: AtomicU64,
}

impl MetricsHook {
    /// Creates a new MetricsHook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Average number of round-trips per fresh run.
    pub fn average_iterations(&self) -> f64 {
        let fresh = self
            .runs
            .load(Ordering::Relaxed)
            .saturating_sub(self.cache_hits.load(Ordering::Relaxed));
        if fresh == 0 {
            0.0
        } else {
            self.round_trips.load(Ordering::Relaxed) as f64 / fresh as f64
        }
    }

    /// Average final confidence.
    pub fn average_confidence(&self) -> f64 {
        let runs = self.runs.load(Ordering::Relaxed);
        if runs == 0 {
            0.0
        } else {
            self.confidence_milli_sum.load(Ordering::Relaxed) as f64 / 1000.0 / runs as f64
        }
    }

    /// Returns a snapshot of the counters.
    pub fn metrics(&self) -> Metrics {
        Metrics {
            runs: self.runs.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            round_trips: self.round_trips.load(Ordering::Relaxed),
            average_iterations: self.average_iterations(),
            average_confidence: self.average_confidence(),
        }
    }
}

/// Counters collected by MetricsHook.
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub runs: u64,
    pub cache_hits: u64,
    pub fallbacks: u64,
    pub timeouts: u64,
    pub round_trips: u64,
    pub average_iterations: f64,
    pub average_confidence: f64,
}

#[async_trait]
impl Hook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    fn events(&self) -> &'static [HookEvent] {
        &[
            HookEvent::PostRefine,
            HookEvent::OnFallback,
            HookEvent::OnTimeout,
        ]
    }

    async fn execute(&self, context: &HookContext<'_>) -> RefinerResult<()> {
        match context {
            HookContext::PostRefine { summary, .. } => {
                self.runs.fetch_add(1, Ordering::Relaxed);
                if summary.from_cache {
                    self.cache_hits.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.round_trips
                        .fetch_add(u64::from(summary.iterations), Ordering::Relaxed);
                }
                let milli = (summary.confidence.clamp(0.0, 1.0) * 1000.0).round() as u64;
                self.confidence_milli_sum.fetch_add(milli, Ordering::Relaxed);
            }
            HookContext::OnFallback { .. } => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
            }
            HookContext::OnTimeout { .. } => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::RunSummary;

    fn summary(iterations: u32, confidence: f64, from_cache: bool) -> RunSummary {
        RunSummary {
            iterations,
            confidence,
            model_used: "gpt-4o".to_string(),
            processing_time_ms: 5,
            from_cache,
            fallback_used: false,
        }
    }

    #[test]
    fn test_logging_hook_name_and_events() {
        let hook = LoggingHook::new();
        assert_eq!(hook.name(), "logging");
        assert!(hook.events().contains(&HookEvent::PostRefine));
        assert!(!hook.events().contains(&HookEvent::PreRefine));
    }

    #[tokio::test]
    async fn test_logging_hook_execute() {
        let hook = LoggingHook::new();
        let summary = summary(2, 0.9, false);
        let result = hook
            .execute(&HookContext::PostRefine {
                request_id: "r",
                task: "t",
                summary: &summary,
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_metrics_hook_counts() {
        let hook = MetricsHook::new();

        let fresh = summary(2, 0.8, false);
        let cached = summary(2, 1.0, true);
        for s in [&fresh, &cached] {
            hook.execute(&HookContext::PostRefine {
                request_id: "r",
                task: "t",
                summary: s,
            })
            .await
            .unwrap();
        }
        hook.execute(&HookContext::OnTimeout {
            request_id: "r",
            timeout_ms: 1,
        })
        .await
        .unwrap();

        let metrics = hook.metrics();
        assert_eq!(metrics.runs, 2);
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.round_trips, 2);
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.fallbacks, 0);
        assert!((metrics.average_iterations - 2.0).abs() < f64::EPSILON);
        assert!((metrics.average_confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_counts_fallbacks() {
        let hook = MetricsHook::new();
        let err = crate::RefinerError::transport("gpt-4o", "down");
        tokio_test::block_on(hook.execute(&HookContext::OnFallback {
            request_id: "r",
            primary_model: "gpt-4o",
            fallback_model: "gpt-4o-mini",
            error: &err,
        }))
        .unwrap();

        assert_eq!(hook.metrics().fallbacks, 1);
        assert_eq!(hook.metrics().runs, 0);
    }

    #[test]
    fn test_metrics_empty() {
        let hook = MetricsHook::new();
        assert_eq!(hook.average_iterations(), 0.0);
        assert_eq!(hook.average_confidence(), 0.0);
    }
}
