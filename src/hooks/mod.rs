//! Refiner hook system.
//!
//! Hooks observe a refinement run at fixed points:
//!
//! - `pre_refine`: Before the first request is sent (after a cache miss)
//! - `post_refine`: After a run produced a result (fresh or cached)
//! - `on_cache_hit`: When a run was answered from the cache
//! - `on_fallback`: When the primary model failed and the fallback is tried
//! - `on_timeout`: When a run exceeded its time budget
//!
//! Hooks cannot change the outcome of a run. A failing hook is logged and
//! skipped.

mod builtin;

pub use builtin::{LoggingHook, Metrics, MetricsHook};

use std::sync::Arc;

use async_trait::async_trait;

use crate::{RefinerError, RefinerResult};

// ═══════════════════════════════════════════════════════════════════════════
// Event types
// ═══════════════════════════════════════════════════════════════════════════

/// Event that triggers a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// Before the first request of a run.
    PreRefine,

    /// After a run produced a result.
    PostRefine,

    /// When a run was answered from the cache.
    OnCacheHit,

    /// When the fallback model is about to be tried.
    OnFallback,

    /// When a run timed out.
    OnTimeout,
}

impl std::fmt::Display for HookEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HookEvent::PreRefine => write!(f, "pre_refine"),
            HookEvent::PostRefine => write!(f, "post_refine"),
            HookEvent::OnCacheHit => write!(f, "on_cache_hit"),
            HookEvent::OnFallback => write!(f, "on_fallback"),
            HookEvent::OnTimeout => write!(f, "on_timeout"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook context
// ═══════════════════════════════════════════════════════════════════════════

/// Payload-free summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Round-trips performed.
    pub iterations: u32,

    /// Final confidence.
    pub confidence: f64,

    /// Model that produced the result.
    pub model_used: String,

    /// Time from call start to result.
    pub processing_time_ms: u64,

    /// Whether the result came from the cache.
    pub from_cache: bool,

    /// Whether the fallback model produced the result.
    pub fallback_used: bool,
}

/// Context passed to hooks.
pub enum HookContext<'a> {
    /// Context for pre_refine.
    PreRefine {
        request_id: &'a str,
        task: &'a str,
        model: &'a str,
    },

    /// Context for post_refine.
    PostRefine {
        request_id: &'a str,
        task: &'a str,
        summary: &'a RunSummary,
    },

    /// Context for on_cache_hit.
    OnCacheHit {
        request_id: &'a str,
        key: &'a str,
    },

    /// Context for on_fallback.
    OnFallback {
        request_id: &'a str,
        primary_model: &'a str,
        fallback_model: &'a str,
        error: &'a RefinerError,
    },

    /// Context for on_timeout.
    OnTimeout {
        request_id: &'a str,
        timeout_ms: u64,
    },
}

impl<'a> HookContext<'a> {
    /// Returns the event matching the context.
    pub fn event(&self) -> HookEvent {
        match self {
            HookContext::PreRefine { .. } => HookEvent::PreRefine,
            HookContext::PostRefine { .. } => HookEvent::PostRefine,
            HookContext::OnCacheHit { .. } => HookEvent::OnCacheHit,
            HookContext::OnFallback { .. } => HookEvent::OnFallback,
            HookContext::OnTimeout { .. } => HookEvent::OnTimeout,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook trait
// ═══════════════════════════════════════════════════════════════════════════

/// Trait for observers of refinement runs.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Hook name.
    fn name(&self) -> &str;

    /// Events that trigger this hook.
    fn events(&self) -> &'static [HookEvent];

    /// Runs the hook.
    async fn execute(&self, context: &HookContext<'_>) -> RefinerResult<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Hook system
// ═══════════════════════════════════════════════════════════════════════════

/// Hook registry.
#[derive(Default)]
pub struct HookSystem {
    pre_refine: Vec<Arc<dyn Hook>>,
    post_refine: Vec<Arc<dyn Hook>>,
    on_cache_hit: Vec<Arc<dyn Hook>>,
    on_fallback: Vec<Arc<dyn Hook>>,
    on_timeout: Vec<Arc<dyn Hook>>,
}

impl HookSystem {
    /// Creates an empty hook system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a system with the default hooks (logging).
    pub fn with_defaults() -> Self {
        let mut system = Self::new();
        system.register(Arc::new(LoggingHook));
        system
    }

    fn slot(&self, event: HookEvent) -> &Vec<Arc<dyn Hook>> {
        match event {
            HookEvent::PreRefine => &self.pre_refine,
            HookEvent::PostRefine => &self.post_refine,
            HookEvent::OnCacheHit => &self.on_cache_hit,
            HookEvent::OnFallback => &self.on_fallback,
            HookEvent::OnTimeout => &self.on_timeout,
        }
    }

    /// Registers a hook for each of its events.
    pub fn register(&mut self, hook: Arc<dyn Hook>) {
        for &event in hook.events() {
            tracing::debug!(hook_name = hook.name(), event = %event, "Registering hook");

            let slot = match event {
                HookEvent::PreRefine => &mut self.pre_refine,
                HookEvent::PostRefine => &mut self.post_refine,
                HookEvent::OnCacheHit => &mut self.on_cache_hit,
                HookEvent::OnFallback => &mut self.on_fallback,
                HookEvent::OnTimeout => &mut self.on_timeout,
            };
            slot.push(hook.clone());
        }
    }

    /// Runs every hook registered for the context's event.
    pub async fn run(&self, context: HookContext<'_>) {
        let event = context.event();
        for hook in self.slot(event) {
            if let Err(e) = hook.execute(&context).await {
                tracing::warn!(hook_name = hook.name(), event = %event, error = %e, "Hook failed");
            }
        }
    }

    /// Returns the total number of registrations.
    pub fn count(&self) -> usize {
        self.pre_refine.len()
            + self.post_refine.len()
            + self.on_cache_hit.len()
            + self.on_fallback.len()
            + self.on_timeout.len()
    }

    /// Returns the number of hooks for an event.
    pub fn count_for_event(&self, event: HookEvent) -> usize {
        self.slot(event).len()
    }
}
