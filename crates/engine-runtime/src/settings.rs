use engine_core::retry::RetryPolicy;
use std::time::Duration;

/// Knobs for one pipeline run. Defaults match the scheduled production
/// profile; tests tighten them.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Upper bound on records pulled per batch, so one run stays bounded in
    /// memory and time.
    pub max_batch_size: usize,
    /// Relative variance tolerated as WARN during reconciliation.
    pub warn_threshold: f64,
    /// Whether a WARN reconciliation still advances the watermark (with an
    /// alert) or parks the batch in quarantine.
    pub advance_on_warn: bool,
    /// Retry policy for transient source failures during extract.
    pub retry: RetryPolicy,
    /// Per-stage deadline; an overrun fails the run without touching the
    /// watermark.
    pub stage_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_batch_size: 10_000,
            warn_threshold: 0.01,
            advance_on_warn: true,
            retry: RetryPolicy::for_connector(),
            stage_timeout: Duration::from_secs(300),
        }
    }
}
