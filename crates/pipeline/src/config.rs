use std::time::Duration;

/// Default per-step timeout: one hour.
const DEFAULT_STEP_TIMEOUT_SECS: u64 = 3600;

/// Executor settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Applied to every step whose task does not set its own timeout.
    pub step_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var             | Default |
    /// |---------------------|---------|
    /// | `STEP_TIMEOUT_SECS` | `3600`  |
    pub fn from_env() -> Self {
        let step_timeout_secs: u64 = std::env::var("STEP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_STEP_TIMEOUT_SECS);
        Self {
            step_timeout: Duration::from_secs(step_timeout_secs),
        }
    }
}
