//! Admission queue policy: priority tiers, fairness and hard limit.
//!
//! Lower priority values dequeue first. Default requesters get the lowest
//! value, elevated requesters the next, and fairness-demoted submissions the
//! highest. The values here are only the policy; the queue itself lives in
//! the pipeline crate.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Priority of requests from unclassified requesters.
pub const DEFAULT_PRIORITY: i32 = 1;

/// Priority of requests from elevated (token-bearing) requesters.
pub const DEFAULT_ELEVATED_PRIORITY: i32 = 2;

/// Tier that fairness-demoted submissions land in.
pub const DEFAULT_LOWEST_PRIORITY: i32 = 3;

/// Queued submissions per requester above which new ones are demoted.
pub const DEFAULT_HOG_THRESHOLD: usize = 10;

/// Total queued + running submissions above which intake is refused.
pub const DEFAULT_HARD_LIMIT: usize = 100;

// ---------------------------------------------------------------------------
// Requester
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterClass {
    Default,
    Elevated,
}

/// Who is asking, as far as fairness is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: String,
    pub class: RequesterClass,
}

impl Requester {
    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".into(),
            class: RequesterClass::Default,
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Admission queue configuration, passed by value into the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub default_priority: i32,
    pub elevated_priority: i32,
    pub lowest_priority: i32,
    pub hog_threshold: usize,
    pub hard_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_PRIORITY,
            elevated_priority: DEFAULT_ELEVATED_PRIORITY,
            lowest_priority: DEFAULT_LOWEST_PRIORITY,
            hog_threshold: DEFAULT_HOG_THRESHOLD,
            hard_limit: DEFAULT_HARD_LIMIT,
        }
    }
}

impl QueueConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default |
    /// |---------------------------|---------|
    /// | `QUEUE_DEFAULT_PRIORITY`  | `1`     |
    /// | `QUEUE_ELEVATED_PRIORITY` | `2`     |
    /// | `QUEUE_LOWEST_PRIORITY`   | `3`     |
    /// | `QUEUE_HOG_THRESHOLD`     | `10`    |
    /// | `QUEUE_HARD_LIMIT`        | `100`   |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        let config = Self {
            default_priority: env_or("QUEUE_DEFAULT_PRIORITY", defaults.default_priority)?,
            elevated_priority: env_or("QUEUE_ELEVATED_PRIORITY", defaults.elevated_priority)?,
            lowest_priority: env_or("QUEUE_LOWEST_PRIORITY", defaults.lowest_priority)?,
            hog_threshold: env_or("QUEUE_HOG_THRESHOLD", defaults.hog_threshold)?,
            hard_limit: env_or("QUEUE_HARD_LIMIT", defaults.hard_limit)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// The lowest tier must not outrank either regular tier.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.lowest_priority < self.default_priority.max(self.elevated_priority) {
            return Err(CoreError::Internal(format!(
                "lowest_priority ({}) must not dequeue before the default ({}) or elevated ({}) tiers",
                self.lowest_priority, self.default_priority, self.elevated_priority
            )));
        }
        if self.hard_limit == 0 {
            return Err(CoreError::Internal("hard_limit must be positive".into()));
        }
        Ok(())
    }

    /// Base priority for a requester class, before fairness demotion.
    pub fn priority_for(&self, class: RequesterClass) -> i32 {
        match class {
            RequesterClass::Default => self.default_priority,
            RequesterClass::Elevated => self.elevated_priority,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, CoreError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Internal(format!("{key} has an invalid value: '{raw}'"))),
        Err(_) => Ok(default),
    }
}
