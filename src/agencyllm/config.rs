//! Configuration for the agency turn engine.
//!
//! Provides the [`AgencyConfig`] struct holding every threshold and delay the
//! strategy, generator and scheduler consult. Users construct this manually (or
//! start from [`AgencyConfig::default`] and chain `with_*` calls). No file parsing
//! dependencies are required.
//!
//! # Example
//!
//! ```rust
//! use agencyllm::config::{AgencyConfig, ProgressPolicy};
//! use std::time::Duration;
//!
//! let config = AgencyConfig::default()
//!     .with_turn_delay(Duration::from_secs(2))
//!     .with_progress_policy(ProgressPolicy::FixedTurns { turns: 2 });
//!
//! assert_eq!(config.brief_threshold, 200);
//! assert_eq!(config.turn_delay, Duration::from_secs(2));
//! ```

use std::time::Duration;

/// How the Execution phase decides between "keep building" and "declare done".
///
/// [`ProgressPolicy::Weighted`] is a coin flip that ignores how long the task has run;
/// [`ProgressPolicy::FixedTurns`] is a deterministic alternative tied to turns in progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressPolicy {
    /// Keep building with the given probability (0.0..=1.0), otherwise complete.
    Weighted { continue_probability: f64 },
    /// Complete once the task has been `doing` for at least `turns` turns.
    FixedTurns { turns: u64 },
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        ProgressPolicy::Weighted {
            continue_probability: 0.6,
        }
    }
}

/// Global configuration for the agency simulation.
///
/// Defaults give a watchable pacing: a 200 character brief
/// threshold, three moodboard images before any code, 3.5 s between turns, 30 ms per
/// typed character and a watchdog that gives up on the oracle after a minute.
#[derive(Clone, Debug)]
pub struct AgencyConfig {
    /// Briefs shorter than this (in characters) are still "just the raw prompt".
    pub brief_threshold: usize,
    /// Minimum number of moodboard images before planning/coding may start.
    pub min_moodboard_images: usize,
    /// Number of trailing chat messages re-supplied to the oracle.
    pub history_window: usize,
    /// Number of brief characters included in the state summary.
    pub brief_excerpt_chars: usize,
    /// Attempts per turn before the fallback action is used.
    pub max_attempts: usize,
    /// Delay before retry `n` is `retry_base_delay * n` (linear backoff).
    pub retry_base_delay: Duration,
    /// Execution-phase progress decision.
    pub progress_policy: ProgressPolicy,
    /// Delay before the very first turn of a session.
    pub first_turn_delay: Duration,
    /// Delay between the end of one turn and the start of the next.
    pub turn_delay: Duration,
    /// Pause between the oracle answering and the first typed character.
    pub typing_start_delay: Duration,
    /// Interval between typed characters.
    pub typing_interval: Duration,
    /// How often the watchdog checks liveness.
    pub watchdog_interval: Duration,
    /// Longest a turn may stay in `Thinking` before it is abandoned.
    pub max_thinking: Duration,
    /// Longest the loop may stay idle before a turn is forced.
    pub idle_threshold: Duration,
}

impl Default for AgencyConfig {
    fn default() -> Self {
        Self {
            brief_threshold: 200,
            min_moodboard_images: 3,
            history_window: 6,
            brief_excerpt_chars: 500,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            progress_policy: ProgressPolicy::default(),
            first_turn_delay: Duration::from_millis(500),
            turn_delay: Duration::from_millis(3500),
            typing_start_delay: Duration::from_millis(500),
            typing_interval: Duration::from_millis(30),
            watchdog_interval: Duration::from_secs(5),
            max_thinking: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(30),
        }
    }
}

impl AgencyConfig {
    pub fn with_brief_threshold(mut self, chars: usize) -> Self {
        self.brief_threshold = chars;
        self
    }

    pub fn with_min_moodboard_images(mut self, count: usize) -> Self {
        self.min_moodboard_images = count;
        self
    }

    pub fn with_history_window(mut self, messages: usize) -> Self {
        self.history_window = messages;
        self
    }

    /// Set the attempt budget per turn. Values below one are clamped to one.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_progress_policy(mut self, policy: ProgressPolicy) -> Self {
        self.progress_policy = policy;
        self
    }

    pub fn with_first_turn_delay(mut self, delay: Duration) -> Self {
        self.first_turn_delay = delay;
        self
    }

    pub fn with_turn_delay(mut self, delay: Duration) -> Self {
        self.turn_delay = delay;
        self
    }

    /// Set both typing delays at once.
    pub fn with_typing(mut self, start_delay: Duration, interval: Duration) -> Self {
        self.typing_start_delay = start_delay;
        self.typing_interval = interval;
        self
    }

    /// Set the watchdog tick, the thinking ceiling and the idle threshold.
    pub fn with_watchdog(
        mut self,
        interval: Duration,
        max_thinking: Duration,
        idle_threshold: Duration,
    ) -> Self {
        self.watchdog_interval = interval;
        self.max_thinking = max_thinking;
        self.idle_threshold = idle_threshold;
        self
    }
}
