//! Turn-loop event system.
//!
//! Provides a callback-based observability layer for the agency. Implement
//! [`EventHandler`] to receive real-time notifications about:
//!
//! - **Turn lifecycle**: turn start, strategy selection, typing, application
//! - **Oracle health**: failed attempts and fallback use
//! - **Liveness**: watchdog resets, idle kicks and stale answers dropped
//! - **Side effects**: image generation outcomes
//! - **Host intents**: pause and resume
//!
//! The single [`on_event`](EventHandler::on_event) method has a default no-op
//! implementation. The handler is shared as `Arc<dyn EventHandler>`; registering it on
//! the [`TurnScheduler`](crate::scheduler::TurnScheduler) also hands it to the
//! scheduler's [`TurnGenerator`](crate::generator::TurnGenerator).
//!
//! # Example
//!
//! ```rust,no_run
//! use agencyllm::event::{AgencyEvent, EventHandler};
//! use async_trait::async_trait;
//!
//! struct Printer;
//!
//! #[async_trait]
//! impl EventHandler for Printer {
//!     async fn on_event(&self, event: &AgencyEvent) {
//!         match event {
//!             AgencyEvent::TurnApplied { turn, speaker, action } => {
//!                 println!("turn {}: {} did {}", turn, speaker, action);
//!             }
//!             AgencyEvent::FallbackUsed { attempts, .. } => {
//!                 println!("oracle gave up after {} attempts", attempts);
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

use crate::action::ActionKind;
use crate::characters::CharacterId;
use crate::strategy::Phase;
use async_trait::async_trait;
use std::time::Duration;

/// Events emitted by the generator and the scheduler.
///
/// # Event Flow (during a typical turn)
///
/// ```text
/// TurnStarted
///   └─ StrategyChosen
///   └─ (per failed oracle attempt) OracleAttemptFailed
///   └─ (retries exhausted) FallbackUsed
///   └─ TypingStarted          (skipped for narrator lines and while paused)
/// TurnApplied
///   └─ (generate_image) ImageGenerated | ImageFailed
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum AgencyEvent {
    /// The scheduler left `Idle` and asked the generator for a turn.
    TurnStarted {
        /// Turn number this attempt will produce once applied.
        turn: u64,
        /// Epoch of the in-flight request. Answers from other epochs are stale.
        epoch: u64,
    },

    /// The StrategyEngine picked a phase for the turn.
    StrategyChosen {
        phase: Phase,
        speaker: Option<CharacterId>,
        forced_action: Option<ActionKind>,
    },

    /// One oracle attempt failed and will be retried (or fall back).
    OracleAttemptFailed {
        attempt: usize,
        max_attempts: usize,
        error: String,
    },

    /// Every attempt failed and the scripted fallback action is used.
    FallbackUsed { phase: Phase, attempts: usize },

    /// The decided message started typing out.
    TypingStarted { speaker: CharacterId, chars: usize },

    /// The reducer applied a turn.
    TurnApplied {
        turn: u64,
        speaker: CharacterId,
        action: ActionKind,
    },

    /// An oracle answer arrived for an abandoned turn and was dropped.
    StaleResponseIgnored { epoch: u64, current_epoch: u64 },

    /// The watchdog abandoned a turn stuck in `Thinking`.
    WatchdogReset { thinking_for: Duration },

    /// The watchdog forced a turn after the loop sat idle too long.
    IdleKick { idle_for: Duration },

    /// An image side effect landed on the moodboard.
    ImageGenerated { prompt: String, item_id: String },

    /// An image side effect failed.
    ImageFailed { prompt: String, error: String },

    /// The host paused the loop.
    Paused,

    /// The host resumed the loop.
    Resumed,
}

/// Trait for receiving agency events.
///
/// The default implementation is a no-op, so implementors only override what they
/// need. Handlers run inline on the scheduler task; keep them quick.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Called for every [`AgencyEvent`].
    async fn on_event(&self, _event: &AgencyEvent) {}
}
