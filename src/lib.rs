//! # AgencyLLM
//!
//! AgencyLLM runs a simulated creative agency: five characters (a product manager, an art
//! director, an engineer, a copywriter and an intern) build a single-page website one turn
//! at a time, with a remote Large Language Model deciding who speaks, what they say and
//! what they do.
//!
//! The crate provides carefully layered abstractions for:
//!
//! * **Strategy**: [`StrategyEngine`] is a pure function from project state to the next
//!   phase (brief, visuals, planning, building, pickup, banter) with a forced speaker and
//!   action where the pipeline demands one
//! * **Generation**: [`TurnGenerator`] asks the oracle through the [`ClientWrapper`] trait,
//!   parses its unreliable JSON with [`parser`], repairs it against the strategy and falls
//!   back to a scripted line when the oracle stays unavailable
//! * **State**: [`ProjectState`] changes only through the pure [`reducer`], which also
//!   emits side effects such as image generation
//! * **Scheduling**: [`TurnScheduler`] drives turns in real time with typing simulation,
//!   pause/resume, director events and a watchdog that recovers stuck turns
//! * **Providers**: [`clients::gemini`] implements both the chat and the image contracts
//!   for Google Gemini
//!
//! ## Getting Started
//!
//! ```rust,no_run
//! use agencyllm::clients::gemini::{GeminiClient, GeminiConfig, GeminiImageClient};
//! use agencyllm::{AgencyConfig, TurnGenerator, TurnScheduler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     agencyllm::init_logger();
//!
//!     let gemini = GeminiConfig::from_env()?;
//!     let config = AgencyConfig::default();
//!     let generator = TurnGenerator::new(Arc::new(GeminiClient::new(gemini.clone())), config.clone());
//!     let handle = TurnScheduler::new(generator, Some(Arc::new(GeminiImageClient::new(gemini))), config)
//!         .spawn();
//!
//!     handle.start_session(agencyllm::presets::DEFAULT_PROMPTS[0])?;
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!
//!     let state = handle.snapshot();
//!     println!("{} turns, {} tasks", state.turn_count, state.tasks.len());
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// Library code only logs through the `log` facade; applications opt in to `RUST_LOG`
/// driven diagnostics by calling this helper.
///
/// ```rust
/// agencyllm::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

// Import the top-level `agencyllm` module.
pub mod agencyllm;

// Re-exporting key items for easier external access.
pub use agencyllm::action;
pub use agencyllm::action::{Action, ActionKind, ActionPayload};
pub use agencyllm::characters;
pub use agencyllm::characters::CharacterId;
pub use agencyllm::client_wrapper;
pub use agencyllm::client_wrapper::{ClientWrapper, GenerationRequest, Message, ModelTier, Role};
pub use agencyllm::clients;
pub use agencyllm::config;
pub use agencyllm::config::{AgencyConfig, ProgressPolicy};
pub use agencyllm::effects;
pub use agencyllm::error;
pub use agencyllm::error::{AgencyError, AgencyResult};
pub use agencyllm::event;
pub use agencyllm::event::{AgencyEvent, EventHandler};
pub use agencyllm::generator;
pub use agencyllm::generator::TurnGenerator;
pub use agencyllm::image_generation;
pub use agencyllm::parser;
pub use agencyllm::presets;
pub use agencyllm::prompts;
pub use agencyllm::reducer;
pub use agencyllm::scheduler;
pub use agencyllm::scheduler::{SchedulerHandle, TurnPhase, TurnScheduler};
pub use agencyllm::state;
pub use agencyllm::state::ProjectState;
pub use agencyllm::strategy;
pub use agencyllm::strategy::{Phase, Strategy, StrategyEngine};
