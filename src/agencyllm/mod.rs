// src/agencyllm/mod.rs

pub mod action;
pub mod characters;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod effects;
pub mod error;
pub mod event;
pub mod generator;
pub mod image_generation;
pub mod parser;
pub mod presets;
pub mod prompts;
pub mod reducer;
pub mod scheduler;
pub mod state;
pub mod strategy;

// Export the loop's main types so callers can write agencyllm::agencyllm::TurnScheduler
// as well as the crate-root re-exports.
pub use generator::TurnGenerator;
pub use scheduler::{SchedulerHandle, TurnScheduler};
pub use state::ProjectState;
pub use strategy::StrategyEngine;
