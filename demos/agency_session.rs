//! A live agency session against Gemini.
//!
//! Spawns the turn scheduler with a Gemini chat client and a Gemini image client, prints
//! every chat line as it is applied, drops a director event into the room halfway
//! through and writes the final build to `agency_build.html`.
//!
//! ```text
//! GEMINI_API_KEY=... cargo run --example agency_session -- "a portfolio for a tattoo studio"
//! ```
//!
//! Without a prompt argument one of the bundled prompts is used. Set `RUST_LOG=debug`
//! to see strategy decisions and oracle retries.

use agencyllm::clients::gemini::{GeminiClient, GeminiConfig, GeminiImageClient};
use agencyllm::config::AgencyConfig;
use agencyllm::event::{AgencyEvent, EventHandler};
use agencyllm::generator::TurnGenerator;
use agencyllm::presets::{find_event, DEFAULT_PROMPTS};
use agencyllm::scheduler::TurnScheduler;
use agencyllm::state::TaskStatus;
use async_trait::async_trait;
use std::sync::Arc;

const TURNS: u64 = 24;
const EVENT_AT_TURN: u64 = 12;

struct Narrator;

#[async_trait]
impl EventHandler for Narrator {
    async fn on_event(&self, event: &AgencyEvent) {
        match event {
            AgencyEvent::FallbackUsed { phase, attempts } => {
                println!("   [oracle down during {} after {} attempts]", phase, attempts);
            }
            AgencyEvent::WatchdogReset { thinking_for } => {
                println!("   [watchdog reset after {:?}]", thinking_for);
            }
            AgencyEvent::ImageGenerated { prompt, .. } => {
                println!("   [image pinned: {}]", prompt);
            }
            AgencyEvent::ImageFailed { error, .. } => {
                println!("   [image failed: {}]", error);
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    agencyllm::init_logger();

    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_PROMPTS[0].to_string());

    let gemini = GeminiConfig::from_env()?;
    let config = AgencyConfig::default();
    let generator = TurnGenerator::new(Arc::new(GeminiClient::new(gemini.clone())), config.clone());
    let images = Arc::new(GeminiImageClient::new(gemini));

    let handle = TurnScheduler::new(generator, Some(images), config)
        .with_event_handler(Arc::new(Narrator))
        .spawn();
    let mut updates = handle.subscribe();

    println!("Brief: {}\n", prompt);
    handle.start_session(prompt)?;

    let mut printed = 0;
    let mut event_sent = false;
    while updates.changed().await.is_ok() {
        let state = updates.borrow_and_update().clone();

        for message in state.messages.iter().skip(printed) {
            println!("{:>10}: {}", message.speaker.display_name(), message.text);
        }
        printed = state.messages.len();

        if !event_sent && state.turn_count >= EVENT_AT_TURN {
            if let Some(event) = find_event("Client Rage") {
                handle.inject_event(event.value)?;
                event_sent = true;
            }
        }

        if state.turn_count >= TURNS {
            break;
        }
    }

    let state = handle.snapshot();
    handle.shutdown().await;

    println!(
        "\n{} turns, {} images, tasks todo/doing/done: {}/{}/{}",
        state.turn_count,
        state.image_count(),
        state.count_tasks(TaskStatus::Todo),
        state.count_tasks(TaskStatus::Doing),
        state.count_tasks(TaskStatus::Done)
    );
    state.export_code("agency_build.html")?;
    println!("Build written to agency_build.html");
    Ok(())
}
