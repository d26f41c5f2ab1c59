use agencyllm::characters::CharacterId;
use agencyllm::client_wrapper::{ClientWrapper, GenerationRequest, ModelTier};
use agencyllm::config::AgencyConfig;
use agencyllm::event::{AgencyEvent, EventHandler};
use agencyllm::generator::TurnGenerator;
use agencyllm::image_generation::{
    ImageData, ImageGenerationClient, ImageGenerationOptions, ImageGenerationResponse,
};
use agencyllm::reducer::BOOT_MESSAGE;
use agencyllm::scheduler::{SchedulerHandle, TurnPhase, TurnScheduler};
use agencyllm::state::{NotificationLevel, Position, ProjectState};
use async_trait::async_trait;
use serde_json::json;
use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

const LONG_BRIEF: &str = "Portfolio for a sound artist. Brutalist grid, oversized monospace type, \
    a hero with a looping waveform, a works index with audio previews, an about page with a \
    press kit download and a contact form. Dark palette with one acid green accent colour.";

/// Plays whatever role the prompt requires, with a well-formed answer every time.
struct RoleplayClient {
    calls: AtomicUsize,
    message: String,
}

impl RoleplayClient {
    fn new() -> Arc<Self> {
        Self::with_message("On it, team.")
    }

    fn with_message(message: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            message: message.to_string(),
        })
    }
}

fn required(context: &str, label: &str) -> Option<String> {
    context
        .lines()
        .find_map(|line| line.strip_prefix(label))
        .map(|value| value.trim().to_string())
        .filter(|value| value != "Any")
}

fn roleplay(request: &GenerationRequest, message: &str) -> String {
    let speaker = required(&request.user_context, "REQUIRED SPEAKER:")
        .unwrap_or_else(|| "ramona".to_string());
    let action = required(&request.user_context, "REQUIRED ACTION:");
    let payload = match action.as_deref() {
        Some("update_brief") => json!({ "content": LONG_BRIEF }),
        Some("generate_image") => json!({ "prompt": "acid green waveform on black paper" }),
        Some("add_task") => json!({ "tasks": ["Hero section", "Navigation bar", "Headline copy"] }),
        Some("update_code") => json!({ "content": "<!DOCTYPE html><html><body>build</body></html>" }),
        _ => json!({}),
    };
    json!({
        "speaker": speaker,
        "message": message,
        "emotion": "working",
        "action": action.unwrap_or_else(|| "wait".to_string()),
        "actionPayload": payload,
    })
    .to_string()
}

#[async_trait]
impl ClientWrapper for RoleplayClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(roleplay(request, &self.message))
    }

    fn model_name(&self, _tier: ModelTier) -> &str {
        "roleplay"
    }
}

/// The first call hangs far past the watchdog limit and then answers with a brief
/// that must never reach the state. Later calls behave normally.
struct HangingClient {
    calls: AtomicUsize,
    hang: Duration,
}

#[async_trait]
impl ClientWrapper for HangingClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(self.hang).await;
            return Ok(json!({
                "speaker": "kevin",
                "message": "late",
                "action": "update_brief",
                "actionPayload": { "content": "STALE BRIEF" }
            })
            .to_string());
        }
        Ok(roleplay(request, "Back online."))
    }

    fn model_name(&self, _tier: ModelTier) -> &str {
        "hanging"
    }
}

/// Tracks how many `generate` calls overlap. The first call hangs; the counter drops
/// even when the call is cancelled.
#[derive(Default)]
struct CountingClient {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClientWrapper for CountingClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(90)).await;
        }
        Ok(roleplay(request, "Back online."))
    }

    fn model_name(&self, _tier: ModelTier) -> &str {
        "counting"
    }
}

struct MockImageClient {
    fail: bool,
}

/// Succeeds after a long render.
struct SlowImageClient {
    delay: Duration,
}

#[async_trait]
impl ImageGenerationClient for SlowImageClient {
    async fn generate_image(
        &self,
        _prompt: &str,
        _options: ImageGenerationOptions,
    ) -> Result<ImageGenerationResponse, Box<dyn Error + Send + Sync>> {
        tokio::time::sleep(self.delay).await;
        Ok(ImageGenerationResponse {
            images: vec![ImageData {
                url: None,
                b64_json: Some("iVBORw0KGgoAAAANSUhEUg".to_string()),
                mime_type: Some("image/png".to_string()),
            }],
            revised_prompt: None,
        })
    }

    fn model_name(&self) -> &str {
        "slow-image"
    }
}

#[async_trait]
impl ImageGenerationClient for MockImageClient {
    async fn generate_image(
        &self,
        _prompt: &str,
        _options: ImageGenerationOptions,
    ) -> Result<ImageGenerationResponse, Box<dyn Error + Send + Sync>> {
        if self.fail {
            return Err("quota exceeded".into());
        }
        Ok(ImageGenerationResponse {
            images: vec![ImageData {
                url: None,
                b64_json: Some("iVBORw0KGgoAAAANSUhEUg".to_string()),
                mime_type: None,
            }],
            revised_prompt: None,
        })
    }

    fn model_name(&self) -> &str {
        "mock-image"
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<AgencyEvent>>,
}

impl Recorder {
    fn any(&self, pred: impl Fn(&AgencyEvent) -> bool) -> bool {
        self.events.lock().unwrap().iter().any(pred)
    }
}

#[async_trait]
impl EventHandler for Recorder {
    async fn on_event(&self, event: &AgencyEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn fast_config() -> AgencyConfig {
    AgencyConfig::default()
        .with_retry_base_delay(Duration::ZERO)
        .with_first_turn_delay(Duration::from_millis(10))
        .with_turn_delay(Duration::from_millis(200))
        .with_typing(Duration::from_millis(10), Duration::from_millis(5))
        .with_watchdog(
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(30),
        )
}

fn spawn(
    client: Arc<dyn ClientWrapper>,
    images: Option<Arc<dyn ImageGenerationClient>>,
    config: AgencyConfig,
    recorder: Arc<Recorder>,
) -> SchedulerHandle {
    let generator = TurnGenerator::new(client, config.clone());
    TurnScheduler::new(generator, images, config)
        .with_event_handler(recorder)
        .spawn()
}

async fn wait_for_state(
    rx: &mut watch::Receiver<ProjectState>,
    pred: impl Fn(&ProjectState) -> bool,
) -> ProjectState {
    tokio::time::timeout(Duration::from_secs(600), async {
        loop {
            {
                let state = rx.borrow_and_update();
                if pred(&state) {
                    return state.clone();
                }
            }
            rx.changed().await.expect("scheduler stopped");
        }
    })
    .await
    .expect("state condition not reached")
}

async fn wait_for_event(recorder: &Recorder, pred: impl Fn(&AgencyEvent) -> bool) {
    tokio::time::timeout(Duration::from_secs(600), async {
        while !recorder.any(&pred) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await
    .expect("event not observed")
}

#[tokio::test(start_paused = true)]
async fn test_loop_waits_for_session_start() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(client.clone(), None, fast_config(), recorder);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(handle.snapshot().turn_count, 0);
    assert_eq!(handle.phase(), TurnPhase::Idle);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_first_turn_writes_brief_and_types_message() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(client, None, fast_config(), recorder.clone());
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    let state = wait_for_state(&mut updates, |s| s.turn_count >= 1).await;

    assert_eq!(state.messages[0].text, BOOT_MESSAGE);
    assert_eq!(state.messages[1].speaker, CharacterId::ProductManager);
    assert_eq!(state.messages[1].text, "On it, team.");
    assert!(state.brief.chars().count() > 200);
    assert!(recorder.any(|e| matches!(
        e,
        AgencyEvent::TypingStarted {
            speaker: CharacterId::ProductManager,
            chars: 12
        }
    )));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_turns_are_applied_in_order() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(
        client,
        Some(Arc::new(MockImageClient { fail: false })),
        fast_config(),
        recorder.clone(),
    );
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    wait_for_state(&mut updates, |s| s.turn_count >= 6).await;

    let turns: Vec<u64> = recorder
        .events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|e| match e {
            AgencyEvent::TurnApplied { turn, .. } => Some(*turn),
            _ => None,
        })
        .collect();
    assert!(turns.len() >= 6);
    assert!(turns.windows(2).all(|w| w[1] == w[0] + 1));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_mid_typing_still_applies_decided_action() {
    let client = RoleplayClient::with_message(
        "This is a long message that takes a while to type out character by character.",
    );
    let recorder = Arc::new(Recorder::default());
    let config = fast_config().with_typing(Duration::from_millis(10), Duration::from_millis(500));
    let handle = spawn(client.clone(), None, config, recorder);
    let mut updates = handle.subscribe();
    let mut phases = handle.subscribe_phase();

    handle.start_session("a simple portfolio site").unwrap();
    phases
        .wait_for(|p| *p == TurnPhase::Typing)
        .await
        .expect("scheduler stopped");
    handle.pause().unwrap();

    let state = wait_for_state(&mut updates, |s| s.turn_count == 1).await;
    assert!(state.typing_buffer.is_empty());
    assert_eq!(state.typing_speaker, None);
    assert!(state.brief.chars().count() > 200);
    assert_eq!(
        state.messages.last().map(|m| m.text.as_str()),
        Some("This is a long message that takes a while to type out character by character.")
    );

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(handle.snapshot().turn_count, 1);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    handle.resume().unwrap();
    wait_for_state(&mut updates, |s| s.turn_count >= 2).await;
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_resets_stuck_turn_and_drops_late_answer() {
    let client = Arc::new(HangingClient {
        calls: AtomicUsize::new(0),
        hang: Duration::from_secs(90),
    });
    let recorder = Arc::new(Recorder::default());
    let config = fast_config().with_turn_delay(Duration::from_secs(2));
    let handle = spawn(client, None, config, recorder.clone());
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    let state = wait_for_state(&mut updates, |s| s.turn_count >= 1).await;
    assert!(recorder.any(|e| matches!(e, AgencyEvent::WatchdogReset { .. })));
    assert!(state
        .notifications
        .iter()
        .any(|n| n.level == NotificationLevel::Warning
            && n.message == "Agent computation timed out. Resetting..."));

    // Well past the point where the abandoned call would have answered.
    tokio::time::sleep(Duration::from_secs(120)).await;
    let state = handle.snapshot();
    assert_ne!(state.brief, "STALE BRIEF");
    assert!(state.messages.iter().all(|m| m.text != "late"));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_watchdog_reset_keeps_a_single_oracle_call_in_flight() {
    let client = Arc::new(CountingClient::default());
    let recorder = Arc::new(Recorder::default());
    let config = fast_config().with_turn_delay(Duration::from_secs(2));
    let handle = spawn(client.clone(), None, config, recorder.clone());
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    wait_for_event(&recorder, |e| matches!(e, AgencyEvent::WatchdogReset { .. })).await;
    wait_for_state(&mut updates, |s| s.turn_count >= 1).await;

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(client.calls.load(Ordering::SeqCst) >= 2);
    assert_eq!(client.max_in_flight.load(Ordering::SeqCst), 1);
    handle.shutdown().await;
    assert_eq!(client.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_idle_loop_is_kicked() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let config = fast_config()
        .with_turn_delay(Duration::from_secs(600))
        .with_watchdog(
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );
    let handle = spawn(client, None, config, recorder.clone());
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    wait_for_state(&mut updates, |s| s.turn_count >= 2).await;
    assert!(recorder.any(|e| matches!(e, AgencyEvent::IdleKick { .. })));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_generated_images_land_on_moodboard() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(
        client,
        Some(Arc::new(MockImageClient { fail: false })),
        fast_config(),
        recorder.clone(),
    );
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    let state = wait_for_state(&mut updates, |s| s.image_count() >= 1).await;
    let item = &state.moodboard[0];
    assert_eq!(item.owner, Some(CharacterId::ArtDirector));
    assert!(item.content.starts_with("data:image/png;base64,"));
    assert!((20.0..=80.0).contains(&item.position.x));
    assert!((-10.0..=10.0).contains(&item.rotation));
    assert!(recorder.any(|e| matches!(e, AgencyEvent::ImageGenerated { .. })));

    handle
        .move_moodboard_item(item.id.clone(), Position { x: 150.0, y: 12.0 })
        .unwrap();
    let id = item.id.clone();
    let state = wait_for_state(&mut updates, |s| {
        s.moodboard
            .iter()
            .any(|i| i.id == id && i.position == Position { x: 100.0, y: 12.0 })
    })
    .await;
    assert!(state.image_count() >= 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_image_is_reported_and_loop_continues() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(
        client,
        Some(Arc::new(MockImageClient { fail: true })),
        fast_config(),
        recorder.clone(),
    );
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    let state = wait_for_state(&mut updates, |s| {
        s.notifications.iter().any(|n| n.title == "Generation Failed")
    })
    .await;
    assert_eq!(state.image_count(), 0);
    wait_for_state(&mut updates, |s| s.turn_count >= 4).await;
    assert!(recorder.any(|e| matches!(e, AgencyEvent::ImageFailed { .. })));
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_injected_event_is_answered() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(client, None, fast_config(), recorder);
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    wait_for_state(&mut updates, |s| s.turn_count >= 1).await;

    handle.inject_event("Client Rage").unwrap();
    let state = wait_for_state(&mut updates, |s| s.pending_event.is_some()).await;
    assert!(state
        .messages
        .iter()
        .any(|m| m.text == "DIRECTOR NOTE: Client Rage"));

    let state = wait_for_state(&mut updates, |s| s.pending_event.is_none()).await;
    let note = state
        .messages
        .iter()
        .position(|m| m.text == "DIRECTOR NOTE: Client Rage")
        .unwrap();
    assert!(state.messages.len() > note + 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_restarting_session_resets_state() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(client, None, fast_config(), recorder);
    let mut updates = handle.subscribe();

    handle.start_session("a simple portfolio site").unwrap();
    wait_for_state(&mut updates, |s| s.turn_count >= 2).await;

    handle.start_session("a bakery landing page").unwrap();
    let state = wait_for_state(&mut updates, |s| s.brief == "a bakery landing page").await;
    assert_eq!(state.turn_count, 0);
    assert_eq!(state.messages.len(), 1);
    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_images_from_previous_session_are_dropped() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(
        client,
        Some(Arc::new(SlowImageClient {
            delay: Duration::from_secs(10),
        })),
        fast_config(),
        recorder.clone(),
    );
    let mut updates = handle.subscribe();

    // A long brief sends the first turn straight to image generation.
    handle.start_session(LONG_BRIEF).unwrap();
    wait_for_state(&mut updates, |s| s.turn_count >= 1).await;
    assert_eq!(handle.snapshot().image_count(), 0);

    handle.start_session("a bakery landing page").unwrap();
    handle.pause().unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;

    let state = handle.snapshot();
    assert_eq!(state.brief, "a bakery landing page");
    assert!(state.moodboard.is_empty());
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].text, BOOT_MESSAGE);
    assert!(!recorder.any(|e| matches!(e, AgencyEvent::ImageGenerated { .. })));
    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_state_channel() {
    let client = RoleplayClient::new();
    let recorder = Arc::new(Recorder::default());
    let handle = spawn(client, None, fast_config(), recorder);
    let mut updates = handle.subscribe();
    let phases = handle.subscribe_phase();
    handle.shutdown().await;

    assert!(updates.changed().await.is_err());
    assert_eq!(*phases.borrow(), TurnPhase::Idle);
}
