//! The TurnScheduler: the real-time loop that drives the agency.
//!
//! The scheduler runs as a single tokio task that owns the [`ProjectState`]. Everything
//! that may change the state arrives on a channel and goes through the reducer:
//!
//! - host intents sent through a [`SchedulerHandle`],
//! - oracle answers from the spawned generation task,
//! - side-effect outcomes such as generated images,
//! - timers: the next-turn delay, the typing cadence and the watchdog tick.
//!
//! Each turn walks `Idle -> Thinking -> Typing -> Applying -> Idle`. At most one oracle
//! call is in flight. When the watchdog abandons a stuck call, or a new session starts,
//! the generation task is aborted and the epoch bumped, so an answer that was already
//! queued is recognised as stale and dropped.
//!
//! Side effects are tagged with the session they were requested in. Results that arrive
//! after a restart are discarded instead of leaking into the new project.
//!
//! Pausing stops the typing within one character interval. A decided action is still
//! applied in full: typing is cosmetic, the state change is not.
//!
//! # Example
//!
//! ```rust,no_run
//! use agencyllm::clients::gemini::{GeminiClient, GeminiConfig, GeminiImageClient};
//! use agencyllm::config::AgencyConfig;
//! use agencyllm::generator::TurnGenerator;
//! use agencyllm::scheduler::TurnScheduler;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let gemini = GeminiConfig::from_env()?;
//!     let config = AgencyConfig::default();
//!     let generator = TurnGenerator::new(Arc::new(GeminiClient::new(gemini.clone())), config.clone());
//!     let images = Arc::new(GeminiImageClient::new(gemini));
//!
//!     let handle = TurnScheduler::new(generator, Some(images), config).spawn();
//!     let mut updates = handle.subscribe();
//!     handle.start_session("a brutalist portfolio for a sound artist")?;
//!
//!     while updates.changed().await.is_ok() {
//!         let state = updates.borrow().clone();
//!         if state.turn_count >= 10 {
//!             break;
//!         }
//!     }
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

use crate::action::Action;
use crate::characters::CharacterId;
use crate::config::AgencyConfig;
use crate::effects::{self, SideEffect};
use crate::error::{AgencyError, AgencyResult};
use crate::event::{AgencyEvent, EventHandler};
use crate::generator::TurnGenerator;
use crate::image_generation::ImageGenerationClient;
use crate::reducer::{self, Update};
use crate::state::{Position, ProjectState};
use crate::strategy::Strategy;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Where the current turn is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Thinking,
    Typing,
    Applying,
}

#[derive(Debug)]
enum Intent {
    StartSession(String),
    Pause,
    Resume,
    InjectEvent(String),
    MoveMoodboardItem { id: String, position: Position },
    Shutdown,
}

struct OracleReply {
    epoch: u64,
    strategy: Strategy,
    action: Action,
}

struct EffectResult {
    session: u64,
    update: Update,
}

struct Typing {
    action: Action,
    chars: Vec<char>,
    revealed: usize,
    next_at: Instant,
}

/// Builder for the scheduler task.
pub struct TurnScheduler {
    generator: TurnGenerator,
    images: Option<Arc<dyn ImageGenerationClient>>,
    config: AgencyConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
}

impl TurnScheduler {
    pub fn new(
        generator: TurnGenerator,
        images: Option<Arc<dyn ImageGenerationClient>>,
        config: AgencyConfig,
    ) -> Self {
        Self {
            generator,
            images,
            config,
            event_handler: None,
        }
    }

    /// Observe turn-loop events. The handler is shared with the generator.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.generator.set_event_handler(handler.clone());
        self.event_handler = Some(handler);
        self
    }

    /// Start the loop on the current tokio runtime. The loop stays idle until
    /// [`SchedulerHandle::start_session`] is called.
    pub fn spawn(self) -> SchedulerHandle {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ProjectState::default());
        let (phase_tx, phase_rx) = watch::channel(TurnPhase::Idle);
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (effect_tx, effect_rx) = mpsc::unbounded_channel();

        let runner = Runner {
            generator: Arc::new(self.generator),
            images: self.images,
            config: self.config,
            event_handler: self.event_handler,
            state_tx,
            phase_tx,
            reply_tx,
            effect_tx,
            phase: TurnPhase::Idle,
            session_started: false,
            paused: false,
            epoch: 0,
            session: 0,
            oracle: None,
            next_turn_at: None,
            thinking_since: None,
            last_activity: Instant::now(),
            typing: None,
        };

        let join = tokio::spawn(runner.run(intent_rx, reply_rx, effect_rx));

        SchedulerHandle {
            intents: intent_tx,
            state_rx,
            phase_rx,
            join,
        }
    }
}

/// Host-side handle to a running scheduler.
pub struct SchedulerHandle {
    intents: mpsc::UnboundedSender<Intent>,
    state_rx: watch::Receiver<ProjectState>,
    phase_rx: watch::Receiver<TurnPhase>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Reset the state to a fresh project for `initial_prompt` and start the loop.
    pub fn start_session(&self, initial_prompt: impl Into<String>) -> AgencyResult<()> {
        self.send(Intent::StartSession(initial_prompt.into()))
    }

    pub fn pause(&self) -> AgencyResult<()> {
        self.send(Intent::Pause)
    }

    pub fn resume(&self) -> AgencyResult<()> {
        self.send(Intent::Resume)
    }

    /// Queue a one-shot directive the next turn must react to.
    pub fn inject_event(&self, event: impl Into<String>) -> AgencyResult<()> {
        self.send(Intent::InjectEvent(event.into()))
    }

    pub fn move_moodboard_item(&self, id: impl Into<String>, position: Position) -> AgencyResult<()> {
        self.send(Intent::MoveMoodboardItem {
            id: id.into(),
            position,
        })
    }

    /// A receiver that sees every published state snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ProjectState> {
        self.state_rx.clone()
    }

    /// The latest published state.
    pub fn snapshot(&self) -> ProjectState {
        self.state_rx.borrow().clone()
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase_rx.borrow()
    }

    /// A receiver for turn phase changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<TurnPhase> {
        self.phase_rx.clone()
    }

    /// Stop the loop and wait for the task to finish. An in-flight oracle call is aborted.
    pub async fn shutdown(self) {
        let _ = self.intents.send(Intent::Shutdown);
        if let Err(err) = self.join.await {
            log::error!("agencyllm::scheduler: scheduler task ended abnormally: {}", err);
        }
    }

    fn send(&self, intent: Intent) -> AgencyResult<()> {
        self.intents
            .send(intent)
            .map_err(|_| AgencyError::SchedulerClosed.into())
    }
}

struct Runner {
    generator: Arc<TurnGenerator>,
    images: Option<Arc<dyn ImageGenerationClient>>,
    config: AgencyConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
    state_tx: watch::Sender<ProjectState>,
    phase_tx: watch::Sender<TurnPhase>,
    reply_tx: mpsc::UnboundedSender<OracleReply>,
    effect_tx: mpsc::UnboundedSender<EffectResult>,

    phase: TurnPhase,
    session_started: bool,
    paused: bool,
    epoch: u64,
    session: u64,
    oracle: Option<JoinHandle<()>>,
    next_turn_at: Option<Instant>,
    thinking_since: Option<Instant>,
    last_activity: Instant,
    typing: Option<Typing>,
}

/// Sleep until `deadline`, or forever when there is none.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

impl Runner {
    async fn run(
        mut self,
        mut intents: mpsc::UnboundedReceiver<Intent>,
        mut replies: mpsc::UnboundedReceiver<OracleReply>,
        mut effect_updates: mpsc::UnboundedReceiver<EffectResult>,
    ) {
        let mut watchdog = time::interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next_turn_at = self.next_turn_at;
            let next_char_at = self.typing.as_ref().map(|t| t.next_at);

            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.on_intent(intent).await,
                },
                Some(reply) = replies.recv() => self.on_reply(reply).await,
                Some(result) = effect_updates.recv() => self.on_effect(result).await,
                _ = sleep_until(next_turn_at) => {
                    self.next_turn_at = None;
                    self.begin_turn().await;
                }
                _ = sleep_until(next_char_at) => self.type_next().await,
                _ = watchdog.tick() => self.on_watchdog().await,
            }
        }
        self.abort_oracle();
        log::info!("agencyllm::scheduler: loop stopped at epoch {}", self.epoch);
    }

    /// Cancel the generation task, if any, together with its pending retries.
    fn abort_oracle(&mut self) {
        if let Some(task) = self.oracle.take() {
            if !task.is_finished() {
                log::debug!("agencyllm::scheduler: aborting oracle call of epoch {}", self.epoch);
            }
            task.abort();
        }
    }

    fn running(&self) -> bool {
        self.session_started && !self.paused
    }

    fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Run the reducer on the published state in place and return its side effects.
    fn commit(&mut self, update: Update) -> Vec<SideEffect> {
        let mut effects = Vec::new();
        self.state_tx.send_modify(|state| {
            let transition = reducer::reduce(std::mem::take(state), update);
            *state = transition.state;
            effects = transition.effects;
        });
        effects
    }

    async fn emit(&self, event: AgencyEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }

    async fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::StartSession(prompt) => {
                log::info!("agencyllm::scheduler: starting session");
                // Anything still in flight belongs to the previous session.
                self.abort_oracle();
                self.epoch += 1;
                self.session += 1;
                self.typing = None;
                self.thinking_since = None;
                self.set_phase(TurnPhase::Idle);
                self.commit(Update::SessionStarted { prompt });
                self.session_started = true;
                self.paused = false;
                self.last_activity = Instant::now();
                self.next_turn_at = Some(Instant::now() + self.config.first_turn_delay);
            }
            Intent::Pause => {
                if !self.running() {
                    return;
                }
                self.paused = true;
                self.next_turn_at = None;
                self.emit(AgencyEvent::Paused).await;
                if self.typing.is_some() {
                    self.finish_typing_early().await;
                }
            }
            Intent::Resume => {
                if !self.session_started || !self.paused {
                    return;
                }
                self.paused = false;
                self.last_activity = Instant::now();
                if self.phase == TurnPhase::Idle {
                    self.next_turn_at = Some(Instant::now() + self.config.first_turn_delay);
                }
                self.emit(AgencyEvent::Resumed).await;
            }
            Intent::InjectEvent(event) => {
                log::info!("agencyllm::scheduler: director event injected: {}", event);
                self.commit(Update::EventInjected { event });
            }
            Intent::MoveMoodboardItem { id, position } => {
                self.commit(Update::MoodboardMoved { id, position });
            }
            Intent::Shutdown => {}
        }
    }

    async fn begin_turn(&mut self) {
        if !self.running() || self.phase != TurnPhase::Idle || self.typing.is_some() {
            return;
        }

        self.epoch += 1;
        let epoch = self.epoch;
        let now = Instant::now();
        self.thinking_since = Some(now);
        self.last_activity = now;
        self.set_phase(TurnPhase::Thinking);
        self.commit(Update::ThinkingStarted);

        let snapshot = self.state_tx.borrow().clone();
        self.emit(AgencyEvent::TurnStarted {
            turn: snapshot.turn_count + 1,
            epoch,
        })
        .await;

        let generator = self.generator.clone();
        let reply_tx = self.reply_tx.clone();
        self.oracle = Some(tokio::spawn(async move {
            let (strategy, action) = generator.next_turn(&snapshot).await;
            // The scheduler may be gone; nothing to do then.
            let _ = reply_tx.send(OracleReply {
                epoch,
                strategy,
                action,
            });
        }));
    }

    async fn on_reply(&mut self, reply: OracleReply) {
        if reply.epoch != self.epoch || self.phase != TurnPhase::Thinking {
            log::warn!(
                "agencyllm::scheduler: ignoring stale answer from epoch {} (current {})",
                reply.epoch,
                self.epoch
            );
            self.emit(AgencyEvent::StaleResponseIgnored {
                epoch: reply.epoch,
                current_epoch: self.epoch,
            })
            .await;
            return;
        }

        self.thinking_since = None;
        self.oracle = None;
        log::debug!(
            "agencyllm::scheduler: {} answered in phase {} with {}",
            reply.action.speaker,
            reply.strategy.phase,
            reply.action.kind()
        );

        let types_out = self.running()
            && reply.action.speaker != CharacterId::System
            && !reply.action.message.is_empty();

        if !types_out {
            self.apply_turn(reply.action).await;
            return;
        }

        let speaker = reply.action.speaker;
        let chars: Vec<char> = reply.action.message.chars().collect();
        self.set_phase(TurnPhase::Typing);
        self.commit(Update::TypingStarted { speaker });
        self.emit(AgencyEvent::TypingStarted {
            speaker,
            chars: chars.len(),
        })
        .await;
        self.typing = Some(Typing {
            action: reply.action,
            chars,
            revealed: 0,
            next_at: Instant::now() + self.config.typing_start_delay,
        });
    }

    async fn type_next(&mut self) {
        if !self.running() {
            self.finish_typing_early().await;
            return;
        }

        let interval = self.config.typing_interval;
        let (buffer, done) = match self.typing.as_mut() {
            Some(typing) => {
                typing.revealed += 1;
                typing.next_at = Instant::now() + interval;
                let buffer: String = typing.chars[..typing.revealed.min(typing.chars.len())]
                    .iter()
                    .collect();
                (buffer, typing.revealed >= typing.chars.len())
            }
            None => return,
        };

        self.commit(Update::TypingProgress { buffer });
        if done {
            if let Some(typing) = self.typing.take() {
                self.apply_turn(typing.action).await;
            }
        }
    }

    /// Drop the partial typing buffer and apply the decided action anyway.
    async fn finish_typing_early(&mut self) {
        if let Some(typing) = self.typing.take() {
            self.commit(Update::TypingStopped);
            self.apply_turn(typing.action).await;
        }
    }

    async fn apply_turn(&mut self, action: Action) {
        self.set_phase(TurnPhase::Applying);
        self.typing = None;

        let speaker = action.speaker;
        let kind = action.kind();
        let effects = self.commit(Update::Turn(action));
        let turn = self.state_tx.borrow().turn_count;

        self.emit(AgencyEvent::TurnApplied {
            turn,
            speaker,
            action: kind,
        })
        .await;

        for effect in effects {
            let images = self.images.clone();
            let effect_tx = self.effect_tx.clone();
            let session = self.session;
            tokio::spawn(async move {
                let update = effects::run(effect, images).await;
                let _ = effect_tx.send(EffectResult { session, update });
            });
        }

        self.set_phase(TurnPhase::Idle);
        self.last_activity = Instant::now();
        if self.running() {
            self.next_turn_at = Some(Instant::now() + self.config.turn_delay);
        }
    }

    async fn on_effect(&mut self, result: EffectResult) {
        if result.session != self.session {
            log::warn!(
                "agencyllm::scheduler: dropping side-effect result from session {} (current {})",
                result.session,
                self.session
            );
            return;
        }
        let update = result.update;
        let event = match &update {
            Update::ImageFailed { prompt, error, .. } => Some(AgencyEvent::ImageFailed {
                prompt: prompt.clone(),
                error: error.clone(),
            }),
            _ => None,
        };
        let prompt = match &update {
            Update::ImageGenerated { prompt, .. } => Some(prompt.clone()),
            _ => None,
        };

        self.commit(update);

        if let Some(prompt) = prompt {
            let item_id = self
                .state_tx
                .borrow()
                .moodboard
                .last()
                .map(|item| item.id.clone())
                .unwrap_or_default();
            self.emit(AgencyEvent::ImageGenerated { prompt, item_id }).await;
        }
        if let Some(event) = event {
            self.emit(event).await;
        }
    }

    async fn on_watchdog(&mut self) {
        let now = Instant::now();

        if self.phase == TurnPhase::Thinking {
            let thinking_for = self
                .thinking_since
                .map(|since| now.duration_since(since))
                .unwrap_or_default();
            if thinking_for > self.config.max_thinking {
                log::warn!(
                    "agencyllm::scheduler: turn stuck thinking for {:?}, resetting",
                    thinking_for
                );
                self.abort_oracle();
                self.epoch += 1;
                self.thinking_since = None;
                self.commit(Update::ThinkingAborted);
                self.set_phase(TurnPhase::Idle);
                self.last_activity = now;
                if self.running() {
                    self.next_turn_at = Some(now + self.config.turn_delay);
                }
                self.emit(AgencyEvent::WatchdogReset { thinking_for }).await;
            }
            return;
        }

        if self.running() && self.phase == TurnPhase::Idle {
            let idle_for = now.duration_since(self.last_activity);
            if idle_for > self.config.idle_threshold {
                log::warn!(
                    "agencyllm::scheduler: loop idle for {:?}, forcing a turn",
                    idle_for
                );
                self.emit(AgencyEvent::IdleKick { idle_for }).await;
                self.next_turn_at = None;
                self.begin_turn().await;
            }
        }
    }
}
