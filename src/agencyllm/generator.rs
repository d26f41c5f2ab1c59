//! The TurnGenerator: from a [`Strategy`] to a validated [`Action`].
//!
//! One call to [`TurnGenerator::generate_turn`] performs up to
//! [`AgencyConfig::max_attempts`] oracle round-trips. Every failure, whether transport,
//! empty answer, unparseable text or contract violation, is retried after a linearly
//! growing delay. When the budget is spent the narrator's fallback line is returned,
//! so the method itself never fails.
//!
//! Validation enforces policy over the oracle's answer:
//!
//! - a forced speaker always wins over whatever name the oracle used;
//! - a forced action kind must match, except on the final attempt where the answer is
//!   coerced to the forced kind with safe defaults;
//! - a missing brief becomes a clearly-marked placeholder and a missing build keeps the
//!   current code;
//! - a `move_task` pointing at the wrong card is redirected to the strategy's target.
//!
//! # Example
//!
//! ```rust,no_run
//! use agencyllm::clients::gemini::{GeminiClient, GeminiConfig};
//! use agencyllm::config::AgencyConfig;
//! use agencyllm::generator::TurnGenerator;
//! use agencyllm::state::ProjectState;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = Arc::new(GeminiClient::new(GeminiConfig::from_env()?));
//!     let generator = TurnGenerator::new(client, AgencyConfig::default());
//!
//!     let state = ProjectState::new("a simple portfolio site");
//!     let (strategy, action) = generator.next_turn(&state).await;
//!     println!("{}: {} ({})", action.speaker, action.message, strategy.phase);
//!     Ok(())
//! }
//! ```

use crate::action::{Action, ActionKind, ActionPayload, Emotion, PayloadError, RawAction};
use crate::characters::CharacterId;
use crate::client_wrapper::{ClientWrapper, GenerationRequest, TokenUsage};
use crate::config::AgencyConfig;
use crate::error::AgencyError;
use crate::event::{AgencyEvent, EventHandler};
use crate::parser;
use crate::prompts;
use crate::state::{ProjectState, TaskStatus};
use crate::strategy::{plan_theme, Phase, Strategy, StrategyEngine};
use std::sync::{Arc, Mutex};

/// Placeholder brief used when the oracle forgets the brief content.
pub const BRIEF_PLACEHOLDER: &str = "Error: Brief content missing.";

const EMPTY_MESSAGE: &str = "...";

/// Produces one validated action per turn.
pub struct TurnGenerator {
    client: Arc<dyn ClientWrapper>,
    engine: StrategyEngine,
    config: AgencyConfig,
    event_handler: Option<Arc<dyn EventHandler>>,
    usage: Mutex<TokenUsage>,
}

impl TurnGenerator {
    pub fn new(client: Arc<dyn ClientWrapper>, config: AgencyConfig) -> Self {
        Self {
            client,
            engine: StrategyEngine::new(config.clone()),
            config,
            event_handler: None,
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Attach an event handler for attempt failures and fallback use.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    pub(crate) fn set_event_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.event_handler = Some(handler);
    }

    pub fn engine(&self) -> &StrategyEngine {
        &self.engine
    }

    pub fn config(&self) -> &AgencyConfig {
        &self.config
    }

    /// Tokens spent by every oracle answer so far, as reported by clients that track usage.
    pub fn token_usage(&self) -> TokenUsage {
        self.usage
            .lock()
            .map(|usage| usage.clone())
            .unwrap_or_default()
    }

    fn record_usage(&self, request: &GenerationRequest) {
        let Some(last) = self.client.get_last_usage() else {
            return;
        };
        log::debug!(
            "agencyllm::generator::record_usage(...): {} used {} input + {} output tokens",
            self.client.model_name(request.tier),
            last.input_tokens,
            last.output_tokens
        );
        if let Ok(mut total) = self.usage.lock() {
            total.input_tokens += last.input_tokens;
            total.output_tokens += last.output_tokens;
            total.total_tokens += last.total_tokens;
        }
    }

    /// Decide a strategy for `state` and generate the matching turn.
    pub async fn next_turn(&self, state: &ProjectState) -> (Strategy, Action) {
        let roll: f64 = rand::random();
        let strategy = self.engine.determine(state, roll);
        log::debug!(
            "agencyllm::generator::next_turn(...): phase={} speaker={:?} forced={:?}",
            strategy.phase,
            strategy.speaker,
            strategy.forced_action
        );
        self.emit(AgencyEvent::StrategyChosen {
            phase: strategy.phase,
            speaker: strategy.speaker,
            forced_action: strategy.forced_action,
        })
        .await;

        let action = self.generate_turn(state, &strategy).await;
        (strategy, action)
    }

    /// Generate a turn for an already chosen strategy. Never fails.
    pub async fn generate_turn(&self, state: &ProjectState, strategy: &Strategy) -> Action {
        let request = prompts::build_request(state, strategy, &self.config);
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let final_attempt = attempt == max_attempts;
            match self.attempt(state, strategy, &request, final_attempt).await {
                Ok(action) => {
                    return action.responding_to(strategy.responds_to_event.clone());
                }
                Err(err) => {
                    log::warn!(
                        "agencyllm::generator::generate_turn(...): attempt {}/{} on model {} failed: {}",
                        attempt,
                        max_attempts,
                        self.client.model_name(strategy.model_tier),
                        err
                    );
                    self.emit(AgencyEvent::OracleAttemptFailed {
                        attempt,
                        max_attempts,
                        error: err.to_string(),
                    })
                    .await;
                    if !final_attempt {
                        tokio::time::sleep(self.config.retry_base_delay * attempt as u32).await;
                    }
                }
            }
        }

        log::error!(
            "agencyllm::generator::generate_turn(...): oracle unavailable after {} attempts, using fallback for phase {}",
            max_attempts,
            strategy.phase
        );
        self.emit(AgencyEvent::FallbackUsed {
            phase: strategy.phase,
            attempts: max_attempts,
        })
        .await;
        Action::fallback().responding_to(strategy.responds_to_event.clone())
    }

    async fn attempt(
        &self,
        state: &ProjectState,
        strategy: &Strategy,
        request: &GenerationRequest,
        final_attempt: bool,
    ) -> Result<Action, AgencyError> {
        let text = self
            .client
            .generate(request)
            .await
            .map_err(|e| AgencyError::Transport(e.to_string()))?;
        self.record_usage(request);

        if text.trim().is_empty() {
            return Err(AgencyError::EmptyResponse);
        }

        match parser::parse_action(&text) {
            Some(raw) => self.validate(state, strategy, raw, final_attempt),
            None => self
                .recover_document(strategy, &text)
                .ok_or_else(|| AgencyError::MalformedResponse("no JSON object in answer".into())),
        }
    }

    /// Wrap an HTML document found in unparseable output into a build action.
    fn recover_document(&self, strategy: &Strategy, text: &str) -> Option<Action> {
        if strategy.is_banter() {
            return None;
        }
        if !matches!(strategy.forced_action, None | Some(ActionKind::UpdateCode)) {
            return None;
        }
        let document = parser::extract_document_payload(text)?;
        log::warn!(
            "agencyllm::generator::recover_document(...): recovered {} char document from malformed answer",
            document.len()
        );
        let speaker = strategy.speaker.unwrap_or(CharacterId::Engineer);
        Some(
            Action::new(
                speaker,
                "Pushed a new build.",
                ActionPayload::UpdateCode { content: document },
            )
            .with_emotion(Emotion::Working),
        )
    }

    /// Turn an untrusted raw answer into an action that honours the strategy.
    pub fn validate(
        &self,
        state: &ProjectState,
        strategy: &Strategy,
        raw: RawAction,
        final_attempt: bool,
    ) -> Result<Action, AgencyError> {
        let resolved = raw.speaker.as_deref().and_then(CharacterId::resolve);
        let speaker = match strategy.speaker {
            Some(forced) => {
                if resolved != Some(forced) {
                    log::debug!(
                        "agencyllm::generator::validate(...): speaker {:?} overridden to {}",
                        raw.speaker,
                        forced
                    );
                }
                forced
            }
            None => resolved.unwrap_or(CharacterId::System),
        };

        let message = raw
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(EMPTY_MESSAGE)
            .to_string();

        let payload = if strategy.is_banter() {
            ActionPayload::Wait
        } else {
            self.validate_payload(state, strategy, &raw, final_attempt)?
        };

        Ok(Action {
            speaker,
            message,
            thinking: raw.thinking.clone(),
            emotion: raw.emotion.as_deref().and_then(Emotion::parse),
            payload,
            responds_to_event: None,
        })
    }

    fn validate_payload(
        &self,
        state: &ProjectState,
        strategy: &Strategy,
        raw: &RawAction,
        final_attempt: bool,
    ) -> Result<ActionPayload, AgencyError> {
        let declared = raw.kind();

        let kind = match (strategy.forced_action, declared) {
            (Some(forced), Some(kind)) if forced == kind => forced,
            (Some(forced), other) => {
                if !final_attempt {
                    return Err(AgencyError::SchemaViolation(format!(
                        "expected action {} but got {}",
                        forced,
                        other.map(|k| k.as_str()).unwrap_or("none")
                    )));
                }
                log::warn!(
                    "agencyllm::generator::validate(...): coercing {:?} to forced action {}",
                    raw.action,
                    forced
                );
                let mut coerced = raw.clone();
                coerced.action = Some(forced.as_str().to_string());
                return Ok(match coerced.payload() {
                    Ok(payload) => self.repair(state, strategy, payload),
                    Err(_) => self.default_payload(state, strategy, forced),
                });
            }
            (None, Some(kind)) => kind,
            // An answer without any action is a plain line of dialogue.
            (None, None) if raw.action.is_none() => ActionKind::Wait,
            (None, None) => {
                if final_attempt {
                    return Ok(ActionPayload::Wait);
                }
                return Err(AgencyError::SchemaViolation(
                    PayloadError::UnknownKind(raw.action.clone()).to_string(),
                ));
            }
        };

        if kind == ActionKind::Wait {
            return Ok(ActionPayload::Wait);
        }

        match raw.payload() {
            Ok(payload) => Ok(self.repair(state, strategy, payload)),
            Err(err) => match kind {
                ActionKind::UpdateBrief | ActionKind::UpdateCode => {
                    Ok(self.default_payload(state, strategy, kind))
                }
                ActionKind::MoveTask if strategy.target_task.is_some() => {
                    Ok(self.default_payload(state, strategy, kind))
                }
                _ if final_attempt => Ok(self.default_payload(state, strategy, kind)),
                _ => Err(AgencyError::SchemaViolation(err.to_string())),
            },
        }
    }

    /// Redirect a `move_task` that does not name a valid candidate.
    fn repair(
        &self,
        state: &ProjectState,
        strategy: &Strategy,
        payload: ActionPayload,
    ) -> ActionPayload {
        let (task_id, column) = match payload {
            ActionPayload::MoveTask { task_id, column } => (task_id, column),
            other => return other,
        };

        let target = match (&strategy.target_task, strategy.forced_action) {
            (Some(target), Some(ActionKind::MoveTask)) => target,
            _ => return ActionPayload::MoveTask { task_id, column },
        };

        let expected_source = match strategy.phase {
            Phase::Pickup => TaskStatus::Todo,
            _ => TaskStatus::Doing,
        };
        let valid = state
            .find_task(&task_id)
            .map(|t| t.status == expected_source)
            .unwrap_or(false);

        let task_id = if valid {
            task_id
        } else {
            log::warn!(
                "agencyllm::generator::repair(...): move_task id '{}' is not a {} task, using '{}'",
                task_id,
                expected_source,
                target
            );
            target.clone()
        };

        ActionPayload::MoveTask {
            task_id,
            column: strategy.target_column.unwrap_or(column),
        }
    }

    /// A minimally valid payload of `kind` built from state and strategy alone.
    fn default_payload(
        &self,
        state: &ProjectState,
        strategy: &Strategy,
        kind: ActionKind,
    ) -> ActionPayload {
        match kind {
            ActionKind::UpdateBrief => ActionPayload::UpdateBrief {
                content: BRIEF_PLACEHOLDER.to_string(),
            },
            ActionKind::UpdateCode => ActionPayload::UpdateCode {
                content: state.code.clone(),
            },
            ActionKind::GenerateImage => {
                let excerpt: String = state.brief.chars().take(120).collect();
                ActionPayload::GenerateImage {
                    prompt: format!("Abstract high-fashion visual direction for: {}", excerpt),
                }
            }
            ActionKind::AddTask => {
                let theme = plan_theme(state.count_tasks(TaskStatus::Done));
                ActionPayload::AddTask {
                    titles: vec![format!("Scope {}", theme.name)],
                }
            }
            ActionKind::MoveTask => match &strategy.target_task {
                Some(target) => ActionPayload::MoveTask {
                    task_id: target.clone(),
                    column: strategy.target_column.unwrap_or(TaskStatus::Doing),
                },
                None => ActionPayload::Wait,
            },
            ActionKind::AddMoodboard | ActionKind::SwitchTab | ActionKind::Wait => {
                ActionPayload::Wait
            }
        }
    }

    async fn emit(&self, event: AgencyEvent) {
        if let Some(handler) = &self.event_handler {
            handler.on_event(&event).await;
        }
    }
}
