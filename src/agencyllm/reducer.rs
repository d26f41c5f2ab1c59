//! The StateReducer: the only code that changes a [`ProjectState`].
//!
//! Both entry points take the state by value and hand back a [`Transition`] with the
//! new state and any side effects to run. Neither performs I/O or draws randomness, and
//! neither can fail: unknown ids and other inconsistencies are logged and skipped.
//!
//! - [`apply`] applies one turn's [`Action`]. Every turn appends exactly one chat
//!   message and bumps `turn_count`.
//! - [`reduce`] applies any [`Update`], including host intents, scheduler markers and
//!   side-effect completions. A turn is just `Update::Turn`.
//!
//! ```rust
//! use agencyllm::action::{Action, ActionPayload};
//! use agencyllm::characters::CharacterId;
//! use agencyllm::reducer::apply;
//! use agencyllm::state::ProjectState;
//!
//! let state = ProjectState::new("a simple portfolio site");
//! let action = Action::new(
//!     CharacterId::Engineer,
//!     "shipped",
//!     ActionPayload::UpdateCode { content: "<html></html>".into() },
//! );
//!
//! let next = apply(state, &action).state;
//! assert_eq!(next.code, "<html></html>");
//! assert_eq!(next.messages.len(), 1);
//! assert_eq!(next.turn_count, 1);
//! ```

use crate::action::{Action, ActionKind, ActionPayload};
use crate::characters::CharacterId;
use crate::effects::SideEffect;
use crate::state::{
    ChatMessage, MoodboardItem, MoodboardKind, Notification, NotificationLevel, Position,
    ProjectState, TabId, Task, TaskStatus,
};

/// First line of every session.
pub const BOOT_MESSAGE: &str = "OS Booted. Project Initialized.";

/// Everything that can change the project state.
#[derive(Clone, Debug, PartialEq)]
pub enum Update {
    /// A decided turn.
    Turn(Action),
    /// The host started a new session. Replaces the whole state.
    SessionStarted { prompt: String },
    /// The host injected a one-shot directive.
    EventInjected { event: String },
    /// The host dragged a moodboard item.
    MoodboardMoved { id: String, position: Position },
    /// The scheduler asked the oracle for a turn.
    ThinkingStarted,
    /// The watchdog abandoned a stuck turn.
    ThinkingAborted,
    /// The decided message started typing out.
    TypingStarted { speaker: CharacterId },
    /// The visible prefix of the message being typed.
    TypingProgress { buffer: String },
    /// Typing was interrupted. The partial buffer is discarded.
    TypingStopped,
    /// An image side effect succeeded.
    ImageGenerated {
        prompt: String,
        requester: CharacterId,
        data: String,
        position: Position,
        rotation: f64,
    },
    /// An image side effect failed.
    ImageFailed {
        prompt: String,
        requester: CharacterId,
        error: String,
    },
}

/// Result of a reducer step.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: ProjectState,
    pub effects: Vec<SideEffect>,
}

impl Transition {
    fn new(state: ProjectState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }
}

/// Apply one turn.
pub fn apply(mut state: ProjectState, action: &Action) -> Transition {
    let mut effects = Vec::new();
    state.turn_count += 1;

    match &action.payload {
        ActionPayload::UpdateBrief { content } => {
            state.brief = content.clone();
            state.active_tab = Some(TabId::Brief);
        }
        ActionPayload::AddTask { titles } => {
            for title in titles {
                let id = state.next_task_id();
                let mut task = Task::new(id, title.clone(), TaskStatus::Todo);
                if action.speaker != CharacterId::System {
                    task.assignee = Some(action.speaker);
                }
                state.tasks.push(task);
            }
            state.active_tab = Some(TabId::Board);
        }
        ActionPayload::MoveTask { task_id, column } => {
            let turn = state.turn_count;
            match state.tasks.iter_mut().find(|t| &t.id == task_id) {
                Some(task) => {
                    if *column == TaskStatus::Doing && task.status != TaskStatus::Doing {
                        task.started_turn = Some(turn);
                    }
                    task.status = *column;
                    if task.assignee.is_none() && action.speaker != CharacterId::System {
                        task.assignee = Some(action.speaker);
                    }
                    state.active_tab = Some(TabId::Board);
                }
                None => {
                    log::warn!(
                        "agencyllm::reducer::apply(...): move_task for unknown task id '{}' ignored",
                        task_id
                    );
                }
            }
        }
        ActionPayload::UpdateCode { content } => {
            state.code = content.clone();
            state.active_tab = Some(TabId::Live);
        }
        ActionPayload::AddMoodboard { kind, content } => {
            state.moodboard.push(MoodboardItem {
                id: uuid::Uuid::new_v4().to_string(),
                kind: *kind,
                content: content.clone(),
                position: Position::default(),
                rotation: 0.0,
                owner: Some(action.speaker),
            });
            state.active_tab = Some(TabId::Moodboard);
        }
        ActionPayload::GenerateImage { prompt } => {
            effects.push(SideEffect::GenerateImage {
                prompt: prompt.clone(),
                requester: action.speaker,
            });
        }
        ActionPayload::SwitchTab { tab } => {
            state.active_tab = Some(*tab);
        }
        ActionPayload::Wait => {}
    }

    if action.kind() == ActionKind::Wait {
        state.consecutive_chat_turns += 1;
    } else {
        state.consecutive_chat_turns = 0;
    }

    if action.responds_to_event.is_some() && action.responds_to_event == state.pending_event {
        state.pending_event = None;
    }

    state.messages.push(ChatMessage::new(
        action.speaker,
        action.message.clone(),
        action.emotion,
    ));
    state.last_speaker = Some(action.speaker);
    clear_turn_markers(&mut state);

    Transition { state, effects }
}

/// Apply any update.
pub fn reduce(mut state: ProjectState, update: Update) -> Transition {
    match update {
        Update::Turn(action) => return apply(state, &action),
        Update::SessionStarted { prompt } => {
            state = ProjectState::new(prompt);
            state.messages.push(ChatMessage::system(BOOT_MESSAGE));
            state.notifications.push(Notification::new(
                "System Online",
                "The Agency OS is initialized and running.",
                NotificationLevel::Success,
            ));
        }
        Update::EventInjected { event } => {
            state
                .messages
                .push(ChatMessage::system(format!("DIRECTOR NOTE: {}", event)));
            state.notifications.push(Notification::new(
                "Director Note",
                "Injecting new event parameters...",
                NotificationLevel::Warning,
            ));
            state.pending_event = Some(event);
        }
        Update::MoodboardMoved { id, position } => {
            match state.moodboard.iter_mut().find(|item| item.id == id) {
                Some(item) => {
                    item.position = Position {
                        x: position.x.clamp(0.0, 100.0),
                        y: position.y.clamp(0.0, 100.0),
                    };
                }
                None => log::warn!(
                    "agencyllm::reducer::reduce(...): moodboard item '{}' not found",
                    id
                ),
            }
        }
        Update::ThinkingStarted => {
            state.is_thinking = true;
        }
        Update::ThinkingAborted => {
            clear_turn_markers(&mut state);
            state.notifications.push(Notification::new(
                "System",
                "Agent computation timed out. Resetting...",
                NotificationLevel::Warning,
            ));
        }
        Update::TypingStarted { speaker } => {
            state.is_thinking = false;
            state.typing_speaker = Some(speaker);
            state.typing_buffer.clear();
        }
        Update::TypingProgress { buffer } => {
            state.typing_buffer = buffer;
        }
        Update::TypingStopped => {
            state.typing_speaker = None;
            state.typing_buffer.clear();
        }
        Update::ImageGenerated {
            prompt,
            requester,
            data,
            position,
            rotation,
        } => {
            state.moodboard.push(MoodboardItem {
                id: uuid::Uuid::new_v4().to_string(),
                kind: MoodboardKind::Image,
                content: data,
                position,
                rotation,
                owner: Some(requester),
            });
            state.active_tab = Some(TabId::Moodboard);
            state
                .messages
                .push(ChatMessage::system(format!("generated image for \"{}\"", prompt)));
            state.notifications.push(Notification::new(
                "Asset Created",
                format!("New image generated by {}", requester.display_name()),
                NotificationLevel::Success,
            ));
        }
        Update::ImageFailed {
            prompt,
            requester,
            error,
        } => {
            log::warn!(
                "agencyllm::reducer::reduce(...): image for {} failed ({}): {}",
                requester,
                prompt,
                error
            );
            state.notifications.push(Notification::new(
                "Generation Failed",
                "Image generation service returned no data",
                NotificationLevel::Error,
            ));
        }
    }
    Transition::new(state)
}

fn clear_turn_markers(state: &mut ProjectState) {
    state.is_thinking = false;
    state.typing_speaker = None;
    state.typing_buffer.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Emotion;

    #[test]
    fn generate_image_only_schedules_an_effect() {
        let state = ProjectState::new("brief");
        let moodboard_before = state.moodboard.clone();
        let action = Action::new(
            CharacterId::ArtDirector,
            "mood",
            ActionPayload::GenerateImage {
                prompt: "chrome orchid".into(),
            },
        );
        let t = apply(state, &action);
        assert_eq!(t.state.moodboard, moodboard_before);
        assert_eq!(
            t.effects,
            vec![SideEffect::GenerateImage {
                prompt: "chrome orchid".into(),
                requester: CharacterId::ArtDirector
            }]
        );
    }

    #[test]
    fn task_ids_are_never_reused() {
        let mut state = ProjectState::new("brief");
        state.tasks.push(Task::new("t1", "legacy", TaskStatus::Done));
        let action = Action::new(
            CharacterId::ProductManager,
            "plan",
            ActionPayload::AddTask {
                titles: vec!["a".into(), "b".into()],
            },
        );
        let t = apply(state, &action);
        let ids: Vec<_> = t.state.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
        assert!(t
            .state
            .tasks
            .iter()
            .skip(1)
            .all(|t| t.assignee == Some(CharacterId::ProductManager)));
    }

    #[test]
    fn typing_markers_cleared_by_turn() {
        let state = reduce(
            ProjectState::default(),
            Update::TypingStarted {
                speaker: CharacterId::Intern,
            },
        )
        .state;
        let state = reduce(
            state,
            Update::TypingProgress {
                buffer: "hel".into(),
            },
        )
        .state;
        assert_eq!(state.typing_buffer, "hel");

        let action = Action::wait(CharacterId::Intern, "hello").with_emotion(Emotion::Happy);
        let state = apply(state, &action).state;
        assert!(state.typing_speaker.is_none());
        assert!(state.typing_buffer.is_empty());
        assert_eq!(state.messages[0].emotion, Some(Emotion::Happy));
    }
}
