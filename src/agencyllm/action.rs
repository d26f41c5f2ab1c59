//! Typed turn actions and their untrusted raw form.
//!
//! The oracle answers with loosely shaped JSON. [`RawAction`] captures that shape
//! without trusting any field; [`RawAction::payload`] validates it per
//! [`ActionKind`] into the tagged [`ActionPayload`] union. Only fully typed
//! [`Action`]s ever reach the reducer.

use crate::characters::CharacterId;
use crate::state::{MoodboardKind, TabId, TaskStatus};
pub use crate::state::Emotion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Line spoken by the narrator when the oracle could not be reached.
pub const FALLBACK_MESSAGE: &str = "Network jitter detected. Re-calibrating...";

/// Discriminant of an [`ActionPayload`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    UpdateBrief,
    AddTask,
    MoveTask,
    UpdateCode,
    AddMoodboard,
    GenerateImage,
    SwitchTab,
    Wait,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::UpdateBrief,
        ActionKind::AddTask,
        ActionKind::MoveTask,
        ActionKind::UpdateCode,
        ActionKind::AddMoodboard,
        ActionKind::GenerateImage,
        ActionKind::SwitchTab,
        ActionKind::Wait,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::UpdateBrief => "update_brief",
            ActionKind::AddTask => "add_task",
            ActionKind::MoveTask => "move_task",
            ActionKind::UpdateCode => "update_code",
            ActionKind::AddMoodboard => "add_moodboard",
            ActionKind::GenerateImage => "generate_image",
            ActionKind::SwitchTab => "switch_tab",
            ActionKind::Wait => "wait",
        }
    }

    /// ```rust
    /// use agencyllm::action::ActionKind;
    ///
    /// assert_eq!(ActionKind::parse("Update-Code"), Some(ActionKind::UpdateCode));
    /// assert_eq!(ActionKind::parse("dance"), None);
    /// ```
    pub fn parse(value: &str) -> Option<ActionKind> {
        let key = value.trim().to_lowercase().replace(['-', ' '], "_");
        ActionKind::ALL.iter().copied().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The effect of a turn, with the payload shape each kind requires.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionPayload {
    /// Replace the brief wholesale.
    UpdateBrief { content: String },
    /// Append one or more tasks to the `todo` column.
    AddTask { titles: Vec<String> },
    /// Move a task to another column.
    MoveTask { task_id: String, column: TaskStatus },
    /// Replace the build artifact wholesale.
    UpdateCode { content: String },
    /// Pin a note, color or image reference on the moodboard.
    AddMoodboard { kind: MoodboardKind, content: String },
    /// Ask the image capability for a new moodboard image.
    GenerateImage { prompt: String },
    /// Bring a workspace surface to the front.
    SwitchTab { tab: TabId },
    /// Talk only.
    Wait,
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::UpdateBrief { .. } => ActionKind::UpdateBrief,
            ActionPayload::AddTask { .. } => ActionKind::AddTask,
            ActionPayload::MoveTask { .. } => ActionKind::MoveTask,
            ActionPayload::UpdateCode { .. } => ActionKind::UpdateCode,
            ActionPayload::AddMoodboard { .. } => ActionKind::AddMoodboard,
            ActionPayload::GenerateImage { .. } => ActionKind::GenerateImage,
            ActionPayload::SwitchTab { .. } => ActionKind::SwitchTab,
            ActionPayload::Wait => ActionKind::Wait,
        }
    }
}

/// A validated turn: who speaks, what they say, and what they do.
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    pub speaker: CharacterId,
    pub message: String,
    /// The oracle's private reasoning, kept for logging only.
    pub thinking: Option<String>,
    pub emotion: Option<Emotion>,
    pub payload: ActionPayload,
    /// The injected event this turn answered, if any. The reducer clears the
    /// pending event when it applies such an action.
    pub responds_to_event: Option<String>,
}

impl Action {
    pub fn new(speaker: CharacterId, message: impl Into<String>, payload: ActionPayload) -> Self {
        Self {
            speaker,
            message: message.into(),
            thinking: None,
            emotion: None,
            payload,
            responds_to_event: None,
        }
    }

    /// A talk-only turn.
    pub fn wait(speaker: CharacterId, message: impl Into<String>) -> Self {
        Self::new(speaker, message, ActionPayload::Wait)
    }

    /// The designated last-resort action: the narrator reports an unstable link.
    ///
    /// ```rust
    /// use agencyllm::action::{Action, ActionKind};
    /// use agencyllm::characters::CharacterId;
    ///
    /// let action = Action::fallback();
    /// assert_eq!(action.speaker, CharacterId::System);
    /// assert_eq!(action.kind(), ActionKind::Wait);
    /// ```
    pub fn fallback() -> Self {
        let mut action = Self::wait(CharacterId::System, FALLBACK_MESSAGE);
        action.emotion = Some(Emotion::Tired);
        action
    }

    pub fn with_emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn responding_to(mut self, event: Option<String>) -> Self {
        self.responds_to_event = event;
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}

/// Why a raw payload could not be turned into an [`ActionPayload`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PayloadError {
    /// `action` was absent or not one of the known kinds.
    UnknownKind(Option<String>),
    /// A field the kind requires was absent or empty.
    MissingField {
        kind: ActionKind,
        field: &'static str,
    },
    /// A field was present but held an unusable value.
    InvalidField {
        kind: ActionKind,
        field: &'static str,
        value: String,
    },
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::UnknownKind(Some(kind)) => write!(f, "unknown action '{}'", kind),
            PayloadError::UnknownKind(None) => write!(f, "missing action"),
            PayloadError::MissingField { kind, field } => {
                write!(f, "{} requires actionPayload.{}", kind, field)
            }
            PayloadError::InvalidField { kind, field, value } => {
                write!(f, "{} has invalid actionPayload.{} '{}'", kind, field, value)
            }
        }
    }
}

/// The payload object as the oracle sent it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawPayload {
    pub content: Option<String>,
    pub title: Option<String>,
    pub tasks: Vec<String>,
    pub column: Option<String>,
    pub task_id: Option<String>,
    pub item_type: Option<String>,
    pub prompt: Option<String>,
    pub tab_id: Option<String>,
}

/// The whole answer as the oracle sent it. Every field is optional and untrusted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawAction {
    pub speaker: Option<String>,
    pub message: Option<String>,
    pub thinking: Option<String>,
    pub emotion: Option<String>,
    pub action: Option<String>,
    pub payload: RawPayload,
}

impl RawAction {
    /// Read a parsed JSON value into a raw action.
    ///
    /// Returns `None` unless the value is an object. Scalar fields are accepted as
    /// strings or numbers (oracles like to send task ids as integers); anything else
    /// is treated as absent.
    ///
    /// ```rust
    /// use agencyllm::action::RawAction;
    /// use serde_json::json;
    ///
    /// let raw = RawAction::from_value(&json!({
    ///     "speaker": "rich",
    ///     "message": "moving it",
    ///     "action": "move_task",
    ///     "actionPayload": { "taskId": 7, "column": "done" }
    /// }))
    /// .unwrap();
    /// assert_eq!(raw.payload.task_id.as_deref(), Some("7"));
    /// assert!(RawAction::from_value(&json!([1, 2])).is_none());
    /// ```
    pub fn from_value(value: &Value) -> Option<RawAction> {
        let obj = value.as_object()?;
        let payload = obj
            .get("actionPayload")
            .or_else(|| obj.get("action_payload"))
            .or_else(|| obj.get("payload"))
            .map(RawPayload::from_value)
            .unwrap_or_default();

        Some(RawAction {
            speaker: scalar(obj.get("speaker")),
            message: scalar(obj.get("message")),
            thinking: scalar(obj.get("thinking")),
            emotion: scalar(obj.get("emotion")),
            action: scalar(obj.get("action")),
            payload,
        })
    }

    pub fn kind(&self) -> Option<ActionKind> {
        self.action.as_deref().and_then(ActionKind::parse)
    }

    /// Validate the payload for the declared kind.
    pub fn payload(&self) -> Result<ActionPayload, PayloadError> {
        let kind = self
            .kind()
            .ok_or_else(|| PayloadError::UnknownKind(self.action.clone()))?;
        let p = &self.payload;

        match kind {
            ActionKind::UpdateBrief => Ok(ActionPayload::UpdateBrief {
                content: required(kind, "content", &p.content)?,
            }),
            ActionKind::UpdateCode => Ok(ActionPayload::UpdateCode {
                content: required(kind, "content", &p.content)?,
            }),
            ActionKind::AddTask => {
                let mut titles: Vec<String> = p
                    .tasks
                    .iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
                if let Some(title) = non_empty(&p.title) {
                    titles.insert(0, title);
                }
                if titles.is_empty() {
                    return Err(PayloadError::MissingField {
                        kind,
                        field: "title",
                    });
                }
                Ok(ActionPayload::AddTask { titles })
            }
            ActionKind::MoveTask => {
                let task_id = required(kind, "taskId", &p.task_id)?;
                let column_raw = required(kind, "column", &p.column)?;
                let column =
                    TaskStatus::parse(&column_raw).ok_or(PayloadError::InvalidField {
                        kind,
                        field: "column",
                        value: column_raw,
                    })?;
                Ok(ActionPayload::MoveTask { task_id, column })
            }
            ActionKind::AddMoodboard => {
                let content = required(kind, "content", &p.content)?;
                let item_kind = p
                    .item_type
                    .as_deref()
                    .and_then(MoodboardKind::parse)
                    .unwrap_or(MoodboardKind::Note);
                Ok(ActionPayload::AddMoodboard {
                    kind: item_kind,
                    content,
                })
            }
            ActionKind::GenerateImage => {
                let prompt = non_empty(&p.prompt)
                    .or_else(|| non_empty(&p.content))
                    .ok_or(PayloadError::MissingField {
                        kind,
                        field: "prompt",
                    })?;
                Ok(ActionPayload::GenerateImage { prompt })
            }
            ActionKind::SwitchTab => {
                let tab_raw = required(kind, "tabId", &p.tab_id)?;
                let tab = TabId::parse(&tab_raw).ok_or(PayloadError::InvalidField {
                    kind,
                    field: "tabId",
                    value: tab_raw,
                })?;
                Ok(ActionPayload::SwitchTab { tab })
            }
            ActionKind::Wait => Ok(ActionPayload::Wait),
        }
    }
}

impl RawPayload {
    fn from_value(value: &Value) -> RawPayload {
        let obj = match value.as_object() {
            Some(obj) => obj,
            None => return RawPayload::default(),
        };

        let tasks = match obj.get("tasks").or_else(|| obj.get("titles")) {
            Some(Value::Array(items)) => items.iter().filter_map(|v| scalar(Some(v))).collect(),
            _ => Vec::new(),
        };

        RawPayload {
            content: scalar(obj.get("content")),
            title: scalar(obj.get("title")),
            tasks,
            column: scalar(obj.get("column")).or_else(|| scalar(obj.get("status"))),
            task_id: scalar(obj.get("taskId")).or_else(|| scalar(obj.get("task_id"))),
            item_type: scalar(obj.get("type")),
            prompt: scalar(obj.get("prompt")),
            tab_id: scalar(obj.get("tabId")).or_else(|| scalar(obj.get("tab_id"))),
        }
    }
}

fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required(
    kind: ActionKind,
    field: &'static str,
    value: &Option<String>,
) -> Result<String, PayloadError> {
    // Content fields keep their exact text; trimming only decides emptiness.
    match value {
        Some(v) if !v.trim().is_empty() => Ok(if field == "content" {
            v.clone()
        } else {
            v.trim().to_string()
        }),
        _ => Err(PayloadError::MissingField { kind, field }),
    }
}
