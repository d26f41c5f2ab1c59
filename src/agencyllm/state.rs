//! The shared project state the whole agency works on.
//!
//! A [`ProjectState`] is created when a session starts and lives in memory for the
//! session. It is owned by the [`TurnScheduler`](crate::scheduler::TurnScheduler) and
//! only ever changed through the [`reducer`](crate::reducer); hosts receive read-only
//! snapshots.

use crate::characters::CharacterId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Placeholder document shown until the engineer ships the first build.
pub const INITIAL_CODE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>The Agency Workspace</title>
    <style>
        body { background-color: #050505; color: #e5e5e5; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }
        .status { font-size: 10px; text-transform: uppercase; letter-spacing: 0.2em; opacity: 0.4; }
    </style>
</head>
<body>
    <div class="status">Waiting for Rich to cook...</div>
</body>
</html>
"#;

/// Kanban column of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
}

impl TaskStatus {
    /// Parse a column name from the oracle. Accepts a few common spellings.
    ///
    /// ```rust
    /// use agencyllm::state::TaskStatus;
    ///
    /// assert_eq!(TaskStatus::parse("In Progress"), Some(TaskStatus::Doing));
    /// assert_eq!(TaskStatus::parse("DONE"), Some(TaskStatus::Done));
    /// assert_eq!(TaskStatus::parse("later"), None);
    /// ```
    pub fn parse(column: &str) -> Option<TaskStatus> {
        match column.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "todo" | "to do" | "backlog" => Some(TaskStatus::Todo),
            "doing" | "in progress" | "wip" => Some(TaskStatus::Doing),
            "done" | "complete" | "completed" => Some(TaskStatus::Done),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A card on the Kanban board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Opaque id, unique for the session and never reused.
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub assignee: Option<CharacterId>,
    /// Turn on which the task entered `doing`, if it has.
    pub started_turn: Option<u64>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            status,
            assignee: None,
            started_turn: None,
        }
    }
}

/// Kind of a moodboard item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoodboardKind {
    Image,
    Note,
    Color,
}

impl MoodboardKind {
    pub fn parse(kind: &str) -> Option<MoodboardKind> {
        match kind.trim().to_lowercase().as_str() {
            "image" | "img" | "picture" => Some(MoodboardKind::Image),
            "note" | "text" | "sticky" => Some(MoodboardKind::Note),
            "color" | "colour" | "swatch" => Some(MoodboardKind::Color),
            _ => None,
        }
    }
}

/// Position on the moodboard canvas, in percent of its width/height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self { x: 50.0, y: 50.0 }
    }
}

/// An item pinned on the moodboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoodboardItem {
    pub id: String,
    pub kind: MoodboardKind,
    /// Text, color value, or image payload (data URI or URL).
    pub content: String,
    pub position: Position,
    /// Rotation in degrees.
    pub rotation: f64,
    pub owner: Option<CharacterId>,
}

/// Emotion attached to a chat line (drives a reaction GIF in the host).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Angry,
    Celebrate,
    Confused,
    Tired,
    Working,
}

impl Emotion {
    pub fn parse(value: &str) -> Option<Emotion> {
        match value.trim().to_lowercase().as_str() {
            "happy" => Some(Emotion::Happy),
            "angry" => Some(Emotion::Angry),
            "celebrate" => Some(Emotion::Celebrate),
            "confused" => Some(Emotion::Confused),
            "tired" => Some(Emotion::Tired),
            "working" => Some(Emotion::Working),
            _ => None,
        }
    }
}

/// One line of chat history. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub speaker: CharacterId,
    pub text: String,
    pub emotion: Option<Emotion>,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(speaker: CharacterId, text: impl Into<String>, emotion: Option<Emotion>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            speaker,
            text: text.into(),
            emotion,
            timestamp: Utc::now(),
        }
    }

    /// A line narrated by the agency OS.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(CharacterId::System, text, None)
    }
}

/// Workspace surface the presentation layer should bring to the front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabId {
    Brief,
    Moodboard,
    Board,
    Code,
    Live,
}

impl TabId {
    pub fn parse(tab: &str) -> Option<TabId> {
        match tab.trim().to_lowercase().as_str() {
            "brief" => Some(TabId::Brief),
            "moodboard" => Some(TabId::Moodboard),
            "board" | "kanban" => Some(TabId::Board),
            "code" | "editor" => Some(TabId::Code),
            "live" | "preview" => Some(TabId::Live),
            _ => None,
        }
    }
}

/// Severity of a host notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A toast-style notice for the host. Failures are reported here in-character
/// rather than as raw error text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        level: NotificationLevel,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            level,
            timestamp: Utc::now(),
        }
    }
}

/// The singleton project state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Evolving product spec. Starts as the user's prompt.
    pub brief: String,
    /// The single build artifact, replaced wholesale by `update_code`.
    pub code: String,
    pub tasks: Vec<Task>,
    pub moodboard: Vec<MoodboardItem>,
    /// Append-only chat history.
    pub messages: Vec<ChatMessage>,
    pub turn_count: u64,
    /// Turns in a row that ended in `wait`.
    pub consecutive_chat_turns: u64,
    /// One-shot directive injected by the host.
    pub pending_event: Option<String>,
    pub last_speaker: Option<CharacterId>,
    pub active_tab: Option<TabId>,
    pub notifications: Vec<Notification>,

    // Transient turn-in-progress markers.
    pub is_thinking: bool,
    pub typing_speaker: Option<CharacterId>,
    pub typing_buffer: String,

    #[serde(default)]
    task_seq: u64,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new("")
    }
}

impl ProjectState {
    /// Create a fresh state whose brief is the user's initial prompt.
    ///
    /// ```rust
    /// use agencyllm::state::{ProjectState, INITIAL_CODE};
    ///
    /// let state = ProjectState::new("a simple portfolio site");
    /// assert_eq!(state.brief, "a simple portfolio site");
    /// assert_eq!(state.code, INITIAL_CODE);
    /// assert!(state.messages.is_empty());
    /// ```
    pub fn new(initial_prompt: impl Into<String>) -> Self {
        Self {
            brief: initial_prompt.into(),
            code: INITIAL_CODE.to_string(),
            tasks: Vec::new(),
            moodboard: Vec::new(),
            messages: Vec::new(),
            turn_count: 0,
            consecutive_chat_turns: 0,
            pending_event: None,
            last_speaker: None,
            active_tab: None,
            notifications: Vec::new(),
            is_thinking: false,
            typing_speaker: None,
            typing_buffer: String::new(),
            task_seq: 0,
        }
    }

    /// Tasks in a column, in insertion order.
    pub fn tasks_with(&self, status: TaskStatus) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.status == status)
    }

    /// Earliest-inserted task in a column.
    pub fn first_task_with(&self, status: TaskStatus) -> Option<&Task> {
        self.tasks_with(status).next()
    }

    pub fn count_tasks(&self, status: TaskStatus) -> usize {
        self.tasks_with(status).count()
    }

    pub fn find_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn image_count(&self) -> usize {
        self.moodboard
            .iter()
            .filter(|i| i.kind == MoodboardKind::Image)
            .count()
    }

    /// Last `n` chat messages, oldest first.
    pub fn recent_messages(&self, n: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Allocate a task id that has never been used in this state.
    pub(crate) fn next_task_id(&mut self) -> String {
        loop {
            self.task_seq += 1;
            let id = format!("t{}", self.task_seq);
            if self.find_task(&id).is_none() {
                return id;
            }
        }
    }

    /// Write the current build artifact to `path`.
    pub fn export_code(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, &self.code)
    }
}
