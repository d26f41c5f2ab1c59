//! The StrategyEngine: which phase the project is in and what the next turn must do.
//!
//! [`StrategyEngine::determine`] is a pure function of the project state and a random
//! roll. It walks a fixed priority list and returns the first matching [`Strategy`]:
//!
//! | priority | phase | condition | forced |
//! |---|---|---|---|
//! | 1 | [`Phase::EventOverride`] | a director event is pending | nothing, any speaker reacts |
//! | 2 | [`Phase::Briefing`] | brief shorter than the threshold | product manager, `update_brief` |
//! | 3 | [`Phase::Ideation`] | too few moodboard images | art director, `generate_image` |
//! | 4 | [`Phase::Planning`] | no `todo` and no `doing` tasks | product manager, `add_task` |
//! | 5 | [`Phase::Execution`] | a task is `doing` | routed role, build or complete |
//! | 6 | [`Phase::Pickup`] | `todo` has tasks | routed role, `move_task` to doing |
//! | 7 | [`Phase::Banter`] | otherwise | nothing, `wait` expected |
//!
//! The roll is only consulted by the weighted [`ProgressPolicy`], which keeps the engine
//! deterministic for a given `(state, roll)` pair.
//!
//! ```rust
//! use agencyllm::config::AgencyConfig;
//! use agencyllm::state::ProjectState;
//! use agencyllm::strategy::{Phase, StrategyEngine};
//! use agencyllm::characters::CharacterId;
//! use agencyllm::action::ActionKind;
//!
//! let engine = StrategyEngine::new(AgencyConfig::default());
//! let strategy = engine.determine(&ProjectState::new("a simple portfolio site"), 0.5);
//!
//! assert_eq!(strategy.phase, Phase::Briefing);
//! assert_eq!(strategy.speaker, Some(CharacterId::ProductManager));
//! assert_eq!(strategy.forced_action, Some(ActionKind::UpdateBrief));
//! ```

use crate::action::ActionKind;
use crate::characters::CharacterId;
use crate::client_wrapper::ModelTier;
use crate::config::{AgencyConfig, ProgressPolicy};
use crate::state::{ProjectState, Task, TaskStatus};
use std::fmt;

/// Pipeline stage the engine is enforcing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    EventOverride,
    Briefing,
    Ideation,
    Planning,
    Execution,
    Pickup,
    Banter,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::EventOverride => "event_override",
            Phase::Briefing => "briefing",
            Phase::Ideation => "ideation",
            Phase::Planning => "planning",
            Phase::Execution => "execution",
            Phase::Pickup => "pickup",
            Phase::Banter => "banter",
        };
        f.write_str(name)
    }
}

/// A named planning theme with the work it suggests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlanTheme {
    pub name: &'static str,
    pub context: &'static str,
}

const FOUNDATION_THEMES: [PlanTheme; 4] = [
    PlanTheme {
        name: "Phase 1: Foundation",
        context: "Setup Hero Section, Navigation Bar, Responsive Grid, and Typography variables.",
    },
    PlanTheme {
        name: "Phase 2: Core Content",
        context: "Add 'About', 'Services', or 'Features' sections. Use bento grids. Populate with real text (no Lorem Ipsum).",
    },
    PlanTheme {
        name: "Phase 3: Motion & Physics",
        context: "Implement smooth scrolling (Lenis), reveal animations (GSAP ScrollTrigger), and parallax effects.",
    },
    PlanTheme {
        name: "Phase 4: Visual Polish",
        context: "Add noise textures, radial gradients, glassmorphism overlays, custom cursors, and refine padding/margins.",
    },
];

const EXPANSION_THEMES: [PlanTheme; 4] = [
    PlanTheme {
        name: "Phase 5: Expansion",
        context: "Add a new page section (e.g. Testimonials, FAQ, Pricing, or Blog Preview) to make the page longer and richer.",
    },
    PlanTheme {
        name: "Phase 6: Micro-Interactions",
        context: "Add magnetic buttons, custom tooltips, text reveal animations on hover, or interactive cards.",
    },
    PlanTheme {
        name: "Phase 7: Conversion",
        context: "Add a Newsletter signup, Call-to-Action buttons, or a Contact Form with validation styles.",
    },
    PlanTheme {
        name: "Phase 8: Experimental",
        context: "Try something weird. WebGL distortion, ASCII art footer, Marquee text, or a Konami code easter egg.",
    },
];

/// Tasks completed per planning theme.
const TASKS_PER_THEME: usize = 3;

/// Planning theme for a board with `completed` done tasks.
///
/// The first four themes each cover three completed tasks; after that the engine
/// cycles through the expansion themes forever.
///
/// ```rust
/// use agencyllm::strategy::plan_theme;
///
/// assert_eq!(plan_theme(0).name, "Phase 1: Foundation");
/// assert_eq!(plan_theme(11).name, "Phase 4: Visual Polish");
/// assert_eq!(plan_theme(12).name, "Phase 5: Expansion");
/// assert_eq!(plan_theme(24).name, "Phase 5: Expansion");
/// ```
pub fn plan_theme(completed: usize) -> &'static PlanTheme {
    let step = completed / TASKS_PER_THEME;
    if step < FOUNDATION_THEMES.len() {
        &FOUNDATION_THEMES[step]
    } else {
        &EXPANSION_THEMES[(step - FOUNDATION_THEMES.len()) % EXPANSION_THEMES.len()]
    }
}

const VISUAL_KEYWORDS: [&str; 9] = [
    "image",
    "mockup",
    "asset",
    "visual",
    "illustration",
    "icon",
    "photo",
    "texture",
    "artwork",
];

const COPY_KEYWORDS: [&str; 8] = [
    "copy",
    "headline",
    "tagline",
    "messaging",
    "slogan",
    "wording",
    "content",
    "text",
];

/// Role that owns a task, by case-insensitive keyword match on its title.
///
/// Visual keywords are checked before copy keywords so that "texture" routes to the
/// intern and not to the copywriter. Anything else belongs to the engineer.
///
/// ```rust
/// use agencyllm::strategy::route_task;
/// use agencyllm::characters::CharacterId;
///
/// assert_eq!(route_task("Write HERO Headline"), CharacterId::Copywriter);
/// assert_eq!(route_task("Hero image mockup"), CharacterId::Intern);
/// assert_eq!(route_task("Responsive grid"), CharacterId::Engineer);
/// ```
pub fn route_task(title: &str) -> CharacterId {
    let title = title.to_lowercase();
    if VISUAL_KEYWORDS.iter().any(|k| title.contains(k)) {
        CharacterId::Intern
    } else if COPY_KEYWORDS.iter().any(|k| title.contains(k)) {
        CharacterId::Copywriter
    } else {
        CharacterId::Engineer
    }
}

/// The decision for one turn.
#[derive(Clone, Debug, PartialEq)]
pub struct Strategy {
    pub phase: Phase,
    /// Character the turn must be spoken by. `None` lets the oracle choose.
    pub speaker: Option<CharacterId>,
    /// Action kind the turn must perform. `None` leaves it to the oracle.
    pub forced_action: Option<ActionKind>,
    /// Directive included in the oracle prompt.
    pub prompt_context: String,
    pub model_tier: ModelTier,
    /// Task a forced `move_task` or build step refers to.
    pub target_task: Option<String>,
    /// Column a forced `move_task` should move the target to.
    pub target_column: Option<TaskStatus>,
    /// The pending event this turn answers, if any.
    pub responds_to_event: Option<String>,
}

impl Strategy {
    fn unforced(phase: Phase, context: String) -> Self {
        Self {
            phase,
            speaker: None,
            forced_action: None,
            prompt_context: context,
            model_tier: ModelTier::Fast,
            target_task: None,
            target_column: None,
            responds_to_event: None,
        }
    }

    fn forced(phase: Phase, speaker: CharacterId, action: ActionKind, context: String) -> Self {
        Self {
            speaker: Some(speaker),
            forced_action: Some(action),
            // Only code generation gets the larger reasoning budget.
            model_tier: if action == ActionKind::UpdateCode {
                ModelTier::Reasoning
            } else {
                ModelTier::Fast
            },
            ..Self::unforced(phase, context)
        }
    }

    fn targeting(mut self, task: &Task, column: Option<TaskStatus>) -> Self {
        self.target_task = Some(task.id.clone());
        self.target_column = column;
        self
    }

    /// Banter turns use the reduced sitcom prompt and always resolve to `wait`.
    pub fn is_banter(&self) -> bool {
        self.phase == Phase::Banter
    }
}

/// Pure decision function over [`ProjectState`].
#[derive(Clone, Debug)]
pub struct StrategyEngine {
    config: AgencyConfig,
}

impl StrategyEngine {
    pub fn new(config: AgencyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AgencyConfig {
        &self.config
    }

    /// Decide the next turn. `roll` is a uniform sample in `0.0..1.0`.
    pub fn determine(&self, state: &ProjectState, roll: f64) -> Strategy {
        if let Some(event) = state.pending_event.as_deref().filter(|e| !e.trim().is_empty()) {
            let mut strategy = Strategy::unforced(
                Phase::EventOverride,
                format!("URGENT EVENT: {}. Team must react.", event),
            );
            strategy.responds_to_event = Some(event.to_string());
            return strategy;
        }

        if state.brief.chars().count() < self.config.brief_threshold {
            let pm = CharacterId::ProductManager.display_name();
            return Strategy::forced(
                Phase::Briefing,
                CharacterId::ProductManager,
                ActionKind::UpdateBrief,
                format!(
                    "The brief is too short. {} needs to write a detailed PRD (product requirements document) from the client's prompt.",
                    pm
                ),
            );
        }

        if state.image_count() < self.config.min_moodboard_images {
            return Strategy::forced(
                Phase::Ideation,
                CharacterId::ArtDirector,
                ActionKind::GenerateImage,
                "We need more visual inspiration before we can code the foundation. Generate a high-fashion abstract asset that fits the brief.".to_string(),
            );
        }

        let doing = state.first_task_with(TaskStatus::Doing);
        let todo = state.first_task_with(TaskStatus::Todo);

        if doing.is_none() && todo.is_none() {
            let theme = plan_theme(state.count_tasks(TaskStatus::Done));
            return Strategy::forced(
                Phase::Planning,
                CharacterId::ProductManager,
                ActionKind::AddTask,
                format!(
                    "The board is empty. We are entering **{}**. {} needs to add 3-4 specific technical tasks to the board. Context: {}",
                    theme.name,
                    CharacterId::ProductManager.display_name(),
                    theme.context
                ),
            );
        }

        if let Some(task) = doing {
            return self.execution(state, task, roll);
        }

        if let Some(task) = todo {
            let role = route_task(&task.title);
            return Strategy::forced(
                Phase::Pickup,
                role,
                ActionKind::MoveTask,
                format!(
                    "{} picks up the next priority task: \"{}\". Move task {} to 'Doing' and announce the start.",
                    role.display_name(),
                    task.title,
                    task.id
                ),
            )
            .targeting(task, Some(TaskStatus::Doing));
        }

        Strategy::unforced(
            Phase::Banter,
            "Casual workspace banter about the project.".to_string(),
        )
    }

    fn execution(&self, state: &ProjectState, task: &Task, roll: f64) -> Strategy {
        let role = route_task(&task.title);
        let name = role.display_name();

        if self.should_complete(state, task, roll) {
            return Strategy::forced(
                Phase::Execution,
                role,
                ActionKind::MoveTask,
                format!(
                    "{} has finished the task: \"{}\". Announce it is done and move task {} to the 'Done' column.",
                    name, task.title, task.id
                ),
            )
            .targeting(task, Some(TaskStatus::Done));
        }

        let (action, context) = match role {
            CharacterId::Intern => (
                ActionKind::GenerateImage,
                format!(
                    "{} is working on the active task: \"{}\". Generate an image asset for it.",
                    name, task.title
                ),
            ),
            CharacterId::Copywriter => (
                ActionKind::UpdateCode,
                format!(
                    "{} is working on the active task: \"{}\". Rewrite the copy in the page and return the full updated HTML.",
                    name, task.title
                ),
            ),
            _ => (
                ActionKind::UpdateCode,
                format!(
                    "{} is working on the active task: \"{}\". Write or update the code to implement this feature fully. Make it look amazing (GSAP, Tailwind).",
                    name, task.title
                ),
            ),
        };
        Strategy::forced(Phase::Execution, role, action, context).targeting(task, None)
    }

    fn should_complete(&self, state: &ProjectState, task: &Task, roll: f64) -> bool {
        match self.config.progress_policy {
            ProgressPolicy::Weighted {
                continue_probability,
            } => roll >= continue_probability,
            ProgressPolicy::FixedTurns { turns } => {
                let started = task.started_turn.unwrap_or(0);
                state.turn_count.saturating_sub(started) >= turns
            }
        }
    }
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new(AgencyConfig::default())
    }
}
