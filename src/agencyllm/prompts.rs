//! Instructions, state summaries and output schemas sent to the oracle.
//!
//! Two prompt families exist. Work turns get the full creative-director instruction and
//! the action schema; banter turns get a sitcom-writer instruction and a reduced schema
//! without any action payload.

use crate::action::ActionKind;
use crate::characters::{CharacterId, CAST};
use crate::client_wrapper::GenerationRequest;
use crate::config::AgencyConfig;
use crate::state::ProjectState;
use crate::strategy::Strategy;
use serde_json::{json, Value};

const EMOTIONS: [&str; 6] = ["happy", "angry", "celebrate", "confused", "tired", "working"];

const WORK_RULES: &str = "\
INSTRUCTIONS:
- ALWAYS check the board state.
- If a task is 'doing', FINISH IT (update code, then move it to done).
- If tasks are 'todo', START ONE (move it to doing, then start coding).
- If the board is empty, PLAN THE NEXT PHASE (add 3-4 specific technical tasks).
- When the action is 'update_code', RETURN THE FULL HTML DOCUMENT in actionPayload.content. Add to the existing code instead of deleting sections.
- The stack is Tailwind CSS (CDN), GSAP with ScrollTrigger (CDN), Lenis and HTML5. Aim for award-winning visuals.
- When the action is 'add_task', put the first title in actionPayload.title and any others in actionPayload.tasks.

OUTPUT: Return a single valid JSON object matching the schema. No prose.";

/// Build the cast section shared by both instruction families.
fn cast_sheet() -> String {
    CAST.iter()
        .filter(|c| c.id != CharacterId::System)
        .map(|c| format!("- {} (id: \"{}\", {}): {}", c.name, c.id, c.role, c.bio))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System instruction for work turns, scoped to the forced speaker when there is one.
pub fn work_instruction(strategy: &Strategy) -> String {
    let persona = match strategy.speaker {
        Some(id) => {
            let c = id.character();
            format!(
                "This turn is spoken by {} ({}). Stay in character: {}",
                c.name, c.role, c.bio
            )
        }
        None => "Pick whichever character should react next.".to_string(),
    };

    format!(
        "You are the world's best creative director and engineer, running THE AGENCY.\n\
         Output high-quality JSON actions that build a complex, award-winning website incrementally.\n\n\
         THE TEAM:\n{}\n\n\
         CURRENT PHASE: {}\n{}\n\n{}",
        cast_sheet(),
        strategy.phase,
        persona,
        WORK_RULES
    )
}

/// System instruction for banter turns.
pub fn banter_instruction() -> String {
    format!(
        "You are the scriptwriter for \"THE AGENCY\", a workplace sitcom.\n\
         Generate snappy, funny, character-driven dialogue about the project.\n\n\
         CHARACTERS:\n{}\n\n\
         Casual banter or a reaction to the current work. Output JSON.",
        cast_sheet()
    )
}

/// Compact state summary used as the user turn of the request.
pub fn state_summary(state: &ProjectState, strategy: &Strategy, config: &AgencyConfig) -> String {
    let history = state
        .recent_messages(config.history_window)
        .iter()
        .map(|m| format!("{}: {}", m.speaker, m.text))
        .collect::<Vec<_>>()
        .join("\n");

    if strategy.is_banter() {
        return format!(
            "HISTORY:\n{}\n\nCONTEXT: {}\n\nWho speaks next? What do they say? Return JSON.",
            history, strategy.prompt_context
        );
    }

    let brief: String = state.brief.chars().take(config.brief_excerpt_chars).collect();
    let tasks = if state.tasks.is_empty() {
        "(empty)".to_string()
    } else {
        state
            .tasks
            .iter()
            .map(|t| format!("[{}] ID:{} {}", t.status.as_str().to_uppercase(), t.id, t.title))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let moodboard = state
        .moodboard
        .iter()
        .map(|item| match item.kind {
            crate::state::MoodboardKind::Image => "image".to_string(),
            _ => {
                let excerpt: String = item.content.chars().take(40).collect();
                format!("{:?}: {}", item.kind, excerpt).to_lowercase()
            }
        })
        .collect::<Vec<_>>()
        .join(", ");

    let speaker = strategy
        .speaker
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "Any".to_string());
    let action = strategy
        .forced_action
        .map(|a| a.as_str().to_string())
        .unwrap_or_else(|| "Any".to_string());

    format!(
        "HISTORY:\n{history}\n\n\
         CURRENT STATE:\n\
         - Brief Snippet: {brief}...\n\
         - Tasks (KANBAN): {tasks}\n\
         - Moodboard: {count} items ({moodboard})\n\
         - Code Length: {code_len} chars\n\
         - Last Speaker: {last}\n\n\
         CONTEXT: {context}\n\
         REQUIRED SPEAKER: {speaker}\n\
         REQUIRED ACTION: {action}\n\n\
         GENERATE A VALID JSON ACTION.\n\
         If 'update_code', provide the FULL HTML string in actionPayload.content.\n\
         If 'generate_image', provide actionPayload.prompt.\n\
         If 'update_brief', provide the full brief text in actionPayload.content.",
        history = history,
        brief = brief,
        tasks = tasks,
        count = state.moodboard.len(),
        moodboard = moodboard,
        code_len = state.code.chars().count(),
        last = state
            .last_speaker
            .map(|s| s.as_str())
            .unwrap_or("none"),
        context = strategy.prompt_context,
        speaker = speaker,
        action = action,
    )
}

/// Schema of a full work-turn action.
pub fn work_schema() -> Value {
    let actions: Vec<&str> = ActionKind::ALL.iter().map(|k| k.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "speaker": { "type": "string" },
            "thinking": { "type": "string" },
            "message": { "type": "string" },
            "emotion": { "type": "string", "enum": EMOTIONS },
            "action": { "type": "string", "enum": actions },
            "actionPayload": {
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "title": { "type": "string" },
                    "tasks": { "type": "array", "items": { "type": "string" } },
                    "column": { "type": "string", "enum": ["todo", "doing", "done"] },
                    "taskId": { "type": "string" },
                    "type": { "type": "string", "enum": ["image", "note", "color"] },
                    "prompt": { "type": "string" },
                    "tabId": { "type": "string", "enum": ["brief", "moodboard", "board", "code", "live"] }
                }
            }
        },
        "required": ["speaker", "message", "action"]
    })
}

/// Schema of a banter line.
pub fn banter_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "speaker": { "type": "string" },
            "message": { "type": "string" },
            "emotion": { "type": "string", "enum": EMOTIONS }
        },
        "required": ["speaker", "message"]
    })
}

/// Assemble the full request for a strategy.
pub fn build_request(
    state: &ProjectState,
    strategy: &Strategy,
    config: &AgencyConfig,
) -> GenerationRequest {
    let (system_instruction, response_schema) = if strategy.is_banter() {
        (banter_instruction(), banter_schema())
    } else {
        (work_instruction(strategy), work_schema())
    };

    GenerationRequest {
        system_instruction,
        user_context: state_summary(state, strategy, config),
        response_schema,
        tier: strategy.model_tier,
    }
}
