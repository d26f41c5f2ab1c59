use agencyllm::action::ActionKind;
use agencyllm::characters::CharacterId;
use agencyllm::client_wrapper::ModelTier;
use agencyllm::config::{AgencyConfig, ProgressPolicy};
use agencyllm::state::{MoodboardItem, MoodboardKind, Position, ProjectState, Task, TaskStatus};
use agencyllm::strategy::{plan_theme, route_task, Phase, StrategyEngine};

fn image(id: &str) -> MoodboardItem {
    MoodboardItem {
        id: id.to_string(),
        kind: MoodboardKind::Image,
        content: "data:image/png;base64,AAAA".to_string(),
        position: Position::default(),
        rotation: 0.0,
        owner: Some(CharacterId::ArtDirector),
    }
}

/// A state past briefing and ideation.
fn ready_state() -> ProjectState {
    let mut state = ProjectState::new("A detailed product brief. ".repeat(12));
    state.moodboard = vec![image("m1"), image("m2"), image("m3")];
    state
}

#[test]
fn test_short_brief_forces_briefing_regardless_of_other_fields() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.brief = "a simple portfolio site".to_string();
    state.tasks.push(Task::new("t1", "Hero", TaskStatus::Doing));
    state.tasks.push(Task::new("t2", "Nav", TaskStatus::Todo));

    for roll in [0.0, 0.5, 0.99] {
        let strategy = engine.determine(&state, roll);
        assert_eq!(strategy.phase, Phase::Briefing);
        assert_eq!(strategy.speaker, Some(CharacterId::ProductManager));
        assert_eq!(strategy.forced_action, Some(ActionKind::UpdateBrief));
        assert_eq!(strategy.model_tier, ModelTier::Fast);
    }
}

#[test]
fn test_pending_event_wins_over_everything() {
    let engine = StrategyEngine::default();
    let mut state = ProjectState::new("short");
    state.pending_event = Some("CLIENT EMAIL: make it pop".to_string());

    let strategy = engine.determine(&state, 0.3);
    assert_eq!(strategy.phase, Phase::EventOverride);
    assert_eq!(strategy.speaker, None);
    assert_eq!(strategy.forced_action, None);
    assert!(strategy.prompt_context.contains("CLIENT EMAIL: make it pop"));
    assert_eq!(
        strategy.responds_to_event.as_deref(),
        Some("CLIENT EMAIL: make it pop")
    );
}

#[test]
fn test_blank_pending_event_is_ignored() {
    let engine = StrategyEngine::default();
    let mut state = ProjectState::new("short");
    state.pending_event = Some("   ".to_string());
    assert_eq!(engine.determine(&state, 0.3).phase, Phase::Briefing);
}

#[test]
fn test_empty_moodboard_forces_ideation() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.moodboard.clear();

    let strategy = engine.determine(&state, 0.1);
    assert_eq!(strategy.phase, Phase::Ideation);
    assert_eq!(strategy.speaker, Some(CharacterId::ArtDirector));
    assert_eq!(strategy.forced_action, Some(ActionKind::GenerateImage));
}

#[test]
fn test_notes_do_not_count_as_images() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.moodboard.truncate(2);
    state.moodboard.push(MoodboardItem {
        kind: MoodboardKind::Note,
        ..image("n1")
    });
    assert_eq!(engine.determine(&state, 0.1).phase, Phase::Ideation);
}

#[test]
fn test_empty_board_forces_planning_with_phase_theme() {
    let engine = StrategyEngine::default();
    let state = ready_state();

    let strategy = engine.determine(&state, 0.1);
    assert_eq!(strategy.phase, Phase::Planning);
    assert_eq!(strategy.speaker, Some(CharacterId::ProductManager));
    assert_eq!(strategy.forced_action, Some(ActionKind::AddTask));
    assert!(strategy.prompt_context.contains("Phase 1: Foundation"));
}

#[test]
fn test_planning_theme_follows_completed_count() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    for i in 0..7 {
        state
            .tasks
            .push(Task::new(format!("d{}", i), "done work", TaskStatus::Done));
    }
    let strategy = engine.determine(&state, 0.1);
    assert!(strategy.prompt_context.contains("Phase 3: Motion & Physics"));

    assert_eq!(plan_theme(15).name, "Phase 6: Micro-Interactions");
    assert_eq!(plan_theme(21).name, "Phase 8: Experimental");
    assert_eq!(plan_theme(24).name, "Phase 5: Expansion");
}

#[test]
fn test_doing_task_is_built_or_completed_by_roll() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state
        .tasks
        .push(Task::new("t1", "Responsive grid", TaskStatus::Doing));

    let build = engine.determine(&state, 0.2);
    assert_eq!(build.phase, Phase::Execution);
    assert_eq!(build.speaker, Some(CharacterId::Engineer));
    assert_eq!(build.forced_action, Some(ActionKind::UpdateCode));
    assert_eq!(build.model_tier, ModelTier::Reasoning);
    assert_eq!(build.target_task.as_deref(), Some("t1"));

    let complete = engine.determine(&state, 0.8);
    assert_eq!(complete.phase, Phase::Execution);
    assert_eq!(complete.forced_action, Some(ActionKind::MoveTask));
    assert_eq!(complete.target_task.as_deref(), Some("t1"));
    assert_eq!(complete.target_column, Some(TaskStatus::Done));
    assert_eq!(complete.model_tier, ModelTier::Fast);
}

#[test]
fn test_earliest_doing_task_wins() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.tasks.push(Task::new("t1", "Footer", TaskStatus::Done));
    state.tasks.push(Task::new("t2", "Hero", TaskStatus::Doing));
    state.tasks.push(Task::new("t3", "Nav", TaskStatus::Doing));
    assert_eq!(
        engine.determine(&state, 0.1).target_task.as_deref(),
        Some("t2")
    );
}

#[test]
fn test_specialist_routing_by_title_keyword() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state
        .tasks
        .push(Task::new("t1", "Write the HEADLINE copy", TaskStatus::Doing));
    let strategy = engine.determine(&state, 0.1);
    assert_eq!(strategy.speaker, Some(CharacterId::Copywriter));
    assert_eq!(strategy.forced_action, Some(ActionKind::UpdateCode));

    state.tasks[0].title = "Hero Mockup".to_string();
    let strategy = engine.determine(&state, 0.1);
    assert_eq!(strategy.speaker, Some(CharacterId::Intern));
    assert_eq!(strategy.forced_action, Some(ActionKind::GenerateImage));

    assert_eq!(route_task("Noise texture overlay"), CharacterId::Intern);
    assert_eq!(route_task("Lenis smooth scroll"), CharacterId::Engineer);
}

#[test]
fn test_pickup_moves_first_todo_to_doing() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.tasks.push(Task::new("t4", "Navigation bar", TaskStatus::Todo));
    state.tasks.push(Task::new("t5", "Hero image", TaskStatus::Todo));

    let strategy = engine.determine(&state, 0.9);
    assert_eq!(strategy.phase, Phase::Pickup);
    assert_eq!(strategy.speaker, Some(CharacterId::Engineer));
    assert_eq!(strategy.forced_action, Some(ActionKind::MoveTask));
    assert_eq!(strategy.target_task.as_deref(), Some("t4"));
    assert_eq!(strategy.target_column, Some(TaskStatus::Doing));
    assert!(strategy.prompt_context.contains("Move task t4 to 'Doing'"));
}

#[test]
fn test_fixed_turns_policy_is_deterministic() {
    let config = AgencyConfig::default().with_progress_policy(ProgressPolicy::FixedTurns { turns: 2 });
    let engine = StrategyEngine::new(config);
    let mut state = ready_state();
    let mut task = Task::new("t1", "Hero", TaskStatus::Doing);
    task.started_turn = Some(10);
    state.tasks.push(task);

    state.turn_count = 11;
    for roll in [0.0, 0.99] {
        assert_eq!(
            engine.determine(&state, roll).forced_action,
            Some(ActionKind::UpdateCode)
        );
    }

    state.turn_count = 12;
    for roll in [0.0, 0.99] {
        assert_eq!(
            engine.determine(&state, roll).forced_action,
            Some(ActionKind::MoveTask)
        );
    }
}

#[test]
fn test_weighted_split_is_configurable() {
    let config = AgencyConfig::default().with_progress_policy(ProgressPolicy::Weighted {
        continue_probability: 1.0,
    });
    let engine = StrategyEngine::new(config);
    let mut state = ready_state();
    state.tasks.push(Task::new("t1", "Hero", TaskStatus::Doing));
    assert_eq!(
        engine.determine(&state, 0.999).forced_action,
        Some(ActionKind::UpdateCode)
    );
}

#[test]
fn test_all_done_board_plans_next_phase_instead_of_banter() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.tasks.push(Task::new("t1", "Hero", TaskStatus::Done));
    assert_eq!(engine.determine(&state, 0.5).phase, Phase::Planning);
}

#[test]
fn test_determine_is_pure() {
    let engine = StrategyEngine::default();
    let mut state = ready_state();
    state.tasks.push(Task::new("t1", "Hero", TaskStatus::Doing));
    let before = state.clone();
    let a = engine.determine(&state, 0.42);
    let b = engine.determine(&state, 0.42);
    assert_eq!(a, b);
    assert_eq!(state, before);
}
