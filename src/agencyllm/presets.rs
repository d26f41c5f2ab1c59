//! Ready-made project prompts and director events for hosts.

/// Example opening prompts for a session.
pub const DEFAULT_PROMPTS: [&str; 5] = [
    "A brutalist, monochromatic portfolio for a fashion house called 'VOID' that uses large typography and scroll-triggered reveals.",
    "A retro-futuristic dashboard for a space mining corp called 'HELION'. Neon oranges, grid lines, and data visualization.",
    "An ethereal, calming landing page for a meditation app called 'OOM'. Soft gradients, blur effects, and floating elements.",
    "A high-energy, glitch-art promotional site for a cyberpunk rave called 'NEURO-DANCE'. Strobe effects and aggressive typography.",
    "A clean, swiss-style layout for an architectural firm. Grid-based, heavy use of whitespace, and smooth page transitions.",
];

/// A labelled director event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresetEvent {
    pub label: &'static str,
    pub value: &'static str,
}

pub const PRESET_EVENTS: [PresetEvent; 4] = [
    PresetEvent {
        label: "Client Rage",
        value: "CLIENT EMAIL: 'This looks too boring! Make it POP! I want animations everywhere!'",
    },
    PresetEvent {
        label: "Viral Trend",
        value: "TREND ALERT: Neumorphism is back? The team needs to debate this.",
    },
    PresetEvent {
        label: "Server Crash",
        value: "CRITICAL: The dev server just crashed. Rich needs to fix the config.",
    },
    PresetEvent {
        label: "Pivot",
        value: "STRATEGY CHANGE: The client wants to pivot from B2B to D2C immediately.",
    },
];

/// Look up a preset event by label, ignoring case.
///
/// ```rust
/// use agencyllm::presets::find_event;
///
/// assert!(find_event("pivot").unwrap().value.starts_with("STRATEGY CHANGE"));
/// assert!(find_event("nope").is_none());
/// ```
pub fn find_event(label: &str) -> Option<&'static PresetEvent> {
    PRESET_EVENTS
        .iter()
        .find(|e| e.label.eq_ignore_ascii_case(label.trim()))
}
