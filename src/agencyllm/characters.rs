//! The cast of the agency.
//!
//! Five working characters plus the `System` narrator. The strategy engine talks
//! about roles (product manager, art director, engineer, copywriter, intern); each
//! role is played by exactly one character.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a character. Serialized with the short ids the oracle sees
/// in its instructions (`"kevin"`, `"ramona"`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterId {
    /// Kevin, Head of Product. Owns the brief and the board.
    #[serde(rename = "kevin")]
    ProductManager,
    /// Ramona, Art Director. Owns visual direction.
    #[serde(rename = "ramona")]
    ArtDirector,
    /// Rich, Design Engineer. Writes the code.
    #[serde(rename = "rich")]
    Engineer,
    /// 0xNonSense, Growth and copy.
    #[serde(rename = "nonsense")]
    Copywriter,
    /// Marc, the intern and designated mockup generator.
    #[serde(rename = "marc")]
    Intern,
    /// The agency operating system, used for narration and failures.
    #[serde(rename = "system")]
    System,
}

/// Static persona data for a character.
#[derive(Clone, Copy, Debug)]
pub struct Character {
    pub id: CharacterId,
    pub name: &'static str,
    pub role: &'static str,
    pub bio: &'static str,
}

pub const CAST: [Character; 6] = [
    Character {
        id: CharacterId::ProductManager,
        name: "Kevin",
        role: "Head of Product",
        bio: "Deeply anxious about scope creep and speaks in corporate metaphors. Lives on the Kanban board. Turns a one-sentence prompt into a detailed PRD and always pushes for the MVP, while secretly wanting to be cool.",
    },
    Character {
        id: CharacterId::ArtDirector,
        name: "Ramona",
        role: "Art Director",
        bio: "Avant-garde visionary who distrusts anything called user friendly. Draws on brutalism, print design and 90s anime. Will not let anyone code until the vibe is right and wants mockups before a single div exists.",
    },
    Character {
        id: CharacterId::Engineer,
        name: "Rich",
        role: "Design Engineer",
        bio: "Creative developer obsessed with shaders, motion and frame rates. Writes code that reads like poetry and believes a website is never finished, only abandoned.",
    },
    Character {
        id: CharacterId::Copywriter,
        name: "0xNonSense",
        role: "Growth Hacker",
        bio: "Terminally online. Talks about dopamine loops and narrative in internet slang. Writes copy that converts.",
    },
    Character {
        id: CharacterId::Intern,
        name: "Marc",
        role: "Intern",
        bio: "Trying his best and using AI for everything. Generates weird images and is just happy to be here.",
    },
    Character {
        id: CharacterId::System,
        name: "System",
        role: "OS",
        bio: "The Agency Operating System.",
    },
];

impl CharacterId {
    /// Short id used in prompts and serialized state.
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterId::ProductManager => "kevin",
            CharacterId::ArtDirector => "ramona",
            CharacterId::Engineer => "rich",
            CharacterId::Copywriter => "nonsense",
            CharacterId::Intern => "marc",
            CharacterId::System => "system",
        }
    }

    /// Persona record for this character.
    pub fn character(&self) -> &'static Character {
        match self {
            CharacterId::ProductManager => &CAST[0],
            CharacterId::ArtDirector => &CAST[1],
            CharacterId::Engineer => &CAST[2],
            CharacterId::Copywriter => &CAST[3],
            CharacterId::Intern => &CAST[4],
            CharacterId::System => &CAST[5],
        }
    }

    pub fn display_name(&self) -> &'static str {
        self.character().name
    }

    /// Resolve a speaker name produced by the oracle.
    ///
    /// Matching is case-insensitive against the short id, the display name and a few
    /// role aliases. Returns `None` for anything unrecognised.
    ///
    /// ```rust
    /// use agencyllm::characters::CharacterId;
    ///
    /// assert_eq!(CharacterId::resolve("Kevin"), Some(CharacterId::ProductManager));
    /// assert_eq!(CharacterId::resolve(" RICH "), Some(CharacterId::Engineer));
    /// assert_eq!(CharacterId::resolve("art director"), Some(CharacterId::ArtDirector));
    /// assert_eq!(CharacterId::resolve("bob"), None);
    /// ```
    pub fn resolve(name: &str) -> Option<CharacterId> {
        let key = name.trim().to_lowercase().replace(['-', '_'], " ");
        let id = match key.as_str() {
            "kevin" | "pm" | "product manager" | "head of product" => CharacterId::ProductManager,
            "ramona" | "art director" | "designer" | "design" => CharacterId::ArtDirector,
            "rich" | "engineer" | "dev" | "developer" | "design engineer" => CharacterId::Engineer,
            "nonsense" | "0xnonsense" | "copywriter" | "copy" | "growth hacker" => {
                CharacterId::Copywriter
            }
            "marc" | "intern" => CharacterId::Intern,
            "system" | "os" | "narrator" => CharacterId::System,
            _ => return None,
        };
        Some(id)
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
