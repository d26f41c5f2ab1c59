use async_trait::async_trait;
use std::error::Error;
use std::fmt;
use std::sync::Mutex;

/// A ClientWrapper is a wrapper around a specific generative-language-model service.
/// It provides the single capability the turn loop needs from the oracle: "given
/// instructions, context and an output schema, return some text".
/// It does not keep track of the agency state; the TurnGenerator owns the prompt
/// assembly and treats whatever comes back as untrusted text.
// src/client_wrapper

/// Represents the possible roles for a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    // set by the developer to steer the model's responses
    User,
    // a message sent by a human user (or app user)
    Assistant, // lets the model know the content was generated as a response to a user message
}

/// How many tokens were spent on prompt vs. completion.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// Represents a generic message to be sent to an LLM.
#[derive(Clone, Debug)]
pub struct Message {
    /// The role associated with the message.
    pub role: Role,
    /// The actual content of the message.
    pub content: String,
}

/// Cost/latency tier requested for a generation call.
///
/// Only the coding path asks for [`ModelTier::Reasoning`]; every other phase runs on
/// the cheaper [`ModelTier::Fast`] tier.
///
/// ```rust
/// use agencyllm::client_wrapper::ModelTier;
///
/// assert!(ModelTier::Reasoning.thinking_budget() > ModelTier::Fast.thinking_budget());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelTier {
    /// Fast, cheap model used for briefing, planning, banter and reactions.
    Fast,
    /// Larger reasoning budget, reserved for code generation.
    Reasoning,
}

impl ModelTier {
    /// Token budget a provider may spend on hidden reasoning for this tier.
    pub fn thinking_budget(&self) -> u32 {
        match self {
            ModelTier::Fast => 1024,
            ModelTier::Reasoning => 4096,
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Fast => write!(f, "fast"),
            ModelTier::Reasoning => write!(f, "reasoning"),
        }
    }
}

/// One request to the generation capability.
///
/// The schema is advisory: providers that support structured output may enforce it,
/// the rest embed it into the instructions. Either way the response is parsed as
/// untrusted text.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// Role-scoped system instructions (persona, phase, rules).
    pub system_instruction: String,
    /// Contextual prompt with the compact state summary.
    pub user_context: String,
    /// JSON schema describing the expected object.
    pub response_schema: serde_json::Value,
    /// Requested model tier.
    pub tier: ModelTier,
}

impl GenerationRequest {
    /// Flatten the request into the chat message pair most providers expect.
    pub fn to_messages(&self) -> Vec<Message> {
        vec![
            Message {
                role: Role::System,
                content: self.system_instruction.clone(),
            },
            Message {
                role: Role::User,
                content: self.user_context.clone(),
            },
        ]
    }
}

/// Trait defining the interface to interact with various LLM services.
#[async_trait]
pub trait ClientWrapper: Send + Sync {
    /// Send the request to the LLM and return its raw text answer.
    ///
    /// Implementations should map network errors, timeouts and empty (refused)
    /// answers onto an `Err`; the caller retries all of them the same way.
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, Box<dyn Error + Send + Sync>>;

    /// Name of the model used for the given tier, for logging.
    fn model_name(&self, tier: ModelTier) -> &str;

    /// Hook to retrieve usage from the *last* generate() call.
    /// Default impl returns None so existing wrappers don't break.
    fn get_last_usage(&self) -> Option<TokenUsage> {
        self.usage_slot()
            .and_then(|slot| slot.lock().ok().and_then(|u| u.clone()))
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        // ClientWrapper implementations supporting TokenUsage tracking should return a Mutex<Option<TokenUsage>> by overriding this method.
        None
    }
}
