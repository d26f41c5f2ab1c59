//! Error types shared by the turn engine.
//!
//! Every failure of the oracle maps onto an [`AgencyError`] so the
//! [`TurnGenerator`](crate::generator::TurnGenerator) can treat them uniformly as
//! retryable. None of these ever escape the turn loop as a crash; after the retry
//! budget is spent the generator substitutes a scripted fallback action.

use std::error::Error;
use std::fmt;

/// Result alias used by the async surfaces of the crate.
pub type AgencyResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Errors raised while producing or applying a turn.
///
/// # Examples
///
/// ```
/// use agencyllm::error::AgencyError;
///
/// let err = AgencyError::MalformedResponse("no JSON object".into());
/// assert_eq!(err.to_string(), "Malformed response: no JSON object");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgencyError {
    /// Network failure, timeout or provider-side error.
    Transport(String),

    /// The provider answered with no content (typically a safety refusal).
    EmptyResponse,

    /// The answer could not be parsed into an action object.
    MalformedResponse(String),

    /// The answer parsed but did not satisfy the forced contract or the action schema.
    SchemaViolation(String),

    /// The image-generation capability failed or returned no image.
    ImageGeneration(String),

    /// The scheduler task is gone and can no longer receive intents.
    SchedulerClosed,
}

impl fmt::Display for AgencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgencyError::Transport(msg) => write!(f, "Transport failure: {}", msg),
            AgencyError::EmptyResponse => write!(f, "Empty response from oracle"),
            AgencyError::MalformedResponse(msg) => write!(f, "Malformed response: {}", msg),
            AgencyError::SchemaViolation(msg) => write!(f, "Schema violation: {}", msg),
            AgencyError::ImageGeneration(msg) => write!(f, "Image generation failed: {}", msg),
            AgencyError::SchedulerClosed => write!(f, "Scheduler is no longer running"),
        }
    }
}

impl Error for AgencyError {}
