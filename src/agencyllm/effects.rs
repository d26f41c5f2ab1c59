//! Side effects requested by the reducer and completed off the turn loop.
//!
//! The reducer never performs I/O. When a turn asks for an image it returns a
//! [`SideEffect`]; the scheduler spawns [`run`] for it and feeds the resulting
//! [`Update`] back through the reducer, so the moodboard is still written by a single
//! owner.

use crate::characters::CharacterId;
use crate::error::AgencyError;
use crate::image_generation::{ImageGenerationClient, ImageGenerationOptions};
use crate::reducer::Update;
use crate::state::Position;
use rand::Rng;
use std::sync::Arc;

/// Follow-on work produced by a reducer step.
#[derive(Clone, Debug, PartialEq)]
pub enum SideEffect {
    /// Generate an image and pin it to the moodboard.
    GenerateImage {
        prompt: String,
        requester: CharacterId,
    },
}

/// Run one side effect to completion and describe its outcome as an [`Update`].
///
/// Without an image client every request fails, which the reducer reports as a
/// notification.
pub async fn run(effect: SideEffect, images: Option<Arc<dyn ImageGenerationClient>>) -> Update {
    match effect {
        SideEffect::GenerateImage { prompt, requester } => {
            match generate(&prompt, images.as_deref()).await {
                Ok(data) => {
                    let (position, rotation) = scatter();
                    Update::ImageGenerated {
                        prompt,
                        requester,
                        data,
                        position,
                        rotation,
                    }
                }
                Err(err) => Update::ImageFailed {
                    prompt,
                    requester,
                    error: err.to_string(),
                },
            }
        }
    }
}

async fn generate(
    prompt: &str,
    images: Option<&dyn ImageGenerationClient>,
) -> Result<String, AgencyError> {
    let client = images
        .ok_or_else(|| AgencyError::ImageGeneration("no image client configured".into()))?;

    let response = client
        .generate_image(
            prompt,
            ImageGenerationOptions {
                aspect_ratio: Some("1:1".to_string()),
                num_images: Some(1),
            },
        )
        .await
        .map_err(|e| AgencyError::ImageGeneration(e.to_string()))?;

    response
        .images
        .iter()
        .find_map(|image| image.to_data_uri())
        .ok_or_else(|| AgencyError::ImageGeneration("provider returned no image".into()))
}

/// Random placement for a freshly generated image: 20-80% on both axes, tilted up to
/// ten degrees either way.
fn scatter() -> (Position, f64) {
    let mut rng = rand::thread_rng();
    let position = Position {
        x: rng.gen_range(20.0..=80.0),
        y: rng.gen_range(20.0..=80.0),
    };
    (position, rng.gen_range(-10.0..=10.0))
}
