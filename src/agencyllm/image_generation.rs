//! Image generation contract used by the moodboard side effect.
//!
//! When a turn asks for `generate_image`, the scheduler hands the prompt to an
//! [`ImageGenerationClient`]. The client returns one or more images, either as URLs or
//! as Base64 payloads; [`ImageData::to_data_uri`] turns whichever form arrived into the
//! string stored in a moodboard item.
//!
//! # Example
//!
//! ```rust,no_run
//! use agencyllm::clients::gemini::{GeminiConfig, GeminiImageClient};
//! use agencyllm::image_generation::{ImageGenerationClient, ImageGenerationOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = GeminiImageClient::new(GeminiConfig::from_env()?);
//!     let response = client
//!         .generate_image("brutalist poster, chrome type", ImageGenerationOptions::default())
//!         .await?;
//!
//!     if let Some(uri) = response.images.first().and_then(|i| i.to_data_uri()) {
//!         println!("{}...", &uri[..40.min(uri.len())]);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::error::Error;

/// Configuration options for image generation.
///
/// All fields are optional and fall back to provider defaults.
#[derive(Clone, Debug, Default)]
pub struct ImageGenerationOptions {
    /// Aspect ratio for the generated image (e.g. "1:1", "4:3", "16:9").
    pub aspect_ratio: Option<String>,

    /// Number of images to generate. Providers default to one.
    pub num_images: Option<u32>,
}

/// A single generated image, as a URL or as Base64 data.
///
/// ```
/// use agencyllm::image_generation::ImageData;
///
/// let image = ImageData {
///     url: None,
///     b64_json: Some("iVBORw0KGgoAAAANS".to_string()),
///     mime_type: None,
/// };
/// assert_eq!(
///     image.to_data_uri().as_deref(),
///     Some("data:image/png;base64,iVBORw0KGgoAAAANS")
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    /// Location of the image when the provider hosts it.
    pub url: Option<String>,

    /// Base64-encoded image bytes, with or without a `data:` prefix.
    pub b64_json: Option<String>,

    /// MIME type reported by the provider, if any.
    pub mime_type: Option<String>,
}

impl ImageData {
    /// The value to store in a moodboard item: a data URI for inline bytes, the URL
    /// otherwise. `None` when the image carries neither.
    pub fn to_data_uri(&self) -> Option<String> {
        if let Some(b64) = self.b64_json.as_deref().filter(|s| !s.is_empty()) {
            if b64.starts_with("data:") {
                return Some(b64.to_string());
            }
            let mime = self
                .mime_type
                .clone()
                .unwrap_or_else(|| mime_type_from_base64(b64).to_string());
            return Some(format!("data:{};base64,{}", mime, b64));
        }
        self.url.clone().filter(|u| !u.is_empty())
    }
}

/// Response from an image generation request.
#[derive(Clone, Debug, Default)]
pub struct ImageGenerationResponse {
    /// Generated images, in provider order.
    pub images: Vec<ImageData>,

    /// Prompt as rewritten by the provider, if it reports one.
    pub revised_prompt: Option<String>,
}

/// Guess an image MIME type from the magic bytes at the start of Base64 data.
///
/// ```
/// use agencyllm::image_generation::mime_type_from_base64;
///
/// assert_eq!(mime_type_from_base64("iVBORw0KGgoAAAANSUhEUg"), "image/png");
/// assert_eq!(mime_type_from_base64("/9j/4AAQSkZJRg"), "image/jpeg");
/// assert_eq!(mime_type_from_base64("UklGRiQAAABXRUJQ"), "image/webp");
/// assert_eq!(mime_type_from_base64("aW52YWxpZA=="), "application/octet-stream");
/// ```
pub fn mime_type_from_base64(b64_data: &str) -> &'static str {
    if b64_data.starts_with("iVBORw0KG") {
        "image/png"
    } else if b64_data.starts_with("/9j/") {
        "image/jpeg"
    } else if b64_data.starts_with("UklGRi") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}

/// Trait for providers that can turn a prompt into images.
///
/// Failures are never fatal to the agency: the side-effect runner reports them as a
/// notification and the turn loop carries on.
#[async_trait]
pub trait ImageGenerationClient: Send + Sync {
    /// Generate images from a text prompt.
    async fn generate_image(
        &self,
        prompt: &str,
        options: ImageGenerationOptions,
    ) -> Result<ImageGenerationResponse, Box<dyn Error + Send + Sync>>;

    /// Name of the model used for image generation.
    fn model_name(&self) -> &str;
}
