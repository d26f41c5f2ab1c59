//! Google Gemini clients.
//!
//! [`GeminiClient`] talks to Gemini through its OpenAI-compatible chat endpoint and
//! implements [`ClientWrapper`] for turn generation. [`GeminiImageClient`] calls the
//! native `generateContent` endpoint of an image model and implements
//! [`ImageGenerationClient`] for the moodboard.

use crate::client_wrapper::{ClientWrapper, GenerationRequest, Message, ModelTier, Role, TokenUsage};
use crate::clients::common::{get_http_client, send_and_track, to_chat_messages};
use crate::error::AgencyError;
use crate::image_generation::{
    ImageData, ImageGenerationClient, ImageGenerationOptions, ImageGenerationResponse,
};
use async_trait::async_trait;
use openai_rust2 as openai_rust;
use serde::Deserialize;
use serde_json::json;
use std::error::Error;
use std::sync::Mutex;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const CHAT_COMPLETIONS_PATH: &str = "/v1beta/chat/completions";

/// Connection and model settings shared by both Gemini clients.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model for [`ModelTier::Fast`].
    pub fast_model: String,
    /// Model for [`ModelTier::Reasoning`].
    pub reasoning_model: String,
    /// Model used for image generation.
    pub image_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            fast_model: "gemini-2.5-flash".to_string(),
            reasoning_model: "gemini-2.5-pro".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
        }
    }

    /// Read the API key from `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, Box<dyn Error + Send + Sync>> {
        let key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| "GEMINI_API_KEY is not set".to_string())?;
        Ok(Self::new(key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models(mut self, fast: impl Into<String>, reasoning: impl Into<String>) -> Self {
        self.fast_model = fast.into();
        self.reasoning_model = reasoning.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Reasoning => &self.reasoning_model,
        }
    }
}

/// Turn-generation client over Gemini's OpenAI-compatible endpoint.
pub struct GeminiClient {
    client: openai_rust::Client,
    config: GeminiConfig,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        GeminiClient {
            client: openai_rust::Client::new_with_base_url(&config.api_key, &config.base_url),
            config,
            token_usage: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }
}

/// The compatibility endpoint has no structured-output switch, so the schema and the
/// reasoning budget travel inside the system instruction.
fn compose_messages(request: &GenerationRequest) -> Vec<Message> {
    let mut messages = request.to_messages();
    if let Some(system) = messages.iter_mut().find(|m| m.role == Role::System) {
        system.content = format!(
            "{}\n\nThink for at most {} tokens before answering.\nRESPONSE SCHEMA (JSON):\n{}",
            system.content,
            request.tier.thinking_budget(),
            request.response_schema
        );
    }
    messages
}

#[async_trait]
impl ClientWrapper for GeminiClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let model = self.config.model_for(request.tier);
        let formatted_messages = to_chat_messages(&compose_messages(request));

        let result = send_and_track(
            &self.client,
            model,
            formatted_messages,
            Some(CHAT_COMPLETIONS_PATH.to_string()),
            &self.token_usage,
        )
        .await;

        if let Err(err) = &result {
            log::error!(
                "agencyllm::clients::gemini::generate(...): {} failed: {}",
                model,
                err
            );
        }
        result
    }

    fn model_name(&self, tier: ModelTier) -> &str {
        self.config.model_for(tier)
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}

/// Image client over Gemini's native `generateContent` endpoint.
pub struct GeminiImageClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiImageClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: get_http_client(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.image_model
        )
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    data: String,
}

impl GenerateContentResponse {
    fn into_images(self) -> Vec<ImageData> {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.inline_data)
            .map(|inline| ImageData {
                url: None,
                b64_json: Some(inline.data),
                mime_type: inline.mime_type,
            })
            .collect()
    }
}

#[async_trait]
impl ImageGenerationClient for GeminiImageClient {
    async fn generate_image(
        &self,
        prompt: &str,
        options: ImageGenerationOptions,
    ) -> Result<ImageGenerationResponse, Box<dyn Error + Send + Sync>> {
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        if let Some(ratio) = options.aspect_ratio {
            body["generationConfig"] = json!({ "imageConfig": { "aspectRatio": ratio } });
        }

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgencyError::ImageGeneration(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::error!(
                "agencyllm::clients::gemini::generate_image(...): HTTP {} from {}: {}",
                status,
                self.config.image_model,
                text
            );
            return Err(Box::new(AgencyError::ImageGeneration(format!(
                "HTTP {}",
                status
            ))));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AgencyError::ImageGeneration(e.to_string()))?;

        let mut images = parsed.into_images();
        if let Some(n) = options.num_images {
            images.truncate(n.max(1) as usize);
        }
        if images.is_empty() {
            return Err(Box::new(AgencyError::ImageGeneration(
                "response contained no inline image".into(),
            )));
        }

        Ok(ImageGenerationResponse {
            images,
            revised_prompt: None,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.image_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_appended_to_system_instruction() {
        let request = GenerationRequest {
            system_instruction: "be kevin".into(),
            user_context: "state".into(),
            response_schema: json!({"type": "object"}),
            tier: ModelTier::Reasoning,
        };
        let messages = compose_messages(&request);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.starts_with("be kevin"));
        assert!(messages[0].content.contains("4096"));
        assert!(messages[0].content.contains("{\"type\":\"object\"}"));
        assert_eq!(messages[1].content, "state");
    }

    #[test]
    fn inline_parts_become_images() {
        let parsed: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo" } }
                ]}
            }]
        }))
        .unwrap();
        let images = parsed.into_images();
        assert_eq!(images.len(), 1);
        assert_eq!(
            images[0].to_data_uri().as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo")
        );
    }

    #[test]
    fn config_routes_tiers() {
        let config = GeminiConfig::new("key").with_models("f", "r");
        assert_eq!(config.model_for(ModelTier::Fast), "f");
        assert_eq!(config.model_for(ModelTier::Reasoning), "r");
        assert_eq!(config.image_model, "gemini-2.5-flash-image");
    }
}
