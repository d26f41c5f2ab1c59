use crate::client_wrapper::{Message, Role, TokenUsage};
use crate::error::AgencyError;
use lazy_static::lazy_static;
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::error::Error;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    /// Process-wide HTTP client so image requests reuse pooled connections.
    static ref SHARED_HTTP_CLIENT: reqwest::Client = reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(120))
        .build()
        .unwrap_or_else(|err| {
            log::warn!(
                "agencyllm::clients::common: falling back to default HTTP client: {}",
                err
            );
            reqwest::Client::new()
        });
}

/// A handle to the shared HTTP client. Cloning a `reqwest::Client` is cheap.
pub fn get_http_client() -> reqwest::Client {
    SHARED_HTTP_CLIENT.clone()
}

/// Convert our messages into the OpenAI-compatible wire format.
pub fn to_chat_messages(messages: &[Message]) -> Vec<chat::Message> {
    messages
        .iter()
        .map(|msg| chat::Message {
            role: match msg.role {
                Role::System => "system".to_owned(),
                Role::User => "user".to_owned(),
                Role::Assistant => "assistant".to_owned(),
            },
            content: msg.content.clone(),
        })
        .collect()
}

/// Send a chat request, record its usage, and return the assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let response = match api.create_chat(chat_arguments, url_path).await {
        Ok(response) => response,
        Err(err) => {
            log::error!(
                "agencyllm::clients::common::send_and_track(...): API error from {}: {}",
                model,
                err
            );
            return Err(Box::new(AgencyError::Transport(err.to_string())));
        }
    };

    let usage = TokenUsage {
        input_tokens: response.usage.prompt_tokens as usize,
        output_tokens: response.usage.completion_tokens as usize,
        total_tokens: response.usage.total_tokens as usize,
    };
    if let Ok(mut slot) = usage_slot.lock() {
        *slot = Some(usage);
    }

    match response.choices.first() {
        Some(choice) if !choice.message.content.trim().is_empty() => {
            Ok(choice.message.content.clone())
        }
        _ => Err(Box::new(AgencyError::EmptyResponse)),
    }
}
