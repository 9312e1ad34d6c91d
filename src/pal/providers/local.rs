//! Local provider: talks to an Ollama-compatible chat API.
//!
//! Grounded on original_source's `pal/ollama_provider.py` — same
//! `/api/chat` shape, system message pulled out of the message list into
//! a top-level `system` field, `num_predict` instead of `max_tokens`.

use crate::config::ProviderEntryConfig;
use crate::error::NovelistError;
use crate::pal::factory::Provider;
use crate::pal::types::{
    GenerationParams, GenerationResult, Message, ProviderCapabilities, Role,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub struct LocalProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl LocalProvider {
    pub fn new(config: &ProviderEntryConfig) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .expect("reqwest client");
        Self { client, base_url, model: config.model.clone() }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    #[serde(default)]
    name: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<GenerationResult, NovelistError> {
        let system = messages.iter().find(|m| m.role == Role::System).map(|m| m.content.as_str());
        let chat_messages: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ChatMessage { role: role_str(m.role), content: &m.content })
            .collect();

        let request = ChatRequest {
            model: &self.model,
            messages: chat_messages,
            stream: false,
            options: ChatOptions {
                temperature: params.temperature.unwrap_or(0.7),
                num_predict: params.max_tokens.unwrap_or(2000),
                top_p: params.top_p.unwrap_or(0.9),
            },
            system,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| NovelistError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NovelistError::Transport(format!(
                "local provider returned {}",
                response.status()
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| NovelistError::Protocol(e.to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();

        Ok(GenerationResult {
            text: body.message.content.clone(),
            prompt_tokens: (prompt_chars / 4) as u32,
            completion_tokens: (body.message.content.len() / 4) as u32,
            model: self.model.clone(),
            provider: self.provider_name().to_string(),
            duration_ms,
        })
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            ctx_len: 32768,
            supports_tools: false,
            supports_json_mode: false,
            supports_thinking_mode: true,
            supports_streaming: true,
        }
    }

    async fn healthcheck(&self) -> bool {
        let Ok(response) = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        else {
            return false;
        };
        if !response.status().is_success() {
            return false;
        }
        let Ok(tags) = response.json::<TagsResponse>().await else {
            return false;
        };
        tags.models.iter().any(|m| m.name == self.model || m.name.contains(&self.model))
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}
