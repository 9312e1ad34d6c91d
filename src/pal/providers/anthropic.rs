//! Anthropic provider: Messages API with system-as-top-level-field and
//! optional thinking mode.
//!
//! Grounded on original_source's `pal/anthropic_provider.py`: `x-api-key`
//! and `anthropic-version` headers, `system` pulled out of the message
//! list, text read from the first `text`-type content block.

use crate::config::{api_key_from_env, ProviderEntryConfig};
use crate::error::NovelistError;
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, GenerationResult, Message, ProviderCapabilities, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

fn pricing_per_1k(model: &str) -> (f64, f64) {
    if model.contains("opus") {
        (0.015, 0.075)
    } else if model.contains("sonnet") {
        (0.003, 0.015)
    } else {
        (0.00025, 0.00125)
    }
}

impl AnthropicProvider {
    pub fn new(config: &ProviderEntryConfig) -> Result<Self, NovelistError> {
        let env_var = config.api_key_env.clone().unwrap_or_else(|| "ANTHROPIC_API_KEY".to_string());
        let api_key = api_key_from_env(&env_var).ok_or_else(|| {
            NovelistError::Auth(format!("{env_var} not set for anthropic provider"))
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .expect("reqwest client");
        Ok(Self {
            client,
            base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[derive(Serialize)]
struct AnMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Thinking {
    #[serde(rename = "type")]
    kind: &'static str,
    budget_tokens: u32,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<AnMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<GenerationResult, NovelistError> {
        let system = messages.iter().find(|m| m.role == Role::System).map(|m| m.content.as_str());
        let an_messages: Vec<AnMessage> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| AnMessage { role: role_str(m.role), content: &m.content })
            .collect();

        let request = MessagesRequest {
            model: &self.model,
            messages: an_messages,
            max_tokens: params.max_tokens.unwrap_or(2000),
            temperature: params.temperature.unwrap_or(0.7),
            top_p: params.top_p.unwrap_or(0.9),
            system,
            thinking: params.thinking.then(|| Thinking {
                kind: "enabled",
                budget_tokens: params.thinking_budget.unwrap_or(1024),
            }),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| NovelistError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(NovelistError::Auth("invalid Anthropic API key".to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NovelistError::RateLimit("Anthropic rate limit exceeded".to_string()));
        }
        if !status.is_success() {
            return Err(NovelistError::Transport(format!("Anthropic API error: {status}")));
        }

        let body: MessagesResponse = response.json().await.map_err(|e| NovelistError::Protocol(e.to_string()))?;
        let text = body
            .content
            .into_iter()
            .find(|b| b.kind == "text")
            .map(|b| b.text)
            .ok_or_else(|| NovelistError::Protocol("no text content block in Anthropic response".to_string()))?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();

        Ok(GenerationResult {
            text: text.clone(),
            prompt_tokens: (prompt_chars / 4) as u32,
            completion_tokens: (text.len() / 4) as u32,
            model: self.model.clone(),
            provider: self.provider_name().to_string(),
            duration_ms,
        })
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            ctx_len: 200_000,
            supports_tools: true,
            supports_json_mode: false,
            supports_thinking_mode: true,
            supports_streaming: true,
        }
    }

    async fn healthcheck(&self) -> bool {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&MessagesRequest {
                model: &self.model,
                messages: vec![AnMessage { role: "user", content: "ping" }],
                max_tokens: 1,
                temperature: 0.0,
                top_p: 1.0,
                system: None,
                thinking: None,
            })
            .timeout(Duration::from_secs(10))
            .send()
            .await;
        match response {
            Ok(r) => {
                let status = r.status();
                status.is_success() || status == reqwest::StatusCode::NOT_FOUND
            }
            Err(_) => false,
        }
    }

    fn price_estimate(&self, input_tokens: u32, output_tokens: u32) -> Option<f64> {
        let (input_price, output_price) = pricing_per_1k(&self.model);
        let cost = (input_tokens as f64 / 1000.0) * input_price + (output_tokens as f64 / 1000.0) * output_price;
        Some((cost * 10_000.0).round() / 10_000.0)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &'static str {
        "anthropic"
    }
}
