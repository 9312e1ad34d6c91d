//! OpenAI-compatible provider: chat completions with SSE streaming framing.
//!
//! Grounded on original_source's `pal/openai_provider.py`: bearer auth,
//! `data: ...` SSE lines terminated by a literal `[DONE]` sentinel, and a
//! small hardcoded per-model price table for cost estimation.

use crate::config::{api_key_from_env, ProviderEntryConfig};
use crate::error::NovelistError;
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, GenerationResult, Message, ProviderCapabilities, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

fn pricing_per_1k(model: &str) -> (f64, f64) {
    if model.contains("gpt-4-turbo") {
        (0.01, 0.03)
    } else if model.contains("gpt-4") {
        (0.03, 0.06)
    } else {
        (0.0005, 0.0015)
    }
}

impl OpenAiProvider {
    pub fn new(config: &ProviderEntryConfig) -> Result<Self, NovelistError> {
        let env_var = config.api_key_env.clone().unwrap_or_else(|| "OPENAI_API_KEY".to_string());
        let api_key = api_key_from_env(&env_var).ok_or_else(|| {
            NovelistError::Auth(format!("{env_var} not set for openai provider"))
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
struct OaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<GenerationResult, NovelistError> {
        let oa_messages: Vec<OaMessage> =
            messages.iter().map(|m| OaMessage { role: role_str(m.role), content: &m.content }).collect();

        let request = ChatRequest {
            model: &self.model,
            messages: oa_messages,
            temperature: params.temperature.unwrap_or(0.7),
            max_tokens: params.max_tokens.unwrap_or(2000),
            top_p: params.top_p.unwrap_or(0.9),
            stream: false,
            response_format: params.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NovelistError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NovelistError::Auth("invalid OpenAI API key".to_string()));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NovelistError::RateLimit("OpenAI rate limit exceeded".to_string()));
        }
        if !status.is_success() {
            return Err(NovelistError::Transport(format!("OpenAI API error: {status}")));
        }

        let body: ChatResponse = response.json().await.map_err(|e| NovelistError::Protocol(e.to_string()))?;
        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| NovelistError::Protocol("empty choices in OpenAI response".to_string()))?;

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
        let ctx_len = if self.model.contains("gpt-4-turbo") {
            128_000
        } else if self.model.contains("gpt-4") {
            8_192
        } else {
            16_385
        };
        ProviderCapabilities {
            ctx_len,
            supports_tools: true,
            supports_json_mode: true,
            supports_thinking_mode: false,
            supports_streaming: true,
        }
    }

    async fn healthcheck(&self) -> bool {
        self.client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
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
        "openai"
    }
}
