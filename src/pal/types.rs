//! Shared wire types for the Provider Abstraction Layer.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Per-call generation overrides. `None` fields fall back to provider defaults.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub json_mode: bool,
    pub thinking: bool,
    pub thinking_budget: Option<u32>,
}

impl GenerationParams {
    pub fn with_temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }
    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }
}

/// Capabilities a provider reports to the router.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    pub ctx_len: u32,
    pub supports_tools: bool,
    pub supports_json_mode: bool,
    pub supports_thinking_mode: bool,
    pub supports_streaming: bool,
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            ctx_len: 4096,
            supports_tools: false,
            supports_json_mode: false,
            supports_thinking_mode: false,
            supports_streaming: true,
        }
    }
}

/// Required capability a caller of `route_by_capability` can demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredCapability {
    JsonMode,
    Tools,
    Thinking,
}

/// Outcome of a single generation call, ready for cost/usage logging.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub model: String,
    pub provider: String,
    pub duration_ms: u64,
}
