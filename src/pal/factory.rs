//! The `Provider` trait and the process-wide factory that builds one from
//! a `config.yaml` provider entry.
//!
//! original_source's `ProviderFactory` is a mutable name→class registry
//! populated by import side effects. This crate has a small, closed set
//! of provider kinds known at compile time, so the factory is a plain
//! match over `provider_type` instead of a runtime registration table.

use crate::config::ProviderEntryConfig;
use crate::error::NovelistError;
use crate::pal::providers::{anthropic::AnthropicProvider, local::LocalProvider, openai::OpenAiProvider};
use crate::pal::types::{GenerationParams, GenerationResult, Message, ProviderCapabilities};
use async_trait::async_trait;

/// A backend capable of turning a message list into prose.
///
/// Implementors wrap a specific wire protocol (Ollama-style local HTTP,
/// OpenAI chat completions, Anthropic messages). Agents never talk HTTP
/// directly — they hold a `Box<dyn Provider>` obtained through the router.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        params: &GenerationParams,
    ) -> Result<GenerationResult, NovelistError>;

    fn capabilities(&self) -> ProviderCapabilities;

    async fn healthcheck(&self) -> bool;

    /// Estimated USD cost, or `None` for providers with no per-token price
    /// (local models).
    fn price_estimate(&self, _input_tokens: u32, _output_tokens: u32) -> Option<f64> {
        None
    }

    fn model(&self) -> &str;

    fn provider_name(&self) -> &'static str;
}

/// Construct a `Provider` from a config entry. The only point in the
/// crate that knows the closed set of provider kinds.
pub fn create_provider(config: &ProviderEntryConfig) -> Result<Box<dyn Provider>, NovelistError> {
    match config.provider_type.as_str() {
        "local" | "ollama" => Ok(Box::new(LocalProvider::new(config))),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        "anthropic" => Ok(Box::new(AnthropicProvider::new(config)?)),
        other => Err(NovelistError::Config(format!(
            "unknown provider type: {other}"
        ))),
    }
}
