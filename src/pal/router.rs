//! Provider routing and cost tracking.
//!
//! Grounded on original_source's `pal/router.py`: `ProviderRouter` caches
//! one constructed provider per agent role, `CostTracker` is an in-memory
//! usage log aggregated by agent and provider.

use crate::config::{ConfigManager, ProjectConfig};
use crate::error::NovelistError;
use crate::pal::factory::{create_provider, Provider};
use crate::pal::types::{GenerationResult, ProviderCapabilities, RequiredCapability};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Routes agent names to providers, constructing and caching one
/// `Box<dyn Provider>` per distinct provider name referenced by the
/// project's routing table.
pub struct ProviderRouter {
    config: ProjectConfig,
    cache: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRouter {
    pub fn new(config: ProjectConfig) -> Self {
        Self { config, cache: RwLock::new(HashMap::new()) }
    }

    fn provider_name_for(&self, agent_name: &str) -> &str {
        self.config.provider.routing.get(agent_name).unwrap_or(&self.config.provider.default)
    }

    fn get_or_build(&self, provider_name: &str) -> Result<Arc<dyn Provider>, NovelistError> {
        if let Some(provider) = self.cache.read().unwrap().get(provider_name) {
            return Ok(Arc::clone(provider));
        }
        let entry = self.config.provider.available.get(provider_name).ok_or_else(|| {
            NovelistError::Config(format!("provider '{provider_name}' not in config.yaml"))
        })?;
        let provider: Arc<dyn Provider> = Arc::from(create_provider(entry)?);
        self.cache.write().unwrap().insert(provider_name.to_string(), Arc::clone(&provider));
        Ok(provider)
    }

    /// Provider assigned to `agent_name` by the routing table, falling
    /// back to the project default.
    pub fn get_provider(&self, agent_name: &str) -> Result<Arc<dyn Provider>, NovelistError> {
        let provider_name = self.provider_name_for(agent_name).to_string();
        self.get_or_build(&provider_name)
    }

    /// First available provider whose capabilities satisfy `required`.
    pub fn route_by_capability(&self, required: RequiredCapability) -> Result<Arc<dyn Provider>, NovelistError> {
        let names: Vec<String> = self.config.provider.available.keys().cloned().collect();
        for name in names {
            let provider = self.get_or_build(&name)?;
            if capability_satisfied(&provider.capabilities(), required) {
                return Ok(provider);
            }
        }
        Err(NovelistError::Config(format!("no provider satisfies {required:?}")))
    }

    /// Construct (and cache) every provider named in config, keyed by name.
    pub fn get_all_providers(&self) -> Result<HashMap<String, Arc<dyn Provider>>, NovelistError> {
        let names: Vec<String> = self.config.provider.available.keys().cloned().collect();
        let mut out = HashMap::new();
        for name in names {
            out.insert(name.clone(), self.get_or_build(&name)?);
        }
        Ok(out)
    }

    pub async fn healthcheck_all(&self) -> Result<HashMap<String, bool>, NovelistError> {
        let providers = self.get_all_providers()?;
        let mut out = HashMap::new();
        for (name, provider) in providers {
            out.insert(name, provider.healthcheck().await);
        }
        Ok(out)
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }
}

fn capability_satisfied(caps: &ProviderCapabilities, required: RequiredCapability) -> bool {
    match required {
        RequiredCapability::JsonMode => caps.supports_json_mode,
        RequiredCapability::Tools => caps.supports_tools,
        RequiredCapability::Thinking => caps.supports_thinking_mode,
    }
}

/// One logged generation call, ready for aggregation.
#[derive(Debug, Clone)]
pub struct UsageEntry {
    pub agent: String,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost: Option<f64>,
}

/// Per-agent/provider aggregate used for the cost summary report.
#[derive(Debug, Clone, Default)]
pub struct UsageAggregate {
    pub calls: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: f64,
}

/// In-memory usage log. original_source's equivalent is per-`Session`
/// and never persisted beyond the run log, so this mirrors that scope.
#[derive(Debug, Default)]
pub struct CostTracker {
    entries: Vec<UsageEntry>,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_usage(&mut self, agent: &str, provider: &Arc<dyn Provider>, result: &GenerationResult) {
        let cost = provider.price_estimate(result.prompt_tokens, result.completion_tokens);
        self.entries.push(UsageEntry {
            agent: agent.to_string(),
            provider: result.provider.clone(),
            model: result.model.clone(),
            prompt_tokens: result.prompt_tokens,
            completion_tokens: result.completion_tokens,
            cost,
        });
    }

    /// Aggregate by agent name, the grouping original_source's CLI report uses.
    pub fn get_summary(&self) -> HashMap<String, UsageAggregate> {
        let mut summary: HashMap<String, UsageAggregate> = HashMap::new();
        for entry in &self.entries {
            let agg = summary.entry(entry.agent.clone()).or_default();
            agg.calls += 1;
            agg.prompt_tokens += entry.prompt_tokens as u64;
            agg.completion_tokens += entry.completion_tokens as u64;
            agg.cost += entry.cost.unwrap_or(0.0);
        }
        summary
    }

    pub fn total_cost(&self) -> f64 {
        self.entries.iter().filter_map(|e| e.cost).sum()
    }

    pub fn entries(&self) -> &[UsageEntry] {
        &self.entries
    }
}
