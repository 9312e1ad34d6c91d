//! Project configuration: `config.yaml` SSOT.
//!
//! Mirrors original_source's `core/config_manager.py`: a typed
//! `ProjectConfig` loaded with `serde(default)` throughout so partial
//! configs load leniently, the way the Bible parser treats absence as
//! "not yet specified" rather than a hard error.

use crate::error::NovelistError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderEntryConfig {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    120
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderSection {
    pub default: String,
    #[serde(default)]
    pub available: HashMap<String, ProviderEntryConfig>,
    #[serde(default)]
    pub routing: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBudgets {
    #[serde(default = "default_bible_budget")]
    pub bible: usize,
    #[serde(default = "default_characters_budget")]
    pub characters: usize,
    #[serde(default = "default_facts_budget")]
    pub facts: usize,
    #[serde(default = "default_recap_budget")]
    pub recap: usize,
    #[serde(default = "default_icl_budget")]
    pub icl: usize,
}

fn default_bible_budget() -> usize {
    1500
}
fn default_characters_budget() -> usize {
    1200
}
fn default_facts_budget() -> usize {
    600
}
fn default_recap_budget() -> usize {
    400
}
fn default_icl_budget() -> usize {
    600
}

impl Default for ContextBudgets {
    fn default() -> Self {
        Self {
            bible: default_bible_budget(),
            characters: default_characters_budget(),
            facts: default_facts_budget(),
            recap: default_recap_budget(),
            icl: default_icl_budget(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextSection {
    #[serde(default)]
    pub budgets: ContextBudgets,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSection {
    #[serde(default = "default_max_revision")]
    pub max_revision: u32,
    #[serde(default = "default_on_failure")]
    pub on_persistent_failure: String,
}

fn default_max_revision() -> u32 {
    1
}
fn default_on_failure() -> String {
    "ask_user".to_string()
}

impl Default for SwarmSection {
    fn default() -> Self {
        Self {
            max_revision: default_max_revision(),
            on_persistent_failure: default_on_failure(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationSection {
    #[serde(default)]
    pub default: GenerationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySection {
    #[serde(default = "default_meta_speech_rate")]
    pub meta_speech_rate_max: f32,
    #[serde(default = "default_repetition_rate")]
    pub repetition_rate_max: f32,
    #[serde(default)]
    pub fact_contradictions_max: u32,
    #[serde(default)]
    pub character_deviations_max: u32,
}

fn default_meta_speech_rate() -> f32 {
    0.01
}
fn default_repetition_rate() -> f32 {
    0.05
}

impl Default for QualitySection {
    fn default() -> Self {
        Self {
            meta_speech_rate_max: default_meta_speech_rate(),
            repetition_rate_max: default_repetition_rate(),
            fact_contradictions_max: 0,
            character_deviations_max: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_name: String,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub swarm: SwarmSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub quality: QualitySection,
}

pub struct ConfigManager;

impl ConfigManager {
    const FILE_NAME: &'static str = "config.yaml";

    pub fn load(project_path: &Path) -> Result<ProjectConfig, NovelistError> {
        let config_path = project_path.join(Self::FILE_NAME);
        if !config_path.exists() {
            return Err(NovelistError::Config(format!(
                "config not found: {}",
                config_path.display()
            )));
        }
        let raw = std::fs::read_to_string(&config_path)?;
        let config: ProjectConfig = serde_yaml_ng::from_str(&raw)?;
        Ok(config)
    }

    pub fn save(config: &ProjectConfig, project_path: &Path) -> Result<(), NovelistError> {
        let config_path = project_path.join(Self::FILE_NAME);
        let raw = serde_yaml_ng::to_string(config)?;
        std::fs::write(config_path, raw)?;
        Ok(())
    }

    pub fn create_default(project_path: &Path, project_name: &str) -> Result<(), NovelistError> {
        let mut available = HashMap::new();
        available.insert(
            "local_ollama".to_string(),
            ProviderEntryConfig {
                provider_type: "local".to_string(),
                model: "qwen3:1.7b".to_string(),
                base_url: Some("http://localhost:11434".to_string()),
                api_key_env: None,
                timeout: 120,
            },
        );

        let mut routing = HashMap::new();
        for agent in ["director", "writer", "checker", "editor", "committer"] {
            routing.insert(agent.to_string(), "local_ollama".to_string());
        }

        let config = ProjectConfig {
            project_name: project_name.to_string(),
            provider: ProviderSection {
                default: "local_ollama".to_string(),
                available,
                routing,
            },
            context: ContextSection::default(),
            swarm: SwarmSection::default(),
            generation: GenerationSection::default(),
            quality: QualitySection::default(),
        };

        std::fs::create_dir_all(project_path)?;
        Self::save(&config, project_path)
    }

    pub fn provider_config_for<'a>(
        config: &'a ProjectConfig,
        agent_name: &str,
    ) -> Option<&'a ProviderEntryConfig> {
        let provider_name = config
            .provider
            .routing
            .get(agent_name)
            .unwrap_or(&config.provider.default);
        config.provider.available.get(provider_name)
    }
}

/// Read an API key from the environment variable named in config.
/// Never accepts a hardcoded key from config.yaml itself.
pub fn api_key_from_env(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok()
}

/// Resolve the project's on-disk root the way `AppContext` resolves the
/// data path: explicit path > `NOVELIST_PROJECT_PATH` env > ./project.
pub fn resolve_project_path(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var("NOVELIST_PROJECT_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_identity() {
        let dir = tempdir().unwrap();
        ConfigManager::create_default(dir.path(), "Test Novel").unwrap();
        let loaded = ConfigManager::load(dir.path()).unwrap();
        assert_eq!(loaded.project_name, "Test Novel");
        assert_eq!(loaded.provider.default, "local_ollama");
        ConfigManager::save(&loaded, dir.path()).unwrap();
        let reloaded = ConfigManager::load(dir.path()).unwrap();
        assert_eq!(loaded.project_name, reloaded.project_name);
        assert_eq!(loaded.quality.meta_speech_rate_max, reloaded.quality.meta_speech_rate_max);
    }

    #[test]
    fn partial_config_loads_leniently() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("config.yaml"), "project_name: Minimal\n").unwrap();
        let config = ConfigManager::load(dir.path()).unwrap();
        assert_eq!(config.project_name, "Minimal");
        assert_eq!(config.context.budgets.bible, 1500);
        assert_eq!(config.swarm.max_revision, 1);
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(ConfigManager::load(dir.path()).is_err());
    }
}
