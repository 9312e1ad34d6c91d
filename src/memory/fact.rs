//! Append-only fact store: the narrative's immutable source of truth.
//!
//! Grounded on original_source's `memory/facts.py`: `f001`-style IDs,
//! archive-on-overflow, and a declarative-sentence extractor used by the
//! committer to seed new facts from generated prose.

use crate::error::NovelistError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub content: String,
    pub category: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct FactsMeta {
    description: String,
    count: usize,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct FactsFile {
    #[serde(rename = "_meta", default)]
    meta: FactsMeta,
    #[serde(default)]
    facts: Vec<Fact>,
}

pub struct FactsManager {
    facts_file: PathBuf,
    archive_file: PathBuf,
    max_facts: usize,
}

impl FactsManager {
    pub fn new(project_path: &Path, max_facts: usize) -> Self {
        Self {
            facts_file: project_path.join("memory").join("facts.json"),
            archive_file: project_path.join("memory").join("facts_archive.json"),
            max_facts,
        }
    }

    pub fn load(&self) -> Vec<Fact> {
        let Ok(raw) = std::fs::read_to_string(&self.facts_file) else {
            return Vec::new();
        };
        serde_json::from_str::<FactsFile>(&raw).map(|f| f.facts).unwrap_or_default()
    }

    pub fn save(&self, facts: &[Fact]) -> Result<(), NovelistError> {
        let data = FactsFile {
            meta: FactsMeta { description: "Immutable Facts - SSOT".to_string(), count: facts.len() },
            facts: facts.to_vec(),
        };
        if let Some(parent) = self.facts_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.facts_file, json)?;
        Ok(())
    }

    /// Append a new fact, archiving the oldest ones past `max_facts`.
    /// Returns the generated `f001`-style ID.
    pub fn add_fact(
        &self,
        content: &str,
        source: &str,
        category: &str,
        tags: Vec<String>,
    ) -> Result<String, NovelistError> {
        let mut facts = self.load();
        let fact_id = format!("f{:03}", facts.len() + 1);

        facts.push(Fact {
            id: fact_id.clone(),
            content: content.to_string(),
            category: category.to_string(),
            source: source.to_string(),
            created_at: Utc::now(),
            tags,
        });

        if facts.len() > self.max_facts {
            let overflow = facts.len() - self.max_facts;
            let archived: Vec<Fact> = facts.drain(0..overflow).collect();
            self.archive_facts(&archived)?;
        }

        self.save(&facts)?;
        Ok(fact_id)
    }

    fn archive_facts(&self, facts: &[Fact]) -> Result<(), NovelistError> {
        let mut existing: Vec<Fact> = std::fs::read_to_string(&self.archive_file)
            .ok()
            .and_then(|raw| serde_json::from_str::<FactsFile>(&raw).ok())
            .map(|f| f.facts)
            .unwrap_or_default();
        existing.extend(facts.iter().cloned());

        if let Some(parent) = self.archive_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = FactsFile { meta: FactsMeta::default(), facts: existing };
        std::fs::write(&self.archive_file, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    /// Facts formatted for prompt inclusion, truncated to `max_chars`.
    pub fn get_facts_for_context(&self, max_chars: usize) -> String {
        let facts = self.load();
        let mut lines = vec!["## Facts".to_string(), String::new()];
        let mut current_len: usize = lines.iter().map(|l| l.len() + 1).sum();

        for fact in &facts {
            let line = format!("- {}", fact.content);
            if current_len + line.len() > max_chars {
                lines.push("...".to_string());
                break;
            }
            current_len += line.len() + 1;
            lines.push(line);
        }

        lines.join("\n")
    }

    pub fn search_facts(&self, query: &str) -> Vec<Fact> {
        let query_lower = query.to_lowercase();
        self.load()
            .into_iter()
            .filter(|f| {
                f.content.to_lowercase().contains(&query_lower)
                    || f.tags.iter().any(|t| t.to_lowercase().contains(&query_lower))
            })
            .collect()
    }

    /// Extract up to 5 candidate facts per call from declarative sentences.
    pub fn extract_facts_from_text(text: &str) -> Vec<String> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| {
            Regex::new(r"([^。]+?)(?:は|が)([^。]+?)(?:である|だった|で|に|を)").unwrap()
        });

        let mut extracted = Vec::new();
        for caps in re.captures_iter(text) {
            let subject = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let predicate = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let fact = format!("{subject}は{predicate}");
            let char_len = fact.chars().count();
            if char_len > 10 && char_len < 100 && !fact.contains('「') {
                extracted.push(fact);
            }
            if extracted.len() >= 5 {
                break;
            }
        }
        extracted
    }
}
