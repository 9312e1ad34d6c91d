//! Character card loading, validation, and prompt formatting.
//!
//! Grounded on original_source's `parsers/character_loader.py`. Character
//! files are author-edited JSON, so loading is permissive (one bad file
//! logs a warning and is skipped, not a hard failure) while
//! `validate_schema` enforces the fields the agents actually depend on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CharacterName {
    Plain(String),
    Structured { full: String, #[serde(default)] short: Option<String> },
}

impl CharacterName {
    pub fn full(&self) -> &str {
        match self {
            CharacterName::Plain(s) => s,
            CharacterName::Structured { full, .. } => full,
        }
    }

    pub fn short(&self) -> Option<&str> {
        match self {
            CharacterName::Plain(_) => None,
            CharacterName::Structured { short, .. } => short.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LanguageProfile {
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub first_person: String,
    #[serde(default)]
    pub speech_pattern: String,
    #[serde(default)]
    pub forbidden_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersonalityProfile {
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NarrativeProfile {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterCard {
    #[serde(default)]
    pub id: Option<String>,
    pub name: CharacterName,
    #[serde(default)]
    pub language: LanguageProfile,
    #[serde(default)]
    pub personality: PersonalityProfile,
    #[serde(default)]
    pub narrative: NarrativeProfile,
}

impl CharacterCard {
    pub fn format_for_prompt(&self) -> String {
        let mut lines = vec![format!("### {}", self.name.full())];
        if !self.language.tone.is_empty() {
            lines.push(format!("- Tone: {}", self.language.tone));
        }
        if !self.language.first_person.is_empty() {
            lines.push(format!("- First person: {}", self.language.first_person));
        }
        if !self.language.speech_pattern.is_empty() {
            lines.push(format!("- Speech pattern: {}", self.language.speech_pattern));
        }
        if !self.personality.values.is_empty() {
            lines.push(format!("- Values: {}", self.personality.values.join(", ")));
        }
        if !self.language.forbidden_words.is_empty() {
            lines.push(format!("- Forbidden words: {}", self.language.forbidden_words.join(", ")));
        }
        lines.join("\n")
    }
}

pub struct CharacterLoader;

const CHARACTERS_DIR: &str = "characters";

impl CharacterLoader {
    pub fn load(character_path: &Path) -> Result<CharacterCard, String> {
        let raw = std::fs::read_to_string(character_path).map_err(|e| e.to_string())?;
        let mut value: Value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
        if let Some(obj) = value.as_object_mut() {
            obj.remove("_meta");
        }
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    /// Load every `*.json` file under `characters/`, skipping (and
    /// warning about) any that fail to parse rather than aborting.
    pub fn load_all(project_path: &Path) -> HashMap<String, CharacterCard> {
        let dir = project_path.join(CHARACTERS_DIR);
        let mut characters = HashMap::new();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return characters;
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::load(&path) {
                Ok(card) => {
                    let id = card
                        .id
                        .clone()
                        .unwrap_or_else(|| path.file_stem().unwrap().to_string_lossy().to_string());
                    characters.insert(id, card);
                }
                Err(e) => warn!(file = %path.display(), error = %e, "failed to load character file"),
            }
        }
        characters
    }

    /// Fuzzy lookup by ID, full name, or short name.
    pub fn load_by_name(project_path: &Path, name: &str) -> Option<CharacterCard> {
        let characters = Self::load_all(project_path);
        if let Some(card) = characters.get(name) {
            return Some(card.clone());
        }

        let name_lower = name.to_lowercase();
        characters.into_values().find(|card| {
            card.name.full().to_lowercase() == name_lower
                || card.name.short().map(|s| s.to_lowercase() == name_lower).unwrap_or(false)
        })
    }

    pub fn save(character: &CharacterCard, project_path: &Path, filename: Option<&str>) -> Result<(), String> {
        let dir = project_path.join(CHARACTERS_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| e.to_string())?;
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.json", character.id.clone().unwrap_or_else(|| "character".to_string())));
        let json = serde_json::to_string_pretty(character).map_err(|e| e.to_string())?;
        std::fs::write(dir.join(filename), json).map_err(|e| e.to_string())
    }

    pub fn list_characters(project_path: &Path) -> Vec<String> {
        let mut ids: Vec<String> = Self::load_all(project_path).into_keys().collect();
        ids.sort();
        ids
    }

    /// Required fields per the Style/Character spec: `name`,
    /// `language.tone`, `language.first_person`, `language.speech_pattern`,
    /// `personality.values`, `language.forbidden_words`.
    pub fn validate_schema(character_path: &Path) -> (bool, Vec<String>) {
        let mut issues = Vec::new();
        let raw = match std::fs::read_to_string(character_path) {
            Ok(raw) => raw,
            Err(e) => return (false, vec![format!("cannot read file: {e}")]),
        };
        let data: Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => return (false, vec![format!("invalid JSON: {e}")]),
        };

        let required: &[(&str, &str)] = &[
            ("name", "Character name"),
            ("language.tone", "Speech tone"),
            ("language.first_person", "First person pronoun"),
            ("language.speech_pattern", "Speech pattern description"),
            ("personality.values", "Character values"),
            ("language.forbidden_words", "Forbidden words list"),
        ];

        for (field, description) in required {
            if !has_nested_field(&data, field) {
                issues.push(format!("Missing required field: {field} ({description})"));
            }
        }

        (issues.is_empty(), issues)
    }
}

fn has_nested_field(data: &Value, field: &str) -> bool {
    let mut current = data;
    for part in field.split('.') {
        match current.get(part) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}

pub struct CharacterFormatter;

impl CharacterFormatter {
    pub fn format_all(characters: &HashMap<String, CharacterCard>) -> String {
        if characters.is_empty() {
            return "(no characters defined)".to_string();
        }
        let mut lines = vec!["## Characters".to_string(), String::new()];
        for card in characters.values() {
            lines.push(card.format_for_prompt());
            lines.push(String::new());
        }
        lines.join("\n")
    }

    pub fn format_by_role(characters: &HashMap<String, CharacterCard>, role: &str) -> String {
        let filtered: HashMap<String, CharacterCard> = characters
            .iter()
            .filter(|(_, card)| card.narrative.role.as_deref() == Some(role))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self::format_all(&filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_json() -> &'static str {
        r#"{
            "id": "mira",
            "name": {"full": "Mira Solenne", "short": "Mira"},
            "language": {"tone": "cold", "first_person": "I", "speech_pattern": "clipped", "forbidden_words": ["like totally"]},
            "personality": {"values": ["duty", "restraint"]},
            "narrative": {"role": "protagonist"}
        }"#
    }

    #[test]
    fn loads_and_validates_a_complete_card() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mira.json");
        std::fs::write(&path, sample_json()).unwrap();

        let card = CharacterLoader::load(&path).unwrap();
        assert_eq!(card.name.full(), "Mira Solenne");
        assert_eq!(card.name.short(), Some("Mira"));

        let (valid, issues) = CharacterLoader::validate_schema(&path);
        assert!(valid, "unexpected issues: {issues:?}");
    }

    #[test]
    fn validation_flags_missing_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("incomplete.json");
        std::fs::write(&path, r#"{"name": "Bare Name"}"#).unwrap();
        let (valid, issues) = CharacterLoader::validate_schema(&path);
        assert!(!valid);
        assert!(issues.iter().any(|i| i.contains("language.tone")));
    }

    #[test]
    fn fuzzy_lookup_by_short_name() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("characters")).unwrap();
        std::fs::write(dir.path().join("characters/mira.json"), sample_json()).unwrap();
        let found = CharacterLoader::load_by_name(dir.path(), "mira");
        assert!(found.is_some());
    }

    #[test]
    fn broken_json_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("characters")).unwrap();
        std::fs::write(dir.path().join("characters/broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("characters/mira.json"), sample_json()).unwrap();
        let characters = CharacterLoader::load_all(dir.path());
        assert_eq!(characters.len(), 1);
    }
}
