//! `bible.md` parser: extracts the Style Bible and World Bible sections
//! from a loosely-structured markdown file.
//!
//! Grounded on original_source's `parsers/bible_parser.py`. The original
//! accepts both English and Japanese headers/keys; this keeps the same
//! leniency since bible.md is author-edited free text, not a schema.

use crate::error::NovelistError;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct Bible {
    pub style_rules: HashMap<String, String>,
    pub style_forbidden: Vec<String>,
    pub world_settings: HashMap<String, String>,
    pub world_glossary: HashMap<String, String>,
    pub raw_content: String,
}

impl Bible {
    /// Renders the Style Bible section for direct inclusion in a prompt.
    /// Grounded on original_source's `Bible.format_style_section` (called
    /// directly by `agents/writer.py`, not routed through the retriever).
    pub fn format_style_section(&self) -> String {
        let mut lines = vec!["## Style Bible".to_string()];
        for (key, value) in &self.style_rules {
            lines.push(format!("- {key}: {value}"));
        }
        if !self.style_forbidden.is_empty() {
            lines.push(format!("- forbidden: {}", self.style_forbidden.join(", ")));
        }
        lines.join("\n")
    }

    pub fn format_world_section(&self) -> String {
        let mut lines = vec!["## World Bible".to_string()];
        for (key, value) in &self.world_settings {
            lines.push(format!("- {key}: {value}"));
        }
        for (term, meaning) in &self.world_glossary {
            lines.push(format!("- {term}: {meaning}"));
        }
        lines.join("\n")
    }
}

struct Patterns {
    style_section: Regex,
    world_section: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        style_section: Regex::new(r"(?is)##\s*(?:Style Bible|文体規約).*?(?=##|\z)").unwrap(),
        world_section: Regex::new(r"(?is)##\s*(?:World Bible|世界観).*?(?=##|\z)").unwrap(),
    })
}

pub struct BibleParser;

impl BibleParser {
    pub fn parse(path: &Path) -> Result<Bible, NovelistError> {
        if !path.exists() {
            return Err(NovelistError::NotFound(format!("bible not found: {}", path.display())));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse_content(&content))
    }

    pub fn parse_content(content: &str) -> Bible {
        let pat = patterns();
        let mut bible = Bible { raw_content: content.to_string(), ..Default::default() };

        if let Some(m) = pat.style_section.find(content) {
            let section = m.as_str();
            for (key, label) in [("viewpoint", &["視点", "viewpoint", "一人称"][..]), ("first_person", &["一人称", "first person"])] {
                if let Some(value) = extract_value(section, label) {
                    bible.style_rules.insert(key.to_string(), value);
                }
            }
            if let Some(value) = extract_value(section, &["文末", "sentence ending", "文末詞"]) {
                bible.style_rules.insert("sentence_ending".to_string(), value);
            }
            if let Some(value) = extract_value(section, &["比喩", "metaphors", "喩え"]) {
                bible.style_rules.insert("metaphors".to_string(), value);
            }
            bible.style_forbidden = extract_list(section, &["禁則", "forbidden", "禁止"]);
        }

        if let Some(m) = pat.world_section.find(content) {
            let section = m.as_str();
            if let Some(value) = extract_value(section, &["概要", "overview", "世界名"]) {
                bible.world_settings.insert("overview".to_string(), value);
            }
            if let Some(value) = extract_value(section, &["魔法", "magic", "mana"]) {
                bible.world_settings.insert("magic_system".to_string(), value);
            }
            if let Some(value) = extract_value(section, &["技術", "technology", "技術水準"]) {
                bible.world_settings.insert("technology".to_string(), value);
            }
            bible.world_glossary = extract_table(section, r"用語集|glossary");
        }

        bible
    }
}

fn extract_value(content: &str, keys: &[&str]) -> Option<String> {
    for key in keys {
        let escaped = regex::escape(key);
        for shape in [format!(r"(?i){escaped}[：:\*\s]+([^\n]+)"), format!(r"(?i)-\s*{escaped}[：:\*\s]+([^\n]+)")] {
            if let Ok(re) = Regex::new(&shape) {
                if let Some(caps) = re.captures(content) {
                    return caps.get(1).map(|m| m.as_str().trim().to_string());
                }
            }
        }
    }
    None
}

fn extract_list(content: &str, keys: &[&str]) -> Vec<String> {
    for key in keys {
        let escaped = regex::escape(key);
        let pattern = format!(r"(?is){escaped}.*?(?=##|\z)");
        let Ok(re) = Regex::new(&pattern) else { continue };
        if let Some(m) = re.find(content) {
            let item_re = Regex::new(r"(?m)^[-\*]\s*(.+)$").unwrap();
            let items: Vec<String> =
                item_re.captures_iter(m.as_str()).map(|c| c[1].trim().to_string()).filter(|s| !s.is_empty()).collect();
            if !items.is_empty() {
                return items;
            }
        }
    }
    Vec::new()
}

fn extract_table(content: &str, header_pattern: &str) -> HashMap<String, String> {
    let pattern = format!(r"(?is){header_pattern}.*?\n\|(.+?)\|(.+?)\|\n\|[-\s|]+\n((?:\|.+\|\n?)+)");
    let Ok(re) = Regex::new(&pattern) else { return HashMap::new() };
    let Some(caps) = re.captures(content) else { return HashMap::new() };
    let rows_text = &caps[3];

    let mut result = HashMap::new();
    for row in rows_text.trim().lines() {
        let cells: Vec<&str> = row.split('|').map(|c| c.trim()).filter(|c| !c.is_empty()).collect();
        if cells.len() >= 2 {
            result.insert(cells[0].to_string(), cells[1].to_string());
        }
    }
    result
}

pub struct BibleLoader;

impl BibleLoader {
    pub fn load(project_path: &Path) -> Result<Bible, NovelistError> {
        BibleParser::parse(&project_path.join("bible.md"))
    }

    pub fn load_raw(project_path: &Path) -> Result<String, NovelistError> {
        let bible_path = project_path.join("bible.md");
        if !bible_path.exists() {
            return Err(NovelistError::NotFound(format!("bible.md not found in {}", project_path.display())));
        }
        Ok(std::fs::read_to_string(bible_path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_style_bible_fields() {
        let content = "## Style Bible\n- 一人称: 俺\n- 文末: だ・である調\n\n## World Bible\n- 概要: A fractured empire\n";
        let bible = BibleParser::parse_content(content);
        assert_eq!(bible.style_rules.get("first_person").map(|s| s.as_str()), Some("俺"));
        assert_eq!(bible.world_settings.get("overview").map(|s| s.as_str()), Some("A fractured empire"));
    }

    #[test]
    fn missing_sections_yield_empty_maps() {
        let bible = BibleParser::parse_content("# Just a title\n\nSome prose with no sections.\n");
        assert!(bible.style_rules.is_empty());
        assert!(bible.world_settings.is_empty());
    }

    #[test]
    fn extracts_glossary_table() {
        let content = "## World Bible\n\n用語集\n| Term | Meaning |\n|------|---------|\n| Mana | life force |\n";
        let bible = BibleParser::parse_content(content);
        assert_eq!(bible.world_glossary.get("Mana").map(|s| s.as_str()), Some("life force"));
    }
}
