//! Rolling episodic recap: the last N scene summaries kept as markdown,
//! plus a character status table and a simple extractive summarizer.
//!
//! Grounded on original_source's `memory/episodic.py`.

use crate::error::NovelistError;
use chrono::Utc;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub struct EpisodicMemoryManager {
    file_path: PathBuf,
    max_scenes: usize,
}

impl EpisodicMemoryManager {
    pub fn new(project_path: &Path, max_scenes: usize) -> Self {
        Self { file_path: project_path.join("memory").join("episodic.md"), max_scenes }
    }

    pub fn load(&self) -> String {
        std::fs::read_to_string(&self.file_path).unwrap_or_default()
    }

    pub fn save(&self, content: &str) -> Result<(), NovelistError> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file_path, content)?;
        Ok(())
    }

    pub fn add_scene_summary(
        &self,
        chapter: u32,
        scene: u32,
        summary: &str,
        pov_character: Option<&str>,
        key_events: &[String],
    ) -> Result<(), NovelistError> {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M");
        let mut lines = vec![format!("### Scene {scene} (Chapter {chapter})"), format!("**Time**: {timestamp}")];

        if let Some(pov) = pov_character {
            lines.push(format!("**POV**: {pov}"));
        }
        if !key_events.is_empty() {
            lines.push(format!("**Events**: {}", key_events.join(", ")));
        }
        lines.push(String::new());
        lines.push(summary.to_string());
        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());

        let new_entry = lines.join("\n");
        let current = self.load();
        let updated = if current.is_empty() { new_entry } else { format!("{new_entry}\n{current}") };
        let trimmed = self.trim_scenes(&updated);
        self.save(&trimmed)
    }

    /// Keep only the most recent `max_scenes` blocks, identified by
    /// `### Scene N` headers.
    fn trim_scenes(&self, content: &str) -> String {
        static SPLIT: OnceLock<Regex> = OnceLock::new();
        let re = SPLIT.get_or_init(|| Regex::new(r"\n### Scene \d+").unwrap());

        let scenes: Vec<&str> = re.split(content).collect();
        if scenes.len() <= self.max_scenes + 1 {
            return content.to_string();
        }

        let preamble = scenes[0];
        let kept = &scenes[scenes.len() - self.max_scenes..];
        let headers: Vec<&str> = re.find_iter(content).map(|m| m.as_str()).collect();
        let kept_headers = &headers[headers.len() - self.max_scenes..];

        let mut result = preamble.to_string();
        for (header, body) in kept_headers.iter().zip(kept.iter()) {
            result.push('\n');
            result.push_str(&header[1..]);
            result.push_str(body);
        }
        result
    }

    pub fn get_recent_summary(&self, max_chars: usize) -> String {
        let content = self.load();
        let mut summary_lines = Vec::new();
        let mut in_summary = false;

        for line in content.lines() {
            if line.starts_with("### Scene") {
                in_summary = true;
                summary_lines.push(line.to_string());
            } else if in_summary && line.starts_with("---") {
                in_summary = false;
                summary_lines.push(String::new());
            } else if in_summary {
                summary_lines.push(line.to_string());
            }
        }

        let summary = summary_lines.join("\n");
        if summary.len() > max_chars {
            format!("{}...", &summary[..max_chars])
        } else {
            summary
        }
    }

    /// Upsert a row in the `## Character Status` table.
    pub fn update_character_status(&self, character: &str, status: &str, location: &str) -> Result<(), NovelistError> {
        let mut content = self.load();
        if !content.contains("## Character Status") {
            content.push_str("\n\n## Character Status\n\n");
            content.push_str("| Character | Location | Status | Updated |\n");
            content.push_str("|-----------|----------|--------|---------|\n");
        }

        let updated = Utc::now().format("%Y-%m-%d");
        let new_line = format!("| {character} | {location} | {status} | {updated} |");

        let pattern = format!(r"\| {} \|.*", regex::escape(character));
        let row_re = Regex::new(&pattern).unwrap();

        if row_re.is_match(&content) {
            content = row_re.replace(&content, new_line.as_str()).to_string();
        } else {
            let mut lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
            let mut insert_at = None;
            for (i, line) in lines.iter().enumerate() {
                if line.starts_with('|') && i > 0 && lines[i - 1].starts_with("|-") {
                    insert_at = Some(i + 1);
                }
            }
            match insert_at {
                Some(idx) if idx <= lines.len() => lines.insert(idx, new_line),
                _ => lines.push(new_line),
            }
            content = lines.join("\n");
        }

        self.save(&content)
    }
}

pub struct SimpleSummarizer;

impl SimpleSummarizer {
    /// Extractive summary: first, middle, and last sentence of the text.
    pub fn summarize(text: &str, max_sentences: usize) -> String {
        static SPLIT: OnceLock<Regex> = OnceLock::new();
        let re = SPLIT.get_or_init(|| Regex::new(r"[。！？.!?]\s*").unwrap());

        let sentences: Vec<&str> = re
            .split(text)
            .map(|s| s.trim())
            .filter(|s| s.chars().count() > 10)
            .collect();

        if sentences.is_empty() {
            return text.chars().take(200).collect();
        }

        let mut indices = vec![0usize, sentences.len() / 2, sentences.len() - 1];
        indices.sort_unstable();
        indices.dedup();

        indices
            .into_iter()
            .take(max_sentences)
            .filter_map(|i| sentences.get(i))
            .map(|s| format!("{s}。"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn keeps_at_most_max_scenes_blocks() {
        let dir = tempdir().unwrap();
        let manager = EpisodicMemoryManager::new(dir.path(), 3);
        for i in 1..=6 {
            manager.add_scene_summary(1, i, &format!("summary {i}"), None, &[]).unwrap();
        }
        let content = manager.load();
        let count = content.matches("### Scene").count();
        assert!(count <= 3, "expected at most 3 scene blocks, got {count}");
    }

    #[test]
    fn most_recent_scene_is_first() {
        let dir = tempdir().unwrap();
        let manager = EpisodicMemoryManager::new(dir.path(), 5);
        manager.add_scene_summary(1, 1, "first scene", None, &[]).unwrap();
        manager.add_scene_summary(1, 2, "second scene", None, &[]).unwrap();
        let content = manager.load();
        assert!(content.find("Scene 2").unwrap() < content.find("Scene 1").unwrap());
    }

    #[test]
    fn character_status_upserts_row() {
        let dir = tempdir().unwrap();
        let manager = EpisodicMemoryManager::new(dir.path(), 5);
        manager.update_character_status("Mira", "wounded", "the keep").unwrap();
        manager.update_character_status("Mira", "recovering", "the keep").unwrap();
        let content = manager.load();
        assert_eq!(content.matches("| Mira |").count(), 1);
        assert!(content.contains("recovering"));
    }

    #[test]
    fn summarizer_handles_empty_text() {
        assert_eq!(SimpleSummarizer::summarize("", 3), "");
    }

    #[test]
    fn summarizer_picks_first_middle_last() {
        let text = "One sentence here. Two sentence here. Three sentence here. Four sentence here.";
        let summary = SimpleSummarizer::summarize(text, 3);
        assert!(summary.contains("One sentence here"));
        assert!(summary.contains("Four sentence here"));
    }
}
