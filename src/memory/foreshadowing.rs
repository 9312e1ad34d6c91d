//! Foreshadowing tracker: a small finite-state machine per planted hook
//! (unresolved -> resolved | abandoned, both terminal).
//!
//! Grounded on original_source's `memory/foreshadowing.py`.

use crate::error::NovelistError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForeshadowingStatus {
    Unresolved,
    Resolved,
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Foreshadowing {
    pub id: String,
    pub content: String,
    pub status: ForeshadowingStatus,
    pub created_in: String,
    #[serde(default)]
    pub target_resolution: Option<String>,
    #[serde(default)]
    pub related_chapters: Vec<String>,
    #[serde(default)]
    pub resolution_chapter: Option<String>,
    #[serde(default)]
    pub resolution_note: Option<String>,
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct ForeshadowingMeta {
    description: String,
    total: usize,
    unresolved: usize,
    resolved: usize,
    abandoned: usize,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct ForeshadowingFile {
    #[serde(rename = "_meta", default)]
    meta: ForeshadowingMeta,
    #[serde(default)]
    foreshadowings: Vec<Foreshadowing>,
}

pub struct ForeshadowingManager {
    file_path: PathBuf,
}

impl ForeshadowingManager {
    pub fn new(project_path: &Path) -> Self {
        Self { file_path: project_path.join("memory").join("foreshadow.json") }
    }

    pub fn load(&self) -> Vec<Foreshadowing> {
        let Ok(raw) = std::fs::read_to_string(&self.file_path) else {
            return Vec::new();
        };
        serde_json::from_str::<ForeshadowingFile>(&raw).map(|f| f.foreshadowings).unwrap_or_default()
    }

    pub fn save(&self, entries: &[Foreshadowing]) -> Result<(), NovelistError> {
        let meta = ForeshadowingMeta {
            description: "Foreshadowing Tracker - SSOT".to_string(),
            total: entries.len(),
            unresolved: entries.iter().filter(|f| f.status == ForeshadowingStatus::Unresolved).count(),
            resolved: entries.iter().filter(|f| f.status == ForeshadowingStatus::Resolved).count(),
            abandoned: entries.iter().filter(|f| f.status == ForeshadowingStatus::Abandoned).count(),
        };
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = ForeshadowingFile { meta, foreshadowings: entries.to_vec() };
        std::fs::write(&self.file_path, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    pub fn plant(
        &self,
        content: &str,
        chapter: &str,
        target_chapter: Option<String>,
        priority: Priority,
        tags: Vec<String>,
    ) -> Result<String, NovelistError> {
        let mut entries = self.load();
        let id = format!("fs{:03}", entries.len() + 1);
        entries.push(Foreshadowing {
            id: id.clone(),
            content: content.to_string(),
            status: ForeshadowingStatus::Unresolved,
            created_in: chapter.to_string(),
            target_resolution: target_chapter,
            related_chapters: vec![chapter.to_string()],
            resolution_chapter: None,
            resolution_note: None,
            priority,
            tags,
        });
        self.save(&entries)?;
        Ok(id)
    }

    pub fn resolve(&self, id: &str, chapter: &str, note: Option<String>) -> Result<(), NovelistError> {
        let mut entries = self.load();
        if let Some(fs) = entries.iter_mut().find(|f| f.id == id) {
            fs.status = ForeshadowingStatus::Resolved;
            fs.resolution_chapter = Some(chapter.to_string());
            fs.resolution_note = Some(note.unwrap_or_default());
            if !fs.related_chapters.iter().any(|c| c == chapter) {
                fs.related_chapters.push(chapter.to_string());
            }
        }
        self.save(&entries)
    }

    pub fn abandon(&self, id: &str, chapter: &str, reason: Option<String>) -> Result<(), NovelistError> {
        let mut entries = self.load();
        if let Some(fs) = entries.iter_mut().find(|f| f.id == id) {
            fs.status = ForeshadowingStatus::Abandoned;
            fs.resolution_chapter = Some(chapter.to_string());
            fs.resolution_note = Some(reason.unwrap_or_else(|| "Abandoned".to_string()));
        }
        self.save(&entries)
    }

    pub fn get_unresolved(&self, priority: Option<Priority>) -> Vec<Foreshadowing> {
        let mut unresolved: Vec<Foreshadowing> = self
            .load()
            .into_iter()
            .filter(|f| f.status == ForeshadowingStatus::Unresolved)
            .filter(|f| priority.map(|p| f.priority == p).unwrap_or(true))
            .collect();
        unresolved.sort_by_key(|f| f.priority);
        unresolved
    }

    pub fn get_for_context(&self, max_items: usize) -> String {
        let entries = self.load();
        if entries.is_empty() {
            return String::new();
        }

        let mut lines = vec!["## Foreshadowing".to_string(), String::new()];

        let unresolved: Vec<&Foreshadowing> = entries
            .iter()
            .filter(|f| f.status == ForeshadowingStatus::Unresolved)
            .take(max_items)
            .collect();
        if !unresolved.is_empty() {
            lines.push("### Unresolved".to_string());
            for fs in unresolved {
                lines.push(format!("- [{}] {} (priority: {:?})", fs.id, fs.content, fs.priority));
            }
            lines.push(String::new());
        }

        let resolved: Vec<&Foreshadowing> =
            entries.iter().filter(|f| f.status == ForeshadowingStatus::Resolved).collect();
        let recently_resolved = resolved.iter().rev().take(3).rev();
        let mut any_resolved = false;
        let mut resolved_lines = Vec::new();
        for fs in recently_resolved {
            any_resolved = true;
            resolved_lines.push(format!(
                "- [{}] {} -> {}",
                fs.id,
                fs.content,
                fs.resolution_chapter.clone().unwrap_or_default()
            ));
        }
        if any_resolved {
            lines.push("### Recently Resolved".to_string());
            lines.extend(resolved_lines);
            lines.push(String::new());
        }

        lines.join("\n")
    }

    /// Hooks that should be resolved in `chapter`: either targeted there
    /// explicitly, or high-priority and overdue (touched 3+ chapters).
    pub fn suggest_resolutions(&self, chapter: &str) -> Vec<Foreshadowing> {
        self.load()
            .into_iter()
            .filter(|fs| fs.status == ForeshadowingStatus::Unresolved)
            .filter(|fs| {
                fs.target_resolution.as_deref() == Some(chapter)
                    || (fs.related_chapters.len() >= 3 && fs.priority == Priority::High)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolve_is_idempotent_and_terminal() {
        let dir = tempdir().unwrap();
        let manager = ForeshadowingManager::new(dir.path());
        let id = manager.plant("a locked door", "ch1", None, Priority::Medium, vec![]).unwrap();
        manager.resolve(&id, "ch5", Some("opened".to_string())).unwrap();
        manager.resolve(&id, "ch6", Some("opened again".to_string())).unwrap();

        let entries = manager.load();
        let fs = entries.iter().find(|f| f.id == id).unwrap();
        assert_eq!(fs.status, ForeshadowingStatus::Resolved);
        assert_eq!(fs.resolution_chapter, Some("ch6".to_string()));
    }

    #[test]
    fn plant_is_not_idempotent() {
        let dir = tempdir().unwrap();
        let manager = ForeshadowingManager::new(dir.path());
        manager.plant("a prophecy", "ch1", None, Priority::High, vec![]).unwrap();
        manager.plant("a prophecy", "ch1", None, Priority::High, vec![]).unwrap();
        assert_eq!(manager.load().len(), 2);
    }

    #[test]
    fn unresolved_sorted_by_priority() {
        let dir = tempdir().unwrap();
        let manager = ForeshadowingManager::new(dir.path());
        manager.plant("low one", "ch1", None, Priority::Low, vec![]).unwrap();
        manager.plant("high one", "ch1", None, Priority::High, vec![]).unwrap();
        let unresolved = manager.get_unresolved(None);
        assert_eq!(unresolved[0].priority, Priority::High);
    }

    #[test]
    fn suggest_resolutions_matches_target_chapter() {
        let dir = tempdir().unwrap();
        let manager = ForeshadowingManager::new(dir.path());
        manager.plant("a sword", "ch1", Some("ch3".to_string()), Priority::Medium, vec![]).unwrap();
        let suggestions = manager.suggest_resolutions("ch3");
        assert_eq!(suggestions.len(), 1);
    }

    #[test]
    fn abandoned_is_terminal() {
        let dir = tempdir().unwrap();
        let manager = ForeshadowingManager::new(dir.path());
        let id = manager.plant("a red herring", "ch1", None, Priority::Low, vec![]).unwrap();
        manager.abandon(&id, "ch2", None).unwrap();
        let entries = manager.load();
        let fs = entries.iter().find(|f| f.id == id).unwrap();
        assert_eq!(fs.status, ForeshadowingStatus::Abandoned);
        assert_eq!(fs.resolution_note, Some("Abandoned".to_string()));
    }
}
