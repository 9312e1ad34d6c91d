//! Project scaffolding and chapter file I/O.
//!
//! Grounded on original_source's `core/project.py`. The original copies
//! template files from a `templates/` directory shipped alongside the
//! package; since this pack carries no templates, the defaults are
//! inlined here instead.

use crate::config::ConfigManager;
use crate::error::NovelistError;
use std::path::{Path, PathBuf};

const REQUIRED_DIRS: &[&str] = &["characters", "chapters", "memory", "runs"];
const REQUIRED_FILES: &[&str] = &["bible.md", "memory/episodic.md", "memory/facts.json", "memory/foreshadow.json"];

const DEFAULT_BIBLE: &str = "## Style Bible\n\n- viewpoint: 一人称\n- 文末: だ・である調\n- 比喩: 控えめに\n\n禁則事項:\n- なし\n\n## World Bible\n\n- 概要: \n- 魔法: \n- 技術: \n";

pub struct ProjectManager;

impl ProjectManager {
    /// Scaffold a new project. Errors if the directory exists and is non-empty.
    pub fn create(project_path: &Path, project_name: Option<&str>) -> Result<PathBuf, NovelistError> {
        if project_path.exists() {
            let non_empty = std::fs::read_dir(project_path)?.next().is_some();
            if non_empty {
                return Err(NovelistError::Config(format!("directory not empty: {}", project_path.display())));
            }
        }
        std::fs::create_dir_all(project_path)?;

        let name = project_name
            .map(|n| n.to_string())
            .unwrap_or_else(|| project_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default());

        for dir in REQUIRED_DIRS {
            std::fs::create_dir_all(project_path.join(dir))?;
        }

        ConfigManager::create_default(project_path, &name)?;

        std::fs::write(project_path.join("bible.md"), DEFAULT_BIBLE)?;
        std::fs::write(
            project_path.join("memory/facts.json"),
            r#"{"_meta": {"description": "Immutable Facts - SSOT", "count": 0}, "facts": []}"#,
        )?;
        std::fs::write(
            project_path.join("memory/foreshadow.json"),
            r#"{"_meta": {"description": "Foreshadowing Tracker - SSOT", "total": 0, "unresolved": 0, "resolved": 0, "abandoned": 0}, "foreshadowings": []}"#,
        )?;
        std::fs::write(
            project_path.join("memory/episodic.md"),
            format!("# Episodic Memory\n\nProject: {name}\n\n## Recent Scenes\n\n"),
        )?;

        Ok(project_path.to_path_buf())
    }

    /// Checks required directories/files/config exist. Returns the list of
    /// missing paths; an empty list means the project is valid.
    pub fn validate(project_path: &Path) -> Vec<String> {
        let mut issues = Vec::new();
        for dir in REQUIRED_DIRS {
            if !project_path.join(dir).is_dir() {
                issues.push(format!("Missing directory: {dir}"));
            }
        }
        for file in REQUIRED_FILES {
            if !project_path.join(file).is_file() {
                issues.push(format!("Missing file: {file}"));
            }
        }
        if !project_path.join("config.yaml").is_file() {
            issues.push("Missing config.yaml".to_string());
        }
        issues
    }

    pub fn is_project_directory(project_path: &Path) -> bool {
        Self::validate(project_path).is_empty()
    }
}

pub struct ChapterManager;

impl ChapterManager {
    pub fn chapter_path(project_path: &Path, chapter_number: u32) -> PathBuf {
        project_path.join("chapters").join(format!("chapter_{chapter_number:03}.md"))
    }

    pub fn chapter_exists(project_path: &Path, chapter_number: u32) -> bool {
        Self::chapter_path(project_path, chapter_number).exists()
    }

    /// Overwrites the chapter file with `content`. Per the pipeline's
    /// ordering guarantees this is always the last write of a successful
    /// scene commit.
    pub fn save_chapter(project_path: &Path, chapter_number: u32, content: &str) -> Result<(), NovelistError> {
        let path = Self::chapter_path(project_path, chapter_number);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn load_chapter(project_path: &Path, chapter_number: u32) -> Result<String, NovelistError> {
        let path = Self::chapter_path(project_path, chapter_number);
        std::fs::read_to_string(&path)
            .map_err(|_| NovelistError::NotFound(format!("chapter {chapter_number} not found")))
    }

    pub fn list_chapters(project_path: &Path) -> Vec<u32> {
        let dir = project_path.join("chapters");
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut chapters: Vec<u32> = entries
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let stem = e.path().file_stem()?.to_string_lossy().to_string();
                stem.strip_prefix("chapter_")?.parse::<u32>().ok()
            })
            .collect();
        chapters.sort_unstable();
        chapters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_scaffolds_required_structure() {
        let dir = tempdir().unwrap();
        let project_path = dir.path().join("demo");
        ProjectManager::create(&project_path, Some("Demo")).unwrap();
        assert!(ProjectManager::is_project_directory(&project_path));
    }

    #[test]
    fn create_refuses_non_empty_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("existing.txt"), "hi").unwrap();
        let err = ProjectManager::create(dir.path(), None).unwrap_err();
        assert!(matches!(err, NovelistError::Config(_)));
    }

    #[test]
    fn validate_reports_missing_pieces_on_empty_dir() {
        let dir = tempdir().unwrap();
        let issues = ProjectManager::validate(dir.path());
        assert!(!issues.is_empty());
    }

    #[test]
    fn chapter_round_trips_and_overwrites() {
        let dir = tempdir().unwrap();
        ChapterManager::save_chapter(dir.path(), 1, "first draft").unwrap();
        assert_eq!(ChapterManager::load_chapter(dir.path(), 1).unwrap(), "first draft");
        ChapterManager::save_chapter(dir.path(), 1, "final text").unwrap();
        assert_eq!(ChapterManager::load_chapter(dir.path(), 1).unwrap(), "final text");
    }

    #[test]
    fn list_chapters_sorted_numerically() {
        let dir = tempdir().unwrap();
        ChapterManager::save_chapter(dir.path(), 3, "c3").unwrap();
        ChapterManager::save_chapter(dir.path(), 1, "c1").unwrap();
        assert_eq!(ChapterManager::list_chapters(dir.path()), vec![1, 3]);
    }
}
