//! Session: the working context threading through one generation run —
//! current chapter/scene, rolling recap, session-scoped key facts, and
//! the append-only turn log.
//!
//! Grounded on original_source's `session/manager.py`. One behavioral
//! change from the original: `Session::add_fact` here delegates to the
//! project's `FactsManager` (giving it a real `f00N` id and a place in
//! `facts.json`) instead of only appending to the session's in-memory
//! `key_facts` list, which is the divergence this project's Open
//! Questions deliberately resolved away from the original.

use crate::error::NovelistError;
use crate::memory::FactsManager;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "default_chapter")]
    pub current_chapter: u32,
    #[serde(default = "default_scene")]
    pub current_scene: u32,
    #[serde(default)]
    pub active_characters: Vec<String>,
    #[serde(default)]
    pub episode_summary: String,
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub active_foreshadowing: Vec<String>,
}

fn default_chapter() -> u32 {
    1
}
fn default_scene() -> u32 {
    1
}

impl SessionContext {
    fn new(session_id: String) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            current_chapter: 1,
            current_scene: 1,
            active_characters: Vec::new(),
            episode_summary: String::new(),
            key_facts: Vec::new(),
            active_foreshadowing: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurn {
    pub agent: String,
    pub operation: String,
    #[serde(default)]
    pub input_summary: String,
    #[serde(default)]
    pub output_summary: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

const EPISODE_SUMMARY_MAX_LEN: usize = 1000;

/// A working session for one novel-generation run.
pub struct Session {
    project_path: PathBuf,
    runs_dir: PathBuf,
    context: SessionContext,
    facts: FactsManager,
}

impl Session {
    pub fn new(project_path: &Path, max_facts: usize) -> Result<Self, NovelistError> {
        let session_id = Uuid::new_v4().to_string()[..8].to_string();
        Self::with_id(project_path, session_id, max_facts)
    }

    pub fn load_or_create(project_path: &Path, session_id: &str, max_facts: usize) -> Result<Self, NovelistError> {
        let session_file = project_path.join(".sessions").join(format!("{session_id}.json"));
        let context = if session_file.exists() {
            let raw = std::fs::read_to_string(&session_file)?;
            serde_json::from_str(&raw)?
        } else {
            SessionContext::new(session_id.to_string())
        };

        let runs_dir = project_path.join("runs");
        std::fs::create_dir_all(&runs_dir)?;

        Ok(Self { project_path: project_path.to_path_buf(), runs_dir, context, facts: FactsManager::new(project_path, max_facts) })
    }

    fn with_id(project_path: &Path, session_id: String, max_facts: usize) -> Result<Self, NovelistError> {
        let runs_dir = project_path.join("runs");
        std::fs::create_dir_all(&runs_dir)?;
        Ok(Self {
            project_path: project_path.to_path_buf(),
            runs_dir,
            context: SessionContext::new(session_id),
            facts: FactsManager::new(project_path, max_facts),
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn save(&self) -> Result<(), NovelistError> {
        let sessions_dir = self.project_path.join(".sessions");
        std::fs::create_dir_all(&sessions_dir)?;
        let session_file = sessions_dir.join(format!("{}.json", self.context.session_id));
        std::fs::write(session_file, serde_json::to_string_pretty(&self.context)?)?;
        Ok(())
    }

    pub fn log_turn(&self, turn: &AgentTurn) -> Result<(), NovelistError> {
        let run_file = self.runs_dir.join(format!("session_{}.jsonl", self.context.session_id));
        let mut line = serde_json::to_string(turn)?;
        line.push('\n');
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(run_file)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Concatenates new content onto the rolling recap, trimmed to the
    /// last `EPISODE_SUMMARY_MAX_LEN` bytes.
    pub fn update_episode_summary(&mut self, new_content: &str) -> Result<(), NovelistError> {
        let truncated: String = new_content.chars().take(500).collect();
        self.context.episode_summary.push_str(&format!("\n\n[Scene {}]\n{}", self.context.current_scene, truncated));
        if self.context.episode_summary.len() > EPISODE_SUMMARY_MAX_LEN {
            let start = self.context.episode_summary.len() - EPISODE_SUMMARY_MAX_LEN;
            let mut cut = start;
            while cut < self.context.episode_summary.len() && !self.context.episode_summary.is_char_boundary(cut) {
                cut += 1;
            }
            self.context.episode_summary = self.context.episode_summary[cut..].to_string();
        }
        self.save()
    }

    /// Adds a fact to the session's own running list AND persists it
    /// through `FactsManager`, so it survives into `facts.json` rather
    /// than living only in session state.
    pub fn add_fact(&mut self, content: &str, source: &str) -> Result<String, NovelistError> {
        let id = self.facts.add_fact(content, source, "variable", vec![])?;
        self.context.key_facts.push(content.to_string());
        self.save()?;
        Ok(id)
    }

    pub fn increment_scene(&mut self) -> Result<(), NovelistError> {
        self.context.current_scene += 1;
        self.save()
    }

    pub fn advance_chapter(&mut self) -> Result<(), NovelistError> {
        self.context.current_chapter += 1;
        self.context.current_scene = 1;
        self.save()
    }
}

pub struct SessionManager;

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub chapter: u32,
    pub scene: u32,
}

impl SessionManager {
    pub fn list_sessions(project_path: &Path) -> Vec<SessionSummary> {
        let sessions_dir = project_path.join(".sessions");
        let Ok(entries) = std::fs::read_dir(&sessions_dir) else {
            return Vec::new();
        };

        let mut sessions: Vec<SessionSummary> = entries
            .flatten()
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
            .filter_map(|e| std::fs::read_to_string(e.path()).ok())
            .filter_map(|raw| serde_json::from_str::<SessionContext>(&raw).ok())
            .map(|ctx| SessionSummary { session_id: ctx.session_id, created_at: ctx.created_at, chapter: ctx.current_chapter, scene: ctx.current_scene })
            .collect();

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    pub fn delete_session(project_path: &Path, session_id: &str) -> Result<(), NovelistError> {
        let session_file = project_path.join(".sessions").join(format!("{session_id}.json"));
        if session_file.exists() {
            std::fs::remove_file(session_file)?;
        }
        let run_file = project_path.join("runs").join(format!("session_{session_id}.jsonl"));
        if run_file.exists() {
            std::fs::remove_file(run_file)?;
        }
        Ok(())
    }
}
