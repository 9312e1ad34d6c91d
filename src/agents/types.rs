//! Shared agent data shapes.
//!
//! `core/models.py` (the pydantic module these would have come from in
//! original_source) was not present in the retrieval pack, so `SceneSpec`
//! is reconstructed from its usage sites in `agents/director.py` and
//! `pipeline/swarm.py` rather than a single authoritative schema —
//! everything nested is optional and defaulted so a partially-formed
//! LLM response still parses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SceneMeta {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub chapter: Option<u32>,
    #[serde(default)]
    pub sequence_in_chapter: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NarrativeSpec {
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_events: Vec<String>,
    #[serde(default)]
    pub revelations: Vec<String>,
    #[serde(default)]
    pub hooks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConstraintsSpec {
    #[serde(default)]
    pub pov_character: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub characters_present: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContinuitySpec {
    #[serde(default)]
    pub facts_to_reinforce: Vec<String>,
    #[serde(default)]
    pub foreshadowing_to_resolve: Vec<String>,
    #[serde(default)]
    pub foreshadowing_to_plant: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StyleSpec {
    #[serde(default)]
    pub pacing: Option<String>,
    #[serde(default)]
    pub dialogue_ratio: Option<String>,
}

/// The Director's scene design document, handed to the Writer.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SceneSpec {
    #[serde(default)]
    pub scene: SceneMeta,
    #[serde(default)]
    pub narrative: NarrativeSpec,
    #[serde(default)]
    pub constraints: ConstraintsSpec,
    #[serde(default)]
    pub continuity: ContinuitySpec,
    #[serde(default)]
    pub style: StyleSpec,
}

impl SceneSpec {
    /// Flattens the spec into the plain-text description the Writer's
    /// prompt actually consumes.
    pub fn to_description(&self) -> String {
        let mut parts = Vec::new();
        if let Some(objective) = &self.narrative.objective {
            parts.push(format!("目的: {objective}"));
        }
        if let Some(summary) = &self.narrative.summary {
            parts.push(format!("概要: {summary}"));
        }
        if !self.narrative.key_events.is_empty() {
            parts.push(format!("必須: {}", self.narrative.key_events.join(", ")));
        }
        if let Some(mood) = &self.constraints.mood {
            parts.push(format!("雰囲気: {mood}"));
        }
        parts.join("\n")
    }
}

/// A detected continuity or style problem. Severity drives whether the
/// Editor attempts a revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub category: String,
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
}

impl Issue {
    pub fn is_actionable(&self) -> bool {
        matches!(self.severity.as_str(), "error" | "warning")
    }
}

/// What the Committer changed in memory after a scene landed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommitReport {
    pub chapter: u32,
    pub scene: u32,
    pub episodic_updated: bool,
    pub facts_added: Vec<String>,
    pub foreshadowing_resolved: Vec<String>,
    pub foreshadowing_planted: Vec<String>,
}
