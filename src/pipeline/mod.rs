//! Scene Pipeline: Director -> Writer -> Checker -> [Editor] -> Committer,
//! with a bounded revision loop.
//!
//! Grounded on original_source's `pipeline/swarm.py`'s `SwarmPipeline`.
//! Provider routing there works by mutating each agent's `.provider`
//! field after construction and swallowing lookup failures; here agents
//! are immutable once built, so routing happens once in `ScenePipeline::new`
//! and a missing provider is a hard construction error rather than a
//! silently-ignored one.

use crate::agents::{
    CommitReport, CommitterAgent, ContinuityCheckerAgent, DirectorAgent, Issue, SceneRequest, SceneSpec,
    StyleEditorAgent, WriterAgent,
};
use crate::config::ProjectConfig;
use crate::context::ContextAssembler;
use crate::error::NovelistError;
use crate::memory::{Bible, CharacterCard, EpisodicMemoryManager, FactsManager, ForeshadowingManager};
use crate::pal::router::{CostTracker, ProviderRouter};
use crate::project::ChapterManager;
use crate::retriever::TfIdfIndex;
use crate::session::Session;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Default)]
pub struct StageTrace {
    pub agent: String,
    pub duration_ms: u64,
    pub tokens: u32,
}

/// Full execution trace for one `generate_scene` call.
#[derive(Debug, Clone, Default)]
pub struct SceneTrace {
    pub chapter: u32,
    pub scene: u32,
    pub stages: Vec<StageTrace>,
    pub final_text: String,
    pub issues_found: usize,
    pub revision_made: bool,
    pub total_cost: f64,
    pub total_duration_ms: u64,
    pub commit: Option<CommitReport>,
}

pub struct ScenePipeline {
    project_path: PathBuf,
    enable_revision: bool,
    max_revision: u32,
    router: ProviderRouter,
    cost_tracker: Mutex<CostTracker>,
    director: DirectorAgent,
    writer: WriterAgent,
    checker: ContinuityCheckerAgent,
    editor: StyleEditorAgent,
}

impl ScenePipeline {
    pub fn new(project_path: &Path, config: ProjectConfig, enable_revision: bool) -> Result<Self, NovelistError> {
        let router = ProviderRouter::new(config.clone());

        Ok(Self {
            project_path: project_path.to_path_buf(),
            enable_revision,
            max_revision: config.swarm.max_revision,
            director: DirectorAgent::new(router.get_provider("director")?),
            writer: WriterAgent::new(router.get_provider("writer")?),
            checker: ContinuityCheckerAgent::new(router.get_provider("checker")?),
            editor: StyleEditorAgent::new(router.get_provider("editor")?),
            router,
            cost_tracker: Mutex::new(CostTracker::new()),
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn generate_scene(
        &self,
        session: &mut Session,
        bible: &Bible,
        bible_raw: &str,
        characters: &HashMap<String, CharacterCard>,
        facts: &FactsManager,
        episodic: &EpisodicMemoryManager,
        foreshadowing: &ForeshadowingManager,
        index: &TfIdfIndex,
        request: SceneRequest,
        word_count: u32,
    ) -> Result<SceneTrace, NovelistError> {
        let total_start = std::time::Instant::now();
        let chapter = request.chapter;
        let scene = request.scene_num;
        let mut trace = SceneTrace { chapter, scene, ..Default::default() };

        let budgets = self.router.config().context.budgets.clone();
        let assembler = ContextAssembler::new(&budgets, bible, characters, facts, episodic, index);
        tracing::info!(chapter, scene, "director designing scene");
        let director_result = self.director.design_scene(&assembler, &request).await?;
        self.log_usage("director", &director_result);
        trace.stages.push(StageTrace {
            agent: "director".to_string(),
            duration_ms: director_result.duration_ms,
            tokens: director_result.prompt_tokens + director_result.completion_tokens,
        });

        let extracted = DirectorAgent::extract_json(&director_result.text);
        let scenespec = DirectorAgent::parse_scenespec(&extracted).unwrap_or_default();

        let scene_desc = if scenespec.narrative.objective.is_some() || !scenespec.narrative.key_events.is_empty() {
            scenespec.to_description()
        } else {
            director_result.text.clone()
        };

        let pov = request.pov_character.clone().or_else(|| scenespec.constraints.pov_character.clone());

        tracing::info!(chapter, scene, "writer generating prose");
        let writer_result = self
            .writer
            .generate(&scene_desc, bible, characters, pov.as_deref(), word_count, 0.7)
            .await?;
        self.log_usage("writer", &writer_result);
        trace.stages.push(StageTrace {
            agent: "writer".to_string(),
            duration_ms: writer_result.duration_ms,
            tokens: writer_result.prompt_tokens + writer_result.completion_tokens,
        });

        let mut text = writer_result.text;

        let issues: Vec<Issue> = self.checker.check(&text, facts, characters, bible_raw, false).await;
        trace.issues_found = issues.len();
        tracing::info!(chapter, scene, issues = issues.len(), "continuity check complete");

        if self.enable_revision && self.max_revision > 0 {
            let actionable: Vec<Issue> = issues.into_iter().filter(Issue::is_actionable).collect();
            if !actionable.is_empty() {
                tracing::info!(chapter, scene, count = actionable.len(), "editor revising");
                text = self.editor.edit(&text, &actionable, None).await;
                trace.revision_made = true;
            }
        }

        let committer = CommitterAgent::new(episodic, facts, foreshadowing, self.router.get_provider("committer")?);
        let commit_report = committer.commit(&text, chapter, scene, Some(&scenespec), false).await?;

        ChapterManager::save_chapter(&self.project_path, chapter, &text)?;
        session.increment_scene()?;
        tracing::info!(chapter, scene, duration_ms = total_start.elapsed().as_millis() as u64, "scene committed");

        trace.final_text = text;
        trace.commit = Some(commit_report);
        trace.total_duration_ms = total_start.elapsed().as_millis() as u64;
        trace.total_cost = self.cost_tracker.lock().unwrap().total_cost();

        Ok(trace)
    }

    fn log_usage(&self, agent: &str, result: &crate::pal::types::GenerationResult) {
        if let Ok(provider) = self.router.get_provider(agent) {
            self.cost_tracker.lock().unwrap().log_usage(agent, &provider, result);
        }
    }

    pub fn cost_summary(&self) -> std::collections::HashMap<String, crate::pal::router::UsageAggregate> {
        self.cost_tracker.lock().unwrap().get_summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenespec_default_has_no_objective() {
        let spec = SceneSpec::default();
        assert!(spec.narrative.objective.is_none());
        assert!(spec.narrative.key_events.is_empty());
    }
}
