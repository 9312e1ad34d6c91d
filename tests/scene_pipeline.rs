//! End-to-end coverage of the scene generation pipeline: Director ->
//! Writer -> Checker -> [Editor] -> Committer, against a real project
//! directory on disk. Only the LLM boundary (`Provider`) is mocked —
//! everything else (project scaffolding, memory files, chapter
//! persistence) runs for real against a tempdir.

use async_trait::async_trait;
use novelist::agents::{
    CommitterAgent, ContinuityCheckerAgent, DirectorAgent, SceneRequest, StyleEditorAgent, WriterAgent,
};
use novelist::config::ContextBudgets;
use novelist::context::ContextAssembler;
use novelist::error::NovelistError;
use novelist::memory::{
    BibleLoader, CharacterLoader, EpisodicMemoryManager, FactsManager, ForeshadowingManager,
    ForeshadowingStatus, Priority,
};
use novelist::pal::factory::Provider;
use novelist::pal::types::{GenerationParams, GenerationResult, Message, ProviderCapabilities};
use novelist::project::{ChapterManager, ProjectManager};
use novelist::retriever::TfIdfIndex;
use novelist::session::Session;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

/// Returns a fixed, scripted response per call, in order. Panics if
/// asked for more responses than were scripted.
struct ScriptedProvider {
    responses: Vec<String>,
    next: AtomicUsize,
}

impl ScriptedProvider {
    fn new(responses: Vec<&str>) -> Arc<dyn Provider> {
        Arc::new(Self { responses: responses.into_iter().map(String::from).collect(), next: AtomicUsize::new(0) })
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn generate(&self, _messages: &[Message], _params: &GenerationParams) -> Result<GenerationResult, NovelistError> {
        let i = self.next.fetch_add(1, Ordering::SeqCst);
        let text = self.responses.get(i).unwrap_or_else(|| panic!("scripted provider exhausted at call {i}")).clone();
        Ok(GenerationResult {
            text,
            prompt_tokens: 10,
            completion_tokens: 10,
            model: "mock".to_string(),
            provider: "mock".to_string(),
            duration_ms: 0,
        })
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    async fn healthcheck(&self) -> bool {
        true
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

const DIRECTOR_RESPONSE_E1: &str = r#"{
    "scene": {"chapter": 1, "title": "Waking"},
    "narrative": {"objective": "establish disorientation", "key_events": ["hero wakes in an unfamiliar room"]},
    "constraints": {},
    "continuity": {"foreshadowing_to_plant": ["shadow in the hallway"]},
    "style": {}
}"#;

const WRITER_RESPONSE_E1: &str = "彼は見知らぬ部屋で目を覚ました。";

#[tokio::test]
async fn e1_new_project_first_scene() {
    let dir = tempdir().unwrap();
    let project_path = dir.path().join("Demo");
    ProjectManager::create(&project_path, Some("Demo")).unwrap();

    let bible = BibleLoader::load(&project_path).unwrap();
    let bible_raw = BibleLoader::load_raw(&project_path).unwrap();
    let characters = CharacterLoader::load_all(&project_path);
    let facts = FactsManager::new(&project_path, 50);
    let episodic = EpisodicMemoryManager::new(&project_path, 5);
    let foreshadowing = ForeshadowingManager::new(&project_path);

    let mut index = TfIdfIndex::new(&project_path, "default");
    index.index_project().unwrap();
    index.build().unwrap();

    let budgets = ContextBudgets::default();
    let assembler = ContextAssembler::new(&budgets, &bible, &characters, &facts, &episodic, &index);

    let provider = ScriptedProvider::new(vec![DIRECTOR_RESPONSE_E1, WRITER_RESPONSE_E1]);

    let director = DirectorAgent::new(provider.clone());
    let request = SceneRequest {
        user_intention: "Hero wakes in unfamiliar room".to_string(),
        chapter: 1,
        scene_num: 1,
        pov_character: None,
        required_events: Vec::new(),
        mood: None,
    };
    let director_result = director.design_scene(&assembler, &request).await.unwrap();
    let extracted = DirectorAgent::extract_json(&director_result.text);
    let scenespec = DirectorAgent::parse_scenespec(&extracted).unwrap();
    assert_eq!(scenespec.continuity.foreshadowing_to_plant, vec!["shadow in the hallway".to_string()]);

    let writer = WriterAgent::new(provider.clone());
    let writer_result = writer
        .generate(&scenespec.to_description(), &bible, &characters, request.pov_character.as_deref(), 200, 0.7)
        .await
        .unwrap();
    let text = writer_result.text;
    assert_eq!(text, WRITER_RESPONSE_E1);

    let checker = ContinuityCheckerAgent::new(provider.clone());
    let issues = checker.check(&text, &facts, &characters, &bible_raw, false).await;
    assert!(issues.is_empty());

    let committer = CommitterAgent::new(&episodic, &facts, &foreshadowing, provider.clone());
    let report = committer.commit(&text, request.chapter, request.scene_num, Some(&scenespec), false).await.unwrap();
    assert!(report.episodic_updated);
    assert_eq!(report.foreshadowing_planted.len(), 1);

    ChapterManager::save_chapter(&project_path, request.chapter, &text).unwrap();

    let mut session = Session::new(&project_path, 50).unwrap();
    session.increment_scene().unwrap();

    assert_eq!(ChapterManager::load_chapter(&project_path, 1).unwrap(), text);
    assert_eq!(episodic.load().matches("### Scene").count(), 1);

    let planted = foreshadowing.load();
    assert_eq!(planted.len(), 1);
    assert_eq!(planted[0].id, "fs001");
    assert_eq!(planted[0].status, ForeshadowingStatus::Unresolved);

    assert_eq!(session.context().current_scene, 2);
}

const DIRECTOR_RESPONSE_E2: &str = r#"{
    "scene": {"chapter": 1, "title": "Confrontation"},
    "narrative": {"objective": "Mira refuses the request", "key_events": ["Mira dismisses the hero"]},
    "constraints": {},
    "continuity": {},
    "style": {}
}"#;

const WRITER_RESPONSE_E2: &str = "「like totally not my problem」と彼女は言った。";

#[tokio::test]
async fn e2_revision_pass_edits_flagged_scene() {
    let dir = tempdir().unwrap();
    let project_path = dir.path().join("Demo");
    ProjectManager::create(&project_path, Some("Demo")).unwrap();

    std::fs::write(
        project_path.join("characters/mira.json"),
        r#"{"id": "mira", "name": {"full": "Mira", "short": "Mira"}, "language": {"tone":"cold","first_person":"I","speech_pattern":"clipped","forbidden_words":["like totally"]}, "personality": {"values":["duty"]}}"#,
    )
    .unwrap();

    let bible = BibleLoader::load(&project_path).unwrap();
    let bible_raw = BibleLoader::load_raw(&project_path).unwrap();
    let characters = CharacterLoader::load_all(&project_path);
    assert_eq!(characters.len(), 1);
    let facts = FactsManager::new(&project_path, 50);
    let episodic = EpisodicMemoryManager::new(&project_path, 5);
    let foreshadowing = ForeshadowingManager::new(&project_path);

    let mut index = TfIdfIndex::new(&project_path, "default");
    index.index_project().unwrap();
    index.build().unwrap();

    let budgets = ContextBudgets::default();
    let assembler = ContextAssembler::new(&budgets, &bible, &characters, &facts, &episodic, &index);

    let edited_text = format!("{WRITER_RESPONSE_E2} (edited)");
    let provider = ScriptedProvider::new(vec![DIRECTOR_RESPONSE_E2, WRITER_RESPONSE_E2, &edited_text]);

    let director = DirectorAgent::new(provider.clone());
    let request = SceneRequest {
        user_intention: "Mira refuses to help".to_string(),
        chapter: 1,
        scene_num: 1,
        pov_character: None,
        required_events: Vec::new(),
        mood: None,
    };
    let director_result = director.design_scene(&assembler, &request).await.unwrap();
    let scenespec = DirectorAgent::parse_scenespec(&DirectorAgent::extract_json(&director_result.text)).unwrap();

    let writer = WriterAgent::new(provider.clone());
    let mut text = writer
        .generate(&scenespec.to_description(), &bible, &characters, None, 200, 0.7)
        .await
        .unwrap()
        .text;

    let checker = ContinuityCheckerAgent::new(provider.clone());
    let issues = checker.check(&text, &facts, &characters, &bible_raw, false).await;
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].category, "character");

    let actionable: Vec<_> = issues.into_iter().filter(|i| i.is_actionable()).collect();
    assert_eq!(actionable.len(), 1);

    let editor = StyleEditorAgent::new(provider.clone());
    text = editor.edit(&text, &actionable, None).await;
    assert!(text.ends_with("(edited)"));

    let committer = CommitterAgent::new(&episodic, &facts, &foreshadowing, provider.clone());
    let report = committer.commit(&text, 1, 1, Some(&scenespec), false).await.unwrap();
    assert!(report.episodic_updated);

    ChapterManager::save_chapter(&project_path, 1, &text).unwrap();
    assert!(ChapterManager::load_chapter(&project_path, 1).unwrap().ends_with("(edited)"));
}

const DIRECTOR_RESPONSE_E3: &str = r#"{
    "scene": {"chapter": 3, "title": "The Reckoning"},
    "narrative": {"objective": "pay off the prophecy", "key_events": ["the prophecy comes true"]},
    "constraints": {},
    "continuity": {"foreshadowing_to_resolve": ["fs001"]},
    "style": {}
}"#;

const WRITER_RESPONSE_E3: &str = "予言はついに現実となった。";

#[tokio::test]
async fn e3_foreshadowing_payoff_resolves_entry() {
    let dir = tempdir().unwrap();
    let project_path = dir.path().join("Demo");
    ProjectManager::create(&project_path, Some("Demo")).unwrap();

    let bible = BibleLoader::load(&project_path).unwrap();
    let bible_raw = BibleLoader::load_raw(&project_path).unwrap();
    let characters = CharacterLoader::load_all(&project_path);
    let facts = FactsManager::new(&project_path, 50);
    let episodic = EpisodicMemoryManager::new(&project_path, 5);
    let foreshadowing = ForeshadowingManager::new(&project_path);

    let planted_id = foreshadowing
        .plant("a prophecy foretells a reckoning", "chapter_001", None, Priority::High, vec![])
        .unwrap();
    assert_eq!(planted_id, "fs001");

    let mut index = TfIdfIndex::new(&project_path, "default");
    index.index_project().unwrap();
    index.build().unwrap();

    let budgets = ContextBudgets::default();
    let assembler = ContextAssembler::new(&budgets, &bible, &characters, &facts, &episodic, &index);

    let provider = ScriptedProvider::new(vec![DIRECTOR_RESPONSE_E3, WRITER_RESPONSE_E3]);

    let director = DirectorAgent::new(provider.clone());
    let request = SceneRequest {
        user_intention: "The prophecy comes due".to_string(),
        chapter: 3,
        scene_num: 1,
        pov_character: None,
        required_events: Vec::new(),
        mood: None,
    };
    let director_result = director.design_scene(&assembler, &request).await.unwrap();
    let scenespec = DirectorAgent::parse_scenespec(&DirectorAgent::extract_json(&director_result.text)).unwrap();
    assert_eq!(scenespec.continuity.foreshadowing_to_resolve, vec!["fs001".to_string()]);

    let writer = WriterAgent::new(provider.clone());
    let text = writer
        .generate(&scenespec.to_description(), &bible, &characters, None, 200, 0.7)
        .await
        .unwrap()
        .text;

    let committer = CommitterAgent::new(&episodic, &facts, &foreshadowing, provider.clone());
    let report = committer.commit(&text, 3, 1, Some(&scenespec), false).await.unwrap();
    assert_eq!(report.foreshadowing_resolved, vec!["fs001".to_string()]);

    let entries = foreshadowing.load();
    let resolved = entries.iter().find(|f| f.id == "fs001").unwrap();
    assert_eq!(resolved.status, ForeshadowingStatus::Resolved);
    assert_eq!(resolved.resolution_chapter.as_deref(), Some("chapter_003"));
}
