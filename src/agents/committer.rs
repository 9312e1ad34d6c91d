//! Committer: updates memory after a scene lands — episodic recap,
//! extracted facts, and foreshadowing transitions.
//!
//! Grounded on original_source's `agents/committer.py`. That file reads
//! `scenespec["narrary"]` at line 85 — a typo for "narrative" that would
//! silently drop every scene's key events from the episodic summary.
//! This port uses the correct field name.

use crate::agents::types::{CommitReport, SceneSpec};
use crate::error::NovelistError;
use crate::memory::{EpisodicMemoryManager, FactsManager, ForeshadowingManager, Priority, SimpleSummarizer};
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, Message};
use std::sync::Arc;

pub struct CommitterAgent<'a> {
    episodic: &'a EpisodicMemoryManager,
    facts: &'a FactsManager,
    foreshadowing: &'a ForeshadowingManager,
    provider: Arc<dyn Provider>,
}

impl<'a> CommitterAgent<'a> {
    pub fn new(
        episodic: &'a EpisodicMemoryManager,
        facts: &'a FactsManager,
        foreshadowing: &'a ForeshadowingManager,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self { episodic, facts, foreshadowing, provider }
    }

    pub async fn commit(
        &self,
        text: &str,
        chapter: u32,
        scene: u32,
        scenespec: Option<&SceneSpec>,
        use_llm_extraction: bool,
    ) -> Result<CommitReport, NovelistError> {
        let mut report = CommitReport { chapter, scene, ..Default::default() };
        let chapter_label = format!("chapter_{chapter:03}");

        let summary = SimpleSummarizer::summarize(text, 3);
        let key_events = scenespec.map(|s| s.narrative.key_events.clone()).unwrap_or_default();
        let pov = scenespec.and_then(|s| s.constraints.pov_character.clone());

        self.episodic.add_scene_summary(chapter, scene, &summary, pov.as_deref(), &key_events)?;
        report.episodic_updated = true;

        let extracted_facts = if use_llm_extraction {
            self.extract_facts_with_llm(text).await.unwrap_or_else(|_| FactsManager::extract_facts_from_text(text))
        } else {
            FactsManager::extract_facts_from_text(text)
        };

        for content in extracted_facts {
            let fact_id = self.facts.add_fact(&content, &chapter_label, "extracted", vec![])?;
            report.facts_added.push(fact_id);
        }

        if let Some(spec) = scenespec {
            for fs_id in &spec.continuity.foreshadowing_to_resolve {
                self.foreshadowing.resolve(fs_id, &chapter_label, None)?;
                report.foreshadowing_resolved.push(fs_id.clone());
            }
            for content in &spec.continuity.foreshadowing_to_plant {
                let fs_id = self.foreshadowing.plant(content, &chapter_label, None, Priority::Medium, vec![])?;
                report.foreshadowing_planted.push(fs_id);
            }
        }

        Ok(report)
    }

    async fn extract_facts_with_llm(&self, text: &str) -> Result<Vec<String>, NovelistError> {
        let excerpt: String = text.chars().take(2000).collect();
        let prompt = format!(
            "以下の文章から、確定した事実を抽出してください。\n\n文章:\n{excerpt}\n\n指示:\n\
            - 事実は簡潔な一文で記述してください\n\
            - キャラクターの属性、出来事、設定などを含めてください\n\
            - 主観的な表現や推測は除外してください\n\
            - 最大5つまで\n\n出力形式（JSON配列）:\n[\"事実1\", \"事実2\", \"事実3\"]"
        );
        let messages = [Message::system("あなたは正確な情報抽出の専門家です。"), Message::user(prompt)];
        let params = GenerationParams::default().with_temperature(0.2).with_max_tokens(1000);
        let result = self.provider.generate(&messages, &params).await?;

        let start = result.text.find('[').ok_or_else(|| NovelistError::Parse("no JSON array in extraction".to_string()))?;
        let end = result.text.rfind(']').ok_or_else(|| NovelistError::Parse("no JSON array in extraction".to_string()))?;
        let facts: Vec<String> = serde_json::from_str(&result.text[start..=end])
            .map_err(|e| NovelistError::Parse(format!("fact extraction: {e}")))?;
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::types::{ConstraintsSpec, ContinuitySpec, NarrativeSpec};
    use tempfile::tempdir;

    #[test]
    fn scenespec_uses_narrative_not_the_original_typo() {
        let spec = SceneSpec {
            narrative: NarrativeSpec { key_events: vec!["the gate opened".to_string()], ..Default::default() },
            constraints: ConstraintsSpec::default(),
            continuity: ContinuitySpec::default(),
            ..Default::default()
        };
        assert_eq!(spec.narrative.key_events, vec!["the gate opened".to_string()]);
    }

    #[tokio::test]
    async fn commit_updates_episodic_and_extracts_facts() {
        let dir = tempdir().unwrap();
        let episodic = EpisodicMemoryManager::new(dir.path(), 20);
        let facts = FactsManager::new(dir.path(), 50);
        let foreshadowing = ForeshadowingManager::new(dir.path());

        let provider = Arc::new(crate::pal::providers::local::LocalProvider::new(&crate::config::ProviderEntryConfig {
            provider_type: "local".to_string(),
            model: "test".to_string(),
            base_url: Some("http://localhost:11434".to_string()),
            api_key_env: None,
            timeout: 10,
        }));

        let committer = CommitterAgent::new(&episodic, &facts, &foreshadowing, provider);
        let report = committer.commit("太郎は勇者である。戦いは続いた。", 1, 1, None, false).await.unwrap();

        assert!(report.episodic_updated);
        assert_eq!(episodic.load().matches("### Scene").count(), 1);
    }
}
