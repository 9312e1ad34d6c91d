//! Director: turns a user intention into a structured `SceneSpec`.
//!
//! Grounded on original_source's `agents/director.py`. JSON extraction is
//! tolerant of fenced code blocks and narrative wrapping, since the
//! Director's failure mode (per the pipeline's error policy) is
//! recoverable — a parse failure degrades to treating the raw text as
//! the scene description rather than aborting the run.

use crate::agents::types::SceneSpec;
use crate::context::ContextAssembler;
use crate::error::NovelistError;
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, GenerationResult, Message};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "あなたは小説の演出家（Director）です。\n\
与えられた設定と意図から、次のシーンの詳細設計図（SceneSpec）をJSON形式で作成してください。\n\n\
重要：\n\
- 必ず有効なJSONのみを出力してください\n\
- マークダウンの装飾（```json）は不要です\n\
- 世界観・キャラクター設定に矛盾がないようにしてください\n\
- 伏線の回収や新しい伏線の設置を考慮してください";

#[derive(Debug, Clone, Default)]
pub struct SceneRequest {
    pub user_intention: String,
    pub chapter: u32,
    pub scene_num: u32,
    pub pov_character: Option<String>,
    pub required_events: Vec<String>,
    pub mood: Option<String>,
}

pub struct DirectorAgent {
    provider: Arc<dyn Provider>,
}

impl DirectorAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub async fn design_scene(
        &self,
        assembler: &ContextAssembler<'_>,
        request: &SceneRequest,
    ) -> Result<GenerationResult, NovelistError> {
        let prompt = self.build_prompt(assembler, request);
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let params = GenerationParams::default().with_temperature(0.5).with_max_tokens(2000);
        self.provider.generate(&messages, &params).await
    }

    fn build_prompt(&self, assembler: &ContextAssembler<'_>, request: &SceneRequest) -> String {
        let mut parts = vec!["## User Intention（ユーザーの意図）".to_string(), request.user_intention.clone(), String::new()];

        let context_block = assembler.build(&request.user_intention, "director");
        if !context_block.is_empty() {
            parts.push(context_block);
            parts.push(String::new());
        }

        parts.push("## Scene Requirements（シーン要件）".to_string());
        parts.push(format!("- Chapter: {}", request.chapter));
        parts.push(format!("- Scene: {}", request.scene_num));
        if let Some(pov) = &request.pov_character {
            parts.push(format!("- POV Character: {pov}"));
        }
        if let Some(mood) = &request.mood {
            parts.push(format!("- Mood: {mood}"));
        }
        if !request.required_events.is_empty() {
            parts.push(format!("- Required Events: {}", request.required_events.join(", ")));
        }
        parts.push(String::new());

        parts.push("## Output".to_string());
        parts.push("上記の情報に基づいて、SceneSpec JSONを作成してください。".to_string());
        parts.push("JSONのみを出力し、説明やマークダウンは含めないでください。".to_string());

        parts.join("\n")
    }

    /// Pulls a JSON object out of fenced code blocks or surrounding prose.
    pub fn extract_json(text: &str) -> String {
        if let Some(start) = text.find("```json") {
            let body_start = start + "```json".len();
            if let Some(end) = text[body_start..].find("```") {
                return text[body_start..body_start + end].trim().to_string();
            }
        }
        if let Some(start) = text.find("```") {
            let body_start = start + 3;
            if let Some(end) = text[body_start..].find("```") {
                return text[body_start..body_start + end].trim().to_string();
            }
        }
        if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
            if end > start {
                return text[start..=end].to_string();
            }
        }
        text.to_string()
    }

    /// Parse a `SceneSpec` from Director output. Returns `Err(Parse)` — a
    /// recoverable error — rather than panicking on malformed JSON.
    pub fn parse_scenespec(json_text: &str) -> Result<SceneSpec, NovelistError> {
        serde_json::from_str(json_text).map_err(|e| NovelistError::Parse(format!("scenespec: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_from_fenced_block() {
        let text = "Here you go:\n```json\n{\"scene\": {\"chapter\": 1}}\n```\nEnjoy.";
        let extracted = DirectorAgent::extract_json(text);
        assert_eq!(extracted, r#"{"scene": {"chapter": 1}}"#);
    }

    #[test]
    fn extracts_bare_json_object_when_unfenced() {
        let text = "sure, here's the spec: {\"scene\": {\"chapter\": 2}} hope it helps";
        let extracted = DirectorAgent::extract_json(text);
        assert_eq!(extracted, r#"{"scene": {"chapter": 2}}"#);
    }

    #[test]
    fn malformed_json_is_a_recoverable_parse_error() {
        let err = DirectorAgent::parse_scenespec("not json at all").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn parses_a_well_formed_scenespec() {
        let json = r#"{"scene": {"chapter": 3, "title": "The Siege"}, "narrative": {"objective": "raise stakes"}}"#;
        let spec = DirectorAgent::parse_scenespec(json).unwrap();
        assert_eq!(spec.scene.chapter, Some(3));
        assert_eq!(spec.narrative.objective.as_deref(), Some("raise stakes"));
    }
}
