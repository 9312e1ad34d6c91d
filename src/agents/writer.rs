//! Writer: turns a scene description into prose.
//!
//! Grounded on original_source's `agents/writer.py`. The system prompt's
//! job is almost entirely negative — no meta-commentary, no JSON, no
//! narrator asides — so `clean_output` backstops the model with a few
//! rule-based strips of fences and common Japanese prose-label prefixes.

use crate::error::NovelistError;
use crate::memory::{Bible, CharacterCard};
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, GenerationResult, Message};
use std::collections::HashMap;
use std::sync::Arc;

const SYSTEM_PROMPT: &str = "あなたはプロの小説家です。与えられた設定と文体に従って、小説の本文を書いてください。\n\n\
重要な制約：\n\
- 本文のみを出力してください。思考プロセス、注釈、解説は一切含めないでください。\n\
- JSON形式やマークダウンの見出しを使わないでください。\n\
- 「この物語では」「読者の皆さん」といったメタ的な言及は禁止です。\n\
- 与えられた文体（一人称、文末、比喩表現）を厳密に守ってください。\n\
- キャラクターの口調、価値観、禁則事項を厳守してください。\n\n\
出力は自然な小説の文章のみとし、前置き・後書きは不要です。";

const META_PREFIXES: &[&str] = &["本文：", "本文:", "出力：", "出力:", "シーン：", "シーン:", "小説：", "小説:"];

pub struct WriterAgent {
    provider: Arc<dyn Provider>,
}

impl WriterAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub async fn generate(
        &self,
        scene_description: &str,
        bible: &Bible,
        characters: &HashMap<String, CharacterCard>,
        pov_character: Option<&str>,
        word_count: u32,
        temperature: f32,
    ) -> Result<GenerationResult, NovelistError> {
        let prompt = self.build_prompt(scene_description, bible, characters, pov_character, word_count);
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let params = GenerationParams::default()
            .with_temperature(temperature)
            .with_max_tokens((word_count * 2).min(4000));

        let mut result = self.provider.generate(&messages, &params).await?;
        result.text = Self::clean_output(&result.text);
        Ok(result)
    }

    fn build_prompt(
        &self,
        scene_description: &str,
        bible: &Bible,
        characters: &HashMap<String, CharacterCard>,
        pov_character: Option<&str>,
        word_count: u32,
    ) -> String {
        let mut parts = vec![bible.format_style_section(), String::new(), bible.format_world_section(), String::new()];

        parts.push("## Characters".to_string());
        for card in characters.values() {
            parts.push(card.format_for_prompt());
        }
        parts.push(String::new());

        parts.push("## Scene Specification".to_string());
        parts.push(scene_description.to_string());
        parts.push(String::new());

        if let Some(pov) = pov_character {
            parts.push(format!("**視点**: {pov}の一人称視点"));
        }
        parts.push(format!("**目標文字数**: {word_count}文字程度"));
        parts.push(String::new());

        parts.push("## Instruction".to_string());
        parts.push("上記の設定に従って、シーンの本文を書いてください。".to_string());
        parts.push("- 地の文とセリフを含む自然な文章".to_string());
        parts.push("- メタ的な言及を含めない".to_string());
        parts.push("- 設定に矛盾がないように注意".to_string());

        parts.join("\n")
    }

    fn clean_output(text: &str) -> String {
        let mut text = text.to_string();

        if text.trim_start().starts_with("```") {
            let lines: Vec<&str> = text.lines().collect();
            let mut start = None;
            let mut end = None;
            for (i, line) in lines.iter().enumerate() {
                if line.trim_start().starts_with("```") {
                    if start.is_none() {
                        start = Some(i);
                    } else {
                        end = Some(i);
                        break;
                    }
                }
            }
            if let (Some(s), Some(e)) = (start, end) {
                text = lines[s + 1..e].join("\n");
            }
        }

        text = text.trim().to_string();

        for prefix in META_PREFIXES {
            if let Some(stripped) = text.strip_prefix(prefix) {
                text = stripped.trim().to_string();
                break;
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_output_strips_fenced_block() {
        let raw = "```\n夜が静かに更けていった。\n```";
        assert_eq!(WriterAgent::clean_output(raw), "夜が静かに更けていった。");
    }

    #[test]
    fn clean_output_strips_meta_prefix() {
        let raw = "本文：彼は剣を抜いた。";
        assert_eq!(WriterAgent::clean_output(raw), "彼は剣を抜いた。");
    }

    #[test]
    fn clean_output_is_noop_on_plain_prose() {
        let raw = "彼女は窓辺に立ち、遠い山並みを見つめていた。";
        assert_eq!(WriterAgent::clean_output(raw), raw);
    }
}
