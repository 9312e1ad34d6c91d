//! Style editor: an LLM revision pass plus a standalone rule-based
//! `quick_fix` path for redundancy, repetition, and pacing.
//!
//! Grounded on original_source's `agents/editor.py`. If the LLM edit
//! fails, the original text is kept — editing is a recoverable stage per
//! the pipeline's error policy.

use crate::agents::types::Issue;
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, Message};
use regex::Regex;
use std::sync::{Arc, OnceLock};

const SYSTEM_PROMPT: &str = "あなたは熟練した小説編集者です。\n\
与えられた文章を改善し、冗長さ・反復・テンポの問題を修正してください。\n\n\
改善の指針：\n\
- 冗長な表現を簡潔に\n\
- 同じ語句の過度な反復を削除\n\
- テンポを改善（短い文と長い文のバランス）\n\
- 地の文とセリフのリズムを整える\n\
- 原作の意味・意図は保持する\n\
- メタ的なコメントを含めない\n\n\
出力は本文のみとし、解説は不要です。";

pub struct StyleEditorAgent {
    provider: Arc<dyn Provider>,
}

impl StyleEditorAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Attempt an LLM-driven edit. Returns the original text if
    /// generation fails rather than propagating the error.
    pub async fn edit(&self, text: &str, issues: &[Issue], style_rules: Option<&str>) -> String {
        let prompt = self.build_prompt(text, issues, style_rules);
        let messages = [Message::system(SYSTEM_PROMPT), Message::user(prompt)];
        let params = GenerationParams::default()
            .with_temperature(0.4)
            .with_max_tokens((text.chars().count() as u32) + 500);

        match self.provider.generate(&messages, &params).await {
            Ok(result) => Self::clean_output(&result.text),
            Err(_) => text.to_string(),
        }
    }

    fn build_prompt(&self, text: &str, issues: &[Issue], style_rules: Option<&str>) -> String {
        let mut parts = vec!["## 編集対象の文章".to_string(), text.to_string(), String::new()];

        if let Some(rules) = style_rules {
            parts.push("## スタイルガイド".to_string());
            parts.push(rules.to_string());
            parts.push(String::new());
        }

        if !issues.is_empty() {
            parts.push("## 修正すべき問題".to_string());
            for issue in issues {
                parts.push(format!("- [{}] {}", issue.category, issue.description));
            }
            parts.push(String::new());
        }

        parts.push("## 指示".to_string());
        parts.push("文章全体を改善したバージョンを出力してください。".to_string());

        parts.join("\n")
    }

    fn clean_output(text: &str) -> String {
        if !text.contains("```") {
            return text.trim().to_string();
        }
        let mut in_block = false;
        let mut cleaned = Vec::new();
        for line in text.lines() {
            if line.trim_start().starts_with("```") {
                in_block = !in_block;
                continue;
            }
            cleaned.push(line);
        }
        cleaned.join("\n").trim().to_string()
    }

    /// Rule-based fixes applied without an LLM round-trip.
    pub fn quick_fix(text: &str, fix_type: &str) -> String {
        match fix_type {
            "redundancy" => Self::fix_redundancy(text),
            "repetition" => Self::fix_repetition(text),
            "tempo" => Self::fix_tempo(text),
            _ => Self::fix_tempo(&Self::fix_repetition(&Self::fix_redundancy(text))),
        }
    }

    fn fix_redundancy(text: &str) -> String {
        static PATTERNS: OnceLock<Vec<(Regex, &str)>> = OnceLock::new();
        let patterns = PATTERNS.get_or_init(|| {
            vec![
                (Regex::new(r"非常に\s*大きい").unwrap(), "巨大な"),
                (Regex::new(r"完全に\s*同じ").unwrap(), "同一の"),
                (Regex::new(r"独自の\s*特有の").unwrap(), "独自の"),
            ]
        });
        let mut result = text.to_string();
        for (pattern, replacement) in patterns {
            result = pattern.replace_all(&result, *replacement).to_string();
        }
        result
    }

    fn fix_repetition(text: &str) -> String {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let re = PATTERN.get_or_init(|| Regex::new(r"([\x{4e00}-\x{9fa5}]{2,5})[。！？]\s*\1[。！？]").unwrap());
        re.replace_all(text, "$1。").to_string()
    }

    fn fix_tempo(text: &str) -> String {
        let mut result = Vec::new();
        let mut dialogue_count = 0;
        for line in text.lines() {
            if line.contains('「') {
                dialogue_count += 1;
                if dialogue_count >= 3 {
                    result.push(String::new());
                    dialogue_count = 0;
                }
            } else {
                dialogue_count = 0;
            }
            result.push(line.to_string());
        }
        result.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_redundancy_replaces_known_phrases() {
        assert_eq!(StyleEditorAgent::fix_redundancy("非常に大きい建物"), "巨大な建物");
    }

    #[test]
    fn fix_repetition_collapses_immediate_duplicate() {
        let text = "走る。走る。そして止まった。";
        let fixed = StyleEditorAgent::fix_repetition(text);
        assert!(!fixed.contains("走る。走る。"));
    }

    #[test]
    fn quick_fix_all_applies_every_pass() {
        let text = "非常に大きい。走る。走る。";
        let fixed = StyleEditorAgent::quick_fix(text, "all");
        assert!(fixed.contains("巨大な"));
        assert!(!fixed.contains("走る。走る。"));
    }
}
