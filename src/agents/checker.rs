//! Continuity checker: three escalating tiers of consistency checking —
//! fact-negation regex, forbidden-dialogue-word regex, and an optional
//! LLM audit pass.
//!
//! Grounded on original_source's `agents/checker.py`. Output is a list
//! of `Issue`s, never corrected text — fixing is the Editor's job.

use crate::agents::types::Issue;
use crate::error::NovelistError;
use crate::memory::{CharacterCard, FactsManager};
use crate::pal::factory::Provider;
use crate::pal::types::{GenerationParams, Message};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

fn dialogue_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[「"]([^」"]+)[」"]"#).unwrap())
}

pub struct ContinuityCheckerAgent {
    provider: Arc<dyn Provider>,
}

impl ContinuityCheckerAgent {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub async fn check(
        &self,
        text: &str,
        facts: &FactsManager,
        characters: &HashMap<String, CharacterCard>,
        bible_raw: &str,
        use_llm: bool,
    ) -> Vec<Issue> {
        let mut issues = Vec::new();
        issues.extend(Self::check_facts(text, facts));
        issues.extend(Self::check_characters(text, characters));

        if use_llm {
            if let Ok(llm_issues) = self.check_with_llm(text, bible_raw, characters, facts).await {
                issues.extend(llm_issues);
            }
        }

        issues
    }

    fn check_facts(text: &str, facts: &FactsManager) -> Vec<Issue> {
        let text_lower = text.to_lowercase();
        let mut issues = Vec::new();

        for fact in facts.load() {
            let prefix: String = fact.content.chars().take(20).collect();
            let Ok(pattern) = Regex::new(&format!("{}.{{0,20}}(違う|間違|ない|しなかった|ではな)", regex::escape(&prefix))) else {
                continue;
            };
            if pattern.is_match(&text_lower) {
                issues.push(Issue {
                    category: "fact".to_string(),
                    severity: "error".to_string(),
                    description: format!("Possible contradiction of fact [{}]: {}", fact.id, fact.content),
                    location: None,
                    suggestion: Some("Review consistency with established facts".to_string()),
                });
            }
        }
        issues
    }

    fn check_characters(text: &str, characters: &HashMap<String, CharacterCard>) -> Vec<Issue> {
        let mut issues = Vec::new();
        let dialogues: Vec<&str> = dialogue_pattern().captures_iter(text).filter_map(|c| c.get(1)).map(|m| m.as_str()).collect();

        for card in characters.values() {
            for dialogue in &dialogues {
                for word in &card.language.forbidden_words {
                    if dialogue.contains(word.as_str()) {
                        issues.push(Issue {
                            category: "character".to_string(),
                            severity: "error".to_string(),
                            description: format!("Character '{}' used forbidden word: '{word}'", card.name.full()),
                            location: Some(dialogue.chars().take(50).collect()),
                            suggestion: Some(format!("Avoid '{word}' for this character")),
                        });
                    }
                }
            }
        }
        issues
    }

    async fn check_with_llm(
        &self,
        text: &str,
        bible_raw: &str,
        characters: &HashMap<String, CharacterCard>,
        facts: &FactsManager,
    ) -> Result<Vec<Issue>, NovelistError> {
        let char_texts: Vec<String> = characters.values().take(3).map(|c| c.format_for_prompt()).collect();
        let facts_block = facts.get_facts_for_context(1000);
        let text_excerpt: String = text.chars().take(2000).collect();
        let bible_excerpt: String = bible_raw.chars().take(1000).collect();

        let prompt = format!(
            "以下の文章をチェックし、矛盾・逸脱があれば指摘してください。\n\n\
            ## チェック対象の文章\n{text_excerpt}\n\n\
            ## 世界観・設定\n{bible_excerpt}\n\n\
            ## キャラクター設定\n{}\n\n\
            ## 確定事実\n{facts_block}\n\n\
            ## 指示\n以下の点をチェックし、問題があればJSON形式で出力してください：\n\
            1. 設定矛盾（世界観、技術水準など）\n\
            2. キャラクター逸脱（口調、価値観、禁則語）\n\
            3. 事実矛盾（確定事実と矛盾）\n\
            4. 視点違反（POVキャラ以外の内面描写）\n\n\
            問題がなければ空配列 [] を返してください。\n\n\
            出力形式:\n[{{\"category\": \"fact|character|world|pov\", \"severity\": \"error|warning|info\", \"description\": \"問題の説明\", \"location\": \"該当箇所（あれば）\", \"suggestion\": \"修正提案\"}}]",
            char_texts.join("\n")
        );

        let messages = [
            Message::system("あなたは小説の設定・矛盾チェッカーです。客観的に問題を指摘してください。"),
            Message::user(prompt),
        ];
        let params = GenerationParams::default().with_temperature(0.2).with_max_tokens(1500);
        let result = self.provider.generate(&messages, &params).await?;

        Self::parse_issues(&result.text)
    }

    fn parse_issues(text: &str) -> Result<Vec<Issue>, NovelistError> {
        let start = text.find('[').ok_or_else(|| NovelistError::Parse("no JSON array in checker output".to_string()))?;
        let end = text.rfind(']').ok_or_else(|| NovelistError::Parse("no JSON array in checker output".to_string()))?;
        if end < start {
            return Err(NovelistError::Parse("malformed checker JSON array".to_string()));
        }
        serde_json::from_str(&text[start..=end]).map_err(|e| NovelistError::Parse(format!("checker issues: {e}")))
    }

    pub fn format_report(issues: &[Issue]) -> String {
        if issues.is_empty() {
            return "No issues detected".to_string();
        }
        let mut lines = vec![format!("Found {} issue(s):", issues.len()), String::new()];
        for issue in issues {
            lines.push(format!("[{}] {}", issue.category.to_uppercase(), issue.description));
            if let Some(location) = &issue.location {
                lines.push(format!("  Location: {location}"));
            }
            if let Some(suggestion) = &issue.suggestion {
                lines.push(format!("  Suggestion: {suggestion}"));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::CharacterLoader;
    use crate::pal::types::{GenerationResult, ProviderCapabilities};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn generate(&self, _messages: &[Message], _params: &GenerationParams) -> Result<GenerationResult, NovelistError> {
            Err(NovelistError::Transport("connection refused".to_string()))
        }
        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities::default()
        }
        async fn healthcheck(&self) -> bool {
            false
        }
        fn model(&self) -> &str {
            "failing"
        }
        fn provider_name(&self) -> &'static str {
            "failing"
        }
    }

    fn sample_characters() -> HashMap<String, CharacterCard> {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("characters")).unwrap();
        std::fs::write(
            dir.path().join("characters/mira.json"),
            r#"{"id": "mira", "name": {"full": "Mira", "short": "Mira"}, "language": {"tone":"cold","first_person":"I","speech_pattern":"clipped","forbidden_words":["like totally"]}, "personality": {"values":["duty"]}}"#,
        )
        .unwrap();
        CharacterLoader::load_all(dir.path())
    }

    #[test]
    fn flags_forbidden_word_in_dialogue() {
        let characters = sample_characters();
        let text = "「like totally not my problem」と彼女は言った。";
        let issues = ContinuityCheckerAgent::check_characters(text, &characters);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, "character");
    }

    #[test]
    fn clean_dialogue_raises_no_issues() {
        let characters = sample_characters();
        let text = "「そろそろ行かなくては」と彼女は静かに言った。";
        let issues = ContinuityCheckerAgent::check_characters(text, &characters);
        assert!(issues.is_empty());
    }

    #[tokio::test]
    async fn llm_provider_failure_is_recoverable_and_keeps_rule_based_issues() {
        let characters = sample_characters();
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("memory")).unwrap();
        let facts = FactsManager::new(dir.path(), 50);
        let text = "「like totally not my problem」と彼女は言った。";

        let checker = ContinuityCheckerAgent::new(Arc::new(FailingProvider));
        let issues = checker.check(text, &facts, &characters, "", true).await;

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, "character");
    }

    #[test]
    fn format_report_handles_empty_issue_list() {
        assert_eq!(ContinuityCheckerAgent::format_report(&[]), "No issues detected");
    }
}
