//! Context Assembler: composes the bounded prompt package handed to each
//! agent from retrieved fragments, Bible, Characters, Facts, and Recap.
//!
//! Grounded on spec section 4.2 ("Assembly") and original_source's
//! `rag/retriever.py::RAGContextBuilder`, generalized to pull from all
//! memory subsystems rather than just the retriever.

use crate::config::ContextBudgets;
use crate::memory::{Bible, CharacterCard, CharacterFormatter, EpisodicMemoryManager, FactsManager};
use crate::retriever::TfIdfIndex;
use std::collections::HashMap;

/// Truncate a string to `max_bytes`, preserving a valid UTF-8 prefix and
/// appending `...` when content was cut.
fn truncate_block(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

/// Assembles per-agent prompt context from all memory subsystems and the
/// retriever, subject to per-section byte budgets.
pub struct ContextAssembler<'a> {
    budgets: &'a ContextBudgets,
    bible: &'a Bible,
    characters: &'a HashMap<String, CharacterCard>,
    facts: &'a FactsManager,
    episodic: &'a EpisodicMemoryManager,
    index: &'a TfIdfIndex,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(
        budgets: &'a ContextBudgets,
        bible: &'a Bible,
        characters: &'a HashMap<String, CharacterCard>,
        facts: &'a FactsManager,
        episodic: &'a EpisodicMemoryManager,
        index: &'a TfIdfIndex,
    ) -> Self {
        Self { budgets, bible, characters, facts, episodic, index }
    }

    /// Build the full prompt context block for `query` under `agent_role`.
    ///
    /// Order matches spec 4.2: retrieved fragments, Style Bible, World
    /// Bible, Character block, Facts block, Episodic Recap.
    pub fn build(&self, query: &str, agent_role: &str) -> String {
        let mut sections = Vec::new();

        let retrieved = self.retrieved_block(query, agent_role);
        if !retrieved.is_empty() {
            sections.push(retrieved);
        }

        let style = self.style_bible_block();
        if !style.is_empty() {
            sections.push(style);
        }

        let world = self.world_bible_block();
        if !world.is_empty() {
            sections.push(world);
        }

        let characters = truncate_block(&CharacterFormatter::format_all(self.characters), self.budgets.characters);
        sections.push(characters);

        let facts = truncate_block(&self.facts.get_facts_for_context(self.budgets.facts), self.budgets.facts);
        sections.push(facts);

        let recap = truncate_block(&self.episodic.get_recent_summary(self.budgets.recap), self.budgets.recap);
        if !recap.is_empty() {
            sections.push(recap);
        }

        sections.join("\n\n")
    }

    fn retrieved_block(&self, query: &str, agent_role: &str) -> String {
        let results = self.index.search_for_agent(query, agent_role);
        if results.is_empty() {
            return String::new();
        }
        let mut lines = vec!["## Retrieved Context".to_string()];
        for result in results {
            let snippet: String = result.document.content.chars().take(200).collect();
            lines.push(format!("- [{}] {}", result.document.source, snippet));
        }
        truncate_block(&lines.join("\n"), self.budgets.icl)
    }

    fn style_bible_block(&self) -> String {
        if self.bible.style_rules.is_empty() && self.bible.style_forbidden.is_empty() {
            return String::new();
        }
        truncate_block(&self.bible.format_style_section(), self.budgets.bible / 2)
    }

    fn world_bible_block(&self) -> String {
        if self.bible.world_settings.is_empty() && self.bible.world_glossary.is_empty() {
            return String::new();
        }
        truncate_block(&self.bible.format_world_section(), self.budgets.bible / 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_preserves_prefix_and_marks_cut() {
        let text = "a".repeat(100);
        let truncated = truncate_block(&text, 10);
        assert_eq!(truncated.len(), 13);
        assert!(truncated.starts_with("aaaaaaaaaa"));
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn truncate_is_noop_under_budget() {
        assert_eq!(truncate_block("short", 100), "short");
    }

    #[test]
    fn truncate_respects_utf8_boundaries() {
        let text = "一".repeat(10);
        let truncated = truncate_block(&text, 4);
        assert!(truncated.is_char_boundary(truncated.len() - 3));
    }
}
