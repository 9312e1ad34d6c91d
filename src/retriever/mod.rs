//! TF-IDF document retriever: lightweight vector similarity search over
//! project documents (bible sections, characters, facts, chapter chunks).
//!
//! Grounded on original_source's `rag/retriever.py`. Cosine similarity
//! reuses the teacher's `utils::math::cosine_similarity` rather than
//! reimplementing a dot product, since the embeddings here are already
//! L2-normalized and a plain dot product would give the same answer.

use crate::error::NovelistError;
use crate::utils::math::cosine_similarity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

const VOCAB_SIZE: usize = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub source: String,
    pub doc_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
    pub rank: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SimpleEmbedding {
    vocab: HashMap<String, usize>,
    idf: HashMap<String, f32>,
    #[serde(skip)]
    doc_count: usize,
}

impl SimpleEmbedding {
    /// Character-level tokenizer: alphanumerics plus the CJK Unified
    /// Ideographs block, lowercased. Matches the original's "good enough
    /// for Japanese/English without a real tokenizer" approach.
    fn tokenize(text: &str) -> Vec<char> {
        text.to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || ('\u{4e00}'..='\u{9fff}').contains(c))
            .collect()
    }

    fn build_vocab(&mut self, documents: &[String]) {
        let mut word_freq: HashMap<char, usize> = HashMap::new();
        let mut doc_freq: HashMap<char, usize> = HashMap::new();

        for doc in documents {
            let tokens = Self::tokenize(doc);
            let mut seen = std::collections::HashSet::new();
            for token in &tokens {
                *word_freq.entry(*token).or_insert(0) += 1;
                seen.insert(*token);
            }
            for token in seen {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        let mut sorted: Vec<(char, usize)> = word_freq.into_iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        self.vocab = sorted.into_iter().take(VOCAB_SIZE).enumerate().map(|(idx, (word, _))| (word.to_string(), idx)).collect();

        self.idf.clear();
        for (word, df) in doc_freq {
            let key = word.to_string();
            if self.vocab.contains_key(&key) {
                self.idf.insert(key, (self.doc_count as f32 / (df as f32 + 1.0)).ln() + 1.0);
            }
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.vocab.len()];
        for token in Self::tokenize(text) {
            let key = token.to_string();
            if let Some(&idx) = self.vocab.get(&key) {
                vector[idx] += self.idf.get(&key).copied().unwrap_or(1.0);
            }
        }
        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }

    pub fn fit(&mut self, documents: &[String]) {
        self.doc_count = documents.len();
        self.build_vocab(documents);
    }
}

#[derive(Serialize, Deserialize, Default)]
struct IndexFile {
    #[serde(default)]
    vocab: HashMap<String, usize>,
    #[serde(default)]
    idf: HashMap<String, f32>,
    #[serde(default)]
    documents: Vec<Document>,
}

/// TF-IDF document index for one project, persisted under `.index/`.
pub struct TfIdfIndex {
    project_path: PathBuf,
    index_file: PathBuf,
    documents: HashMap<String, Document>,
    embedder: SimpleEmbedding,
    fitted: bool,
}

impl TfIdfIndex {
    pub fn new(project_path: &Path, index_name: &str) -> Self {
        let index_file = project_path.join(".index").join(format!("{index_name}_rag.json"));
        let mut index = Self {
            project_path: project_path.to_path_buf(),
            index_file,
            documents: HashMap::new(),
            embedder: SimpleEmbedding::default(),
            fitted: false,
        };
        index.load();
        index
    }

    fn load(&mut self) {
        let Ok(raw) = std::fs::read_to_string(&self.index_file) else { return };
        let Ok(data) = serde_json::from_str::<IndexFile>(&raw) else { return };
        self.embedder.vocab = data.vocab;
        self.embedder.idf = data.idf;
        self.fitted = true;
        for doc in data.documents {
            self.documents.insert(doc.id.clone(), doc);
        }
    }

    fn save(&self) -> Result<(), NovelistError> {
        if let Some(parent) = self.index_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = IndexFile {
            vocab: self.embedder.vocab.clone(),
            idf: self.embedder.idf.clone(),
            documents: self.documents.values().cloned().collect(),
        };
        std::fs::write(&self.index_file, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    pub fn add_document(
        &mut self,
        content: &str,
        source: &str,
        doc_type: &str,
        metadata: HashMap<String, String>,
        doc_id: Option<String>,
    ) -> String {
        let id = doc_id.unwrap_or_else(|| content_hash(content));
        self.documents.insert(
            id.clone(),
            Document { id: id.clone(), content: content.to_string(), source: source.to_string(), doc_type: doc_type.to_string(), metadata, embedding: None },
        );
        self.fitted = false;
        id
    }

    /// Crawl bible.md sections, character cards, facts, and chapter
    /// paragraphs into the index, then build embeddings.
    pub fn index_project(&mut self) -> Result<(), NovelistError> {
        let bible_path = self.project_path.join("bible.md");
        if let Ok(content) = std::fs::read_to_string(&bible_path) {
            for (i, section) in content.split("##").skip(1).enumerate() {
                let section = section.trim();
                if section.is_empty() {
                    continue;
                }
                let title: String = section.lines().next().unwrap_or("").chars().take(50).collect();
                let mut metadata = HashMap::new();
                metadata.insert("section".to_string(), title);
                self.add_document(section, "bible.md", "bible", metadata, Some(format!("bible_{}", i + 1)));
            }
        }

        let chars_dir = self.project_path.join("characters");
        if let Ok(entries) = std::fs::read_dir(&chars_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(&path) else { continue };
                let stem = path.file_stem().unwrap().to_string_lossy().to_string();
                let mut metadata = HashMap::new();
                metadata.insert("name".to_string(), stem.clone());
                self.add_document(&content, &format!("characters/{stem}.json"), "character", metadata, Some(format!("char_{stem}")));
            }
        }

        let facts_file = self.project_path.join("memory").join("facts.json");
        if let Ok(raw) = std::fs::read_to_string(&facts_file) {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                if let Some(facts) = value.get("facts").and_then(|f| f.as_array()) {
                    for fact in facts {
                        let content = fact.get("content").and_then(|c| c.as_str()).unwrap_or_default();
                        let fact_id = fact.get("id").and_then(|c| c.as_str()).unwrap_or_default();
                        let mut metadata = HashMap::new();
                        metadata.insert("fact_id".to_string(), fact_id.to_string());
                        self.add_document(content, "memory/facts.json", "fact", metadata, Some(format!("fact_{fact_id}")));
                    }
                }
            }
        }

        let chapters_dir = self.project_path.join("chapters");
        if let Ok(entries) = std::fs::read_dir(&chapters_dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(&path) else { continue };
                let stem = path.file_stem().unwrap().to_string_lossy().to_string();
                for (i, chunk) in content.split("\n\n").enumerate() {
                    if chunk.len() > 50 {
                        let mut metadata = HashMap::new();
                        metadata.insert("chapter".to_string(), stem.clone());
                        metadata.insert("chunk".to_string(), i.to_string());
                        self.add_document(chunk, &format!("chapters/{stem}.md"), "chapter", metadata, Some(format!("ch_{stem}_{i}")));
                    }
                }
            }
        }

        self.build()
    }

    pub fn build(&mut self) -> Result<(), NovelistError> {
        if self.documents.is_empty() {
            return Ok(());
        }
        let contents: Vec<String> = self.documents.values().map(|d| d.content.clone()).collect();
        self.embedder.fit(&contents);

        let ids: Vec<String> = self.documents.keys().cloned().collect();
        for id in ids {
            let embedding = self.embedder.embed(&self.documents[&id].content);
            self.documents.get_mut(&id).unwrap().embedding = Some(embedding);
        }
        self.fitted = true;
        self.save()
    }

    pub fn search(&self, query: &str, top_k: usize, doc_type: Option<&str>) -> Vec<SearchResult> {
        if !self.fitted || self.documents.is_empty() {
            return Vec::new();
        }
        let query_vec = self.embedder.embed(query);

        let mut scored: Vec<(f32, &Document)> = self
            .documents
            .values()
            .filter(|d| doc_type.map(|t| d.doc_type == t).unwrap_or(true))
            .filter_map(|d| d.embedding.as_ref().map(|e| (cosine_similarity(&query_vec, e), d)))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, (score, doc))| SearchResult { document: doc.clone(), score, rank: i + 1 })
            .collect()
    }

    /// Search using the agent-specific doc_type priority list, returning
    /// up to 5 re-ranked results.
    pub fn search_for_agent(&self, query: &str, agent_type: &str) -> Vec<SearchResult> {
        let priority: &[&str] = match agent_type {
            "director" => &["bible", "fact", "foreshadowing", "chapter"],
            "writer" => &["bible", "character", "fact", "chapter"],
            "checker" => &["fact", "character", "bible"],
            _ => &["bible", "character", "fact"],
        };

        let mut all_results: Vec<SearchResult> =
            priority.iter().flat_map(|doc_type| self.search(query, 3, Some(doc_type))).collect();
        all_results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        all_results.truncate(5);
        all_results
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }
}

fn content_hash(content: &str) -> String {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:012x}", hasher.finish())
}

/// Formats retrieved documents into a prompt-ready context block.
pub struct RagContextBuilder<'a> {
    index: &'a TfIdfIndex,
}

impl<'a> RagContextBuilder<'a> {
    pub fn new(index: &'a TfIdfIndex) -> Self {
        Self { index }
    }

    pub fn build_context(&self, query: &str, agent_type: &str) -> String {
        let results = self.index.search_for_agent(query, agent_type);
        if results.is_empty() {
            return String::new();
        }

        let mut by_type: HashMap<&str, Vec<&SearchResult>> = HashMap::new();
        for r in &results {
            by_type.entry(r.document.doc_type.as_str()).or_default().push(r);
        }

        let mut lines = vec!["## Retrieved Context".to_string(), String::new()];
        for (doc_type, docs) in by_type {
            lines.push(format!("### {} References", capitalize(doc_type)));
            for r in docs {
                let truncated: String = r.document.content.chars().take(200).collect();
                lines.push(format!("- [{}] {}...", r.document.source, truncated));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn embedding_is_l2_normalized() {
        let mut embedder = SimpleEmbedding::default();
        embedder.fit(&["the quick brown fox".to_string(), "the lazy dog sleeps".to_string()]);
        let vec = embedder.embed("the quick fox");
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!(norm <= 1.0001, "norm should be at most 1.0, got {norm}");
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let mut embedder = SimpleEmbedding::default();
        embedder.fit(&["something".to_string()]);
        let vec = embedder.embed("");
        assert!(vec.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn search_respects_doc_type_filter() {
        let dir = tempdir().unwrap();
        let mut index = TfIdfIndex::new(dir.path(), "test");
        index.add_document("a castle on a hill", "bible.md", "bible", HashMap::new(), None);
        index.add_document("a character named Mira", "characters/mira.json", "character", HashMap::new(), None);
        index.build().unwrap();

        let results = index.search("castle", 5, Some("character"));
        assert!(results.is_empty());
        let results = index.search("castle", 5, Some("bible"));
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn unfitted_index_returns_no_results() {
        let dir = tempdir().unwrap();
        let index = TfIdfIndex::new(dir.path(), "test");
        assert!(index.search("anything", 5, None).is_empty());
    }

    #[test]
    fn search_for_agent_uses_priority_list() {
        let dir = tempdir().unwrap();
        let mut index = TfIdfIndex::new(dir.path(), "test");
        index.add_document("facts about the war", "memory/facts.json", "fact", HashMap::new(), None);
        index.add_document("bible notes about the war", "bible.md", "bible", HashMap::new(), None);
        index.build().unwrap();

        let results = index.search_for_agent("war", "checker");
        assert!(!results.is_empty());
    }

    #[test]
    fn director_ranks_bible_ahead_of_character_for_shared_term() {
        let dir = tempdir().unwrap();
        let mut index = TfIdfIndex::new(dir.path(), "test");
        index.add_document("a castle on a hill", "bible.md", "bible", HashMap::new(), None);
        index.add_document("a character born near a castle", "characters/mira.json", "character", HashMap::new(), None);
        index.add_document("chapter one begins", "chapters/chapter_001.md", "chapter", HashMap::new(), None);
        index.build().unwrap();

        let results = index.search_for_agent("castle", "director");
        assert!(!results.is_empty());
        assert_eq!(results[0].document.doc_type, "bible");
    }
}
