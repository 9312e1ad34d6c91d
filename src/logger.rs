//! Execution logging: JSON-lines run logs plus cross-run analysis.
//!
//! Grounded on original_source's `core/logger.py`. Large prompt/output
//! strings are truncated to head+tail before hitting disk so a run log
//! stays legible without losing the shape of very long generations.

use crate::error::NovelistError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const BUFFER_SIZE: usize = 10;
const TRUNCATE_THRESHOLD: usize = 10_000;
const TRUNCATE_HEAD: usize = 5_000;
const TRUNCATE_TAIL: usize = 1_000;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogMetrics {
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub duration_ms: u64,
}

pub struct ExecutionLogger {
    run_id: String,
    log_file: PathBuf,
    buffer: Vec<Value>,
}

impl ExecutionLogger {
    pub fn new(project_path: &Path) -> Result<Self, NovelistError> {
        let runs_dir = project_path.join("runs");
        std::fs::create_dir_all(&runs_dir)?;

        let run_id = format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &Uuid::new_v4().to_string()[..8]);
        let log_file = runs_dir.join(format!("{run_id}.jsonl"));

        Ok(Self { run_id, log_file, buffer: Vec::new() })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &mut self,
        agent: &str,
        operation: &str,
        prompt: Option<&str>,
        output: Option<&str>,
        metrics: LogMetrics,
        error: Option<&str>,
    ) -> Result<(), NovelistError> {
        let mut entry = Map::new();
        entry.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
        entry.insert("run_id".to_string(), Value::String(self.run_id.clone()));
        entry.insert("agent".to_string(), Value::String(agent.to_string()));
        entry.insert("operation".to_string(), Value::String(operation.to_string()));
        entry.insert("metrics".to_string(), serde_json::to_value(&metrics)?);

        if let Some(prompt) = prompt {
            entry.insert("prompt_length".to_string(), Value::from(prompt.chars().count()));
            entry.insert("prompt".to_string(), Value::String(truncate_for_log(prompt)));
        }
        if let Some(output) = output {
            entry.insert("output_length".to_string(), Value::from(output.chars().count()));
            entry.insert("output".to_string(), Value::String(truncate_for_log(output)));
        }

        if let Some(error) = error {
            entry.insert("error".to_string(), Value::String(error.to_string()));
            entry.insert("status".to_string(), Value::String("error".to_string()));
        } else {
            entry.insert("status".to_string(), Value::String("success".to_string()));
        }

        self.buffer.push(Value::Object(entry));
        if self.buffer.len() >= BUFFER_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), NovelistError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_file)?;
        for entry in self.buffer.drain(..) {
            writeln!(file, "{}", serde_json::to_string(&entry)?)?;
        }
        Ok(())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn get_stats(&mut self) -> Result<RunStats, NovelistError> {
        self.flush()?;
        Ok(compute_stats(&self.run_id, &read_entries(&self.log_file)))
    }
}

impl Drop for ExecutionLogger {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgentStats {
    pub calls: u64,
    pub tokens: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub run_id: String,
    pub total_entries: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub total_time_ms: u64,
    pub by_agent: HashMap<String, AgentStats>,
}

fn truncate_for_log(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= TRUNCATE_THRESHOLD {
        return text.to_string();
    }
    let head: String = chars[..TRUNCATE_HEAD].iter().collect();
    let tail: String = chars[chars.len() - TRUNCATE_TAIL..].iter().collect();
    format!("{head}... [truncated] ...{tail}")
}

fn read_entries(log_file: &Path) -> Vec<Value> {
    let Ok(raw) = std::fs::read_to_string(log_file) else {
        return Vec::new();
    };
    raw.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
}

fn compute_stats(run_id: &str, entries: &[Value]) -> RunStats {
    let mut stats = RunStats { run_id: run_id.to_string(), ..Default::default() };
    for entry in entries {
        stats.total_entries += 1;
        let metrics = entry.get("metrics");
        let tokens = metrics.and_then(|m| m.get("total_tokens")).and_then(Value::as_u64).unwrap_or(0);
        let cost = metrics.and_then(|m| m.get("cost")).and_then(Value::as_f64).unwrap_or(0.0);
        let duration = metrics.and_then(|m| m.get("duration_ms")).and_then(Value::as_u64).unwrap_or(0);

        stats.total_tokens += tokens;
        stats.total_cost += cost;
        stats.total_time_ms += duration;

        let agent = entry.get("agent").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let agent_stats = stats.by_agent.entry(agent).or_default();
        agent_stats.calls += 1;
        agent_stats.tokens += tokens;
        if entry.get("status").and_then(Value::as_str) == Some("error") {
            agent_stats.errors += 1;
        }
    }
    stats
}

/// Listing/comparison over past runs, read from `runs/*.jsonl`.
pub struct RunAnalyzer {
    runs_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunListing {
    pub run_id: String,
    pub timestamp: String,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct RunComparison {
    pub run1: RunStats,
    pub run2: RunStats,
    pub token_delta: i64,
    pub cost_delta: f64,
    pub time_delta_ms: i64,
}

impl RunAnalyzer {
    pub fn new(project_path: &Path) -> Self {
        Self { runs_dir: project_path.join("runs") }
    }

    pub fn list_runs(&self) -> Vec<RunListing> {
        let Ok(entries) = std::fs::read_dir(&self.runs_dir) else {
            return Vec::new();
        };

        let mut runs: Vec<RunListing> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|e| {
                let path = e.path();
                let raw = std::fs::read_to_string(&path).ok()?;
                let first_line = raw.lines().next()?;
                let first: Value = serde_json::from_str(first_line).ok()?;
                let run_id = first
                    .get("run_id")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| path.file_stem().unwrap_or_default().to_string_lossy().to_string());
                let timestamp = first.get("timestamp").and_then(Value::as_str).unwrap_or_default().to_string();
                Some(RunListing { run_id, timestamp, file: path })
            })
            .collect();

        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        runs
    }

    fn load_run(&self, run_id: &str) -> Vec<Value> {
        let direct = self.runs_dir.join(format!("{run_id}.jsonl"));
        if direct.exists() {
            return read_entries(&direct);
        }
        let Ok(entries) = std::fs::read_dir(&self.runs_dir) else {
            return Vec::new();
        };
        let matched = entries
            .filter_map(|e| e.ok())
            .find(|e| e.path().to_string_lossy().contains(run_id));
        matched.map(|e| read_entries(&e.path())).unwrap_or_default()
    }

    pub fn compare_runs(&self, run_id1: &str, run_id2: &str) -> RunComparison {
        let stats1 = compute_stats(run_id1, &self.load_run(run_id1));
        let stats2 = compute_stats(run_id2, &self.load_run(run_id2));

        RunComparison {
            token_delta: stats2.total_tokens as i64 - stats1.total_tokens as i64,
            cost_delta: stats2.total_cost - stats1.total_cost,
            time_delta_ms: stats2.total_time_ms as i64 - stats1.total_time_ms as i64,
            run1: stats1,
            run2: stats2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_entries_are_flushed_and_readable() {
        let dir = tempdir().unwrap();
        let mut logger = ExecutionLogger::new(dir.path()).unwrap();
        logger
            .log("writer", "generate", Some("prompt text"), Some("output text"), LogMetrics { total_tokens: 120, cost: Some(0.01), duration_ms: 500 }, None)
            .unwrap();
        logger.flush().unwrap();

        let stats = logger.get_stats().unwrap();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.total_tokens, 120);
        assert_eq!(stats.by_agent.get("writer").unwrap().calls, 1);
    }

    #[test]
    fn long_prompt_is_truncated_with_markers() {
        let long_text = "a".repeat(20_000);
        let truncated = truncate_for_log(&long_text);
        assert!(truncated.contains("[truncated]"));
        assert!(truncated.len() < long_text.len());
    }

    #[test]
    fn run_analyzer_lists_runs_newest_first() {
        let dir = tempdir().unwrap();
        let mut first = ExecutionLogger::new(dir.path()).unwrap();
        first.log("director", "design", None, None, LogMetrics::default(), None).unwrap();
        first.flush().unwrap();

        let analyzer = RunAnalyzer::new(dir.path());
        let runs = analyzer.list_runs();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn error_entries_increment_agent_error_count() {
        let dir = tempdir().unwrap();
        let mut logger = ExecutionLogger::new(dir.path()).unwrap();
        logger.log("checker", "check", None, None, LogMetrics::default(), Some("boom")).unwrap();
        let stats = logger.get_stats().unwrap();
        assert_eq!(stats.by_agent.get("checker").unwrap().errors, 1);
    }
}
