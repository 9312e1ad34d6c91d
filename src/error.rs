use thiserror::Error;

/// Crate-wide error type.
///
/// Variants line up with the stage taxonomy: config/schema errors are
/// fatal at startup, transport/auth/rate-limit/protocol errors originate
/// in the provider layer and are recoverable depending on pipeline stage,
/// parse/generation/commit errors originate in agent and memory code.
#[derive(Debug, Error)]
pub enum NovelistError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl NovelistError {
    /// Whether the pipeline may log and continue past this error
    /// instead of aborting the whole scene generation run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NovelistError::Transport(_)
                | NovelistError::RateLimit(_)
                | NovelistError::Protocol(_)
                | NovelistError::Parse(_)
        )
    }
}
