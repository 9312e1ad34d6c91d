//! The five-agent swarm: Director, Writer, ContinuityChecker, StyleEditor,
//! Committer. Each one wraps a `Provider` and is otherwise stateless —
//! shared resources (Bible, facts, characters, episodic memory) are
//! passed in by reference rather than owned, so the pipeline controls
//! their lifetime.

pub mod checker;
pub mod committer;
pub mod director;
pub mod editor;
pub mod types;
pub mod writer;

pub use checker::ContinuityCheckerAgent;
pub use committer::CommitterAgent;
pub use director::{DirectorAgent, SceneRequest};
pub use editor::StyleEditorAgent;
pub use types::{CommitReport, Issue, SceneSpec};
pub use writer::WriterAgent;
