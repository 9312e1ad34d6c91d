//! Novelist - AI novel writing assistant
//!
//! Usage:
//!   novelist init <path>               Create new project
//!   novelist write -d "description"    Generate a scene
//!   novelist status                    Show project status

use clap::Parser;
use novelist::cli::{execute, Cli};
use novelist::init::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();
    execute(&cli.command).await
}
