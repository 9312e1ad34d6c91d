//! Command line interface: `init`, `write`, `status`.
//!
//! Grounded on original_source's `cli/main.py`. The Python argparse
//! surface maps directly onto three `clap` subcommands.

use crate::agents::SceneRequest;
use crate::config::ConfigManager;
use crate::memory::{BibleLoader, CharacterLoader, EpisodicMemoryManager, FactsManager, ForeshadowingManager};
use crate::pipeline::ScenePipeline;
use crate::project::{ChapterManager, ProjectManager};
use crate::retriever::TfIdfIndex;
use crate::session::Session;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "novelist", version, about = "AI novel writing assistant", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new project
    Init {
        /// Project directory path
        path: PathBuf,
        /// Project name (default: directory name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Generate a scene
    Write {
        /// Project path
        #[arg(long, short, default_value = ".")]
        project: PathBuf,
        /// Scene description / user intention
        #[arg(long, short)]
        description: String,
        /// Target word count
        #[arg(long, short, default_value = "1000")]
        words: u32,
        /// Chapter number
        #[arg(long, short, default_value = "1")]
        chapter: u32,
        /// Scene number within the chapter
        #[arg(long, default_value = "1")]
        scene: u32,
        /// POV character id
        #[arg(long)]
        pov: Option<String>,
        /// Disable the Editor revision pass
        #[arg(long)]
        no_revision: bool,
    },
    /// Show project status
    Status {
        /// Project path
        #[arg(long, short, default_value = ".")]
        project: PathBuf,
    },
}

pub async fn execute(command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { path, name } => cmd_init(path, name.as_deref()),
        Commands::Write { project, description, words, chapter, scene, pov, no_revision } => {
            cmd_write(project, description, *words, *chapter, *scene, pov.as_deref(), !no_revision).await
        }
        Commands::Status { project } => cmd_status(project),
    }
}

fn cmd_init(path: &std::path::Path, name: Option<&str>) -> anyhow::Result<()> {
    let project_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    match ProjectManager::create(path, name) {
        Ok(_) => {
            println!("{} Created project: {}", "OK".green().bold(), project_path.display());
            println!("  Name: {}", name.unwrap_or_else(|| path.file_name().and_then(|n| n.to_str()).unwrap_or("project")));
            println!("\nNext steps:");
            println!("  1. Edit {}/bible.md", project_path.display());
            println!("  2. Add characters to {}/characters/", project_path.display());
            println!("  3. Run: novelist write --project {}", project_path.display());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn cmd_status(project_path: &std::path::Path) -> anyhow::Result<()> {
    let issues = ProjectManager::validate(project_path);
    let is_valid = issues.is_empty();

    println!("Project: {}", project_path.display());
    println!("Status: {}", if is_valid { "Valid".green().to_string() } else { "Invalid".red().to_string() });

    if !issues.is_empty() {
        println!("\nIssues:");
        for issue in &issues {
            println!("  - {issue}");
        }
    }

    if is_valid {
        match BibleLoader::load(project_path) {
            Ok(_) => println!("\nBible loaded"),
            Err(e) => println!("\nBible: Error - {e}"),
        }

        let chars = CharacterLoader::list_characters(project_path);
        println!("\nCharacters ({}):", chars.len());
        for id in &chars {
            println!("  - {id}");
        }

        let chapters = ChapterManager::list_chapters(project_path);
        println!("\nChapters ({}):", chapters.len());
        for ch in &chapters {
            println!("  - Chapter {ch}");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_write(
    project_path: &std::path::Path,
    description: &str,
    words: u32,
    chapter: u32,
    scene_num: u32,
    pov: Option<&str>,
    enable_revision: bool,
) -> anyhow::Result<()> {
    let project_path = project_path.canonicalize().unwrap_or_else(|_| project_path.to_path_buf());
    let issues = ProjectManager::validate(&project_path);
    if !issues.is_empty() {
        println!("{} Invalid project:", "Error:".red().bold());
        for issue in &issues {
            println!("  - {issue}");
        }
        std::process::exit(1);
    }

    let config = ConfigManager::load(&project_path)?;
    let bible = BibleLoader::load(&project_path)?;
    let bible_raw = BibleLoader::load_raw(&project_path)?;
    let characters = CharacterLoader::load_all(&project_path);
    let facts = FactsManager::new(&project_path, 50);
    let episodic = EpisodicMemoryManager::new(&project_path, 5);
    let foreshadowing = ForeshadowingManager::new(&project_path);

    let mut index = TfIdfIndex::new(&project_path, "default");
    if !index.is_fitted() {
        index.index_project()?;
        index.build()?;
    }

    let mut session = Session::new(&project_path, 50)?;

    println!("Generating scene...");
    println!("  Project: {}", project_path.display());
    println!("  Description: {description}");
    println!("  Words: {words}");

    let pipeline = ScenePipeline::new(&project_path, config, enable_revision)?;
    let request = SceneRequest {
        user_intention: description.to_string(),
        chapter,
        scene_num,
        pov_character: pov.map(String::from),
        required_events: Vec::new(),
        mood: None,
    };

    let trace = pipeline
        .generate_scene(&mut session, &bible, &bible_raw, &characters, &facts, &episodic, &foreshadowing, &index, request, words)
        .await?;

    println!("\n{}", "=".repeat(60));
    println!("{}", trace.final_text);
    println!("{}", "=".repeat(60));
    println!("\n{} Saved to chapter {chapter}", "OK".green().bold());
    println!(
        "Issues found: {}, Revision applied: {}, Duration: {}ms",
        trace.issues_found, trace.revision_made, trace.total_duration_ms
    );

    Ok(())
}
