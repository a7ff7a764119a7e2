//! CLI interface for the CV extractor

use crate::config::OutputFormat;
use crate::input::file_detector::FileType;
use crate::ml::ModelKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cv-extractor")]
#[command(about = "Extract and normalize French CVs into canonical records")]
#[command(long_about = "Read .docx and .pdf CVs, extract contact, experiences, formations and skills with rules and optional learned models, and emit a canonical JSON record")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract one CV
    Extract {
        /// Path to the CV (.docx or .pdf)
        file: PathBuf,

        /// Output format (defaults to [output].default_format)
        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        /// Save the canonical JSON record into this directory
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Never consult the LLM oracle
        #[arg(long)]
        no_oracle: bool,
    },

    /// Extract every .docx and .pdf of a directory
    Batch {
        /// Directory holding the CVs
        dir: PathBuf,

        /// Where the JSON records go (defaults to [output].output_dir, then the input directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// LLM oracle commands
    Oracle {
        #[command(subcommand)]
        action: OracleAction,
    },

    /// Model management commands
    Models {
        #[command(subcommand)]
        action: ModelAction,
    },

    /// Show or reset configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum OracleAction {
    /// Check that the inference server answers and has the configured model
    Status,
}

#[derive(Subcommand)]
pub enum ModelAction {
    /// List installed models
    List,

    /// Download a model from the Hugging Face hub
    Download {
        /// Hugging Face repo ID
        repo_id: String,

        /// Which component the model serves
        #[arg(short, long, value_enum)]
        kind: ModelKind,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// Supported documents directly under `dir`, sorted by path.
pub fn collect_documents(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut documents = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FileType::from_path(&path).is_supported() {
            documents.push(path);
        }
    }
    documents.sort();
    Ok(documents)
}
