//! cv-extractor: French CV extraction and normalization

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use cv_extractor::cli::{self, Cli, Commands, ConfigAction, ModelAction, OracleAction};
use cv_extractor::config::Config;
use cv_extractor::llm::OracleClient;
use cv_extractor::ml::ModelManager;
use cv_extractor::output::{formatter_for, ExtractionReport};
use cv_extractor::processing::PipelineBuilder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);
    let config = match Config::load_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command, config, &config_path).await {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

async fn run_command(command: Commands, config: Config, config_path: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Extract {
            file,
            format,
            save,
            no_oracle,
        } => {
            let mut builder = PipelineBuilder::from_config(&config);
            if no_oracle {
                builder = builder.without_oracle();
            }
            let pipeline = builder.build()?;

            let outcome = pipeline
                .process(&file)
                .await
                .with_context(|| format!("Failed to extract {}", file.display()))?;
            let report = ExtractionReport::new(&outcome);

            let format = format.unwrap_or(config.output.default_format);
            println!("{}", formatter_for(format, &config.output).format(&report)?);

            if !outcome.summary.valid {
                warn!("Incomplete record, missing: {}", outcome.summary.missing.join(", "));
            }
            if let Some(dir) = save.or_else(|| config.output.output_dir.clone()) {
                let path = report.save(&dir, config.output.pretty)?;
                println!("{} {}", "Saved".green(), path.display());
            }
        }

        Commands::Batch { dir, output_dir } => {
            let documents = cli::collect_documents(&dir)
                .with_context(|| format!("Failed to list {}", dir.display()))?;
            if documents.is_empty() {
                println!("No .docx or .pdf file in {}", dir.display());
                return Ok(());
            }
            let output_dir = output_dir
                .or_else(|| config.output.output_dir.clone())
                .unwrap_or_else(|| dir.clone());

            let pipeline = PipelineBuilder::from_config(&config).build()?;
            info!("Extracting {} documents into {}", documents.len(), output_dir.display());

            let progress = ProgressBar::new(documents.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")?.progress_chars("=> "),
            );

            let mut failures: Vec<(PathBuf, String)> = Vec::new();
            let mut incomplete = 0usize;
            for path in &documents {
                progress.set_message(file_label(path));
                match pipeline.process(path).await {
                    Ok(outcome) => {
                        if !outcome.summary.valid {
                            incomplete += 1;
                        }
                        let report = ExtractionReport::new(&outcome);
                        if let Err(e) = report.save(&output_dir, config.output.pretty) {
                            failures.push((path.clone(), e.to_string()));
                        }
                    }
                    Err(e) => {
                        progress.println(format!("{} {}: {}", "✗".red(), path.display(), e));
                        failures.push((path.clone(), e.to_string()));
                    }
                }
                progress.inc(1);
            }
            progress.finish_and_clear();

            let succeeded = documents.len() - failures.len();
            println!(
                "{} {}/{} extracted ({} incomplete) into {}",
                "Done".green().bold(),
                succeeded,
                documents.len(),
                incomplete,
                output_dir.display()
            );
            for (path, reason) in &failures {
                println!("  {} {}: {}", "✗".red(), path.display(), reason);
            }
        }

        Commands::Oracle { action } => match action {
            OracleAction::Status => {
                let client = OracleClient::new(config.oracle.clone())?;
                let status = client.status().await?;
                println!("Endpoint: {}", config.oracle.endpoint);
                println!("Enabled: {}", config.oracle.enabled);
                if status.reachable {
                    println!("Server: {}", "reachable".green());
                } else {
                    println!("Server: {}", "unreachable".red());
                }
                if status.model_available {
                    println!("Model '{}': {}", config.oracle.model, "installed".green());
                } else {
                    println!("Model '{}': {}", config.oracle.model, "missing".yellow());
                }
                for model in &status.models {
                    println!("  • {}", model);
                }
            }
        },

        Commands::Models { action } => {
            let manager = ModelManager::new(config.models_dir().clone());
            match action {
                ModelAction::List => {
                    let installed = manager.installed().await?;
                    println!("Models directory: {}", manager.models_dir().display());
                    if installed.is_empty() {
                        println!("No model installed. Get one with:");
                        println!("   cv-extractor models download <repo-id> --kind labeler");
                    }
                    for model in installed {
                        let state = if model.complete {
                            "ready".green()
                        } else {
                            "incomplete".yellow()
                        };
                        println!("  • {} [{}] {}", model.kind, state, model.path.display());
                        println!("    {}", model.files.join(", "));
                    }
                }
                ModelAction::Download { repo_id, kind } => {
                    config.ensure_models_dir()?;
                    let path = manager.download(&repo_id, kind).await?;
                    println!("{} {} model in {}", "Installed".green(), kind, path.display());
                }
            }
        }

        Commands::Config { action } => match action {
            Some(ConfigAction::Show) | None => {
                println!("# {}", config_path.display());
                println!("{}", toml::to_string_pretty(&config)?);
            }
            Some(ConfigAction::Reset) => {
                Config::default().save_to(config_path)?;
                println!("{} {}", "Configuration reset:".green(), config_path.display());
            }
            Some(ConfigAction::Path) => {
                println!("{}", config_path.display());
            }
        },
    }

    Ok(())
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default()
}
