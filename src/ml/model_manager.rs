//! Fetching learned models from the Hugging Face hub and listing installed ones

use crate::error::{CvError, Result};
use hf_hub::api::tokio::Api;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

/// The two learned components the pipeline can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Labeler,
    Classifier,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Labeler, ModelKind::Classifier];

    /// Subdirectory of `models_dir` the pipeline looks in.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ModelKind::Labeler => "labeler",
            ModelKind::Classifier => "classifier",
        }
    }

    pub fn required_files(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Labeler => &["config.json", "tokenizer.json", "model.safetensors"],
            ModelKind::Classifier => &[
                "config.json",
                "tokenizer.json",
                "model.safetensors",
                "textcat_head.safetensors",
                "textcat_labels.json",
            ],
        }
    }

    /// Fetched when the repository has them.
    fn optional_files(&self) -> &'static [&'static str] {
        match self {
            ModelKind::Labeler => &["tokenizer_config.json", "special_tokens_map.json", "vocab.txt"],
            ModelKind::Classifier => &["tokenizer_config.json"],
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstalledModel {
    pub kind: ModelKind,
    pub path: PathBuf,
    pub files: Vec<String>,
    pub complete: bool,
}

pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    pub fn new(models_dir: PathBuf) -> Self {
        Self { models_dir }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn model_dir(&self, kind: ModelKind) -> PathBuf {
        self.models_dir.join(kind.dir_name())
    }

    /// Download every file `kind` needs from `repo_id` into `<models_dir>/<kind>`.
    pub async fn download(&self, repo_id: &str, kind: ModelKind) -> Result<PathBuf> {
        let api = Api::new().map_err(|e| CvError::ModelLoad(format!("Failed to initialize HF API: {}", e)))?;
        let repo = api.repo(hf_hub::Repo::model(repo_id.to_string()));

        let target = self.model_dir(kind);
        fs::create_dir_all(&target).await?;
        info!("Downloading {} model from {}", kind, repo_id);

        for file in kind.required_files() {
            let cached = repo
                .get(file)
                .await
                .map_err(|e| CvError::ModelLoad(format!("Failed to download {} from {}: {}", file, repo_id, e)))?;
            fs::copy(&cached, target.join(file)).await?;
            debug!("Fetched {}", file);
        }
        for file in kind.optional_files() {
            match repo.get(file).await {
                Ok(cached) => {
                    fs::copy(&cached, target.join(file)).await?;
                    debug!("Fetched {}", file);
                }
                Err(e) => debug!("Skipping optional {}: {}", file, e),
            }
        }

        info!("{} model installed in {}", kind, target.display());
        Ok(target)
    }

    /// Model directories present under `models_dir`, complete or not.
    pub async fn installed(&self) -> Result<Vec<InstalledModel>> {
        let mut models = Vec::new();
        for kind in ModelKind::ALL {
            let path = self.model_dir(kind);
            if !fs::try_exists(&path).await? {
                continue;
            }

            let mut files = Vec::new();
            let mut entries = fs::read_dir(&path).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    files.push(entry.file_name().to_string_lossy().to_string());
                }
            }
            files.sort();

            let complete = kind.required_files().iter().all(|f| files.iter().any(|have| have == f));
            models.push(InstalledModel {
                kind,
                path,
                files,
                complete,
            });
        }
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_installed_reports_completeness() {
        let temp_dir = TempDir::new().unwrap();
        let manager = ModelManager::new(temp_dir.path().to_path_buf());
        assert!(manager.installed().await.unwrap().is_empty());

        let labeler = manager.model_dir(ModelKind::Labeler);
        std::fs::create_dir_all(&labeler).unwrap();
        for file in ModelKind::Labeler.required_files() {
            std::fs::write(labeler.join(file), b"{}").unwrap();
        }
        let classifier = manager.model_dir(ModelKind::Classifier);
        std::fs::create_dir_all(&classifier).unwrap();
        std::fs::write(classifier.join("config.json"), b"{}").unwrap();

        let installed = manager.installed().await.unwrap();
        assert_eq!(installed.len(), 2);
        assert_eq!(installed[0].kind, ModelKind::Labeler);
        assert!(installed[0].complete);
        assert_eq!(installed[0].files, vec!["config.json", "model.safetensors", "tokenizer.json"]);
        assert_eq!(installed[1].kind, ModelKind::Classifier);
        assert!(!installed[1].complete);
    }

    #[test]
    fn test_kind_directories() {
        assert_eq!(ModelKind::Labeler.to_string(), "labeler");
        assert_eq!(ModelKind::Classifier.dir_name(), "classifier");
        assert!(ModelKind::Classifier.required_files().contains(&"textcat_head.safetensors"));
    }
}
