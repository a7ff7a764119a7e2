//! Configuration management for the CV extractor

use crate::error::{CvError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelConfig,
    pub oracle: OracleConfig,
    pub validation: ValidationConfig,
    pub lexicons: LexiconConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    /// Directory holding the token-classification model (config.json, tokenizer.json, model.safetensors).
    pub labeler_path: Option<PathBuf>,
    /// Directory holding the static embedding model plus the section head.
    pub classifier_path: Option<PathBuf>,
    pub use_gpu: bool,
    pub section_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub temperature: f32,
    pub max_content_chars: usize,
}

/// Completeness contract checked after the primary extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub require_identity: bool,
    pub require_background: bool,
    pub require_technical_skills: bool,
}

/// Curated lists merged with the built-in lexicons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LexiconConfig {
    pub extra_companies: Vec<String>,
    pub extra_schools: Vec<String>,
    pub extra_technical_skills: Vec<String>,
    pub extra_functional_skills: Vec<String>,
    pub extra_noise_words: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub default_format: OutputFormat,
    pub output_dir: Option<PathBuf>,
    pub pretty: bool,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
    Markdown,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let models_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cv-extractor")
            .join("models");

        Self {
            models_dir,
            labeler_path: None,
            classifier_path: None,
            use_gpu: false,
            section_threshold: 0.5,
        }
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434/api/generate".to_string(),
            model: "mistral".to_string(),
            timeout_secs: 300,
            max_retries: 3,
            retry_delay_secs: 2,
            temperature: 0.3,
            max_content_chars: 12_000,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_identity: true,
            require_background: true,
            require_technical_skills: true,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_format: OutputFormat::Json,
            output_dir: None,
            pretty: true,
            color_output: true,
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file on first use.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Config = toml::from_str(&content)
                .map_err(|e| CvError::Config(format!("Failed to parse config: {}", e)))?;
            config.check()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| CvError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("cv-extractor")
            .join("config.toml")
    }

    pub fn models_dir(&self) -> &PathBuf {
        &self.models.models_dir
    }

    pub fn ensure_models_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.models.models_dir)?;
        Ok(())
    }

    /// Labeler directory: explicit path first, then `<models_dir>/labeler` when present.
    pub fn labeler_dir(&self) -> Option<PathBuf> {
        self.models
            .labeler_path
            .clone()
            .or_else(|| Some(self.models.models_dir.join("labeler")).filter(|p| p.exists()))
    }

    pub fn classifier_dir(&self) -> Option<PathBuf> {
        self.models
            .classifier_path
            .clone()
            .or_else(|| Some(self.models.models_dir.join("classifier")).filter(|p| p.exists()))
    }

    fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.models.section_threshold) {
            return Err(CvError::Config(format!(
                "models.section_threshold must be within [0, 1], got {}",
                self.models.section_threshold
            )));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(CvError::Config("oracle.timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_oracle_settings() {
        let config = Config::default();
        assert!(!config.oracle.enabled);
        assert_eq!(config.oracle.endpoint, "http://localhost:11434/api/generate");
        assert_eq!(config.oracle.model, "mistral");
        assert_eq!(config.oracle.timeout_secs, 300);
        assert_eq!(config.oracle.max_retries, 3);
        assert!((config.oracle.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [oracle]
            enabled = true
            model = "llama3"

            [lexicons]
            extra_companies = ["Doctolib"]
            "#,
        )
        .unwrap();
        assert!(config.oracle.enabled);
        assert_eq!(config.oracle.model, "llama3");
        assert_eq!(config.oracle.max_retries, 3);
        assert_eq!(config.lexicons.extra_companies, vec!["Doctolib"]);
        assert!(config.validation.require_technical_skills);
    }

    #[test]
    fn test_load_from_writes_default_then_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let first = Config::load_from(&path).unwrap();
        assert!(path.exists());
        let second = Config::load_from(&path).unwrap();
        assert_eq!(first.oracle.endpoint, second.oracle.endpoint);
        assert_eq!(second.output.default_format, OutputFormat::Json);
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[models]\nsection_threshold = 1.5\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ConfigError);
    }
}
