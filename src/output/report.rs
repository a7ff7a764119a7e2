//! Extraction report: the canonical record plus run metadata

use crate::error::Result;
use crate::processing::normalizer::CanonicalCv;
use crate::processing::pipeline::ExtractionOutcome;
use crate::processing::validator::ValidationSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub source: PathBuf,
    pub strategy: String,
    pub validation: ValidationSummary,
    pub generated_at: DateTime<Utc>,
    pub cv: CanonicalCv,
}

impl ExtractionReport {
    pub fn new(outcome: &ExtractionOutcome) -> Self {
        Self {
            source: outcome.source.path.clone(),
            strategy: outcome.summary.strategy.clone(),
            validation: outcome.summary.clone(),
            generated_at: Utc::now(),
            cv: outcome.canonical.clone(),
        }
    }

    /// `CV_<Nom_Prenom>.json` with spaces and slashes as `_`; `CV_Inconnu.json` without a name.
    pub fn file_name(&self) -> String {
        let stem = self
            .cv
            .contact
            .nom
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| {
                name.split(|c: char| c.is_whitespace() || c == '/' || c == '\\')
                    .filter(|part| !part.is_empty())
                    .collect::<Vec<_>>()
                    .join("_")
            })
            .unwrap_or_else(|| "Inconnu".to_string());
        format!("CV_{}.json", stem)
    }

    /// Write the canonical record as JSON under `dir`; returns the file path.
    pub fn save(&self, dir: &Path, pretty: bool) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let content = if pretty {
            serde_json::to_string_pretty(&self.cv)?
        } else {
            serde_json::to_string(&self.cv)?
        };
        std::fs::write(&path, content)?;
        Ok(path)
    }
}
