//! The extraction pipeline: reader, segmentation, entities, parsing,
//! validation with fallbacks, normalization.

use crate::config::Config;
use crate::error::Result;
use crate::input::manager::InputManager;
use crate::llm::oracle::OracleClient;
use crate::ml::labeler::LazyLabeler;
use crate::ml::textcat::LazySectionClassifier;
use crate::processing::document::{RawText, SourceDescriptor};
use crate::processing::lexicon::Lexicons;
use crate::processing::ner::{HybridRecognizer, SectionClassifier};
use crate::processing::normalizer::{normalize_with, CanonicalCv};
use crate::processing::parser::assemble_record;
use crate::processing::record::CvRecord;
use crate::processing::segmenter::{KeywordSectionClassifier, Segmenter};
use crate::processing::validator::{FallbackChain, LearnedOnlyStrategy, OracleStrategy, ValidationSummary, Validator};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Everything one run produces for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub canonical: CanonicalCv,
    pub record: CvRecord,
    pub summary: ValidationSummary,
    pub source: SourceDescriptor,
}

pub struct PipelineBuilder {
    config: Config,
    lexicons: Option<Arc<Lexicons>>,
    use_models: bool,
    use_oracle: bool,
}

impl PipelineBuilder {
    pub fn from_config(config: &Config) -> Self {
        Self {
            config: config.clone(),
            lexicons: None,
            use_models: true,
            use_oracle: config.oracle.enabled,
        }
    }

    /// Use these lexicons instead of the built-ins merged with `[lexicons]`.
    pub fn with_lexicons(mut self, lexicons: Arc<Lexicons>) -> Self {
        self.lexicons = Some(lexicons);
        self
    }

    /// Keyword classifier and lexicon recognizer only.
    pub fn without_models(mut self) -> Self {
        self.use_models = false;
        self
    }

    pub fn without_oracle(mut self) -> Self {
        self.use_oracle = false;
        self
    }

    /// Wire the stages. Models are not read here; they load on first use.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config;
        let lexicons = match self.lexicons {
            Some(lexicons) => lexicons,
            None => Lexicons::with_extras(&config.lexicons)?,
        };

        let mut classifiers: Vec<Arc<dyn SectionClassifier>> = Vec::new();
        let mut recognizer = HybridRecognizer::new(Arc::clone(&lexicons));
        if self.use_models {
            if let Some(dir) = config.classifier_dir() {
                debug!("Section classifier configured at {}", dir.display());
                classifiers.push(Arc::new(LazySectionClassifier::new(dir)));
            }
            if let Some(dir) = config.labeler_dir() {
                debug!("Sequence labeler configured at {}", dir.display());
                recognizer = recognizer.with_learned(Arc::new(LazyLabeler::new(dir, config.models.use_gpu)));
            }
        }
        classifiers.push(Arc::new(KeywordSectionClassifier::new(Arc::clone(&lexicons))));
        let segmenter = Segmenter::new(classifiers, config.models.section_threshold);
        let recognizer = Arc::new(recognizer);

        let mut fallbacks = FallbackChain::new(Validator::new(config.validation.clone()));
        if recognizer.has_learned() {
            fallbacks = fallbacks.with_strategy(Box::new(LearnedOnlyStrategy::new(
                Arc::clone(&recognizer),
                Arc::clone(&lexicons),
            )));
        }
        if self.use_oracle {
            let client = OracleClient::new(config.oracle.clone())?;
            fallbacks = fallbacks.with_strategy(Box::new(OracleStrategy::new(Arc::new(client))));
        }
        info!("Pipeline ready, fallbacks: {:?}", fallbacks.strategy_names());

        Ok(Pipeline {
            input: InputManager::new(),
            lexicons,
            segmenter,
            recognizer,
            fallbacks,
        })
    }
}

/// One pipeline serves every document of a run.
pub struct Pipeline {
    input: InputManager,
    lexicons: Arc<Lexicons>,
    segmenter: Segmenter,
    recognizer: Arc<HybridRecognizer>,
    fallbacks: FallbackChain,
}

impl Pipeline {
    pub fn builder(config: &Config) -> PipelineBuilder {
        PipelineBuilder::from_config(config)
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    pub fn recognizer(&self) -> &HybridRecognizer {
        &self.recognizer
    }

    pub fn fallback_names(&self) -> Vec<&'static str> {
        self.fallbacks.strategy_names()
    }

    /// Read a document and extract it. Only reader errors are returned.
    pub async fn process(&self, path: &Path) -> Result<ExtractionOutcome> {
        let start = Instant::now();
        let raw = self.input.extract_text(path).await?;
        debug!("read: {:?}", start.elapsed());
        self.process_text(raw).await
    }

    pub async fn process_text(&self, raw: RawText) -> Result<ExtractionOutcome> {
        let text = raw.text();

        let start = Instant::now();
        let sections = self.segmenter.segment(text);
        debug!(
            "segment: {:?}, categories {:?}",
            start.elapsed(),
            sections.categories().collect::<Vec<_>>()
        );

        let start = Instant::now();
        let entities = self.recognizer.entities(text);
        debug!("entities: {:?}", start.elapsed());

        let start = Instant::now();
        let primary = assemble_record(text, &sections, &entities, &self.lexicons);
        debug!("parse: {:?}", start.elapsed());

        let start = Instant::now();
        let (record, summary) = self.fallbacks.run(text, primary).await;
        debug!("validate: {:?}, strategy {}", start.elapsed(), summary.strategy);

        let canonical = normalize_with(&record, &self.lexicons);
        Ok(ExtractionOutcome {
            canonical,
            record,
            summary,
            source: raw.source().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::validator::{BEST_EFFORT, PRIMARY};
    use std::path::PathBuf;

    fn offline_config() -> Config {
        let mut config = Config::default();
        config.models.models_dir = PathBuf::from("/nonexistent/models");
        config
    }

    #[test]
    fn test_builder_without_models_has_no_fallbacks() {
        let pipeline = PipelineBuilder::from_config(&offline_config()).build().unwrap();
        assert!(!pipeline.recognizer().has_learned());
        assert!(pipeline.fallback_names().is_empty());
    }

    #[test]
    fn test_builder_registers_fallbacks_in_order() {
        let mut config = offline_config();
        config.models.labeler_path = Some(PathBuf::from("/nonexistent/labeler"));
        config.oracle.enabled = true;

        let pipeline = PipelineBuilder::from_config(&config).build().unwrap();
        assert_eq!(pipeline.fallback_names(), vec!["learned_only", "oracle"]);

        let pipeline = PipelineBuilder::from_config(&config)
            .without_models()
            .without_oracle()
            .build()
            .unwrap();
        assert!(pipeline.fallback_names().is_empty());
    }

    #[tokio::test]
    async fn test_process_text_complete_cv() {
        let pipeline = PipelineBuilder::from_config(&offline_config()).build().unwrap();
        let text = "Adèle Patarot\nadele.patarot@gmail.com\n\nEXPÉRIENCES PROFESSIONNELLES\n2021-Présent: Lead DevOps chez AWS\n\nCOMPÉTENCES\nPython, Docker, communication\n";
        let outcome = pipeline.process_text(RawText::from_string(text)).await.unwrap();

        assert!(outcome.summary.valid);
        assert_eq!(outcome.summary.strategy, PRIMARY);
        assert_eq!(outcome.canonical.contact.email.as_deref(), Some("adele.patarot@gmail.com"));
        assert_eq!(outcome.canonical.experiences[0].entreprise.as_deref(), Some("AWS"));
    }

    #[tokio::test]
    async fn test_process_text_incomplete_is_best_effort() {
        let pipeline = PipelineBuilder::from_config(&offline_config()).build().unwrap();
        let outcome = pipeline
            .process_text(RawText::from_string("Bonjour"))
            .await
            .unwrap();
        assert!(!outcome.summary.valid);
        assert_eq!(outcome.summary.strategy, BEST_EFFORT);
        assert!(outcome.canonical.experiences.is_empty());
    }
}
