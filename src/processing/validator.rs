//! Completeness contract and the fallback chain run when a record misses it

use crate::config::ValidationConfig;
use crate::error::{CvError, Result};
use crate::llm::oracle::OracleClient;
use crate::processing::lexicon::Lexicons;
use crate::processing::ner::HybridRecognizer;
use crate::processing::parser;
use crate::processing::record::CvRecord;
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PRIMARY: &str = "primary";
pub const BEST_EFFORT: &str = "best_effort";

/// Outcome of checking a record, with the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub valid: bool,
    pub missing: Vec<String>,
    pub strategy: String,
}

impl ValidationSummary {
    /// The summary as an error, when the record is incomplete.
    pub fn error(&self) -> Option<CvError> {
        (!self.valid).then(|| CvError::ValidationFailure(self.missing.clone()))
    }

    fn with_strategy(mut self, strategy: &str) -> Self {
        self.strategy = strategy.to_string();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// A record is complete with a name or an email, at least one experience
    /// or formation, and at least one technical skill. Each rule can be
    /// switched off in `[validation]`.
    pub fn check(&self, record: &CvRecord) -> ValidationSummary {
        let mut missing = Vec::new();
        if self.config.require_identity && !record.contact.has_identity() {
            missing.push("name_or_email".to_string());
        }
        if self.config.require_background && record.experiences.is_empty() && record.formations.is_empty() {
            missing.push("experiences_or_formations".to_string());
        }
        if self.config.require_technical_skills && record.skills.technical.is_empty() {
            missing.push("technical_skills".to_string());
        }
        ValidationSummary {
            valid: missing.is_empty(),
            missing,
            strategy: PRIMARY.to_string(),
        }
    }
}

/// A named way of producing a replacement record from the document text.
#[async_trait]
pub trait FallbackStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the strategy has nothing to offer for this run.
    async fn attempt(&self, text: &str) -> Result<Option<CvRecord>>;
}

/// Re-run the trained labeler alone and rebuild a record from its spans.
pub struct LearnedOnlyStrategy {
    recognizer: Arc<HybridRecognizer>,
    lexicons: Arc<Lexicons>,
}

impl LearnedOnlyStrategy {
    pub fn new(recognizer: Arc<HybridRecognizer>, lexicons: Arc<Lexicons>) -> Self {
        Self { recognizer, lexicons }
    }
}

#[async_trait]
impl FallbackStrategy for LearnedOnlyStrategy {
    fn name(&self) -> &'static str {
        "learned_only"
    }

    async fn attempt(&self, text: &str) -> Result<Option<CvRecord>> {
        Ok(self
            .recognizer
            .learned_entities(text)
            .map(|entities| parser::record_from_entities(&entities, &self.lexicons)))
    }
}

/// Ask the external oracle for the whole record.
pub struct OracleStrategy {
    client: Arc<OracleClient>,
}

impl OracleStrategy {
    pub fn new(client: Arc<OracleClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FallbackStrategy for OracleStrategy {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn attempt(&self, text: &str) -> Result<Option<CvRecord>> {
        self.client.analyze(text).await.map(Some)
    }
}

/// Ordered strategies tried until one yields a complete record.
pub struct FallbackChain {
    validator: Validator,
    strategies: Vec<Box<dyn FallbackStrategy>>,
}

impl FallbackChain {
    pub fn new(validator: Validator) -> Self {
        Self {
            validator,
            strategies: Vec::new(),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn FallbackStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Validate `primary` and, when incomplete, fill its unset fields from
    /// each strategy in turn. Fields set by an earlier run are never
    /// replaced. Strategy failures are logged and skipped.
    pub async fn run(&self, text: &str, primary: CvRecord) -> (CvRecord, ValidationSummary) {
        let summary = self.validator.check(&primary);
        if summary.valid {
            return (primary, summary);
        }
        debug!("Primary extraction incomplete, missing: {:?}", summary.missing);

        let mut best = primary;
        for strategy in &self.strategies {
            let candidate = match strategy.attempt(text).await {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    debug!("Fallback '{}' not available", strategy.name());
                    continue;
                }
                Err(e) => {
                    warn!("Fallback '{}' failed ({}): {}", strategy.name(), e.kind(), e);
                    continue;
                }
            };

            best.fill_missing_from(&candidate);
            let summary = self.validator.check(&best);
            if summary.valid {
                info!("Record completed by fallback '{}'", strategy.name());
                return (best, summary.with_strategy(strategy.name()));
            }
        }

        let summary = self.validator.check(&best).with_strategy(BEST_EFFORT);
        warn!("Extraction incomplete after all fallbacks, missing: {}", summary.missing.join(", "));
        (best, summary)
    }
}
