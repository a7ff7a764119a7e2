//! Text processing: segmentation, entity recognition, parsing and normalization

pub mod document;
pub mod lexicon;
pub mod ner;
pub mod normalizer;
pub mod parser;
pub mod patterns;
pub mod pipeline;
pub mod record;
pub mod regex_extractor;
pub mod segmenter;
pub mod text_processor;
pub mod validation;
pub mod validator;

pub use pipeline::{ExtractionOutcome, Pipeline, PipelineBuilder};
