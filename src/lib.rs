//! CV extraction library: reads French CVs and produces canonical records

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod llm;
pub mod ml;
pub mod output;
pub mod processing;

pub use config::Config;
pub use error::{CvError, ErrorKind, Result};
pub use processing::{ExtractionOutcome, Pipeline, PipelineBuilder};
