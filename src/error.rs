//! Error handling for the CV extraction pipeline

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CvError {
    #[error("File format not supported: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document: {0}")]
    Read(String),

    #[error("Model loading error: {0}")]
    ModelLoad(String),

    #[error("Model inference error: {0}")]
    Inference(String),

    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Oracle response could not be parsed: {0}")]
    OracleParse(String),

    #[error("Extraction incomplete, missing: {}", .0.join(", "))]
    ValidationFailure(Vec<String>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Machine-readable tag attached to every error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    ReadError,
    ModelLoadError,
    InferenceError,
    OracleUnavailable,
    OracleParseError,
    ValidationFailure,
    IoError,
    SerializationError,
    ConfigError,
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ReadError => "read_error",
            ErrorKind::ModelLoadError => "model_load_error",
            ErrorKind::InferenceError => "inference_error",
            ErrorKind::OracleUnavailable => "oracle_unavailable",
            ErrorKind::OracleParseError => "oracle_parse_error",
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::IoError => "io_error",
            ErrorKind::SerializationError => "serialization_error",
            ErrorKind::ConfigError => "config_error",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CvError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CvError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            CvError::Read(_) => ErrorKind::ReadError,
            CvError::ModelLoad(_) => ErrorKind::ModelLoadError,
            CvError::Inference(_) => ErrorKind::InferenceError,
            CvError::OracleUnavailable(_) => ErrorKind::OracleUnavailable,
            CvError::OracleParse(_) => ErrorKind::OracleParseError,
            CvError::ValidationFailure(_) => ErrorKind::ValidationFailure,
            CvError::Io(_) => ErrorKind::IoError,
            CvError::Serialization(_) => ErrorKind::SerializationError,
            CvError::Config(_) => ErrorKind::ConfigError,
            CvError::InvalidInput(_) => ErrorKind::InvalidInput,
        }
    }

    /// Errors after which the pipeline keeps going with partial data.
    /// Reader-level failures abort the current document.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CvError::ModelLoad(_)
                | CvError::Inference(_)
                | CvError::OracleUnavailable(_)
                | CvError::OracleParse(_)
                | CvError::ValidationFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CvError>;

impl From<anyhow::Error> for CvError {
    fn from(err: anyhow::Error) -> Self {
        CvError::ModelLoad(err.to_string())
    }
}

impl From<candle_core::Error> for CvError {
    fn from(err: candle_core::Error) -> Self {
        CvError::Inference(err.to_string())
    }
}

impl From<docx_rs::ReaderError> for CvError {
    fn from(err: docx_rs::ReaderError) -> Self {
        CvError::Read(format!("invalid DOCX document: {}", err))
    }
}

impl From<reqwest::Error> for CvError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CvError::OracleParse(err.to_string())
        } else {
            CvError::OracleUnavailable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            CvError::UnsupportedFormat("cv.odt".into()).kind().as_str(),
            "unsupported_format"
        );
        assert_eq!(CvError::Read("boom".into()).kind(), ErrorKind::ReadError);
        assert_eq!(
            serde_json::to_string(&ErrorKind::OracleParseError).unwrap(),
            "\"oracle_parse_error\""
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(CvError::ModelLoad("missing".into()).is_recoverable());
        assert!(CvError::OracleUnavailable("timeout".into()).is_recoverable());
        assert!(!CvError::Read("corrupt".into()).is_recoverable());
        assert!(!CvError::UnsupportedFormat("x".into()).is_recoverable());
    }

    #[test]
    fn test_validation_failure_message_lists_fields() {
        let err = CvError::ValidationFailure(vec!["contact".into(), "competences_techniques".into()]);
        assert_eq!(
            err.to_string(),
            "Extraction incomplete, missing: contact, competences_techniques"
        );
    }
}
