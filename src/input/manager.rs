//! Input manager dispatching documents to the right extractor

use crate::error::{CvError, Result};
use crate::input::file_detector::FileType;
use crate::input::text_extractor::{DocxExtractor, PdfExtractor, TextExtractor};
use crate::processing::document::{RawText, SourceDescriptor};
use log::{debug, info};
use std::path::Path;

#[derive(Debug, Default, Clone)]
pub struct InputManager;

impl InputManager {
    pub fn new() -> Self {
        Self
    }

    /// Read a `.docx` or `.pdf` file into a [`RawText`].
    pub async fn extract_text(&self, path: &Path) -> Result<RawText> {
        let file_type = FileType::from_path(path);
        if !file_type.is_supported() {
            return Err(unsupported(path));
        }

        if !path.exists() {
            return Err(CvError::Read(format!("File does not exist: {}", path.display())));
        }

        let text = match file_type {
            FileType::Docx => {
                info!("Extracting text from DOCX: {}", path.display());
                DocxExtractor.extract(path).await?
            }
            FileType::Pdf => {
                info!("Extracting text from PDF: {}", path.display());
                PdfExtractor.extract(path).await?
            }
            FileType::Unknown => return Err(unsupported(path)),
        };
        debug!("{} characters read from {}", text.chars().count(), path.display());

        Ok(RawText::new(
            text,
            SourceDescriptor {
                path: path.to_path_buf(),
                kind: file_type,
            },
        ))
    }
}

fn unsupported(path: &Path) -> CvError {
    CvError::UnsupportedFormat(format!("{} (accepted: .docx, .pdf)", path.display()))
}
