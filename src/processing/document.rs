//! Document structures shared by the extraction stages

use crate::input::file_detector::FileType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Where a text came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub kind: FileType,
}

/// Text acquired from a document. Span offsets produced downstream are byte
/// offsets into `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawText {
    text: String,
    source: SourceDescriptor,
}

impl RawText {
    pub fn new(text: String, source: SourceDescriptor) -> Self {
        Self { text, source }
    }

    /// Text that did not come from a file, used by tests and the library API.
    pub fn from_string(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: SourceDescriptor {
                path: PathBuf::new(),
                kind: FileType::Unknown,
            },
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionCategory {
    Education,
    Experience,
    Skills,
    Languages,
    Projects,
    Certifications,
    Hobbies,
    Contact,
    Other,
}

impl SectionCategory {
    pub const ALL: [SectionCategory; 9] = [
        SectionCategory::Education,
        SectionCategory::Experience,
        SectionCategory::Skills,
        SectionCategory::Languages,
        SectionCategory::Projects,
        SectionCategory::Certifications,
        SectionCategory::Hobbies,
        SectionCategory::Contact,
        SectionCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionCategory::Education => "EDUCATION",
            SectionCategory::Experience => "EXPERIENCE",
            SectionCategory::Skills => "SKILLS",
            SectionCategory::Languages => "LANGUAGES",
            SectionCategory::Projects => "PROJECTS",
            SectionCategory::Certifications => "CERTIFICATIONS",
            SectionCategory::Hobbies => "HOBBIES",
            SectionCategory::Contact => "CONTACT",
            SectionCategory::Other => "OTHER",
        }
    }

    /// Parse a classifier label, tolerating lowercase and a few French aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "EDUCATION" | "FORMATION" | "FORMATIONS" => Some(SectionCategory::Education),
            "EXPERIENCE" | "EXPERIENCES" => Some(SectionCategory::Experience),
            "SKILLS" | "COMPETENCES" => Some(SectionCategory::Skills),
            "LANGUAGES" | "LANGUES" => Some(SectionCategory::Languages),
            "PROJECTS" | "PROJETS" => Some(SectionCategory::Projects),
            "CERTIFICATIONS" => Some(SectionCategory::Certifications),
            "HOBBIES" | "LOISIRS" | "INTERESTS" => Some(SectionCategory::Hobbies),
            "CONTACT" => Some(SectionCategory::Contact),
            "OTHER" => Some(SectionCategory::Other),
            _ => None,
        }
    }
}

impl fmt::Display for SectionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled, contiguous byte range of the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionBlock {
    pub category: SectionCategory,
    pub confidence: f32,
    pub start: usize,
    pub end: usize,
    /// Byte offset where the body starts, after the title line.
    pub body_start: usize,
}

impl SectionBlock {
    pub fn body<'a>(&self, text: &'a str) -> &'a str {
        &text[self.body_start..self.end]
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        &text[self.start..self.end]
    }
}

/// Section bodies keyed by category. Absent categories read as "".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sections {
    bodies: BTreeMap<SectionCategory, String>,
}

impl Sections {
    pub fn insert(&mut self, category: SectionCategory, body: String) {
        self.bodies.insert(category, body);
    }

    pub fn get(&self, category: SectionCategory) -> &str {
        self.bodies.get(&category).map(String::as_str).unwrap_or("")
    }

    pub fn contains(&self, category: SectionCategory) -> bool {
        self.bodies.get(&category).is_some_and(|b| !b.trim().is_empty())
    }

    pub fn categories(&self) -> impl Iterator<Item = SectionCategory> + '_ {
        self.bodies.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}
