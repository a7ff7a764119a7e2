//! Hybrid named-entity recognition
//!
//! Learned spans come first and are canonical; lexicon and regex spans only
//! fill the gaps they leave. Every span goes through a label-specific
//! predicate before it is kept.

use crate::error::Result;
use crate::processing::document::SectionCategory;
use crate::processing::lexicon::Lexicons;
use crate::processing::patterns::{self, COMPANY_AFTER_PREPOSITION, COMPANY_BEFORE_ROLE, LANGUAGE_WORD};
use crate::processing::regex_extractor::{find_addresses, find_dates};
use crate::processing::text_processor::{collapse_whitespace, normalize_key};
use crate::processing::validation::{self, AddressContext};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Lines scanned for the candidate name.
const HEADER_LINES: usize = 10;

static NAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:nom\s+(?:et\s+)?pr[ée]nom|pr[ée]nom\s+(?:et\s+)?nom|nom|name|candidat)\s*[:|]\s*")
        .expect("Invalid name label regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    PersonName,
    Company,
    School,
    Diploma,
    JobTitle,
    Skill,
    Language,
    DateRange,
    Location,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::PersonName,
        EntityKind::Company,
        EntityKind::School,
        EntityKind::Diploma,
        EntityKind::JobTitle,
        EntityKind::Skill,
        EntityKind::Language,
        EntityKind::DateRange,
        EntityKind::Location,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::PersonName => "PERSON_NAME",
            EntityKind::Company => "COMPANY",
            EntityKind::School => "SCHOOL",
            EntityKind::Diploma => "DIPLOMA",
            EntityKind::JobTitle => "JOB_TITLE",
            EntityKind::Skill => "SKILL",
            EntityKind::Language => "LANGUAGE",
            EntityKind::DateRange => "DATE_RANGE",
            EntityKind::Location => "LOCATION",
        }
    }

    /// Map a model label onto a kind. Accepts the usual CoNLL aliases.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "PERSON_NAME" | "PER" | "PERSON" | "NAME" => Some(EntityKind::PersonName),
            "COMPANY" | "ORG" | "ORGANIZATION" => Some(EntityKind::Company),
            "SCHOOL" => Some(EntityKind::School),
            "DIPLOMA" | "DEGREE" => Some(EntityKind::Diploma),
            "JOB_TITLE" | "TITLE" => Some(EntityKind::JobTitle),
            "SKILL" => Some(EntityKind::Skill),
            "LANGUAGE" => Some(EntityKind::Language),
            "DATE_RANGE" | "DATE" => Some(EntityKind::DateRange),
            "LOCATION" | "LOC" => Some(EntityKind::Location),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A labeled byte range of the input text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub start: usize,
    pub end: usize,
    pub label: EntityKind,
    pub text: String,
}

impl Entity {
    /// `None` unless `start..end` is a non-empty, char-aligned range of `source`.
    pub fn new(source: &str, start: usize, end: usize, label: EntityKind) -> Option<Self> {
        if start >= end || end > source.len() {
            return None;
        }
        let text = source.get(start..end)?;
        Some(Self {
            start,
            end,
            label,
            text: text.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Maps text to labeled spans.
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn recognize(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Scores a text block against the section categories.
pub trait SectionClassifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, block: &str) -> Result<Vec<(SectionCategory, f32)>>;
}

/// Entity values grouped by kind, in text order, de-duplicated case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityMap {
    values: BTreeMap<EntityKind, Vec<String>>,
}

impl EntityMap {
    pub fn push(&mut self, kind: EntityKind, value: impl Into<String>) {
        let value = value.into();
        if value.trim().is_empty() {
            return;
        }
        let list = self.values.entry(kind).or_default();
        let key = normalize_key(&value);
        if !list.iter().any(|v| normalize_key(v) == key) {
            list.push(value);
        }
    }

    pub fn get(&self, kind: EntityKind) -> &[String] {
        self.values.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, kind: EntityKind) -> Option<&str> {
        self.get(kind).first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &[String])> {
        self.values.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

/// Lexicon and pattern based recognizer.
#[derive(Debug, Clone)]
pub struct LexiconRecognizer {
    lexicons: Arc<Lexicons>,
}

impl LexiconRecognizer {
    pub fn new(lexicons: Arc<Lexicons>) -> Self {
        Self { lexicons }
    }

    /// First header line (or line segment) that reads as a person name.
    fn header_name(&self, text: &str, addresses: &AddressContext) -> Option<Entity> {
        for line in text.lines().filter(|l| !l.trim().is_empty()).take(HEADER_LINES) {
            let line = match NAME_LABEL.find(line) {
                Some(label) => &line[label.end()..],
                None => line,
            };
            let whole = std::iter::once(line.trim());
            let segments = line
                .split(['|', '–', '—', ',', '\t', '/'])
                .flat_map(|s| s.split(" - "))
                .map(str::trim);
            for candidate in whole.chain(segments) {
                if candidate.is_empty()
                    || !validation::is_valid_person_name(candidate, &self.lexicons, addresses)
                {
                    continue;
                }
                let start = offset_of(text, candidate);
                return Entity::new(text, start, start + candidate.len(), EntityKind::PersonName);
            }
        }
        None
    }

    fn companies(&self, text: &str, out: &mut Vec<Entity>) {
        for (start, end) in self.lexicons.find_companies(text) {
            // Lowercase hits are ordinary words ("au total", "orange").
            if text[start..].chars().next().is_some_and(char::is_uppercase) {
                out.extend(Entity::new(text, start, end, EntityKind::Company));
            }
        }
        for re in [&*COMPANY_AFTER_PREPOSITION, &*COMPANY_BEFORE_ROLE] {
            for caps in re.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    let trimmed = trim_company(m.as_str());
                    out.extend(Entity::new(text, m.start(), m.start() + trimmed.len(), EntityKind::Company));
                }
            }
        }
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn recognize(&self, text: &str) -> Result<Vec<Entity>> {
        let addresses = AddressContext::from_text(text);
        let mut out = Vec::new();

        out.extend(self.header_name(text, &addresses));
        self.companies(text, &mut out);

        let spans = |found: Vec<(usize, usize)>, kind: EntityKind| {
            found
                .into_iter()
                .filter_map(move |(s, e)| Entity::new(text, s, e, kind))
                .collect::<Vec<_>>()
        };
        out.extend(spans(patterns::find_schools(text), EntityKind::School));
        out.extend(spans(patterns::find_diplomas(text), EntityKind::Diploma));
        out.extend(spans(patterns::find_job_titles(text), EntityKind::JobTitle));
        out.extend(spans(self.lexicons.find_skills(text), EntityKind::Skill));
        out.extend(
            LANGUAGE_WORD
                .find_iter(text)
                .filter_map(|m| Entity::new(text, m.start(), m.end(), EntityKind::Language)),
        );
        out.extend(
            find_dates(text)
                .into_iter()
                .filter(|d| d.form.is_range())
                .filter_map(|d| Entity::new(text, d.start, d.end, EntityKind::DateRange)),
        );
        out.extend(
            find_addresses(text)
                .into_iter()
                .filter_map(|(s, e, _)| Entity::new(text, s, e, EntityKind::Location)),
        );
        Ok(out)
    }
}

/// Learned recognizer first, lexicon recognizer filling the gaps.
#[derive(Clone)]
pub struct HybridRecognizer {
    lexicons: Arc<Lexicons>,
    lexicon: LexiconRecognizer,
    learned: Option<Arc<dyn EntityRecognizer>>,
}

impl fmt::Debug for HybridRecognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridRecognizer")
            .field("learned", &self.learned.as_ref().map(|r| r.name()))
            .finish()
    }
}

impl HybridRecognizer {
    pub fn new(lexicons: Arc<Lexicons>) -> Self {
        Self {
            lexicon: LexiconRecognizer::new(Arc::clone(&lexicons)),
            lexicons,
            learned: None,
        }
    }

    pub fn with_learned(mut self, learned: Arc<dyn EntityRecognizer>) -> Self {
        self.learned = Some(learned);
        self
    }

    pub fn has_learned(&self) -> bool {
        self.learned.is_some()
    }

    /// Finalized spans, sorted by start offset.
    pub fn spans(&self, text: &str) -> Vec<Entity> {
        let learned = self.learned_spans(text).unwrap_or_default();
        self.fill(text, learned)
    }

    /// Entity values by kind. Languages carry their proficiency when one follows.
    pub fn entities(&self, text: &str) -> EntityMap {
        to_map(text, &self.spans(text))
    }

    /// Spans of the learned recognizer alone, validated and finalized.
    /// `None` when no learned recognizer is attached.
    pub fn learned_spans(&self, text: &str) -> Option<Vec<Entity>> {
        let learned = self.learned.as_ref()?;
        let spans = match learned.recognize(text) {
            Ok(spans) => spans,
            Err(e) => {
                warn!("{} recognizer failed, using lexicons only: {}", learned.name(), e);
                return Some(Vec::new());
            }
        };
        let addresses = AddressContext::from_text(text);
        let accepted: Vec<Entity> = spans
            .into_iter()
            .filter(|e| in_bounds(text, e) && self.accepts(e, &addresses))
            .collect();
        debug!("{} learned spans accepted", accepted.len());
        Some(finalize(accepted))
    }

    pub fn learned_entities(&self, text: &str) -> Option<EntityMap> {
        self.learned_spans(text).map(|spans| to_map(text, &spans))
    }

    /// Add lexicon spans that do not overlap any of `learned`.
    pub fn fill(&self, text: &str, learned: Vec<Entity>) -> Vec<Entity> {
        let addresses = AddressContext::from_text(text);
        let lexical = match self.lexicon.recognize(text) {
            Ok(spans) => spans,
            Err(e) => {
                warn!("Lexicon recognizer failed: {}", e);
                Vec::new()
            }
        };

        let gaps: Vec<Entity> = lexical
            .into_iter()
            .filter(|e| in_bounds(text, e) && self.accepts(e, &addresses))
            .filter(|e| !learned.iter().any(|l| l.overlaps(e)))
            .collect();

        let mut all = learned;
        all.extend(finalize(gaps));
        all.sort_by_key(|e| (e.start, e.end));
        all
    }

    fn accepts(&self, entity: &Entity, addresses: &AddressContext) -> bool {
        let text = collapse_whitespace(&entity.text);
        let lex = &*self.lexicons;
        match entity.label {
            EntityKind::PersonName => validation::is_valid_person_name(&text, lex, addresses),
            EntityKind::Company => validation::is_valid_company(&text, lex),
            EntityKind::School => validation::is_valid_school(&text, lex) && !lex.is_section_title(&text),
            EntityKind::Diploma => validation::is_valid_diploma(&text, lex),
            EntityKind::JobTitle => validation::is_valid_job_title(&text, lex),
            EntityKind::Skill => validation::is_valid_skill(&text, lex),
            EntityKind::Language => validation::canonical_language(&text).is_some(),
            EntityKind::DateRange => !text.is_empty(),
            EntityKind::Location => validation::is_valid_location(&text),
        }
    }
}

/// Longest span wins among overlaps; exact duplicates collapse.
fn finalize(mut spans: Vec<Entity>) -> Vec<Entity> {
    let mut seen = HashSet::new();
    spans.retain(|e| seen.insert((e.start, e.end, e.label)));
    spans.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));

    let mut kept: Vec<Entity> = Vec::with_capacity(spans.len());
    for span in spans {
        if !kept.iter().any(|k| k.overlaps(&span)) {
            kept.push(span);
        }
    }
    kept.sort_by_key(|e| (e.start, e.end));
    kept
}

fn to_map(text: &str, spans: &[Entity]) -> EntityMap {
    let mut map = EntityMap::default();
    let mut languages = HashSet::new();
    for entity in spans {
        let value = match entity.label {
            EntityKind::Language => {
                // One entry per language; the first mention keeps its level.
                let display = validation::canonical_language(&entity.text);
                if display.is_some_and(|d| !languages.insert(d)) {
                    continue;
                }
                validation::canonical_language_entry(&text[entity.start..])
                    .unwrap_or_else(|| collapse_whitespace(&entity.text))
            }
            _ => collapse_whitespace(&entity.text),
        };
        map.push(entity.label, value);
    }
    map
}

fn in_bounds(text: &str, entity: &Entity) -> bool {
    entity.start < entity.end
        && entity.end <= text.len()
        && text.is_char_boundary(entity.start)
        && text.is_char_boundary(entity.end)
}

/// Byte offset of `sub` inside `text`; `sub` must be a subslice of `text`.
fn offset_of(text: &str, sub: &str) -> usize {
    sub.as_ptr() as usize - text.as_ptr() as usize
}

fn trim_company(raw: &str) -> &str {
    let mut trimmed = raw.trim_end_matches(['.', ',', ' ', '-']);
    for linker in [" de", " du", " des", " &"] {
        if let Some(stripped) = trimmed.strip_suffix(linker) {
            trimmed = stripped;
        }
    }
    trimmed
}
