//! Section segmentation
//!
//! Title lines split the text into candidate blocks which are scored by the
//! configured section classifiers. When no content section survives, a plain
//! keyword scan over localized headers is used instead.

use crate::error::Result;
use crate::processing::document::{SectionBlock, SectionCategory, Sections};
use crate::processing::lexicon::{is_hobby_word, Lexicons};
use crate::processing::ner::SectionClassifier;
use crate::processing::patterns::{self, LANGUAGE_WORD};
use crate::processing::regex_extractor::{extract_emails, extract_phones, find_dates};
use crate::processing::text_processor::{compact_key, is_bullet_line, uppercase_ratio};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_THRESHOLD: f32 = 0.5;

const HEADER_SCORE: f32 = 0.9;
const KEYWORD_BLOCK_CONFIDENCE: f32 = 0.75;

/// Compact-key prefixes of localized section headers.
const HEADER_KEYWORDS: &[(SectionCategory, &[&str])] = &[
    (
        SectionCategory::Experience,
        &[
            "experience", "parcoursprofessionnel", "professionalexperience", "workexperience",
            "emplois", "carriere", "historiqueprofessionnel",
        ],
    ),
    (
        SectionCategory::Education,
        &[
            "formation", "education", "diplome", "parcoursacademique", "etudes", "cursus",
            "scolarite",
        ],
    ),
    (
        SectionCategory::Skills,
        &[
            "competence", "skills", "expertise", "savoirfaire", "savoiretre", "outils",
            "technologies", "stacktechnique", "hardskills", "softskills", "connaissances",
            "environnementstechniques",
        ],
    ),
    (SectionCategory::Languages, &["langue", "language"]),
    (SectionCategory::Projects, &["projet", "project", "realisations"]),
    (SectionCategory::Certifications, &["certification", "certificat", "habilitation"]),
    (
        SectionCategory::Hobbies,
        &[
            "loisir", "hobbies", "hobby", "centresdinteret", "centredinteret", "interets",
            "activitesextra", "passions",
        ],
    ),
    (
        SectionCategory::Contact,
        &["contact", "coordonnees", "informationspersonnelles", "etatcivil"],
    ),
];

/// Category of a short line made of a known section header, if any.
pub fn header_category(line: &str) -> Option<SectionCategory> {
    let trimmed = line.trim().trim_end_matches([':', ' ']);
    if trimmed.chars().any(|c| c.is_ascii_digit()) || trimmed.split_whitespace().count() > 4 {
        return None;
    }
    let key = compact_key(trimmed);
    if key.is_empty() || key.len() > 40 {
        return None;
    }
    HEADER_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| key.starts_with(kw)))
        .map(|(category, _)| *category)
}

/// Short, majority-uppercase lines and known headers start a section.
fn is_title_line(line: &str) -> bool {
    let trimmed = line.trim().trim_end_matches(':').trim();
    if trimmed.is_empty() || is_bullet_line(trimmed) || trimmed.contains('@') {
        return false;
    }
    if trimmed.chars().count() > 60 || trimmed.split_whitespace().count() > 6 {
        return false;
    }
    let letters = trimmed.chars().filter(|c| c.is_alphabetic()).count();
    let digits = trimmed.chars().filter(|c| c.is_ascii_digit()).count();
    if letters < 3 || digits > 2 {
        return false;
    }
    uppercase_ratio(trimmed) > 0.5 || header_category(trimmed).is_some()
}

/// Header keywords and body cues, no model involved.
#[derive(Debug, Clone)]
pub struct KeywordSectionClassifier {
    lexicons: Arc<Lexicons>,
}

impl KeywordSectionClassifier {
    pub fn new(lexicons: Arc<Lexicons>) -> Self {
        Self { lexicons }
    }

    fn body_cue(&self, category: SectionCategory, line: &str) -> bool {
        match category {
            SectionCategory::Experience => {
                find_dates(line).iter().any(|d| d.form.is_range())
                    && (patterns::looks_like_job_title(line) || line.contains(" chez "))
            }
            SectionCategory::Education => {
                !patterns::find_diplomas(line).is_empty() || !patterns::find_schools(line).is_empty()
            }
            SectionCategory::Skills => !self.lexicons.find_skills(line).is_empty(),
            SectionCategory::Languages => LANGUAGE_WORD.is_match(line),
            SectionCategory::Hobbies => line
                .split(|c: char| !c.is_alphanumeric())
                .any(is_hobby_word),
            SectionCategory::Contact => {
                !extract_emails(line).is_empty() || !extract_phones(line).is_empty()
            }
            SectionCategory::Projects | SectionCategory::Certifications | SectionCategory::Other => false,
        }
    }
}

impl SectionClassifier for KeywordSectionClassifier {
    fn name(&self) -> &'static str {
        "keywords"
    }

    fn classify(&self, block: &str) -> Result<Vec<(SectionCategory, f32)>> {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next().and_then(header_category);
        let body: Vec<&str> = lines.collect();

        let mut scores = Vec::new();
        for category in SectionCategory::ALL {
            let hits = body.iter().filter(|l| self.body_cue(category, l)).count();
            let mut score = if body.is_empty() {
                0.0
            } else {
                0.8 * hits as f32 / body.len() as f32
            };
            if header == Some(category) {
                score = score.max(HEADER_SCORE);
            }
            if score > 0.0 {
                scores.push((category, score));
            }
        }
        Ok(scores)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    body_start: usize,
    end: usize,
    best: Option<(SectionCategory, f32)>,
}

/// Splits a CV text into labeled, non-overlapping blocks.
#[derive(Clone)]
pub struct Segmenter {
    classifiers: Vec<Arc<dyn SectionClassifier>>,
    threshold: f32,
}

impl fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segmenter")
            .field("classifiers", &self.classifiers.iter().map(|c| c.name()).collect::<Vec<_>>())
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl Segmenter {
    pub fn new(classifiers: Vec<Arc<dyn SectionClassifier>>, threshold: f32) -> Self {
        Self { classifiers, threshold }
    }

    /// Keyword classifier only.
    pub fn lexical(lexicons: Arc<Lexicons>) -> Self {
        Self::new(
            vec![Arc::new(KeywordSectionClassifier::new(lexicons))],
            DEFAULT_THRESHOLD,
        )
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Section bodies by category; OTHER collects everything unclaimed.
    pub fn segment(&self, text: &str) -> Sections {
        let mut bodies: BTreeMap<SectionCategory, String> = BTreeMap::new();
        for block in self.blocks(text) {
            let body = block.body(text);
            if body.trim().is_empty() {
                continue;
            }
            let entry = bodies.entry(block.category).or_default();
            if !entry.is_empty() && !entry.ends_with('\n') {
                entry.push('\n');
            }
            entry.push_str(body);
        }

        let mut sections = Sections::default();
        for (category, body) in bodies {
            sections.insert(category, body);
        }
        sections
    }

    /// Contiguous blocks covering the whole text, in text order.
    pub fn blocks(&self, text: &str) -> Vec<SectionBlock> {
        let blocks = self.classified_blocks(text);
        if blocks.iter().any(|b| b.category != SectionCategory::Other) {
            return blocks;
        }
        debug!("No section accepted by the classifiers, scanning for header keywords");
        keyword_blocks(text)
    }

    fn scores(&self, block: &str) -> BTreeMap<SectionCategory, f32> {
        let mut best: BTreeMap<SectionCategory, f32> = BTreeMap::new();
        for classifier in &self.classifiers {
            match classifier.classify(block) {
                Ok(scores) => {
                    for (category, score) in scores {
                        let slot = best.entry(category).or_insert(0.0);
                        *slot = slot.max(score);
                    }
                }
                Err(e) => warn!("{} section classifier failed: {}", classifier.name(), e),
            }
        }
        best
    }

    fn classified_blocks(&self, text: &str) -> Vec<SectionBlock> {
        let titles: Vec<(usize, usize)> = line_spans(text)
            .filter(|&(start, end)| is_title_line(&text[start..end]))
            .collect();

        let mut candidates: Vec<Candidate> = Vec::with_capacity(titles.len());
        for (i, &(start, line_end)) in titles.iter().enumerate() {
            let end = titles.get(i + 1).map(|&(s, _)| s).unwrap_or(text.len());
            let body_start = (line_end + 1).min(end);
            let best = self
                .scores(&text[start..end])
                .into_iter()
                .filter(|&(_, score)| score > self.threshold)
                .fold(None, |acc: Option<(SectionCategory, f32)>, (cat, score)| match acc {
                    Some((_, s)) if s >= score => acc,
                    _ => Some((cat, score)),
                });
            candidates.push(Candidate {
                start,
                body_start,
                end,
                best,
            });
        }

        // Highest score per category; the earliest block wins ties.
        let mut winners: BTreeMap<SectionCategory, (usize, f32)> = BTreeMap::new();
        for (i, candidate) in candidates.iter().enumerate() {
            if let Some((category, score)) = candidate.best {
                let current = winners.entry(category).or_insert((i, score));
                if score > current.1 {
                    *current = (i, score);
                }
            }
        }

        let mut blocks: Vec<SectionBlock> = Vec::new();
        let preamble_end = candidates.first().map(|c| c.start).unwrap_or(text.len());
        if preamble_end > 0 {
            blocks.push(other_block(0, preamble_end));
        }

        for (i, candidate) in candidates.iter().enumerate() {
            match candidate.best {
                Some((category, score)) if winners.get(&category).is_some_and(|w| w.0 == i) => {
                    blocks.push(SectionBlock {
                        category,
                        confidence: score,
                        start: candidate.start,
                        end: candidate.end,
                        body_start: candidate.body_start,
                    });
                }
                Some((category, _)) => match blocks.last_mut() {
                    // A losing block right after its winner continues it.
                    Some(last) if last.category == category => last.end = candidate.end,
                    _ => blocks.push(other_block(candidate.start, candidate.end)),
                },
                None => match blocks.last_mut() {
                    Some(last) => last.end = candidate.end,
                    None => blocks.push(other_block(candidate.start, candidate.end)),
                },
            }
        }
        merge_other(blocks)
    }
}

/// Header-anchored slices, used when the classifiers accept nothing.
pub fn keyword_blocks(text: &str) -> Vec<SectionBlock> {
    let headers: Vec<(usize, usize, SectionCategory)> = line_spans(text)
        .filter_map(|(start, end)| {
            let line = &text[start..end];
            (line.trim().chars().count() <= 50)
                .then(|| header_category(line))
                .flatten()
                .map(|category| (start, end, category))
        })
        .collect();

    let mut blocks = Vec::new();
    let preamble_end = headers.first().map(|h| h.0).unwrap_or(text.len());
    if preamble_end > 0 {
        blocks.push(other_block(0, preamble_end));
    }
    for (i, &(start, line_end, category)) in headers.iter().enumerate() {
        let end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
        blocks.push(SectionBlock {
            category,
            confidence: KEYWORD_BLOCK_CONFIDENCE,
            start,
            end,
            body_start: (line_end + 1).min(end),
        });
    }
    blocks
}

fn other_block(start: usize, end: usize) -> SectionBlock {
    SectionBlock {
        category: SectionCategory::Other,
        confidence: 0.0,
        start,
        end,
        body_start: start,
    }
}

fn merge_other(blocks: Vec<SectionBlock>) -> Vec<SectionBlock> {
    let mut merged: Vec<SectionBlock> = Vec::with_capacity(blocks.len());
    for block in blocks {
        match merged.last_mut() {
            Some(last) if last.category == SectionCategory::Other && block.category == SectionCategory::Other => {
                last.end = block.end;
            }
            _ => merged.push(block),
        }
    }
    merged
}

/// Byte ranges of each line, newline excluded.
fn line_spans(text: &str) -> impl Iterator<Item = (usize, usize)> + '_ {
    let mut offset = 0;
    text.split('\n').map(move |line| {
        let start = offset;
        offset += line.len() + 1;
        (start, start + line.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CvError;

    const CV: &str = "Adèle Patarot\nData Analyst\nadele.patarot@gmail.com\n\nFORMATION\nMaster Informatique, Université Paris-Saclay, 2018-2020\n\nEXPÉRIENCES PROFESSIONNELLES\n2021-Présent: Lead DevOps chez AWS\n- Migration Kubernetes\n\nCOMPETENCES TECHNIQU ES\nPython, Java, communication\n\nLANGUES\nAnglais (C1)\n";

    struct SilentClassifier;

    impl SectionClassifier for SilentClassifier {
        fn name(&self) -> &'static str {
            "silent"
        }

        fn classify(&self, _block: &str) -> Result<Vec<(SectionCategory, f32)>> {
            Err(CvError::Inference("no model".to_string()))
        }
    }

    fn segmenter() -> Segmenter {
        Segmenter::lexical(Lexicons::builtin())
    }

    #[test]
    fn test_fragmented_header_scores_as_skills() {
        let classifier = KeywordSectionClassifier::new(Lexicons::builtin());
        let scores = classifier.classify("COMPETENCES TECHNIQU ES\nPython, Docker").unwrap();
        let skills = scores
            .iter()
            .find(|(c, _)| *c == SectionCategory::Skills)
            .map(|(_, s)| *s)
            .unwrap();
        assert!(skills > 0.5);
    }

    #[test]
    fn test_header_category() {
        assert_eq!(header_category("COMPÉTENCES TECHNIQUES :"), Some(SectionCategory::Skills));
        assert_eq!(header_category("Expériences professionnelles"), Some(SectionCategory::Experience));
        assert_eq!(header_category("Centres d'intérêt"), Some(SectionCategory::Hobbies));
        assert_eq!(header_category("Expérience de 5 ans en Python"), None);
        assert_eq!(header_category("Adèle Patarot"), None);
    }

    #[test]
    fn test_segment_cv() {
        let sections = segmenter().segment(CV);
        assert!(sections.get(SectionCategory::Education).contains("Master Informatique"));
        assert!(sections.get(SectionCategory::Experience).contains("Lead DevOps chez AWS"));
        assert!(sections.get(SectionCategory::Skills).contains("Python, Java"));
        assert!(!sections.get(SectionCategory::Skills).contains("COMPETENCES"));
        assert!(sections.get(SectionCategory::Languages).contains("Anglais"));
        assert!(sections.get(SectionCategory::Other).contains("Adèle Patarot"));
        assert_eq!(sections.get(SectionCategory::Projects), "");
    }

    #[test]
    fn test_blocks_cover_text_without_overlap() {
        let blocks = segmenter().blocks(CV);
        assert_eq!(blocks.first().unwrap().start, 0);
        assert_eq!(blocks.last().unwrap().end, CV.len());
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        for block in &blocks {
            assert!(block.start <= block.body_start && block.body_start <= block.end);
            assert!((0.0..=1.0).contains(&block.confidence));
        }
    }

    #[test]
    fn test_competing_blocks_keep_the_first() {
        let text = "EXPÉRIENCES\nAlpha\nFORMATION\nBeta\nEXPÉRIENCE\nGamma\n";
        let sections = segmenter().segment(text);
        assert!(sections.get(SectionCategory::Experience).contains("Alpha"));
        assert!(!sections.get(SectionCategory::Experience).contains("Gamma"));
        assert!(sections.get(SectionCategory::Other).contains("Gamma"));
    }

    #[test]
    fn test_adjacent_subsections_are_merged() {
        let text = "COMPÉTENCES TECHNIQUES\nPython\nCOMPÉTENCES FONCTIONNELLES\nGestion de projet\n";
        let sections = segmenter().segment(text);
        let skills = sections.get(SectionCategory::Skills);
        assert!(skills.contains("Python"));
        assert!(skills.contains("Gestion de projet"));
    }

    #[test]
    fn test_unaccepted_title_joins_previous_section() {
        let text = "EXPÉRIENCES\n2019 - 2021 : Consultant\nCAPGEMINI\n- Audit SI\n";
        let sections = segmenter().segment(text);
        assert!(sections.get(SectionCategory::Experience).contains("CAPGEMINI"));
        assert!(sections.get(SectionCategory::Experience).contains("Audit SI"));
    }

    #[test]
    fn test_keyword_fallback_when_classifiers_accept_nothing() {
        let segmenter = Segmenter::new(vec![Arc::new(SilentClassifier)], DEFAULT_THRESHOLD);
        let sections = segmenter.segment("Jean Dupont\nFormation\nBTS SIO\nLangues :\nAnglais\n");
        assert_eq!(sections.get(SectionCategory::Education).trim(), "BTS SIO");
        assert_eq!(sections.get(SectionCategory::Languages).trim(), "Anglais");
        assert_eq!(sections.get(SectionCategory::Other).trim(), "Jean Dupont");
    }
}
