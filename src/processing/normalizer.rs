//! Projection of extracted records into the canonical CV schema

use crate::processing::lexicon::Lexicons;
use crate::processing::record::{CvRecord, ExperienceItem, FormationItem};
use crate::processing::text_processor::{dedup_case_insensitive, normalize_key};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::LazyLock;

pub const CONFIDENTIALITY: &str = "C2 - Usage restreint";
pub const DOCUMENT_TITLE: &str = "CURRICULUM VITAE";

static FIRST_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("Invalid year regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub nom: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub adresse: Option<String>,
    pub titre_profil: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub confidentialite: String,
    pub titre_document: String,
    pub role: Option<String>,
    pub initiales: String,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            confidentialite: CONFIDENTIALITY.to_string(),
            titre_document: DOCUMENT_TITLE.to_string(),
            role: None,
            initiales: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceBlock {
    pub titre: Option<String>,
    pub entreprise: Option<String>,
    pub dates: Option<String>,
    pub lieu: Option<String>,
    #[serde(default)]
    pub missions: Vec<String>,
    pub environnement: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationEntry {
    pub etablissement: Option<String>,
    pub diplome: Option<String>,
    pub dates: Option<String>,
}

/// The record handed to template rendering. Every list is present, possibly
/// empty; missing scalars serialize as null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanonicalCv {
    pub contact: Contact,
    pub header: Header,
    pub competences_techniques: Vec<String>,
    pub competences_fonctionnelles: Vec<String>,
    pub experiences: Vec<ExperienceBlock>,
    pub formations: Vec<FormationEntry>,
    pub langues: Vec<String>,
    pub projets: Vec<String>,
    pub certifications: Vec<String>,
    pub loisirs: Vec<String>,
    pub disponibilite: Option<String>,
    pub dates: Vec<String>,
}

/// First four-digit year of a date string.
pub fn first_year(text: &str) -> Option<u16> {
    FIRST_YEAR.find(text).and_then(|m| m.as_str().parse().ok())
}

/// "Adèle Patarot" -> "AP". Empty for a missing name.
pub fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let initial = |word: &str| word.chars().next().map(|c| c.to_uppercase().collect::<String>());
    match words.as_slice() {
        [] => String::new(),
        [only] => initial(*only).unwrap_or_default(),
        [first, .., last] => format!(
            "{}{}",
            initial(*first).unwrap_or_default(),
            initial(*last).unwrap_or_default()
        ),
    }
}

/// Most recent first; undated items keep document order at the end.
fn by_year_descending(a: Option<u16>, b: Option<u16>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn year_of(dates: &Option<String>) -> Option<u16> {
    dates.as_deref().and_then(first_year)
}

fn experience_block(item: &ExperienceItem) -> ExperienceBlock {
    ExperienceBlock {
        titre: item.job_title.clone(),
        entreprise: item.company.clone(),
        dates: item.dates.clone(),
        lieu: item.location.clone(),
        missions: item.missions.clone(),
        environnement: item.environment.clone(),
    }
}

fn formation_entry(item: &FormationItem) -> FormationEntry {
    FormationEntry {
        etablissement: item.establishment.clone(),
        diplome: item.diploma.clone(),
        dates: item.dates.clone(),
    }
}

/// Re-sort both skill lists against the lexicon so they stay disjoint.
fn split_skills(record: &CvRecord, lexicons: &Lexicons) -> (Vec<String>, Vec<String>) {
    let mut technical = Vec::new();
    let mut functional = Vec::new();
    for skill in &record.skills.technical {
        if !lexicons.is_technical_skill(skill) && lexicons.is_functional_skill(skill) {
            functional.push(skill.clone());
        } else {
            technical.push(skill.clone());
        }
    }
    for skill in &record.skills.functional {
        if lexicons.is_technical_skill(skill) {
            technical.push(skill.clone());
        } else {
            functional.push(skill.clone());
        }
    }

    let technical = dedup_case_insensitive(technical);
    let taken: HashSet<String> = technical.iter().map(|s| normalize_key(s)).collect();
    let functional = dedup_case_insensitive(functional)
        .into_iter()
        .filter(|s| !taken.contains(&normalize_key(s)))
        .collect();
    (technical, functional)
}

pub fn normalize(record: &CvRecord) -> CanonicalCv {
    normalize_with(record, &Lexicons::builtin())
}

/// `normalize` against a lexicon carrying configured extras.
pub fn normalize_with(record: &CvRecord, lexicons: &Lexicons) -> CanonicalCv {
    let mut experiences: Vec<&ExperienceItem> = record.experiences.iter().collect();
    experiences.sort_by(|a, b| by_year_descending(year_of(&a.dates), year_of(&b.dates)));

    let mut formations: Vec<&FormationItem> = record.formations.iter().collect();
    formations.sort_by(|a, b| by_year_descending(year_of(&a.dates), year_of(&b.dates)));

    let (competences_techniques, competences_fonctionnelles) = split_skills(record, lexicons);
    let contact = &record.contact;

    CanonicalCv {
        contact: Contact {
            nom: contact.name.clone(),
            email: contact.email.clone(),
            telephone: contact.phone.clone(),
            adresse: contact.address.clone(),
            titre_profil: contact.profile_title.clone(),
        },
        header: Header {
            role: contact.profile_title.clone(),
            initiales: initials(contact.name.as_deref().unwrap_or_default()),
            ..Default::default()
        },
        competences_techniques,
        competences_fonctionnelles,
        experiences: experiences.into_iter().map(experience_block).collect(),
        formations: formations.into_iter().map(formation_entry).collect(),
        langues: record.languages.clone(),
        projets: record.projects.clone(),
        certifications: record.certifications.clone(),
        loisirs: record.hobbies.clone(),
        disponibilite: record.availability.clone(),
        dates: record.dates.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::record::{ContactRecord, SkillRecord};

    fn experience(company: &str, dates: Option<&str>) -> ExperienceItem {
        ExperienceItem {
            company: Some(company.to_string()),
            dates: dates.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_year_and_initials() {
        assert_eq!(first_year("Sept. 2019 – Juin 2021"), Some(2019));
        assert_eq!(first_year("S3 2024 – 2025"), Some(2024));
        assert_eq!(first_year("Présent"), None);
        assert_eq!(initials("Adèle Patarot"), "AP");
        assert_eq!(initials("jean claude van damme"), "JD");
        assert_eq!(initials("Cher"), "C");
        assert_eq!(initials(""), "");
    }

    #[test]
    fn test_anti_chronological_order() {
        let record = CvRecord {
            experiences: vec![
                experience("Undated A", None),
                experience("Capgemini", Some("2018 – 2021")),
                experience("AWS", Some("2021 – Présent")),
                experience("Undated B", None),
                experience("Sopra", Some("2015")),
            ],
            ..Default::default()
        };
        let cv = normalize(&record);
        let companies: Vec<_> = cv.experiences.iter().filter_map(|e| e.entreprise.as_deref()).collect();
        assert_eq!(companies, vec!["AWS", "Capgemini", "Sopra", "Undated A", "Undated B"]);
    }

    #[test]
    fn test_skills_are_disjoint() {
        let record = CvRecord {
            skills: SkillRecord {
                technical: vec!["Python".into(), "communication".into(), "python".into()],
                functional: vec!["Communication".into(), "Docker".into(), "gestion de projet".into()],
            },
            ..Default::default()
        };
        let cv = normalize(&record);
        assert_eq!(cv.competences_techniques, vec!["Python", "Docker"]);
        assert_eq!(cv.competences_fonctionnelles, vec!["communication", "gestion de projet"]);
    }

    #[test]
    fn test_header_and_empty_fields() {
        let record = CvRecord {
            contact: ContactRecord {
                name: Some("Adèle Patarot".into()),
                profile_title: Some("Data Analyst".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let cv = normalize(&record);
        assert_eq!(cv.header.initiales, "AP");
        assert_eq!(cv.header.role.as_deref(), Some("Data Analyst"));
        assert_eq!(cv.header.confidentialite, CONFIDENTIALITY);

        let json = serde_json::to_value(&cv).unwrap();
        assert_eq!(json["loisirs"], serde_json::json!([]));
        assert_eq!(json["experiences"], serde_json::json!([]));
        assert!(json["disponibilite"].is_null());
        assert!(json["contact"]["email"].is_null());
        assert_eq!(json["contact"]["nom"], "Adèle Patarot");
    }
}
