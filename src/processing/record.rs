//! Typed records assembled by the parsers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profile_title: Option<String>,
}

impl ContactRecord {
    /// Copy fields of `other` into the ones still unset here.
    pub fn fill_missing_from(&mut self, other: &ContactRecord) {
        fill(&mut self.name, &other.name);
        fill(&mut self.email, &other.email);
        fill(&mut self.phone, &other.phone);
        fill(&mut self.address, &other.address);
        fill(&mut self.profile_title, &other.profile_title);
    }

    pub fn has_identity(&self) -> bool {
        is_set(&self.name) || is_set(&self.email)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormationItem {
    pub establishment: Option<String>,
    pub diploma: Option<String>,
    pub dates: Option<String>,
}

impl FormationItem {
    pub fn is_retained(&self) -> bool {
        is_set(&self.establishment) || is_set(&self.diploma)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub company: Option<String>,
    pub job_title: Option<String>,
    pub dates: Option<String>,
    pub location: Option<String>,
    pub missions: Vec<String>,
    pub environment: Option<String>,
}

/// Two disjoint, de-duplicated skill lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub technical: Vec<String>,
    pub functional: Vec<String>,
}

impl SkillRecord {
    pub fn is_empty(&self) -> bool {
        self.technical.is_empty() && self.functional.is_empty()
    }
}

/// Everything extracted from one CV, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvRecord {
    pub contact: ContactRecord,
    pub formations: Vec<FormationItem>,
    pub experiences: Vec<ExperienceItem>,
    pub skills: SkillRecord,
    pub languages: Vec<String>,
    pub projects: Vec<String>,
    pub certifications: Vec<String>,
    pub hobbies: Vec<String>,
    pub availability: Option<String>,
    pub dates: Vec<String>,
}

impl CvRecord {
    /// Fill unset contact fields and empty lists from `other`. Anything the
    /// record already holds is kept.
    pub fn fill_missing_from(&mut self, other: &CvRecord) {
        self.contact.fill_missing_from(&other.contact);
        fill_list(&mut self.formations, &other.formations);
        fill_list(&mut self.experiences, &other.experiences);
        fill_list(&mut self.skills.technical, &other.skills.technical);
        fill_list(&mut self.skills.functional, &other.skills.functional);
        fill_list(&mut self.languages, &other.languages);
        fill_list(&mut self.projects, &other.projects);
        fill_list(&mut self.certifications, &other.certifications);
        fill_list(&mut self.hobbies, &other.hobbies);
        fill_list(&mut self.dates, &other.dates);
        fill(&mut self.availability, &other.availability);
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn fill(slot: &mut Option<String>, other: &Option<String>) {
    if !is_set(slot) && is_set(other) {
        *slot = other.clone();
    }
}

fn fill_list<T: Clone>(slot: &mut Vec<T>, other: &[T]) {
    if slot.is_empty() {
        *slot = other.to_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_missing_keeps_primary_fields() {
        let mut primary = CvRecord {
            contact: ContactRecord {
                name: Some("Adèle Patarot".to_string()),
                email: Some(" ".to_string()),
                ..Default::default()
            },
            languages: vec!["Anglais".to_string()],
            ..Default::default()
        };
        let fallback = CvRecord {
            contact: ContactRecord {
                name: Some("Pierre Bourdan".to_string()),
                email: Some("adele.patarot@gmail.com".to_string()),
                phone: Some("06 12 34 56 78".to_string()),
                ..Default::default()
            },
            languages: vec!["Espagnol".to_string()],
            skills: SkillRecord {
                technical: vec!["Python".to_string()],
                functional: vec![],
            },
            ..Default::default()
        };

        primary.fill_missing_from(&fallback);
        assert_eq!(primary.contact.name.as_deref(), Some("Adèle Patarot"));
        assert_eq!(primary.contact.email.as_deref(), Some("adele.patarot@gmail.com"));
        assert_eq!(primary.contact.phone.as_deref(), Some("06 12 34 56 78"));
        assert_eq!(primary.languages, vec!["Anglais"]);
        assert_eq!(primary.skills.technical, vec!["Python"]);
    }

    #[test]
    fn test_retention_rules() {
        assert!(!FormationItem::default().is_retained());
        assert!(FormationItem {
            diploma: Some("BTS SIO".to_string()),
            ..Default::default()
        }
        .is_retained());
        assert!(ContactRecord {
            email: Some("a.b@c.fr".to_string()),
            ..Default::default()
        }
        .has_identity());
    }
}
