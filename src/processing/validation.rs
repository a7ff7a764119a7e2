//! Entity predicates applied to lexicon and learned candidates alike

pub use crate::processing::lexicon::canonical_language;

use crate::processing::lexicon::{
    is_company_stopword, is_generic_company_word, is_hobby_word, Lexicons,
    SCHOOL_KEYWORDS,
};
use crate::processing::patterns::{self, PROFICIENCY};
use crate::processing::regex_extractor::{self, street_names};
use crate::processing::text_processor::{
    collapse_whitespace, normalize_key, prefix_at_boundary, title_case,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("Invalid year regex"));

/// Address words of the document, used to reject street names read as person names.
#[derive(Debug, Default, Clone)]
pub struct AddressContext {
    street_phrases: HashSet<String>,
    address_tokens: HashSet<String>,
}

impl AddressContext {
    pub fn from_text(text: &str) -> Self {
        let mut ctx = Self::default();
        for street in street_names(text) {
            ctx.address_tokens
                .extend(street.split_whitespace().map(normalize_key));
            ctx.street_phrases.insert(normalize_key(&street));
        }
        for address in regex_extractor::extract_addresses(text) {
            ctx.address_tokens.extend(
                address
                    .split(|c: char| c.is_whitespace() || c == ',')
                    .filter(|t| t.chars().next().is_some_and(char::is_uppercase))
                    .map(normalize_key),
            );
        }
        ctx
    }

    /// True when `name` repeats a street phrase or only uses address words.
    pub fn conflicts_with(&self, name: &str) -> bool {
        let key = normalize_key(name);
        if self.street_phrases.contains(&key) {
            return true;
        }
        let tokens: Vec<String> = name.split_whitespace().map(normalize_key).collect();
        !tokens.is_empty() && tokens.iter().all(|t| self.address_tokens.contains(t))
    }
}

/// Capitalized ("Legrand", "Müller") or all caps ("PATAROT").
fn is_name_part(part: &str) -> bool {
    let mut chars = part.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_uppercase() {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    rest.iter().all(|c| c.is_lowercase()) || rest.iter().all(|c| c.is_uppercase())
}

pub fn is_valid_person_name(candidate: &str, lexicons: &Lexicons, addresses: &AddressContext) -> bool {
    let name = collapse_whitespace(candidate);
    let len = name.chars().count();
    if !(4..=50).contains(&len) {
        return false;
    }
    if !name
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '\'' || c == '’')
    {
        return false;
    }

    let tokens: Vec<&str> = name.split(' ').collect();
    if !(2..=4).contains(&tokens.len()) {
        return false;
    }
    for token in &tokens {
        if token.chars().filter(|c| c.is_alphabetic()).count() < 2 {
            return false;
        }
        let parts: Vec<&str> = token
            .split(['-', '\'', '’'])
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() || !parts.iter().all(|p| is_name_part(p)) {
            return false;
        }
        if lexicons.is_noise_word(token) || parts.iter().any(|p| lexicons.is_noise_word(p)) {
            return false;
        }
    }

    if lexicons.is_section_title(&name) || lexicons.has_section_fragment(&name) {
        return false;
    }
    !addresses.conflicts_with(&name)
}

/// "adele.patarot@gmail.com" -> "Adele Patarot".
pub fn name_from_email(email: &str) -> Option<String> {
    let local = email.split('@').next()?.trim_end_matches(|c: char| c.is_ascii_digit());
    let parts: Vec<&str> = local.split(['.', '_']).filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return None;
    }
    let first = parts[0];
    let last = parts[parts.len() - 1];
    let plausible = |p: &str| {
        p.chars().count() >= 2 && p.chars().all(|c| c.is_alphabetic() || c == '-')
    };
    if !plausible(first) || !plausible(last) {
        return None;
    }
    Some(format!("{} {}", title_case(first), title_case(last)))
}

pub fn is_valid_company(candidate: &str, lexicons: &Lexicons) -> bool {
    let company = collapse_whitespace(candidate.trim_matches(|c: char| c == ',' || c == '.' || c == ':'));
    let len = company.chars().count();
    if !(2..=100).contains(&len) {
        return false;
    }
    if lexicons.is_known_company(&company) {
        return true;
    }
    if is_company_stopword(&company)
        || lexicons.is_section_title(&company)
        || lexicons.has_section_fragment(&company)
        || YEAR.is_match(&company)
        || company.contains('@')
    {
        return false;
    }
    if !company.chars().any(char::is_alphabetic) {
        return false;
    }

    let tokens: Vec<&str> = company.split_whitespace().collect();
    if tokens.len() > 5 {
        return false;
    }
    if tokens.len() == 1 && (is_generic_company_word(&company) || lexicons.is_technical_skill(&company)) {
        return false;
    }
    tokens
        .iter()
        .any(|t| t.chars().next().is_some_and(|c| c.is_uppercase() || c.is_ascii_digit()))
}

pub fn is_valid_school(candidate: &str, lexicons: &Lexicons) -> bool {
    let school = collapse_whitespace(candidate);
    if school.chars().count() < 2 || school.chars().count() > 120 {
        return false;
    }
    if school.split_whitespace().any(is_hobby_word) {
        return false;
    }
    let key = normalize_key(&school);
    if SCHOOL_KEYWORDS.iter().any(|kw| key.contains(&normalize_key(kw))) || lexicons.mentions_known_school(&school) {
        return true;
    }
    let tokens: Vec<&str> = school.split_whitespace().collect();
    tokens.len() >= 2
        && tokens[0].chars().next().is_some_and(char::is_uppercase)
        && !school.chars().any(|c| c.is_ascii_digit())
        && !patterns::looks_like_diploma(&school)
}

/// Pattern-library diplomas, or any short phrase that is not a section title.
pub fn is_valid_diploma(candidate: &str, lexicons: &Lexicons) -> bool {
    let diploma = candidate.trim();
    if !(2..=120).contains(&diploma.chars().count()) {
        return false;
    }
    patterns::looks_like_diploma(diploma)
        || (!lexicons.is_section_title(diploma) && diploma.chars().any(char::is_alphabetic))
}

pub fn is_valid_job_title(candidate: &str, lexicons: &Lexicons) -> bool {
    let title = candidate.trim();
    let len = title.chars().count();
    (3..=80).contains(&len)
        && !lexicons.is_section_title(title)
        && !title.contains('@')
        && !YEAR.is_match(title)
        && title.chars().any(char::is_alphabetic)
}

pub fn is_valid_skill(candidate: &str, lexicons: &Lexicons) -> bool {
    let skill = candidate.trim();
    skill.chars().count() >= 2
        && !skill.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
        && !lexicons.is_section_title(skill)
}

/// "Anglais : courant (C1)" -> "Anglais (courant)", "English" -> "Anglais".
pub fn canonical_language_entry(text: &str) -> Option<String> {
    let found = patterns::LANGUAGE_WORD.find(text)?;
    let display = canonical_language(found.as_str())?;
    let tail = &text[found.end()..];
    let segment_end = tail.find(['\n', ',', ';', '|']).unwrap_or(tail.len());
    let segment = prefix_at_boundary(&tail[..segment_end], 60);
    match PROFICIENCY.find(segment) {
        Some(level) => Some(format!("{} ({})", display, normalize_level(level.as_str()))),
        None => Some(display.to_string()),
    }
}

fn normalize_level(level: &str) -> String {
    let level = collapse_whitespace(level);
    if level.len() == 2 && level.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        level.to_uppercase()
    } else if level.to_lowercase().starts_with("toe") || level.to_lowercase().starts_with("iel") {
        level
    } else {
        level.to_lowercase()
    }
}

pub fn is_valid_location(candidate: &str) -> bool {
    let location = candidate.trim();
    location.chars().count() >= 2
        && location
            .chars()
            .next()
            .is_some_and(|c| c.is_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex() -> std::sync::Arc<Lexicons> {
        Lexicons::builtin()
    }

    #[test]
    fn test_valid_person_names() {
        let ctx = AddressContext::default();
        assert!(is_valid_person_name("Marie-Claire Legrand", &lex(), &ctx));
        assert!(is_valid_person_name("François Érique Müller", &lex(), &ctx));
        assert!(is_valid_person_name("Adèle PATAROT", &lex(), &ctx));
        assert!(is_valid_person_name("Jean D'Ormesson", &lex(), &ctx));
    }

    #[test]
    fn test_rejected_person_names() {
        let ctx = AddressContext::default();
        assert!(!is_valid_person_name("Chef de Projet Développement", &lex(), &ctx));
        assert!(!is_valid_person_name("COMPETENCES TECHNIQU ES", &lex(), &ctx));
        assert!(!is_valid_person_name("Python Docker", &lex(), &ctx));
        assert!(!is_valid_person_name("Madonna", &lex(), &ctx));
        assert!(!is_valid_person_name("Jean Dupont 2", &lex(), &ctx));
        assert!(!is_valid_person_name("Ingénieur Logiciel", &lex(), &ctx));
    }

    #[test]
    fn test_street_name_is_not_a_person() {
        let text = "Adèle Patarot\n21, rue Pierre Bourdan, 78160 Marly-le-Roi";
        let ctx = AddressContext::from_text(text);
        assert!(!is_valid_person_name("Pierre Bourdan", &lex(), &ctx));
        assert!(is_valid_person_name("Adèle Patarot", &lex(), &ctx));
    }

    #[test]
    fn test_name_from_email() {
        assert_eq!(name_from_email("adele.patarot@gmail.com").as_deref(), Some("Adele Patarot"));
        assert_eq!(
            name_from_email("jean-pierre.martin92@free.fr").as_deref(),
            Some("Jean-Pierre Martin")
        );
        assert_eq!(name_from_email("contact@acme.fr"), None);
        assert_eq!(name_from_email("j.doe@acme.fr"), None);
    }

    #[test]
    fn test_companies() {
        assert!(is_valid_company("AWS", &lex()));
        assert!(is_valid_company("I NETUM", &lex()));
        assert!(is_valid_company("Société Générale", &lex()));
        assert!(!is_valid_company("Python", &lex()));
        assert!(!is_valid_company("stage", &lex()));
        assert!(!is_valid_company("Environnement technique", &lex()));
        assert!(!is_valid_company("2021", &lex()));
        assert!(!is_valid_company("freelance", &lex()));
    }

    #[test]
    fn test_schools() {
        assert!(is_valid_school("Université Paris-Saclay", &lex()));
        assert!(is_valid_school("EPITA", &lex()));
        assert!(!is_valid_school("Club de football", &lex()));
        assert!(!is_valid_school("Master Informatique", &lex()));
    }

    #[test]
    fn test_language_entries() {
        assert_eq!(canonical_language_entry("Anglais : courant (C1)").as_deref(), Some("Anglais (courant)"));
        assert_eq!(canonical_language_entry("English - B2").as_deref(), Some("Anglais (B2)"));
        assert_eq!(canonical_language_entry("Espagnol").as_deref(), Some("Espagnol"));
        assert_eq!(canonical_language_entry("Python"), None);
    }
}
