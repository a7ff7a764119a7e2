//! Per-section parsers turning section text and entities into records

use crate::processing::document::{SectionCategory, Sections};
use crate::processing::lexicon::{
    contains_phrase, is_company_stopword, strip_skill_noise, Lexicons, SCHOOL_KEYWORDS,
};
use crate::processing::ner::{EntityKind, EntityMap};
use crate::processing::patterns::{self, COMPANY_AFTER_PREPOSITION, COMPANY_BEFORE_ROLE, LANGUAGE_WORD};
use crate::processing::record::{ContactRecord, CvRecord, ExperienceItem, FormationItem, SkillRecord};
use crate::processing::regex_extractor::{
    extract_addresses, extract_dates, extract_emails, extract_phones, find_dates, DateForm, DateMatch,
};
use crate::processing::text_processor::{
    capitalize_first, clean_section_text, collapse_whitespace, dedup_case_insensitive, is_bullet_line,
    normalize_key, prefix_at_boundary, strip_bullet, uppercase_ratio,
};
use crate::processing::validation::{self, canonical_language, canonical_language_entry};
use log::debug;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Bytes of the document head searched for the profile title.
const PROFILE_TITLE_WINDOW: usize = 500;

static DASH_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*[-–—]\s*").expect("Invalid dash regex"));

static PRESENT_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:actuellement|actuel|aujourd['’]hui|ce\s+jour|pr[ée]sent|now|en\s+cours)(?:\b|$)")
        .expect("Invalid present regex")
});

static SINCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*depuis\s+(.+?)\s*$").expect("Invalid since regex")
});

static ENVIRONMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:environnements?|stack|outils)(?:\s+(?:techniques?|technologiques?))?\s*:\s*(.+)$")
        .expect("Invalid environment regex")
});

static INTERNSHIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:stage|stagiaire|alternance)\b.*?\b(?i:chez)\s+(.+?)\s+(?i:en\s+tant\s+qu(?:e|['’]))\s*(.+?)[\s.;]*$")
        .expect("Invalid internship regex")
});

static TITLE_AT_COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+(?:(?i:chez|at|pour)|@)\s+(.+)$").expect("Invalid title/company regex")
});

static EXPERIENCE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[–—|]\s*|\s+-\s+").expect("Invalid split regex"));

static FORMATION_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*[–—|;,]\s*|\s+-\s+").expect("Invalid split regex"));

static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\s*\)|\[\s*\]").expect("Invalid brackets regex"));

static PAREN_TAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*\(([^()]*)\)\s*$").expect("Invalid parenthesis regex"));

static PARENTHESES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^()]*\)").expect("Invalid parenthesis regex"));

static SCHOOL_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:]{2,80}?)\s*:\s*(.+)$").expect("Invalid school regex"));

static POSTAL_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{5}$").expect("Invalid postal regex"));

static SKILL_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;•·|▪●➢►\n]|\s+-\s+").expect("Invalid skill split regex"));

static HOBBY_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;•·|▪●➢►\n]|\s+-\s+").expect("Invalid hobby split regex"));

static HOBBY_CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:(?:et|ou|de|à|en)\s|d['’])").expect("Invalid connector regex"));

static AVAILABILITY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*disponibilit[ée]s?[ \t]*:[ \t]*(.+?)[ \t]*$").expect("Invalid availability regex")
});

static AVAILABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdisponible\s+(?:imm[ée]diatement|d[èe]s\s+[^\n.,;]+|[àa]\s+partir\s+d[ue]\s+[^\n.,;]+|en\s+[^\n.,;]+|sous\s+[^\n.,;]+|le\s+[^\n.,;]+)")
        .expect("Invalid availability regex")
});

/// Display form of a date range: one spaced en dash, "Présent" for open ends.
/// "2021-Présent" -> "2021 – Présent", "Depuis 2020" -> "2020 – Présent".
pub fn normalize_date_range(raw: &str) -> String {
    let raw = collapse_whitespace(raw);
    if let Some(caps) = SINCE.captures(&raw) {
        return format!("{} – Présent", &caps[1]);
    }
    let dashed = DASH_RUN.replace_all(&raw, " – ");
    collapse_whitespace(&PRESENT_WORDS.replace_all(&dashed, "Présent"))
}

fn experience_dates(date: &DateMatch) -> String {
    if date.form.is_range() {
        normalize_date_range(&date.text)
    } else {
        date.text.clone()
    }
}

/// The date that anchors a line: the first range, else a date opening the line.
fn anchor_date(line: &str) -> Option<DateMatch> {
    let dates = find_dates(line);
    let range = dates.iter().position(|d| d.form.is_range());
    match range {
        Some(i) => dates.into_iter().nth(i),
        None => dates.into_iter().find(|d| d.start == 0),
    }
}

/// `line` without the `date` text, empty brackets and dangling separators.
fn without_date(line: &str, date: &DateMatch) -> String {
    let joined = format!("{} {}", &line[..date.start], &line[date.end..]);
    let cleaned = EMPTY_BRACKETS.replace_all(&joined, "");
    trim_separators(&collapse_whitespace(&cleaned)).to_string()
}

fn trim_separators(text: &str) -> &str {
    text.trim_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | ';' | '–' | '—' | '-' | '|'))
}

fn school_like(piece: &str, lexicons: &Lexicons) -> bool {
    let key = normalize_key(piece);
    let keyword = SCHOOL_KEYWORDS.iter().any(|kw| contains_phrase(&key, &normalize_key(kw)));
    (keyword || lexicons.mentions_known_school(piece) || !patterns::find_schools(piece).is_empty())
        && validation::is_valid_school(piece, lexicons)
        && !patterns::looks_like_diploma(piece)
}

fn mentions_job(piece: &str) -> bool {
    patterns::looks_like_job_title(piece) || contains_phrase(&normalize_key(piece), "chez")
}

fn pieces<'a>(text: &'a str, splitter: &Regex) -> Vec<&'a str> {
    splitter
        .split(text)
        .map(trim_separators)
        .filter(|p| p.chars().any(char::is_alphanumeric))
        .collect()
}

enum Order {
    DiplomaFirst,
    SchoolFirst,
}

/// Diploma and school among pieces, by keyword first, then by position.
fn assign_pieces(parts: &[&str], order: Option<Order>, lexicons: &Lexicons) -> (Option<String>, Option<String>) {
    let diploma = parts.iter().position(|p| patterns::looks_like_diploma(p));
    let school = parts
        .iter()
        .enumerate()
        .position(|(i, p)| Some(i) != diploma && school_like(p, lexicons));

    let pick = |i: Option<usize>| i.map(|i| collapse_whitespace(&PARENTHESES.replace_all(parts[i], "")));
    match (diploma, school) {
        (Some(_), Some(_)) => (pick(diploma), pick(school)),
        (Some(d), None) if parts.len() == 2 => {
            let other = 1 - d;
            let school = validation::is_valid_school(parts[other], lexicons).then_some(other);
            (pick(Some(d)), pick(school))
        }
        (None, Some(s)) if parts.len() == 2 => {
            let other = 1 - s;
            let diploma = validation::is_valid_diploma(parts[other], lexicons).then_some(other);
            (pick(diploma), pick(Some(s)))
        }
        (None, None) if parts.len() == 2 => match order {
            Some(Order::DiplomaFirst) => (pick(Some(0)), pick(Some(1))),
            Some(Order::SchoolFirst) => (pick(Some(1)), pick(Some(0))),
            None => (None, None),
        },
        _ => (pick(diploma), pick(school)),
    }
}

/// One formation line, possibly partial (only a school, a diploma or dates).
fn parse_formation_line(line: &str, lexicons: &Lexicons) -> Option<FormationItem> {
    let date = anchor_date(line);
    let dates = date.as_ref().map(|d| d.text.clone());
    let rest = match &date {
        Some(d) => without_date(line, d),
        None => line.to_string(),
    };

    if rest.is_empty() {
        return dates.map(|dates| FormationItem {
            dates: Some(dates),
            ..Default::default()
        });
    }

    // "school : description (city)"
    if date.as_ref().map_or(true, |d| d.start > 0) {
        if let Some(caps) = SCHOOL_COLON.captures(&rest) {
            let school = caps[1].trim();
            if school_like(school, lexicons) {
                let description = match PAREN_TAIL.captures(caps[2].trim()) {
                    Some(inner) => inner[1].to_string(),
                    None => caps[2].trim().to_string(),
                };
                let description = trim_separators(&description).to_string();
                return Some(FormationItem {
                    establishment: Some(school.to_string()),
                    diploma: (!description.is_empty()).then_some(description),
                    dates,
                });
            }
        }
    }

    let parts = pieces(&rest, &FORMATION_SPLIT);
    if parts.iter().any(|p| mentions_job(p) && !patterns::looks_like_diploma(p)) {
        return None;
    }

    let order = date.as_ref().map(|d| {
        let in_parens = line[..d.start].trim_end().ends_with('(') && line[d.end..].trim_start().starts_with(')');
        if d.start == 0 {
            // "DATE : diploma – school"
            Order::DiplomaFirst
        } else if in_parens {
            // "school – diploma (DATE)"
            Order::SchoolFirst
        } else {
            // "diploma, school, DATE"
            Order::DiplomaFirst
        }
    });
    let (diploma, establishment) = assign_pieces(&parts, order, lexicons);

    if diploma.is_none() && establishment.is_none() {
        return None;
    }
    Some(FormationItem {
        establishment,
        diploma,
        dates,
    })
}

fn can_absorb(pending: &FormationItem, item: &FormationItem) -> bool {
    (item.establishment.is_none() || pending.establishment.is_none())
        && (item.diploma.is_none() || pending.diploma.is_none())
        && (item.dates.is_none() || pending.dates.is_none())
}

/// Formations of an EDUCATION block. A formation may span several lines.
pub fn parse_formations(section: &str, lexicons: &Lexicons) -> Vec<FormationItem> {
    let cleaned = clean_section_text(section);
    let mut items: Vec<FormationItem> = Vec::new();
    let mut pending: Option<FormationItem> = None;

    for raw in cleaned.lines() {
        let line = collapse_whitespace(strip_bullet(raw));
        if line.is_empty() || lexicons.is_section_title(&line) {
            continue;
        }
        let Some(item) = parse_formation_line(&line, lexicons) else {
            continue;
        };
        match pending.as_mut() {
            Some(current) if can_absorb(current, &item) => {
                current.establishment = current.establishment.take().or(item.establishment);
                current.diploma = current.diploma.take().or(item.diploma);
                current.dates = current.dates.take().or(item.dates);
            }
            _ => {
                commit_formation(pending.replace(item), &mut items);
            }
        }
    }
    commit_formation(pending, &mut items);
    items
}

fn commit_formation(item: Option<FormationItem>, items: &mut Vec<FormationItem>) {
    if let Some(item) = item.filter(FormationItem::is_retained) {
        if !items.contains(&item) {
            items.push(item);
        }
    }
}

/// "AWS (Paris)" / "AWS, Paris" -> ("AWS", Some("Paris")).
fn split_location(text: &str) -> (String, Option<String>) {
    if let Some(caps) = PAREN_TAIL.captures(text) {
        let place = caps[2].trim();
        if validation::is_valid_location(place) && find_dates(place).is_empty() {
            return (trim_separators(&caps[1]).to_string(), Some(place.to_string()));
        }
        return (trim_separators(&caps[1]).to_string(), None);
    }
    match text.split_once(", ") {
        Some((company, place)) if validation::is_valid_location(place) => {
            (company.trim().to_string(), Some(place.trim().to_string()))
        }
        _ => (trim_separators(text).to_string(), None),
    }
}

fn apply_internship(item: &mut ExperienceItem, line: &str) -> bool {
    match INTERNSHIP.captures(line) {
        Some(caps) => {
            let (company, _) = split_location(caps[1].trim());
            item.company = Some(company);
            item.job_title = Some(capitalize_first(caps[2].trim()));
            true
        }
        None => false,
    }
}

fn fill_title_and_company(item: &mut ExperienceItem, rest: &str, lexicons: &Lexicons) {
    if rest.is_empty() || apply_internship(item, rest) {
        return;
    }
    if let Some(caps) = TITLE_AT_COMPANY.captures(rest) {
        let (company, location) = split_location(caps[2].trim());
        item.job_title = Some(trim_separators(&caps[1]).to_string());
        item.company = Some(company);
        item.location = item.location.take().or(location);
        return;
    }

    let parts = pieces(rest, &EXPERIENCE_SPLIT);
    match parts.as_slice() {
        [] => {}
        [single] => {
            if patterns::looks_like_job_title(single) {
                item.job_title = Some(single.to_string());
            } else if validation::is_valid_company(single, lexicons) {
                let (company, location) = split_location(single);
                item.company = Some(company);
                item.location = item.location.take().or(location);
            } else {
                item.job_title = Some(single.to_string());
            }
        }
        [first, second, tail @ ..] => {
            let (title, company) =
                if patterns::looks_like_job_title(second) && !patterns::looks_like_job_title(first) {
                    (*second, *first)
                } else {
                    (*first, *second)
                };
            item.job_title = Some(title.to_string());
            let (company, location) = split_location(company);
            item.company = Some(company);
            let tail_location = tail
                .first()
                .filter(|p| validation::is_valid_location(p))
                .map(|p| p.to_string());
            item.location = item.location.take().or(location).or(tail_location);
        }
    }
}

/// A dated line opening a new experience, unless it reads as a formation.
fn experience_header(line: &str, lexicons: &Lexicons) -> Option<ExperienceItem> {
    let date = anchor_date(line)?;
    if !patterns::find_diplomas(line).is_empty() || !patterns::find_schools(line).is_empty() {
        return None;
    }
    let mut item = ExperienceItem {
        dates: Some(experience_dates(&date)),
        ..Default::default()
    };
    let rest = without_date(line, &date);
    if date.form == DateForm::Semester {
        // "S3 2024 – 2025 Paris": dates and place only, the block fills up later.
        if apply_internship(&mut item, &rest) {
            return Some(item);
        }
        if !rest.is_empty() {
            item.location = Some(rest);
        }
        return Some(item);
    }
    fill_title_and_company(&mut item, &rest, lexicons);
    Some(item)
}

fn fill_from_plain_line(item: &mut ExperienceItem, line: &str, lexicons: &Lexicons) {
    if item.company.is_none() {
        if let Some(caps) = COMPANY_AFTER_PREPOSITION.captures(line) {
            let company = trim_separators(&caps[1]).to_string();
            if validation::is_valid_company(&company, lexicons) {
                if item.job_title.is_none() {
                    if let Some((s, e)) = patterns::first_job_title(line) {
                        item.job_title = Some(line[s..e].to_string());
                    }
                }
                item.company = Some(company);
                return;
            }
        }
        if let Some(caps) = COMPANY_BEFORE_ROLE.captures(line) {
            let company = caps[1].trim().to_string();
            if validation::is_valid_company(&company, lexicons) {
                let role = trim_separators(&line[caps.get(1).map_or(0, |m| m.end())..]).to_string();
                if item.job_title.is_none() && !role.is_empty() {
                    item.job_title = Some(role);
                }
                item.company = Some(company);
                return;
            }
        }
        let short = line.split_whitespace().count() <= 5;
        let capitalized = line.chars().next().is_some_and(|c| c.is_uppercase());
        if short && capitalized && !patterns::looks_like_job_title(line) && validation::is_valid_company(line, lexicons) {
            let (company, location) = split_location(line);
            item.company = Some(company);
            item.location = item.location.take().or(location);
            return;
        }
    }
    if item.job_title.is_none() && patterns::looks_like_job_title(line) && line.split_whitespace().count() <= 8 {
        item.job_title = Some(line.to_string());
        return;
    }
    item.missions.push(line.to_string());
}

fn commit_experience(item: Option<ExperienceItem>, items: &mut Vec<ExperienceItem>, lexicons: &Lexicons) {
    let Some(item) = item else {
        return;
    };
    match item.company.as_deref() {
        Some(company) if validation::is_valid_company(company, lexicons) => items.push(item),
        _ => debug!("Dropping experience without a valid company: {:?}", item.job_title),
    }
}

/// Experiences of an EXPERIENCE block, in document order.
pub fn parse_experiences(section: &str, lexicons: &Lexicons) -> Vec<ExperienceItem> {
    let cleaned = clean_section_text(section);
    let mut items = Vec::new();
    let mut current: Option<ExperienceItem> = None;

    for raw in cleaned.lines() {
        let line = collapse_whitespace(raw);
        if line.is_empty() || lexicons.is_section_title(&line) {
            continue;
        }

        if let Some(caps) = ENVIRONMENT.captures(strip_bullet(&line)) {
            current.get_or_insert_with(ExperienceItem::default).environment =
                Some(collapse_whitespace(caps[1].trim_end_matches('.')));
            continue;
        }

        if !is_bullet_line(raw) {
            if let Some(header) = experience_header(&line, lexicons) {
                commit_experience(current.take(), &mut items, lexicons);
                current = Some(header);
                continue;
            }
        }

        // "Stage ... chez X en tant que Y" rewrites company and title, never the dates.
        let block = current.get_or_insert_with(ExperienceItem::default);
        if apply_internship(block, strip_bullet(&line)) {
            continue;
        }

        if is_bullet_line(raw) {
            let mission = strip_bullet(&line);
            if !mission.is_empty() {
                block.missions.push(mission.to_string());
            }
            continue;
        }
        fill_from_plain_line(block, &line, lexicons);
    }
    commit_experience(current.take(), &mut items, lexicons);
    items
}

/// Skill tokens of a block, flagged when they label a "Label : values" line.
fn split_skill_tokens(section: &str) -> Vec<(String, bool)> {
    let mut tokens = Vec::new();
    for raw in clean_section_text(section).lines() {
        let line = strip_bullet(raw);
        let values = match line.split_once(':') {
            Some((label, values)) if label.split_whitespace().count() <= 3 => {
                tokens.push((label.to_string(), true));
                values
            }
            _ => line,
        };
        tokens.extend(SKILL_SPLIT.split(values).map(|t| (t.to_string(), false)));
    }
    tokens
}

fn clean_skill_token(token: &str) -> String {
    let token = strip_skill_noise(strip_bullet(token));
    let token = PARENTHESES.replace_all(token, "");
    collapse_whitespace(token.trim_end_matches(['.', ':']))
}

fn is_skill_candidate(token: &str, lexicons: &Lexicons) -> bool {
    if token.chars().count() < 2 || token.split_whitespace().count() > 6 {
        return false;
    }
    if token.chars().all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '%') || POSTAL_CODE.is_match(token) {
        return false;
    }
    if lexicons.is_section_title(token) {
        return false;
    }
    if is_company_stopword(token) && !lexicons.is_technical_skill(token) && !lexicons.is_functional_skill(token) {
        return false;
    }
    // Split header remains ("COMPETENCES", "TECHNIQU")
    !(uppercase_ratio(token) > 0.8 && lexicons.has_section_fragment(token))
}

/// Technical and functional skills of a SKILLS block.
pub fn parse_skills(section: &str, lexicons: &Lexicons) -> SkillRecord {
    let mut record = SkillRecord::default();
    let mut seen = HashSet::new();

    for (token, is_label) in split_skill_tokens(section) {
        let token = clean_skill_token(&token);
        if !is_skill_candidate(&token, lexicons) {
            continue;
        }
        if is_label && !lexicons.is_technical_skill(&token) && !lexicons.is_functional_skill(&token) {
            continue;
        }
        if seen.insert(normalize_key(&token)) {
            classify_skill(&mut record, token, lexicons);
        }
    }
    record
}

/// Exact technical match first, then functional keywords, technical otherwise.
fn classify_skill(record: &mut SkillRecord, skill: String, lexicons: &Lexicons) {
    if lexicons.is_technical_skill(&skill) {
        record.technical.push(skill);
    } else if lexicons.is_functional_skill(&skill) {
        record.functional.push(skill);
    } else {
        record.technical.push(skill);
    }
}

/// Earliest job title in the head of the document.
pub fn extract_profile_title(text: &str) -> Option<String> {
    let head = prefix_at_boundary(text, PROFILE_TITLE_WINDOW);
    patterns::first_job_title(head).map(|(s, e)| collapse_whitespace(&head[s..e]))
}

/// One entry per non-empty line, bullets stripped.
pub fn parse_list_section(section: &str) -> Vec<String> {
    let lines = clean_section_text(section)
        .lines()
        .map(|l| collapse_whitespace(strip_bullet(l)))
        .filter(|l| l.chars().any(char::is_alphanumeric))
        .collect::<Vec<_>>();
    dedup_case_insensitive(lines)
}

pub fn parse_hobbies(section: &str) -> Vec<String> {
    let cleaned = clean_section_text(section);
    let items = HOBBY_SPLIT
        .split(&cleaned)
        .map(|item| collapse_whitespace(strip_bullet(item).trim_end_matches('.')))
        .filter(|item| {
            let len = item.chars().count();
            len > 2
                && len < 100
                && !item.starts_with(|c: char| c.is_ascii_digit())
                && !item.contains('@')
                && item.chars().filter(|c| c.is_ascii_digit()).count() < 5
                && !HOBBY_CONNECTOR.is_match(item)
                && crate::processing::segmenter::header_category(item).is_none()
        })
        .collect::<Vec<_>>();
    dedup_case_insensitive(items)
}

pub fn extract_availability(text: &str) -> Option<String> {
    if let Some(caps) = AVAILABILITY_LABEL.captures(text) {
        let value = collapse_whitespace(&caps[1]);
        if !value.is_empty() {
            return Some(capitalize_first(&value));
        }
    }
    AVAILABLE
        .find(text)
        .map(|m| capitalize_first(&collapse_whitespace(m.as_str())))
}

/// Languages of a LANGUAGES block with their level, one entry per language.
pub fn parse_languages(section: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut languages = Vec::new();
    for m in LANGUAGE_WORD.find_iter(section) {
        let Some(display) = canonical_language(m.as_str()) else {
            continue;
        };
        if !seen.insert(display) {
            continue;
        }
        if let Some(entry) = canonical_language_entry(&section[m.start()..]) {
            languages.push(entry);
        }
    }
    languages
}

/// Section text, or the unclaimed remainder when the section is missing.
fn section_or_rest(sections: &Sections, category: SectionCategory) -> &str {
    if sections.contains(category) {
        sections.get(category)
    } else {
        sections.get(SectionCategory::Other)
    }
}

fn is_contact_line(line: &str, name: Option<&str>) -> bool {
    let line = collapse_whitespace(line);
    name.is_some_and(|n| normalize_key(&line).contains(&normalize_key(n)))
        || !extract_emails(&line).is_empty()
        || !extract_phones(&line).is_empty()
        || !extract_addresses(&line).is_empty()
}

/// Experiences of a CV without an EXPERIENCE header.
///
/// Only date-anchored blocks of the unclaimed remainder count, and the
/// candidate's name and contact lines never reach the parser.
fn experiences_from_rest(rest: &str, name: Option<&str>, lexicons: &Lexicons) -> Vec<ExperienceItem> {
    let kept = rest
        .lines()
        .filter(|line| !is_contact_line(line, name))
        .collect::<Vec<_>>()
        .join("\n");
    let mut items = parse_experiences(&kept, lexicons);
    items.retain(|item| item.dates.is_some());
    items
}

/// Assemble a record from the document text, its sections and its entities.
pub fn assemble_record(text: &str, sections: &Sections, entities: &EntityMap, lexicons: &Lexicons) -> CvRecord {
    let email = extract_emails(text).into_iter().next();
    let name = entities
        .first(EntityKind::PersonName)
        .map(str::to_string)
        .or_else(|| email.as_deref().and_then(validation::name_from_email));

    let contact = ContactRecord {
        name,
        email,
        phone: extract_phones(text).into_iter().next(),
        address: extract_addresses(text).into_iter().next(),
        profile_title: extract_profile_title(text),
    };

    let mut formations = parse_formations(section_or_rest(sections, SectionCategory::Education), lexicons);
    if formations.is_empty() {
        formations = formations_from_entities(entities);
    }

    let mut experiences = if sections.contains(SectionCategory::Experience) {
        parse_experiences(sections.get(SectionCategory::Experience), lexicons)
    } else {
        experiences_from_rest(sections.get(SectionCategory::Other), contact.name.as_deref(), lexicons)
    };
    if experiences.is_empty() {
        experiences = experiences_from_entities(entities, lexicons);
    }

    let mut skills = parse_skills(sections.get(SectionCategory::Skills), lexicons);
    if skills.technical.is_empty() {
        for skill in entities.get(EntityKind::Skill) {
            if !skills.functional.iter().any(|f| normalize_key(f) == normalize_key(skill)) {
                classify_skill(&mut skills, skill.clone(), lexicons);
            }
        }
        skills.technical = dedup_case_insensitive(&skills.technical);
    }

    let mut languages = parse_languages(sections.get(SectionCategory::Languages));
    if languages.is_empty() {
        languages = entities.get(EntityKind::Language).to_vec();
    }

    CvRecord {
        contact,
        formations,
        experiences,
        skills,
        languages,
        projects: parse_list_section(sections.get(SectionCategory::Projects)),
        certifications: parse_list_section(sections.get(SectionCategory::Certifications)),
        hobbies: parse_hobbies(sections.get(SectionCategory::Hobbies)),
        availability: extract_availability(text),
        dates: extract_dates(text),
    }
}

/// A record built from entity spans alone.
pub fn record_from_entities(entities: &EntityMap, lexicons: &Lexicons) -> CvRecord {
    let mut skills = SkillRecord::default();
    for skill in entities.get(EntityKind::Skill) {
        classify_skill(&mut skills, skill.clone(), lexicons);
    }
    CvRecord {
        contact: ContactRecord {
            name: entities.first(EntityKind::PersonName).map(str::to_string),
            address: entities.first(EntityKind::Location).map(str::to_string),
            profile_title: entities.first(EntityKind::JobTitle).map(str::to_string),
            ..Default::default()
        },
        formations: formations_from_entities(entities),
        experiences: experiences_from_entities(entities, lexicons),
        skills,
        languages: entities.get(EntityKind::Language).to_vec(),
        dates: entities.get(EntityKind::DateRange).to_vec(),
        ..Default::default()
    }
}

fn formations_from_entities(entities: &EntityMap) -> Vec<FormationItem> {
    let schools = entities.get(EntityKind::School);
    let diplomas = entities.get(EntityKind::Diploma);
    (0..schools.len().max(diplomas.len()))
        .map(|i| FormationItem {
            establishment: schools.get(i).cloned(),
            diploma: diplomas.get(i).cloned(),
            dates: None,
        })
        .filter(FormationItem::is_retained)
        .collect()
}

fn experiences_from_entities(entities: &EntityMap, lexicons: &Lexicons) -> Vec<ExperienceItem> {
    let titles = entities.get(EntityKind::JobTitle);
    let ranges = entities.get(EntityKind::DateRange);
    entities
        .get(EntityKind::Company)
        .iter()
        .filter(|c| validation::is_valid_company(c, lexicons))
        .enumerate()
        .map(|(i, company)| ExperienceItem {
            company: Some(company.clone()),
            job_title: titles.get(i).cloned(),
            dates: ranges.get(i).map(|d| normalize_date_range(d)),
            ..Default::default()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex() -> std::sync::Arc<Lexicons> {
        Lexicons::builtin()
    }

    #[test]
    fn test_normalize_date_range() {
        assert_eq!(normalize_date_range("2021-Présent"), "2021 – Présent");
        assert_eq!(normalize_date_range("2018 -2020"), "2018 – 2020");
        assert_eq!(normalize_date_range("Depuis 2020"), "2020 – Présent");
        assert_eq!(normalize_date_range("Mars 2019 — aujourd'hui"), "Mars 2019 – Présent");
        assert_eq!(normalize_date_range("S3 2024 – 2025"), "S3 2024 – 2025");
    }

    #[test]
    fn test_formation_on_one_line() {
        let formations = parse_formations("Master Informatique, Université Paris-Saclay, 2018-2020", &lex());
        assert_eq!(
            formations,
            vec![FormationItem {
                establishment: Some("Université Paris-Saclay".to_string()),
                diploma: Some("Master Informatique".to_string()),
                dates: Some("2018-2020".to_string()),
            }]
        );
    }

    #[test]
    fn test_formation_cascade() {
        let section = "2016 - 2018 : Licence Informatique – Université de Lyon\n\
                       Université Paris-Saclay – Master Data Science (2018-2020)\n\
                       EPITA : Dernière année du cycle ingénieur (Kremlin-Bicêtre)\n";
        let formations = parse_formations(section, &lex());
        assert_eq!(formations.len(), 3);
        assert_eq!(formations[0].diploma.as_deref(), Some("Licence Informatique"));
        assert_eq!(formations[0].establishment.as_deref(), Some("Université de Lyon"));
        assert_eq!(formations[0].dates.as_deref(), Some("2016 - 2018"));
        assert_eq!(formations[1].diploma.as_deref(), Some("Master Data Science"));
        assert_eq!(formations[1].establishment.as_deref(), Some("Université Paris-Saclay"));
        assert_eq!(formations[1].dates.as_deref(), Some("2018-2020"));
        assert_eq!(formations[2].establishment.as_deref(), Some("EPITA"));
        assert_eq!(formations[2].diploma.as_deref(), Some("Dernière année du cycle ingénieur"));
    }

    #[test]
    fn test_formation_over_several_lines() {
        let section = "Université Paris-Saclay\nMaster Informatique\n2018 – 2020\n\nBTS SIO\nLycée Hoche\n2014-2016";
        let formations = parse_formations(section, &lex());
        assert_eq!(formations.len(), 2);
        assert_eq!(formations[0].establishment.as_deref(), Some("Université Paris-Saclay"));
        assert_eq!(formations[0].dates.as_deref(), Some("2018 – 2020"));
        assert_eq!(formations[1].diploma.as_deref(), Some("BTS SIO"));
        assert_eq!(formations[1].establishment.as_deref(), Some("Lycée Hoche"));
    }

    #[test]
    fn test_experience_title_chez_company() {
        let experiences = parse_experiences("2021-Présent: Lead DevOps chez AWS", &lex());
        assert_eq!(experiences.len(), 1);
        assert_eq!(experiences[0].company.as_deref(), Some("AWS"));
        assert_eq!(experiences[0].job_title.as_deref(), Some("Lead DevOps"));
        assert_eq!(experiences[0].dates.as_deref(), Some("2021 – Présent"));
    }

    #[test]
    fn test_experience_blocks() {
        let section = "2021-Présent: Lead DevOps chez AWS\n\
                       - Migration Kubernetes\n\
                       • Mise en place CI/CD\n\
                       Environnement technique : Terraform, GitLab CI\n\
                       2018 - 2021 – Capgemini – Ingénieur DevOps\n\
                       Audit des pipelines existants\n\
                       2016 : stage d'observation\n";
        let experiences = parse_experiences(section, &lex());
        assert_eq!(experiences.len(), 2);
        assert_eq!(experiences[0].missions, vec!["Migration Kubernetes", "Mise en place CI/CD"]);
        assert_eq!(experiences[0].environment.as_deref(), Some("Terraform, GitLab CI"));
        assert_eq!(experiences[1].company.as_deref(), Some("Capgemini"));
        assert_eq!(experiences[1].job_title.as_deref(), Some("Ingénieur DevOps"));
        assert_eq!(experiences[1].dates.as_deref(), Some("2018 – 2021"));
        assert_eq!(experiences[1].missions, vec!["Audit des pipelines existants"]);
    }

    #[test]
    fn test_semester_block_with_internship() {
        let section = "S3 2024 – 2025 Nanterre\n\
                       Stage de 18 semaines chez I NETUM en tant que développeur ABAP\n\
                       - Développement de rapports\n";
        let experiences = parse_experiences(section, &lex());
        assert_eq!(experiences.len(), 1);
        let exp = &experiences[0];
        assert_eq!(exp.company.as_deref(), Some("I NETUM"));
        assert_eq!(exp.job_title.as_deref(), Some("Développeur ABAP"));
        assert_eq!(exp.dates.as_deref(), Some("S3 2024 – 2025"));
        assert_eq!(exp.location.as_deref(), Some("Nanterre"));
        assert_eq!(exp.missions, vec!["Développement de rapports"]);
    }

    #[test]
    fn test_skills_split() {
        let skills = parse_skills("Python, Java, communication, gestion de projet, Plotly", &lex());
        assert_eq!(skills.technical, vec!["Python", "Java", "Plotly"]);
        assert_eq!(skills.functional, vec!["communication", "gestion de projet"]);
    }

    #[test]
    fn test_functional_stopwords_are_kept() {
        let skills = parse_skills("Communication, autonomie, Docker", &lex());
        assert_eq!(skills.technical, vec!["Docker"]);
        assert!(skills.functional.iter().any(|s| s == "Communication"));
    }

    #[test]
    fn test_header_lines_never_become_experiences() {
        let rest = "Adèle Patarot\nData Analyst\n21, rue Pierre Bourdan, 78160 Marly-le-Roi\n\
                    adele.patarot@gmail.com\n06 12 34 56 78\nBonjour";
        let items = experiences_from_rest(rest, Some("Adèle Patarot"), &lex());
        assert!(items.is_empty(), "{:?}", items);
    }

    #[test]
    fn test_dated_lines_outside_a_section_are_experiences() {
        let rest = "Adèle Patarot\nadele.patarot@gmail.com\n2021-Présent: Lead DevOps chez AWS";
        let items = experiences_from_rest(rest, Some("Adèle Patarot"), &lex());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].company.as_deref(), Some("AWS"));
        assert_eq!(items[0].dates.as_deref(), Some("2021 – Présent"));
    }

    #[test]
    fn test_skills_noise() {
        let section = "Langages : Python, python, SQL\n• Maîtrise de Docker (avancé)\n75019\n2020\nOutils : Jira\nC";
        let skills = parse_skills(section, &lex());
        assert_eq!(skills.technical, vec!["Python", "SQL", "Docker", "Jira"]);
        assert!(skills.functional.is_empty());
    }

    #[test]
    fn test_profile_title() {
        let text = "Adèle Patarot\nData Analyst - Business Analyst\nadele.patarot@gmail.com";
        assert_eq!(extract_profile_title(text).as_deref(), Some("Data Analyst"));
        assert_eq!(extract_profile_title("Jean Dupont\nParis"), None);
    }

    #[test]
    fn test_hobbies_and_lists() {
        let hobbies = parse_hobbies("Football, lecture; • Voyages\net du piano\n75019");
        assert_eq!(hobbies, vec!["Football", "lecture", "Voyages"]);

        let projects = parse_list_section("- Refonte du site\n\n• Chatbot RH\n- refonte du site");
        assert_eq!(projects, vec!["Refonte du site", "Chatbot RH"]);
    }

    #[test]
    fn test_availability() {
        assert_eq!(extract_availability("Disponibilité : immédiate\n").as_deref(), Some("Immédiate"));
        assert_eq!(
            extract_availability("Je suis disponible à partir de septembre 2025.").as_deref(),
            Some("Disponible à partir de septembre 2025")
        );
        assert_eq!(extract_availability("Python, Java"), None);
    }

    #[test]
    fn test_languages() {
        let languages = parse_languages("Français : natif\nAnglais : courant (C1), Espagnol notions\nanglais");
        assert_eq!(languages, vec!["Français (natif)", "Anglais (courant)", "Espagnol (notions)"]);
    }

    #[test]
    fn test_assemble_falls_back_on_email_name() {
        let text = "adele.patarot@gmail.com\n06 12 34 56 78\n";
        let record = assemble_record(text, &Sections::default(), &EntityMap::default(), &lex());
        assert_eq!(record.contact.name.as_deref(), Some("Adele Patarot"));
        assert_eq!(record.contact.phone.as_deref(), Some("06 12 34 56 78"));
    }

    #[test]
    fn test_record_from_entities() {
        let mut entities = EntityMap::default();
        entities.push(EntityKind::Company, "AWS");
        entities.push(EntityKind::JobTitle, "Lead DevOps");
        entities.push(EntityKind::DateRange, "2021-Présent");
        entities.push(EntityKind::Skill, "Python");
        let record = record_from_entities(&entities, &lex());
        assert_eq!(record.experiences.len(), 1);
        assert_eq!(record.experiences[0].dates.as_deref(), Some("2021 – Présent"));
        assert_eq!(record.skills.technical, vec!["Python"]);
    }
}
