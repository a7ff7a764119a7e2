//! Stateless regex extractors for dates, emails, phone numbers and addresses
//!
//! Every extractor returns unique matches in the order they appear. Dates keep
//! their literal spelling; emails are lowercased; phones and addresses are
//! whitespace-collapsed.

use crate::processing::text_processor::collapse_whitespace;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

const MONTHS: &str = r"(?:janvier|janv\.?|f[ée]vrier|f[ée]vr?\.?|mars|avril|avr\.?|mai|juin|juillet|juil\.?|ao[uû]t|septembre|sept\.?|octobre|oct\.?|novembre|nov\.?|d[ée]cembre|d[ée]c\.?|january|february|march|april|may|june|july|august|september|october|november|december)";
const PRESENT: &str = r"(?:pr[ée]sent|present|actuel(?:lement)?|aujourd['’]?hui|en\s+cours|now|today)";
const YEAR: &str = r"(?:19|20)\d{2}";
const DASH: &str = r"\s*[-–—]\s*";

/// Street-type words that introduce a street name.
pub const STREET_TYPES: &str = r"(?:rue|avenue|av\.|bd\.?|boulevard|place|chemin|impasse|all[ée]e|passage|quai|route|square|cours|voie|r[ée]sidence|chauss[ée]e)";

const CITY: &str = r"\p{Lu}[\p{L}'’\-]*(?:[ \t]+\p{Lu}[\p{L}'’\-]*){0,2}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateForm {
    FullDate,
    Semester,
    Since,
    MonthRange,
    YearRange,
    MonthYear,
    NumericMonthYear,
    Year,
}

impl DateForm {
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            DateForm::Semester | DateForm::Since | DateForm::MonthRange | DateForm::YearRange
        )
    }
}

/// A date found in a text, with its byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateMatch {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub form: DateForm,
}

static DATE_PATTERNS: LazyLock<Vec<(DateForm, Regex)>> = LazyLock::new(|| {
    let patterns = [
        (
            DateForm::FullDate,
            format!(r"\b(?:0?[1-9]|[12]\d|3[01])[/\-.](?:0?[1-9]|1[0-2])[/\-.]{YEAR}\b"),
        ),
        (
            DateForm::Semester,
            format!(r"(?i)\bS[1-4]\s+{YEAR}(?:{DASH}{YEAR})?\b"),
        ),
        (
            DateForm::Since,
            format!(r"(?i)\bdepuis\s+(?:{MONTHS}\s+)?{YEAR}\b"),
        ),
        (
            DateForm::MonthRange,
            format!(r"(?i)\b{MONTHS}\s+{YEAR}{DASH}(?:{MONTHS}\s+{YEAR}|{PRESENT})\b"),
        ),
        (
            DateForm::YearRange,
            format!(r"(?i)\b{YEAR}\s*[-–—/]\s*(?:{YEAR}|{PRESENT})\b"),
        ),
        (DateForm::MonthYear, format!(r"(?i)\b{MONTHS}\s+{YEAR}\b")),
        (
            DateForm::NumericMonthYear,
            format!(r"\b(?:0?[1-9]|1[0-2])[/\-.]{YEAR}\b"),
        ),
        (DateForm::Year, format!(r"\b{YEAR}\b")),
    ];
    patterns
        .into_iter()
        .map(|(form, p)| (form, Regex::new(&p).expect("Invalid date regex")))
        .collect()
});

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}$").expect("Invalid postal code regex"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z0-9._%+\-]+@[A-Z0-9.\-]+\.[A-Z]{2,}\b").expect("Invalid email regex")
});

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\+33|\b00[ \t]?33|\b0)[ \t\u{A0}]*(?:\(0\)[ \t\u{A0}]*)?[1-9](?:[ \t.\-\u{A0}]?\d{2}){4}\b",
    )
    .expect("Invalid phone regex")
});

static ADDRESS_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        format!(
            r"(?i:\b\d{{1,4}}(?:[ \t]?(?:bis|ter))?,?[ \t]+{STREET_TYPES})[ \t]+[\p{{L}}'’\-]+(?:[ \t]+[\p{{L}}'’\-]+){{0,5}}?,?[ \t]+\d{{5}},?[ \t]+{CITY}"
        ),
        format!(r"\b\d{{5}},?[ \t]+{CITY}"),
        format!(r"\b{CITY}[ \t]*\((?:\d{{2,3}}|2[AB])\)"),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid address regex"))
    .collect()
});

static ADDRESS_TRAILER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[ ,]+(?:t[ée]l[ée]phone|t[ée]l\.?|email|e-mail|mail|mobile|portable|phone|linkedin)\b.*$")
        .expect("Invalid address trailer regex")
});

static STREET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i:\b{STREET_TYPES})[ \t]+((?:[\p{{L}}'’\-]+[ \t]*){{1,5}})"
    ))
    .expect("Invalid street regex")
});

/// All date mentions with their spans, in document order.
///
/// Forms are tried from most to least specific; a match overlapping an
/// already accepted one is dropped, so "12/05/2020" is not also reported as
/// "05/2020". Bare years next to a postal code are ignored.
pub fn find_dates(text: &str) -> Vec<DateMatch> {
    let mut accepted: Vec<DateMatch> = Vec::new();

    for (form, regex) in DATE_PATTERNS.iter() {
        for m in regex.find_iter(text) {
            if accepted.iter().any(|a| m.start() < a.end && a.start < m.end()) {
                continue;
            }
            if matches!(form, DateForm::Year | DateForm::NumericMonthYear)
                && near_postal_code(text, m.start(), m.end())
            {
                continue;
            }
            accepted.push(DateMatch {
                start: m.start(),
                end: m.end(),
                text: collapse_whitespace(m.as_str()),
                form: *form,
            });
        }
    }

    accepted.sort_by_key(|d| d.start);
    accepted
}

pub fn extract_dates(text: &str) -> Vec<String> {
    unique(find_dates(text).into_iter().map(|d| d.text))
}

pub fn extract_emails(text: &str) -> Vec<String> {
    unique(
        EMAIL
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches('.').to_lowercase()),
    )
}

pub fn extract_phones(text: &str) -> Vec<String> {
    unique(PHONE.find_iter(text).map(|m| collapse_whitespace(m.as_str())))
}

/// Postal addresses, trying the most complete pattern first.
pub fn extract_addresses(text: &str) -> Vec<String> {
    find_addresses(text).into_iter().map(|(_, _, a)| a).collect()
}

/// Addresses with the byte range of the raw match.
pub fn find_addresses(text: &str) -> Vec<(usize, usize, String)> {
    for regex in ADDRESS_PATTERNS.iter() {
        let mut seen = HashSet::new();
        let found: Vec<(usize, usize, String)> = regex
            .find_iter(text)
            .filter_map(|m| {
                let cleaned = ADDRESS_TRAILER.replace(m.as_str(), "");
                let cleaned = collapse_whitespace(cleaned.trim_end_matches([',', ' ']));
                let end = m.start() + cleaned_len(m.as_str(), &cleaned);
                seen.insert(cleaned.clone()).then_some((m.start(), end, cleaned))
            })
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Street names following a street-type word, e.g. "Pierre Bourdan" in
/// "21, rue Pierre Bourdan, 78160 Marly-le-Roi".
pub fn street_names(text: &str) -> Vec<String> {
    unique(STREET_NAME.captures_iter(text).filter_map(|caps| {
        let words: Vec<&str> = caps[1]
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| c == ',' || c == '\''))
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .collect();
        (!words.is_empty()).then(|| words.join(" "))
    }))
}

fn is_postal_code(token: &str) -> bool {
    POSTAL_CODE.is_match(token.trim_matches([',', ';', '(', ')']))
}

/// The token next to the match is a postal code, or the match follows "75019 Paris".
fn near_postal_code(text: &str, start: usize, end: usize) -> bool {
    let mut before = text[..start].split_whitespace().rev();
    let previous = before.next();
    let next = text[end..].split_whitespace().next();
    let after_city =
        previous.is_some_and(|t| t.starts_with(char::is_uppercase)) && before.next().is_some_and(is_postal_code);
    previous.is_some_and(is_postal_code) || next.is_some_and(is_postal_code) || after_city
}

/// Length in the raw match of the prefix that survived trailer removal.
fn cleaned_len(raw: &str, cleaned: &str) -> usize {
    let last_word = cleaned.split_whitespace().last().unwrap_or("");
    raw.rfind(last_word)
        .map(|i| i + last_word.len())
        .unwrap_or(raw.len())
}

fn unique<I: IntoIterator<Item = String>>(items: I) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}
