//! Text normalization helpers shared by the extraction stages

use regex::Regex;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Corporate banners and page furniture that leak into extracted text.
static NOISE_LINES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^\s*C\d\s*[-–—]\s*usage\s+(?:restreint|interne|public)\s*$",
        r"(?i)^\s*page\s+\d+(?:\s*(?:/|sur|of)\s*\d+)?\s*$",
        r"(?i)^\s*curriculum\s+vitae\s*$",
        r"^\s*[\p{So}\p{Sk}_=~\-–—•·*]{3,}\s*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid noise regex"))
    .collect()
});

const BULLETS: &[char] = &[
    '-', '•', '*', '▪', '●', '◦', '·', '➢', '➤', '►', '→', '✓', '✔', '–', '—',
];

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// ASCII-fold the Latin accents found in French and German CVs.
pub fn fold_accents(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => out.push('a'),
            'À' | 'Á' | 'Â' | 'Ä' | 'Ã' | 'Å' => out.push('A'),
            'ç' => out.push('c'),
            'Ç' => out.push('C'),
            'è' | 'é' | 'ê' | 'ë' => out.push('e'),
            'È' | 'É' | 'Ê' | 'Ë' => out.push('E'),
            'ì' | 'í' | 'î' | 'ï' => out.push('i'),
            'Ì' | 'Í' | 'Î' | 'Ï' => out.push('I'),
            'ñ' => out.push('n'),
            'Ñ' => out.push('N'),
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' => out.push('o'),
            'Ò' | 'Ó' | 'Ô' | 'Ö' | 'Õ' => out.push('O'),
            'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
            'Ù' | 'Ú' | 'Û' | 'Ü' => out.push('U'),
            'ÿ' => out.push('y'),
            'Ÿ' => out.push('Y'),
            'œ' => out.push_str("oe"),
            'Œ' => out.push_str("OE"),
            'æ' => out.push_str("ae"),
            'Æ' => out.push_str("AE"),
            '’' | '‘' => out.push('\''),
            _ => out.push(c),
        }
    }
    out
}

/// Lowercased, accent-folded key with every non-alphanumeric removed.
/// "COMPETENCES TECHNIQU ES" and "Compétences techniques" share a key.
pub fn compact_key(text: &str) -> String {
    fold_accents(text)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Lowercased, accent-folded text with whitespace collapsed.
pub fn normalize_key(text: &str) -> String {
    collapse_whitespace(&fold_accents(text).to_lowercase())
}

pub fn is_bullet_line(line: &str) -> bool {
    line.trim_start().starts_with(BULLETS)
}

pub fn strip_bullet(line: &str) -> &str {
    line.trim().trim_start_matches(BULLETS).trim()
}

/// Share of uppercase letters among the letters of a line.
pub fn uppercase_ratio(line: &str) -> f32 {
    let (upper, letters) = line
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(u, l), c| (u + usize::from(c.is_uppercase()), l + 1));
    if letters == 0 {
        0.0
    } else {
        upper as f32 / letters as f32
    }
}

pub fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "jean-pierre" -> "Jean-Pierre", "MARTIN" -> "Martin".
pub fn title_case(word: &str) -> String {
    word.split('-')
        .map(|part| capitalize_first(&part.to_lowercase()))
        .collect::<Vec<_>>()
        .join("-")
}

/// Largest prefix of `text` not longer than `max_bytes` that ends on a char boundary.
pub fn prefix_at_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// The first `max` grapheme clusters of `text`.
pub fn prefix_graphemes(text: &str, max: usize) -> &str {
    match text.grapheme_indices(true).nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Drop banner and page-footer lines from a section slice.
pub fn clean_section_text(text: &str) -> String {
    text.lines()
        .filter(|line| !NOISE_LINES.iter().any(|re| re.is_match(line)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Case-insensitive de-duplication preserving the first spelling seen.
pub fn dedup_case_insensitive<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let item = item.as_ref().trim();
        if item.is_empty() {
            continue;
        }
        if seen.insert(normalize_key(item)) {
            out.push(item.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_key_survives_fragmented_headers() {
        assert_eq!(compact_key("COMPETENCES TECHNIQU ES"), "competencestechniques");
        assert_eq!(compact_key("Compétences  techniques"), "competencestechniques");
        assert_eq!(compact_key("E X P É R I E N C E S"), "experiences");
    }

    #[test]
    fn test_bullets() {
        assert!(is_bullet_line("  • Mise en place CI/CD"));
        assert!(is_bullet_line("- Python"));
        assert!(!is_bullet_line("Python"));
        assert_eq!(strip_bullet("  ➢  Refonte API"), "Refonte API");
    }

    #[test]
    fn test_uppercase_ratio() {
        assert!(uppercase_ratio("EXPÉRIENCES PROFESSIONNELLES") > 0.99);
        assert!(uppercase_ratio("Expériences") < 0.2);
        assert_eq!(uppercase_ratio("2018 - 2020"), 0.0);
    }

    #[test]
    fn test_prefix_graphemes_keeps_combining_marks() {
        let text = "Ade\u{300}le";
        assert_eq!(prefix_graphemes(text, 3), "Ade\u{300}");
        assert_eq!(prefix_graphemes(text, 2), "Ad");
        assert_eq!(prefix_graphemes(text, 10), text);
    }

    #[test]
    fn test_prefix_at_boundary_never_splits_chars() {
        let text = "Adèle";
        assert_eq!(prefix_at_boundary(text, 3), "Ad");
        assert_eq!(prefix_at_boundary(text, 100), "Adèle");
    }

    #[test]
    fn test_clean_section_text_drops_banners() {
        let text = "C2 – Usage restreint\nPython, Java\nPage 2 / 3\n";
        assert_eq!(clean_section_text(text), "Python, Java");
    }

    #[test]
    fn test_dedup_case_insensitive() {
        let items = dedup_case_insensitive(["Python", "python", " Java ", "", "PYTHON"]);
        assert_eq!(items, vec!["Python", "Java"]);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("jean-pierre"), "Jean-Pierre");
        assert_eq!(title_case("MARTIN"), "Martin");
    }
}
