//! Pattern libraries for job titles, diplomas, schools, companies and languages

use regex::Regex;
use std::sync::LazyLock;

/// A word inside an entity phrase: letters first, then letters, digits and a
/// few joiners ("Paris-Saclay", "C++", "Node.js").
const TAIL_WORD: &str = r"[ \t]+[\p{L}][\p{L}0-9'’\-&.+#]*";
const CAP_WORD: &str = r"\p{Lu}[\p{L}'’\-]*";
const LINKER: &str = r"(?:de|du|des|d['’]|la|le|les|et|of|&)";

fn compile(patterns: &[String], what: &str) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).unwrap_or_else(|e| panic!("Invalid {} regex {}: {}", what, p, e)))
        .collect()
}

pub static JOB_TITLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let specialties = r"(?:d[ée]veloppement|logiciels?|syst[èe]mes?|r[ée]seaux?|[ée]tudes|full[\s-]?stack|front[\s-]?end|back[\s-]?end|web|mobile|devops|cloud|big\s+data|data|python|java|\.net|c\+\+|react|angular|vue\.?js|php|abap|qa|test|informatique|s[ée]curit[ée]|ia|ml|embarqu[ée]|r&d)";
    let patterns = [
        format!(r"(?i)\b(?:d[ée]veloppeur|d[ée]veloppeuse|developer|ing[ée]nieur|ing[ée]nieure|engineer)(?:\s+{specialties}){{1,2}}(?:\s+(?:senior|junior))?"),
        r"(?i)\b(?:lead|senior|junior|stagiaire|alternant|tech\s+lead)\s+(?:d[ée]veloppeur|developer|ing[ée]nieur|engineer|data\s*scientist|data\s*engineer|data\s*analyst|devops|analyst|consultant)".to_string(),
        r"(?i)\bchef\s+de\s+projets?(?:\s+(?:digital|it|web|technique|moa|moe|informatique|data))?".to_string(),
        r"(?i)\b(?:scrum|product|project|program)\s*(?:master|owner|manager)".to_string(),
        r"(?i)\b(?:business|data|functional|bi)\s*analyst(?:\s+(?:senior|junior))?".to_string(),
        r"(?i)\bdata\s+(?:scientist|engineer|architect)".to_string(),
        r"(?i)\barchitecte?\s+(?:solutions?|cloud|logiciel|software|technique|si|data|applicatif)".to_string(),
        r"(?i)\bstage(?:iaire)?\s+(?:d[ée]veloppeur|ing[ée]nieur|data|devops|web)(?:\s+[\p{L}.+#]+)?".to_string(),
        r"(?i)\balternan(?:ce|t)\s+(?:d[ée]veloppeur|ing[ée]nieur|data)(?:\s+[\p{L}.+#]+)?".to_string(),
        r"(?i)\b(?:devops|sre|full[\s-]?stack)\s+(?:engineer|developer|ing[ée]nieur|d[ée]veloppeur)".to_string(),
        r"(?i)\banalyste\s+(?:fonctionnel(?:le)?|programmeur|donn[ée]es|data)".to_string(),
        r"(?i)\bconsultante?(?:\s+(?:it|tech|digital|senior|junior|fonctionnel(?:le)?|technique|sap|data|bi|cloud|devops))?".to_string(),
        r"(?i)\b(?:tech|team)\s+lead\b".to_string(),
        r"(?i)\b(?:cto|cio|dsi|directeur\s+(?:technique|de\s+projets?|des\s+syst[èe]mes\s+d['’]information))\b".to_string(),
    ];
    compile(&patterns, "job title")
});

pub static DIPLOMA_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let patterns = [
        r"(?i)\bbac\s*\+\s*\d\b".to_string(),
        format!(r"(?i)\bmast[eè]re\s+sp[ée]cialis[ée](?:{TAIL_WORD}){{0,3}}"),
        format!(r"(?i)\bmaster(?:'s)?(?:\s+[12])?(?:{TAIL_WORD}){{1,4}}"),
        format!(r"(?i)\b(?:msc|m\.sc\.?)(?:{TAIL_WORD}){{1,3}}"),
        format!(r"\bM[12](?:{TAIL_WORD}){{1,3}}"),
        format!(r"(?i)\b(?:dipl[ôo]me\s+d['’]\s*|cycle\s+|titre\s+d['’]\s*)ing[ée]nieur(?:{TAIL_WORD}){{0,3}}"),
        format!(r"(?i)\bing[ée]nieur\s+(?:en|sp[ée]cialit[ée]|option|g[ée]n[ée]raliste)(?:{TAIL_WORD}){{0,3}}"),
        format!(r"(?i)\b(?:licence|license|bachelor)(?:'s)?(?:{TAIL_WORD}){{1,3}}"),
        format!(r"\bL[123](?:{TAIL_WORD}){{1,3}}"),
        format!(r"\b(?:BTS|DUT|BUT)(?:{TAIL_WORD}){{1,3}}"),
        r"(?i)\b(?:baccalaur[ée]at|bac)\b(?:\s+(?:s|es|l|sti2d|stmg|pro|scientifique|[ée]conomique|litt[ée]raire|g[ée]n[ée]ral|technologique)\b)?(?:\s+mention\s+(?:tr[èe]s\s+bien|assez\s+bien|bien|tb|ab|b)\b)?".to_string(),
        r"(?i)\b(?:pr[ée]pa|cpge|classes?\s+pr[ée]paratoires?)(?:\s+(?:mpsi|pcsi|mp2i|mp|pc|psi|pt|bcpst|ece|ecs|ecg|scientifique|[ée]conomique)\b)*".to_string(),
        format!(r"(?i)\b(?:doctorat|phd|ph\.d\.?|th[èe]se)(?:{TAIL_WORD}){{1,3}}"),
        format!(r"\bMBA(?:{TAIL_WORD}){{0,3}}"),
        format!(r"(?i)\b(?:certification|certified|certificat)(?:{TAIL_WORD}){{1,3}}"),
    ];
    compile(&patterns, "diploma")
});

pub static SCHOOL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let named = |keyword: &str| {
        format!(
            r"(?:{keyword})(?:[ \t]+(?i:de|du|des|d['’]|of|la|le)){{0,2}}[ \t]*{CAP_WORD}(?:[ \t]+(?:{LINKER}[ \t]*)?{CAP_WORD}){{0,4}}"
        )
    };
    let patterns = [
        named(r"\b(?i:universit[ée]|university)"),
        named(r"(?:\b|^)(?i:[ée]cole)"),
        named(r"\b(?i:institut|institute)"),
        named(r"\b(?i:lyc[ée]e)"),
        format!(r"\bIUT(?:[ \t]+(?i:de|d['’]|du))?(?:[ \t]*{CAP_WORD}(?:[ \t]+{CAP_WORD}){{0,2}})?"),
        format!(r"\b(?:HEC|ESSEC|ESCP|EM[ \t]?Lyon|EDHEC|Audencia|NEOMA|SKEMA|KEDGE|EPITA|EPITECH|Epitech|Epita|INSA|ENSEEIHT|ENSIMAG|ENSAM|ENSAE|ENSTA|IMT|ISEP|EFREI|Efrei|ESIEA|SUPINFO|Supinfo|CentraleSup[ée]lec|Polytech|Dauphine|Sorbonne|CNAM|ESME|ESIEE|Sciences[ \t]+Po|Polytechnique|T[ée]l[ée]com[ \t]+Paris)\b(?:[ \t]+{CAP_WORD})?"),
    ];
    compile(&patterns, "school")
});

/// Employer introduced by a preposition: "chez AWS", "at Google", "pour le compte de BNP Paribas".
pub static COMPANY_AFTER_PREPOSITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\b(?i:chez|at|pour\s+le\s+compte\s+de|for|client)|@)[ \t]+(\p{Lu}[\p{L}0-9&'’.\-]*(?:[ \t]+(?:\p{Lu}[\p{L}0-9&'’.\-]*|&|(?:de|du|des)[ \t]+\p{Lu}[\p{L}0-9&'’.\-]*)){0,4})",
    )
    .expect("Invalid company regex")
});

/// "Capgemini – Ingénieur ..." at the start of a line.
pub static COMPANY_BEFORE_ROLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(\p{Lu}[\p{L}0-9&'’.\-]*(?:[ \t]+\p{Lu}[\p{L}0-9&'’.\-]*)?)[ \t]*[-–—|][ \t]*(?i:ing[ée]nieur|d[ée]veloppeur|consultant|stage|stagiaire|alternance|alternant|chef|data|lead|analyste|architecte)",
    )
    .expect("Invalid company regex")
});

pub static LANGUAGE_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:fran[çc]ais|french|anglais|english|espagnol|spanish|allemand|german|italien|italian|portugais|portuguese|arabe|arabic|chinois|mandarin|chinese|japonais|japanese|russe|russian|n[ée]erlandais|dutch|turc|polonais|hindi|cor[ée]en|wolof|berb[èe]re|vietnamien)\b",
    )
    .expect("Invalid language regex")
});

pub static PROFICIENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:[ABC][12]|natif|native|langue\s+maternelle|maternelle|bilingue|courant|fluent|notions?|interm[ée]diaire|d[ée]butant|professionnel|scolaire|avanc[ée]|toeic[ \t]*:?[ \t]*\d{3}|toefl[ \t]*:?[ \t]*\d{2,3}|ielts[ \t]*:?[ \t]*\d(?:\.\d)?)\b",
    )
    .expect("Invalid proficiency regex")
});

/// Earliest job-title match in `text`, as a byte range.
pub fn first_job_title(text: &str) -> Option<(usize, usize)> {
    JOB_TITLE_PATTERNS
        .iter()
        .filter_map(|re| re.find(text))
        .map(|m| (m.start(), m.end()))
        .min_by_key(|&(start, end)| (start, std::cmp::Reverse(end)))
}

/// Every job-title match, longest first at equal start, overlaps removed.
pub fn find_job_titles(text: &str) -> Vec<(usize, usize)> {
    collect_non_overlapping(&JOB_TITLE_PATTERNS, text)
}

pub fn find_diplomas(text: &str) -> Vec<(usize, usize)> {
    collect_non_overlapping(&DIPLOMA_PATTERNS, text)
        .into_iter()
        .map(|(s, e)| (s, s + trim_diploma(&text[s..e]).len()))
        .collect()
}

pub fn find_schools(text: &str) -> Vec<(usize, usize)> {
    collect_non_overlapping(&SCHOOL_PATTERNS, text)
}

pub fn looks_like_diploma(text: &str) -> bool {
    DIPLOMA_PATTERNS
        .iter()
        .any(|re| re.find(text).is_some_and(|m| m.start() == 0))
}

pub fn looks_like_job_title(text: &str) -> bool {
    JOB_TITLE_PATTERNS.iter().any(|re| re.is_match(text))
}

fn collect_non_overlapping(patterns: &[Regex], text: &str) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = patterns
        .iter()
        .flat_map(|re| re.find_iter(text).map(|m| (m.start(), m.end())))
        .collect();
    spans.sort_by_key(|&(start, end)| (start, std::cmp::Reverse(end)));

    let mut kept: Vec<(usize, usize)> = Vec::new();
    for span in spans {
        if kept.last().is_some_and(|last| span.0 < last.1) {
            continue;
        }
        kept.push(span);
    }
    kept
}

/// Diploma phrases stop before a school name or a dangling linker.
fn trim_diploma(phrase: &str) -> &str {
    const STOP: &[&str] = &[
        " Université", " Universite", " University", " École", " Ecole", " Institut", " IUT",
        " Lycée", " à ", " chez ", " obtenu", " mention",
    ];
    let mut end = phrase.len();
    for stop in STOP {
        if let Some(i) = phrase.find(stop) {
            if i > 0 {
                end = end.min(i);
            }
        }
    }
    let mut trimmed = phrase[..end].trim_end();
    loop {
        let before = trimmed;
        for linker in [" en", " de", " des", " du", " d'", " et", " in", " of", " à", "-", ".", ","] {
            if let Some(stripped) = trimmed.strip_suffix(linker) {
                trimmed = stripped.trim_end();
            }
        }
        if before == trimmed {
            break;
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(spans: Vec<(usize, usize)>, text: &str) -> Vec<String> {
        spans.into_iter().map(|(s, e)| text[s..e].to_string()).collect()
    }

    #[test]
    fn test_job_titles() {
        let text = "2021-Présent: Lead DevOps chez AWS";
        assert_eq!(found(find_job_titles(text), text), vec!["Lead DevOps"]);

        let text = "Chef de projet digital puis Scrum Master";
        assert_eq!(
            found(find_job_titles(text), text),
            vec!["Chef de projet digital", "Scrum Master"]
        );
        assert!(looks_like_job_title("Développeur Python Senior"));
        assert!(!looks_like_job_title("Université de Lyon"));
    }

    #[test]
    fn test_first_job_title_prefers_earliest() {
        let text = "Adèle Patarot\nData Analyst - Business Analyst";
        let (s, e) = first_job_title(text).unwrap();
        assert_eq!(&text[s..e], "Data Analyst");
    }

    #[test]
    fn test_diplomas() {
        let text = "Master Informatique, Université Paris-Saclay, 2018-2020";
        assert_eq!(found(find_diplomas(text), text), vec!["Master Informatique"]);

        let text = "Université de Lyon – Licence Informatique (2015-2018)";
        assert_eq!(found(find_diplomas(text), text), vec!["Licence Informatique"]);

        let text = "BTS SIO option SLAM; Bac +5";
        assert_eq!(found(find_diplomas(text), text), vec!["BTS SIO option SLAM", "Bac +5"]);
        assert!(looks_like_diploma("Baccalauréat S mention assez bien"));
        assert!(!looks_like_diploma("Université Paris-Saclay"));
    }

    #[test]
    fn test_schools() {
        let text = "Master Informatique, Université Paris-Saclay, 2018-2020";
        assert_eq!(found(find_schools(text), text), vec!["Université Paris-Saclay"]);

        let text = "Université de Lyon – Licence Informatique";
        assert_eq!(found(find_schools(text), text), vec!["Université de Lyon"]);

        let text = "EPITA : Dernière année du cycle ingénieur (Kremlin-Bicêtre)";
        assert_eq!(found(find_schools(text), text), vec!["EPITA"]);

        let text = "Lycée Hoche : Baccalauréat S";
        assert_eq!(found(find_schools(text), text), vec!["Lycée Hoche"]);
    }

    #[test]
    fn test_company_after_preposition() {
        let caps = COMPANY_AFTER_PREPOSITION
            .captures("Stage de 18 semaines chez I NETUM en tant que développeur ABAP")
            .unwrap();
        assert_eq!(&caps[1], "I NETUM");

        let caps = COMPANY_AFTER_PREPOSITION.captures("Lead DevOps chez AWS").unwrap();
        assert_eq!(&caps[1], "AWS");
    }

    #[test]
    fn test_proficiency() {
        assert_eq!(PROFICIENCY.find("Anglais : courant (C1)").unwrap().as_str(), "courant");
        assert!(PROFICIENCY.is_match("TOEIC 945"));
        assert!(LANGUAGE_WORD.is_match("Français (natif)"));
    }
}
