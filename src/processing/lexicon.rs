//! Curated word lists and the matchers built from them
//!
//! The built-in lists are process-wide constants; `[lexicons]` entries of the
//! configuration are merged on top when a pipeline is built.

use crate::config::LexiconConfig;
use crate::error::{CvError, Result};
use crate::processing::text_processor::normalize_key;
use aho_corasick::{AhoCorasick, MatchKind};
use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

pub const KNOWN_COMPANIES: &[&str] = &[
    "google", "amazon", "aws", "microsoft", "apple", "meta", "facebook", "ibm", "oracle", "sap",
    "salesforce", "sopra steria", "capgemini", "accenture", "atos", "cgi", "thales", "orange",
    "sfr", "bnp paribas", "société générale", "crédit agricole", "airbus", "safran", "dassault",
    "dassault systèmes", "renault", "peugeot", "stellantis", "total", "totalenergies", "sncf",
    "edf", "engie", "bouygues", "vinci", "axa", "allianz", "ubisoft", "deloitte", "kpmg",
    "ey", "pwc", "alten", "altran", "akka", "inetum", "worldline", "ovhcloud", "criteo",
    "doctolib", "blablacar", "l'oréal", "lvmh", "michelin", "danone", "decathlon",
];

pub const KNOWN_SCHOOLS: &[&str] = &[
    "polytechnique", "centrale", "mines", "ponts", "supélec", "télécom", "hec", "essec",
    "escp", "em lyon", "edhec", "insead", "sorbonne", "paris-saclay", "dauphine", "assas",
    "panthéon", "imt", "insa", "ensam", "ensae", "ensta", "epita", "epitech", "enseeiht",
    "ensimag", "isep", "ece", "efrei", "esiea", "supinfo", "iut", "audencia", "neoma",
    "skema", "kedge", "esme", "esiee", "utc", "utt", "cnam",
];

/// Substrings that mark an education establishment.
pub const SCHOOL_KEYWORDS: &[&str] = &[
    "université", "universite", "university", "école", "ecole", "school", "institut",
    "institute", "iut", "bts", "lycée", "lycee", "college", "collège", "faculté", "academy",
    "cpge", "prépa",
];

pub const TECHNICAL_SKILLS: &[&str] = &[
    // Langages
    "python", "java", "javascript", "typescript", "c++", "c#", "c", "go", "golang", "rust",
    "php", "ruby", "swift", "kotlin", "scala", "r", "matlab", "sql", "pl/sql", "html", "css",
    "bash", "shell", "abap", "cobol", "vba", "perl", "dart",
    // Frameworks
    "react", "angular", "vue", "vue.js", "node.js", "nodejs", "django", "flask", "spring",
    "spring boot", "express", ".net", "laravel", "symfony", "rails", "fastapi", "hibernate",
    "flutter", "next.js", "jquery", "bootstrap", "tailwind",
    // Data
    "pandas", "numpy", "plotly", "matplotlib", "scikit-learn", "tensorflow", "pytorch",
    "spark", "hadoop", "kafka", "airflow", "dbt", "power bi", "tableau", "excel", "qlik",
    "talend", "looker",
    // Cloud & DevOps
    "aws", "azure", "gcp", "docker", "kubernetes", "terraform", "ansible", "jenkins",
    "gitlab", "gitlab ci", "github", "github actions", "circleci", "linux", "unix", "nginx",
    "prometheus", "grafana", "helm", "openshift",
    // Bases de données
    "postgresql", "mysql", "mongodb", "redis", "elasticsearch", "cassandra", "oracle db",
    "sqlite", "mariadb", "neo4j", "snowflake", "bigquery",
    // Outils
    "git", "jira", "confluence", "notion", "figma", "slack", "postman", "sap", "salesforce",
    "sharepoint", "visual studio", "intellij", "eclipse", "uml", "merise",
    // Protocoles
    "rest", "api", "graphql", "soap", "grpc", "oauth", "json", "xml",
];

pub const FUNCTIONAL_SKILLS: &[&str] = &[
    "agile", "scrum", "kanban", "safe", "gestion", "management", "leadership",
    "communication", "organisation", "travail en équipe", "esprit d'équipe", "relation client",
    "analyse", "méthodologie", "pilotage", "gestion de projet", "coordination",
    "résolution de problèmes", "kpi", "recueil du besoin", "spécifications", "animation",
    "encadrement", "négociation", "autonomie", "rigueur", "adaptabilité", "curiosité",
    "esprit de synthèse", "prise de parole", "conduite du changement", "formation utilisateurs",
    "product ownership", "stratégie", "planification", "reporting", "teamwork",
    "problem solving", "project management", "stakeholder management",
];

/// Languages accepted by the language lexicon, with their display form.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("francais", "Français"),
    ("french", "Français"),
    ("anglais", "Anglais"),
    ("english", "Anglais"),
    ("espagnol", "Espagnol"),
    ("spanish", "Espagnol"),
    ("allemand", "Allemand"),
    ("german", "Allemand"),
    ("italien", "Italien"),
    ("italian", "Italien"),
    ("portugais", "Portugais"),
    ("portuguese", "Portugais"),
    ("arabe", "Arabe"),
    ("arabic", "Arabe"),
    ("chinois", "Chinois"),
    ("mandarin", "Mandarin"),
    ("chinese", "Chinois"),
    ("japonais", "Japonais"),
    ("japanese", "Japonais"),
    ("russe", "Russe"),
    ("russian", "Russe"),
    ("neerlandais", "Néerlandais"),
    ("dutch", "Néerlandais"),
    ("turc", "Turc"),
    ("polonais", "Polonais"),
    ("hindi", "Hindi"),
    ("coreen", "Coréen"),
    ("wolof", "Wolof"),
    ("berbere", "Berbère"),
    ("vietnamien", "Vietnamien"),
];

/// Section titles and their common variants.
pub const SECTION_TITLES: &[&str] = &[
    "langues", "langue", "compétences", "competences", "compétence", "competence",
    "formations", "formation", "expérience", "experience", "expériences", "experiences",
    "profil", "contact", "projets", "projet", "certification", "certifications", "loisirs",
    "centres d'intérêt", "divers", "informations", "personnelles", "coordonnées",
    "coordonnees", "objectif", "résumé", "resume", "summary", "skills", "education",
    "work experience", "professional experience", "savoir-être", "savoir-faire",
    "soft skills", "hard skills", "compétences techniques", "compétences fonctionnelles",
    "compétences comportementales", "outils", "technologies", "méthodologies", "hobbies",
    "intérêts", "parcours", "disponibilité", "références",
];

/// Prefixes of section-title words, caught even when a header is split by
/// extraction ("COMPETENCES TECHNIQU ES").
pub const SECTION_FRAGMENTS: &[&str] = &[
    "competen", "techniqu", "professionn", "personn", "comportem", "transvers", "environnem",
    "certificat", "logiciel", "methodolog", "formation", "experience", "langues", "projets",
    "loisirs", "education", "contact", "coordonn", "objectif", "profil", "fonctionnel",
];

/// Words that never belong to a person name.
pub const NOISE_WORDS: &[&str] = &[
    "savoirs", "être", "faire", "savoir", "sens", "détails", "méticuleux", "calme",
    "curiosité", "culturelle", "autonomie", "communication", "outils", "informatique",
    "développeur", "developpeur", "developer", "ingénieur", "ingenieur", "engineer",
    "consultant", "manager", "lead", "chef", "stage", "stagiaire", "alternance", "alternant",
    "projet", "expérience", "formation", "techniques", "technique", "technologie",
    "technologies", "professionnelles", "professionnel", "professionnelle", "langues",
    "langue", "formations", "expériences", "comportementales", "transversales",
    "environnement", "logiciels", "logiciel", "certifications", "certification", "centres",
    "intérêt", "intérêts", "loisirs", "hobbies", "data", "analyst", "scientist", "senior",
    "junior", "architecte", "devops", "fullstack", "web", "curriculum", "vitae", "cv",
    "email", "mail", "téléphone", "telephone", "tél", "adresse", "nom", "prénom", "permis",
    "né", "née", "nationalité", "disponible", "disponibilité", "usage", "restreint",
    "rue", "avenue", "boulevard", "chemin", "impasse", "allée", "place", "mobile",
];

/// Single words that are not company names on their own.
pub const GENERIC_COMPANY_WORDS: &[&str] = &[
    "entreprise", "société", "societe", "company", "groupe", "group", "client", "clients",
    "stage", "projet", "projets", "mission", "missions", "poste", "freelance", "startup",
    "agence", "cabinet", "association", "équipe", "equipe", "service", "direction",
    "département", "laboratoire", "université", "école", "ecole", "alternance", "cdi",
    "cdd", "interim", "intérim",
];

/// Fragments rejected as companies: tools, countries, soft skills.
pub const COMPANY_STOPLIST: &[&str] = &[
    "python", "java", "javascript", "excel", "word", "powerpoint", "office", "git", "jira",
    "docker", "linux", "windows", "france", "allemagne", "germany", "espagne", "italie",
    "belgique", "suisse", "canada", "maroc", "tunisie", "algérie", "royaume-uni", "usa",
    "communication", "autonomie", "rigueur", "leadership", "organisation", "curiosité",
    "environnement", "environnement technique", "compétences", "formation", "expérience",
    "langues", "loisirs", "projets", "présent", "present", "aujourd'hui",
];

/// Words that make an otherwise school-looking phrase a hobby.
pub const HOBBY_WORDS: &[&str] = &[
    "football", "tennis", "basket", "basketball", "natation", "rugby", "handball", "sport",
    "sports", "musique", "piano", "guitare", "lecture", "voyage", "voyages", "cinéma",
    "photographie", "cuisine", "échecs", "danse", "yoga", "randonnée", "course", "running",
    "escalade", "ski", "boxe", "judo", "karaté", "équitation", "théâtre", "dessin", "jeux",
];

/// Lead-ins stripped from skill tokens.
pub const SKILL_NOISE_PREFIXES: &[&str] = &[
    "connaissance des", "connaissance de", "connaissances en", "connaissance en",
    "maîtrise de", "maîtrise des", "maitrise de", "bonne maîtrise de", "notions de",
    "notions en", "utilisation de", "pratique de", "expérience en", "outils :", "outils:",
    "environnement :", "environnement:", "langages :", "langages:", "frameworks :",
    "frameworks:",
];

static BUILTIN: LazyLock<Arc<Lexicons>> = LazyLock::new(|| {
    Arc::new(Lexicons::build(&LexiconConfig::default()).expect("built-in lexicons compile"))
});

/// Lookup sets and multi-pattern matchers over the curated lists.
#[derive(Debug)]
pub struct Lexicons {
    companies: HashSet<String>,
    schools: HashSet<String>,
    technical: HashSet<String>,
    functional: Vec<String>,
    noise_words: HashSet<String>,
    company_matcher: AhoCorasick,
    skill_matcher: AhoCorasick,
    skill_patterns: Vec<String>,
}

impl Lexicons {
    /// Shared instance built from the built-in lists only.
    pub fn builtin() -> Arc<Lexicons> {
        Arc::clone(&BUILTIN)
    }

    /// Built-in lists merged with configured extras.
    pub fn with_extras(extras: &LexiconConfig) -> Result<Arc<Lexicons>> {
        let empty = extras.extra_companies.is_empty()
            && extras.extra_schools.is_empty()
            && extras.extra_technical_skills.is_empty()
            && extras.extra_functional_skills.is_empty()
            && extras.extra_noise_words.is_empty();
        if empty {
            return Ok(Self::builtin());
        }
        Ok(Arc::new(Self::build(extras)?))
    }

    fn build(extras: &LexiconConfig) -> Result<Self> {
        let keyed = |builtin: &[&str], extra: &[String]| -> Vec<String> {
            let mut seen = HashSet::new();
            builtin
                .iter()
                .map(|s| s.to_string())
                .chain(extra.iter().cloned())
                .map(|s| normalize_key(&s))
                .filter(|s| !s.is_empty() && seen.insert(s.clone()))
                .collect()
        };

        let company_list = keyed(KNOWN_COMPANIES, &extras.extra_companies);
        let school_list = keyed(KNOWN_SCHOOLS, &extras.extra_schools);
        let technical_list = keyed(TECHNICAL_SKILLS, &extras.extra_technical_skills);
        let functional = keyed(FUNCTIONAL_SKILLS, &extras.extra_functional_skills);
        let noise_list = keyed(NOISE_WORDS, &extras.extra_noise_words);

        // Matching runs on the raw text, so accented spellings are added back
        // next to their folded keys.
        let with_accents = |keys: &[String], originals: &[&str], extra: &[String]| -> Vec<String> {
            let mut patterns: Vec<String> = keys.to_vec();
            for original in originals.iter().map(|s| s.to_string()).chain(extra.iter().cloned()) {
                let lower = original.trim().to_lowercase();
                if !patterns.contains(&lower) {
                    patterns.push(lower);
                }
            }
            patterns
        };

        let company_patterns = with_accents(&company_list, KNOWN_COMPANIES, &extras.extra_companies);
        let company_matcher = build_matcher(&company_patterns)?;

        // One- and two-letter skills ("r", "go", "c") only count inside a skills section.
        let skill_patterns: Vec<String> = with_accents(
            &technical_list,
            TECHNICAL_SKILLS,
            &extras.extra_technical_skills,
        )
        .into_iter()
        .filter(|s| s.chars().count() >= 3 || s.contains(['#', '+']))
        .collect();
        let skill_matcher = build_matcher(&skill_patterns)?;

        Ok(Self {
            companies: company_list.into_iter().collect(),
            schools: school_list.into_iter().collect(),
            technical: technical_list.into_iter().collect(),
            functional,
            noise_words: noise_list.into_iter().collect(),
            company_matcher,
            skill_matcher,
            skill_patterns,
        })
    }

    pub fn is_known_company(&self, text: &str) -> bool {
        self.companies.contains(&normalize_key(text))
    }

    /// True when the phrase names or contains a well-known school.
    pub fn mentions_known_school(&self, text: &str) -> bool {
        let key = normalize_key(text);
        self.schools.iter().any(|school| contains_phrase(&key, school))
    }

    pub fn is_technical_skill(&self, text: &str) -> bool {
        self.technical.contains(&normalize_key(text))
    }

    /// Exact match of a functional entry, or a functional keyword inside a longer phrase.
    pub fn is_functional_skill(&self, text: &str) -> bool {
        let key = normalize_key(text);
        if self.technical.contains(&key) {
            return false;
        }
        self.functional.iter().any(|kw| contains_phrase(&key, kw))
    }

    pub fn is_noise_word(&self, word: &str) -> bool {
        let key = normalize_key(word);
        self.noise_words.contains(&key) || self.technical.contains(&key)
    }

    pub fn is_section_title(&self, text: &str) -> bool {
        let key = normalize_key(text.trim_end_matches([':', ' ']));
        SECTION_TITLES.iter().any(|t| normalize_key(t) == key)
    }

    pub fn has_section_fragment(&self, text: &str) -> bool {
        let key = normalize_key(text);
        SECTION_FRAGMENTS.iter().any(|f| key.contains(f))
    }

    /// Byte ranges of known employers in `text`, on word boundaries.
    pub fn find_companies(&self, text: &str) -> Vec<(usize, usize)> {
        find_bounded(&self.company_matcher, text)
    }

    /// Byte ranges of technical skills in `text`, on word boundaries.
    pub fn find_skills(&self, text: &str) -> Vec<(usize, usize)> {
        find_bounded(&self.skill_matcher, text)
    }

    pub fn skill_pattern_count(&self) -> usize {
        self.skill_patterns.len()
    }
}

/// Display form of a language name, if it belongs to the lexicon.
pub fn canonical_language(word: &str) -> Option<&'static str> {
    let key = normalize_key(word);
    LANGUAGES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, display)| *display)
}

pub fn is_hobby_word(word: &str) -> bool {
    let key = normalize_key(word);
    HOBBY_WORDS.iter().any(|h| normalize_key(h) == key)
}

pub fn is_generic_company_word(word: &str) -> bool {
    let key = normalize_key(word);
    GENERIC_COMPANY_WORDS.iter().any(|g| normalize_key(g) == key)
}

pub fn is_company_stopword(text: &str) -> bool {
    let key = normalize_key(text);
    COMPANY_STOPLIST.iter().any(|s| normalize_key(s) == key)
}

/// Strip lead-ins like "Maîtrise de" from a skill token.
pub fn strip_skill_noise(token: &str) -> &str {
    let token = token.trim();
    let lower = token.to_lowercase();
    let longest = SKILL_NOISE_PREFIXES
        .iter()
        .filter(|prefix| lower.starts_with(*prefix))
        .max_by_key(|prefix| prefix.len());
    match longest.and_then(|prefix| token.get(prefix.len()..)) {
        Some(rest) => rest.trim_start_matches([' ', ':']).trim(),
        None => token,
    }
}

/// `needle` occurs in `haystack` delimited by non-alphanumeric chars or the ends.
pub fn contains_phrase(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(i, m)| {
        let before = haystack[..i].chars().next_back();
        let after = haystack[i + m.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn build_matcher(patterns: &[String]) -> Result<AhoCorasick> {
    AhoCorasick::builder()
        .ascii_case_insensitive(true)
        .match_kind(MatchKind::LeftmostLongest)
        .build(patterns)
        .map_err(|e| CvError::Config(format!("Failed to build lexicon matcher: {}", e)))
}

fn find_bounded(matcher: &AhoCorasick, text: &str) -> Vec<(usize, usize)> {
    matcher
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
        .map(|m| (m.start(), m.end()))
        .collect()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_functional_versus_technical() {
        let lex = Lexicons::builtin();
        assert!(lex.is_functional_skill("communication"));
        assert!(lex.is_functional_skill("Gestion de projet"));
        assert!(lex.is_functional_skill("Travail en equipe"));
        assert!(!lex.is_functional_skill("Python"));
        assert!(!lex.is_functional_skill("Plotly"));
        assert!(lex.is_technical_skill("PYTHON"));
        assert!(lex.is_technical_skill("Node.js"));
    }

    #[test]
    fn test_find_skills_respects_word_boundaries() {
        let lex = Lexicons::builtin();
        let text = "Stack: JavaScript, Java et PostgreSQL; Rustacean";
        let found: Vec<&str> = lex.find_skills(text).iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(found, vec!["JavaScript", "Java", "PostgreSQL"]);
    }

    #[test]
    fn test_find_companies_with_accents() {
        let lex = Lexicons::builtin();
        let text = "Stage chez Société Générale puis Capgemini";
        let found: Vec<&str> = lex.find_companies(text).iter().map(|&(s, e)| &text[s..e]).collect();
        assert_eq!(found, vec!["Société Générale", "Capgemini"]);
    }

    #[test]
    fn test_config_extras_are_merged() {
        let extras = LexiconConfig {
            extra_companies: vec!["Qonto".to_string()],
            extra_technical_skills: vec!["Svelte".to_string()],
            ..Default::default()
        };
        let lex = Lexicons::with_extras(&extras).unwrap();
        assert!(lex.is_known_company("qonto"));
        assert!(lex.is_known_company("Google"));
        assert!(lex.is_technical_skill("svelte"));
        assert!(lex.skill_pattern_count() > Lexicons::builtin().skill_pattern_count());
    }

    #[test]
    fn test_languages_and_noise() {
        assert_eq!(canonical_language("ANGLAIS"), Some("Anglais"));
        assert_eq!(canonical_language("français"), Some("Français"));
        assert_eq!(canonical_language("Langues"), None);
        assert_eq!(strip_skill_noise("Maîtrise de Docker"), "Docker");
        assert_eq!(strip_skill_noise("Outils : Jira"), "Jira");
        assert!(contains_phrase("gestion de projet agile", "gestion de projet"));
        assert!(!contains_phrase("gestionnaire", "gestion"));
    }
}
