//! Console, JSON and Markdown renderings of an extraction report

use crate::config::{OutputConfig, OutputFormat};
use crate::error::Result;
use crate::output::report::ExtractionReport;
use crate::processing::normalizer::{ExperienceBlock, FormationEntry};
use colored::{Color, Colorize};

pub trait OutputFormatter {
    fn format(&self, report: &ExtractionReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

pub struct ConsoleFormatter {
    use_colors: bool,
}

/// The canonical record itself, UTF-8 with accents kept.
pub struct JsonFormatter {
    pretty: bool,
}

pub struct MarkdownFormatter {
    include_metadata: bool,
}

/// Formatter for `format`, configured from `[output]`.
pub fn formatter_for(format: OutputFormat, config: &OutputConfig) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Console => Box::new(ConsoleFormatter::new(config.color_output)),
        OutputFormat::Json => Box::new(JsonFormatter::new(config.pretty)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter::new(true)),
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn experience_heading(block: &ExperienceBlock) -> String {
    let mut heading = or_dash(&block.titre).to_string();
    if let Some(company) = &block.entreprise {
        heading.push_str(" @ ");
        heading.push_str(company);
    }
    heading
}

fn experience_details(block: &ExperienceBlock) -> Option<String> {
    let details: Vec<&str> = [&block.dates, &block.lieu].into_iter().flatten().map(String::as_str).collect();
    (!details.is_empty()).then(|| details.join(", "))
}

fn formation_line(entry: &FormationEntry) -> String {
    let mut line = [&entry.diplome, &entry.etablissement]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" – ");
    if let Some(dates) = &entry.dates {
        line.push_str(&format!(" ({})", dates));
    }
    line
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let (prefix, color) = match level {
            1 => ("█", Color::Blue),
            2 => ("▓", Color::Green),
            _ => ("▒", Color::Yellow),
        };
        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn push_list(&self, output: &mut String, title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        output.push_str(&self.format_header(title, 2));
        for item in items {
            output.push_str(&format!("  • {}\n", item));
        }
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, report: &ExtractionReport) -> Result<String> {
        let cv = &report.cv;
        let mut output = String::new();

        output.push_str(&self.format_header(&cv.header.titre_document, 1));
        output.push_str(&format!(
            "{} | {}\n",
            self.colorize(&cv.header.confidentialite, Color::BrightBlack),
            report.source.display()
        ));

        output.push_str(&self.format_header("Contact", 2));
        output.push_str(&format!("Nom: {}", self.colorize(or_dash(&cv.contact.nom), Color::Cyan)));
        if !cv.header.initiales.is_empty() {
            output.push_str(&format!(" ({})", cv.header.initiales));
        }
        output.push('\n');
        output.push_str(&format!("Titre: {}\n", or_dash(&cv.contact.titre_profil)));
        output.push_str(&format!("Email: {}\n", or_dash(&cv.contact.email)));
        output.push_str(&format!("Téléphone: {}\n", or_dash(&cv.contact.telephone)));
        output.push_str(&format!("Adresse: {}\n", or_dash(&cv.contact.adresse)));
        if let Some(availability) = &cv.disponibilite {
            output.push_str(&format!("Disponibilité: {}\n", availability));
        }

        if !cv.experiences.is_empty() {
            output.push_str(&self.format_header("Expériences", 2));
            for block in &cv.experiences {
                output.push_str(&format!("{}\n", self.colorize(&experience_heading(block), Color::White)));
                if let Some(details) = experience_details(block) {
                    output.push_str(&format!("  {}\n", self.colorize(&details, Color::BrightBlack)));
                }
                for mission in &block.missions {
                    output.push_str(&format!("  - {}\n", mission));
                }
                if let Some(environment) = &block.environnement {
                    output.push_str(&format!("  Environnement: {}\n", environment));
                }
            }
        }

        if !cv.formations.is_empty() {
            output.push_str(&self.format_header("Formations", 2));
            for entry in &cv.formations {
                output.push_str(&format!("  • {}\n", formation_line(entry)));
            }
        }

        self.push_list(&mut output, "Compétences techniques", &cv.competences_techniques);
        self.push_list(&mut output, "Compétences fonctionnelles", &cv.competences_fonctionnelles);
        self.push_list(&mut output, "Langues", &cv.langues);
        self.push_list(&mut output, "Certifications", &cv.certifications);
        self.push_list(&mut output, "Projets", &cv.projets);
        self.push_list(&mut output, "Loisirs", &cv.loisirs);

        output.push_str(&self.format_header("Validation", 3));
        if report.validation.valid {
            output.push_str(&format!(
                "{} ({})\n",
                self.colorize("complete", Color::Green),
                report.strategy
            ));
        } else {
            output.push_str(&format!(
                "{} ({}), missing: {}\n",
                self.colorize("incomplete", Color::Red),
                report.strategy,
                report.validation.missing.join(", ")
            ));
        }
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, report: &ExtractionReport) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(&report.cv)?)
        } else {
            Ok(serde_json::to_string(&report.cv)?)
        }
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl MarkdownFormatter {
    pub fn new(include_metadata: bool) -> Self {
        Self { include_metadata }
    }

    fn push_list(output: &mut String, title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        output.push_str(&format!("## {}\n\n", title));
        for item in items {
            output.push_str(&format!("- {}\n", item));
        }
        output.push('\n');
    }
}

impl OutputFormatter for MarkdownFormatter {
    fn format(&self, report: &ExtractionReport) -> Result<String> {
        let cv = &report.cv;
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", cv.header.titre_document));
        output.push_str(&format!("*{}*\n\n", cv.header.confidentialite));
        if self.include_metadata {
            output.push_str(&format!(
                "**Source:** `{}` | **Stratégie:** {} | **Généré:** {}\n\n",
                report.source.display(),
                report.strategy,
                report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            if !report.validation.valid {
                output.push_str(&format!("> Incomplet : {}\n\n", report.validation.missing.join(", ")));
            }
        }

        output.push_str("## Contact\n\n");
        output.push_str("| Champ | Valeur |\n|-------|--------|\n");
        output.push_str(&format!("| Nom | {} |\n", or_dash(&cv.contact.nom)));
        output.push_str(&format!("| Titre | {} |\n", or_dash(&cv.contact.titre_profil)));
        output.push_str(&format!("| Email | {} |\n", or_dash(&cv.contact.email)));
        output.push_str(&format!("| Téléphone | {} |\n", or_dash(&cv.contact.telephone)));
        output.push_str(&format!("| Adresse | {} |\n", or_dash(&cv.contact.adresse)));
        if let Some(availability) = &cv.disponibilite {
            output.push_str(&format!("| Disponibilité | {} |\n", availability));
        }
        output.push('\n');

        if !cv.experiences.is_empty() {
            output.push_str("## Expériences\n\n");
            for block in &cv.experiences {
                output.push_str(&format!("### {}\n\n", experience_heading(block)));
                if let Some(details) = experience_details(block) {
                    output.push_str(&format!("*{}*\n\n", details));
                }
                for mission in &block.missions {
                    output.push_str(&format!("- {}\n", mission));
                }
                if let Some(environment) = &block.environnement {
                    output.push_str(&format!("\n**Environnement :** {}\n", environment));
                }
                output.push('\n');
            }
        }

        if !cv.formations.is_empty() {
            output.push_str("## Formations\n\n");
            for entry in &cv.formations {
                output.push_str(&format!("- {}\n", formation_line(entry)));
            }
            output.push('\n');
        }

        Self::push_list(&mut output, "Compétences techniques", &cv.competences_techniques);
        Self::push_list(&mut output, "Compétences fonctionnelles", &cv.competences_fonctionnelles);
        Self::push_list(&mut output, "Langues", &cv.langues);
        Self::push_list(&mut output, "Certifications", &cv.certifications);
        Self::push_list(&mut output, "Projets", &cv.projets);
        Self::push_list(&mut output, "Loisirs", &cv.loisirs);
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}
