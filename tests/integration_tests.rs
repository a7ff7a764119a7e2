//! Integration tests for the document readers and the end-to-end pipeline

use cv_extractor::config::Config;
use cv_extractor::error::{CvError, ErrorKind};
use cv_extractor::input::manager::InputManager;
use cv_extractor::output::ExtractionReport;
use cv_extractor::processing::PipelineBuilder;
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use std::path::{Path, PathBuf};

fn paragraph(text: &str) -> Paragraph {
    if text.is_empty() {
        Paragraph::new()
    } else {
        Paragraph::new().add_run(Run::new().add_text(text))
    }
}

fn table(rows: &[&[&str]]) -> Table {
    Table::new(
        rows.iter()
            .map(|row| TableRow::new(row.iter().map(|cell| TableCell::new().add_paragraph(paragraph(cell))).collect()))
            .collect(),
    )
}

fn write_docx(dir: &Path, name: &str, docx: Docx) -> PathBuf {
    let path = dir.join(name);
    let file = std::fs::File::create(&path).unwrap();
    docx.build().pack(file).unwrap();
    path
}

fn cv_body() -> Docx {
    [
        "Adèle Patarot",
        "Data Analyst",
        "21, rue Pierre Bourdan, 78160 Marly-le-Roi",
        "adele.patarot@gmail.com",
        "06 12 34 56 78",
        "",
        "FORMATION",
        "Master Informatique, Université Paris-Saclay, 2018-2020",
        "",
        "EXPÉRIENCES PROFESSIONNELLES",
        "2018 - 2021 – Capgemini – Ingénieur DevOps",
        "Audit des pipelines existants",
        "2021-Présent: Lead DevOps chez AWS",
        "- Migration Kubernetes",
        "",
        "COMPÉTENCES",
        "Python, Java, communication, gestion de projet, Plotly",
        "",
        "LANGUES",
        "Anglais : courant",
    ]
    .iter()
    .fold(Docx::new(), |docx, line| docx.add_paragraph(paragraph(line)))
}

fn offline_config() -> Config {
    let mut config = Config::default();
    config.models.models_dir = PathBuf::from("/nonexistent/cv-extractor/models");
    config.oracle.enabled = false;
    config
}

#[tokio::test]
async fn test_text_extraction_from_docx() {
    let dir = tempfile::tempdir().unwrap();
    let docx = Docx::new()
        .add_paragraph(paragraph("Adèle Patarot"))
        .add_table(table(&[&["Téléphone", "06 12 34 56 78"], &["Email", "adele.patarot@gmail.com"]]))
        .add_paragraph(paragraph("R&D Data"));
    let path = write_docx(dir.path(), "cv.docx", docx);

    let raw = InputManager::new().extract_text(&path).await.unwrap();
    assert_eq!(
        raw.text(),
        "Adèle Patarot\nTéléphone | 06 12 34 56 78\nEmail | adele.patarot@gmail.com\nR&D Data"
    );
    assert_eq!(raw.source().path, path);
}

#[tokio::test]
async fn test_unsupported_file_type() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cv.xyz");
    std::fs::write(&path, "Adèle Patarot").unwrap();

    let err = InputManager::new().extract_text(&path).await.unwrap_err();
    assert!(matches!(err, CvError::UnsupportedFormat(_)));
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert!(!err.is_recoverable());
}

#[tokio::test]
async fn test_missing_file_is_a_read_error() {
    let err = InputManager::new()
        .extract_text(Path::new("/nonexistent/cv.docx"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadError);
}

#[tokio::test]
async fn test_corrupt_docx_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.docx");
    std::fs::write(&path, b"not a zip container").unwrap();

    let err = InputManager::new().extract_text(&path).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadError);
}

#[tokio::test]
async fn test_pipeline_on_docx() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(dir.path(), "adele.docx", cv_body());

    let pipeline = PipelineBuilder::from_config(&offline_config()).build().unwrap();
    let outcome = pipeline.process(&path).await.unwrap();
    let cv = &outcome.canonical;

    assert!(outcome.summary.valid, "missing: {:?}", outcome.summary.missing);
    assert_eq!(cv.contact.nom.as_deref(), Some("Adèle Patarot"));
    assert_eq!(cv.contact.email.as_deref(), Some("adele.patarot@gmail.com"));
    assert_eq!(cv.contact.telephone.as_deref(), Some("06 12 34 56 78"));
    assert_eq!(cv.header.initiales, "AP");

    let companies: Vec<_> = cv.experiences.iter().map(|e| e.entreprise.as_deref()).collect();
    assert_eq!(companies, vec![Some("AWS"), Some("Capgemini")]);
    assert_eq!(cv.experiences[0].dates.as_deref(), Some("2021 – Présent"));

    assert_eq!(cv.formations.len(), 1);
    assert_eq!(cv.formations[0].diplome.as_deref(), Some("Master Informatique"));

    assert_eq!(cv.competences_techniques, vec!["Python", "Java", "Plotly"]);
    assert_eq!(cv.competences_fonctionnelles, vec!["communication", "gestion de projet"]);
    assert_eq!(cv.langues, vec!["Anglais (courant)"]);
}

#[tokio::test]
async fn test_pipeline_rejects_unsupported_input() {
    let pipeline = PipelineBuilder::from_config(&offline_config()).build().unwrap();
    let err = pipeline.process(Path::new("cv.odt")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}

#[tokio::test]
async fn test_report_saved_under_candidate_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_docx(dir.path(), "adele.docx", cv_body());
    let pipeline = PipelineBuilder::from_config(&offline_config()).build().unwrap();
    let outcome = pipeline.process(&path).await.unwrap();

    let report = ExtractionReport::new(&outcome);
    let out = dir.path().join("out");
    let saved = report.save(&out, true).unwrap();
    assert_eq!(saved, out.join("CV_Adèle_Patarot.json"));

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&saved).unwrap()).unwrap();
    assert_eq!(json["contact"]["nom"], "Adèle Patarot");
    assert_eq!(json["projets"], serde_json::json!([]));
    assert!(json.get("generated_at").is_none());
}
