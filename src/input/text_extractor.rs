//! Text extraction from DOCX and PDF files

use crate::error::{CvError, Result};
use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCellContent, TableChild,
    TableRowChild,
};
use std::path::Path;
use tokio::fs;

pub trait TextExtractor {
    fn extract(&self, path: &Path) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Word-processing documents: one line per paragraph or table row.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| CvError::Read(format!("'{}': {}", path.display(), e)))?;

        let docx = read_docx(&bytes)?;
        Ok(document_text(&docx.document.children))
    }
}

/// Page-described documents.
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| CvError::Read(format!("'{}': {}", path.display(), e)))?;

        let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| {
            CvError::Read(format!("Failed to extract text from PDF '{}': {}", path.display(), e))
        })?;

        Ok(clean_pdf_text(&text))
    }
}

fn clean_pdf_text(text: &str) -> String {
    text.replace('\u{c}', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// Flatten the body of a document into plain text.
///
/// Paragraphs become lines; cells of a table row are joined with ` | `;
/// tabs and breaks map to a tab and a line feed.
pub(crate) fn document_text(children: &[DocumentChild]) -> String {
    let mut lines = Vec::new();
    for child in children {
        match child {
            DocumentChild::Paragraph(paragraph) => lines.push(paragraph_text(paragraph)),
            DocumentChild::Table(table) => lines.extend(table_rows(table)),
            _ => {}
        }
    }
    lines.join("\n").trim_matches('\n').to_string()
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_runs(&paragraph.children, &mut text);
    text
}

fn push_runs(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for piece in &run.children {
                    match piece {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) => out.push('\t'),
                        RunChild::Break(_) => out.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_runs(&link.children, out),
            _ => {}
        }
    }
}

/// Non-empty rows of a table, cells joined with ` | `.
fn table_rows(table: &Table) -> Vec<String> {
    let mut rows = Vec::new();
    for child in &table.rows {
        let TableChild::TableRow(row) = child;
        let mut cells = Vec::new();
        for cell in &row.cells {
            let TableRowChild::TableCell(cell) = cell;
            let mut parts = Vec::new();
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(paragraph) => {
                        let text = paragraph_text(paragraph);
                        let text = text.trim();
                        if !text.is_empty() {
                            parts.push(text.to_string());
                        }
                    }
                    // Nested tables surface as a single cell of the outer one.
                    TableCellContent::Table(nested) => parts.extend(table_rows(nested)),
                    _ => {}
                }
            }
            let cell = parts.join(" ");
            if !cell.is_empty() {
                cells.push(cell);
            }
        }
        if !cells.is_empty() {
            rows.push(cells.join(" | "));
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{BreakType, Docx, Run, TableCell, TableRow};
    use std::io::Cursor;

    fn text_of(docx: Docx) -> String {
        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        let docx = read_docx(buf.get_ref()).unwrap();
        document_text(&docx.document.children)
    }

    fn para(text: &str) -> Paragraph {
        Paragraph::new().add_run(Run::new().add_text(text))
    }

    fn cell(text: &str) -> TableCell {
        TableCell::new().add_paragraph(para(text))
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let docx = Docx::new()
            .add_paragraph(para("Adèle Patarot"))
            .add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("Data"))
                    .add_run(Run::new().add_text("Analyst")),
            )
            .add_paragraph(Paragraph::new())
            .add_paragraph(para("FORMATION"));
        assert_eq!(text_of(docx), "Adèle Patarot\nDataAnalyst\n\nFORMATION");
    }

    #[test]
    fn test_tabs_and_breaks() {
        let run = Run::new()
            .add_text("R&D")
            .add_tab()
            .add_text("2019")
            .add_break(BreakType::TextWrapping)
            .add_text("école <X>");
        let docx = Docx::new().add_paragraph(Paragraph::new().add_run(run));
        assert_eq!(text_of(docx), "R&D\t2019\nécole <X>");
    }

    #[test]
    fn test_table_rows_join_cells() {
        let table = Table::new(vec![
            TableRow::new(vec![cell("Nom"), cell("Pierre Bourdan")]),
            TableRow::new(vec![cell("Email"), cell("adele.patarot@gmail.com")]),
            TableRow::new(vec![cell(""), TableCell::new()]),
        ]);
        let docx = Docx::new().add_paragraph(para("CONTACT")).add_table(table);
        assert_eq!(
            text_of(docx),
            "CONTACT\nNom | Pierre Bourdan\nEmail | adele.patarot@gmail.com"
        );
    }

    #[test]
    fn test_pdf_form_feeds_become_line_breaks() {
        assert_eq!(clean_pdf_text("Page one  \n\u{c}Page two\n\n"), "Page one\n\nPage two");
    }
}
