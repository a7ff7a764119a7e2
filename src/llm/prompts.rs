//! Prompt sent to the oracle

/// Asks for the whole record as one JSON object. `{cv}` is replaced by the document text.
pub const EXTRACTION_TEMPLATE: &str = r#"Analyse ce CV et retourne strictement un JSON structuré avec les champs suivants :
- identite (nom, prenom)
- contact (adresse, ville, code_postal, email, telephone)
- experience (poste, entreprise, ville, date_debut, date_fin, description)
- formation (diplome, ecole, date_debut, date_fin)
- certifications
- langues
- competences
- resume

N'invente rien. Retourne uniquement du JSON valide.

CV :
{cv}

JSON:"#;

pub fn render_extraction_prompt(cv_text: &str) -> String {
    EXTRACTION_TEMPLATE.replace("{cv}", cv_text)
}
