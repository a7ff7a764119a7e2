//! Client for a local LLM inference server used as the last fallback.
//!
//! Speaks the Ollama API: `POST /api/generate` for completions and
//! `GET /api/tags` for the installed models.

use crate::config::OracleConfig;
use crate::error::{CvError, Result};
use crate::llm::prompts::render_extraction_prompt;
use crate::processing::parser::normalize_date_range;
use crate::processing::record::{ContactRecord, CvRecord, ExperienceItem, FormationItem, SkillRecord};
use crate::processing::text_processor::{collapse_whitespace, dedup_case_insensitive, prefix_graphemes};
use log::{debug, info, warn};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

/// What `GET /api/tags` says about the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OracleStatus {
    pub reachable: bool,
    pub model_available: bool,
    pub models: Vec<String>,
}

pub struct OracleClient {
    config: OracleConfig,
    client: Client,
}

impl OracleClient {
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    fn tags_url(&self) -> Result<Url> {
        let endpoint = Url::parse(&self.config.endpoint)
            .map_err(|e| CvError::Config(format!("Invalid oracle endpoint '{}': {}", self.config.endpoint, e)))?;
        endpoint
            .join("/api/tags")
            .map_err(|e| CvError::Config(format!("Invalid oracle endpoint: {}", e)))
    }

    /// Reachability of the server and whether the configured model is pulled.
    /// An unreachable server is a status, not an error.
    pub async fn status(&self) -> Result<OracleStatus> {
        let url = self.tags_url()?;
        let resp = match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!("Oracle tags request returned HTTP {}", resp.status());
                return Ok(OracleStatus::default());
            }
            Err(e) => {
                debug!("Oracle not reachable: {}", e);
                return Ok(OracleStatus::default());
            }
        };

        let tags: TagsResponse = resp.json().await?;
        let models: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();
        Ok(OracleStatus {
            reachable: true,
            model_available: models.iter().any(|name| name.starts_with(&self.config.model)),
            models,
        })
    }

    /// Ask the oracle for the whole record. Transport and parse failures are
    /// retried `max_retries` times with a fixed delay.
    pub async fn analyze(&self, text: &str) -> Result<CvRecord> {
        if text.trim().is_empty() {
            return Err(CvError::InvalidInput("CV text is empty".to_string()));
        }

        let status = self.status().await?;
        if !status.reachable {
            return Err(CvError::OracleUnavailable(format!(
                "no inference server at {}",
                self.config.endpoint
            )));
        }
        if !status.model_available {
            return Err(CvError::OracleUnavailable(format!(
                "model '{}' is not installed on the server",
                self.config.model
            )));
        }

        let prompt = render_extraction_prompt(prefix_graphemes(text, self.config.max_content_chars));
        let attempts = self.config.max_retries.max(1);
        let mut last_error = CvError::OracleUnavailable("no attempt made".to_string());

        for attempt in 1..=attempts {
            match self.generate(&prompt).await.and_then(|response| parse_response(&response)) {
                Ok(record) => {
                    info!("Oracle extraction succeeded on attempt {}", attempt);
                    return Ok(record);
                }
                Err(e) => {
                    warn!("Oracle attempt {}/{} failed: {}", attempt, attempts, e);
                    last_error = e;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
            }
        }
        Err(last_error)
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: prompt.to_string(),
            stream: false,
            temperature: self.config.temperature,
        };

        let resp = self.client.post(&self.config.endpoint).json(&request).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CvError::OracleUnavailable(format!("HTTP {}: {}", status, body)));
        }

        let generated: GenerateResponse = resp.json().await?;
        debug!("Oracle responded with {} bytes", generated.response.len());
        Ok(generated.response)
    }
}

/// The first balanced `{...}` in `text`, skipping braces inside JSON strings.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_response(response: &str) -> Result<CvRecord> {
    let json = extract_json_object(response)
        .ok_or_else(|| CvError::OracleParse("no JSON object in the response".to_string()))?;
    let cv: OracleCv = serde_json::from_str(json).map_err(|e| CvError::OracleParse(e.to_string()))?;
    Ok(cv.into_record())
}

// The oracle answers in the prompt's French schema. Scalars may come back as
// numbers and lists as comma-separated strings, so leaves stay `Value`.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OracleCv {
    identite: OracleIdentity,
    contact: OracleContact,
    #[serde(deserialize_with = "objects")]
    experience: Vec<OracleExperience>,
    #[serde(deserialize_with = "objects")]
    formation: Vec<OracleFormation>,
    certifications: Value,
    langues: Value,
    competences: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OracleIdentity {
    nom: Value,
    prenom: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OracleContact {
    adresse: Value,
    ville: Value,
    code_postal: Value,
    email: Value,
    telephone: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OracleExperience {
    poste: Value,
    entreprise: Value,
    ville: Value,
    date_debut: Value,
    date_fin: Value,
    description: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OracleFormation {
    diplome: Value,
    ecole: Value,
    date_debut: Value,
    date_fin: Value,
}

/// A single object or a list of them; anything else is empty.
fn objects<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    };
    Ok(items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => collapse_whitespace(s),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty() && !matches!(text.to_lowercase().as_str(), "null" | "n/a" | "none"))
        .then(|| text.to_string())
}

/// Strings out of a list, a comma-separated string, or objects whose
/// scalar values are joined ("Anglais courant").
fn strings(value: &Value) -> Vec<String> {
    let raw: Vec<String> = match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(fields) => {
                    let parts: Vec<String> = fields.values().filter_map(scalar).collect();
                    (!parts.is_empty()).then(|| parts.join(" "))
                }
                other => scalar(other),
            })
            .collect(),
        Value::String(s) => s.split([',', ';', '\n']).map(str::to_string).collect(),
        _ => Vec::new(),
    };
    dedup_case_insensitive(raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty()))
}

fn joined(parts: &[Option<String>], separator: &str) -> Option<String> {
    let parts: Vec<&str> = parts.iter().flatten().map(String::as_str).collect();
    (!parts.is_empty()).then(|| parts.join(separator))
}

fn date_span(start: &Value, end: &Value) -> Option<String> {
    match (scalar(start), scalar(end)) {
        (Some(start), Some(end)) => Some(normalize_date_range(&format!("{} - {}", start, end))),
        (Some(start), None) => Some(start),
        (None, Some(end)) => Some(end),
        (None, None) => None,
    }
}

impl OracleCv {
    fn into_record(self) -> CvRecord {
        let name = joined(&[scalar(&self.identite.prenom), scalar(&self.identite.nom)], " ");
        let locality = joined(&[scalar(&self.contact.code_postal), scalar(&self.contact.ville)], " ");

        let experiences = self
            .experience
            .iter()
            .filter(|e| scalar(&e.entreprise).is_some() || scalar(&e.poste).is_some())
            .map(|e| ExperienceItem {
                company: scalar(&e.entreprise),
                job_title: scalar(&e.poste),
                dates: date_span(&e.date_debut, &e.date_fin),
                location: scalar(&e.ville),
                missions: match &e.description {
                    Value::String(s) => s.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect(),
                    other => strings(other),
                },
                environment: None,
            })
            .collect();

        let formations = self
            .formation
            .iter()
            .map(|f| FormationItem {
                establishment: scalar(&f.ecole),
                diploma: scalar(&f.diplome),
                dates: date_span(&f.date_debut, &f.date_fin),
            })
            .filter(FormationItem::is_retained)
            .collect();

        CvRecord {
            contact: ContactRecord {
                name,
                email: scalar(&self.contact.email),
                phone: scalar(&self.contact.telephone),
                address: joined(&[scalar(&self.contact.adresse), locality], ", "),
                profile_title: None,
            },
            formations,
            experiences,
            // The normalizer moves functional entries to their own list.
            skills: SkillRecord {
                technical: strings(&self.competences),
                functional: Vec::new(),
            },
            languages: strings(&self.langues),
            certifications: strings(&self.certifications),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const ORACLE_JSON: &str = r#"{
        "identite": {"nom": "Patarot", "prenom": "Adèle"},
        "contact": {"adresse": "12 rue des Lilas", "ville": "Lyon", "code_postal": 69003,
                    "email": "adele.patarot@gmail.com", "telephone": "06 12 34 56 78"},
        "experience": [
            {"poste": "Data Analyst", "entreprise": "AWS", "ville": "Paris",
             "date_debut": "2021", "date_fin": "aujourd'hui", "description": "Tableaux de bord\nAutomatisation"},
            {"poste": null, "entreprise": null}
        ],
        "formation": {"diplome": "Master MIAGE", "ecole": "Université Lyon 1", "date_debut": 2019, "date_fin": 2021},
        "certifications": "AWS Certified Cloud Practitioner",
        "langues": [{"langue": "Anglais", "niveau": "courant"}, "Espagnol"],
        "competences": ["Python", "SQL", "python"],
        "resume": "Analyste de données"
    }"#;

    fn config(endpoint: String) -> OracleConfig {
        OracleConfig {
            enabled: true,
            endpoint,
            max_retries: 2,
            retry_delay_secs: 0,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_json_object() {
        let text = "Voici le JSON :\n{\"a\": {\"b\": \"}\"}, \"c\": 1}\nFin.";
        assert_eq!(extract_json_object(text), Some("{\"a\": {\"b\": \"}\"}, \"c\": 1}"));
        assert_eq!(extract_json_object("pas de json"), None);
        assert_eq!(extract_json_object("{\"ouvert\": true"), None);
    }

    #[test]
    fn test_response_maps_onto_record() {
        let record = parse_response(&format!("Bien sûr ! {}", ORACLE_JSON)).unwrap();
        assert_eq!(record.contact.name.as_deref(), Some("Adèle Patarot"));
        assert_eq!(record.contact.address.as_deref(), Some("12 rue des Lilas, 69003 Lyon"));
        assert_eq!(record.experiences.len(), 1);
        let experience = &record.experiences[0];
        assert_eq!(experience.company.as_deref(), Some("AWS"));
        assert_eq!(experience.dates.as_deref(), Some("2021 – Présent"));
        assert_eq!(experience.missions, vec!["Tableaux de bord", "Automatisation"]);
        assert_eq!(record.formations[0].dates.as_deref(), Some("2019 – 2021"));
        assert_eq!(record.skills.technical, vec!["Python", "SQL"]);
        assert_eq!(record.languages, vec!["Anglais courant", "Espagnol"]);
        assert_eq!(record.certifications, vec!["AWS Certified Cloud Practitioner"]);
    }

    #[test]
    fn test_unparseable_response() {
        assert!(matches!(parse_response("Je ne peux pas."), Err(CvError::OracleParse(_))));
        assert!(matches!(parse_response("{\"identite\": \"Adèle\"}"), Err(CvError::OracleParse(_))));
    }

    #[test]
    fn test_tags_url_from_generate_endpoint() {
        let client = OracleClient::new(OracleConfig::default()).unwrap();
        assert_eq!(client.tags_url().unwrap().as_str(), "http://localhost:11434/api/tags");
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = OracleClient::new(config(format!("http://{}/api/generate", addr))).unwrap();
        let status = client.status().await.unwrap();
        assert!(!status.reachable);
        assert!(matches!(client.analyze("Adèle Patarot").await, Err(CvError::OracleUnavailable(_))));
        assert!(matches!(client.analyze("   ").await, Err(CvError::InvalidInput(_))));
    }

    /// Answer `n` requests: tags on GET, `reply` wrapped as a generation on POST.
    async fn serve(listener: TcpListener, n: usize, reply: String) {
        for _ in 0..n {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let read = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..read]);
                let head = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = head.find("\r\n\r\n") {
                    let length = head
                        .lines()
                        .find_map(|l| l.to_lowercase().strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap()))
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if read == 0 {
                    break;
                }
            }

            let body = if request.starts_with(b"GET") {
                serde_json::json!({"models": [{"name": "mistral:latest"}]}).to_string()
            } else {
                serde_json::json!({"response": reply, "done": true}).to_string()
            };
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_analyze_against_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(serve(listener, 3, ORACLE_JSON.to_string()));

        let client = OracleClient::new(config(format!("http://{}/api/generate", addr))).unwrap();
        let status = client.status().await.unwrap();
        assert!(status.reachable);
        assert!(status.model_available);
        assert_eq!(status.models, vec!["mistral:latest"]);

        let record = client.analyze("Adèle Patarot\nData Analyst chez AWS").await.unwrap();
        assert_eq!(record.contact.email.as_deref(), Some("adele.patarot@gmail.com"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_retries_then_parse_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // One tags request, then two generations.
        let server = tokio::spawn(serve(listener, 3, "Désolé, je ne sais pas.".to_string()));

        let client = OracleClient::new(config(format!("http://{}/api/generate", addr))).unwrap();
        assert!(matches!(client.analyze("Adèle Patarot").await, Err(CvError::OracleParse(_))));
        server.await.unwrap();
    }
}
