use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use reqwest::Client;
use tracing::{info, warn, error, debug};

use crate::{config::GeminiConfig, data_uri::DataUri, models::IdentifiedItem, prompt};

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")] Http(String),
    #[error("API error: status={status} body={body}")] Api { status: u16, body: String },
    #[error("parse error: {0}")] Parse(String),
    #[error("no image data in response")] NoImage,
}

/// The two remote capabilities the collage flow depends on.
#[async_trait]
pub trait CollageModel: Send + Sync {
    /// Stage 1: render a collage from a prompt and optional reference photos.
    async fn synthesize(&self, prompt: &str, references: &[DataUri]) -> Result<DataUri, GeminiError>;

    /// Stage 2: list the items visible in a rendered collage.
    async fn identify_items(&self, image: &DataUri) -> Result<Vec<IdentifiedItem>, GeminiError>;
}

// Truncates base64 payloads in a JSON value so request/response bodies stay readable in logs.
fn truncate_base64_in_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let Value::String(s) = val {
                        let total = s.chars().count();
                        if total > 100 {
                            let head: String = s.chars().take(50).collect();
                            *val = Value::String(format!("{}...[truncated {} chars]", head, total - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(value: &Value) -> String {
    let mut copy = value.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn generate_content(&self, model: &str, body: &Value) -> Result<GeminiResponse, GeminiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, model, self.config.api_key
        );
        info!("🔗 Making request to: {}", url.replace(&self.config.api_key, "***"));
        debug!("📤 Request body: {}", loggable(body));

        let response = self.client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(GeminiError::Api { status: status.as_u16(), body: response_text });
        }

        let raw: Value = serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Parse(e.to_string()))?;
        debug!("📥 Raw Gemini API response: {}", loggable(&raw));

        serde_json::from_value(raw).map_err(|e| GeminiError::Parse(e.to_string()))
    }
}

#[async_trait]
impl CollageModel for GeminiClient {
    async fn synthesize(&self, prompt: &str, references: &[DataUri]) -> Result<DataUri, GeminiError> {
        let mut parts: Vec<Part> = references.iter().map(Part::inline).collect();
        parts.push(Part::Text { text: prompt.to_string() });

        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "responseModalities": ["IMAGE"]
            }
        });

        info!("🎨 Requesting collage from {} with {} reference image(s)", self.config.image_model, references.len());
        let parsed = self.generate_content(&self.config.image_model, &body).await?;
        let image = extract_first_image(&parsed).ok_or(GeminiError::NoImage)?;
        info!("🖼️ Extracted {} collage ({} base64 chars)", image.mime_type(), image.data().len());
        Ok(image)
    }

    async fn identify_items(&self, image: &DataUri) -> Result<Vec<IdentifiedItem>, GeminiError> {
        let body = json!({
            "contents": [{
                "parts": [
                    Part::inline(image),
                    Part::Text { text: prompt::analysis_instruction().to_string() }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": prompt::analysis_schema()
            }
        });

        info!("🔍 Identifying collage items with {}", self.config.analysis_model);
        let parsed = self.generate_content(&self.config.analysis_model, &body).await?;
        let text = extract_text(&parsed);
        let items = parse_items(text.as_deref().unwrap_or_default())?;
        info!("✅ Identified {} item(s)", items.len());
        Ok(items)
    }
}

// --- Wire types ---

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text { text: String },
    Other(Value),
}

impl Part {
    fn inline(uri: &DataUri) -> Self {
        Part::Inline {
            inline_data: InlineData {
                mime_type: uri.mime_type().to_string(),
                data: uri.data().to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

fn extract_first_image(resp: &GeminiResponse) -> Option<DataUri> {
    let candidate = resp.candidates.first()?;
    candidate.content.parts.iter().find_map(|p| match p {
        Part::Inline { inline_data } => Some(DataUri::new(&inline_data.mime_type, &inline_data.data)),
        _ => None,
    })
}

fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let candidate = resp.candidates.first()?;
    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    Some(text)
}

/// Parses the analysis model's JSON array. Blank output is zero items;
/// records that do not carry a usable category are skipped.
pub fn parse_items(text: &str) -> Result<Vec<IdentifiedItem>, GeminiError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let records: Vec<Value> = serde_json::from_str(text)
        .map_err(|e| GeminiError::Parse(format!("analysis output is not a JSON array: {e}")))?;

    let mut items = Vec::with_capacity(records.len());
    for record in records {
        match serde_json::from_value::<IdentifiedItem>(record) {
            Ok(item) if !item.category.trim().is_empty() => items.push(item),
            Ok(_) => warn!("skipping identified item with blank category"),
            Err(e) => warn!("skipping malformed identified item: {}", e),
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::{
        matchers::{body_partial_json, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(GeminiConfig::new("test-key", server.uri())).unwrap()
    }

    fn image_response() -> Value {
        json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your collage" },
                        { "inlineData": { "mimeType": "image/png", "data": "aW1hZ2U=" } }
                    ]
                }
            }]
        })
    }

    #[tokio::test]
    async fn synthesize_sends_references_before_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash-image:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "contents": [{ "parts": [
                    { "inlineData": { "mimeType": "image/jpeg", "data": "cmVm" } },
                    { "text": "make a collage" }
                ]}],
                "generationConfig": { "responseModalities": ["IMAGE"] }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_response()))
            .expect(1)
            .mount(&server)
            .await;

        let image = client_for(&server)
            .synthesize("make a collage", &[DataUri::new("image/jpeg", "cmVm")])
            .await
            .unwrap();
        assert_eq!(image, DataUri::new("image/png", "aW1hZ2U="));
    }

    #[tokio::test]
    async fn synthesize_without_image_part_is_no_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).synthesize("x", &[]).await.unwrap_err();
        assert!(matches!(err, GeminiError::NoImage));
    }

    #[tokio::test]
    async fn api_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let err = client_for(&server).synthesize("x", &[]).await.unwrap_err();
        assert!(matches!(err, GeminiError::Api { status: 403, ref body } if body == "denied"));
    }

    #[tokio::test]
    async fn identify_items_requests_json_schema() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(body_partial_json(json!({
                "generationConfig": { "responseMimeType": "application/json" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{
                    "text": r#"[{"category":"Sofa","brand":"Cassina","productName":"Maralunga","price":"about 1,200,000 yen"},{"category":"Rug"}]"#
                }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client_for(&server)
            .identify_items(&DataUri::new("image/png", "aW1hZ2U="))
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].brand.as_deref(), Some("Cassina"));
        assert_eq!(items[0].product_name.as_deref(), Some("Maralunga"));
        assert_eq!(items[1], IdentifiedItem::new("Rug"));
    }

    #[test]
    fn parse_items_treats_blank_output_as_empty() {
        assert_eq!(parse_items("").unwrap(), vec![]);
        assert_eq!(parse_items("  \n").unwrap(), vec![]);
        assert_eq!(parse_items("[]").unwrap(), vec![]);
    }

    #[test]
    fn parse_items_skips_records_without_category() {
        let items = parse_items(r#"[{"brand":"x"},{"category":"  "},{"category":"Lamp","price":""}]"#).unwrap();
        assert_eq!(items, vec![IdentifiedItem::new("Lamp")]);
    }

    #[test]
    fn parse_items_rejects_non_array() {
        assert!(matches!(parse_items("not json"), Err(GeminiError::Parse(_))));
        assert!(matches!(parse_items(r#"{"category":"Sofa"}"#), Err(GeminiError::Parse(_))));
    }

    #[test]
    fn base64_is_truncated_for_logs() {
        let long = "A".repeat(200);
        let out = loggable(&json!({ "parts": [{ "inlineData": { "data": long } }] }));
        assert!(out.contains("[truncated 150 chars]"));
    }

    #[test]
    fn truncation_handles_multibyte_text() {
        let text = "ソファ".repeat(40);
        let out = loggable(&json!({ "data": text }));
        let head = format!("{}ソフ", "ソファ".repeat(16));
        assert!(out.contains(&format!("{head}...[truncated 70 chars]")));
    }
}
