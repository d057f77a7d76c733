use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, error};

use crate::{config::GeminiConfig, error::GenerationError, generator::ImageGenerator};

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", &s[..50], s.len() - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(s: &str) -> String {
    match s.char_indices().nth(50) {
        Some((cut, _)) => format!("{}...[{} chars total]", &s[..cut], s.len()),
        None => s.to_string(),
    }
}

/// Image generation backed by the Gemini `generateContent` endpoint.
pub struct GeminiImageGenerator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiImageGenerator {
    pub fn new(config: &GeminiConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.image_model.clone(),
        }
    }

    async fn perform_api_call(&self, prompt: &str) -> Result<InlineData, GenerationError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        info!("🔗 Making request to: {}", url);

        let request_body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "temperature": 0.4,
                "topP": 0.95,
                "topK": 64,
                "candidateCount": 1
            }
        });

        let response = self.client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string().replace(&self.api_key, "***")))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API Error response: {}", error_body);
            return Err(GenerationError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text = response.text().await
            .map_err(|e| GenerationError::Http(e.to_string()))?;

        let logged = match serde_json::from_str::<serde_json::Value>(&response_text) {
            Ok(mut json_value) => {
                truncate_base64_in_json(&mut json_value);
                json_value.to_string()
            }
            Err(_) => preview(&response_text),
        };
        info!("📥 Raw Gemini API response: {}", logged);

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::Other(format!("parse error: {}", e)))?;

        extract_first_image(parsed).ok_or(GenerationError::MissingImage)
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    async fn render(&self, prompt: &str) -> Result<String, GenerationError> {
        info!("🎨 Generating image with Gemini ({})...", self.model);
        let inline = self.perform_api_call(prompt).await?;
        let url = to_data_url(&inline)?;
        info!("✅ Successfully generated image: {}", preview(&url));
        Ok(url)
    }
}

/// Decodes the inline payload far enough to confirm it is an image, then wraps it as a `data:` URL.
fn to_data_url(inline: &InlineData) -> Result<String, GenerationError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(inline.data.trim())
        .map_err(|e| GenerationError::Other(format!("invalid base64 image data: {}", e)))?;
    let format = image::guess_format(&bytes)
        .map_err(|e| GenerationError::Other(format!("unrecognised image data: {}", e)))?;
    let mime = format.to_mime_type();
    if !inline.mime_type.is_empty() && inline.mime_type != mime {
        info!("⚠️ Declared mime type {} differs from detected {}", inline.mime_type, mime);
    }
    Ok(format!("data:{};base64,{}", mime, inline.data.trim()))
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(serde::de::IgnoredAny)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

fn extract_first_image(resp: GeminiResponse) -> Option<InlineData> {
    for c in resp.candidates {
        for p in c.content.parts {
            match p {
                Part::Inline { inline_data } => {
                    info!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                    return Some(inline_data);
                }
                Part::Text { text } => info!("💬 Model text: {}", preview(&text)),
                Part::Other(_) => {}
            }
        }
    }
    info!("⚠️ No inline image data found in response structure");
    None
}
