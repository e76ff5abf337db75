//! Blocking client for the Gemini `generateContent` REST endpoint.
//!
//! Request bodies and response parsing are plain functions over
//! [`serde_json::Value`] so the wire format is testable without a network.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use tracing::debug;

use crate::{AiCollaborator, AiConfig, AiError, BookMetadata, Research, SourceLink};

const METADATA_PROMPT: &str = "Analyze these images from a PDF ebook and provide the book's \
     Name, Authors, Theme, and a concise 2-sentence Summary. Return valid JSON.";
const EMPTY_RESEARCH_TEXT: &str = "No information found.";

/// HTTP implementation of [`AiCollaborator`].
pub struct GeminiClient {
    config: AiConfig,
    api_key: String,
    http: reqwest::blocking::Client,
}

impl GeminiClient {
    /// Fails with [`AiError::NotConfigured`] when the config has no API key.
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let api_key = config.api_key.clone().ok_or(AiError::NotConfigured)?;
        Ok(Self {
            config,
            api_key,
            http: reqwest::blocking::Client::new(),
        })
    }

    fn generate(&self, model: &str, body: &Value) -> Result<Value, AiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, model
        );
        debug!(model, "sending generateContent request");
        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(AiError::Service {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json()?)
    }
}

impl AiCollaborator for GeminiClient {
    fn extract_metadata(&self, pages: &[Vec<u8>]) -> Result<BookMetadata, AiError> {
        let body = metadata_request_body(pages);
        let response = self.generate(&self.config.model, &body)?;
        parse_metadata_response(&response)
    }

    fn research(&self, query: &str) -> Result<Research, AiError> {
        let body = research_request_body(query);
        let response = self.generate(&self.config.model, &body)?;
        Ok(parse_research_response(&response))
    }

    fn edit_cover(&self, cover_png: &[u8], prompt: &str) -> Result<Option<Vec<u8>>, AiError> {
        let body = cover_request_body(cover_png, prompt);
        let response = self.generate(&self.config.image_model, &body)?;
        parse_cover_response(&response)
    }
}

fn inline_png(bytes: &[u8]) -> Value {
    json!({
        "inlineData": {
            "mimeType": "image/png",
            "data": BASE64.encode(bytes),
        }
    })
}

/// Page images followed by the extraction prompt, with a response schema so
/// the model answers in parseable JSON.
fn metadata_request_body(pages: &[Vec<u8>]) -> Value {
    let mut parts: Vec<Value> = pages.iter().map(|png| inline_png(png)).collect();
    parts.push(json!({ "text": METADATA_PROMPT }));
    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "name": { "type": "STRING" },
                    "authors": { "type": "ARRAY", "items": { "type": "STRING" } },
                    "theme": { "type": "STRING" },
                    "summary": { "type": "STRING" },
                },
                "required": ["name", "authors", "theme", "summary"],
            }
        }
    })
}

fn research_request_body(query: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": format!("Tell me more about: {query}") }] }],
        "tools": [{ "googleSearch": {} }],
    })
}

fn cover_request_body(cover_png: &[u8], prompt: &str) -> Value {
    json!({
        "contents": [{ "parts": [inline_png(cover_png), { "text": prompt }] }],
    })
}

/// Concatenated text parts of the first candidate, if any.
fn response_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let mut text = String::new();
    for part in parts {
        if let Some(piece) = part.get("text").and_then(Value::as_str) {
            text.push_str(piece);
        }
    }
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn parse_metadata_response(response: &Value) -> Result<BookMetadata, AiError> {
    let text = response_text(response).ok_or_else(|| {
        AiError::InvalidResponse("metadata response carried no text candidate".to_owned())
    })?;
    serde_json::from_str(&text)
        .map_err(|err| AiError::InvalidResponse(format!("metadata is not valid JSON: {err}")))
}

/// A missing or empty answer becomes the canned "no information" text rather
/// than an error; grounding chunks without a `web` entry are skipped.
fn parse_research_response(response: &Value) -> Research {
    let text = response_text(response).unwrap_or_else(|| EMPTY_RESEARCH_TEXT.to_owned());
    let sources = response
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("groundingMetadata"))
        .and_then(|metadata| metadata.get("groundingChunks"))
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| {
                    let web = chunk.get("web")?;
                    let uri = web.get("uri").and_then(Value::as_str)?;
                    Some(SourceLink {
                        title: web
                            .get("title")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_owned(),
                        uri: uri.to_owned(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Research { text, sources }
}

/// The edited image arrives as an inline-data part; text parts may precede
/// it. No image part means the service declined, which is not an error.
fn parse_cover_response(response: &Value) -> Result<Option<Vec<u8>>, AiError> {
    let Some(parts) = response
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
    else {
        return Ok(None);
    };
    for part in parts {
        if let Some(data) = part
            .get("inlineData")
            .and_then(|inline| inline.get("data"))
            .and_then(Value::as_str)
        {
            let bytes = BASE64.decode(data).map_err(|err| {
                AiError::InvalidResponse(format!("cover image is not valid base64: {err}"))
            })?;
            return Ok(Some(bytes));
        }
    }
    Ok(None)
}
