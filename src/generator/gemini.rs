//! Gemini image generation over the `generateContent` REST endpoint.
//!
//! Sends the prompt as a single text part and returns the first inline
//! image part of the first candidate. Text parts in the reply are only
//! logged.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::DynamicImage;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::ImageGenerator;
use crate::error::{Result, StudioError};

/// Default model for image generation.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Key value shipped in example `.env` files; treated as unset.
const PLACEHOLDER_KEY: &str = "your_api_key_here";

/// Aspect ratios the image models accept.
const SUPPORTED_RATIOS: [(u32, u32); 10] = [
    (1, 1),
    (2, 3),
    (3, 2),
    (3, 4),
    (4, 3),
    (4, 5),
    (5, 4),
    (9, 16),
    (16, 9),
    (21, 9),
];

/// Configuration for the Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as `x-goog-api-key`.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API root, overridable for tests.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Config for `model` with the given key and default endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a usable key is configured.
    pub fn has_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != PLACEHOLDER_KEY
    }
}

/// Closest supported aspect ratio to `width:height`, formatted `"W:H"`.
pub fn nearest_aspect_ratio(width: u32, height: u32) -> String {
    let target = f64::from(width.max(1)) / f64::from(height.max(1));
    let (w, h) = SUPPORTED_RATIOS
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (f64::from(a.0) / f64::from(a.1) - target).abs();
            let db = (f64::from(b.0) / f64::from(b.1) - target).abs();
            da.total_cmp(&db)
        })
        .unwrap_or((1, 1));
    format!("{w}:{h}")
}

/// Build the JSON request body.
pub fn build_request(prompt: &str, width: u32, height: u32) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "imageConfig": { "aspectRatio": nearest_aspect_ratio(width, height) }
        }
    })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

/// Pull the first inline image out of a `generateContent` reply.
pub fn extract_image(body: &[u8]) -> Result<DynamicImage> {
    let response: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| StudioError::Generator(format!("malformed response: {e}")))?;

    let parts = response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts);

    for part in parts {
        if let Some(text) = part.text {
            debug!("response text: {text}");
            continue;
        }
        if let Some(inline) = part.inline_data {
            let bytes = BASE64
                .decode(inline.data.as_bytes())
                .map_err(|e| StudioError::Generator(format!("bad image encoding: {e}")))?;
            let image = image::load_from_memory(&bytes).map_err(|e| {
                StudioError::Generator(format!("cannot decode {} image: {e}", inline.mime_type))
            })?;
            info!(
                "image generated successfully: {}x{}",
                image.width(),
                image.height()
            );
            return Ok(image);
        }
    }

    Err(StudioError::Generator(
        "No image data found in API response".to_owned(),
    ))
}

/// Gemini-backed [`ImageGenerator`].
pub struct GeminiGenerator {
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// Create a client from `config`.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StudioError::Generator(format!("cannot build HTTP client: {e}")))?;
        info!("initialized Gemini client with model: {}", config.model);
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn has_credentials(&self) -> bool {
        self.config.has_key()
    }

    async fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<DynamicImage> {
        if prompt.trim().is_empty() {
            return Err(StudioError::Validation("Prompt cannot be empty".to_owned()));
        }
        if !self.config.has_key() {
            return Err(StudioError::Validation(
                "GEMINI_API_KEY not configured".to_owned(),
            ));
        }

        info!("generating image with prompt: {prompt}");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_request(prompt, width, height))
            .send()
            .await
            .map_err(|e| StudioError::Generator(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| StudioError::Generator(format!("cannot read Gemini response: {e}")))?;
        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(StudioError::Generator(format!(
                "Gemini returned {status}: {}",
                text.trim()
            )));
        }

        extract_image(&body)
    }
}
