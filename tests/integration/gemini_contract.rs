//! Gemini generator contract tests against a mock server.
//!
//! Verifies the request shape (path, key header, prompt, aspect ratio) and
//! how replies map to images or errors.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use epd_studio::StudioError;
use epd_studio::generator::{GeminiConfig, GeminiGenerator, ImageGenerator};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::json;
use std::io::Cursor;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.5-flash-image";
const ENDPOINT: &str = "/v1beta/models/gemini-2.5-flash-image:generateContent";

fn png_base64(width: u32, height: u32) -> String {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 120, 60])));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    BASE64.encode(buf.into_inner())
}

fn generator(server: &MockServer, key: &str) -> GeminiGenerator {
    let config = GeminiConfig::new(key, MODEL)
        .with_base_url(server.uri())
        .with_timeout(Duration::from_secs(5));
    GeminiGenerator::new(config).unwrap()
}

#[tokio::test]
async fn sends_prompt_key_and_aspect_ratio() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "contents": [{ "parts": [{ "text": "A lighthouse in a storm" }] }],
            "generationConfig": { "imageConfig": { "aspectRatio": "16:9" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is a lighthouse." },
                    { "inlineData": { "mimeType": "image/png", "data": png_base64(32, 18) } }
                ]}
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let image = generator(&server, "test-key")
        .generate("A lighthouse in a storm", 800, 480)
        .await
        .unwrap();
    assert_eq!((image.width(), image.height()), (32, 18));
}

#[tokio::test]
async fn reply_without_image_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that." }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = generator(&server, "test-key")
        .generate("anything", 800, 480)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Generator(_)));
    assert!(err.to_string().contains("No image data found in API response"));
}

#[tokio::test]
async fn http_error_carries_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .expect(1)
        .mount(&server)
        .await;

    let err = generator(&server, "test-key")
        .generate("anything", 800, 480)
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("429"), "{text}");
    assert!(text.contains("RESOURCE_EXHAUSTED"), "{text}");
}

#[tokio::test]
async fn missing_key_fails_without_a_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let generator = generator(&server, "your_api_key_here");
    assert!(!generator.has_credentials());
    let err = generator.generate("anything", 800, 480).await.unwrap_err();
    assert!(matches!(err, StudioError::Validation(_)));
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let config = GeminiConfig::new("test-key", MODEL)
        .with_base_url(server.uri())
        .with_timeout(Duration::from_millis(200));
    let err = GeminiGenerator::new(config)
        .unwrap()
        .generate("anything", 800, 480)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Generator(_)));
}
