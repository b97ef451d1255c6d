//! Remote image generation.
//!
//! The orchestrator depends only on [`ImageGenerator`]; the concrete
//! Gemini client lives in [`gemini`].

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiGenerator};

use async_trait::async_trait;
use image::DynamicImage;

use crate::error::Result;

/// Turns a text prompt into an image.
///
/// The returned image may have any size; callers adapt it to the panel.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Provider name for logs (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Whether credentials are configured.
    fn has_credentials(&self) -> bool {
        true
    }

    /// Generate an image for `prompt`, hinting the target canvas size.
    async fn generate(&self, prompt: &str, width: u32, height: u32) -> Result<DynamicImage>;
}
