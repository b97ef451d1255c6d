//! Configuration for the e-paper studio.
//!
//! Values come from an optional TOML file, then environment overrides.
//! Every section is `#[serde(default)]`, so a partial file is fine.

use image::Rgb;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, StudioError};
use crate::generator::GeminiConfig;
use crate::generator::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::scheduler::ScheduleConfig;
use crate::task::CanvasSettings;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Image generation provider.
    pub gemini: GeminiSection,
    /// Panel geometry and preview output.
    pub display: DisplaySection,
    /// File locations.
    pub storage: StorageSection,
    /// Daily automatic generation.
    pub schedule: ScheduleSection,
    /// HTTP listener.
    pub server: ServerSection,
}

/// Gemini API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiSection {
    /// API key; empty or the `.env` placeholder means "not configured".
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// API root.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GeminiSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_owned(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            timeout_secs: 120,
        }
    }
}

/// Panel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySection {
    /// Panel width in pixels.
    pub width: u32,
    /// Panel height in pixels.
    pub height: u32,
    /// Padding colour as `#rrggbb` or a basic colour name.
    pub fill_color: String,
    /// Where the preview device writes the last frame. `None` disables
    /// the preview and discards frames.
    pub preview_path: Option<PathBuf>,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            fill_color: "white".to_owned(),
            preview_path: Some(PathBuf::from("preview/panel.png")),
        }
    }
}

/// File locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory for generated PNGs.
    pub image_dir: PathBuf,
    /// Current prompt text.
    pub prompt_file: PathBuf,
    /// CSV prompt log.
    pub prompt_history_file: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("generated_images"),
            prompt_file: PathBuf::from("prompt.md"),
            prompt_history_file: PathBuf::from("prompt_history.csv"),
        }
    }
}

/// Daily trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSection {
    /// Register the daily trigger.
    pub auto_generate: bool,
    /// Local time, `HH:MM`.
    pub schedule_time: String,
    /// IANA zone name.
    pub timezone: String,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            auto_generate: true,
            schedule_time: "19:00".to_owned(),
            timezone: "UTC".to_owned(),
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
        }
    }
}

impl StudioConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| StudioError::Config(e.to_string()))
    }

    /// Load from `path` when given (missing file is an error), apply
    /// process environment overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini.api_key = v;
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("EPD_WIDTH") {
            self.display.width = parse_env("EPD_WIDTH", &v)?;
        }
        if let Some(v) = get("EPD_HEIGHT") {
            self.display.height = parse_env("EPD_HEIGHT", &v)?;
        }
        if let Some(v) = get("IMAGE_DIR") {
            self.storage.image_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PROMPT_FILE") {
            self.storage.prompt_file = PathBuf::from(v);
        }
        if let Some(v) = get("PROMPT_HISTORY_FILE") {
            self.storage.prompt_history_file = PathBuf::from(v);
        }
        if let Some(v) = get("AUTO_GENERATE") {
            self.schedule.auto_generate = parse_bool("AUTO_GENERATE", &v)?;
        }
        if let Some(v) = get("SCHEDULE_TIME") {
            self.schedule.schedule_time = v;
        }
        if let Some(v) = get("TZ") {
            self.schedule.timezone = v;
        }
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_env("PORT", &v)?;
        }
        Ok(())
    }

    /// Reject values that would only fail later at run time.
    pub fn validate(&self) -> Result<()> {
        if self.display.width == 0 || self.display.height == 0 {
            return Err(StudioError::Config(format!(
                "display dimensions must be non-zero, got {}x{}",
                self.display.width, self.display.height
            )));
        }
        parse_color(&self.display.fill_color)?;
        self.schedule_config()?;
        if self.gemini.timeout_secs == 0 {
            return Err(StudioError::Config(
                "gemini.timeout_secs must be non-zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Canvas settings for the orchestrator.
    pub fn canvas(&self) -> Result<CanvasSettings> {
        Ok(CanvasSettings {
            width: self.display.width,
            height: self.display.height,
            fill: parse_color(&self.display.fill_color)?,
        })
    }

    /// Parsed daily schedule.
    pub fn schedule_config(&self) -> Result<ScheduleConfig> {
        ScheduleConfig::parse(
            self.schedule.auto_generate,
            &self.schedule.schedule_time,
            &self.schedule.timezone,
        )
        .map_err(|e| StudioError::Config(e.to_string()))
    }

    /// Gemini client settings.
    pub fn gemini_config(&self) -> GeminiConfig {
        GeminiConfig::new(self.gemini.api_key.clone(), self.gemini.model.clone())
            .with_base_url(self.gemini.base_url.clone())
            .with_timeout(Duration::from_secs(self.gemini.timeout_secs))
    }

    /// `host:port` listener address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| StudioError::Config(format!("{key}={value:?}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(StudioError::Config(format!(
            "{key}={value:?}: expected true or false"
        ))),
    }
}

/// Parse `#rrggbb` or one of the panel's ink names.
pub fn parse_color(value: &str) -> Result<Rgb<u8>> {
    let v = value.trim().to_ascii_lowercase();
    let named = match v.as_str() {
        "white" => Some([255, 255, 255]),
        "black" => Some([0, 0, 0]),
        "red" => Some([255, 0, 0]),
        "green" => Some([0, 255, 0]),
        "blue" => Some([0, 0, 255]),
        "yellow" => Some([255, 255, 0]),
        "orange" => Some([255, 128, 0]),
        _ => None,
    };
    if let Some(rgb) = named {
        return Ok(Rgb(rgb));
    }

    let bad = || StudioError::Config(format!("invalid colour {value:?}"));
    let hex = v.strip_prefix('#').ok_or_else(bad)?;
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(bad());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| bad());
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}
