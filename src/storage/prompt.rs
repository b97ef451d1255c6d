//! The current prompt, kept in a plain text file.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, StudioError};

/// Longest prompt accepted from the operator, in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Prompt written when no prompt file exists at startup.
pub const DEFAULT_PROMPT: &str =
    "Generate a beautiful spring landscape with blooming flowers, green meadows, and blue sky";

/// Prompt returned when the file is missing.
const FALLBACK_PROMPT: &str = "Generate a beautiful landscape";

/// Trim `raw` and check it is non-empty and within [`MAX_PROMPT_CHARS`].
pub fn normalize_prompt(raw: &str) -> Result<String> {
    let prompt = raw.trim();
    if prompt.is_empty() {
        return Err(StudioError::Validation("Prompt cannot be empty".to_owned()));
    }
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        return Err(StudioError::Validation(format!(
            "Prompt too long (max {MAX_PROMPT_CHARS} characters)"
        )));
    }
    Ok(prompt.to_owned())
}

/// File holding the operator's current prompt.
#[derive(Debug, Clone)]
pub struct PromptFile {
    path: PathBuf,
}

impl PromptFile {
    /// Prompt stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the prompt file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current prompt, trimmed. A missing file yields a generic landscape
    /// prompt.
    pub fn read(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(text.trim().to_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FALLBACK_PROMPT.to_owned()),
            Err(e) => Err(StudioError::Storage(format!(
                "cannot read {}: {e}",
                self.path.display()
            ))),
        }
    }

    /// Replace the prompt.
    pub fn write(&self, prompt: &str) -> Result<()> {
        std::fs::write(&self.path, prompt).map_err(|e| {
            StudioError::Storage(format!("cannot write {}: {e}", self.path.display()))
        })
    }

    /// Write [`DEFAULT_PROMPT`] if the file does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.write(DEFAULT_PROMPT)?;
        info!("created default prompt at {}", self.path.display());
        Ok(())
    }
}
