//! Persistence for generated images, the current prompt, and prompt history.

pub mod history;
pub mod images;
pub mod prompt;

pub use history::{HistoryEntry, PromptHistory};
pub use images::{ImageInfo, ImageStore};
pub use prompt::{PromptFile, normalize_prompt};
