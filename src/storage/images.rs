//! Generated image files on disk.

use chrono::{DateTime, Local};
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, StudioError};

/// Default filename prefix for saved generations.
pub const DEFAULT_PREFIX: &str = "landscape";

/// Metadata for one stored image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// File name within the image directory.
    pub filename: String,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Last modification time.
    pub created_at: DateTime<Local>,
    /// File size in bytes.
    pub size_bytes: u64,
}

/// Directory of PNG files named by generation time.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
    prefix: String,
}

impl ImageStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            prefix: DEFAULT_PREFIX.to_owned(),
        }
    }

    /// Override the filename prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Directory holding the images.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save `image` as `{prefix}_{YYYYmmdd_HHMMSS}.png` and return its
    /// absolute path.
    ///
    /// A second save within the same second gets a `_N` suffix instead of
    /// overwriting.
    pub fn save(&self, image: &DynamicImage) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StudioError::Storage(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let mut path = self.dir.join(format!("{}_{stamp}.png", self.prefix));
        let mut n = 1u32;
        while path.exists() {
            path = self.dir.join(format!("{}_{stamp}_{n}.png", self.prefix));
            n = n.saturating_add(1);
        }

        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| StudioError::Storage(format!("cannot write {}: {e}", path.display())))?;

        let abs = std::path::absolute(&path)?;
        info!("saved image to {}", abs.display());
        Ok(abs)
    }

    /// Decode a previously stored image.
    pub fn load(&self, path: &Path) -> Result<DynamicImage> {
        image::open(path)
            .map_err(|e| StudioError::Storage(format!("cannot read {}: {e}", path.display())))
    }

    /// Resolve `filename` inside the image directory.
    ///
    /// Missing files are [`StudioError::NotFound`]; paths that resolve
    /// outside the directory are [`StudioError::AccessDenied`].
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        let candidate = self.dir.join(filename);
        if filename.is_empty() || !candidate.exists() {
            return Err(StudioError::NotFound(format!("image {filename}")));
        }

        let root = self.dir.canonicalize()?;
        let resolved = candidate.canonicalize()?;
        if !resolved.starts_with(&root) || resolved == root || !resolved.is_file() {
            return Err(StudioError::AccessDenied(format!("image {filename}")));
        }
        Ok(resolved)
    }

    /// Up to `limit` PNG files, newest first.
    pub fn list(&self, limit: usize) -> Result<Vec<ImageInfo>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut images = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let is_png = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if !is_png {
                continue;
            }
            let meta = match entry.metadata() {
                Ok(meta) if meta.is_file() => meta,
                Ok(_) => continue,
                Err(e) => {
                    debug!("skipping {}: {e}", path.display());
                    continue;
                }
            };
            let modified = meta.modified()?;
            images.push(ImageInfo {
                filename: entry.file_name().to_string_lossy().into_owned(),
                path: std::path::absolute(&path)?,
                created_at: DateTime::<Local>::from(modified),
                size_bytes: meta.len(),
            });
        }

        images.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.filename.cmp(&a.filename))
        });
        images.truncate(limit);
        Ok(images)
    }
}
