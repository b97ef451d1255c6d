//! Simulated panel that renders each frame to a PNG file.
//!
//! Useful on machines without the physical display attached: the preview
//! shows exactly which ink ends up on which pixel after dithering.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::{DisplayFactory, EpaperDisplay, PanelBuffer};
use crate::error::{Result, StudioError};

/// Power state of the simulated panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Power {
    Off,
    Awake,
    Asleep,
}

/// Panel simulator writing frames to `path`.
#[derive(Debug)]
pub struct PreviewDisplay {
    path: PathBuf,
    power: Power,
}

impl PreviewDisplay {
    /// Simulator rendering to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            power: Power::Off,
        }
    }

    /// Factory producing simulators that all render to `path`.
    pub fn factory(path: impl Into<PathBuf>) -> DisplayFactory {
        let path = path.into();
        Arc::new(move || Box::new(PreviewDisplay::new(path.clone())) as Box<dyn EpaperDisplay>)
    }
}

impl EpaperDisplay for PreviewDisplay {
    fn init(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StudioError::Display(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        self.power = Power::Awake;
        Ok(())
    }

    fn write(&mut self, frame: &PanelBuffer) -> Result<()> {
        if self.power != Power::Awake {
            return Err(StudioError::Display("panel is not initialised".to_owned()));
        }
        frame
            .to_image()
            .save(&self.path)
            .map_err(|e| StudioError::Display(format!("cannot render preview: {e}")))?;
        info!("panel preview written to {}", self.path.display());
        Ok(())
    }

    fn sleep(&mut self) -> Result<()> {
        self.power = Power::Asleep;
        Ok(())
    }
}
