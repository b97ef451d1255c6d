//! E-paper display devices.
//!
//! The orchestrator only talks to the [`EpaperDisplay`] trait: `init`,
//! `write`, then `sleep`. Panel drivers plug in behind it; this crate ships
//! a PNG-writing [`PreviewDisplay`] that simulates the panel and a
//! [`NullDisplay`] for headless setups.

pub mod palette;
pub mod preview;

pub use palette::{PALETTE, PanelBuffer, to_panel_buffer};
pub use preview::PreviewDisplay;

use std::sync::Arc;

use crate::error::Result;

/// Capabilities of a colour e-paper panel.
pub trait EpaperDisplay: Send {
    /// Power up and reset the panel.
    fn init(&mut self) -> Result<()>;

    /// Push a full frame and refresh.
    fn write(&mut self, frame: &PanelBuffer) -> Result<()>;

    /// Put the panel into deep sleep. Safe to call after a failed write.
    fn sleep(&mut self) -> Result<()>;
}

/// Creates a fresh device handle for each run.
pub type DisplayFactory = Arc<dyn Fn() -> Box<dyn EpaperDisplay> + Send + Sync>;

/// Device that accepts every frame and discards it.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl EpaperDisplay for NullDisplay {
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, frame: &PanelBuffer) -> Result<()> {
        tracing::debug!(
            "discarding {}x{} frame ({} bytes)",
            frame.width(),
            frame.height(),
            frame.as_bytes().len()
        );
        Ok(())
    }

    fn sleep(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory producing [`NullDisplay`] devices.
pub fn null_factory() -> DisplayFactory {
    Arc::new(|| Box::new(NullDisplay) as Box<dyn EpaperDisplay>)
}
