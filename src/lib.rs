//! epd-studio: prompt-driven image generation for colour e-paper panels.
//!
//! An operator sets a text prompt; on demand or once a day the studio asks
//! an image model for a picture, stores it, fits it to the panel, and
//! pushes it to the display.
//!
//! # Architecture
//!
//! - **Task state** ([`task::state`]): one shared record with an atomic
//!   admission gate, so at most one run is active.
//! - **Orchestrator** ([`task::orchestrator`]): spawns the worker that
//!   drives generate → save → adapt → display and reports every phase.
//! - **Adaptation** ([`adapt`]): resize to panel width, then centre-crop or
//!   pad to panel height.
//! - **Scheduler** ([`scheduler`]): daily trigger in a configured zone.
//! - **Broadcast** ([`broadcast`]): fan-out of state changes to observers.
//! - **Server** ([`server`]): `axum` HTTP + WebSocket surface.

pub mod adapt;
pub mod app;
pub mod broadcast;
pub mod config;
pub mod display;
pub mod error;
pub mod generator;
pub mod logging;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod task;

pub use app::Studio;
pub use broadcast::{BroadcastChannel, StudioEvent};
pub use config::StudioConfig;
pub use error::{Result, StudioError};
pub use task::{Orchestrator, Phase, RunKind, TaskState, TaskStateStore};
