//! Generation task state and orchestration.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{CanvasSettings, Orchestrator, OrchestratorDeps, RunHandle, RunKind};
pub use state::{Phase, StatePatch, TaskState, TaskStateStore};
