//! The single mutable record describing the current (or last) run.
//!
//! Every read and write goes through one mutex, so observers never see a
//! half-applied transition such as `Complete` paired with the previous
//! run's image path.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing has run since startup.
    #[default]
    Idle,
    /// A worker holds the run slot.
    Running,
    /// The last run finished successfully.
    Complete,
    /// The last run failed.
    Error,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Snapshot of the task record.
///
/// Field names on the wire match what the web UI reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// Current phase.
    #[serde(rename = "status")]
    pub phase: Phase,
    /// Human-readable progress, overwritten on every transition.
    pub message: String,
    /// Produced image, set on completion.
    #[serde(rename = "image_path")]
    pub result_path: Option<PathBuf>,
    /// Failure description, set on error.
    #[serde(rename = "error")]
    pub error_detail: Option<String>,
}

impl Default for TaskState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            message: "Ready".to_owned(),
            result_path: None,
            error_detail: None,
        }
    }
}

/// Optional fields applied together with a message in [`TaskStateStore::update`].
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    /// New phase; `None` leaves the phase unchanged.
    pub phase: Option<Phase>,
    /// New result path; `None` leaves it unchanged.
    pub result_path: Option<PathBuf>,
    /// New error detail; `None` leaves it unchanged.
    pub error_detail: Option<String>,
}

/// Mutex-guarded [`TaskState`] with atomic run admission.
#[derive(Debug, Default)]
pub struct TaskStateStore {
    inner: Mutex<TaskState>,
}

impl TaskStateStore {
    /// Create a store in the [`Phase::Idle`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut TaskState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Claim the run slot.
    ///
    /// Returns `false` without touching the record when a run is already
    /// active.
    pub fn begin_run(&self) -> bool {
        self.with_state(|state| {
            if state.phase == Phase::Running {
                return false;
            }
            *state = TaskState {
                phase: Phase::Running,
                message: "Starting...".to_owned(),
                result_path: None,
                error_detail: None,
            };
            true
        })
    }

    /// Overwrite the message and any fields present in `patch`.
    pub fn update(&self, message: impl Into<String>, patch: StatePatch) {
        let message = message.into();
        self.with_state(|state| {
            state.message = message;
            if let Some(phase) = patch.phase {
                state.phase = phase;
            }
            if let Some(path) = patch.result_path {
                state.result_path = Some(path);
            }
            if let Some(detail) = patch.error_detail {
                state.error_detail = Some(detail);
            }
        });
    }

    /// Overwrite only the progress message.
    pub fn progress(&self, message: impl Into<String>) {
        self.update(message, StatePatch::default());
    }

    /// Finish the run successfully.
    pub fn complete(&self, message: impl Into<String>, result_path: PathBuf) {
        let message = message.into();
        self.with_state(|state| {
            state.phase = Phase::Complete;
            state.message = message;
            state.result_path = Some(result_path);
            state.error_detail = None;
        });
    }

    /// Finish the run with an error.
    pub fn fail(&self, message: impl Into<String>, error_detail: impl Into<String>) {
        let message = message.into();
        let detail = error_detail.into();
        self.with_state(|state| {
            state.phase = Phase::Error;
            state.message = message;
            state.result_path = None;
            state.error_detail = Some(detail);
        });
    }

    /// Copy of the current record.
    #[must_use]
    pub fn snapshot(&self) -> TaskState {
        self.with_state(|state| state.clone())
    }

    /// Whether a run currently holds the slot.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.with_state(|state| state.phase == Phase::Running)
    }
}
