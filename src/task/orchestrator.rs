//! Single-flight generate → save → adapt → display runs.
//!
//! [`Orchestrator::request_run`] claims the run slot in the
//! [`TaskStateStore`], spawns one worker task, and returns immediately.
//! The worker reports every phase through the store and the
//! [`BroadcastChannel`]; its errors never reach the caller and instead end
//! the run in [`Phase::Error`](super::state::Phase::Error).

use futures_util::FutureExt;
use image::{DynamicImage, Rgb};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::state::{TaskState, TaskStateStore};
use crate::adapt::adapt;
use crate::broadcast::{BroadcastChannel, StudioEvent};
use crate::display::{DisplayFactory, EpaperDisplay, PanelBuffer, to_panel_buffer};
use crate::error::{Result, StudioError};
use crate::generator::ImageGenerator;
use crate::storage::{ImageStore, PromptFile, PromptHistory};

/// Message recorded on a successful generate run.
pub const GENERATED_MESSAGE: &str = "Image generated and displayed successfully!";

/// Message recorded on a successful display-existing run.
pub const DISPLAYED_MESSAGE: &str = "Image displayed successfully!";

/// What a run should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunKind {
    /// Generate a new image from the current prompt.
    Generate,
    /// Show an already stored image.
    DisplayExisting(PathBuf),
}

/// Panel geometry used for every run.
#[derive(Debug, Clone, Copy)]
pub struct CanvasSettings {
    /// Panel width in pixels.
    pub width: u32,
    /// Panel height in pixels.
    pub height: u32,
    /// Colour for rows not covered by the image.
    pub fill: Rgb<u8>,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            width: 800,
            height: 480,
            fill: Rgb([255, 255, 255]),
        }
    }
}

/// Collaborators the worker drives.
#[derive(Clone)]
pub struct OrchestratorDeps {
    /// Shared task record.
    pub state: Arc<TaskStateStore>,
    /// Observer fan-out.
    pub events: Arc<BroadcastChannel>,
    /// Remote image generator.
    pub generator: Arc<dyn ImageGenerator>,
    /// Stored images.
    pub images: ImageStore,
    /// Current prompt.
    pub prompt: PromptFile,
    /// Prompt log.
    pub history: Arc<PromptHistory>,
    /// Panel device source.
    pub display: DisplayFactory,
}

/// Applies store transitions and publishes the resulting snapshot as one
/// step, so observers receive snapshots in the order the store changed.
struct Reporter {
    state: Arc<TaskStateStore>,
    events: Arc<BroadcastChannel>,
    order: Mutex<()>,
}

impl Reporter {
    fn new(state: Arc<TaskStateStore>, events: Arc<BroadcastChannel>) -> Self {
        Self {
            state,
            events,
            order: Mutex::new(()),
        }
    }

    /// Run `transition`; publish a snapshot only if it reports a change.
    fn apply(&self, transition: impl FnOnce(&TaskStateStore) -> bool) -> bool {
        let _order = self.order.lock().unwrap_or_else(|e| e.into_inner());
        let changed = transition(&self.state);
        if changed {
            let snapshot: TaskState = self.state.snapshot();
            self.events.publish(&StudioEvent::StatusUpdate(snapshot));
        }
        changed
    }
}

struct Inner {
    deps: OrchestratorDeps,
    canvas: CanvasSettings,
    reporter: Reporter,
}

impl Inner {
    fn progress(&self, message: &str) {
        info!("{message}");
        self.reporter.apply(|state| {
            state.progress(message);
            true
        });
    }
}

/// Handle to a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    join: JoinHandle<()>,
}

impl RunHandle {
    /// Wait until the run reaches a terminal phase.
    pub async fn wait(self) {
        if let Err(e) = self.join.await {
            error!("run worker did not finish cleanly: {e}");
        }
    }
}

/// Admission gate and worker launcher.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create an orchestrator over `deps` for a panel described by `canvas`.
    pub fn new(deps: OrchestratorDeps, canvas: CanvasSettings) -> Self {
        let reporter = Reporter::new(Arc::clone(&deps.state), Arc::clone(&deps.events));
        Self {
            inner: Arc::new(Inner {
                deps,
                canvas,
                reporter,
            }),
        }
    }

    /// Shared task record.
    pub fn state(&self) -> &Arc<TaskStateStore> {
        &self.inner.deps.state
    }

    /// Observer fan-out.
    pub fn events(&self) -> &Arc<BroadcastChannel> {
        &self.inner.deps.events
    }

    /// Start a run unless one is already active.
    ///
    /// Returns [`StudioError::Conflict`] without side effects when the slot
    /// is taken. Must be called from within a tokio runtime.
    pub fn request_run(&self, kind: RunKind) -> Result<RunHandle> {
        if !self.inner.reporter.apply(TaskStateStore::begin_run) {
            return Err(StudioError::Conflict(
                "Generation already in progress".to_owned(),
            ));
        }

        let inner = Arc::clone(&self.inner);
        let join = tokio::spawn(async move {
            let outcome = AssertUnwindSafe(execute(&inner, kind))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(StudioError::Storage("run worker panicked".to_owned())));

            match outcome {
                Ok(done) => {
                    info!("{}", done.message);
                    inner.reporter.apply(|state| {
                        state.complete(done.message, done.path);
                        true
                    });
                }
                Err(e) => {
                    error!("run failed: {e}");
                    inner.reporter.apply(|state| {
                        state.fail(format!("Failed: {e}"), e.to_string());
                        true
                    });
                }
            }
        });

        Ok(RunHandle { join })
    }
}

struct Done {
    message: &'static str,
    path: PathBuf,
}

async fn execute(inner: &Arc<Inner>, kind: RunKind) -> Result<Done> {
    match kind {
        RunKind::Generate => generate(inner).await,
        RunKind::DisplayExisting(path) => display_existing(inner, path).await,
    }
}

async fn generate(inner: &Arc<Inner>) -> Result<Done> {
    let deps = &inner.deps;
    let CanvasSettings { width, height, .. } = inner.canvas;

    let prompt = deps.prompt.read()?;
    if prompt.trim().is_empty() {
        return Err(StudioError::Validation("Prompt cannot be empty".to_owned()));
    }
    if !deps.generator.has_credentials() {
        return Err(StudioError::Validation(format!(
            "{} credentials are not configured",
            deps.generator.name()
        )));
    }

    inner.progress("Generating image (this may take 5-15 seconds)...");
    let raw = deps.generator.generate(&prompt, width, height).await?;

    inner.progress("Saving original image...");
    let images = deps.images.clone();
    let (raw, saved) = blocking(StudioError::Storage, move || {
        let path = images.save(&raw)?;
        Ok((raw, path))
    })
    .await?;
    if let Err(e) = deps.history.append(&prompt) {
        warn!("prompt history not updated: {e}");
    }

    inner.progress("Preparing image for display...");
    let adapted = adapt_blocking(inner, raw).await?;
    show(inner, adapted).await?;

    Ok(Done {
        message: GENERATED_MESSAGE,
        path: saved,
    })
}

async fn display_existing(inner: &Arc<Inner>, path: PathBuf) -> Result<Done> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    inner.progress(&format!("Loading {name}..."));
    let images = inner.deps.images.clone();
    let load_path = path.clone();
    let image = blocking(StudioError::Storage, move || images.load(&load_path)).await?;

    inner.progress("Preparing image for display...");
    let adapted = adapt_blocking(inner, image).await?;
    show(inner, adapted).await?;

    Ok(Done {
        message: DISPLAYED_MESSAGE,
        path,
    })
}

async fn adapt_blocking(inner: &Arc<Inner>, image: DynamicImage) -> Result<DynamicImage> {
    let CanvasSettings {
        width,
        height,
        fill,
    } = inner.canvas;
    blocking(StudioError::Adapt, move || adapt(image, width, height, fill)).await
}

async fn show(inner: &Arc<Inner>, image: DynamicImage) -> Result<()> {
    inner.progress("Converting image to panel buffer...");
    let CanvasSettings { width, height, .. } = inner.canvas;
    let frame = blocking(StudioError::Display, move || {
        to_panel_buffer(&image, width, height)
    })
    .await?;

    let inner = Arc::clone(inner);
    blocking(StudioError::Display, move || {
        inner.progress("Initializing e-paper display...");
        let mut panel = AwakePanel::acquire((inner.deps.display)())?;

        inner.progress("Displaying image on e-paper (this may take 15-30 seconds)...");
        panel.write(&frame)?;

        inner.progress("Putting display to sleep...");
        panel.sleep();
        Ok(())
    })
    .await
}

/// Run `f` on the blocking pool. A panic or abort is reported through
/// `on_abort`, the error variant of the step being run.
async fn blocking<T, F>(on_abort: fn(String) -> StudioError, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| on_abort(format!("blocking step aborted: {e}")))?
}

/// An initialised panel that is put to sleep on every exit path.
struct AwakePanel {
    device: Box<dyn EpaperDisplay>,
    asleep: bool,
}

impl AwakePanel {
    fn acquire(mut device: Box<dyn EpaperDisplay>) -> Result<Self> {
        device
            .init()
            .map_err(|e| StudioError::Display(format!("initialization failed: {e}")))?;
        Ok(Self {
            device,
            asleep: false,
        })
    }

    fn write(&mut self, frame: &PanelBuffer) -> Result<()> {
        self.device.write(frame)
    }

    fn sleep(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.asleep {
            return;
        }
        self.asleep = true;
        if let Err(e) = self.device.sleep() {
            error!("display cleanup failed: {e}");
        }
    }
}

impl Drop for AwakePanel {
    fn drop(&mut self) {
        self.release();
    }
}
