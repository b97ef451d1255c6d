//! Wiring of the studio's long-lived components.

use std::sync::Arc;
use tracing::{info, warn};

use crate::broadcast::BroadcastChannel;
use crate::config::StudioConfig;
use crate::display::{DisplayFactory, PreviewDisplay, null_factory};
use crate::error::{Result, StudioError};
use crate::generator::{GeminiGenerator, ImageGenerator};
use crate::scheduler::{DailyScheduler, FireCallback, ScheduleConfig};
use crate::server::AppState;
use crate::storage::{ImageStore, PromptFile, PromptHistory};
use crate::task::{CanvasSettings, Orchestrator, OrchestratorDeps, RunKind, TaskStateStore};

/// Everything a running studio owns.
pub struct Studio {
    orchestrator: Orchestrator,
    scheduler: Arc<DailyScheduler>,
    images: ImageStore,
    prompt: PromptFile,
    history: Arc<PromptHistory>,
}

impl Studio {
    /// Build from configuration: Gemini generator, preview (or null)
    /// display, file-backed storage.
    pub fn from_config(config: &StudioConfig) -> Result<Self> {
        let generator: Arc<dyn ImageGenerator> =
            Arc::new(GeminiGenerator::new(config.gemini_config())?);
        if !generator.has_credentials() {
            warn!("GEMINI_API_KEY is not set; generation runs will fail until it is configured");
        }
        let display: DisplayFactory = match &config.display.preview_path {
            Some(path) => PreviewDisplay::factory(path.clone()),
            None => null_factory(),
        };
        Self::with_parts(
            generator,
            display,
            &config.storage.image_dir,
            &config.storage.prompt_file,
            &config.storage.prompt_history_file,
            config.canvas()?,
        )
    }

    /// Build from explicit collaborators.
    pub fn with_parts(
        generator: Arc<dyn ImageGenerator>,
        display: DisplayFactory,
        image_dir: &std::path::Path,
        prompt_file: &std::path::Path,
        history_file: &std::path::Path,
        canvas: CanvasSettings,
    ) -> Result<Self> {
        std::fs::create_dir_all(image_dir).map_err(|e| {
            StudioError::Storage(format!("cannot create {}: {e}", image_dir.display()))
        })?;
        let images = ImageStore::new(image_dir);
        let prompt = PromptFile::new(prompt_file);
        prompt.ensure_exists()?;
        let history = Arc::new(PromptHistory::new(history_file));

        let deps = OrchestratorDeps {
            state: Arc::new(TaskStateStore::new()),
            events: Arc::new(BroadcastChannel::new()),
            generator,
            images: images.clone(),
            prompt: prompt.clone(),
            history: Arc::clone(&history),
            display,
        };
        Ok(Self {
            orchestrator: Orchestrator::new(deps, canvas),
            scheduler: Arc::new(DailyScheduler::new()),
            images,
            prompt,
            history,
        })
    }

    /// Run admission and worker.
    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Daily trigger.
    pub fn scheduler(&self) -> &Arc<DailyScheduler> {
        &self.scheduler
    }

    /// Register the daily trigger and start it when enabled. Returns
    /// whether the timer is running.
    pub fn arm_scheduler(&self, schedule: ScheduleConfig) -> bool {
        self.scheduler
            .configure(schedule, scheduled_run(self.orchestrator.clone()));
        self.scheduler.start()
    }

    /// Handler state for [`crate::server::router`].
    pub fn app_state(&self) -> AppState {
        AppState {
            orchestrator: self.orchestrator.clone(),
            scheduler: Arc::clone(&self.scheduler),
            images: self.images.clone(),
            prompt: self.prompt.clone(),
            history: Arc::clone(&self.history),
        }
    }
}

/// Fire callback that requests a generate run, skipping while busy.
pub fn scheduled_run(orchestrator: Orchestrator) -> FireCallback {
    Arc::new(move || match orchestrator.request_run(RunKind::Generate) {
        Ok(_) => info!("scheduled generation started"),
        Err(StudioError::Conflict(_)) => {
            warn!("scheduled generation skipped: a run is already in progress");
        }
        Err(e) => warn!("scheduled generation not started: {e}"),
    })
}
