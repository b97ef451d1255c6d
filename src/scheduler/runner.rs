//! Daily trigger loop.
//!
//! Spawns a tokio task that sleeps until the next configured time of day,
//! invokes the fire callback once, and re-arms for the following day.
//! The callback only *requests* work; it must return quickly.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::schedule::{ScheduleConfig, next_fire_after};

/// Callback invoked when the daily trigger fires.
pub type FireCallback = Arc<dyn Fn() + Send + Sync>;

/// Lifecycle of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// `configure` has not been called.
    Unconfigured,
    /// Configured with the trigger disabled.
    Disabled,
    /// Enabled but the timer is not running.
    Idle,
    /// Timer running; the callback will fire at the next time of day.
    Triggered,
}

/// Read-only scheduler status, shaped for the web UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Whether automatic generation is enabled.
    pub enabled: bool,
    /// Configured time of day, `HH:MM`.
    pub schedule_time: String,
    /// Next firing instant (RFC 3339, configured zone) while running.
    pub next_run: Option<String>,
    /// IANA zone name.
    pub timezone: String,
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Inner {
    config: Option<ScheduleConfig>,
    on_fire: Option<FireCallback>,
    running: Option<Running>,
}

/// Recurring daily trigger.
#[derive(Default)]
pub struct DailyScheduler {
    inner: Mutex<Inner>,
    next_fire: Arc<Mutex<Option<DateTime<Tz>>>>,
}

impl DailyScheduler {
    /// Create an unconfigured scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register the trigger. A running timer is stopped and, if the new
    /// config is enabled, restarted with it.
    pub fn configure(&self, config: ScheduleConfig, on_fire: FireCallback) {
        let was_running = self.stop_running();
        {
            let mut inner = self.lock();
            inner.config = Some(config);
            inner.on_fire = Some(on_fire);
        }
        if config.enabled {
            info!("scheduled daily generation {config}");
        } else {
            info!("automatic generation disabled");
        }
        if was_running && config.enabled {
            self.start();
        }
    }

    /// Start the timer. Returns `false` when unconfigured or disabled.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut inner = self.lock();
        let (Some(config), Some(on_fire)) = (inner.config, inner.on_fire.clone()) else {
            warn!("scheduler start requested before configure");
            return false;
        };
        if !config.enabled {
            debug!("scheduler disabled, not starting");
            return false;
        }
        if inner.running.is_some() {
            return true;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            config,
            on_fire,
            token.clone(),
            Arc::clone(&self.next_fire),
        ));
        inner.running = Some(Running { token, handle });
        info!("scheduler started");
        true
    }

    fn stop_running(&self) -> bool {
        let running = self.lock().running.take();
        *self.next_fire.lock().unwrap_or_else(|e| e.into_inner()) = None;
        match running {
            Some(Running { token, handle }) => {
                token.cancel();
                drop(handle);
                true
            }
            None => false,
        }
    }

    /// Stop future firings. Idempotent.
    pub fn shutdown(&self) {
        if self.stop_running() {
            info!("scheduler shutdown");
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SchedulerPhase {
        let inner = self.lock();
        match (inner.config, inner.running.is_some()) {
            (None, _) => SchedulerPhase::Unconfigured,
            (Some(c), _) if !c.enabled => SchedulerPhase::Disabled,
            (Some(_), false) => SchedulerPhase::Idle,
            (Some(_), true) => SchedulerPhase::Triggered,
        }
    }

    /// Configuration and next firing time.
    pub fn status(&self) -> SchedulerStatus {
        let config = self.lock().config;
        let next_run = self
            .next_fire
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .map(|t| t.to_rfc3339());
        match config {
            Some(c) => SchedulerStatus {
                enabled: c.enabled,
                schedule_time: c.time_of_day.to_string(),
                next_run,
                timezone: c.timezone.name().to_owned(),
            },
            None => SchedulerStatus {
                enabled: false,
                schedule_time: String::new(),
                next_run: None,
                timezone: String::new(),
            },
        }
    }
}

impl Drop for DailyScheduler {
    fn drop(&mut self) {
        if let Some(running) = self.lock().running.take() {
            running.token.cancel();
        }
    }
}

async fn run_loop(
    config: ScheduleConfig,
    on_fire: FireCallback,
    token: CancellationToken,
    next_fire: Arc<Mutex<Option<DateTime<Tz>>>>,
) {
    let mut after = Utc::now();
    loop {
        let Some(fire_at) = next_fire_after(after, config.time_of_day, config.timezone) else {
            warn!("no upcoming fire time for {config}, scheduler stopping");
            return;
        };
        *next_fire.lock().unwrap_or_else(|e| e.into_inner()) = Some(fire_at);
        debug!("next scheduled generation at {fire_at}");

        let wait = (fire_at.with_timezone(&Utc) - Utc::now())
            .to_std()
            .unwrap_or_default();
        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep(wait) => {}
        }

        info!("starting scheduled image generation");
        on_fire();
        after = fire_at.with_timezone(&Utc);
    }
}
