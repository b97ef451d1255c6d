//! Shared fixtures: a scripted generator, a recording panel, and a studio
//! rooted in a temp directory.

use async_trait::async_trait;
use epd_studio::display::{DisplayFactory, EpaperDisplay, PanelBuffer};
use epd_studio::generator::ImageGenerator;
use epd_studio::task::CanvasSettings;
use epd_studio::{Phase, Result, Studio, StudioError, TaskState};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Small canvas so dithering stays fast in debug builds.
pub(crate) const CANVAS: CanvasSettings = CanvasSettings {
    width: 80,
    height: 48,
    fill: Rgb([255, 255, 255]),
};

/// Generator returning a solid image, optionally held until released.
pub(crate) struct FakeGenerator {
    size: (u32, u32),
    fail: Option<String>,
    gate: Option<Arc<Notify>>,
    pub(crate) calls: AtomicUsize,
    pub(crate) prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub(crate) fn returning(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            fail: None,
            gate: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            fail: Some(message.to_owned()),
            ..Self::returning(1, 1)
        }
    }

    /// Block each call until `gate` is notified.
    pub(crate) fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str, _width: u32, _height: u32) -> Result<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if let Some(message) = &self.fail {
            return Err(StudioError::Generator(message.clone()));
        }
        let (w, h) = self.size;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            w,
            h,
            Rgb([30, 90, 200]),
        )))
    }
}

/// Calls seen by [`RecordingDisplay`].
#[derive(Debug, Default)]
pub(crate) struct DeviceLog {
    pub(crate) init: u32,
    pub(crate) write: u32,
    pub(crate) sleep: u32,
    pub(crate) last_frame: Option<(u32, u32)>,
}

struct RecordingDisplay {
    log: Arc<Mutex<DeviceLog>>,
    faults: DeviceFaults,
}

impl EpaperDisplay for RecordingDisplay {
    fn init(&mut self) -> Result<()> {
        self.log.lock().unwrap().init += 1;
        if self.faults.init {
            return Err(StudioError::Display("no SPI device".to_owned()));
        }
        Ok(())
    }

    fn write(&mut self, frame: &PanelBuffer) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.write += 1;
        if self.faults.panic_on_write {
            drop(log);
            panic!("driver fault");
        }
        if self.faults.write {
            return Err(StudioError::Display("busy pin timeout".to_owned()));
        }
        log.last_frame = Some((frame.width(), frame.height()));
        Ok(())
    }

    fn sleep(&mut self) -> Result<()> {
        self.log.lock().unwrap().sleep += 1;
        if self.faults.sleep {
            return Err(StudioError::Display("stuck in busy state".to_owned()));
        }
        Ok(())
    }
}

/// How the recording panel should behave.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct DeviceFaults {
    pub(crate) init: bool,
    pub(crate) write: bool,
    pub(crate) sleep: bool,
    /// Panic inside `write`, as a misbehaving driver would.
    pub(crate) panic_on_write: bool,
}

pub(crate) fn recording_factory(faults: DeviceFaults) -> (DisplayFactory, Arc<Mutex<DeviceLog>>) {
    let log = Arc::new(Mutex::new(DeviceLog::default()));
    let shared = Arc::clone(&log);
    let factory: DisplayFactory = Arc::new(move || {
        Box::new(RecordingDisplay {
            log: Arc::clone(&shared),
            faults,
        }) as Box<dyn EpaperDisplay>
    });
    (factory, log)
}

/// A studio over temp storage with a fake generator and recording panel.
pub(crate) struct Fixture {
    pub(crate) dir: tempfile::TempDir,
    pub(crate) studio: Studio,
    pub(crate) generator: Arc<FakeGenerator>,
    pub(crate) device: Arc<Mutex<DeviceLog>>,
}

impl Fixture {
    pub(crate) fn new(generator: FakeGenerator, faults: DeviceFaults) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let generator = Arc::new(generator);
        let (display, device) = recording_factory(faults);
        let studio = Studio::with_parts(
            Arc::clone(&generator) as Arc<dyn ImageGenerator>,
            display,
            &dir.path().join("images"),
            &dir.path().join("prompt.md"),
            &dir.path().join("history.csv"),
            CANVAS,
        )
        .expect("build studio");
        Self {
            dir,
            studio,
            generator,
            device,
        }
    }

    pub(crate) fn ok() -> Self {
        Self::new(FakeGenerator::returning(160, 60), DeviceFaults::default())
    }

    pub(crate) fn image_dir(&self) -> PathBuf {
        self.dir.path().join("images")
    }

    pub(crate) fn history_file(&self) -> PathBuf {
        self.dir.path().join("history.csv")
    }

    /// Replace the image directory with a regular file so saves fail.
    pub(crate) fn break_image_dir(&self) {
        let dir = self.image_dir();
        std::fs::remove_dir_all(&dir).expect("remove image dir");
        std::fs::write(&dir, b"not a directory").expect("block image dir");
    }

    /// Save a PNG directly into the image directory.
    pub(crate) fn seed_image(&self, name: &str, width: u32, height: u32) -> PathBuf {
        let path = self.image_dir().join(name);
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save(&path)
            .expect("seed image");
        path
    }
}

/// Poll the task state until it leaves `Running`.
pub(crate) async fn wait_until_settled(studio: &Studio) -> TaskState {
    for _ in 0..500 {
        let state = studio.orchestrator().state().snapshot();
        if state.phase != Phase::Running {
            return state;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run did not settle");
}
