//! End-to-end runs through the orchestrator with fake collaborators.

use crate::helpers::{DeviceFaults, FakeGenerator, Fixture, wait_until_settled};
use epd_studio::storage::prompt::DEFAULT_PROMPT;
use epd_studio::task::orchestrator::{DISPLAYED_MESSAGE, GENERATED_MESSAGE};
use epd_studio::{Phase, RunKind, StudioError, StudioEvent};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Notify;

#[tokio::test]
async fn generate_run_saves_adapts_and_displays() {
    let fx = Fixture::ok();
    let orchestrator = fx.studio.orchestrator();
    let (_id, mut rx) = orchestrator.events().subscribe();

    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.message, GENERATED_MESSAGE);
    assert!(state.error_detail.is_none());
    let saved = state.result_path.expect("result path");
    assert!(saved.is_absolute());
    assert!(saved.starts_with(fx.image_dir()));
    let original = image::open(&saved).unwrap();
    assert_eq!((original.width(), original.height()), (160, 60));

    let log = fx.device.lock().unwrap();
    assert_eq!((log.init, log.write, log.sleep), (1, 1, 1));
    assert_eq!(log.last_frame, Some((80, 48)));
    drop(log);

    assert_eq!(
        fx.generator.prompts.lock().unwrap().as_slice(),
        [DEFAULT_PROMPT.to_owned()]
    );
    let history = std::fs::read_to_string(fx.history_file()).unwrap();
    assert!(history.contains("spring landscape"));

    let mut phases = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let StudioEvent::StatusUpdate(state) = event {
            phases.push((state.phase, state.message));
        }
    }
    assert_eq!(
        phases.first(),
        Some(&(Phase::Running, "Starting...".to_owned()))
    );
    assert_eq!(
        phases.last(),
        Some(&(Phase::Complete, GENERATED_MESSAGE.to_owned()))
    );
    assert!(
        phases
            .iter()
            .any(|(_, m)| m.starts_with("Displaying image on e-paper"))
    );
}

#[tokio::test]
async fn second_request_while_running_is_rejected() {
    let gate = Arc::new(Notify::new());
    let fx = Fixture::new(
        FakeGenerator::returning(160, 60).gated(Arc::clone(&gate)),
        DeviceFaults::default(),
    );
    let orchestrator = fx.studio.orchestrator();

    let handle = orchestrator.request_run(RunKind::Generate).unwrap();
    let second = orchestrator.request_run(RunKind::Generate);
    assert!(matches!(second, Err(StudioError::Conflict(_))));
    assert_eq!(orchestrator.state().snapshot().phase, Phase::Running);

    gate.notify_one();
    handle.wait().await;
    assert_eq!(orchestrator.state().snapshot().phase, Phase::Complete);
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persistence_failure_ends_in_error_without_touching_the_panel() {
    let fx = Fixture::ok();
    fx.break_image_dir();

    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert!(state.message.starts_with("Failed: "));
    assert!(state.error_detail.unwrap().contains("storage error"));
    assert!(state.result_path.is_none());

    let log = fx.device.lock().unwrap();
    assert_eq!((log.init, log.write, log.sleep), (0, 0, 0));
}

#[tokio::test]
async fn write_failure_still_puts_panel_to_sleep_once() {
    let fx = Fixture::new(
        FakeGenerator::returning(160, 60),
        DeviceFaults {
            write: true,
            ..DeviceFaults::default()
        },
    );
    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert!(state.error_detail.unwrap().contains("busy pin timeout"));

    let log = fx.device.lock().unwrap();
    assert_eq!((log.init, log.write, log.sleep), (1, 1, 1));
}

#[tokio::test]
async fn sleep_failure_after_successful_write_keeps_the_run_complete() {
    let fx = Fixture::new(
        FakeGenerator::returning(160, 60),
        DeviceFaults {
            sleep: true,
            ..DeviceFaults::default()
        },
    );
    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.message, GENERATED_MESSAGE);
    assert!(state.error_detail.is_none());
    assert!(state.result_path.is_some());

    let log = fx.device.lock().unwrap();
    assert_eq!((log.init, log.write, log.sleep), (1, 1, 1));
}

#[tokio::test]
async fn sleep_failure_after_failed_write_keeps_the_write_error() {
    let fx = Fixture::new(
        FakeGenerator::returning(160, 60),
        DeviceFaults {
            write: true,
            sleep: true,
            ..DeviceFaults::default()
        },
    );
    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    let detail = state.error_detail.unwrap();
    assert!(detail.contains("busy pin timeout"), "{detail}");
    assert!(!detail.contains("stuck in busy state"), "{detail}");
    assert!(state.result_path.is_none());

    let log = fx.device.lock().unwrap();
    assert_eq!((log.init, log.write, log.sleep), (1, 1, 1));
}

#[tokio::test]
async fn driver_panic_is_reported_as_display_error() {
    let fx = Fixture::new(
        FakeGenerator::returning(160, 60),
        DeviceFaults {
            panic_on_write: true,
            ..DeviceFaults::default()
        },
    );
    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    let detail = state.error_detail.unwrap();
    assert!(detail.starts_with("display error"), "{detail}");

    let log = fx.device.lock().unwrap();
    assert_eq!((log.write, log.sleep), (1, 1));
}

#[tokio::test]
async fn init_failure_is_reported_as_display_error() {
    let fx = Fixture::new(
        FakeGenerator::returning(160, 60),
        DeviceFaults {
            init: true,
            ..DeviceFaults::default()
        },
    );
    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert!(state.error_detail.unwrap().contains("initialization failed"));
    assert_eq!(fx.device.lock().unwrap().write, 0);
}

#[tokio::test]
async fn generator_failure_leaves_no_image_behind() {
    let fx = Fixture::new(FakeGenerator::failing("quota exceeded"), DeviceFaults::default());
    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.message, "Failed: generator error: quota exceeded");
    assert_eq!(std::fs::read_dir(fx.image_dir()).unwrap().count(), 0);
    assert_eq!(fx.device.lock().unwrap().init, 0);
}

#[tokio::test]
async fn empty_prompt_is_rejected_before_generation() {
    let fx = Fixture::ok();
    std::fs::write(fx.dir.path().join("prompt.md"), "   \n").unwrap();

    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert!(state.error_detail.unwrap().contains("Prompt cannot be empty"));
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn display_existing_skips_generation_and_history() {
    let fx = Fixture::ok();
    let path = fx.seed_image("landscape_20250101_190000.png", 40, 100);

    let orchestrator = fx.studio.orchestrator();
    orchestrator
        .request_run(RunKind::DisplayExisting(path.clone()))
        .unwrap()
        .wait()
        .await;

    let state = orchestrator.state().snapshot();
    assert_eq!(state.phase, Phase::Complete);
    assert_eq!(state.message, DISPLAYED_MESSAGE);
    assert_eq!(state.result_path, Some(path));
    assert_eq!(fx.generator.calls.load(Ordering::SeqCst), 0);
    assert!(!fx.history_file().exists());
    assert_eq!(fx.device.lock().unwrap().last_frame, Some((80, 48)));
}

#[tokio::test]
async fn failed_run_frees_the_slot() {
    let fx = Fixture::ok();
    fx.break_image_dir();
    let orchestrator = fx.studio.orchestrator();
    orchestrator.request_run(RunKind::Generate).unwrap();
    assert_eq!(wait_until_settled(&fx.studio).await.phase, Phase::Error);

    std::fs::remove_file(fx.image_dir()).unwrap();
    orchestrator
        .request_run(RunKind::Generate)
        .unwrap()
        .wait()
        .await;
    assert_eq!(orchestrator.state().snapshot().phase, Phase::Complete);
}
