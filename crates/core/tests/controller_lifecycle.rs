//! Controller lifecycle integration tests.
//!
//! These tests drive the controller the way a page would:
//! select -> (metadata) -> convert -> adopt output | error -> clear

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use opener_core::{
    testing::{fixtures, EngineCall, MockEngine},
    AppController, AssetOrigin, ControllerConfig, ControllerError, ControllerEvent, EngineError,
    JobState, Operation, TargetFormat, UiPhase, MAX_FILE_SIZE_BYTES,
};

/// Test helper wiring a controller to a mock engine.
struct TestHarness {
    engine: MockEngine,
    controller: AppController,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(ControllerConfig::default())
    }

    fn with_config(config: ControllerConfig) -> Self {
        let engine = MockEngine::new();
        let shared = opener_core::SharedEngine::new(Arc::new(engine.clone()));
        let controller = AppController::new(shared, config);
        Self { engine, controller }
    }

    async fn select_clip(&self) -> opener_core::AssetSummary {
        let (content, size) = fixtures::media_bytes(2 * 1024 * 1024);
        self.controller
            .select_file(content, "clip.avi", size, "video/x-msvideo")
            .await
            .expect("clip.avi should be accepted")
    }
}

#[tokio::test]
async fn test_select_clip_avi() {
    let h = TestHarness::new();
    let summary = h.select_clip().await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Loaded);
    assert_eq!(snapshot.preview.live, 1);
    assert_eq!(snapshot.preview.created, 1);
    let asset = snapshot.asset.unwrap();
    assert_eq!(asset.name, "clip.avi");
    assert_eq!(asset.size_display, "2 MB");
    assert_eq!(asset.id, summary.id);
}

#[tokio::test]
async fn test_oversize_rejected_from_empty_and_loaded() {
    let h = TestHarness::new();

    // From Empty
    let (content, _) = fixtures::media_bytes(8);
    let err = h
        .controller
        .select_file(content, "big.avi", 600 * 1024 * 1024, "video/x-msvideo")
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::Validation(_)));
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Empty);
    assert!(snapshot.asset.is_none());
    assert_eq!(snapshot.preview.created, 0);

    // From Loaded
    let loaded = h.select_clip().await;
    for size in [MAX_FILE_SIZE_BYTES + 1, 600 * 1024 * 1024, u64::MAX] {
        let (content, _) = fixtures::media_bytes(8);
        let result = h
            .controller
            .select_file(content, "big.avi", size, "video/x-msvideo")
            .await;
        assert!(matches!(result, Err(ControllerError::Validation(_))));
    }
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Loaded);
    assert_eq!(snapshot.asset.unwrap().id, loaded.id);
    assert_eq!(snapshot.preview.created, 1);
}

#[tokio::test]
async fn test_repeated_selection_keeps_one_live_handle() {
    let h = TestHarness::new();
    let mut handles = Vec::new();

    for i in 0..6 {
        let (content, size) = fixtures::media_bytes(64);
        let summary = h
            .controller
            .select_file(content, format!("clip-{}.mp4", i), size, "video/mp4")
            .await
            .unwrap();
        handles.push(summary.preview.unwrap());

        let stats = h.controller.snapshot().await.preview;
        assert_eq!(stats.live, 1);
        assert_eq!(stats.revoked, i as u64);
    }

    let (last, earlier) = handles.split_last().unwrap();
    assert!(h.controller.resolve_preview(last).await.is_some());
    for handle in earlier {
        assert!(h.controller.resolve_preview(handle).await.is_none());
    }
}

#[tokio::test]
async fn test_clear_is_idempotent() {
    let h = TestHarness::new();
    let mut rx = h.controller.subscribe();
    let before = h.controller.snapshot().await;

    h.controller.clear().await;
    h.controller.clear().await;

    assert_eq!(h.controller.snapshot().await, before);
    assert!(!rx.has_changed().unwrap());

    h.select_clip().await;
    h.controller.clear().await;
    h.controller.clear().await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Empty);
    assert_eq!(snapshot.preview.live, 0);
    assert_eq!(snapshot.preview.revoked, 1);
}

#[tokio::test]
async fn test_convert_clip_to_mp4() {
    let h = TestHarness::new();
    let original = h.select_clip().await;
    let original_handle = original.preview.clone().unwrap();

    let job_id = h
        .controller
        .request_conversion(Operation::transcode(TargetFormat::Mp4))
        .await
        .unwrap();
    assert_eq!(h.controller.snapshot().await.phase, UiPhase::Converting);

    h.controller.wait_idle().await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Loaded);
    assert!(snapshot.active_job.is_none());
    assert!(snapshot.progress.is_none());
    let asset = snapshot.asset.unwrap();
    assert_eq!(asset.name, "clip.mp4");
    assert_eq!(asset.mime_hint, "video/mp4");
    assert_eq!(asset.origin, AssetOrigin::Converted { job_id });
    assert_eq!(
        snapshot.notice.unwrap().message,
        "Conversion completed!"
    );

    // Original handle revoked exactly once, new one live
    assert_eq!(snapshot.preview.created, 2);
    assert_eq!(snapshot.preview.revoked, 1);
    assert_eq!(snapshot.preview.live, 1);
    assert!(h.controller.resolve_preview(&original_handle).await.is_none());

    let download = h.controller.download().await.unwrap();
    assert_eq!(download.file_name, "clip.mp4");

    // Scratch storage emptied
    assert_eq!(h.engine.file_count().await, 0);
}

#[tokio::test]
async fn test_request_while_converting_is_noop() {
    let h = TestHarness::new();
    h.engine.set_load_duration(Duration::from_millis(50)).await;
    h.engine.set_exec_duration(Duration::from_millis(100)).await;
    h.select_clip().await;

    let first = h
        .controller
        .request_conversion(Operation::transcode(TargetFormat::Mp4))
        .await
        .unwrap();
    let before = h.controller.snapshot().await.active_job.unwrap();

    for _ in 0..3 {
        let result = h
            .controller
            .request_conversion(Operation::ExtractAudio {
                format: TargetFormat::Mp3,
            })
            .await;
        assert!(matches!(result, Err(ControllerError::JobActive { .. })));
    }
    let after = h.controller.snapshot().await.active_job.unwrap();
    assert_eq!(after.job_id, first);
    assert_eq!(after.job_id, before.job_id);

    h.controller.wait_idle().await;
    assert_eq!(h.engine.load_count().await, 1);
    assert_eq!(h.engine.exec_count().await, 1);
}

#[tokio::test]
async fn test_progress_sequence() {
    let h = TestHarness::new();
    h.engine.set_load_duration(Duration::from_millis(40)).await;
    h.engine.set_exec_duration(Duration::from_millis(50)).await;
    h.select_clip().await;

    let mut events = h.controller.events();
    h.controller
        .request_conversion(Operation::transcode(TargetFormat::Mp4))
        .await
        .unwrap();
    h.controller.wait_idle().await;

    let mut progress = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::JobProgress { progress: p } = event {
            progress.push(p);
        }
    }

    assert!(!progress.is_empty());
    assert!(progress[0].percent <= 10.0);
    assert!(progress
        .iter()
        .filter(|p| p.state == JobState::LoadingEngine)
        .all(|p| p.percent <= 10.0));
    assert!(progress
        .windows(2)
        .all(|w| w[0].percent <= w[1].percent));
    assert!(progress.iter().all(|p| (0.0..=100.0).contains(&p.percent)));
    assert!(progress
        .iter()
        .filter(|p| p.percent == 100.0)
        .all(|p| p.state == JobState::Succeeded));
    assert_eq!(progress.last().unwrap().percent, 100.0);
}

#[tokio::test]
async fn test_fast_job_reports_completion_to_subscribers() {
    let h = TestHarness::new();
    h.select_clip().await;

    // Zero durations publish ticks faster than the forwarder applies them
    let mut events = h.controller.events();
    let mut snapshots = h.controller.subscribe();
    let job_id = assert_ok!(
        h.controller
            .request_conversion(Operation::transcode(TargetFormat::Mp4))
            .await
    );
    h.controller.wait_idle().await;

    let mut last_progress = None;
    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        match event {
            ControllerEvent::JobProgress { progress } => {
                assert_eq!(progress.job_id, job_id);
                last_progress = Some((progress.state, progress.percent));
            }
            ControllerEvent::JobFinished { state, .. } => finished = Some(state),
            _ => {}
        }
    }
    assert_eq!(last_progress, Some((JobState::Succeeded, 100.0)));
    assert_eq!(finished, Some(JobState::Succeeded));

    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.phase, UiPhase::Loaded);
    assert!(snapshot.progress.is_none());
}

#[tokio::test]
async fn test_clear_while_loading_engine_cancels_job() {
    let h = TestHarness::new();
    h.engine.set_load_duration(Duration::from_secs(30)).await;
    h.select_clip().await;

    let mut events = h.controller.events();
    let job_id = assert_ok!(
        h.controller
            .request_conversion(Operation::transcode(TargetFormat::Mp4))
            .await
    );
    h.engine.wait_for_load_start().await;
    let mut snapshots = h.controller.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| {
            s.active_job
                .as_ref()
                .is_some_and(|job| job.state == JobState::LoadingEngine)
        }),
    )
    .await
    .expect("job should report the loading state")
    .unwrap();

    h.controller.clear().await;
    tokio::time::timeout(Duration::from_secs(5), h.controller.wait_idle())
        .await
        .expect("job cancelled during load should settle promptly");

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::JobFinished { job_id: id, state, .. } = event {
            assert_eq!(id, job_id);
            finished = Some(state);
        }
    }
    assert_eq!(finished, Some(JobState::Cancelled));

    // Nothing reached the engine beyond the abandoned load
    assert_eq!(h.engine.recorded_calls().await, vec![EngineCall::Load]);
    assert!(!h.controller.engine().is_loaded());

    // The next request loads the engine again and succeeds
    h.engine.set_load_duration(Duration::ZERO).await;
    h.select_clip().await;
    assert_ok!(
        h.controller
            .request_conversion(Operation::transcode(TargetFormat::Mp4))
            .await
    );
    h.controller.wait_idle().await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Loaded);
    assert_eq!(snapshot.asset.unwrap().name, "clip.mp4");
    assert_eq!(h.engine.load_count().await, 2);
    assert!(h.controller.engine().is_loaded());
}

#[tokio::test]
async fn test_injected_filter_graph_is_rejected() {
    let h = TestHarness::new();
    h.select_clip().await;

    let operation: Operation = serde_json::from_value(serde_json::json!({
        "type": "transcode",
        "format": "mp4",
        "params": { "resolution": "640:-1[a];movie=/etc/hosts[b];[a][b]overlay" }
    }))
    .unwrap();
    let err = assert_err!(h.controller.request_conversion(operation).await);
    assert!(matches!(err, ControllerError::InvalidRequest(_)));

    assert!(h.controller.snapshot().await.active_job.is_none());
    assert_eq!(h.engine.exec_count().await, 0);
}

#[tokio::test]
async fn test_clear_while_running_cancels_job() {
    let h = TestHarness::new();
    h.engine.set_exec_duration(Duration::from_secs(30)).await;
    h.select_clip().await;

    let mut events = h.controller.events();
    let job_id = h
        .controller
        .request_conversion(Operation::transcode(TargetFormat::Mp4))
        .await
        .unwrap();
    h.engine.wait_for_exec_start().await;

    h.controller.clear().await;
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Empty);
    assert!(snapshot.asset.is_none());
    assert!(snapshot.active_job.is_none());

    tokio::time::timeout(Duration::from_secs(5), h.controller.wait_idle())
        .await
        .expect("cancelled job should settle promptly");

    // Temp storage cleanup invoked for both scratch names
    assert_eq!(h.engine.file_count().await, 0);
    assert_eq!(h.engine.delete_count().await, 2);

    let mut finished = None;
    while let Ok(event) = events.try_recv() {
        if let ControllerEvent::JobFinished { job_id: id, state, .. } = event {
            assert_eq!(id, job_id);
            finished = Some(state);
        }
    }
    assert_eq!(finished, Some(JobState::Cancelled));

    // Result discarded: still empty
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Empty);
    assert!(snapshot.asset.is_none());
}

#[tokio::test]
async fn test_load_failure_then_retry() {
    let h = TestHarness::with_config(ControllerConfig {
        error_notice_ms: 0,
        ..Default::default()
    });
    h.engine
        .set_next_load_error(EngineError::load_failed("network error"))
        .await;
    let original = h.select_clip().await;

    h.controller
        .request_conversion(Operation::transcode(TargetFormat::Mp4))
        .await
        .unwrap();
    h.controller.wait_idle().await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::ErrorShown);
    assert!(!snapshot.conversion_disabled);
    assert_eq!(snapshot.asset.unwrap().id, original.id);

    // Retry is a fresh request
    h.controller.dismiss_error().await;
    h.controller
        .request_conversion(Operation::transcode(TargetFormat::Mp4))
        .await
        .unwrap();
    h.controller.wait_idle().await;

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, UiPhase::Loaded);
    assert_eq!(snapshot.asset.unwrap().name, "clip.mp4");
    assert_eq!(h.engine.load_count().await, 2);
}

#[tokio::test]
async fn test_engine_loaded_once_across_jobs() {
    let h = TestHarness::new();
    h.select_clip().await;

    for op in [
        Operation::transcode(TargetFormat::Mp4),
        Operation::ExtractAudio {
            format: TargetFormat::Mp3,
        },
    ] {
        h.controller.request_conversion(op).await.unwrap();
        h.controller.wait_idle().await;
    }

    assert_eq!(h.engine.load_count().await, 1);
    assert_eq!(h.engine.exec_count().await, 2);
    let asset = h.controller.snapshot().await.asset.unwrap();
    assert_eq!(asset.name, "clip.mp3");
    assert_eq!(asset.mime_hint, "audio/mpeg");
}
