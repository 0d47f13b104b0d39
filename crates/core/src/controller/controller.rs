//! The application controller.

use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, error, info, warn};

use super::config::ControllerConfig;
use super::error::ControllerError;
use super::types::{
    ActiveJob, ControllerEvent, ControllerSnapshot, Download, Notice, PlaybackStatus, UiPhase,
};
use crate::asset::{AssetId, AssetOrigin, AssetSummary, MediaAsset, MediaContent, MAX_FILE_SIZE_BYTES};
use crate::engine::SharedEngine;
use crate::job::{ConversionJob, JobError, JobId, JobOutput, JobProgress, JobState, Operation};
use crate::metrics::{FILES_REJECTED, FILES_SELECTED};
use crate::preview::{PreviewHandle, PreviewUrlManager};

/// Capacity of the event broadcast channel.
const EVENT_BUFFER: usize = 256;

const AVI_PLAYBACK_HINT: &str =
    "AVI format not supported by browser. Please convert to MP4 to play.";
const GENERIC_PLAYBACK_HINT: &str = "Unable to play this video format.";

/// Drives the current asset, its preview handle, and at most one
/// conversion job.
///
/// Cloning is cheap; every clone controls the same state. State lives
/// behind a mutex that is never held across engine calls, and every change
/// is published to the snapshot channel.
#[derive(Clone)]
pub struct AppController {
    inner: Arc<Inner>,
}

struct Inner {
    engine: SharedEngine,
    config: ControllerConfig,
    size_limit: u64,
    state: Mutex<State>,
    snapshot_tx: watch::Sender<ControllerSnapshot>,
    events_tx: broadcast::Sender<ControllerEvent>,
    /// Spawned job tasks that have not finished yet, including cancelled
    /// ones still cleaning up.
    in_flight: watch::Sender<usize>,
}

struct State {
    current: Option<MediaAsset>,
    previews: PreviewUrlManager,
    active_job: Option<ActiveJob>,
    phase: UiPhase,
    progress: Option<f64>,
    conversion_disabled: bool,
    playback: PlaybackStatus,
    notice: Option<Notice>,
    /// Bumped each time an error is shown; stale expiry timers compare it.
    error_epoch: u64,
}

impl State {
    fn new() -> Self {
        Self {
            current: None,
            previews: PreviewUrlManager::new(),
            active_job: None,
            phase: UiPhase::Empty,
            progress: None,
            conversion_disabled: false,
            playback: PlaybackStatus::Pending,
            notice: None,
            error_epoch: 0,
        }
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            phase: self.phase,
            asset: self.current.as_ref().map(MediaAsset::summary),
            progress: self.progress,
            active_job: self.active_job.as_ref().map(ActiveJob::info),
            conversion_disabled: self.conversion_disabled,
            playback: self.playback,
            notice: self.notice.clone(),
            preview: self.previews.stats(),
        }
    }

    /// Cancels and forgets the active job. Its task settles on its own and
    /// its result is discarded.
    fn cancel_active(&mut self) -> Option<JobId> {
        let job = self.active_job.take()?;
        job.cancel.cancel();
        self.progress = None;
        Some(job.id)
    }

    /// Makes `asset` current, swapping the preview handle.
    fn adopt(&mut self, mut asset: MediaAsset) -> AssetSummary {
        let handle = self.previews.adopt(asset.content().clone());
        asset.set_preview(Some(handle));
        self.playback = PlaybackStatus::Pending;
        let summary = asset.summary();
        self.current = Some(asset);
        summary
    }

    fn resting_phase(&self) -> UiPhase {
        if self.current.is_some() {
            UiPhase::Loaded
        } else {
            UiPhase::Empty
        }
    }
}

impl AppController {
    /// Creates a controller with the default 500 MiB file ceiling.
    pub fn new(engine: SharedEngine, config: ControllerConfig) -> Self {
        Self::with_size_limit(engine, config, MAX_FILE_SIZE_BYTES)
    }

    /// Creates a controller rejecting files larger than `size_limit` bytes.
    pub fn with_size_limit(engine: SharedEngine, config: ControllerConfig, size_limit: u64) -> Self {
        let (snapshot_tx, _) = watch::channel(ControllerSnapshot::empty());
        let (events_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (in_flight, _) = watch::channel(0usize);

        Self {
            inner: Arc::new(Inner {
                engine,
                config,
                size_limit,
                state: Mutex::new(State::new()),
                snapshot_tx,
                events_tx,
                in_flight,
            }),
        }
    }

    pub fn engine(&self) -> &SharedEngine {
        &self.inner.engine
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.inner.config
    }

    pub fn size_limit(&self) -> u64 {
        self.inner.size_limit
    }

    /// Current state.
    pub async fn snapshot(&self) -> ControllerSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Replace-latest view of the state.
    pub fn subscribe(&self) -> watch::Receiver<ControllerSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Notices and job lifecycle events.
    pub fn events(&self) -> broadcast::Receiver<ControllerEvent> {
        self.inner.events_tx.subscribe()
    }

    fn publish(&self, state: &State) {
        self.inner.snapshot_tx.send_replace(state.snapshot());
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.inner.events_tx.send(event);
    }

    fn notify(&self, state: &mut State, notice: Notice) {
        state.notice = Some(notice.clone());
        self.emit(ControllerEvent::Notice { notice });
    }

    fn set_phase(&self, state: &mut State, phase: UiPhase) {
        if state.phase != phase {
            debug!(from = ?state.phase, to = ?phase, "Phase changed");
            state.phase = phase;
            self.emit(ControllerEvent::PhaseChanged { phase });
        }
    }

    /// Makes a newly selected file current.
    ///
    /// An oversize file is rejected before anything changes. Otherwise any
    /// running conversion is cancelled and the previous preview handle is
    /// revoked.
    pub async fn select_file(
        &self,
        content: MediaContent,
        name: impl Into<String>,
        size: u64,
        mime_hint: impl Into<String>,
    ) -> Result<AssetSummary, ControllerError> {
        let name = name.into();
        let asset = match MediaAsset::from_file_with_limit(
            content,
            name.clone(),
            size,
            mime_hint,
            self.inner.size_limit,
        ) {
            Ok(asset) => asset,
            Err(e) => {
                FILES_REJECTED.with_label_values(&["size_exceeded"]).inc();
                warn!(name = %name, size, limit = self.inner.size_limit, "File rejected");
                self.emit(ControllerEvent::Notice {
                    notice: Notice::error(e.notice()),
                });
                return Err(e.into());
            }
        };

        let mut state = self.inner.state.lock().await;
        if let Some(job_id) = state.cancel_active() {
            info!(job_id = %job_id, "Cancelling conversion of replaced file");
        }

        let summary = state.adopt(asset);
        FILES_SELECTED.inc();
        info!(asset_id = %summary.id, name = %summary.name, size, "File loaded");

        self.set_phase(&mut state, UiPhase::Loaded);
        self.notify(&mut state, Notice::success("File loaded successfully!"));
        self.publish(&state);
        self.emit(ControllerEvent::AssetChanged {
            asset: Some(summary.clone()),
        });

        Ok(summary)
    }

    /// Applies decoded metadata if `asset_id` is still current.
    pub async fn attach_metadata(
        &self,
        asset_id: AssetId,
        duration_secs: f64,
        width: u32,
        height: u32,
    ) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.current.as_mut() {
            Some(asset) if asset.id() == asset_id => {
                asset.attach_metadata(duration_secs, width, height);
            }
            _ => {
                debug!(asset_id = %asset_id, "Ignoring metadata for stale asset");
                return false;
            }
        }

        state.playback = PlaybackStatus::Ready;
        self.publish(&state);
        self.emit(ControllerEvent::PlaybackChanged {
            asset_id,
            status: PlaybackStatus::Ready,
        });
        true
    }

    /// Records that the playback surface could not decode `asset_id`.
    ///
    /// Shows a format hint. Convert and download stay available.
    pub async fn report_playback_error(&self, asset_id: AssetId) -> bool {
        let mut state = self.inner.state.lock().await;
        let hint = match state.current.as_ref() {
            Some(asset) if asset.id() == asset_id => {
                if asset.extension().as_deref() == Some("avi") {
                    AVI_PLAYBACK_HINT
                } else {
                    GENERIC_PLAYBACK_HINT
                }
            }
            _ => return false,
        };

        warn!(asset_id = %asset_id, "Preview playback failed");
        state.playback = PlaybackStatus::Unsupported;
        self.notify(&mut state, Notice::error(hint));
        self.publish(&state);
        self.emit(ControllerEvent::PlaybackChanged {
            asset_id,
            status: PlaybackStatus::Unsupported,
        });
        true
    }

    /// Starts converting the current asset.
    ///
    /// Rejected while another job is active; the request is never queued.
    pub async fn request_conversion(&self, operation: Operation) -> Result<JobId, ControllerError> {
        operation.validate().map_err(|e| match e {
            JobError::InvalidOperation { reason } => ControllerError::InvalidRequest(reason),
            other => ControllerError::InvalidRequest(other.to_string()),
        })?;

        let mut state = self.inner.state.lock().await;
        let asset = state.current.as_ref().ok_or(ControllerError::NoAsset)?;
        if let Some(job) = &state.active_job {
            debug!(job_id = %job.id, "Conversion request rejected, job active");
            return Err(ControllerError::JobActive { job_id: job.id });
        }
        if state.conversion_disabled {
            return Err(ControllerError::ConversionDisabled);
        }

        let job = ConversionJob::new(asset, operation);
        let job_id = job.id();
        let operation_name = job.operation().name();
        state.active_job = Some(ActiveJob {
            id: job_id,
            operation: operation_name,
            state: JobState::Pending,
            percent: 0.0,
            cancel: job.cancel_handle(),
        });
        state.progress = Some(0.0);

        self.set_phase(&mut state, UiPhase::Converting);
        self.notify(&mut state, Notice::info("Converting..."));
        self.publish(&state);
        self.emit(ControllerEvent::JobStarted {
            job_id,
            operation: operation_name.to_string(),
        });
        self.inner.in_flight.send_modify(|n| *n += 1);
        drop(state);

        let this = self.clone();
        tokio::spawn(async move { this.drive(job).await });

        Ok(job_id)
    }

    async fn drive(self, mut job: ConversionJob) {
        let job_id = job.id();
        let engine = self.inner.engine.clone();
        let (tx, mut rx) = job.progress_channel();

        let run = job.run(&engine, tx);
        let forward = async {
            // Ends once the job drops its sender; the last value is still seen
            while rx.changed().await.is_ok() {
                let progress = *rx.borrow_and_update();
                self.apply_progress(progress).await;
            }
        };
        let (result, ()) = tokio::join!(run, forward);

        self.finish_job(job_id, result).await;
        self.inner.in_flight.send_modify(|n| *n = n.saturating_sub(1));
    }

    async fn apply_progress(&self, progress: JobProgress) {
        let mut guard = self.inner.state.lock().await;
        let state = &mut *guard;
        let Some(active) = state
            .active_job
            .as_mut()
            .filter(|job| job.id == progress.job_id)
        else {
            return;
        };

        active.state = progress.state;
        active.percent = progress.percent;
        state.progress = Some(progress.percent);
        self.publish(state);
        self.emit(ControllerEvent::JobProgress { progress });
    }

    async fn finish_job(&self, job_id: JobId, result: Result<JobOutput, JobError>) {
        let (final_state, error_text) = match &result {
            Ok(_) => (JobState::Succeeded, None),
            Err(JobError::Cancelled) => (JobState::Cancelled, None),
            Err(e) => (JobState::Failed, Some(e.to_string())),
        };
        let finished = ControllerEvent::JobFinished {
            job_id,
            state: final_state,
            error: error_text,
        };

        let mut state = self.inner.state.lock().await;
        if state.active_job.as_ref().map(|job| job.id) != Some(job_id) {
            debug!(job_id = %job_id, state = %final_state, "Discarding result of inactive job");
            self.emit(finished);
            return;
        }
        state.active_job = None;
        state.progress = None;

        match result {
            Ok(output) => {
                let size = output.content.len() as u64;
                match MediaAsset::from_file_with_limit(
                    output.content,
                    output.name,
                    size,
                    output.mime,
                    self.inner.size_limit,
                ) {
                    Ok(asset) => {
                        let summary = state.adopt(asset.with_origin(AssetOrigin::Converted { job_id }));
                        info!(job_id = %job_id, name = %summary.name, "Converted file adopted");
                        self.set_phase(&mut state, UiPhase::Loaded);
                        self.notify(&mut state, Notice::success("Conversion completed!"));
                        self.emit(ControllerEvent::AssetChanged {
                            asset: Some(summary),
                        });
                    }
                    Err(e) => {
                        warn!(job_id = %job_id, error = %e, "Converted file rejected");
                        self.show_error(&mut state, e.notice());
                    }
                }
            }
            Err(JobError::Cancelled) => {
                let phase = state.resting_phase();
                self.set_phase(&mut state, phase);
            }
            Err(e) => {
                if e.is_fatal() {
                    error!(job_id = %job_id, error = %e, "Engine unavailable, disabling conversion");
                    state.conversion_disabled = true;
                }
                self.show_error(&mut state, e.notice());
            }
        }

        self.publish(&state);
        self.emit(finished);
    }

    /// Shows `message` as an error and schedules its expiry. With
    /// `error_notice_ms = 0` the error stays until dismissed.
    fn show_error(&self, state: &mut State, message: String) {
        state.error_epoch += 1;
        let epoch = state.error_epoch;
        self.set_phase(state, UiPhase::ErrorShown);
        self.notify(state, Notice::error(message));

        if self.inner.config.error_notice_ms == 0 {
            return;
        }
        let this = self.clone();
        let delay = self.inner.config.error_notice();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.expire_error(epoch).await;
        });
    }

    async fn expire_error(&self, epoch: u64) {
        let mut state = self.inner.state.lock().await;
        if state.phase == UiPhase::ErrorShown && state.error_epoch == epoch {
            let phase = state.resting_phase();
            self.set_phase(&mut state, phase);
            self.publish(&state);
        }
    }

    /// Leaves the error state early.
    pub async fn dismiss_error(&self) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.phase != UiPhase::ErrorShown {
            return false;
        }
        let phase = state.resting_phase();
        self.set_phase(&mut state, phase);
        self.publish(&state);
        true
    }

    /// Cancels any job, revokes the preview, and forgets the asset.
    ///
    /// Calling it with nothing loaded changes nothing.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        if state.phase == UiPhase::Empty && state.current.is_none() && state.active_job.is_none() {
            return;
        }

        if let Some(job_id) = state.cancel_active() {
            info!(job_id = %job_id, "Cancelling conversion on clear");
        }
        state.previews.release();
        state.current = None;
        state.playback = PlaybackStatus::Pending;
        state.notice = None;

        self.set_phase(&mut state, UiPhase::Empty);
        self.publish(&state);
        self.emit(ControllerEvent::AssetChanged { asset: None });
        info!("Cleared current file");
    }

    /// The current file's bytes under its display name.
    pub async fn download(&self) -> Option<Download> {
        let state = self.inner.state.lock().await;
        state.current.as_ref().map(|asset| Download {
            file_name: asset.name().to_string(),
            mime: asset.mime_hint().to_string(),
            content: asset.content().clone(),
        })
    }

    /// Bytes behind a live preview handle.
    pub async fn resolve_preview(&self, handle: &PreviewHandle) -> Option<MediaContent> {
        self.inner.state.lock().await.previews.resolve(handle)
    }

    /// Resolves once no job task is running, including cancelled jobs that
    /// are still cleaning up.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.in_flight.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Tears everything down: cancels the job, releases the preview, and
    /// waits for job cleanup.
    pub async fn shutdown(&self) {
        info!("Controller shutting down");
        self.clear().await;
        self.wait_idle().await;
        info!("Controller shut down");
    }
}

impl std::fmt::Debug for AppController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppController")
            .field("engine", &self.inner.engine)
            .field("size_limit", &self.inner.size_limit)
            .finish()
    }
}
