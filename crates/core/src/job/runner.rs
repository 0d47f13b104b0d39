//! Conversion job runner.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use super::args::build_args;
use super::error::JobError;
use super::progress::ProgressSink;
use super::types::{JobId, JobOutput, JobProgress, JobState, Operation};
use crate::asset::{mime_for_extension, MediaAsset, MediaContent};
use crate::engine::{Engine, EngineError, EngineEvent, SharedEngine};
use crate::metrics::{CONVERSIONS_TOTAL, CONVERSION_DURATION};

/// Buffer for engine events during exec.
const ENGINE_EVENT_BUFFER: usize = 64;

/// Cooperative cancellation flag shared between a job and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    fn check(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Tracks every scratch name a job may have created inside the engine.
///
/// `cleanup` deletes them all; the runner calls it on every exit path.
struct Scratch<'a> {
    engine: &'a dyn Engine,
    names: Vec<String>,
}

impl<'a> Scratch<'a> {
    fn new(engine: &'a dyn Engine) -> Self {
        Self {
            engine,
            names: Vec::new(),
        }
    }

    /// Writes `content` under `name`. The name is tracked even if the write
    /// fails part way.
    async fn write(&mut self, name: &str, content: MediaContent) -> Result<(), EngineError> {
        self.track(name);
        self.engine.write_file(name, content).await
    }

    /// Tracks a name the engine itself will create.
    fn track(&mut self, name: &str) {
        self.names.push(name.to_string());
    }

    async fn cleanup(self) {
        for name in &self.names {
            match self.engine.delete_file(name).await {
                Ok(()) => debug!(name = %name, "Scratch file deleted"),
                Err(EngineError::FileNotFound { .. }) => {
                    debug!(name = %name, "Scratch file was never created")
                }
                Err(e) => warn!(name = %name, error = %e, "Failed to delete scratch file"),
            }
        }
    }
}

/// One conversion of one input.
///
/// Holds a clone of the input bytes, never the asset itself, so the
/// controller stays free to replace or clear the asset mid-job.
#[derive(Debug)]
pub struct ConversionJob {
    id: JobId,
    operation: Operation,
    input: MediaContent,
    input_extension: Option<String>,
    output_name: String,
    output_mime: String,
    state: JobState,
    cancel: CancelHandle,
    created_at: DateTime<Utc>,
}

impl ConversionJob {
    /// Creates a pending job converting `input`.
    pub fn new(input: &MediaAsset, operation: Operation) -> Self {
        let input_extension = input.extension();
        let output_extension = operation.output_extension(input_extension.as_deref());
        Self {
            id: JobId::new(),
            output_name: input.output_name(&output_extension),
            output_mime: mime_for_extension(&output_extension).to_string(),
            operation,
            input: input.content().clone(),
            input_extension,
            state: JobState::Pending,
            cancel: CancelHandle::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Display name the output will get.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// A handle that cancels this job.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// A progress channel seeded with this job's pending state.
    pub fn progress_channel(&self) -> (watch::Sender<JobProgress>, watch::Receiver<JobProgress>) {
        watch::channel(JobProgress::pending(self.id))
    }

    /// Scratch name of the input inside the engine.
    pub fn input_scratch_name(&self) -> String {
        format!(
            "input-{}.{}",
            self.id.short(),
            self.input_extension.as_deref().unwrap_or("bin")
        )
    }

    /// Scratch name of the output inside the engine.
    pub fn output_scratch_name(&self) -> String {
        let ext = self
            .operation
            .output_extension(self.input_extension.as_deref());
        format!("output-{}.{}", self.id.short(), ext)
    }

    /// Runs the job to a terminal state.
    ///
    /// Every scratch file written is deleted before this returns, whatever
    /// the outcome.
    pub async fn run(
        &mut self,
        engine: &SharedEngine,
        progress_tx: watch::Sender<JobProgress>,
    ) -> Result<JobOutput, JobError> {
        let started = Instant::now();
        let mut sink = ProgressSink::new(self.id, progress_tx);
        let mut scratch = Scratch::new(engine.engine());

        info!(
            job_id = %self.id,
            operation = self.operation.name(),
            output = %self.output_name,
            "Conversion started"
        );

        let result = self.execute(engine, &mut scratch, &mut sink).await;
        scratch.cleanup().await;

        let (state, label) = match &result {
            Ok(_) => (JobState::Succeeded, "succeeded"),
            Err(JobError::Cancelled) => (JobState::Cancelled, "cancelled"),
            Err(_) => (JobState::Failed, "failed"),
        };
        self.state = state;
        sink.enter(state);

        let elapsed = started.elapsed().as_secs_f64();
        CONVERSIONS_TOTAL
            .with_label_values(&[self.operation.name(), label])
            .inc();
        CONVERSION_DURATION
            .with_label_values(&[self.operation.name()])
            .observe(elapsed);

        match &result {
            Ok(output) => info!(
                job_id = %self.id,
                output = %output.name,
                bytes = output.content.len(),
                elapsed_secs = elapsed,
                "Conversion succeeded"
            ),
            Err(JobError::Cancelled) => info!(job_id = %self.id, "Conversion cancelled"),
            Err(e) => warn!(job_id = %self.id, error = %e, "Conversion failed"),
        }

        result
    }

    async fn execute(
        &mut self,
        engine: &SharedEngine,
        scratch: &mut Scratch<'_>,
        sink: &mut ProgressSink,
    ) -> Result<JobOutput, JobError> {
        let cancel = self.cancel.clone();
        self.operation.validate()?;
        cancel.check()?;

        if !engine.is_loaded() {
            self.state = JobState::LoadingEngine;
            sink.enter(JobState::LoadingEngine);

            let (load_tx, mut load_rx) = mpsc::channel(16);
            let load = engine.ensure_loaded(load_tx);
            tokio::pin!(load);

            let loaded = loop {
                tokio::select! {
                    res = &mut load => break res,
                    Some(p) = load_rx.recv() => sink.load(p.percent),
                    _ = cancel.cancelled() => return Err(JobError::Cancelled),
                }
            };
            loaded.map_err(JobError::from_load)?;
            cancel.check()?;
        }

        self.state = JobState::Running;
        sink.enter(JobState::Running);

        let input_name = self.input_scratch_name();
        let output_name = self.output_scratch_name();

        scratch
            .write(&input_name, self.input.clone())
            .await
            .map_err(JobError::Engine)?;
        cancel.check()?;

        scratch.track(&output_name);
        let argv = build_args(&self.operation, &input_name, &output_name);
        debug!(job_id = %self.id, argv = ?argv, "Executing");

        let (event_tx, mut event_rx) = mpsc::channel(ENGINE_EVENT_BUFFER);
        let exec = engine.engine().exec(argv, event_tx);
        tokio::pin!(exec);

        let executed = loop {
            tokio::select! {
                res = &mut exec => break res,
                Some(event) = event_rx.recv() => match event {
                    EngineEvent::Progress { ratio, .. } => sink.run(ratio),
                    EngineEvent::Log { message } => debug!(target: "engine", job_id = %self.id, "{}", message),
                },
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
            }
        };
        executed.map_err(JobError::from_exec)?;
        while let Ok(event) = event_rx.try_recv() {
            if let EngineEvent::Progress { ratio, .. } = event {
                sink.run(ratio);
            }
        }
        cancel.check()?;

        let content = match engine.engine().read_file(&output_name).await {
            Ok(content) => content,
            Err(EngineError::FileNotFound { .. }) => {
                return Err(JobError::TranscodeFailed {
                    diagnostic: "Output file was not produced".to_string(),
                })
            }
            Err(e) => return Err(JobError::Engine(e)),
        };
        cancel.check()?;

        Ok(JobOutput {
            name: self.output_name.clone(),
            mime: self.output_mime.clone(),
            content,
        })
    }
}
