//! Mock engine for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify, RwLock};

use crate::asset::MediaContent;
use crate::engine::{Engine, EngineError, EngineEvent, LoadProgress};

/// A call made against the mock, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Load,
    Write { name: String, bytes: usize },
    Read { name: String },
    Delete { name: String },
    Exec { argv: Vec<String> },
}

/// Mock implementation of the Engine trait.
///
/// Provides controllable behavior for testing:
/// - In-memory scratch storage that can be inspected after a job
/// - Injected load and exec failures
/// - Simulated load and exec durations with stepped progress
///
/// # Example
///
/// ```rust,ignore
/// use opener_core::testing::MockEngine;
///
/// let engine = MockEngine::new();
/// engine.set_exec_duration(Duration::from_millis(200)).await;
///
/// // Run a job against SharedEngine::new(Arc::new(engine.clone()))...
///
/// assert_eq!(engine.exec_count().await, 1);
/// assert_eq!(engine.file_count().await, 0);
/// ```
#[derive(Debug, Clone)]
pub struct MockEngine {
    /// Scratch files by name.
    files: Arc<RwLock<HashMap<String, MediaContent>>>,
    /// Every call, in order.
    calls: Arc<RwLock<Vec<EngineCall>>>,
    /// Whether a load has succeeded.
    loaded: Arc<RwLock<bool>>,
    /// If set, the next load fails with this error.
    next_load_error: Arc<RwLock<Option<EngineError>>>,
    /// If set, the next exec fails with this error.
    next_exec_error: Arc<RwLock<Option<EngineError>>>,
    /// Simulated load duration in milliseconds.
    load_duration_ms: Arc<RwLock<u64>>,
    /// Simulated exec duration in milliseconds.
    exec_duration_ms: Arc<RwLock<u64>>,
    /// Bytes written as exec output. Defaults to a copy of the input.
    output_bytes: Arc<RwLock<Option<Vec<u8>>>>,
    /// Whether exec skips writing its output file.
    skip_output: Arc<RwLock<bool>>,
    /// Signalled each time load starts.
    load_started: Arc<Notify>,
    /// Signalled each time exec starts.
    exec_started: Arc<Notify>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self {
            files: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            loaded: Arc::new(RwLock::new(false)),
            next_load_error: Arc::new(RwLock::new(None)),
            next_exec_error: Arc::new(RwLock::new(None)),
            load_duration_ms: Arc::new(RwLock::new(0)),
            exec_duration_ms: Arc::new(RwLock::new(0)),
            output_bytes: Arc::new(RwLock::new(None)),
            skip_output: Arc::new(RwLock::new(false)),
            load_started: Arc::new(Notify::new()),
            exec_started: Arc::new(Notify::new()),
        }
    }

    /// Get all recorded calls.
    pub async fn recorded_calls(&self) -> Vec<EngineCall> {
        self.calls.read().await.clone()
    }

    /// Argument vectors of every exec call.
    pub async fn recorded_execs(&self) -> Vec<Vec<String>> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                EngineCall::Exec { argv } => Some(argv.clone()),
                _ => None,
            })
            .collect()
    }

    /// Names passed to delete, in order.
    pub async fn recorded_deletes(&self) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                EngineCall::Delete { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of times `load` was invoked.
    pub async fn load_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Load)).await
    }

    /// Number of times `exec` was invoked.
    pub async fn exec_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Exec { .. })).await
    }

    /// Number of times `delete_file` was invoked.
    pub async fn delete_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Delete { .. })).await
    }

    async fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.read().await.iter().filter(|c| pred(c)).count()
    }

    /// Names currently held in scratch storage, sorted.
    pub async fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of files currently held in scratch storage.
    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }

    /// Configure the next load to fail with the given error.
    pub async fn set_next_load_error(&self, error: EngineError) {
        *self.next_load_error.write().await = Some(error);
    }

    /// Configure the next exec to fail with the given error.
    pub async fn set_next_exec_error(&self, error: EngineError) {
        *self.next_exec_error.write().await = Some(error);
    }

    /// Set the simulated load duration.
    pub async fn set_load_duration(&self, duration: Duration) {
        *self.load_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Set the simulated exec duration.
    pub async fn set_exec_duration(&self, duration: Duration) {
        *self.exec_duration_ms.write().await = duration.as_millis() as u64;
    }

    /// Set the bytes exec writes as its output.
    pub async fn set_output_bytes(&self, bytes: Vec<u8>) {
        *self.output_bytes.write().await = Some(bytes);
    }

    /// Make exec succeed without producing an output file.
    pub async fn set_skip_output(&self, skip: bool) {
        *self.skip_output.write().await = skip;
    }

    /// Waits until a load call has started.
    ///
    /// A start that happened before this is called is not lost.
    pub async fn wait_for_load_start(&self) {
        self.load_started.notified().await;
    }

    /// Waits until an exec call has started.
    ///
    /// A start that happened before this is called is not lost.
    pub async fn wait_for_exec_start(&self) {
        self.exec_started.notified().await;
    }

    async fn record(&self, call: EngineCall) {
        self.calls.write().await.push(call);
    }

    async fn ensure_loaded(&self) -> Result<(), EngineError> {
        if *self.loaded.read().await {
            Ok(())
        } else {
            Err(EngineError::NotLoaded)
        }
    }
}

/// Splits `duration_ms` into `steps` sleeps.
async fn step_sleep(duration_ms: u64, steps: u64) {
    if duration_ms > 0 {
        tokio::time::sleep(Duration::from_millis(duration_ms / steps)).await;
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load(&self, progress_tx: mpsc::Sender<LoadProgress>) -> Result<(), EngineError> {
        self.record(EngineCall::Load).await;
        self.load_started.notify_one();

        let duration_ms = *self.load_duration_ms.read().await;
        let steps = 4;
        for i in 0..steps {
            let percent = (i as f64 / steps as f64) * 100.0;
            let _ = progress_tx.try_send(LoadProgress { percent });
            step_sleep(duration_ms, steps).await;
        }

        if let Some(err) = self.next_load_error.write().await.take() {
            return Err(err);
        }

        *self.loaded.write().await = true;
        let _ = progress_tx.try_send(LoadProgress { percent: 100.0 });
        Ok(())
    }

    async fn write_file(&self, name: &str, content: MediaContent) -> Result<(), EngineError> {
        self.record(EngineCall::Write {
            name: name.to_string(),
            bytes: content.len(),
        })
        .await;
        self.ensure_loaded().await?;
        self.files.write().await.insert(name.to_string(), content);
        Ok(())
    }

    async fn read_file(&self, name: &str) -> Result<MediaContent, EngineError> {
        self.record(EngineCall::Read {
            name: name.to_string(),
        })
        .await;
        self.ensure_loaded().await?;
        self.files
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        self.record(EngineCall::Delete {
            name: name.to_string(),
        })
        .await;
        self.files
            .write()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn exec(
        &self,
        argv: Vec<String>,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Exec { argv: argv.clone() }).await;
        self.exec_started.notify_one();
        self.ensure_loaded().await?;

        let input_name = argv
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| argv.get(i + 1))
            .ok_or_else(|| EngineError::exec_failed(Some(1), "No input specified"))?;
        let input = self
            .files
            .read()
            .await
            .get(input_name)
            .cloned()
            .ok_or_else(|| {
                EngineError::exec_failed(
                    Some(1),
                    format!("{}: No such file or directory", input_name),
                )
            })?;

        let duration_ms = *self.exec_duration_ms.read().await;
        let steps = 5;
        for i in 0..steps {
            let ratio = i as f64 / steps as f64;
            let _ = events.try_send(EngineEvent::Progress {
                ratio,
                time_secs: Some(ratio * 10.0),
            });
            step_sleep(duration_ms, steps).await;
        }

        if let Some(err) = self.next_exec_error.write().await.take() {
            let _ = events.try_send(EngineEvent::Log {
                message: err.to_string(),
            });
            return Err(err);
        }

        let _ = events.try_send(EngineEvent::Progress {
            ratio: 1.0,
            time_secs: Some(10.0),
        });

        if !*self.skip_output.read().await {
            let output_name = argv
                .last()
                .cloned()
                .ok_or_else(|| EngineError::exec_failed(Some(1), "No output specified"))?;
            let bytes = match self.output_bytes.read().await.clone() {
                Some(bytes) => MediaContent::from(bytes),
                None => input,
            };
            self.files.write().await.insert(output_name, bytes);
        }

        Ok(())
    }
}
