//! Memoised engine instance shared by every conversion job.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tracing::{error, info, warn};

use super::error::EngineError;
use super::traits::Engine;
use super::types::LoadProgress;
use crate::metrics::ENGINE_LOADS;

/// The one engine instance of the application.
///
/// Loading is memoised: the first successful [`ensure_loaded`] wins, callers
/// arriving while a load is in flight wait for it instead of starting
/// another, and a failed load leaves the instance unloaded so a later call
/// can retry.
///
/// [`ensure_loaded`]: SharedEngine::ensure_loaded
#[derive(Clone)]
pub struct SharedEngine {
    inner: Arc<Inner>,
}

struct Inner {
    engine: Arc<dyn Engine>,
    loaded: OnceCell<()>,
    load_attempts: AtomicU64,
}

impl SharedEngine {
    /// Wraps an engine. Nothing is loaded until the first job needs it.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                loaded: OnceCell::new(),
                load_attempts: AtomicU64::new(0),
            }),
        }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &dyn Engine {
        self.inner.engine.as_ref()
    }

    /// Whether a load has completed successfully.
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.initialized()
    }

    /// Number of times `Engine::load` has actually been invoked.
    pub fn load_count(&self) -> u64 {
        self.inner.load_attempts.load(Ordering::SeqCst)
    }

    /// Loads the engine if needed.
    pub async fn ensure_loaded(
        &self,
        progress_tx: mpsc::Sender<LoadProgress>,
    ) -> Result<(), EngineError> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .loaded
            .get_or_try_init(|| async move {
                inner.load_attempts.fetch_add(1, Ordering::SeqCst);
                info!(engine = inner.engine.name(), "Loading engine");

                match inner.engine.load(progress_tx).await {
                    Ok(()) => {
                        ENGINE_LOADS.with_label_values(&["success"]).inc();
                        info!(engine = inner.engine.name(), "Engine loaded");
                        Ok(())
                    }
                    Err(e @ EngineError::Unavailable { .. }) => {
                        ENGINE_LOADS.with_label_values(&["unavailable"]).inc();
                        error!(engine = inner.engine.name(), "Engine unavailable: {}", e);
                        Err(e)
                    }
                    Err(e) => {
                        ENGINE_LOADS.with_label_values(&["failed"]).inc();
                        warn!(engine = inner.engine.name(), "Engine load failed: {}", e);
                        Err(e)
                    }
                }
            })
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("engine", &self.inner.engine.name())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
