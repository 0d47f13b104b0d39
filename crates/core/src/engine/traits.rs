//! Trait definitions for the engine module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::EngineError;
use super::types::{EngineEvent, LoadProgress};
use crate::asset::MediaContent;

/// An audio/video processing engine with a private scratch filesystem.
///
/// Jobs copy input bytes in with [`write_file`](Engine::write_file), run a
/// command with [`exec`](Engine::exec), copy the result out with
/// [`read_file`](Engine::read_file) and remove both with
/// [`delete_file`](Engine::delete_file).
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Initialises the engine, reporting raw load progress (0-100).
    ///
    /// Callers go through [`SharedEngine`](super::SharedEngine), which makes
    /// sure this runs at most once successfully.
    async fn load(&self, progress_tx: mpsc::Sender<LoadProgress>) -> Result<(), EngineError>;

    /// Stores bytes under `name` in the scratch filesystem.
    async fn write_file(&self, name: &str, content: MediaContent) -> Result<(), EngineError>;

    /// Reads the bytes stored under `name`.
    async fn read_file(&self, name: &str) -> Result<MediaContent, EngineError>;

    /// Removes `name` from the scratch filesystem.
    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;

    /// Runs a command. File arguments refer to scratch names.
    ///
    /// Dropping the returned future aborts the command.
    async fn exec(
        &self,
        argv: Vec<String>,
        events: mpsc::Sender<EngineEvent>,
    ) -> Result<(), EngineError>;
}
