//! Testing utilities and mock implementations.
//!
//! This module provides a mock of the external conversion engine, allowing
//! the job runner and controller to be exercised without ffmpeg installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use opener_core::testing::{fixtures, MockEngine};
//!
//! let engine = MockEngine::new();
//! let shared = SharedEngine::new(Arc::new(engine.clone()));
//! let controller = AppController::new(shared, ControllerConfig::default());
//!
//! let (content, size) = fixtures::media_bytes(2 * 1024 * 1024);
//! controller.select_file(content, "clip.avi", size, "video/x-msvideo").await?;
//! ```

mod mock_engine;

pub use mock_engine::{EngineCall, MockEngine};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::asset::{mime_for_extension, MediaAsset, MediaContent};

    /// A buffer of `len` bytes with a recognisable pattern, plus its size.
    pub fn media_bytes(len: usize) -> (MediaContent, u64) {
        let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        (MediaContent::from(bytes), len as u64)
    }

    /// A small asset with the given name.
    pub fn asset(name: &str) -> MediaAsset {
        let (content, size) = media_bytes(1024);
        let ext = name.rsplit('.').next().unwrap_or_default();
        MediaAsset::from_file(content, name, size, mime_for_extension(ext))
            .expect("fixture asset is within the size limit")
    }
}
