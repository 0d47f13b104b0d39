//! External conversion engine.
//!
//! The engine does the actual decoding and encoding. This module defines the
//! contract the rest of the crate relies on ([`Engine`]), the memoised
//! shared instance every job goes through ([`SharedEngine`]), and a default
//! implementation that drives an `ffmpeg` executable ([`FfmpegEngine`]).
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use opener_core::engine::{EngineConfig, FfmpegEngine, SharedEngine};
//!
//! let engine = SharedEngine::new(Arc::new(FfmpegEngine::new(EngineConfig::default())));
//!
//! let (tx, _rx) = tokio::sync::mpsc::channel(8);
//! engine.ensure_loaded(tx).await?;
//! assert!(engine.is_loaded());
//! ```

mod config;
mod error;
mod ffmpeg;
mod shared;
mod traits;
mod types;

pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::FfmpegEngine;
pub use shared::SharedEngine;
pub use traits::Engine;
pub use types::{EngineEvent, LoadProgress};
