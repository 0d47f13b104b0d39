//! Application controller module.
//!
//! The [`AppController`] owns the current [`MediaAsset`](crate::asset::MediaAsset),
//! its preview handle, and at most one running conversion job. Presentation
//! layers drive it with plain method calls and observe it through a
//! replace-latest snapshot channel and a broadcast event stream.
//!
//! # Phases
//!
//! ```text
//! Empty -> Loaded                     file selected
//! Loaded -> Converting                conversion requested
//! Converting -> Loaded                success, output becomes current
//! Converting -> ErrorShown -> Loaded  failure, original kept
//! any -> Empty                        clear
//! ```

mod config;
#[allow(clippy::module_inception)]
mod controller;
mod error;
mod types;

pub use config::ControllerConfig;
pub use controller::AppController;
pub use error::ControllerError;
pub use types::{
    ActiveJobInfo, ControllerEvent, ControllerSnapshot, Download, Notice, NoticeLevel,
    PlaybackStatus, UiPhase,
};
