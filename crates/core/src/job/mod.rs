//! Conversion job module.
//!
//! A [`ConversionJob`] converts one input through the shared engine:
//! load the engine if needed, copy the input into engine scratch storage,
//! execute the operation, read the output back, and delete every scratch
//! file before settling.
//!
//! # State machine
//!
//! ```text
//! Pending -> LoadingEngine -> Running -> Succeeded
//! Pending -> Running (engine already loaded)
//! LoadingEngine | Running -> Failed
//! LoadingEngine | Running -> Cancelled
//! ```

mod args;
mod error;
mod progress;
mod runner;
mod types;

pub use args::build_args;
pub use error::JobError;
pub use progress::{ProgressMapper, ProgressSink, LOAD_SHARE, RUNNING_CAP, RUN_SHARE};
pub use runner::{CancelHandle, ConversionJob};
pub use types::{
    CompressionLevel, GifParams, JobId, JobOutput, JobProgress, JobState, Operation,
    TargetFormat, TimeRange, TranscodeParams,
};
