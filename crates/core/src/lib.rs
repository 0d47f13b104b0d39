pub mod asset;
pub mod config;
pub mod controller;
pub mod engine;
pub mod job;
pub mod metrics;
pub mod preview;
pub mod testing;

pub use asset::{
    format_duration, format_file_size, mime_for_extension, AssetError, AssetId, AssetOrigin,
    AssetSummary, MediaAsset, MediaContent, MediaMetadata, MAX_FILE_SIZE_BYTES,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LimitsConfig,
    ServerConfig,
};
pub use controller::{
    ActiveJobInfo, AppController, ControllerConfig, ControllerError, ControllerEvent,
    ControllerSnapshot, Download, Notice, NoticeLevel, PlaybackStatus, UiPhase,
};
pub use engine::{
    Engine, EngineConfig, EngineError, EngineEvent, FfmpegEngine, LoadProgress, SharedEngine,
};
pub use job::{
    CancelHandle, CompressionLevel, ConversionJob, GifParams, JobError, JobId, JobOutput,
    JobProgress, JobState, Operation, TargetFormat, TimeRange, TranscodeParams,
};
pub use preview::{PreviewHandle, PreviewStats, PreviewUrlManager};
