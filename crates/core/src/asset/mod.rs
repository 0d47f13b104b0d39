//! Media asset module.
//!
//! A [`MediaAsset`] is the value object for the file the user is working on:
//! the selected bytes, their display name and size, an optional preview
//! handle, and the metadata the playback surface reports once it has decoded
//! the preview.

mod display;
mod error;
mod types;

pub use display::{format_duration, format_file_size, mime_for_extension};
pub use error::AssetError;
pub use types::{
    AssetId, AssetOrigin, AssetSummary, MediaAsset, MediaContent, MediaMetadata,
    MAX_FILE_SIZE_BYTES,
};
