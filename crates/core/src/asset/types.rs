//! Types for the asset module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::display::{format_duration, format_file_size};
use super::error::AssetError;
use crate::job::JobId;
use crate::preview::PreviewHandle;

/// Largest accepted input file: 500 MiB.
pub const MAX_FILE_SIZE_BYTES: u64 = 500 * 1024 * 1024;

/// Identity of a media asset, used to discard stale metadata reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    /// Creates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Shared immutable media bytes.
///
/// Cloning bumps a reference count; the bytes themselves are never copied.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaContent(Arc<[u8]>);

impl MediaContent {
    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether two handles point at the same buffer.
    pub fn ptr_eq(&self, other: &MediaContent) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MediaContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaContent")
            .field("len", &self.0.len())
            .finish()
    }
}

impl From<Vec<u8>> for MediaContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }
}

impl From<&[u8]> for MediaContent {
    fn from(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }
}

impl AsRef<[u8]> for MediaContent {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Decoded properties reported by the playback surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

/// Where an asset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetOrigin {
    /// Picked or dropped by the user.
    Selected,
    /// Output of a finished conversion job.
    Converted { job_id: JobId },
}

/// The file currently being previewed and converted.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    id: AssetId,
    name: String,
    byte_size: u64,
    mime_hint: String,
    content: MediaContent,
    preview: Option<PreviewHandle>,
    metadata: Option<MediaMetadata>,
    origin: AssetOrigin,
}

impl MediaAsset {
    /// Builds an asset from a selected file using the default 500 MiB ceiling.
    pub fn from_file(
        content: MediaContent,
        name: impl Into<String>,
        size: u64,
        mime_hint: impl Into<String>,
    ) -> Result<Self, AssetError> {
        Self::from_file_with_limit(content, name, size, mime_hint, MAX_FILE_SIZE_BYTES)
    }

    /// Builds an asset, rejecting anything larger than `limit` bytes.
    ///
    /// The size check runs first; nothing is allocated on rejection.
    pub fn from_file_with_limit(
        content: MediaContent,
        name: impl Into<String>,
        size: u64,
        mime_hint: impl Into<String>,
        limit: u64,
    ) -> Result<Self, AssetError> {
        if size > limit {
            return Err(AssetError::SizeExceeded { size, limit });
        }

        Ok(Self {
            id: AssetId::new(),
            name: name.into(),
            byte_size: size,
            mime_hint: mime_hint.into(),
            content,
            preview: None,
            metadata: None,
            origin: AssetOrigin::Selected,
        })
    }

    /// Marks the asset as the output of a conversion job.
    pub fn with_origin(mut self, origin: AssetOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn id(&self) -> AssetId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn mime_hint(&self) -> &str {
        &self.mime_hint
    }

    pub fn content(&self) -> &MediaContent {
        &self.content
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }

    pub fn origin(&self) -> AssetOrigin {
        self.origin
    }

    /// Records the preview handle adopted for this asset.
    pub(crate) fn set_preview(&mut self, handle: Option<PreviewHandle>) {
        self.preview = handle;
    }

    /// Attaches decoded metadata. Only the first report is kept.
    pub fn attach_metadata(&mut self, duration_secs: f64, width: u32, height: u32) {
        if self.metadata.is_some() {
            debug!(asset_id = %self.id, "Metadata already attached, ignoring report");
            return;
        }
        self.metadata = Some(MediaMetadata {
            duration_secs,
            width,
            height,
        });
    }

    /// Lowercased extension of the display name, if any.
    pub fn extension(&self) -> Option<String> {
        split_extension(&self.name).1.map(|e| e.to_ascii_lowercase())
    }

    /// Display name without its extension.
    pub fn base_name(&self) -> &str {
        split_extension(&self.name).0
    }

    /// Name for a derived file: same base name, extension replaced.
    pub fn output_name(&self, extension: &str) -> String {
        format!("{}.{}", self.base_name(), extension)
    }

    /// Serializable view for presentation layers.
    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            id: self.id,
            name: self.name.clone(),
            byte_size: self.byte_size,
            size_display: format_file_size(self.byte_size),
            mime_hint: self.mime_hint.clone(),
            preview: self.preview.clone(),
            duration_secs: self.metadata.map(|m| m.duration_secs),
            duration_display: self.metadata.map(|m| format_duration(m.duration_secs)),
            width: self.metadata.map(|m| m.width),
            height: self.metadata.map(|m| m.height),
            origin: self.origin,
        }
    }
}

/// Splits `clip.final.avi` into (`clip.final`, `avi`). Dotfiles and names
/// without a dot have no extension.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], Some(&name[idx + 1..])),
        _ => (name, None),
    }
}

/// Asset info as shown in the page's info panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: AssetId,
    pub name: String,
    pub byte_size: u64,
    pub size_display: String,
    pub mime_hint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<PreviewHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub origin: AssetOrigin,
}
