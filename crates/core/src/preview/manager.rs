//! Single-slot preview handle manager.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use super::handle::PreviewHandle;
use crate::asset::MediaContent;
use crate::metrics::{PREVIEW_HANDLES_CREATED, PREVIEW_HANDLES_REVOKED};

/// How many revoked handles are remembered for inspection.
const RECENT_REVOKED: usize = 8;

/// Handle lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewStats {
    pub created: u64,
    pub revoked: u64,
    pub live: u64,
}

/// Owns the lifetime of at most one live preview handle.
///
/// Adopting new content revokes the previous handle before the new one is
/// created, so two handles are never live at once.
#[derive(Debug, Default)]
pub struct PreviewUrlManager {
    active: Option<(PreviewHandle, MediaContent)>,
    created: u64,
    revoked: u64,
    recently_revoked: VecDeque<PreviewHandle>,
}

impl PreviewUrlManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes any live handle, then creates one for `content`.
    pub fn adopt(&mut self, content: MediaContent) -> PreviewHandle {
        self.release();

        let handle = PreviewHandle::generate();
        self.created += 1;
        PREVIEW_HANDLES_CREATED.inc();
        debug!(handle = %handle, bytes = content.len(), "Preview handle created");

        self.active = Some((handle.clone(), content));
        handle
    }

    /// Revokes the live handle, if any. Calling it again is a no-op.
    pub fn release(&mut self) {
        if let Some((handle, _content)) = self.active.take() {
            debug!(handle = %handle, "Preview handle revoked");
            PREVIEW_HANDLES_REVOKED.inc();
            self.revoked += 1;
            if self.recently_revoked.len() == RECENT_REVOKED {
                self.recently_revoked.pop_front();
            }
            self.recently_revoked.push_back(handle);
        }
    }

    /// Resolves a handle to its bytes. Revoked or unknown handles resolve to
    /// nothing.
    pub fn resolve(&self, handle: &PreviewHandle) -> Option<MediaContent> {
        match &self.active {
            Some((live, content)) if live == handle => Some(content.clone()),
            _ => None,
        }
    }

    /// The live handle, if any.
    pub fn active(&self) -> Option<&PreviewHandle> {
        self.active.as_ref().map(|(handle, _)| handle)
    }

    /// The most recently revoked handles, oldest first. Older ones are
    /// only counted.
    pub fn recently_revoked(&self) -> impl Iterator<Item = &PreviewHandle> {
        self.recently_revoked.iter()
    }

    pub fn stats(&self) -> PreviewStats {
        PreviewStats {
            created: self.created,
            revoked: self.revoked,
            live: u64::from(self.active.is_some()),
        }
    }
}

impl Drop for PreviewUrlManager {
    fn drop(&mut self) {
        self.release();
    }
}
