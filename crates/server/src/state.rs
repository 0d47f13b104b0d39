use opener_core::{AppController, Config};

/// Shared application state
pub struct AppState {
    config: Config,
    controller: AppController,
}

impl AppState {
    pub fn new(config: Config, controller: AppController) -> Self {
        Self { config, controller }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controller(&self) -> &AppController {
        &self.controller
    }

    /// Request body ceiling: the largest accepted file plus room for the
    /// multipart framing.
    pub fn body_limit(&self) -> usize {
        let limit = self
            .config
            .limits
            .max_file_size_bytes
            .saturating_add(MULTIPART_OVERHEAD);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

const MULTIPART_OVERHEAD: u64 = 1024 * 1024;
