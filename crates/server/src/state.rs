use std::sync::Arc;
use dashpack_core::{ArtifactNamespace, Config, TranscodeCoordinator};

/// Shared application state
pub struct AppState {
    config: Config,
    coordinator: Arc<TranscodeCoordinator>,
}

impl AppState {
    pub fn new(config: Config, coordinator: Arc<TranscodeCoordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn coordinator(&self) -> &TranscodeCoordinator {
        self.coordinator.as_ref()
    }

    /// Job output directories, as laid out by the coordinator.
    pub fn namespace(&self) -> &ArtifactNamespace {
        self.coordinator.namespace()
    }
}
