use std::{fmt, sync::Arc};

use recon_config::Config;
use recon_core::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    orchestrator: Orchestrator,
    config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("dev_mode", &self.config.dev_mode)
            .field("bind_address", &self.config.bind_address())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: Arc<Config>) -> Self {
        Self {
            orchestrator,
            config,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
