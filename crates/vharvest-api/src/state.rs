//! Application state.

use std::sync::Arc;

use vharvest_worker::{HarvestConfig, HarvestService};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub service: Arc<HarvestService>,
}

impl AppState {
    /// Build the harvester from the environment.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let service = HarvestService::from_env(HarvestConfig::from_env())?;
        Ok(Self::with_service(config, Arc::new(service)))
    }

    pub fn with_service(config: ApiConfig, service: Arc<HarvestService>) -> Self {
        Self { config, service }
    }
}
