pub mod orchestrator;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::cache::{build_cache, ForecastCache};
use crate::config::Config;
use crate::forecast::{ForecastingEngine, HarmonicRegressionEngine};

pub use orchestrator::{ForecastOrchestrator, ForecastRequest, ForecastSettings, UNKNOWN_PRODUCT};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Config,
    pub orchestrator: Arc<ForecastOrchestrator>,
}

impl AppState {
    pub async fn new(cfg: Config) -> Result<Self> {
        let cache = build_cache(&cfg.cache).await;
        let engine: Arc<dyn ForecastingEngine> = Arc::new(HarmonicRegressionEngine::default());
        Ok(Self::with_components(cfg, cache, engine))
    }

    /// State over explicit cache and engine implementations
    pub fn with_components(
        cfg: Config,
        cache: Arc<dyn ForecastCache>,
        engine: Arc<dyn ForecastingEngine>,
    ) -> Self {
        let settings = ForecastSettings::from_config(&cfg);
        info!(
            min_data_points = settings.selection.min_data_points,
            default_horizon = settings.default_horizon,
            ttl_secs = settings.cache_ttl.as_secs(),
            "forecast orchestrator ready"
        );
        Self {
            orchestrator: Arc::new(ForecastOrchestrator::new(settings, cache, engine)),
            cfg,
        }
    }
}
