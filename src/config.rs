use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::forecast::{RegressionSettings, SeasonalityThresholds, SelectionThresholds};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub forecast: ForecastConfig,
    pub seasonality: SeasonalityThresholds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub body_limit_bytes: usize,
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 60,
            body_limit_bytes: 10 * 1024 * 1024,
            enable_cors: false,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_db: u8,
    pub ttl_seconds: u64,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            redis_host: "localhost".to_string(),
            redis_port: 6379,
            redis_db: 0,
            ttl_seconds: 86_400,
            key_prefix: "forecast".to_string(),
        }
    }
}

impl CacheConfig {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/{}", self.redis_host, self.redis_port, self.redis_db)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Below this many observations the moving-average fallback is used
    pub min_data_points: usize,
    pub high_confidence_points: usize,
    pub default_horizon_days: usize,
    /// Optional upper limit on `forecast_horizon`; unset means no limit
    pub max_horizon_days: Option<usize>,
    pub moving_average_window: usize,
    pub interval_width: f64,
    pub yearly_seasonality_min_points: usize,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let selection = SelectionThresholds::default();
        let regression = RegressionSettings::default();
        Self {
            min_data_points: selection.min_data_points,
            high_confidence_points: selection.high_confidence_points,
            default_horizon_days: 30,
            max_horizon_days: None,
            moving_average_window: 7,
            interval_width: regression.interval_width,
            yearly_seasonality_min_points: regression.yearly_seasonality_min_points,
        }
    }
}

impl ForecastConfig {
    pub fn selection(&self) -> SelectionThresholds {
        SelectionThresholds {
            min_data_points: self.min_data_points,
            high_confidence_points: self.high_confidence_points,
        }
    }

    pub fn regression(&self) -> RegressionSettings {
        RegressionSettings {
            interval_width: self.interval_width,
            yearly_seasonality_min_points: self.yearly_seasonality_min_points,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::figment(Figment::new().merge(Toml::file("config/default.toml")))
    }

    fn figment(base: Figment) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(base)
            .merge(Env::prefixed("DFS__").split("__"))
            // deployment variables predating the DFS__ prefix
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .merge(Env::raw().only(&["REDIS_HOST"]).map(|_| "cache.redis_host".into()))
            .merge(Env::raw().only(&["REDIS_PORT"]).map(|_| "cache.redis_port".into()));
        let cfg: Config = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        let f = &self.forecast;
        anyhow::ensure!(f.min_data_points >= 1, "forecast.min_data_points must be at least 1");
        anyhow::ensure!(
            f.high_confidence_points >= f.min_data_points,
            "forecast.high_confidence_points must not be below forecast.min_data_points"
        );
        anyhow::ensure!(f.default_horizon_days >= 1, "forecast.default_horizon_days must be at least 1");
        anyhow::ensure!(
            f.max_horizon_days.map_or(true, |max| f.default_horizon_days <= max),
            "forecast.default_horizon_days must not exceed forecast.max_horizon_days"
        );
        anyhow::ensure!(f.moving_average_window >= 1, "forecast.moving_average_window must be at least 1");
        anyhow::ensure!(
            f.interval_width > 0.0 && f.interval_width < 1.0,
            "forecast.interval_width must be in (0, 1)"
        );
        anyhow::ensure!(self.cache.ttl_seconds > 0, "cache.ttl_seconds must be positive");
        Ok(())
    }
}
