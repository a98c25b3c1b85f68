use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::cache::{forecast_cache_key, ForecastCache};
use crate::config::Config;
use crate::domain::{
    AccuracyReport, ExternalFactor, ForecastResult, ForecastSet, ModelUsed, SeasonalAnalysis,
};
use crate::forecast::{
    align_factors, analyze, confidence_for, data_quality_score, evaluate, normalize,
    select_model, ActualDemand, ForecastError, ForecastingEngine, MovingAverageForecaster,
    PredictedDemand, RegressionForecastAdapter, RegressionSettings, SeasonalityThresholds,
    SelectionThresholds,
};

pub const UNKNOWN_PRODUCT: &str = "unknown";

/// Everything the orchestrator needs from configuration, resolved once at startup
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub selection: SelectionThresholds,
    pub regression: RegressionSettings,
    pub seasonality: SeasonalityThresholds,
    pub moving_average_window: usize,
    pub default_horizon: usize,
    pub max_horizon: Option<usize>,
    pub cache_ttl: Duration,
    pub cache_key_prefix: String,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl ForecastSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            selection: cfg.forecast.selection(),
            regression: cfg.forecast.regression(),
            seasonality: cfg.seasonality,
            moving_average_window: cfg.forecast.moving_average_window,
            default_horizon: cfg.forecast.default_horizon_days,
            max_horizon: cfg.forecast.max_horizon_days,
            cache_ttl: cfg.cache.ttl(),
            cache_key_prefix: cfg.cache.key_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ForecastRequest {
    #[validate(length(min = 1, max = 256))]
    pub product_id: Option<String>,
    /// Raw `{ds, y}` records, checked by the normalizer
    pub sales_data: Option<Value>,
    #[serde(default)]
    #[validate(nested)]
    pub external_factors: Vec<ExternalFactor>,
    #[validate(range(min = 1))]
    pub forecast_horizon: Option<usize>,
    #[serde(default)]
    pub multi_step: bool,
}

impl ForecastRequest {
    pub fn product_id(&self) -> &str {
        self.product_id.as_deref().unwrap_or(UNKNOWN_PRODUCT)
    }
}

/// Runs forecast, accuracy and seasonality requests against the shared cache
/// and the configured regression engine.
pub struct ForecastOrchestrator {
    settings: ForecastSettings,
    cache: Arc<dyn ForecastCache>,
    adapter: Arc<RegressionForecastAdapter>,
    fallback: MovingAverageForecaster,
}

impl ForecastOrchestrator {
    pub fn new(
        settings: ForecastSettings,
        cache: Arc<dyn ForecastCache>,
        engine: Arc<dyn ForecastingEngine>,
    ) -> Self {
        let adapter = Arc::new(RegressionForecastAdapter::new(engine, settings.regression));
        let fallback = MovingAverageForecaster::new(settings.moving_average_window);
        Self {
            settings,
            cache,
            adapter,
            fallback,
        }
    }

    #[tracing::instrument(
        skip(self, request),
        fields(product_id = %request.product_id(), factors = request.external_factors.len())
    )]
    pub async fn forecast(&self, request: ForecastRequest) -> Result<ForecastResult, ForecastError> {
        let ForecastRequest {
            product_id,
            sales_data,
            external_factors,
            forecast_horizon,
            multi_step,
        } = request;
        let product_id = product_id.unwrap_or_else(|| UNKNOWN_PRODUCT.to_string());
        let sales_data =
            sales_data.ok_or_else(|| ForecastError::validation("sales_data is required"))?;
        let horizon = forecast_horizon.unwrap_or(self.settings.default_horizon);
        if horizon == 0 {
            return Err(ForecastError::validation("forecast_horizon must be at least 1"));
        }
        if let Some(max) = self.settings.max_horizon.filter(|max| horizon > *max) {
            return Err(ForecastError::validation(format!(
                "forecast_horizon must not exceed {max}"
            )));
        }

        let key = forecast_cache_key(
            &self.settings.cache_key_prefix,
            &product_id,
            horizon,
            external_factors.len(),
        );
        if let Some(cached) = self.cached(&key).await {
            info!(%key, "returning cached forecast");
            return Ok(cached);
        }

        let normalized = normalize(&sales_data)?;
        if normalized.series.is_empty() {
            return Err(ForecastError::validation(
                "sales_data contains no valid observations",
            ));
        }
        let factors = align_factors(&external_factors, &normalized)?;

        let series = normalized.series;
        let n = series.len();
        let quality = data_quality_score(&series, normalized.missing_ratio, Utc::now().date_naive());
        let model = select_model(n, &self.settings.selection);
        let confidence = confidence_for(model, n, &self.settings.selection);
        debug!(observations = n, %model, %confidence, quality, "model selected");

        let forecasts = match model {
            ModelUsed::MovingAverage => ForecastSet::Single(self.fallback.forecast(&series, horizon)?),
            ModelUsed::Regression => {
                let adapter = Arc::clone(&self.adapter);
                tokio::task::spawn_blocking(move || {
                    if multi_step {
                        adapter
                            .forecast_multi_horizon(&series, &factors)
                            .map(ForecastSet::MultiStep)
                    } else {
                        adapter
                            .forecast(&series, &factors, horizon)
                            .map(ForecastSet::Single)
                    }
                })
                .await??
            }
        };

        let result = ForecastResult {
            product_id,
            forecasts,
            confidence_level: confidence,
            model_used: model,
            data_quality_score: quality,
            external_factors_used: external_factors.into_iter().map(|f| f.name).collect(),
            generated_at: Utc::now(),
        };

        self.store(&key, &result).await;
        info!(%model, points = result.forecasts.points().count(), "forecast generated");
        Ok(result)
    }

    /// `None` when the forecast and actual dates never coincide
    #[tracing::instrument(skip_all, fields(forecasts = forecasts.len(), actuals = actuals.len()))]
    pub fn evaluate_accuracy(
        &self,
        forecasts: &[PredictedDemand],
        actuals: &[ActualDemand],
    ) -> Option<AccuracyReport> {
        let report = evaluate(forecasts, actuals);
        if report.is_none() {
            debug!("no overlapping dates between forecasts and actuals");
        }
        report
    }

    #[tracing::instrument(skip_all)]
    pub fn analyze_seasonality(&self, sales_data: &Value) -> Result<SeasonalAnalysis, ForecastError> {
        let normalized = normalize(sales_data)?;
        Ok(analyze(&normalized.series, &self.settings.seasonality))
    }

    async fn cached(&self, key: &str) -> Option<ForecastResult> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(%key, error = %e, "discarding unreadable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(%key, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn store(&self, key: &str, result: &ForecastResult) {
        let raw = match serde_json::to_string(result) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%key, error = %e, "forecast not cacheable");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &raw, self.settings.cache_ttl).await {
            warn!(%key, error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, InMemoryCache, MockForecastCache};
    use crate::domain::{ConfidenceLevel, ForecastPoint};
    use crate::forecast::{
        EngineError, FittedModel, FutureFrame, HarmonicRegressionEngine, ModelSpec, TrainingFrame,
    };
    use chrono::{Duration as Days, NaiveDate};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEngine {
        fits: AtomicUsize,
        inner: HarmonicRegressionEngine,
    }

    impl CountingEngine {
        fn new() -> Self {
            Self {
                fits: AtomicUsize::new(0),
                inner: HarmonicRegressionEngine::default(),
            }
        }
    }

    impl ForecastingEngine for CountingEngine {
        fn fit(&self, frame: &TrainingFrame, spec: &ModelSpec) -> Result<Box<dyn FittedModel>, EngineError> {
            self.fits.fetch_add(1, Ordering::SeqCst);
            self.inner.fit(frame, spec)
        }
    }

    struct BrokenEngine;

    impl ForecastingEngine for BrokenEngine {
        fn fit(&self, _: &TrainingFrame, _: &ModelSpec) -> Result<Box<dyn FittedModel>, EngineError> {
            Err(EngineError::Fit("matrix is singular".to_string()))
        }
    }

    struct NoopModel;

    impl FittedModel for NoopModel {
        fn predict(&self, _: &FutureFrame) -> Result<Vec<crate::forecast::EnginePrediction>, EngineError> {
            Ok(Vec::new())
        }
    }

    struct NoopEngine;

    impl ForecastingEngine for NoopEngine {
        fn fit(&self, _: &TrainingFrame, _: &ModelSpec) -> Result<Box<dyn FittedModel>, EngineError> {
            Ok(Box::new(NoopModel))
        }
    }

    fn sales(days: usize, value: impl Fn(usize) -> f64) -> Value {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Value::Array(
            (0..days)
                .map(|i| {
                    json!({
                        "ds": (start + Days::days(i as i64)).to_string(),
                        "y": value(i),
                    })
                })
                .collect(),
        )
    }

    fn request(sales_data: Value, horizon: usize) -> ForecastRequest {
        ForecastRequest {
            product_id: Some("sku-42".to_string()),
            sales_data: Some(sales_data),
            forecast_horizon: Some(horizon),
            ..Default::default()
        }
    }

    fn orchestrator(cache: Arc<dyn ForecastCache>, engine: Arc<dyn ForecastingEngine>) -> ForecastOrchestrator {
        ForecastOrchestrator::new(ForecastSettings::default(), cache, engine)
    }

    #[tokio::test]
    async fn test_short_history_uses_fallback() {
        let orch = orchestrator(Arc::new(InMemoryCache::new()), Arc::new(NoopEngine));
        let result = orch.forecast(request(sales(10, |_| 50.0), 5)).await.unwrap();

        assert_eq!(result.model_used, ModelUsed::MovingAverage);
        assert_eq!(result.confidence_level, ConfidenceLevel::Low);
        assert_eq!(result.product_id, "sku-42");

        let ForecastSet::Single(points) = &result.forecasts else {
            panic!("expected flat forecast");
        };
        let first = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        let expected: Vec<ForecastPoint> = (0..5)
            .map(|i| ForecastPoint::new(first + Days::days(i), 50.0, 40.0, 60.0))
            .collect();
        assert_eq!(points, &expected);
    }

    #[tokio::test]
    async fn test_cache_hit_short_circuits() {
        let cached = ForecastResult {
            product_id: "sku-42".to_string(),
            forecasts: ForecastSet::Single(vec![]),
            confidence_level: ConfidenceLevel::High,
            model_used: ModelUsed::Regression,
            data_quality_score: 88.0,
            external_factors_used: vec![],
            generated_at: Utc::now(),
        };
        let raw = serde_json::to_string(&cached).unwrap();

        let mut cache = MockForecastCache::new();
        cache
            .expect_get()
            .withf(|key| key == "forecast:sku-42:7:0")
            .times(1)
            .returning(move |_| Ok(Some(raw.clone())));
        cache.expect_set().never();

        let engine = Arc::new(CountingEngine::new());
        let orch = orchestrator(Arc::new(cache), engine.clone());
        // sales data is not even parsed on a hit
        let result = orch.forecast(request(json!("garbage"), 7)).await.unwrap();

        assert_eq!(result, cached);
        assert_eq!(engine.fits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_second_request_served_from_cache() {
        let engine = Arc::new(CountingEngine::new());
        let orch = orchestrator(Arc::new(InMemoryCache::new()), engine.clone());
        let data = sales(60, |i| 100.0 + (i % 7) as f64 * 5.0);

        let first = orch.forecast(request(data.clone(), 14)).await.unwrap();
        assert_eq!(first.model_used, ModelUsed::Regression);
        assert_eq!(first.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(engine.fits.load(Ordering::SeqCst), 1);

        let second = orch.forecast(request(data, 14)).await.unwrap();
        assert_eq!(engine.fits.load(Ordering::SeqCst), 1);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_factor_content_shares_cache_entry() {
        let orch = orchestrator(Arc::new(InMemoryCache::new()), Arc::new(NoopEngine));
        let factor = |name: &str| ExternalFactor {
            name: name.to_string(),
            historical_values: vec![1.0; 10],
            future_values: vec![1.0; 3],
            prior_scale: 10.0,
            standardize: true,
            future_default: None,
        };

        let mut req = request(sales(10, |_| 10.0), 3);
        req.external_factors = vec![factor("promo")];
        let first = orch.forecast(req).await.unwrap();

        let mut req = request(sales(10, |_| 99.0), 3);
        req.external_factors = vec![factor("holiday")];
        let second = orch.forecast(req).await.unwrap();

        assert_eq!(second, first);
        assert_eq!(second.external_factors_used, vec!["promo".to_string()]);
    }

    #[tokio::test]
    async fn test_engine_failure_is_not_cached() {
        let mut cache = MockForecastCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache.expect_set().never();

        let orch = orchestrator(Arc::new(cache), Arc::new(BrokenEngine));
        let err = orch.forecast(request(sales(40, |i| i as f64), 7)).await.unwrap_err();
        assert!(matches!(err, ForecastError::Forecasting(_)));
    }

    #[tokio::test]
    async fn test_cache_errors_degrade_to_miss() {
        let mut cache = MockForecastCache::new();
        cache
            .expect_get()
            .returning(|_| Err(CacheError::OperationFailed("connection reset".to_string())));
        cache
            .expect_set()
            .times(1)
            .returning(|_, _, _| Err(CacheError::OperationFailed("connection reset".to_string())));

        let orch = orchestrator(Arc::new(cache), Arc::new(NoopEngine));
        let result = orch.forecast(request(sales(5, |_| 3.0), 2)).await.unwrap();
        assert_eq!(result.forecasts.points().count(), 2);
    }

    #[tokio::test]
    async fn test_cache_write_uses_configured_ttl() {
        let mut cache = MockForecastCache::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_set()
            .withf(|key, _, ttl| key == "forecast:unknown:30:0" && *ttl == Duration::from_secs(86_400))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let orch = orchestrator(Arc::new(cache), Arc::new(NoopEngine));
        let req = ForecastRequest {
            sales_data: Some(sales(3, |_| 1.0)),
            ..Default::default()
        };
        let result = orch.forecast(req).await.unwrap();
        assert_eq!(result.product_id, UNKNOWN_PRODUCT);
        assert_eq!(result.forecasts.points().count(), 30);
    }

    #[tokio::test]
    async fn test_multi_step_regression() {
        let orch = orchestrator(Arc::new(InMemoryCache::new()), Arc::new(HarmonicRegressionEngine::default()));
        let mut req = request(sales(120, |i| 50.0 + (i as f64 * 0.3)), 30);
        req.multi_step = true;

        let result = orch.forecast(req).await.unwrap();
        assert_eq!(result.confidence_level, ConfidenceLevel::High);
        let ForecastSet::MultiStep(multi) = &result.forecasts else {
            panic!("expected multi-horizon forecast");
        };
        assert_eq!(multi.one_week.len(), 7);
        assert_eq!(multi.four_week.len(), 28);
        assert_eq!(multi.twelve_week.len(), 84);
        assert!(multi.points().all(|p| p.confidence_interval_width.is_none() && p.is_well_ordered()));
    }

    #[tokio::test]
    async fn test_validation_failures() {
        let orch = orchestrator(Arc::new(InMemoryCache::new()), Arc::new(NoopEngine));

        let missing = ForecastRequest::default();
        assert!(matches!(orch.forecast(missing).await, Err(ForecastError::Validation(_))));

        let zero = request(sales(10, |_| 1.0), 0);
        assert!(matches!(orch.forecast(zero).await, Err(ForecastError::Validation(_))));

        let all_invalid = request(json!([{"ds": "not a date", "y": 1}, {"ds": "2024-01-01", "y": "n/a"}]), 5);
        let err = orch.forecast(all_invalid).await.unwrap_err();
        assert_eq!(err.to_string(), "sales_data contains no valid observations");
    }

    #[tokio::test]
    async fn test_horizon_unbounded_unless_capped() {
        let orch = orchestrator(Arc::new(InMemoryCache::new()), Arc::new(NoopEngine));
        let result = orch.forecast(request(sales(10, |_| 1.0), 400)).await.unwrap();
        let ForecastSet::Single(points) = result.forecasts else {
            panic!("expected single-horizon forecast");
        };
        assert_eq!(points.len(), 400);

        let capped = ForecastOrchestrator::new(
            ForecastSettings {
                max_horizon: Some(365),
                ..ForecastSettings::default()
            },
            Arc::new(InMemoryCache::new()),
            Arc::new(NoopEngine),
        );
        let err = capped.forecast(request(sales(10, |_| 1.0), 400)).await.unwrap_err();
        assert_eq!(err.to_string(), "forecast_horizon must not exceed 365");
    }

    #[test]
    fn test_seasonality_below_floor() {
        let orch = orchestrator(Arc::new(InMemoryCache::new()), Arc::new(NoopEngine));
        let analysis = orch.analyze_seasonality(&sales(10, |_| 1.0)).unwrap();
        assert!(matches!(analysis, SeasonalAnalysis::InsufficientData(_)));
    }
}
