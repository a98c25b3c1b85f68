//! Concurrent request handling
//!
//! - many clients forecasting distinct products at once
//! - many clients racing on the same cache key
//! - regression fits must not starve health checks

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration as Days, NaiveDate};
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tower::ServiceExt;

use demand_forecast_service::{
    api,
    cache::InMemoryCache,
    config::Config,
    controller::AppState,
    forecast::{
        EngineError, FittedModel, ForecastingEngine, HarmonicRegressionEngine, ModelSpec,
        TrainingFrame,
    },
};

struct CountingEngine {
    fits: AtomicUsize,
    inner: HarmonicRegressionEngine,
}

impl ForecastingEngine for CountingEngine {
    fn fit(&self, frame: &TrainingFrame, spec: &ModelSpec) -> Result<Box<dyn FittedModel>, EngineError> {
        self.fits.fetch_add(1, Ordering::SeqCst);
        self.inner.fit(frame, spec)
    }
}

fn build_app() -> (Router, Arc<CountingEngine>) {
    let engine = Arc::new(CountingEngine {
        fits: AtomicUsize::new(0),
        inner: HarmonicRegressionEngine::default(),
    });
    let state = AppState::with_components(Config::default(), Arc::new(InMemoryCache::new()), engine.clone());
    (api::router(state), engine)
}

fn forecast_body(product_id: &str, days: i64) -> Value {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
    let sales: Vec<Value> = (0..days)
        .map(|i| {
            json!({
                "ds": (start + Days::days(i)).to_string(),
                "y": 100.0 + (i % 7) as f64 * 10.0 + i as f64 * 0.5,
            })
        })
        .collect();
    json!({"product_id": product_id, "sales_data": sales, "forecast_horizon": 14})
}

async fn post_forecast(app: Router, body: Value) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri("/forecast")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap().status()
}

/// Distinct products each get their own fit
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_products() {
    let (app, engine) = build_app();

    let mut tasks = JoinSet::new();
    for i in 0..16 {
        let app = app.clone();
        tasks.spawn(async move { post_forecast(app, forecast_body(&format!("sku-{i}"), 60)).await });
    }

    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }
    assert_eq!(engine.fits.load(Ordering::SeqCst), 16);
}

/// Racing requests on one key may each compute, but later ones hit the cache
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_key_race_is_benign() {
    let (app, engine) = build_app();

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let app = app.clone();
        tasks.spawn(async move { post_forecast(app, forecast_body("hot-sku", 60)).await });
    }
    while let Some(status) = tasks.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    let racing_fits = engine.fits.load(Ordering::SeqCst);
    assert!((1..=8).contains(&racing_fits));

    assert_eq!(post_forecast(app, forecast_body("hot-sku", 60)).await, StatusCode::OK);
    assert_eq!(engine.fits.load(Ordering::SeqCst), racing_fits);
}

/// Health checks stay responsive while long regression fits run
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore] // slow
async fn test_health_latency_under_forecast_load() {
    let (app, _) = build_app();

    let mut forecasts = JoinSet::new();
    for i in 0..50 {
        let app = app.clone();
        forecasts.spawn(async move { post_forecast(app, forecast_body(&format!("load-{i}"), 730)).await });
    }

    let mut latencies = Vec::new();
    for _ in 0..20 {
        let start = Instant::now();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        latencies.push(start.elapsed());
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    while let Some(status) = forecasts.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    let max_latency = latencies.iter().max().copied().unwrap_or_default();
    println!("health latency max: {max_latency:?}");
    assert!(max_latency < Duration::from_secs(1), "health latency {max_latency:?}");
}
