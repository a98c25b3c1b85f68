pub mod accuracy;
pub mod error;
pub mod forecast;
pub mod health;
pub mod seasonality;

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::controller::AppState;

pub fn router(state: AppState) -> Router {
    let server = state.cfg.server.clone();

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .route("/forecast", post(forecast::create_forecast))
        .route("/accuracy", post(accuracy::evaluate_accuracy))
        .route("/seasonality", post(seasonality::analyze_seasonality))
        .with_state(state);

    if server.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE]);
        router = router.layer(cors);
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(axum::extract::DefaultBodyLimit::max(server.body_limit_bytes))
                .layer(TimeoutLayer::new(server.request_timeout())),
        )
        .layer(TraceLayer::new_for_http())
}
