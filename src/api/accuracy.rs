use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    api::error::ApiError,
    controller::AppState,
    domain::AccuracyReport,
    forecast::{ActualDemand, PredictedDemand},
};

#[derive(Debug, Deserialize)]
pub struct AccuracyRequest {
    pub forecasts: Vec<PredictedDemand>,
    pub actual_sales: Vec<ActualDemand>,
}

/// Serialized as `{}` when no dates overlap
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AccuracyMetrics {
    Report(AccuracyReport),
    Empty {},
}

#[derive(Debug, Serialize)]
pub struct AccuracyResponse {
    pub accuracy_metrics: AccuracyMetrics,
    pub calculated_at: DateTime<Utc>,
}

/// POST /accuracy - Score forecasts against realized sales
pub async fn evaluate_accuracy(
    State(state): State<AppState>,
    payload: Result<Json<AccuracyRequest>, JsonRejection>,
) -> Result<Json<AccuracyResponse>, ApiError> {
    let Json(request) = payload?;

    let accuracy_metrics = state
        .orchestrator
        .evaluate_accuracy(&request.forecasts, &request.actual_sales)
        .map_or(AccuracyMetrics::Empty {}, AccuracyMetrics::Report);

    Ok(Json(AccuracyResponse {
        accuracy_metrics,
        calculated_at: Utc::now(),
    }))
}
