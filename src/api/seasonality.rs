use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{api::error::ApiError, controller::AppState, domain::SeasonalAnalysis};

#[derive(Debug, Deserialize)]
pub struct SeasonalityRequest {
    pub sales_data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct SeasonalityResponse {
    pub seasonal_analysis: SeasonalAnalysis,
    pub analyzed_at: DateTime<Utc>,
}

/// POST /seasonality - Weekly, monthly and quarterly demand patterns
///
/// Short histories get an insufficient-data object in `seasonal_analysis`
/// rather than an error status.
pub async fn analyze_seasonality(
    State(state): State<AppState>,
    payload: Result<Json<SeasonalityRequest>, JsonRejection>,
) -> Result<Json<SeasonalityResponse>, ApiError> {
    let Json(request) = payload?;
    let sales_data = request
        .sales_data
        .ok_or_else(|| ApiError::ValidationError("Missing sales_data in request".to_string()))?;

    let seasonal_analysis = state.orchestrator.analyze_seasonality(&sales_data)?;

    Ok(Json(SeasonalityResponse {
        seasonal_analysis,
        analyzed_at: Utc::now(),
    }))
}
