use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::debug;
use validator::Validate;

use crate::{
    api::error::ApiError,
    controller::{AppState, ForecastRequest},
    domain::ForecastResult,
};

/// POST /forecast - Demand forecast for one product
///
/// Served from cache when an entry exists for the same product, horizon and
/// number of external factors.
pub async fn create_forecast(
    State(state): State<AppState>,
    payload: Result<Json<ForecastRequest>, JsonRejection>,
) -> Result<Json<ForecastResult>, ApiError> {
    let Json(request) = payload?;
    if request.sales_data.is_none() {
        return Err(ApiError::ValidationError("Missing sales_data in request".to_string()));
    }
    request.validate()?;
    debug!(product_id = request.product_id(), "forecast requested");

    let result = state.orchestrator.forecast(request).await?;
    Ok(Json(result))
}
