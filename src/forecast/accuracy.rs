//! Forecast accuracy evaluation
//!
//! Scores a forecast against realized sales. The two sides are inner-joined on
//! date; dates present on only one side are ignored.

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::normalize::deserialize_date;
use crate::domain::AccuracyReport;

/// Forecast side of an accuracy check. Other point fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictedDemand {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub predicted_demand: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualDemand {
    #[serde(deserialize_with = "deserialize_date")]
    pub date: NaiveDate,
    pub actual_demand: f64,
}

/// `None` when no dates overlap
pub fn evaluate(forecasts: &[PredictedDemand], actuals: &[ActualDemand]) -> Option<AccuracyReport> {
    let actual_by_date: HashMap<NaiveDate, Vec<f64>> = actuals
        .iter()
        .map(|a| (a.date, a.actual_demand))
        .into_group_map();

    let pairs: Vec<(f64, f64)> = forecasts
        .iter()
        .flat_map(|f| {
            actual_by_date
                .get(&f.date)
                .into_iter()
                .flatten()
                .map(move |a| (f.predicted_demand, *a))
        })
        .collect();

    if pairs.is_empty() {
        return None;
    }
    Some(metrics(&pairs))
}

/// Metrics over `(predicted, actual)` pairs; `pairs` must be non-empty
fn metrics(pairs: &[(f64, f64)]) -> AccuracyReport {
    let n = pairs.len() as f64;

    let mae = pairs.iter().map(|(p, a)| (p - a).abs()).sum::<f64>() / n;
    let mse = pairs.iter().map(|(p, a)| (p - a).powi(2)).sum::<f64>() / n;
    let rmse = mse.sqrt();

    // zero actuals are divided by 1 instead
    let pct = |(p, a): &(f64, f64)| (a - p) / if *a == 0.0 { 1.0 } else { *a };
    let mape = pairs.iter().map(|pair| pct(pair).abs()).sum::<f64>() / n * 100.0;
    let mpe = pairs.iter().map(pct).sum::<f64>() / n * 100.0;

    let mean_actual = pairs.iter().map(|(_, a)| a).sum::<f64>() / n;
    let ss_res: f64 = pairs.iter().map(|(p, a)| (a - p).powi(2)).sum();
    let ss_tot: f64 = pairs.iter().map(|(_, a)| (a - mean_actual).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 { 0.0 } else { 1.0 - ss_res / ss_tot };

    let accuracy_percentage = if mape < 100.0 { 100.0 - mape } else { 0.0 };

    AccuracyReport {
        mae,
        mse,
        rmse,
        mape,
        mpe,
        r_squared,
        accuracy_percentage,
        sample_size: pairs.len(),
    }
}
