//! Seasonal decomposition of a sales series into weekly, monthly and quarterly
//! statistics, plus a coarse trend label from the date/value correlation.

use chrono::Datelike;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::stats::{mean, pearson, sample_std};
use crate::domain::{
    InsufficientSeasonalData, Observation, PatternStats, SeasonalAnalysis, SeasonalProfile, Series,
    Trend,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityThresholds {
    pub min_points: usize,
    pub monthly_min_points: usize,
    pub quarterly_min_points: usize,
    /// |correlation| above this is labelled a trend
    pub trend_threshold: f64,
}

impl Default for SeasonalityThresholds {
    fn default() -> Self {
        Self {
            min_points: 14,
            monthly_min_points: 60,
            quarterly_min_points: 180,
            trend_threshold: 0.1,
        }
    }
}

pub fn analyze(series: &Series, thresholds: &SeasonalityThresholds) -> SeasonalAnalysis {
    let n = series.len();
    if n < thresholds.min_points {
        return SeasonalAnalysis::InsufficientData(InsufficientSeasonalData {
            error: "Insufficient data for seasonality analysis".to_string(),
            required: thresholds.min_points,
            data_points: n,
        });
    }

    let observations = series.observations();

    let weekly_pattern = pattern_by(observations, |o| o.date.weekday().num_days_from_monday());
    let monthly_pattern = if n >= thresholds.monthly_min_points {
        pattern_by(observations, |o| o.date.month())
    } else {
        BTreeMap::new()
    };
    let quarterly_pattern = if n >= thresholds.quarterly_min_points {
        pattern_by(observations, |o| (o.date.month() - 1) / 3 + 1)
    } else {
        BTreeMap::new()
    };

    let day_numbers: Vec<f64> = observations
        .iter()
        .map(|o| o.date.num_days_from_ce() as f64)
        .collect();
    let trend_correlation = pearson(&day_numbers, &series.values()).unwrap_or(0.0);
    let trend = if trend_correlation > thresholds.trend_threshold {
        Trend::Increasing
    } else if trend_correlation < -thresholds.trend_threshold {
        Trend::Decreasing
    } else {
        Trend::Stable
    };

    let analysis_period_days = match (series.first_date(), series.last_date()) {
        (Some(first), Some(last)) => (last - first).num_days(),
        _ => 0,
    };

    SeasonalAnalysis::Profile(SeasonalProfile {
        weekly_pattern,
        monthly_pattern,
        quarterly_pattern,
        trend,
        trend_correlation,
        data_points: n,
        analysis_period_days,
    })
}

fn pattern_by(
    observations: &[Observation],
    key: impl Fn(&Observation) -> u32,
) -> BTreeMap<u32, PatternStats> {
    observations
        .iter()
        .map(|o| (key(o), o.value))
        .into_group_map()
        .into_iter()
        .filter_map(|(k, values)| {
            let mean = mean(&values)?;
            // single-observation groups have no spread
            let std = sample_std(&values).unwrap_or(0.0);
            Some((k, PatternStats { mean, std }))
        })
        .collect()
}
