use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::Display;

/// Error metrics of a forecast against realized sales
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Square Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error (%), zero actuals divided by 1
    pub mape: f64,
    /// Mean Percentage Error (%), signed bias
    pub mpe: f64,
    /// Coefficient of determination
    pub r_squared: f64,
    pub accuracy_percentage: f64,
    /// Number of date-matched pairs
    pub sample_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalProfile {
    /// Day of week (0 = Monday) to stats
    pub weekly_pattern: BTreeMap<u32, PatternStats>,
    /// Month (1-12) to stats, empty for short histories
    pub monthly_pattern: BTreeMap<u32, PatternStats>,
    /// Quarter (1-4) to stats, empty for short histories
    pub quarterly_pattern: BTreeMap<u32, PatternStats>,
    pub trend: Trend,
    pub trend_correlation: f64,
    pub data_points: usize,
    pub analysis_period_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsufficientSeasonalData {
    pub error: String,
    pub required: usize,
    pub data_points: usize,
}

/// Outcome of a seasonality analysis; short series never produce a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeasonalAnalysis {
    Profile(SeasonalProfile),
    InsufficientData(InsufficientSeasonalData),
}

impl SeasonalAnalysis {
    pub fn profile(&self) -> Option<&SeasonalProfile> {
        match self {
            Self::Profile(p) => Some(p),
            Self::InsufficientData(_) => None,
        }
    }
}
