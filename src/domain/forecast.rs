use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use validator::Validate;

/// Coarse forecast confidence label derived from training volume and model path
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,   // regression path, more than 90 observations
    Medium, // regression path, 30-90 observations
    Low,    // moving-average fallback
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// Which forecasting path produced a result
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelUsed {
    MovingAverage,
    Regression,
}

/// One forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_demand: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// Only reported on single-horizon regression output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_interval_width: Option<f64>,
}

impl ForecastPoint {
    pub fn new(date: NaiveDate, predicted_demand: f64, lower_bound: f64, upper_bound: f64) -> Self {
        Self {
            date,
            predicted_demand,
            lower_bound,
            upper_bound,
            confidence_interval_width: None,
        }
    }

    pub fn with_interval_width(mut self) -> Self {
        self.confidence_interval_width = Some(round2(self.upper_bound - self.lower_bound));
        self
    }

    /// `0 <= lower <= predicted <= upper`
    pub fn is_well_ordered(&self) -> bool {
        0.0 <= self.lower_bound
            && self.lower_bound <= self.predicted_demand
            && self.predicted_demand <= self.upper_bound
    }
}

/// Forecasts keyed by the fixed week horizons of multi-step mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiHorizonForecast {
    #[serde(rename = "1_week")]
    pub one_week: Vec<ForecastPoint>,
    #[serde(rename = "4_week")]
    pub four_week: Vec<ForecastPoint>,
    #[serde(rename = "12_week")]
    pub twelve_week: Vec<ForecastPoint>,
}

impl MultiHorizonForecast {
    pub fn points(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.one_week
            .iter()
            .chain(self.four_week.iter())
            .chain(self.twelve_week.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForecastSet {
    Single(Vec<ForecastPoint>),
    MultiStep(MultiHorizonForecast),
}

impl ForecastSet {
    pub fn points(&self) -> Box<dyn Iterator<Item = &ForecastPoint> + '_> {
        match self {
            Self::Single(points) => Box::new(points.iter()),
            Self::MultiStep(multi) => Box::new(multi.points()),
        }
    }
}

/// Assembled response of a forecast request. Cached as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub product_id: String,
    pub forecasts: ForecastSet,
    pub confidence_level: ConfidenceLevel,
    pub model_used: ModelUsed,
    pub data_quality_score: f64,
    pub external_factors_used: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Caller-supplied regressor with aligned history and future values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ExternalFactor {
    #[validate(length(min = 1, max = 128))]
    pub name: String,
    #[serde(default)]
    pub historical_values: Vec<f64>,
    #[serde(default)]
    pub future_values: Vec<f64>,
    #[serde(default = "default_prior_scale")]
    #[validate(range(exclusive_min = 0.0))]
    pub prior_scale: f64,
    #[serde(default = "default_standardize")]
    pub standardize: bool,
    /// Used for future rows the caller did not supply
    #[serde(default)]
    pub future_default: Option<f64>,
}

fn default_prior_scale() -> f64 {
    10.0
}

fn default_standardize() -> bool {
    true
}

impl ExternalFactor {
    /// Future values padded (or truncated) to exactly `horizon` rows
    pub fn future_for_horizon(&self, horizon: usize) -> Vec<f64> {
        let fill = self.future_default.unwrap_or(0.0);
        (0..horizon)
            .map(|i| self.future_values.get(i).copied().unwrap_or(fill))
            .collect()
    }
}

/// Two decimals. Rounds the exact binary value, ties to even.
pub fn round2(value: f64) -> f64 {
    format!("{value:.2}").parse().unwrap_or(value)
}
