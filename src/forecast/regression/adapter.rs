use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;

use super::engine::{
    ColumnTable, ConditionTable, EnginePrediction, ForecastingEngine, FutureFrame, ModelSpec,
    RegressorSpec, SeasonalitySpec, TrainingFrame,
};
use crate::domain::{round2, ExternalFactor, ForecastPoint, MultiHorizonForecast, Series};
use crate::forecast::{is_usable_value, ForecastError, NormalizedData};

pub const QUARTER_END_CONDITION: &str = "is_quarter_end";

const ONE_WEEK_DAYS: usize = 7;
const FOUR_WEEK_DAYS: usize = 28;
const TWELVE_WEEK_DAYS: usize = 84;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionSettings {
    pub interval_width: f64,
    /// Yearly seasonality is added only above this many observations
    pub yearly_seasonality_min_points: usize,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        Self {
            interval_width: 0.8,
            yearly_seasonality_min_points: 365,
        }
    }
}

/// An external factor whose history has been lined up with the training series
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFactor {
    pub factor: ExternalFactor,
    pub historical: Vec<f64>,
}

impl AlignedFactor {
    fn spec(&self) -> RegressorSpec {
        RegressorSpec {
            name: self.factor.name.clone(),
            prior_scale: self.factor.prior_scale,
            standardize: self.factor.standardize,
        }
    }
}

/// Line up each factor's history with the normalized series.
///
/// History may be given per surviving observation or per raw sales record;
/// in the latter case rows dropped by normalization are dropped here too.
pub fn align_factors(
    factors: &[ExternalFactor],
    normalized: &NormalizedData,
) -> Result<Vec<AlignedFactor>, ForecastError> {
    let mut names = HashSet::new();
    factors
        .iter()
        .map(|factor| {
            if !names.insert(factor.name.as_str()) {
                return Err(ForecastError::validation(format!(
                    "duplicate external factor '{}'",
                    factor.name
                )));
            }
            if factor
                .historical_values
                .iter()
                .chain(&factor.future_values)
                .any(|v| !is_usable_value(*v))
            {
                return Err(ForecastError::validation(format!(
                    "external factor '{}' contains non-finite or out-of-range values",
                    factor.name
                )));
            }

            let supplied = factor.historical_values.len();
            let historical = if supplied == normalized.series.len() {
                factor.historical_values.clone()
            } else if supplied == normalized.record_count {
                normalized
                    .kept_rows
                    .iter()
                    .map(|&row| factor.historical_values[row])
                    .collect()
            } else {
                return Err(ForecastError::validation(format!(
                    "external factor '{}' has {} historical values, expected {} (observations) or {} (records)",
                    factor.name,
                    supplied,
                    normalized.series.len(),
                    normalized.record_count
                )));
            };

            Ok(AlignedFactor {
                factor: factor.clone(),
                historical,
            })
        })
        .collect()
}

/// Shapes requests for a [`ForecastingEngine`] and formats its output
#[derive(Clone)]
pub struct RegressionForecastAdapter {
    engine: Arc<dyn ForecastingEngine>,
    settings: RegressionSettings,
}

impl RegressionForecastAdapter {
    pub fn new(engine: Arc<dyn ForecastingEngine>, settings: RegressionSettings) -> Self {
        Self { engine, settings }
    }

    pub fn model_spec(&self, series_len: usize, factors: &[AlignedFactor]) -> ModelSpec {
        let mut seasonalities = vec![
            SeasonalitySpec::new("weekly", 7.0, 3),
            SeasonalitySpec::new("monthly", 30.5, 5),
            SeasonalitySpec::new("quarterly", 91.25, 5).conditioned_on(QUARTER_END_CONDITION),
        ];
        if series_len > self.settings.yearly_seasonality_min_points {
            seasonalities.push(SeasonalitySpec::new("yearly", 365.25, 10));
        }

        ModelSpec {
            seasonalities,
            regressors: factors.iter().map(AlignedFactor::spec).collect(),
            interval_width: self.settings.interval_width,
        }
    }

    /// Single-horizon forecast; points carry their interval width
    pub fn forecast(
        &self,
        series: &Series,
        factors: &[AlignedFactor],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        Ok(self
            .run(series, factors, horizon)?
            .into_iter()
            .map(ForecastPoint::with_interval_width)
            .collect())
    }

    /// 1, 4 and 12 week forecasts, each from its own fit
    pub fn forecast_multi_horizon(
        &self,
        series: &Series,
        factors: &[AlignedFactor],
    ) -> Result<MultiHorizonForecast, ForecastError> {
        Ok(MultiHorizonForecast {
            one_week: self.run(series, factors, ONE_WEEK_DAYS)?,
            four_week: self.run(series, factors, FOUR_WEEK_DAYS)?,
            twelve_week: self.run(series, factors, TWELVE_WEEK_DAYS)?,
        })
    }

    fn run(
        &self,
        series: &Series,
        factors: &[AlignedFactor],
        horizon: usize,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        let Some(last_date) = series.last_date() else {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        };

        let spec = self.model_spec(series.len(), factors);

        let training_dates = series.dates();
        let training = TrainingFrame {
            conditions: quarter_end_table(&training_dates),
            regressors: factors
                .iter()
                .map(|f| (f.factor.name.clone(), f.historical.clone()))
                .collect::<ColumnTable>(),
            values: series.values(),
            dates: training_dates,
        };

        let future_dates = series.future_dates(horizon);
        let future = FutureFrame {
            conditions: quarter_end_table(&future_dates),
            regressors: factors
                .iter()
                .map(|f| (f.factor.name.clone(), f.factor.future_for_horizon(horizon)))
                .collect::<ColumnTable>(),
            dates: future_dates,
        };

        let model = self.engine.fit(&training, &spec)?;
        let predictions = model.predict(&future)?;

        Ok(predictions
            .into_iter()
            .filter(|p| p.date > last_date)
            .map(format_prediction)
            .collect())
    }
}

fn quarter_end_table(dates: &[NaiveDate]) -> ConditionTable {
    let column = dates.iter().map(|d| is_quarter_end_month(*d)).collect();
    ConditionTable::from([(QUARTER_END_CONDITION.to_string(), column)])
}

pub fn is_quarter_end_month(date: NaiveDate) -> bool {
    matches!(date.month(), 3 | 6 | 9 | 12)
}

/// Non-negative, two-decimal point with `lower <= predicted <= upper`
fn format_prediction(p: EnginePrediction) -> ForecastPoint {
    let predicted = round2(p.point).max(0.0);
    let lower = round2(p.lower).max(0.0).min(predicted);
    let upper = round2(p.upper).max(0.0).max(predicted);
    ForecastPoint::new(p.date, predicted, lower, upper)
}
