use super::ForecastError;
use crate::domain::{round2, ForecastPoint, Series};

const LOWER_RATIO: f64 = 0.8;
const UPPER_RATIO: f64 = 1.2;

/// Flat forecast at the mean of the most recent observations, with bounds at
/// fixed ratios of that mean.
#[derive(Debug, Clone, Copy)]
pub struct MovingAverageForecaster {
    pub window: usize,
}

impl Default for MovingAverageForecaster {
    fn default() -> Self {
        Self { window: 7 }
    }
}

impl MovingAverageForecaster {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    pub fn forecast(&self, series: &Series, horizon: usize) -> Result<Vec<ForecastPoint>, ForecastError> {
        if series.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: 1,
                actual: 0,
            });
        }

        let values = series.values();
        let window = self.window.min(values.len());
        let recent = &values[values.len() - window..];
        let recent_avg = recent.iter().sum::<f64>() / window as f64;

        let predicted = round2(recent_avg).max(0.0);
        let lower = round2(recent_avg * LOWER_RATIO).max(0.0);
        let upper = round2(recent_avg * UPPER_RATIO).max(0.0);

        Ok(series
            .future_dates(horizon)
            .into_iter()
            .map(|date| ForecastPoint::new(date, predicted, lower, upper))
            .collect())
    }
}
