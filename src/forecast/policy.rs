use serde::{Deserialize, Serialize};

use crate::domain::{ConfidenceLevel, ModelUsed};

/// Series-length thresholds driving model choice and confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionThresholds {
    /// Below this many observations the moving-average fallback is used
    pub min_data_points: usize,
    /// Regression forecasts trained on more observations than this are `high`
    pub high_confidence_points: usize,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            min_data_points: 30,
            high_confidence_points: 90,
        }
    }
}

pub fn select_model(series_len: usize, thresholds: &SelectionThresholds) -> ModelUsed {
    if series_len < thresholds.min_data_points {
        ModelUsed::MovingAverage
    } else {
        ModelUsed::Regression
    }
}

/// Confidence depends only on the chosen path and history length, never on horizon
pub fn confidence_for(
    model: ModelUsed,
    series_len: usize,
    thresholds: &SelectionThresholds,
) -> ConfidenceLevel {
    match model {
        ModelUsed::MovingAverage => ConfidenceLevel::Low,
        ModelUsed::Regression if series_len > thresholds.high_confidence_points => {
            ConfidenceLevel::High
        }
        ModelUsed::Regression => ConfidenceLevel::Medium,
    }
}
