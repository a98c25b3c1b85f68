//! Seasonal regression engine contract
//!
//! Any engine that can `fit` a training frame under a [`ModelSpec`] and then
//! `predict` a future frame can back the regression path. The adapter owns
//! all shaping of frames; engines never see request types.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use thiserror::Error;

/// Named numeric columns, one value per row
pub type ColumnTable = BTreeMap<String, Vec<f64>>;

/// Named boolean columns used to switch conditional seasonalities on and off
pub type ConditionTable = BTreeMap<String, Vec<bool>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalitySpec {
    pub name: String,
    pub period_days: f64,
    pub fourier_order: usize,
    /// Active only on rows where this condition column is true
    pub condition: Option<String>,
}

impl SeasonalitySpec {
    pub fn new(name: impl Into<String>, period_days: f64, fourier_order: usize) -> Self {
        Self {
            name: name.into(),
            period_days,
            fourier_order,
            condition: None,
        }
    }

    pub fn conditioned_on(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegressorSpec {
    pub name: String,
    pub prior_scale: f64,
    pub standardize: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub seasonalities: Vec<SeasonalitySpec>,
    pub regressors: Vec<RegressorSpec>,
    /// Coverage of the reported uncertainty interval, e.g. 0.8
    pub interval_width: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingFrame {
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
    pub regressors: ColumnTable,
    pub conditions: ConditionTable,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FutureFrame {
    pub dates: Vec<NaiveDate>,
    pub regressors: ColumnTable,
    pub conditions: ConditionTable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnginePrediction {
    pub date: NaiveDate,
    pub point: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("empty training data")]
    EmptyTrainingData,

    #[error("non-finite value in column '{0}'")]
    NonFinite(String),

    #[error("column '{name}' has {actual} rows, expected {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("model fit failed: {0}")]
    Fit(String),
}

/// Trained state produced by [`ForecastingEngine::fit`]
pub trait FittedModel: Send {
    fn predict(&self, future: &FutureFrame) -> Result<Vec<EnginePrediction>, EngineError>;
}

pub trait ForecastingEngine: Send + Sync {
    fn fit(&self, frame: &TrainingFrame, spec: &ModelSpec) -> Result<Box<dyn FittedModel>, EngineError>;
}
