//! Harmonic ridge-regression engine
//!
//! Linear trend plus Fourier terms for every seasonality, plus one column per
//! external regressor, fitted by penalised least squares. The target is scaled
//! by its largest magnitude before fitting so the penalties are unit-free.
//! Intervals are `yhat ± z * sigma` with sigma the in-sample residual RMS.

use chrono::{Datelike, NaiveDate};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

use super::engine::{
    ColumnTable, ConditionTable, EngineError, EnginePrediction, FittedModel, ForecastingEngine,
    FutureFrame, ModelSpec, TrainingFrame,
};

#[derive(Debug, Clone, Copy)]
pub struct HarmonicRegressionEngine {
    /// Prior scale shared by all seasonal terms; penalty is `1 / scale²`
    pub seasonality_prior_scale: f64,
}

impl Default for HarmonicRegressionEngine {
    fn default() -> Self {
        Self {
            seasonality_prior_scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnScaling {
    mean: f64,
    std: f64,
}

impl ColumnScaling {
    const IDENTITY: Self = Self { mean: 0.0, std: 1.0 };

    fn apply(&self, x: f64) -> f64 {
        (x - self.mean) / self.std
    }
}

/// Shared design-matrix layout for training and future rows
#[derive(Debug, Clone)]
struct Design {
    spec: ModelSpec,
    origin: NaiveDate,
    span_days: f64,
    scalings: Vec<ColumnScaling>,
}

impl Design {
    fn width(&self) -> usize {
        2 + self
            .spec
            .seasonalities
            .iter()
            .map(|s| 2 * s.fourier_order)
            .sum::<usize>()
            + self.spec.regressors.len()
    }

    fn penalties(&self, seasonality_prior_scale: f64) -> Vec<f64> {
        let mut out = vec![0.0, 0.0];
        let seasonal = 1.0 / seasonality_prior_scale.powi(2);
        for s in &self.spec.seasonalities {
            out.extend(std::iter::repeat(seasonal).take(2 * s.fourier_order));
        }
        out.extend(self.spec.regressors.iter().map(|r| 1.0 / r.prior_scale.powi(2)));
        out
    }

    fn matrix(
        &self,
        dates: &[NaiveDate],
        regressors: &ColumnTable,
        conditions: &ConditionTable,
    ) -> DMatrix<f64> {
        let width = self.width();
        let mut flat = Vec::with_capacity(dates.len() * width);

        for (row, date) in dates.iter().enumerate() {
            flat.push(1.0);
            flat.push((*date - self.origin).num_days() as f64 / self.span_days);

            let day = date.num_days_from_ce() as f64;
            for s in &self.spec.seasonalities {
                let active = match &s.condition {
                    Some(name) => conditions.get(name).map_or(false, |c| c[row]),
                    None => true,
                };
                let gate = if active { 1.0 } else { 0.0 };
                for k in 1..=s.fourier_order {
                    let angle = 2.0 * PI * k as f64 * day / s.period_days;
                    flat.push(gate * angle.sin());
                    flat.push(gate * angle.cos());
                }
            }

            for (r, scaling) in self.spec.regressors.iter().zip(&self.scalings) {
                let x = regressors.get(&r.name).map_or(0.0, |c| c[row]);
                flat.push(scaling.apply(x));
            }
        }

        DMatrix::from_row_slice(dates.len(), width, &flat)
    }
}

struct HarmonicModel {
    design: Design,
    coefficients: DVector<f64>,
    y_scale: f64,
    sigma: f64,
    z: f64,
}

impl ForecastingEngine for HarmonicRegressionEngine {
    fn fit(&self, frame: &TrainingFrame, spec: &ModelSpec) -> Result<Box<dyn FittedModel>, EngineError> {
        let n = frame.dates.len();
        if n == 0 {
            return Err(EngineError::EmptyTrainingData);
        }
        check_len("y", n, frame.values.len())?;
        if frame.values.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::NonFinite("y".to_string()));
        }
        check_columns(spec, n, &frame.regressors, &frame.conditions)?;

        let origin = frame.dates[0];
        let last = frame.dates[n - 1];
        let span_days = ((last - origin).num_days() as f64).max(1.0);

        let scalings = spec
            .regressors
            .iter()
            .map(|r| match frame.regressors.get(&r.name) {
                Some(column) if r.standardize => scaling_for(column),
                _ => ColumnScaling::IDENTITY,
            })
            .collect();

        let design = Design {
            spec: spec.clone(),
            origin,
            span_days,
            scalings,
        };

        let y_scale = frame
            .values
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        let y_scale = if y_scale > 0.0 { y_scale } else { 1.0 };
        let y = DVector::from_iterator(n, frame.values.iter().map(|v| v / y_scale));

        let x = design.matrix(&frame.dates, &frame.regressors, &frame.conditions);
        let xt = x.transpose();
        let mut normal = &xt * &x;
        for (j, penalty) in design.penalties(self.seasonality_prior_scale).iter().enumerate() {
            normal[(j, j)] += *penalty;
        }
        let rhs = &xt * &y;

        let coefficients = normal
            .cholesky()
            .ok_or_else(|| EngineError::Fit("normal equations are not positive definite".to_string()))?
            .solve(&rhs);

        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(EngineError::Fit("non-finite coefficients".to_string()));
        }

        let residuals = &y - &x * &coefficients;
        let sigma = (residuals.norm_squared() / n as f64).sqrt();

        tracing::debug!(
            rows = n,
            columns = design.width(),
            residual_sigma = sigma * y_scale,
            "harmonic regression fitted"
        );

        Ok(Box::new(HarmonicModel {
            z: z_score(spec.interval_width),
            design,
            coefficients,
            y_scale,
            sigma,
        }))
    }
}

impl FittedModel for HarmonicModel {
    fn predict(&self, future: &FutureFrame) -> Result<Vec<EnginePrediction>, EngineError> {
        let n = future.dates.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        check_columns(&self.design.spec, n, &future.regressors, &future.conditions)?;

        let x = self.design.matrix(&future.dates, &future.regressors, &future.conditions);
        let yhat = &x * &self.coefficients;
        let margin = self.z * self.sigma * self.y_scale;

        Ok(future
            .dates
            .iter()
            .zip(yhat.iter())
            .map(|(date, y)| {
                let point = y * self.y_scale;
                EnginePrediction {
                    date: *date,
                    point,
                    lower: point - margin,
                    upper: point + margin,
                }
            })
            .collect())
    }
}

fn check_len(name: &str, expected: usize, actual: usize) -> Result<(), EngineError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EngineError::ColumnLength {
            name: name.to_string(),
            expected,
            actual,
        })
    }
}

fn check_columns(
    spec: &ModelSpec,
    rows: usize,
    regressors: &ColumnTable,
    conditions: &ConditionTable,
) -> Result<(), EngineError> {
    for r in &spec.regressors {
        let column = regressors
            .get(&r.name)
            .ok_or_else(|| EngineError::MissingColumn(r.name.clone()))?;
        check_len(&r.name, rows, column.len())?;
        if column.iter().any(|v| !v.is_finite()) {
            return Err(EngineError::NonFinite(r.name.clone()));
        }
    }
    for name in spec.seasonalities.iter().filter_map(|s| s.condition.as_ref()) {
        let column = conditions
            .get(name)
            .ok_or_else(|| EngineError::MissingColumn(name.clone()))?;
        check_len(name, rows, column.len())?;
    }
    Ok(())
}

/// Binary and constant columns are left unscaled
fn scaling_for(column: &[f64]) -> ColumnScaling {
    let binary = column.iter().all(|v| *v == 0.0 || *v == 1.0);
    let n = column.len() as f64;
    let mean = column.iter().sum::<f64>() / n;
    let std = (column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    if binary || std <= f64::EPSILON {
        ColumnScaling::IDENTITY
    } else {
        ColumnScaling { mean, std }
    }
}

/// Two-sided normal quantile for common interval widths
fn z_score(interval_width: f64) -> f64 {
    match interval_width {
        c if c >= 0.99 => 2.576,
        c if c >= 0.95 => 1.96,
        c if c >= 0.90 => 1.645,
        c if c >= 0.80 => 1.282,
        _ => 1.0,
    }
}
