//! Data quality scoring
//!
//! Composite 0-100 fitness of a series for forecasting. Starts at 100 and is
//! penalised for missing cells, short history, zero variance, IQR outliers and
//! stale data; fresh data earns a small bonus.

use chrono::NaiveDate;

use super::stats::quantile;
use crate::domain::Series;

const MISSING_WEIGHT: f64 = 30.0;
const SHORT_HISTORY_POINTS: usize = 30;
const SHORT_HISTORY_PENALTY_PER_POINT: f64 = 2.0;
const ZERO_VARIANCE_PENALTY: f64 = 40.0;
const OUTLIER_WEIGHT: f64 = 20.0;
const IQR_FENCE: f64 = 1.5;
const FRESH_DAYS: i64 = 7;
const FRESH_BONUS: f64 = 5.0;
const STALE_DAYS: i64 = 30;
const MAX_STALE_PENALTY: f64 = 10.0;

pub fn data_quality_score(series: &Series, missing_ratio: f64, today: NaiveDate) -> f64 {
    let Some(last_date) = series.last_date() else {
        return 0.0;
    };
    let values = series.values();
    let n = values.len();

    let mut score = 100.0;

    score -= missing_ratio.clamp(0.0, 1.0) * MISSING_WEIGHT;

    if n < SHORT_HISTORY_POINTS {
        score -= (SHORT_HISTORY_POINTS - n) as f64 * SHORT_HISTORY_PENALTY_PER_POINT;
    }

    if has_zero_variance(&values) {
        score -= ZERO_VARIANCE_PENALTY;
    }

    score -= outlier_ratio(&values) * OUTLIER_WEIGHT;

    let days_since_last = (today - last_date).num_days();
    if days_since_last <= FRESH_DAYS {
        score += FRESH_BONUS;
    } else if days_since_last > STALE_DAYS {
        score -= (days_since_last as f64 / 10.0).min(MAX_STALE_PENALTY);
    }

    score.clamp(0.0, 100.0)
}

fn has_zero_variance(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

/// Share of values outside the 1.5 IQR fences
fn outlier_ratio(values: &[f64]) -> f64 {
    let (Some(q1), Some(q3)) = (quantile(values, 0.25), quantile(values, 0.75)) else {
        return 0.0;
    };
    let iqr = q3 - q1;
    let lower = q1 - IQR_FENCE * iqr;
    let upper = q3 + IQR_FENCE * iqr;

    let outliers = values.iter().filter(|v| **v < lower || **v > upper).count();
    outliers as f64 / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;
    use chrono::Duration;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    /// Daily series whose last observation is `age_days` before `today()`
    fn series_ending(values: &[f64], age_days: i64) -> Series {
        let last = today() - Duration::days(age_days);
        let start = last - Duration::days(values.len() as i64 - 1);
        Series::from_observations(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| Observation::new(start + Duration::days(i as i64), *v)),
        )
    }

    #[test]
    fn test_empty_series_scores_zero() {
        assert_eq!(data_quality_score(&Series::default(), 0.0, today()), 0.0);
    }

    #[test]
    fn test_zero_variance_fresh_series() {
        let series = series_ending(&[5.0; 40], 0);
        assert_eq!(data_quality_score(&series, 0.0, today()), 65.0);
    }

    #[test]
    fn test_short_constant_series_stacks_penalties() {
        // 100 - 40 (20 missing points * 2) - 40 (zero variance) + 5 (fresh)
        let series = series_ending(&[5.0; 10], 1);
        assert_eq!(data_quality_score(&series, 0.0, today()), 25.0);
    }

    #[test]
    fn test_missing_ratio_penalty() {
        let values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 5) as f64).collect();
        let series = series_ending(&values, 15);
        assert_eq!(data_quality_score(&series, 0.5, today()), 85.0);
    }

    #[test]
    fn test_outliers_penalised() {
        let mut values = vec![10.0; 30];
        values.push(1000.0);
        let series = series_ending(&values, 15);
        let expected = 100.0 - 20.0 / 31.0;
        assert!((data_quality_score(&series, 0.0, today()) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_stale_data_penalty_is_capped() {
        let values: Vec<f64> = (0..40).map(|i| 10.0 + (i % 5) as f64).collect();
        assert_eq!(data_quality_score(&series_ending(&values, 50), 0.0, today()), 95.0);
        assert_eq!(data_quality_score(&series_ending(&values, 400), 0.0, today()), 90.0);
    }

    proptest! {
        #[test]
        fn prop_score_within_bounds(
            values in prop::collection::vec(-1e6f64..1e6, 1..120),
            missing in 0.0f64..=1.0,
            age in -10i64..2000,
        ) {
            let score = data_quality_score(&series_ending(&values, age), missing, today());
            prop_assert!((0.0..=100.0).contains(&score));
        }
    }
}
