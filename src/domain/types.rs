use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single dated sales observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl Observation {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// Ordered, de-duplicated, finite-valued sequence of observations.
///
/// Construction goes through [`Series::from_observations`], which sorts by
/// date (stable), drops non-finite values and keeps the first observation
/// seen for any repeated date.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    observations: Vec<Observation>,
}

impl Series {
    pub fn from_observations(observations: impl IntoIterator<Item = Observation>) -> Self {
        let (series, _) = Self::from_indexed(observations.into_iter().enumerate());
        series
    }

    /// Build a series while tracking which input position each surviving
    /// observation came from.
    pub(crate) fn from_indexed(
        rows: impl IntoIterator<Item = (usize, Observation)>,
    ) -> (Self, Vec<usize>) {
        let mut rows: Vec<(usize, Observation)> = rows
            .into_iter()
            .filter(|(_, o)| o.value.is_finite())
            .collect();
        rows.sort_by_key(|(_, o)| o.date);
        rows.dedup_by_key(|(_, o)| o.date);

        let (kept, observations) = rows.into_iter().unzip();
        (Self { observations }, kept)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    /// Consecutive calendar days following the last observation
    pub fn future_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        match self.last_date() {
            Some(last) => (1..=horizon as i64)
                .map(|i| last + Duration::days(i))
                .collect(),
            None => Vec::new(),
        }
    }
}
