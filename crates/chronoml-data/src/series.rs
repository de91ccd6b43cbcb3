use chronoml_core::{ChronoError, Result, Tensor};
use serde::{Deserialize, Serialize};

/// One subject's sequence of observations.
///
/// `values` has shape `[n_steps, n_features]`; missing entries are `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTimeSeries")]
pub struct TimeSeries {
    times: Vec<f64>,
    values: Tensor,
}

#[derive(Deserialize)]
struct RawTimeSeries {
    times: Vec<f64>,
    values: Tensor,
}

impl TryFrom<RawTimeSeries> for TimeSeries {
    type Error = ChronoError;

    fn try_from(raw: RawTimeSeries) -> Result<Self> {
        TimeSeries::new(raw.times, raw.values)
    }
}

impl TimeSeries {
    pub fn new(times: Vec<f64>, values: Tensor) -> Result<Self> {
        if times.is_empty() {
            return Err(ChronoError::invalid_input("time series needs at least one step"));
        }
        if values.ndim() != 2 || values.nrows() != times.len() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![times.len(), values.ncols()],
                got: values.shape().to_vec(),
            });
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(ChronoError::invalid_input("observation times must be finite"));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ChronoError::invalid_input(
                "observation times must be strictly increasing",
            ));
        }
        Ok(TimeSeries { times, values })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &Tensor {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Same observation times, new values.
    pub fn with_values(&self, values: Tensor) -> Result<Self> {
        TimeSeries::new(self.times.clone(), values)
    }

    /// Observed (non-NaN) `(time, value)` pairs of one feature.
    pub fn observed(&self, feature: usize) -> Vec<(f64, f64)> {
        self.times
            .iter()
            .zip(self.values.rows())
            .filter_map(|(&t, row)| row.get(feature).filter(|v| !v.is_nan()).map(|&v| (t, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsorted_times() {
        let values = Tensor::zeros(3, 1);
        assert!(TimeSeries::new(vec![0.0, 2.0, 1.0], values.clone()).is_err());
        assert!(TimeSeries::new(vec![0.0, 1.0, 2.0], values).is_ok());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert!(TimeSeries::new(vec![0.0, 1.0], Tensor::zeros(3, 2)).is_err());
        assert!(TimeSeries::new(vec![], Tensor::zeros(0, 2)).is_err());
    }

    #[test]
    fn test_observed_skips_missing() {
        let values = Tensor::from_rows(&[vec![1.0], vec![f64::NAN], vec![3.0]]).unwrap();
        let ts = TimeSeries::new(vec![0.0, 1.0, 2.0], values).unwrap();
        assert_eq!(ts.observed(0), vec![(0.0, 1.0), (2.0, 3.0)]);
    }
}
