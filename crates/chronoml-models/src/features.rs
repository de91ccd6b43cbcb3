//! Fixed-width summaries of irregular, gappy time series.

use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::{Dataset, TimeSeries};

/// Summary statistics computed per temporal feature.
const PER_FEATURE: usize = 6;
/// Sequence length and observed time span.
const PER_SERIES: usize = 2;

/// Column-wise standardization fitted on training rows.
#[derive(Debug, Clone)]
pub struct Standardizer {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Standardizer {
    pub fn fit(x: &Tensor) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(ChronoError::invalid_input("cannot standardize zero rows"));
        }
        let n = x.nrows() as f64;
        let mut mean = vec![0.0; x.ncols()];
        let mut std = vec![0.0; x.ncols()];
        for j in 0..x.ncols() {
            let col = x.column_values(j)?;
            let m = col.iter().sum::<f64>() / n;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
            mean[j] = m;
            std[j] = if var.sqrt() < 1e-12 { 1.0 } else { var.sqrt() };
        }
        Ok(Standardizer { mean, std })
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Tensor) -> Result<Tensor> {
        if x.ncols() != self.width() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![x.nrows(), self.width()],
                got: x.shape().to_vec(),
            });
        }
        let cols = self.width();
        let mut out = x.clone();
        for (i, v) in out.data_mut().iter_mut().enumerate() {
            let j = i % cols;
            *v = (*v - self.mean[j]) / self.std[j];
        }
        Ok(out)
    }

    /// Map standardized values back to the original scale.
    pub fn inverse(&self, x: &Tensor) -> Result<Tensor> {
        if x.ncols() != self.width() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![x.nrows(), self.width()],
                got: x.shape().to_vec(),
            });
        }
        let cols = self.width();
        let mut out = x.clone();
        for (i, v) in out.data_mut().iter_mut().enumerate() {
            let j = i % cols;
            *v = *v * self.std[j] + self.mean[j];
        }
        Ok(out)
    }
}

/// Last value, mean, std, min, max and least-squares slope of the observed
/// points of one feature. Features never observed summarize to zeros.
fn summarize(points: &[(f64, f64)]) -> [f64; PER_FEATURE] {
    let Some(&(_, last)) = points.last() else {
        return [0.0; PER_FEATURE];
    };
    let n = points.len() as f64;
    let mean = points.iter().map(|p| p.1).sum::<f64>() / n;
    let var = points.iter().map(|p| (p.1 - mean).powi(2)).sum::<f64>() / n;
    let min = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let t_mean = points.iter().map(|p| p.0).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - t_mean).powi(2)).sum();
    let sxy: f64 = points.iter().map(|p| (p.0 - t_mean) * (p.1 - mean)).sum();
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    [last, mean, var.sqrt(), min, max, slope]
}

fn series_row(series: &TimeSeries, statics: Option<&[f64]>, out: &mut Vec<f64>) {
    for j in 0..series.n_features() {
        out.extend_from_slice(&summarize(&series.observed(j)));
    }
    let times = series.times();
    out.push(times.len() as f64);
    out.push(times[times.len() - 1] - times[0]);
    if let Some(row) = statics {
        out.extend(row.iter().map(|v| if v.is_nan() { 0.0 } else { *v }));
    }
}

/// Summary features `[n_samples, width]` of every series plus its static
/// covariates (missing statics read as 0).
pub fn summary_features(data: &Dataset) -> Result<Tensor> {
    let width = data.n_features() * PER_FEATURE + PER_SERIES + data.n_static_features();
    let mut flat = Vec::with_capacity(data.len() * width);
    for (i, series) in data.time_series().iter().enumerate() {
        let statics = data.static_features().map(|s| s.row(i)).transpose()?;
        series_row(series, statics, &mut flat);
    }
    Tensor::new(flat, vec![data.len(), width])
}

/// Summary features followed by standardization fitted on training data.
#[derive(Debug, Clone)]
pub struct SummaryEncoder {
    n_features: usize,
    n_static: usize,
    scaler: Standardizer,
}

impl SummaryEncoder {
    pub fn fit(data: &Dataset) -> Result<Self> {
        let raw = summary_features(data)?;
        Ok(SummaryEncoder {
            n_features: data.n_features(),
            n_static: data.n_static_features(),
            scaler: Standardizer::fit(&raw)?,
        })
    }

    pub fn width(&self) -> usize {
        self.scaler.width()
    }

    pub fn transform(&self, data: &Dataset) -> Result<Tensor> {
        if data.n_features() != self.n_features || data.n_static_features() != self.n_static {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![self.n_features, self.n_static],
                got: vec![data.n_features(), data.n_static_features()],
            });
        }
        self.scaler.transform(&summary_features(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_summarize_line() {
        let s = summarize(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]);
        assert_eq!(s[0], 5.0);
        assert_abs_diff_eq!(s[1], 3.0);
        assert_eq!(s[3], 1.0);
        assert_eq!(s[4], 5.0);
        assert_abs_diff_eq!(s[5], 2.0);
    }

    #[test]
    fn test_summary_handles_missing() {
        let series = TimeSeries::new(
            vec![0.0, 2.0],
            Tensor::new(vec![f64::NAN, 1.0, f64::NAN, 2.0], vec![2, 2]).unwrap(),
        )
        .unwrap();
        let data = Dataset::new(vec![series]).unwrap();
        let x = summary_features(&data).unwrap();
        assert_eq!(x.shape(), &[1, 2 * PER_FEATURE + PER_SERIES]);
        assert!(!x.has_nan());
        // unobserved feature is all zeros
        assert!(x.data()[..PER_FEATURE].iter().all(|&v| v == 0.0));
        // span
        assert_eq!(x.data()[2 * PER_FEATURE + 1], 2.0);
    }

    #[test]
    fn test_standardizer_roundtrip_and_constant_column() {
        let x = Tensor::from_rows(&[vec![1.0, 7.0], vec![3.0, 7.0]]).unwrap();
        let s = Standardizer::fit(&x).unwrap();
        let z = s.transform(&x).unwrap();
        assert_eq!(z.data(), &[-1.0, 0.0, 1.0, 0.0]);
        assert_eq!(s.inverse(&z).unwrap(), x);
    }
}
