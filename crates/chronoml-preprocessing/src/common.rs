use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::Dataset;
use serde::{Deserialize, Serialize};

/// Argument struct of plugins without hyperparameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoParams {}

/// Shape recorded at fit time and checked again on transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FittedShape {
    pub n_features: usize,
    pub n_static: usize,
}

impl FittedShape {
    pub fn of(data: &Dataset) -> Self {
        FittedShape {
            n_features: data.n_features(),
            n_static: data.n_static_features(),
        }
    }

    pub fn check(&self, data: &Dataset) -> Result<()> {
        let got = FittedShape::of(data);
        // an empty dataset has no features to compare
        if !data.is_empty() && got != *self {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![self.n_features, self.n_static],
                got: vec![got.n_features, got.n_static],
            });
        }
        Ok(())
    }
}

/// Observed (non-NaN) values of each temporal feature across all series.
pub(crate) fn temporal_columns(data: &Dataset) -> Vec<Vec<f64>> {
    let mut columns = vec![Vec::new(); data.n_features()];
    for series in data.time_series() {
        for row in series.values().rows() {
            for (j, &v) in row.iter().enumerate() {
                if !v.is_nan() {
                    columns[j].push(v);
                }
            }
        }
    }
    columns
}

/// Observed values of each static covariate.
pub(crate) fn static_columns(data: &Dataset) -> Vec<Vec<f64>> {
    let Some(statics) = data.static_features() else {
        return Vec::new();
    };
    let mut columns = vec![Vec::new(); statics.ncols()];
    for row in statics.rows() {
        for (j, &v) in row.iter().enumerate() {
            if !v.is_nan() {
                columns[j].push(v);
            }
        }
    }
    columns
}

/// Apply `f(feature, value)` to every temporal and static entry.
///
/// Static covariates use `g` so callers can keep separate statistics.
pub(crate) fn map_values<F, G>(data: &Dataset, f: F, g: G) -> Result<Dataset>
where
    F: Fn(usize, f64) -> f64,
    G: Fn(usize, f64) -> f64,
{
    let series = data
        .time_series()
        .iter()
        .map(|s| s.with_values(map_tensor(s.values(), &f)))
        .collect::<Result<Vec<_>>>()?;
    let statics = data.static_features().map(|s| map_tensor(s, &g));
    data.with_time_series(series)?.with_static_features(statics)
}

fn map_tensor<F: Fn(usize, f64) -> f64>(t: &Tensor, f: &F) -> Tensor {
    let cols = t.ncols();
    let mut out = t.clone();
    for (i, v) in out.data_mut().iter_mut().enumerate() {
        *v = f(i % cols.max(1), *v);
    }
    out
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
