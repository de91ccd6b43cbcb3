use chronoml_core::{Result, Tensor};
use chronoml_data::Dataset;
use chronoml_plugins::{ensure_fitted, plugin_identity, parse_args, Args, Category, Params, Plugin, PluginSpec, Transformer};

use crate::common::{
    map_values, mean, static_columns, temporal_columns, FittedShape, NoParams,
};

/// Fill gaps along the time axis of every series.
///
/// `forward` propagates the last observation; the other direction then
/// covers the leading (or trailing) gap, and features never observed in a
/// series become 0.
fn fill_series(values: &Tensor, forward: bool) -> Tensor {
    let rows = values.nrows();
    let cols = values.ncols();
    let mut out = values.clone();
    let data = out.data_mut();

    let sweep = |data: &mut [f64], j: usize, rev: bool| {
        let mut last = f64::NAN;
        for k in 0..rows {
            let i = if rev { rows - 1 - k } else { k };
            let v = &mut data[i * cols + j];
            if v.is_nan() {
                *v = last;
            } else {
                last = *v;
            }
        }
    };

    for j in 0..cols {
        sweep(data, j, !forward);
        sweep(data, j, forward);
    }
    for v in data.iter_mut() {
        if v.is_nan() {
            *v = 0.0;
        }
    }
    out
}

fn fill_directional(data: &Dataset, forward: bool) -> Result<Dataset> {
    let series = data
        .time_series()
        .iter()
        .map(|s| s.with_values(fill_series(s.values(), forward)))
        .collect::<Result<Vec<_>>>()?;
    let statics = data
        .static_features()
        .map(|s| s.apply(|v| if v.is_nan() { 0.0 } else { v }));
    data.with_time_series(series)?.with_static_features(statics)
}

// ─── Forward fill ───────────────────────────────────────────────────────────

/// Carry the last observation forward in time.
#[derive(Debug, Clone, Default)]
pub struct FfillImputer {
    params: NoParams,
    fitted: Option<FittedShape>,
}

impl FfillImputer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for FfillImputer {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = Some(FittedShape::of(data));
        Ok(())
    }
}

impl Transformer for FfillImputer {
    fn transform(&self, data: &Dataset) -> Result<Dataset> {
        ensure_fitted(self)?;
        if let Some(shape) = &self.fitted {
            shape.check(data)?;
        }
        fill_directional(data, true)
    }
}

impl PluginSpec for FfillImputer {
    const NAME: &'static str = "ffill";
    const CATEGORY: Category = Category::Imputation;

    fn hyperparameter_space() -> Vec<Params> {
        Vec::new()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Ok(FfillImputer {
            params: parse_args(Self::NAME, args)?,
            fitted: None,
        })
    }
}

// ─── Backward fill ──────────────────────────────────────────────────────────

/// Carry the next observation backward in time.
#[derive(Debug, Clone, Default)]
pub struct BfillImputer {
    params: NoParams,
    fitted: Option<FittedShape>,
}

impl BfillImputer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for BfillImputer {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = Some(FittedShape::of(data));
        Ok(())
    }
}

impl Transformer for BfillImputer {
    fn transform(&self, data: &Dataset) -> Result<Dataset> {
        ensure_fitted(self)?;
        if let Some(shape) = &self.fitted {
            shape.check(data)?;
        }
        fill_directional(data, false)
    }
}

impl PluginSpec for BfillImputer {
    const NAME: &'static str = "bfill";
    const CATEGORY: Category = Category::Imputation;

    fn hyperparameter_space() -> Vec<Params> {
        Vec::new()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Ok(BfillImputer {
            params: parse_args(Self::NAME, args)?,
            fitted: None,
        })
    }
}

// ─── Mean ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct FeatureMeans {
    shape: FittedShape,
    temporal: Vec<f64>,
    statics: Vec<f64>,
}

/// Replace missing values with the per-feature mean seen during fit.
#[derive(Debug, Clone, Default)]
pub struct MeanImputer {
    params: NoParams,
    fitted: Option<FeatureMeans>,
}

impl MeanImputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitted temporal feature means.
    pub fn means(&self) -> Option<&[f64]> {
        self.fitted.as_ref().map(|m| m.temporal.as_slice())
    }
}

impl Plugin for MeanImputer {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        let means = |cols: Vec<Vec<f64>>| -> Vec<f64> {
            cols.iter().map(|c| mean(c).unwrap_or(0.0)).collect()
        };
        self.fitted = Some(FeatureMeans {
            shape: FittedShape::of(data),
            temporal: means(temporal_columns(data)),
            statics: means(static_columns(data)),
        });
        Ok(())
    }
}

impl Transformer for MeanImputer {
    fn transform(&self, data: &Dataset) -> Result<Dataset> {
        ensure_fitted(self)?;
        let Some(fitted) = &self.fitted else {
            return Ok(data.clone());
        };
        fitted.shape.check(data)?;
        map_values(
            data,
            |j, v| if v.is_nan() { fitted.temporal[j] } else { v },
            |j, v| if v.is_nan() { fitted.statics[j] } else { v },
        )
    }
}

impl PluginSpec for MeanImputer {
    const NAME: &'static str = "mean";
    const CATEGORY: Category = Category::Imputation;

    fn hyperparameter_space() -> Vec<Params> {
        Vec::new()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Ok(MeanImputer {
            params: parse_args(Self::NAME, args)?,
            fitted: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoml_core::ChronoError;
    use chronoml_data::TimeSeries;

    fn gappy() -> Dataset {
        let nan = f64::NAN;
        let a = TimeSeries::new(
            vec![0.0, 1.0, 2.0, 3.0],
            Tensor::new(vec![nan, 1.0, 2.0, nan, nan, nan, 5.0, nan], vec![4, 2]).unwrap(),
        )
        .unwrap();
        let b = TimeSeries::new(vec![0.0, 1.0], Tensor::new(vec![3.0, nan, nan, nan], vec![2, 2]).unwrap()).unwrap();
        Dataset::new(vec![a, b])
            .unwrap()
            .with_static(Tensor::from_rows(&[vec![nan], vec![4.0]]).unwrap())
            .unwrap()
    }

    #[test]
    fn test_ffill() {
        let mut imputer = FfillImputer::new();
        let out = imputer.fit_transform(&gappy()).unwrap();
        // feature 0: [NaN, 2, NaN, 5] ; feature 1: [1, NaN, NaN, NaN]
        assert_eq!(out.time_series()[0].values().data(), &[2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 5.0, 1.0]);
        // never-observed feature becomes 0
        assert_eq!(out.time_series()[1].values().data(), &[3.0, 0.0, 3.0, 0.0]);
        assert_eq!(out.static_features().unwrap().data(), &[0.0, 4.0]);
    }

    #[test]
    fn test_bfill() {
        let mut imputer = BfillImputer::new();
        let out = imputer.fit_transform(&gappy()).unwrap();
        assert_eq!(out.time_series()[0].values().data(), &[2.0, 1.0, 2.0, 1.0, 5.0, 1.0, 5.0, 1.0]);
        let seq = TimeSeries::new(vec![0.0, 1.0, 2.0], Tensor::column(&[f64::NAN, 1.0, f64::NAN])).unwrap();
        let data = Dataset::new(vec![seq]).unwrap();
        let out = BfillImputer::new().fit_transform(&data).unwrap();
        assert_eq!(out.time_series()[0].values().data(), &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mean_imputer() {
        let mut imputer = MeanImputer::new();
        let out = imputer.fit_transform(&gappy()).unwrap();
        // feature 0 observed: 2, 5, 3 ; feature 1 observed: 1
        assert_eq!(imputer.means().unwrap(), &[10.0 / 3.0, 1.0]);
        assert_eq!(out.time_series()[1].values().data(), &[3.0, 1.0, 10.0 / 3.0, 1.0]);
        assert_eq!(out.static_features().unwrap().data(), &[4.0, 4.0]);
    }

    #[test]
    fn test_transform_before_fit() {
        let err = FfillImputer::new().transform(&gappy()).unwrap_err();
        assert!(matches!(err, ChronoError::NotFitted(name) if name == "preprocessing.imputation.ffill"));
    }

    #[test]
    fn test_rejects_unknown_args() {
        let err = FfillImputer::from_args(&chronoml_plugins::args! { "limit" => 3 }).unwrap_err();
        assert!(matches!(err, ChronoError::InvalidParameters { .. }));
    }
}
