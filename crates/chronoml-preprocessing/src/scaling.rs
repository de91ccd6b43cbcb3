use chronoml_core::Result;
use chronoml_data::Dataset;
use chronoml_plugins::{ensure_fitted, plugin_identity, parse_args, Args, Category, Params, Plugin, PluginSpec, Transformer};

use crate::common::{map_values, mean, static_columns, temporal_columns, FittedShape, NoParams};

/// Per-feature affine map `x -> (x - offset) / scale`.
#[derive(Debug, Clone)]
struct Affine {
    shape: FittedShape,
    temporal: Vec<(f64, f64)>,
    statics: Vec<(f64, f64)>,
}

impl Affine {
    fn apply(&self, data: &Dataset) -> Result<Dataset> {
        self.shape.check(data)?;
        map_values(
            data,
            |j, v| (v - self.temporal[j].0) / self.temporal[j].1,
            |j, v| (v - self.statics[j].0) / self.statics[j].1,
        )
    }
}

fn safe_scale(s: f64) -> f64 {
    if s.abs() < f64::EPSILON || !s.is_finite() {
        1.0
    } else {
        s
    }
}

// ─── Standard scaler ────────────────────────────────────────────────────────

/// Standardize every temporal feature (pooled over all steps of all series)
/// and every static covariate to zero mean and unit variance.
///
/// Missing values stay missing.
#[derive(Debug, Clone, Default)]
pub struct TsStandardScaler {
    params: NoParams,
    fitted: Option<Affine>,
}

impl TsStandardScaler {
    pub fn new() -> Self {
        Self::default()
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let Some(m) = mean(values) else {
        return (0.0, 1.0);
    };
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    (m, safe_scale(var.sqrt()))
}

impl Plugin for TsStandardScaler {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = Some(Affine {
            shape: FittedShape::of(data),
            temporal: temporal_columns(data).iter().map(|c| mean_std(c)).collect(),
            statics: static_columns(data).iter().map(|c| mean_std(c)).collect(),
        });
        Ok(())
    }
}

impl Transformer for TsStandardScaler {
    fn transform(&self, data: &Dataset) -> Result<Dataset> {
        ensure_fitted(self)?;
        match &self.fitted {
            Some(affine) => affine.apply(data),
            None => Ok(data.clone()),
        }
    }
}

impl PluginSpec for TsStandardScaler {
    const NAME: &'static str = "ts_standard_scaler";
    const CATEGORY: Category = Category::Scaling;

    fn hyperparameter_space() -> Vec<Params> {
        Vec::new()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Ok(TsStandardScaler {
            params: parse_args(Self::NAME, args)?,
            fitted: None,
        })
    }
}

// ─── Min-max scaler ─────────────────────────────────────────────────────────

/// Scale every temporal feature and static covariate to `[0, 1]` using the
/// range seen during fit.
#[derive(Debug, Clone, Default)]
pub struct TsMinMaxScaler {
    params: NoParams,
    fitted: Option<Affine>,
}

impl TsMinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }
}

fn min_range(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    (min, safe_scale(max - min))
}

impl Plugin for TsMinMaxScaler {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = Some(Affine {
            shape: FittedShape::of(data),
            temporal: temporal_columns(data).iter().map(|c| min_range(c)).collect(),
            statics: static_columns(data).iter().map(|c| min_range(c)).collect(),
        });
        Ok(())
    }
}

impl Transformer for TsMinMaxScaler {
    fn transform(&self, data: &Dataset) -> Result<Dataset> {
        ensure_fitted(self)?;
        match &self.fitted {
            Some(affine) => affine.apply(data),
            None => Ok(data.clone()),
        }
    }
}

impl PluginSpec for TsMinMaxScaler {
    const NAME: &'static str = "ts_minmax_scaler";
    const CATEGORY: Category = Category::Scaling;

    fn hyperparameter_space() -> Vec<Params> {
        Vec::new()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Ok(TsMinMaxScaler {
            params: parse_args(Self::NAME, args)?,
            fitted: None,
        })
    }
}
