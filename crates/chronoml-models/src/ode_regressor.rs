//! Regression from a latent state evolved by an ODE driven by the
//! interpolated input path.

use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::{Dataset, TimeSeries};
use chronoml_nn::{Activation, ControlPath, Interpolation, OdeSolver};
use chronoml_plugins::{parse_args, plugin_identity, Args, Category, Estimator, Params, Plugin, PluginSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::{summary_features, Standardizer};
use crate::training::{regression_targets, HeadConfig, RegressionHead};

/// Size of the latent state integrated along each series.
const LATENT_DIM: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct OdeParams {
    pub n_units_hidden: usize,
    pub n_layers_hidden: usize,
    pub batch_size: usize,
    pub lr: f64,
    pub dropout: f64,
    pub nonlin: Activation,
    pub atol: f64,
    pub rtol: f64,
    pub interpolation: Interpolation,
    pub n_iter: usize,
    pub random_state: u64,
}

impl Default for OdeParams {
    fn default() -> Self {
        OdeParams {
            n_units_hidden: 100,
            n_layers_hidden: 1,
            batch_size: 64,
            lr: 1e-3,
            dropout: 0.0,
            nonlin: Activation::Relu,
            atol: 1e-2,
            rtol: 1e-2,
            interpolation: Interpolation::Cubic,
            n_iter: 100,
            random_state: 0,
        }
    }
}

impl OdeParams {
    fn validate(&self) -> Result<()> {
        let fail = |reason: &str| Err(ChronoError::invalid_parameters(OdeRegressor::NAME, reason));
        if self.n_units_hidden == 0 {
            return fail("n_units_hidden must be positive");
        }
        if self.batch_size == 0 || self.n_iter == 0 {
            return fail("batch_size and n_iter must be positive");
        }
        if !(self.lr > 0.0 && self.lr.is_finite()) {
            return fail("lr must be a positive number");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return fail("dropout must lie in [0, 1)");
        }
        if !(self.atol > 0.0 && self.rtol > 0.0) {
            return fail("atol and rtol must be positive");
        }
        Ok(())
    }

    fn head(&self) -> HeadConfig {
        HeadConfig {
            n_units_hidden: self.n_units_hidden,
            n_layers_hidden: self.n_layers_hidden,
            nonlin: self.nonlin,
            dropout: self.dropout,
            lr: self.lr,
            weight_decay: 0.0,
            batch_size: self.batch_size,
            n_iter: self.n_iter,
        }
    }
}

// ─── Latent dynamics ────────────────────────────────────────────────────────

/// `dz/dt = tanh(A z + B x(t) + C x'(t) + c) - z`, with `x` the control path.
#[derive(Debug, Clone)]
struct LatentField {
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    bias: Vec<f64>,
    n_inputs: usize,
}

impl LatentField {
    fn random(n_inputs: usize, rng: &mut StdRng) -> Self {
        let mut draw = |len: usize, fan_in: usize| -> Vec<f64> {
            let bound = 1.0 / (fan_in.max(1) as f64).sqrt();
            (0..len).map(|_| rng.gen_range(-bound..bound)).collect()
        };
        LatentField {
            a: draw(LATENT_DIM * LATENT_DIM, LATENT_DIM),
            b: draw(LATENT_DIM * n_inputs, n_inputs),
            c: draw(LATENT_DIM * n_inputs, n_inputs),
            bias: draw(LATENT_DIM, LATENT_DIM),
            n_inputs,
        }
    }

    fn rate(&self, z: &[f64], x: &[f64], dx: &[f64]) -> Vec<f64> {
        (0..LATENT_DIM)
            .map(|i| {
                let mut s = self.bias[i];
                for (j, zj) in z.iter().enumerate() {
                    s += self.a[i * LATENT_DIM + j] * zj;
                }
                for j in 0..self.n_inputs {
                    s += self.b[i * self.n_inputs + j] * x[j] + self.c[i * self.n_inputs + j] * dx[j];
                }
                s.tanh() - z[i]
            })
            .collect()
    }
}

/// Standardize a series with the fitted per-feature statistics and close
/// its gaps: last observation carried forward, then next observation
/// backward, then the feature mean (0).
fn filled_knots(series: &TimeSeries, stats: &[(f64, f64)]) -> Vec<Vec<f64>> {
    let mut knots: Vec<Vec<f64>> = series
        .values()
        .rows()
        .map(|row| {
            row.iter()
                .zip(stats)
                .map(|(v, (m, s))| (v - m) / s)
                .collect()
        })
        .collect();
    for j in 0..stats.len() {
        let mut last = f64::NAN;
        for row in knots.iter_mut() {
            if row[j].is_nan() {
                row[j] = last;
            } else {
                last = row[j];
            }
        }
        last = f64::NAN;
        for row in knots.iter_mut().rev() {
            if row[j].is_nan() {
                row[j] = last;
            } else {
                last = row[j];
            }
        }
        for row in knots.iter_mut() {
            if row[j].is_nan() {
                row[j] = 0.0;
            }
        }
    }
    knots
}

fn feature_stats(data: &Dataset) -> Vec<(f64, f64)> {
    (0..data.n_features())
        .map(|j| {
            let observed: Vec<f64> = data
                .time_series()
                .iter()
                .flat_map(|s| s.observed(j).into_iter().map(|p| p.1))
                .collect();
            if observed.is_empty() {
                return (0.0, 1.0);
            }
            let n = observed.len() as f64;
            let m = observed.iter().sum::<f64>() / n;
            let sd = (observed.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n).sqrt();
            (m, if sd < 1e-12 { 1.0 } else { sd })
        })
        .collect()
}

#[derive(Debug, Clone)]
struct FittedOde {
    n_features: usize,
    n_static: usize,
    stats: Vec<(f64, f64)>,
    field: LatentField,
    scaler: Standardizer,
    head: RegressionHead,
}

/// Latent ODE regressor.
///
/// Each series is interpolated into a continuous control path (cubic or
/// linear), a latent state is integrated along it with an adaptive solver
/// (`atol`, `rtol`), and the final state together with summary features of
/// the series feeds a dense regression head.
#[derive(Debug, Clone)]
pub struct OdeRegressor {
    params: OdeParams,
    fitted: Option<FittedOde>,
}

impl OdeRegressor {
    pub fn new(params: OdeParams) -> Result<Self> {
        params.validate()?;
        Ok(OdeRegressor { params, fitted: None })
    }

    pub fn params(&self) -> &OdeParams {
        &self.params
    }

    fn solver(&self) -> OdeSolver {
        OdeSolver::new(self.params.atol, self.params.rtol)
    }

    fn embed(&self, data: &Dataset, stats: &[(f64, f64)], field: &LatentField) -> Result<Tensor> {
        let solver = self.solver();
        let summary = summary_features(data)?;
        let width = LATENT_DIM + summary.ncols();
        let mut flat = Vec::with_capacity(data.len() * width);
        for (series, extra) in data.time_series().iter().zip(summary.rows()) {
            let path = ControlPath::new(
                series.times().to_vec(),
                filled_knots(series, stats),
                self.params.interpolation,
            )?;
            let z = solver.integrate(
                |t, z| field.rate(z, &path.evaluate(t), &path.derivative(t)),
                &[0.0; LATENT_DIM],
                path.start(),
                path.end(),
            )?;
            flat.extend(z);
            flat.extend_from_slice(extra);
        }
        Tensor::new(flat, vec![data.len(), width])
    }
}

impl Plugin for OdeRegressor {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = None;
        if data.is_empty() {
            return Err(ChronoError::fit(Self::NAME, "cannot fit on an empty dataset"));
        }
        let targets = data
            .static_targets()
            .ok_or_else(|| ChronoError::fit(Self::NAME, "regression requires static targets"))?;
        let y = regression_targets(Self::NAME, targets)?;

        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let stats = feature_stats(data);
        let field = LatentField::random(data.n_features(), &mut rng);
        let raw = self.embed(data, &stats, &field)?;
        let scaler = Standardizer::fit(&raw)?;
        let head = RegressionHead::fit(&scaler.transform(&raw)?, &y, &self.params.head(), &mut rng)?;
        debug!(
            samples = data.len(),
            interpolation = %self.params.interpolation,
            "fitted ode_regressor"
        );
        self.fitted = Some(FittedOde {
            n_features: data.n_features(),
            n_static: data.n_static_features(),
            stats,
            field,
            scaler,
            head,
        });
        Ok(())
    }
}

impl Estimator for OdeRegressor {
    fn predict(&self, data: &Dataset) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or_else(|| ChronoError::NotFitted(self.fullname()))?;
        if data.n_features() != fitted.n_features || data.n_static_features() != fitted.n_static {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![fitted.n_features, fitted.n_static],
                got: vec![data.n_features(), data.n_static_features()],
            });
        }
        let raw = self.embed(data, &fitted.stats, &fitted.field)?;
        fitted.head.predict(&fitted.scaler.transform(&raw)?)
    }
}

impl PluginSpec for OdeRegressor {
    const NAME: &'static str = "ode_regressor";
    const CATEGORY: Category = Category::Regression;

    fn hyperparameter_space() -> Vec<Params> {
        vec![
            Params::integer_step("n_units_hidden", 10, 100, 10),
            Params::integer("n_layers_hidden", 1, 4),
            Params::categorical("batch_size", [64, 128, 256, 512]),
            Params::categorical("lr", [1e-3, 1e-4, 2e-4]),
            Params::float("dropout", 0.0, 0.2),
            Params::categorical("nonlin", Activation::ALL.iter().map(|a| a.as_str())),
            Params::categorical("atol", [1e-4, 1e-3, 1e-2]),
            Params::categorical("rtol", [1e-4, 1e-3, 1e-2]),
            Params::categorical("interpolation", ["cubic", "linear"]),
        ]
    }

    fn from_args(args: &Args) -> Result<Self> {
        Self::new(parse_args(Self::NAME, args)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoml_plugins::args;

    fn tiny() -> Dataset {
        let nan = f64::NAN;
        let a = TimeSeries::new(vec![0.0, 1.0, 2.0], Tensor::column(&[nan, 1.0, 3.0])).unwrap();
        let b = TimeSeries::new(vec![0.0, 0.5], Tensor::column(&[2.0, nan])).unwrap();
        Dataset::new(vec![a, b])
            .unwrap()
            .with_targets(chronoml_data::Targets::Static(Tensor::column(&[1.0, 2.0])))
            .unwrap()
    }

    #[test]
    fn test_space_has_nine_entries() {
        let names: Vec<String> = <OdeRegressor as PluginSpec>::hyperparameter_space()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names.len(), 9);
        assert!(names.contains(&"interpolation".to_string()));
        assert!(names.contains(&"atol".to_string()));
    }

    #[test]
    fn test_filled_knots() {
        let data = tiny();
        let knots = filled_knots(&data.time_series()[0], &[(1.0, 2.0)]);
        assert_eq!(knots, vec![vec![0.0], vec![0.0], vec![1.0]]);
    }

    #[test]
    fn test_fit_predict_both_interpolations() {
        for scheme in ["cubic", "linear"] {
            let mut model =
                OdeRegressor::from_args(&args! { "n_iter" => 5, "interpolation" => scheme }).unwrap();
            model.fit(&tiny()).unwrap();
            let pred = model.predict(&tiny()).unwrap();
            assert_eq!(pred.shape(), &[2, 1]);
            assert!(!pred.has_nan());
        }
    }

    #[test]
    fn test_rejects_bad_tolerance() {
        let err = OdeRegressor::from_args(&args! { "atol" => 0.0 }).unwrap_err();
        assert!(matches!(err, ChronoError::InvalidParameters { .. }));
        let err = OdeRegressor::from_args(&args! { "interpolation" => "spline" }).unwrap_err();
        assert!(matches!(err, ChronoError::InvalidParameters { .. }));
    }

    #[test]
    fn test_predict_checks_width() {
        let mut model = OdeRegressor::from_args(&args! { "n_iter" => 2 }).unwrap();
        model.fit(&tiny()).unwrap();
        let wide = Dataset::new(vec![TimeSeries::new(vec![0.0], Tensor::zeros(1, 2)).unwrap()]).unwrap();
        assert!(matches!(model.predict(&wide), Err(ChronoError::ShapeMismatch { .. })));
    }
}
