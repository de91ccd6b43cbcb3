//! Discrete-time survival network in the style of Dynamic-DeepHit.
//!
//! The follow-up window `[0, max training time]` is cut into `n_durations`
//! equal bins and the network outputs a softmax over bins: the probability
//! mass function of the event time. Observed events maximize the mass of
//! their bin; censored subjects maximize the mass at or after theirs.

use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::Dataset;
use chronoml_nn::{softmax, Activation, Mlp};
use chronoml_plugins::{parse_args, plugin_identity, Args, Category, Estimator, Params, Plugin, PluginSpec};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::SummaryEncoder;
use crate::training::{train, HeadConfig};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DeepHitParams {
    pub n_units_hidden: usize,
    pub n_layers_hidden: usize,
    pub nonlin: Activation,
    pub lr: f64,
    pub dropout: f64,
    pub batch_size: usize,
    /// Number of discrete time bins.
    pub n_durations: usize,
    pub n_iter: usize,
    pub random_state: u64,
}

impl Default for DeepHitParams {
    fn default() -> Self {
        DeepHitParams {
            n_units_hidden: 100,
            n_layers_hidden: 2,
            nonlin: Activation::Relu,
            lr: 1e-3,
            dropout: 0.0,
            batch_size: 64,
            n_durations: 10,
            n_iter: 100,
            random_state: 0,
        }
    }
}

/// Equal-width bins over `[0, upper]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TimeGrid {
    width: f64,
    n_bins: usize,
}

impl TimeGrid {
    fn bin(&self, t: f64) -> usize {
        ((t / self.width).floor().max(0.0) as usize).min(self.n_bins - 1)
    }

    fn midpoint(&self, bin: usize) -> f64 {
        (bin as f64 + 0.5) * self.width
    }

    /// Cumulative incidence at `t`, linear within the bin that contains it.
    fn cif(&self, pmf: &[f64], t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let pos = t / self.width;
        if pos >= self.n_bins as f64 {
            return pmf.iter().sum();
        }
        let bin = pos.floor() as usize;
        let before: f64 = pmf[..bin].iter().sum();
        before + pmf[bin] * (pos - bin as f64)
    }
}

#[derive(Debug, Clone)]
struct FittedDeepHit {
    encoder: SummaryEncoder,
    mlp: Mlp,
    grid: TimeGrid,
}

impl FittedDeepHit {
    fn pmf(&self, data: &Dataset) -> Result<Vec<Vec<f64>>> {
        let logits = self.mlp.forward(&self.encoder.transform(data)?)?;
        Ok(logits.rows().map(softmax).collect())
    }
}

/// Survival network over series summaries; supports `predict_risk`.
#[derive(Debug, Clone)]
pub struct DynamicDeepHit {
    params: DeepHitParams,
    fitted: Option<FittedDeepHit>,
}

impl DynamicDeepHit {
    pub fn new(params: DeepHitParams) -> Result<Self> {
        let invalid = |reason: &str| Err(ChronoError::invalid_parameters(Self::NAME, reason));
        if params.n_durations < 2 {
            return invalid("n_durations must be at least 2");
        }
        if params.n_units_hidden == 0 || params.batch_size == 0 || params.n_iter == 0 {
            return invalid("n_units_hidden, batch_size and n_iter must be positive");
        }
        if !(params.lr > 0.0 && params.lr.is_finite()) {
            return invalid("lr must be a positive number");
        }
        if !(0.0..1.0).contains(&params.dropout) {
            return invalid("dropout must lie in [0, 1)");
        }
        Ok(DynamicDeepHit { params, fitted: None })
    }

    pub fn params(&self) -> &DeepHitParams {
        &self.params
    }

    fn head(&self) -> HeadConfig {
        HeadConfig {
            n_units_hidden: self.params.n_units_hidden,
            n_layers_hidden: self.params.n_layers_hidden,
            nonlin: self.params.nonlin,
            dropout: self.params.dropout,
            lr: self.params.lr,
            weight_decay: 0.0,
            batch_size: self.params.batch_size,
            n_iter: self.params.n_iter,
        }
    }

    fn fitted(&self) -> Result<&FittedDeepHit> {
        self.fitted.as_ref().ok_or_else(|| ChronoError::NotFitted(self.fullname()))
    }
}

/// Negative log-likelihood of one subject and its gradient on the logits.
fn survival_loss(p: &[f64], bin: usize, event: bool) -> (f64, Vec<f64>) {
    if event {
        let grad = p
            .iter()
            .enumerate()
            .map(|(j, &pj)| pj - if j == bin { 1.0 } else { 0.0 })
            .collect();
        return (-p[bin].max(1e-12).ln(), grad);
    }
    let tail: f64 = p[bin..].iter().sum::<f64>().max(1e-12);
    let grad = p
        .iter()
        .enumerate()
        .map(|(j, &pj)| if j >= bin { pj - pj / tail } else { pj })
        .collect();
    (-tail.ln(), grad)
}

impl Plugin for DynamicDeepHit {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = None;
        if data.is_empty() {
            return Err(ChronoError::fit(Self::NAME, "cannot fit on an empty dataset"));
        }
        let targets = data
            .event_targets()
            .ok_or_else(|| ChronoError::fit(Self::NAME, "time-to-event requires event targets"))?;
        let upper = targets.times().iter().copied().fold(0.0, f64::max);
        if upper <= 0.0 {
            return Err(ChronoError::fit(Self::NAME, "event times must span a positive range"));
        }
        let grid = TimeGrid {
            width: upper / self.params.n_durations as f64,
            n_bins: self.params.n_durations,
        };
        let bins: Vec<usize> = targets.times().iter().map(|&t| grid.bin(t)).collect();
        let events = targets.events();

        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let encoder = SummaryEncoder::fit(data)?;
        let x = encoder.transform(data)?;
        let config = self.head();
        let mut mlp = config.build(x.ncols(), grid.n_bins, &mut rng);
        let loss = train(&mut mlp, &x, &config, &mut rng, |batch, out| {
            let n = batch.len() as f64;
            let mut total = 0.0;
            let mut grad = Vec::with_capacity(out.numel());
            for (row, &i) in out.rows().zip(batch) {
                let (l, g) = survival_loss(&softmax(row), bins[i], events[i]);
                total += l;
                grad.extend(g.into_iter().map(|v| v / n));
            }
            Ok((total / n, Tensor::new(grad, out.shape().to_vec())?))
        })?;
        debug!(samples = data.len(), bins = grid.n_bins, loss, "fitted dynamic_deephit");
        self.fitted = Some(FittedDeepHit { encoder, mlp, grid });
        Ok(())
    }
}

impl Estimator for DynamicDeepHit {
    /// Expected event time `[n, 1]` under the predicted distribution.
    fn predict(&self, data: &Dataset) -> Result<Tensor> {
        let fitted = self.fitted()?;
        let expected: Vec<f64> = fitted
            .pmf(data)?
            .iter()
            .map(|p| p.iter().enumerate().map(|(j, pj)| pj * fitted.grid.midpoint(j)).sum())
            .collect();
        Ok(Tensor::column(&expected))
    }

    fn predict_risk(&self, data: &Dataset, horizons: &[f64]) -> Result<Tensor> {
        let fitted = self.fitted()?;
        if let Some(h) = horizons.iter().find(|h| !h.is_finite()) {
            return Err(ChronoError::invalid_input(format!("horizon {} is not finite", h)));
        }
        let pmf = fitted.pmf(data)?;
        let flat: Vec<f64> = pmf
            .iter()
            .flat_map(|p| horizons.iter().map(move |&h| fitted.grid.cif(p, h)))
            .collect();
        Tensor::new(flat, vec![data.len(), horizons.len()])
    }
}

impl PluginSpec for DynamicDeepHit {
    const NAME: &'static str = "dynamic_deephit";
    const CATEGORY: Category = Category::TimeToEvent;

    fn hyperparameter_space() -> Vec<Params> {
        vec![
            Params::integer_step("n_units_hidden", 10, 100, 10),
            Params::integer("n_layers_hidden", 1, 4),
            Params::categorical("nonlin", Activation::ALL.iter().map(|a| a.as_str())),
            Params::categorical("lr", [1e-3, 5e-3, 1e-2]),
            Params::float("dropout", 0.0, 0.2),
            Params::categorical("batch_size", [32, 64, 128]),
            Params::integer_step("n_durations", 5, 50, 5),
        ]
    }

    fn from_args(args: &Args) -> Result<Self> {
        Self::new(parse_args(Self::NAME, args)?)
    }
}
