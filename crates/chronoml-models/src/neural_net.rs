//! Feed-forward networks over per-series summary features.

use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::Dataset;
use chronoml_nn::Activation;
use chronoml_plugins::{
    parse_args, plugin_identity, Args, Category, Estimator, Params, Plugin,
    PluginSpec,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::features::SummaryEncoder;
use crate::training::{class_labels, regression_targets, ClassificationHead, HeadConfig, RegressionHead};

/// Hyperparameters shared by [`NeuralNetClassifier`] and [`NeuralNetRegressor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NeuralNetParams {
    pub n_units_hidden: usize,
    pub n_layers_hidden: usize,
    pub nonlin: Activation,
    pub lr: f64,
    pub dropout: f64,
    pub batch_size: usize,
    pub weight_decay: f64,
    /// Training epochs.
    pub n_iter: usize,
    pub random_state: u64,
}

impl Default for NeuralNetParams {
    fn default() -> Self {
        NeuralNetParams {
            n_units_hidden: 100,
            n_layers_hidden: 2,
            nonlin: Activation::Relu,
            lr: 1e-3,
            dropout: 0.0,
            batch_size: 64,
            weight_decay: 1e-4,
            n_iter: 100,
            random_state: 0,
        }
    }
}

impl NeuralNetParams {
    fn space() -> Vec<Params> {
        vec![
            Params::integer_step("n_units_hidden", 10, 100, 10),
            Params::integer("n_layers_hidden", 1, 4),
            Params::categorical("nonlin", Activation::ALL.iter().map(|a| a.as_str())),
            Params::categorical("lr", [1e-3, 5e-3, 1e-2]),
            Params::float("dropout", 0.0, 0.2),
            Params::categorical("batch_size", [32, 64, 128]),
            Params::categorical("weight_decay", [1e-4, 1e-3, 1e-2]),
        ]
    }

    pub(crate) fn validate(&self, plugin: &str) -> Result<()> {
        let problem = if self.n_units_hidden == 0 {
            Some("n_units_hidden must be positive")
        } else if !(self.lr > 0.0 && self.lr.is_finite()) {
            Some("lr must be a positive number")
        } else if !(0.0..1.0).contains(&self.dropout) {
            Some("dropout must lie in [0, 1)")
        } else if self.batch_size == 0 {
            Some("batch_size must be positive")
        } else if self.n_iter == 0 {
            Some("n_iter must be positive")
        } else if self.weight_decay < 0.0 || self.weight_decay.is_nan() {
            Some("weight_decay must be non-negative")
        } else {
            None
        };
        match problem {
            Some(reason) => Err(ChronoError::invalid_parameters(plugin, reason)),
            None => Ok(()),
        }
    }

    pub(crate) fn head(&self) -> HeadConfig {
        HeadConfig {
            n_units_hidden: self.n_units_hidden,
            n_layers_hidden: self.n_layers_hidden,
            nonlin: self.nonlin,
            dropout: self.dropout,
            lr: self.lr,
            weight_decay: self.weight_decay,
            batch_size: self.batch_size,
            n_iter: self.n_iter,
        }
    }
}

fn require_rows(plugin: &str, data: &Dataset) -> Result<()> {
    if data.is_empty() {
        Err(ChronoError::fit(plugin, "cannot fit on an empty dataset"))
    } else {
        Ok(())
    }
}

// ─── Classifier ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct FittedClassifier {
    encoder: SummaryEncoder,
    head: ClassificationHead,
}

/// Softmax network over series summaries. Labels are the class indices in
/// the single static target column.
#[derive(Debug, Clone)]
pub struct NeuralNetClassifier {
    params: NeuralNetParams,
    fitted: Option<FittedClassifier>,
}

impl NeuralNetClassifier {
    pub fn new(params: NeuralNetParams) -> Result<Self> {
        params.validate(Self::NAME)?;
        Ok(NeuralNetClassifier { params, fitted: None })
    }

    pub fn params(&self) -> &NeuralNetParams {
        &self.params
    }

    /// Number of classes seen during fit.
    pub fn n_classes(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.head.n_classes())
    }
}

impl Plugin for NeuralNetClassifier {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = None;
        require_rows(Self::NAME, data)?;
        let targets = data
            .static_targets()
            .ok_or_else(|| ChronoError::fit(Self::NAME, "classification requires static targets"))?;
        let labels = class_labels(Self::NAME, targets)?;

        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let encoder = SummaryEncoder::fit(data)?;
        let x = encoder.transform(data)?;
        let head = ClassificationHead::fit(&x, &labels, &self.params.head(), &mut rng)?;
        debug!(samples = data.len(), classes = head.n_classes(), "fitted nn_classifier");
        self.fitted = Some(FittedClassifier { encoder, head });
        Ok(())
    }
}

impl Estimator for NeuralNetClassifier {
    fn predict(&self, data: &Dataset) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or_else(|| ChronoError::NotFitted(self.fullname()))?;
        fitted.head.predict(&fitted.encoder.transform(data)?)
    }

    fn predict_proba(&self, data: &Dataset) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or_else(|| ChronoError::NotFitted(self.fullname()))?;
        fitted.head.predict_proba(&fitted.encoder.transform(data)?)
    }
}

impl PluginSpec for NeuralNetClassifier {
    const NAME: &'static str = "nn_classifier";
    const CATEGORY: Category = Category::Classification;

    fn hyperparameter_space() -> Vec<Params> {
        NeuralNetParams::space()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Self::new(parse_args(Self::NAME, args)?)
    }
}

// ─── Regressor ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct FittedRegressor {
    encoder: SummaryEncoder,
    head: RegressionHead,
}

/// Mean-squared-error network over series summaries; predicts every static
/// target column.
#[derive(Debug, Clone)]
pub struct NeuralNetRegressor {
    params: NeuralNetParams,
    fitted: Option<FittedRegressor>,
}

impl NeuralNetRegressor {
    pub fn new(params: NeuralNetParams) -> Result<Self> {
        params.validate(Self::NAME)?;
        Ok(NeuralNetRegressor { params, fitted: None })
    }

    pub fn params(&self) -> &NeuralNetParams {
        &self.params
    }
}

impl Plugin for NeuralNetRegressor {
    plugin_identity!();

    fn fit(&mut self, data: &Dataset) -> Result<()> {
        self.fitted = None;
        require_rows(Self::NAME, data)?;
        let targets = data
            .static_targets()
            .ok_or_else(|| ChronoError::fit(Self::NAME, "regression requires static targets"))?;
        let y = regression_targets(Self::NAME, targets)?;

        let mut rng = StdRng::seed_from_u64(self.params.random_state);
        let encoder = SummaryEncoder::fit(data)?;
        let x = encoder.transform(data)?;
        let head = RegressionHead::fit(&x, &y, &self.params.head(), &mut rng)?;
        debug!(samples = data.len(), outputs = y.ncols(), "fitted nn_regressor");
        self.fitted = Some(FittedRegressor { encoder, head });
        Ok(())
    }
}

impl Estimator for NeuralNetRegressor {
    fn predict(&self, data: &Dataset) -> Result<Tensor> {
        let fitted = self.fitted.as_ref().ok_or_else(|| ChronoError::NotFitted(self.fullname()))?;
        fitted.head.predict(&fitted.encoder.transform(data)?)
    }
}

impl PluginSpec for NeuralNetRegressor {
    const NAME: &'static str = "nn_regressor";
    const CATEGORY: Category = Category::Regression;

    fn hyperparameter_space() -> Vec<Params> {
        NeuralNetParams::space()
    }

    fn from_args(args: &Args) -> Result<Self> {
        Self::new(parse_args(Self::NAME, args)?)
    }
}
