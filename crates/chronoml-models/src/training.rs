//! Mini-batch training of dense prediction heads shared by the model plugins.

use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_nn::{softmax, Activation, Adam, Mlp};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::features::Standardizer;

/// Architecture and optimizer settings of a dense head.
#[derive(Debug, Clone, Copy)]
pub struct HeadConfig {
    pub n_units_hidden: usize,
    pub n_layers_hidden: usize,
    pub nonlin: Activation,
    pub dropout: f64,
    pub lr: f64,
    pub weight_decay: f64,
    pub batch_size: usize,
    pub n_iter: usize,
}

impl HeadConfig {
    pub fn build(&self, n_in: usize, n_out: usize, rng: &mut StdRng) -> Mlp {
        let hidden = vec![self.n_units_hidden; self.n_layers_hidden];
        Mlp::new(n_in, &hidden, n_out, self.nonlin, self.dropout, rng)
    }

    pub fn optimizer(&self) -> Adam {
        Adam::new(self.lr).with_weight_decay(self.weight_decay)
    }
}

/// Shuffled index batches covering `0..n` once.
pub fn minibatches(n: usize, batch_size: usize, rng: &mut StdRng) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    order.chunks(batch_size.max(1)).map(<[usize]>::to_vec).collect()
}

/// Run `n_iter` epochs of mini-batch training.
///
/// `loss_grad(batch, output)` returns the batch loss and its gradient with
/// respect to the network output.
pub fn train<F>(
    mlp: &mut Mlp,
    x: &Tensor,
    config: &HeadConfig,
    rng: &mut StdRng,
    mut loss_grad: F,
) -> Result<f64>
where
    F: FnMut(&[usize], &Tensor) -> Result<(f64, Tensor)>,
{
    let mut optimizer = config.optimizer();
    let mut epoch_loss = f64::NAN;
    for epoch in 0..config.n_iter {
        let mut total = 0.0;
        for batch in minibatches(x.nrows(), config.batch_size, rng) {
            let xb = x.select_rows(&batch)?;
            let loss = mlp.train_batch(&xb, &mut optimizer, rng, |out| loss_grad(&batch, out))?;
            if !loss.is_finite() {
                return Err(ChronoError::invalid_input(format!(
                    "training diverged at epoch {}",
                    epoch
                )));
            }
            total += loss * batch.len() as f64;
        }
        epoch_loss = total / x.nrows() as f64;
    }
    debug!(epochs = config.n_iter, loss = epoch_loss, "trained dense head");
    Ok(epoch_loss)
}

// ─── Classification head ────────────────────────────────────────────────────

/// Labels `0..n_classes` read from a single target column.
pub fn class_labels(plugin: &str, targets: &Tensor) -> Result<Vec<usize>> {
    if targets.ncols() != 1 {
        return Err(ChronoError::fit(
            plugin,
            format!("expected one label column, got {}", targets.ncols()),
        ));
    }
    targets
        .data()
        .iter()
        .map(|&v| {
            if v.is_finite() && v >= 0.0 && v.fract() == 0.0 {
                Ok(v as usize)
            } else {
                Err(ChronoError::fit(plugin, format!("label {} is not a class index", v)))
            }
        })
        .collect()
}

/// Dense softmax classifier trained with cross-entropy.
#[derive(Debug, Clone)]
pub struct ClassificationHead {
    mlp: Mlp,
    n_classes: usize,
}

impl ClassificationHead {
    pub fn fit(x: &Tensor, labels: &[usize], config: &HeadConfig, rng: &mut StdRng) -> Result<Self> {
        let n_classes = labels.iter().copied().max().map_or(2, |m| (m + 1).max(2));
        let mut mlp = config.build(x.ncols(), n_classes, rng);
        train(&mut mlp, x, config, rng, |batch, out| {
            let n = batch.len() as f64;
            let mut loss = 0.0;
            let mut grad = Vec::with_capacity(out.numel());
            for (row, &i) in out.rows().zip(batch) {
                let p = softmax(row);
                loss -= p[labels[i]].max(1e-12).ln();
                grad.extend(p.iter().enumerate().map(|(c, &pc)| {
                    (pc - if c == labels[i] { 1.0 } else { 0.0 }) / n
                }));
            }
            Ok((loss / n, Tensor::new(grad, out.shape().to_vec())?))
        })?;
        Ok(ClassificationHead { mlp, n_classes })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Class probabilities `[n, n_classes]`.
    pub fn predict_proba(&self, x: &Tensor) -> Result<Tensor> {
        let logits = self.mlp.forward(x)?;
        let flat: Vec<f64> = logits.rows().flat_map(softmax).collect();
        Tensor::new(flat, vec![x.nrows(), self.n_classes])
    }

    /// Most likely class as a `[n, 1]` column.
    pub fn predict(&self, x: &Tensor) -> Result<Tensor> {
        let labels: Vec<f64> = self
            .predict_proba(x)?
            .argmax_rows()
            .into_iter()
            .map(|c| c as f64)
            .collect();
        Ok(Tensor::column(&labels))
    }
}

// ─── Regression head ────────────────────────────────────────────────────────

/// Dense regressor trained with mean squared error on standardized targets.
#[derive(Debug, Clone)]
pub struct RegressionHead {
    mlp: Mlp,
    target_scaler: Standardizer,
}

impl RegressionHead {
    pub fn fit(x: &Tensor, y: &Tensor, config: &HeadConfig, rng: &mut StdRng) -> Result<Self> {
        let target_scaler = Standardizer::fit(y)?;
        let z = target_scaler.transform(y)?;
        let k = z.ncols();
        let mut mlp = config.build(x.ncols(), k, rng);
        train(&mut mlp, x, config, rng, |batch, out| {
            let n = (batch.len() * k) as f64;
            let mut loss = 0.0;
            let mut grad = Vec::with_capacity(out.numel());
            for (row, &i) in out.rows().zip(batch) {
                let target = z.row(i)?;
                for (o, t) in row.iter().zip(target) {
                    let d = o - t;
                    loss += d * d;
                    grad.push(2.0 * d / n);
                }
            }
            Ok((loss / n, Tensor::new(grad, out.shape().to_vec())?))
        })?;
        Ok(RegressionHead { mlp, target_scaler })
    }

    pub fn predict(&self, x: &Tensor) -> Result<Tensor> {
        self.target_scaler.inverse(&self.mlp.forward(x)?)
    }
}

/// Regression targets `[n, k]`; every value must be finite.
pub fn regression_targets(plugin: &str, targets: &Tensor) -> Result<Tensor> {
    if targets.data().iter().any(|v| !v.is_finite()) {
        return Err(ChronoError::fit(plugin, "regression targets must be finite"));
    }
    if targets.ndim() == 1 {
        return Ok(Tensor::column(targets.data()));
    }
    Ok(targets.clone())
}
