use chronoml_core::{ChronoError, Result, Tensor};
use rand::rngs::StdRng;
use rand::Rng;

use crate::activation::Activation;
use crate::optim::Adam;

/// Fully connected layer: y = xW + b, with `W` stored `[n_in, n_out]`
/// row-major.
#[derive(Debug, Clone)]
pub struct Dense {
    pub weight: Vec<f64>,
    pub bias: Vec<f64>,
    pub n_in: usize,
    pub n_out: usize,
}

impl Dense {
    /// Xavier-uniform initialization.
    pub fn new(n_in: usize, n_out: usize, rng: &mut StdRng) -> Self {
        let scale = (6.0 / (n_in + n_out) as f64).sqrt();
        let weight = (0..n_in * n_out)
            .map(|_| rng.gen_range(-scale..scale))
            .collect();
        Dense {
            weight,
            bias: vec![0.0; n_out],
            n_in,
            n_out,
        }
    }

    fn forward(&self, input: &[f64], batch: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(batch * self.n_out);
        for row in input.chunks_exact(self.n_in) {
            for o in 0..self.n_out {
                let mut acc = self.bias[o];
                for (i, x) in row.iter().enumerate() {
                    acc += x * self.weight[i * self.n_out + o];
                }
                out.push(acc);
            }
        }
        out
    }
}

/// Activations recorded during a training forward pass.
struct Trace {
    /// Input to each layer (after activation and dropout of the previous one).
    inputs: Vec<Vec<f64>>,
    /// Pre-activations of every hidden layer.
    pre: Vec<Vec<f64>>,
    /// Dropout scale per hidden unit (0 or 1/(1-p)).
    masks: Vec<Vec<f64>>,
    output: Vec<f64>,
}

/// Multi-layer perceptron with a linear output layer.
#[derive(Debug, Clone)]
pub struct Mlp {
    layers: Vec<Dense>,
    activation: Activation,
    dropout: f64,
}

impl Mlp {
    pub fn new(
        n_in: usize,
        hidden: &[usize],
        n_out: usize,
        activation: Activation,
        dropout: f64,
        rng: &mut StdRng,
    ) -> Self {
        let mut sizes = Vec::with_capacity(hidden.len() + 2);
        sizes.push(n_in);
        sizes.extend_from_slice(hidden);
        sizes.push(n_out);
        let layers = sizes
            .windows(2)
            .map(|w| Dense::new(w[0], w[1], rng))
            .collect();
        Mlp {
            layers,
            activation,
            dropout: dropout.clamp(0.0, 0.95),
        }
    }

    pub fn n_inputs(&self) -> usize {
        self.layers.first().map_or(0, |l| l.n_in)
    }

    pub fn n_outputs(&self) -> usize {
        self.layers.last().map_or(0, |l| l.n_out)
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Inference forward pass (dropout disabled). Returns `[batch, n_out]`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.check_input(x)?;
        let batch = x.nrows();
        let mut a = x.data().to_vec();
        for (l, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&a, batch);
            a = if l + 1 < self.layers.len() {
                z.iter().map(|&v| self.activation.apply(v)).collect()
            } else {
                z
            };
        }
        Tensor::new(a, vec![batch, self.n_outputs()])
    }

    /// One optimizer step on a mini-batch.
    ///
    /// `loss_grad` receives the network output and returns the batch loss
    /// together with its gradient with respect to that output.
    pub fn train_batch<F>(
        &mut self,
        x: &Tensor,
        optimizer: &mut Adam,
        rng: &mut StdRng,
        loss_grad: F,
    ) -> Result<f64>
    where
        F: FnOnce(&Tensor) -> Result<(f64, Tensor)>,
    {
        self.check_input(x)?;
        let batch = x.nrows();
        let trace = self.forward_train(x, rng);
        let output = Tensor::new(trace.output.clone(), vec![batch, self.n_outputs()])?;
        let (loss, grad) = loss_grad(&output)?;
        if grad.shape() != output.shape() {
            return Err(ChronoError::ShapeMismatch {
                expected: output.shape().to_vec(),
                got: grad.shape().to_vec(),
            });
        }
        let grads = self.backward(&trace, grad.data(), batch);
        let mut params: Vec<&mut [f64]> = self
            .layers
            .iter_mut()
            .flat_map(|l| [l.weight.as_mut_slice(), l.bias.as_mut_slice()])
            .collect();
        optimizer.step(&mut params, &grads);
        Ok(loss)
    }

    fn check_input(&self, x: &Tensor) -> Result<()> {
        if x.ncols() != self.n_inputs() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![x.nrows(), self.n_inputs()],
                got: x.shape().to_vec(),
            });
        }
        if x.has_nan() {
            return Err(ChronoError::invalid_input("network input contains NaN"));
        }
        Ok(())
    }

    fn forward_train(&self, x: &Tensor, rng: &mut StdRng) -> Trace {
        let batch = x.nrows();
        let keep_scale = 1.0 / (1.0 - self.dropout);
        let mut trace = Trace {
            inputs: Vec::with_capacity(self.layers.len()),
            pre: Vec::with_capacity(self.layers.len()),
            masks: Vec::with_capacity(self.layers.len()),
            output: Vec::new(),
        };
        let mut a = x.data().to_vec();
        for (l, layer) in self.layers.iter().enumerate() {
            let z = layer.forward(&a, batch);
            trace.inputs.push(a);
            if l + 1 == self.layers.len() {
                trace.output = z;
                break;
            }
            let mask: Vec<f64> = z
                .iter()
                .map(|_| {
                    if self.dropout > 0.0 && rng.gen::<f64>() < self.dropout {
                        0.0
                    } else if self.dropout > 0.0 {
                        keep_scale
                    } else {
                        1.0
                    }
                })
                .collect();
            a = z
                .iter()
                .zip(&mask)
                .map(|(&v, m)| self.activation.apply(v) * m)
                .collect();
            trace.pre.push(z);
            trace.masks.push(mask);
        }
        trace
    }

    /// Gradients per parameter group, ordered `[W₀, b₀, W₁, b₁, ...]`.
    fn backward(&self, trace: &Trace, grad_out: &[f64], batch: usize) -> Vec<Vec<f64>> {
        let mut grads = vec![Vec::new(); self.layers.len() * 2];
        let mut delta = grad_out.to_vec();

        for l in (0..self.layers.len()).rev() {
            let layer = &self.layers[l];
            let input = &trace.inputs[l];

            let mut dw = vec![0.0; layer.n_in * layer.n_out];
            let mut db = vec![0.0; layer.n_out];
            for b in 0..batch {
                let d_row = &delta[b * layer.n_out..(b + 1) * layer.n_out];
                let x_row = &input[b * layer.n_in..(b + 1) * layer.n_in];
                for (i, x) in x_row.iter().enumerate() {
                    for (o, d) in d_row.iter().enumerate() {
                        dw[i * layer.n_out + o] += x * d;
                    }
                }
                for (o, d) in d_row.iter().enumerate() {
                    db[o] += d;
                }
            }

            if l > 0 {
                let pre = &trace.pre[l - 1];
                let mask = &trace.masks[l - 1];
                let mut prev = vec![0.0; batch * layer.n_in];
                for b in 0..batch {
                    for i in 0..layer.n_in {
                        let mut acc = 0.0;
                        for o in 0..layer.n_out {
                            acc += delta[b * layer.n_out + o] * layer.weight[i * layer.n_out + o];
                        }
                        let k = b * layer.n_in + i;
                        prev[k] = acc * mask[k] * self.activation.derivative(pre[k]);
                    }
                }
                delta = prev;
            }

            grads[2 * l] = dw;
            grads[2 * l + 1] = db;
        }
        grads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn mse_grad(out: &Tensor, target: &[f64]) -> Result<(f64, Tensor)> {
        let n = target.len() as f64;
        let diff: Vec<f64> = out.data().iter().zip(target).map(|(o, t)| o - t).collect();
        let loss = diff.iter().map(|d| d * d).sum::<f64>() / n;
        let grad = diff.iter().map(|d| 2.0 * d / n).collect();
        Ok((loss, Tensor::new(grad, out.shape().to_vec())?))
    }

    #[test]
    fn test_forward_shape() {
        let mut rng = StdRng::seed_from_u64(0);
        let mlp = Mlp::new(3, &[8, 4], 2, Activation::Relu, 0.0, &mut rng);
        let out = mlp.forward(&Tensor::zeros(5, 3)).unwrap();
        assert_eq!(out.shape(), &[5, 2]);
        assert!(mlp.forward(&Tensor::zeros(5, 4)).is_err());
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(3);
        let mlp = Mlp::new(2, &[3], 1, Activation::Tanh, 0.0, &mut rng);
        let x = Tensor::from_rows(&[vec![0.5, -0.3], vec![0.1, 0.9]]).unwrap();
        let target = [0.2, -0.4];

        let trace = mlp.forward_train(&x, &mut rng);
        let out = Tensor::new(trace.output.clone(), vec![2, 1]).unwrap();
        let (_, g) = mse_grad(&out, &target).unwrap();
        let grads = mlp.backward(&trace, g.data(), 2);

        let h = 1e-6;
        let loss_at = |m: &Mlp| mse_grad(&m.forward(&x).unwrap(), &target).unwrap().0;
        let mut plus = mlp.clone();
        plus.layers[0].weight[1] += h;
        let mut minus = mlp.clone();
        minus.layers[0].weight[1] -= h;
        let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * h);
        assert!((grads[0][1] - numeric).abs() < 1e-6);
    }

    #[test]
    fn test_fits_linear_function() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut mlp = Mlp::new(1, &[16], 1, Activation::Tanh, 0.0, &mut rng);
        let mut adam = Adam::new(0.01);
        let xs: Vec<f64> = (0..20).map(|i| i as f64 / 20.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x - 0.5).collect();
        let x = Tensor::column(&xs);
        let mut loss = f64::INFINITY;
        for _ in 0..500 {
            loss = mlp
                .train_batch(&x, &mut adam, &mut rng, |out| mse_grad(out, &ys))
                .unwrap();
        }
        assert!(loss < 1e-2, "loss {}", loss);
    }
}
