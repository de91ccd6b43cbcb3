/// Adam optimizer over flat parameter groups.
///
/// Moment buffers are allocated on the first step, one per group, so the
/// same optimizer must always be stepped with groups in the same order.
#[derive(Debug, Clone)]
pub struct Adam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    /// L2 penalty added to the gradient.
    pub weight_decay: f64,
    t: usize,
    m: Vec<Vec<f64>>, // first moment
    v: Vec<Vec<f64>>, // second moment
}

impl Adam {
    pub fn new(lr: f64) -> Self {
        Adam {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay: 0.0,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn with_weight_decay(mut self, wd: f64) -> Self {
        self.weight_decay = wd;
        self
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> usize {
        self.t
    }

    /// Apply one update to every group. `grads[i]` must have the length of
    /// `params[i]`.
    pub fn step(&mut self, params: &mut [&mut [f64]], grads: &[Vec<f64>]) {
        if self.m.len() != params.len() {
            self.m = params.iter().map(|p| vec![0.0; p.len()]).collect();
            self.v = params.iter().map(|p| vec![0.0; p.len()]).collect();
        }
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (i, (param, grad)) in params.iter_mut().zip(grads).enumerate() {
            let m = &mut self.m[i];
            let v = &mut self.v[i];
            for j in 0..param.len() {
                let g = grad[j] + self.weight_decay * param[j];
                m[j] = self.beta1 * m[j] + (1.0 - self.beta1) * g;
                v[j] = self.beta2 * v[j] + (1.0 - self.beta2) * g * g;
                let m_hat = m[j] / bias_correction1;
                let v_hat = v[j] / bias_correction2;
                param[j] -= self.lr * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
    }
}
