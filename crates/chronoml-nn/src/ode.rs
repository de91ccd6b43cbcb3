//! Adaptive ODE integration and continuous interpolation of observed paths.

use chronoml_core::{ChronoError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Interpolation ──────────────────────────────────────────────────────────

/// Scheme used to turn discrete observations into a continuous path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    /// Piecewise linear.
    Linear,
    /// Cubic Hermite with Catmull-Rom tangents.
    Cubic,
}

impl Interpolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Cubic => "cubic",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interpolation {
    type Err = ChronoError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "linear" => Ok(Self::Linear),
            "cubic" => Ok(Self::Cubic),
            other => Err(ChronoError::invalid_input(format!(
                "unknown interpolation {:?}",
                other
            ))),
        }
    }
}

/// Continuous path through `(time, value vector)` knots.
///
/// Outside the observed range the path is held constant at the boundary
/// knot.
#[derive(Debug, Clone)]
pub struct ControlPath {
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
    tangents: Vec<Vec<f64>>,
    scheme: Interpolation,
}

impl ControlPath {
    pub fn new(times: Vec<f64>, values: Vec<Vec<f64>>, scheme: Interpolation) -> Result<Self> {
        if times.is_empty() || times.len() != values.len() {
            return Err(ChronoError::invalid_input(
                "control path needs one value vector per knot",
            ));
        }
        let dim = values[0].len();
        if values.iter().any(|v| v.len() != dim) {
            return Err(ChronoError::invalid_input("control path knots differ in width"));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ChronoError::invalid_input(
                "control path times must be strictly increasing",
            ));
        }

        let n = times.len();
        let tangents = (0..n)
            .map(|k| {
                if n == 1 {
                    return vec![0.0; dim];
                }
                let (a, b) = if k == 0 {
                    (0, 1)
                } else if k == n - 1 {
                    (n - 2, n - 1)
                } else {
                    (k - 1, k + 1)
                };
                let dt = times[b] - times[a];
                (0..dim)
                    .map(|d| (values[b][d] - values[a][d]) / dt)
                    .collect()
            })
            .collect();

        Ok(ControlPath {
            times,
            values,
            tangents,
            scheme,
        })
    }

    pub fn dim(&self) -> usize {
        self.values[0].len()
    }

    pub fn start(&self) -> f64 {
        self.times[0]
    }

    pub fn end(&self) -> f64 {
        self.times[self.times.len() - 1]
    }

    /// Index `k` of the segment `[tₖ, tₖ₊₁]` containing `t`, or `None`
    /// outside the range.
    fn segment(&self, t: f64) -> Option<usize> {
        if self.times.len() < 2 || t < self.start() || t > self.end() {
            return None;
        }
        let k = self.times.partition_point(|&x| x <= t).saturating_sub(1);
        Some(k.min(self.times.len() - 2))
    }

    pub fn evaluate(&self, t: f64) -> Vec<f64> {
        let Some(k) = self.segment(t) else {
            return if t <= self.start() {
                self.values[0].clone()
            } else {
                self.values[self.values.len() - 1].clone()
            };
        };
        let (t0, t1) = (self.times[k], self.times[k + 1]);
        let h = t1 - t0;
        let s = (t - t0) / h;
        let (y0, y1) = (&self.values[k], &self.values[k + 1]);
        match self.scheme {
            Interpolation::Linear => y0.iter().zip(y1).map(|(a, b)| a + (b - a) * s).collect(),
            Interpolation::Cubic => {
                let (m0, m1) = (&self.tangents[k], &self.tangents[k + 1]);
                let h00 = 2.0 * s.powi(3) - 3.0 * s * s + 1.0;
                let h10 = s.powi(3) - 2.0 * s * s + s;
                let h01 = -2.0 * s.powi(3) + 3.0 * s * s;
                let h11 = s.powi(3) - s * s;
                (0..y0.len())
                    .map(|d| h00 * y0[d] + h10 * h * m0[d] + h01 * y1[d] + h11 * h * m1[d])
                    .collect()
            }
        }
    }

    /// dX/dt at `t`; zero outside the observed range.
    pub fn derivative(&self, t: f64) -> Vec<f64> {
        let Some(k) = self.segment(t) else {
            return vec![0.0; self.dim()];
        };
        let (t0, t1) = (self.times[k], self.times[k + 1]);
        let h = t1 - t0;
        let s = (t - t0) / h;
        let (y0, y1) = (&self.values[k], &self.values[k + 1]);
        match self.scheme {
            Interpolation::Linear => y0.iter().zip(y1).map(|(a, b)| (b - a) / h).collect(),
            Interpolation::Cubic => {
                let (m0, m1) = (&self.tangents[k], &self.tangents[k + 1]);
                let d00 = (6.0 * s * s - 6.0 * s) / h;
                let d10 = 3.0 * s * s - 4.0 * s + 1.0;
                let d01 = (-6.0 * s * s + 6.0 * s) / h;
                let d11 = 3.0 * s * s - 2.0 * s;
                (0..y0.len())
                    .map(|d| d00 * y0[d] + d10 * m0[d] + d01 * y1[d] + d11 * m1[d])
                    .collect()
            }
        }
    }
}

// ─── Integration ────────────────────────────────────────────────────────────

/// Adaptive fourth-order Runge-Kutta with step-doubling error control.
#[derive(Debug, Clone, Copy)]
pub struct OdeSolver {
    pub atol: f64,
    pub rtol: f64,
    pub max_steps: usize,
}

impl Default for OdeSolver {
    fn default() -> Self {
        OdeSolver {
            atol: 1e-3,
            rtol: 1e-3,
            max_steps: 10_000,
        }
    }
}

fn rk4_step<F>(f: &mut F, t: f64, y: &[f64], h: f64) -> Vec<f64>
where
    F: FnMut(f64, &[f64]) -> Vec<f64>,
{
    let axpy = |a: &[f64], k: &[f64], c: f64| -> Vec<f64> {
        a.iter().zip(k).map(|(a, k)| a + c * k).collect()
    };
    let k1 = f(t, y);
    let k2 = f(t + h / 2.0, &axpy(y, &k1, h / 2.0));
    let k3 = f(t + h / 2.0, &axpy(y, &k2, h / 2.0));
    let k4 = f(t + h, &axpy(y, &k3, h));
    (0..y.len())
        .map(|i| y[i] + h / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
        .collect()
}

impl OdeSolver {
    pub fn new(atol: f64, rtol: f64) -> Self {
        OdeSolver {
            atol,
            rtol,
            ..Default::default()
        }
    }

    /// Integrate `dy/dt = f(t, y)` from `t0` to `t1` and return `y(t1)`.
    pub fn integrate<F>(&self, mut f: F, y0: &[f64], t0: f64, t1: f64) -> Result<Vec<f64>>
    where
        F: FnMut(f64, &[f64]) -> Vec<f64>,
    {
        if !(self.atol > 0.0 && self.rtol >= 0.0) {
            return Err(ChronoError::invalid_input("ode tolerances must be positive"));
        }
        let span = t1 - t0;
        if span == 0.0 {
            return Ok(y0.to_vec());
        }
        let direction = span.signum();
        let mut t = t0;
        let mut y = y0.to_vec();
        let mut h = span / 10.0;

        for _ in 0..self.max_steps {
            if (t1 - t) * direction <= 0.0 {
                return Ok(y);
            }
            if (t + h - t1) * direction > 0.0 {
                h = t1 - t;
            }

            let full = rk4_step(&mut f, t, &y, h);
            let half = rk4_step(&mut f, t, &y, h / 2.0);
            let fine = rk4_step(&mut f, t + h / 2.0, &half, h / 2.0);

            let err = fine
                .iter()
                .zip(&full)
                .map(|(a, b)| (a - b).abs() / (self.atol + self.rtol * a.abs()))
                .fold(0.0, f64::max);
            if !err.is_finite() {
                return Err(ChronoError::invalid_input("ode solution diverged"));
            }

            if err <= 1.0 {
                t += h;
                // Richardson extrapolation of the two estimates
                y = fine
                    .iter()
                    .zip(&full)
                    .map(|(a, b)| a + (a - b) / 15.0)
                    .collect();
                let grow = if err == 0.0 { 2.0 } else { (0.9 * err.powf(-0.2)).min(2.0) };
                h *= grow;
            } else {
                h *= (0.9 * err.powf(-0.25)).max(0.2);
            }
        }
        Err(ChronoError::invalid_input(format!(
            "ode solver exceeded {} steps",
            self.max_steps
        )))
    }
}
