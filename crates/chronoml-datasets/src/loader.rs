use chronoml_core::Result;
use chronoml_data::Dataset;
use rand::rngs::StdRng;
use rand::Rng;

/// A source of datasets. Loading is deterministic for a given loader value.
pub trait DataLoader {
    fn load(&self) -> Result<Dataset>;
}

/// Standard normal sample via Box-Muller.
pub(crate) fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-10);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Blank out cells with probability `rate`.
pub(crate) fn mask_missing(values: &mut [f64], rate: f64, rng: &mut StdRng) {
    if rate <= 0.0 {
        return;
    }
    for v in values.iter_mut() {
        if rng.gen::<f64>() < rate {
            *v = f64::NAN;
        }
    }
}
