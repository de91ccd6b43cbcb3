use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::{Dataset, Targets, TimeSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::loader::{mask_missing, standard_normal, DataLoader};

/// Synthetic sine sequences with a binary target.
///
/// Class 1 subjects oscillate faster than class 0 subjects, so the target
/// is learnable from the temporal features. The single target column holds
/// `0.0`/`1.0` and serves both classification and regression.
#[derive(Debug, Clone)]
pub struct SineDataLoader {
    pub n_samples: usize,
    pub seq_len: usize,
    pub n_features: usize,
    pub n_static_features: usize,
    pub noise: f64,
    pub missing_rate: f64,
    pub random_state: u64,
}

impl Default for SineDataLoader {
    fn default() -> Self {
        SineDataLoader {
            n_samples: 100,
            seq_len: 10,
            n_features: 5,
            n_static_features: 4,
            noise: 0.05,
            missing_rate: 0.0,
            random_state: 0,
        }
    }
}

impl SineDataLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataLoader for SineDataLoader {
    fn load(&self) -> Result<Dataset> {
        if self.n_samples == 0 || self.seq_len == 0 || self.n_features == 0 {
            return Err(ChronoError::invalid_input(
                "sine loader needs at least one sample, step and feature",
            ));
        }
        let mut rng = StdRng::seed_from_u64(self.random_state);

        let mut series = Vec::with_capacity(self.n_samples);
        let mut statics = Vec::with_capacity(self.n_samples * self.n_static_features);
        let mut labels = Vec::with_capacity(self.n_samples);

        for _ in 0..self.n_samples {
            let label = rng.gen_bool(0.5);
            let mut values = Vec::with_capacity(self.seq_len * self.n_features);
            let params: Vec<(f64, f64)> = (0..self.n_features)
                .map(|_| {
                    let freq = if label {
                        rng.gen_range(0.5..0.9)
                    } else {
                        rng.gen_range(0.1..0.4)
                    };
                    (freq, rng.gen_range(0.0..std::f64::consts::PI))
                })
                .collect();
            for t in 0..self.seq_len {
                for &(freq, phase) in &params {
                    values.push((freq * t as f64 + phase).sin() + self.noise * standard_normal(&mut rng));
                }
            }
            mask_missing(&mut values, self.missing_rate, &mut rng);

            let times = (0..self.seq_len).map(|t| t as f64).collect();
            series.push(TimeSeries::new(
                times,
                Tensor::new(values, vec![self.seq_len, self.n_features])?,
            )?);
            statics.extend((0..self.n_static_features).map(|_| rng.gen::<f64>()));
            labels.push(if label { 1.0 } else { 0.0 });
        }

        let mut data = Dataset::new(series)?;
        if self.n_static_features > 0 {
            data = data.with_static(Tensor::new(
                statics,
                vec![self.n_samples, self.n_static_features],
            )?)?;
        }
        data.with_targets(Targets::Static(Tensor::column(&labels)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_shapes() {
        let data = SineDataLoader::default().load().unwrap();
        assert_eq!(data.len(), 100);
        assert_eq!(data.n_features(), 5);
        assert_eq!(data.n_static_features(), 4);
        assert_eq!(data.time_series()[0].len(), 10);
        let labels = data.static_targets().unwrap();
        assert!(labels.data().iter().all(|&v| v == 0.0 || v == 1.0));
    }

    #[test]
    fn test_sine_is_deterministic() {
        let a = SineDataLoader::default().load().unwrap();
        let b = SineDataLoader::default().load().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sine_missing_rate() {
        let loader = SineDataLoader {
            missing_rate: 0.3,
            ..SineDataLoader::default()
        };
        let data = loader.load().unwrap();
        assert!(data.time_series().iter().any(|s| s.values().has_nan()));
    }
}
