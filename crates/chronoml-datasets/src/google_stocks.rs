use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::{Dataset, Targets, TimeSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::loader::{standard_normal, DataLoader};

/// Sliding windows over a simulated daily stock price series.
///
/// Each window holds `seq_len` days of `[open, high, low, close, volume]`
/// scaled by the first close price; the regression target is the scaled
/// close of the following day.
#[derive(Debug, Clone)]
pub struct GoogleStocksDataLoader {
    pub n_samples: usize,
    pub seq_len: usize,
    pub drift: f64,
    pub volatility: f64,
    pub random_state: u64,
}

impl Default for GoogleStocksDataLoader {
    fn default() -> Self {
        GoogleStocksDataLoader {
            n_samples: 60,
            seq_len: 10,
            drift: 0.0005,
            volatility: 0.02,
            random_state: 0,
        }
    }
}

impl GoogleStocksDataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// One `[open, high, low, close, volume]` row per simulated day.
    fn simulate(&self, days: usize, rng: &mut StdRng) -> Vec<[f64; 5]> {
        let mut close = 1.0;
        (0..days)
            .map(|_| {
                let open = close * (1.0 + 0.25 * self.volatility * standard_normal(rng));
                close *= (self.drift + self.volatility * standard_normal(rng)).exp();
                let spread = self.volatility * rng.gen::<f64>();
                let high = open.max(close) * (1.0 + spread);
                let low = open.min(close) * (1.0 - spread);
                let volume = rng.gen_range(0.5..1.5);
                [open, high, low, close, volume]
            })
            .collect()
    }
}

impl DataLoader for GoogleStocksDataLoader {
    fn load(&self) -> Result<Dataset> {
        if self.n_samples == 0 || self.seq_len == 0 {
            return Err(ChronoError::invalid_input(
                "stock loader needs at least one window of one day",
            ));
        }
        let mut rng = StdRng::seed_from_u64(self.random_state);
        let days = self.simulate(self.n_samples + self.seq_len, &mut rng);

        let mut series = Vec::with_capacity(self.n_samples);
        let mut targets = Vec::with_capacity(self.n_samples);
        for start in 0..self.n_samples {
            let window = &days[start..start + self.seq_len];
            let values: Vec<f64> = window.iter().flat_map(|d| d.iter().copied()).collect();
            let times = (0..self.seq_len).map(|t| t as f64).collect();
            series.push(TimeSeries::new(times, Tensor::new(values, vec![self.seq_len, 5])?)?);
            targets.push(days[start + self.seq_len][3]);
        }

        Dataset::new(series)?.with_targets(Targets::Static(Tensor::column(&targets)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_google_stocks_shapes() {
        let data = GoogleStocksDataLoader::default().load().unwrap();
        assert_eq!(data.len(), 60);
        assert_eq!(data.n_features(), 5);
        assert_eq!(data.static_targets().unwrap().shape(), &[60, 1]);
        assert!(data.static_features().is_none());
    }

    #[test]
    fn test_windows_overlap() {
        let data = GoogleStocksDataLoader::default().load().unwrap();
        // day 1 of window 0 is day 0 of window 1
        let a = data.time_series()[0].values().row(1).unwrap().to_vec();
        let b = data.time_series()[1].values().row(0).unwrap().to_vec();
        assert_eq!(a, b);
    }

    #[test]
    fn test_target_is_next_close() {
        let data = GoogleStocksDataLoader::default().load().unwrap();
        let next_close = data.time_series()[1].values().get(9, 3).unwrap();
        approx::assert_abs_diff_eq!(data.static_targets().unwrap().data()[0], next_close);
    }
}
