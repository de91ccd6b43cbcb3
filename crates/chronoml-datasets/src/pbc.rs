use chronoml_core::{ChronoError, Result, Tensor};
use chronoml_data::{Dataset, EventTargets, Targets, TimeSeries};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::loader::{mask_missing, standard_normal, DataLoader};

/// Number of longitudinal biomarkers per visit.
const N_BIOMARKERS: usize = 6;

/// Simulated longitudinal liver-disease cohort with censored survival.
///
/// Each subject has an irregular visit schedule with six biomarkers
/// (bilirubin, albumin, alkaline phosphatase, SGOT, platelets, prothrombin)
/// and static `[age, sex]`. The hazard after the last visit grows with the
/// final bilirubin and age and shrinks with albumin; censoring is uniform.
#[derive(Debug, Clone)]
pub struct PBCDataLoader {
    pub n_samples: usize,
    pub min_visits: usize,
    pub max_visits: usize,
    pub missing_rate: f64,
    pub max_followup: f64,
    pub random_state: u64,
}

impl Default for PBCDataLoader {
    fn default() -> Self {
        PBCDataLoader {
            n_samples: 150,
            min_visits: 2,
            max_visits: 8,
            missing_rate: 0.05,
            max_followup: 10.0,
            random_state: 0,
        }
    }
}

impl PBCDataLoader {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataLoader for PBCDataLoader {
    fn load(&self) -> Result<Dataset> {
        if self.n_samples == 0 || self.min_visits == 0 || self.min_visits > self.max_visits {
            return Err(ChronoError::invalid_input(
                "pbc loader needs samples and a valid visit range",
            ));
        }
        let mut rng = StdRng::seed_from_u64(self.random_state);

        let mut series = Vec::with_capacity(self.n_samples);
        let mut statics = Vec::with_capacity(self.n_samples * 2);
        let mut times = Vec::with_capacity(self.n_samples);
        let mut events = Vec::with_capacity(self.n_samples);

        for _ in 0..self.n_samples {
            let age = rng.gen_range(30.0..75.0);
            let sex = if rng.gen_bool(0.85) { 1.0 } else { 0.0 };
            let n_visits = rng.gen_range(self.min_visits..=self.max_visits);

            // subject-level disease progression speed
            let progression = rng.gen_range(0.0..0.4);
            let mut visit_times = Vec::with_capacity(n_visits);
            let mut values = Vec::with_capacity(n_visits * N_BIOMARKERS);
            let mut t = 0.0;
            let mut log_bili = rng.gen_range(-0.5..1.0);
            let mut albumin = rng.gen_range(3.0..4.2);
            for visit in 0..n_visits {
                if visit > 0 {
                    let gap = rng.gen_range(0.3..1.5);
                    t += gap;
                    log_bili += progression * gap + 0.1 * standard_normal(&mut rng);
                    albumin -= 0.5 * progression * gap + 0.05 * standard_normal(&mut rng);
                }
                visit_times.push(t);
                values.extend_from_slice(&[
                    log_bili.exp(),
                    albumin,
                    rng.gen_range(0.5..3.0) * (1.0 + progression),
                    rng.gen_range(0.5..2.0),
                    rng.gen_range(1.5..4.0) * (1.0 - 0.5 * progression),
                    10.0 + progression * 2.0 + 0.3 * standard_normal(&mut rng),
                ]);
            }

            let risk = 0.8 * log_bili - 0.9 * (albumin - 3.5) + 0.03 * (age - 50.0);
            let hazard = 0.15 * risk.exp();
            let event_time = t + -(rng.gen::<f64>().max(1e-12)).ln() / hazard;
            let censor_time = t + rng.gen_range(0.0..self.max_followup);

            mask_missing(&mut values, self.missing_rate, &mut rng);
            series.push(TimeSeries::new(
                visit_times,
                Tensor::new(values, vec![n_visits, N_BIOMARKERS])?,
            )?);
            statics.extend_from_slice(&[age, sex]);
            times.push(event_time.min(censor_time));
            events.push(event_time <= censor_time);
        }

        debug!(
            n_samples = self.n_samples,
            n_events = events.iter().filter(|&&e| e).count(),
            "generated pbc cohort"
        );

        Dataset::new(series)?
            .with_static(Tensor::new(statics, vec![self.n_samples, 2])?)?
            .with_targets(Targets::Events(EventTargets::new(times, events)?))
    }
}
