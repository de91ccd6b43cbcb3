//! Time-dependent survival metrics with inverse-probability-of-censoring
//! weights (IPCW).

use chronoml_core::{ChronoError, Result};

/// Kaplan-Meier step estimate of a survival function.
#[derive(Debug, Clone, PartialEq)]
pub struct KaplanMeier {
    times: Vec<f64>,
    survival: Vec<f64>,
}

impl KaplanMeier {
    /// Fit on observed times; `events[i]` marks the times that count as
    /// failures.
    pub fn fit(times: &[f64], events: &[bool]) -> Result<Self> {
        if times.len() != events.len() {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![times.len()],
                got: vec![events.len()],
            });
        }
        let mut order: Vec<usize> = (0..times.len()).collect();
        order.sort_by(|&a, &b| times[a].total_cmp(&times[b]));

        let mut at_risk = times.len() as f64;
        let mut s = 1.0;
        let mut out_times = Vec::new();
        let mut survival = Vec::new();

        let mut i = 0;
        while i < order.len() {
            let t = times[order[i]];
            let mut deaths = 0.0;
            let mut leaving = 0.0;
            while i < order.len() && times[order[i]] == t {
                if events[order[i]] {
                    deaths += 1.0;
                }
                leaving += 1.0;
                i += 1;
            }
            if deaths > 0.0 {
                s *= 1.0 - deaths / at_risk;
                out_times.push(t);
                survival.push(s);
            }
            at_risk -= leaving;
        }

        Ok(KaplanMeier {
            times: out_times,
            survival,
        })
    }

    /// S(t), right-continuous.
    pub fn survival_at(&self, t: f64) -> f64 {
        let idx = self.times.partition_point(|&x| x <= t);
        if idx == 0 {
            1.0
        } else {
            self.survival[idx - 1]
        }
    }

    /// S(t-), the survival just before `t`.
    pub fn survival_before(&self, t: f64) -> f64 {
        let idx = self.times.partition_point(|&x| x < t);
        if idx == 0 {
            1.0
        } else {
            self.survival[idx - 1]
        }
    }
}

/// Censoring distribution G(t) estimated from training outcomes.
pub fn censoring_distribution(times: &[f64], events: &[bool]) -> Result<KaplanMeier> {
    let censored: Vec<bool> = events.iter().map(|e| !e).collect();
    KaplanMeier::fit(times, &censored)
}

fn check_lengths(times: &[f64], events: &[bool], scores: &[f64]) -> Result<()> {
    if times.len() != events.len() || times.len() != scores.len() {
        return Err(ChronoError::ShapeMismatch {
            expected: vec![times.len()],
            got: vec![events.len(), scores.len()],
        });
    }
    Ok(())
}

/// Uno's IPCW concordance index truncated at `horizon`.
///
/// A pair `(i, j)` is comparable when subject `i` has an observed event at
/// `Tᵢ <= horizon` and `Tᵢ < Tⱼ`; it is concordant when `riskᵢ > riskⱼ`
/// (ties count half). Each pair is weighted by `1 / G(Tᵢ-)²`. Returns 0.5
/// when no pair is comparable.
pub fn concordance_index_ipcw(
    censoring: &KaplanMeier,
    times: &[f64],
    events: &[bool],
    risk: &[f64],
    horizon: f64,
) -> Result<f64> {
    check_lengths(times, events, risk)?;
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..times.len() {
        if !events[i] || times[i] > horizon {
            continue;
        }
        let g = censoring.survival_before(times[i]);
        if g <= 0.0 {
            continue;
        }
        let w = 1.0 / (g * g);
        for j in 0..times.len() {
            if times[j] <= times[i] {
                continue;
            }
            den += w;
            if risk[i] > risk[j] {
                num += w;
            } else if risk[i] == risk[j] {
                num += 0.5 * w;
            }
        }
    }
    if den == 0.0 {
        return Ok(0.5);
    }
    Ok(num / den)
}

/// IPCW Brier score at `horizon` for predicted survival probabilities.
///
/// Subjects with an event by the horizon contribute `S²/G(Tᵢ-)`, subjects
/// still at risk contribute `(1 - S)²/G(horizon)`, and subjects censored
/// before the horizon contribute nothing. Terms with a zero censoring
/// weight are dropped.
pub fn brier_score(
    censoring: &KaplanMeier,
    times: &[f64],
    events: &[bool],
    survival: &[f64],
    horizon: f64,
) -> Result<f64> {
    check_lengths(times, events, survival)?;
    if times.is_empty() {
        return Err(ChronoError::invalid_input("cannot score an empty fold"));
    }
    let g_horizon = censoring.survival_at(horizon);
    let mut total = 0.0;
    for i in 0..times.len() {
        let s = survival[i];
        if times[i] <= horizon && events[i] {
            let g = censoring.survival_before(times[i]);
            if g > 0.0 {
                total += s * s / g;
            }
        } else if times[i] > horizon && g_horizon > 0.0 {
            total += (1.0 - s) * (1.0 - s) / g_horizon;
        }
    }
    Ok(total / times.len() as f64)
}
