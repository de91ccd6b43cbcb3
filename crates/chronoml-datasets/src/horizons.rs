use chronoml_core::{ChronoError, Result};
use chronoml_data::Dataset;

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Quantiles of the observed event times, used as evaluation horizons.
///
/// Only subjects whose event was observed count; censored times are ignored.
pub fn event0_time_percentiles(data: &Dataset, quantiles: &[f64]) -> Result<Vec<f64>> {
    let targets = data
        .event_targets()
        .ok_or_else(|| ChronoError::invalid_input("dataset has no event targets"))?;
    if let Some(q) = quantiles.iter().find(|q| !(0.0..=1.0).contains(*q)) {
        return Err(ChronoError::invalid_input(format!(
            "quantile {} outside [0, 1]",
            q
        )));
    }

    let mut observed: Vec<f64> = targets
        .times()
        .iter()
        .zip(targets.events())
        .filter(|(_, &e)| e)
        .map(|(&t, _)| t)
        .collect();
    if observed.is_empty() {
        return Err(ChronoError::invalid_input("dataset has no observed events"));
    }
    observed.sort_by(f64::total_cmp);

    Ok(quantiles.iter().map(|&q| quantile(&observed, q)).collect())
}
