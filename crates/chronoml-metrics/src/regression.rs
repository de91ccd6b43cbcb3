use chronoml_core::{ChronoError, Result, Tensor};

fn check_shapes(y_true: &Tensor, y_pred: &Tensor) -> Result<()> {
    if y_true.nrows() != y_pred.nrows() || y_true.ncols() != y_pred.ncols() {
        return Err(ChronoError::ShapeMismatch {
            expected: y_true.shape().to_vec(),
            got: y_pred.shape().to_vec(),
        });
    }
    if y_true.numel() == 0 {
        return Err(ChronoError::invalid_input("cannot score empty targets"));
    }
    Ok(())
}

/// Mean Squared Error over all outputs.
pub fn mse(y_true: &Tensor, y_pred: &Tensor) -> Result<f64> {
    check_shapes(y_true, y_pred)?;
    let sum: f64 = y_true
        .data()
        .iter()
        .zip(y_pred.data())
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    Ok(sum / y_true.numel() as f64)
}

/// Root Mean Squared Error.
pub fn rmse(y_true: &Tensor, y_pred: &Tensor) -> Result<f64> {
    mse(y_true, y_pred).map(f64::sqrt)
}

/// Mean Absolute Error over all outputs.
pub fn mae(y_true: &Tensor, y_pred: &Tensor) -> Result<f64> {
    check_shapes(y_true, y_pred)?;
    let sum: f64 = y_true
        .data()
        .iter()
        .zip(y_pred.data())
        .map(|(t, p)| (t - p).abs())
        .sum();
    Ok(sum / y_true.numel() as f64)
}

/// R² (coefficient of determination), uniformly averaged over output columns.
///
/// A constant target column scores 1.0 when predicted exactly and 0.0 otherwise.
pub fn r2_score(y_true: &Tensor, y_pred: &Tensor) -> Result<f64> {
    check_shapes(y_true, y_pred)?;
    let cols = y_true.ncols();
    let mut total = 0.0;
    for j in 0..cols {
        let t = y_true.column_values(j)?;
        let p = y_pred.column_values(j)?;
        let mean = t.iter().sum::<f64>() / t.len() as f64;
        let ss_res: f64 = t.iter().zip(&p).map(|(a, b)| (a - b) * (a - b)).sum();
        let ss_tot: f64 = t.iter().map(|a| (a - mean) * (a - mean)).sum();
        total += if ss_tot < 1e-15 {
            if ss_res < 1e-15 {
                1.0
            } else {
                0.0
            }
        } else {
            1.0 - ss_res / ss_tot
        };
    }
    Ok(total / cols as f64)
}
