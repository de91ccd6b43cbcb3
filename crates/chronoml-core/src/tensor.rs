use crate::error::{ChronoError, Result};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense `f64` tensor with a 1-D or 2-D shape.
///
/// Stores data in a flat contiguous `Vec<f64>` with row-major (C-order) layout.
/// Missing observations are encoded as `NaN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    data: Vec<f64>,
    shape: Vec<usize>,
}

#[derive(Deserialize)]
struct RawTensor {
    data: Vec<f64>,
    shape: Vec<usize>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = ChronoError;

    fn try_from(raw: RawTensor) -> Result<Self> {
        Tensor::new(raw.data, raw.shape)
    }
}

// ─── Construction ───────────────────────────────────────────────────────────

impl Tensor {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() || shape.len() > 2 {
            return Err(ChronoError::invalid_input(format!(
                "tensors are 1-D or 2-D, got shape {:?}",
                shape
            )));
        }
        let numel: usize = shape.iter().product();
        if data.len() != numel {
            return Err(ChronoError::ShapeMismatch {
                expected: shape,
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape })
    }

    /// Create a 2-D tensor filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Tensor::full(rows, cols, 0.0)
    }

    /// Create a 2-D tensor filled with a constant value.
    pub fn full(rows: usize, cols: usize, value: f64) -> Self {
        Tensor {
            data: vec![value; rows * cols],
            shape: vec![rows, cols],
        }
    }

    /// Create a 1-D tensor from a slice.
    pub fn from_slice(data: &[f64]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: vec![data.len()],
        }
    }

    /// Create a single-column `[n, 1]` tensor.
    pub fn column(data: &[f64]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: vec![data.len(), 1],
        }
    }

    /// Create a 2-D tensor from rows of equal length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Ok(Tensor::zeros(0, 0));
        };
        let cols = first.len();
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(ChronoError::ShapeMismatch {
                expected: vec![cols],
                got: vec![bad.len()],
            });
        }
        let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::new(flat, vec![rows.len(), cols])
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Number of rows (size of axis 0).
    pub fn nrows(&self) -> usize {
        self.shape[0]
    }

    /// Number of columns; a 1-D tensor counts as a single column.
    pub fn ncols(&self) -> usize {
        self.shape.get(1).copied().unwrap_or(1)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Element at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.check_index(row, col)?;
        Ok(self.data[row * self.ncols() + col])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        self.check_index(row, col)?;
        let cols = self.ncols();
        self.data[row * cols + col] = value;
        Ok(())
    }

    /// Borrow a row as a slice.
    pub fn row(&self, i: usize) -> Result<&[f64]> {
        if i >= self.nrows() {
            return Err(ChronoError::invalid_input(format!(
                "row {} out of bounds for {} rows",
                i,
                self.nrows()
            )));
        }
        let cols = self.ncols();
        Ok(&self.data[i * cols..(i + 1) * cols])
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on 0; an empty-column tensor has no data anyway
        self.data.chunks_exact(self.ncols().max(1))
    }

    /// Copy out column `j`.
    pub fn column_values(&self, j: usize) -> Result<Vec<f64>> {
        if j >= self.ncols() {
            return Err(ChronoError::invalid_input(format!(
                "column {} out of bounds for {} columns",
                j,
                self.ncols()
            )));
        }
        Ok(self.rows().map(|r| r[j]).collect())
    }

    /// Gather rows in the given order into a new 2-D tensor.
    pub fn select_rows(&self, indices: &[usize]) -> Result<Tensor> {
        let cols = self.ncols();
        let mut data = Vec::with_capacity(indices.len() * cols);
        for &i in indices {
            data.extend_from_slice(self.row(i)?);
        }
        Tensor::new(data, vec![indices.len(), cols])
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if row >= self.nrows() || col >= self.ncols() {
            return Err(ChronoError::invalid_input(format!(
                "index ({}, {}) out of bounds for shape {:?}",
                row, col, self.shape
            )));
        }
        Ok(())
    }

    // ─── Element-wise ───────────────────────────────────────────────────────

    /// Apply a function element-wise, returning a new tensor.
    pub fn apply<F: Fn(f64) -> f64>(&self, f: F) -> Tensor {
        Tensor {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    pub fn has_nan(&self) -> bool {
        self.data.iter().any(|v| v.is_nan())
    }

    /// Index of the largest value in each row; NaN entries are skipped.
    pub fn argmax_rows(&self) -> Vec<usize> {
        self.rows()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| !v.is_nan())
                    .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 {
                            (i, v)
                        } else {
                            best
                        }
                    })
                    .0
            })
            .collect()
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(")?;
        for (i, d) in self.shape.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_validates_shape() {
        let t: Tensor = serde_json::from_str(r#"{"data":[1.0,2.0],"shape":[2,1]}"#).unwrap();
        assert_eq!(t.shape(), &[2, 1]);
        assert!(serde_json::from_str::<Tensor>(r#"{"data":[1.0],"shape":[2,1]}"#).is_err());
        assert!(serde_json::from_str::<Tensor>(r#"{"data":[],"shape":[]}"#).is_err());
    }

    #[test]
    fn test_new_checks_numel() {
        assert!(Tensor::new(vec![1.0, 2.0, 3.0], vec![2, 2]).is_err());
        assert!(Tensor::new(vec![1.0; 6], vec![2, 3]).is_ok());
        assert!(Tensor::new(vec![1.0; 8], vec![2, 2, 2]).is_err());
    }

    #[test]
    fn test_rows_and_columns() {
        let t = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.row(1).unwrap(), &[3.0, 4.0]);
        assert_eq!(t.column_values(1).unwrap(), vec![2.0, 4.0, 6.0]);
        assert_eq!(t.get(2, 0).unwrap(), 5.0);
        assert!(t.get(3, 0).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0]]).is_err());
    }

    #[test]
    fn test_select_rows() {
        let t = Tensor::from_rows(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        let s = t.select_rows(&[2, 0]).unwrap();
        assert_eq!(s.data(), &[3.0, 1.0]);
        assert_eq!(s.shape(), &[2, 1]);
    }

    #[test]
    fn test_one_dimensional_is_single_column() {
        let t = Tensor::from_slice(&[1.0, 2.0, 3.0]);
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 1);
        assert_eq!(t.row(2).unwrap(), &[3.0]);
    }

    #[test]
    fn test_argmax_rows() {
        let t = Tensor::from_rows(&[vec![0.1, 0.9], vec![0.7, 0.3], vec![f64::NAN, 0.2]]).unwrap();
        assert_eq!(t.argmax_rows(), vec![1, 0, 1]);
    }

    #[test]
    fn test_apply_and_nan() {
        let t = Tensor::from_slice(&[1.0, f64::NAN]);
        assert!(t.has_nan());
        let filled = t.apply(|v| if v.is_nan() { 0.0 } else { v * 2.0 });
        assert!(!filled.has_nan());
        approx::assert_abs_diff_eq!(filled.data()[0], 2.0);
    }
}
