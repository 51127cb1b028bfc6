//! Mel-to-linear projection.
//!
//! The filterbank `M` (`[n_mels, n_bins]`) is wide, so the projection back to
//! linear frequency uses the ridge-regularised right pseudo-inverse
//! `Mᵀ (M Mᵀ + λI)⁻¹`, solved once with a Cholesky factorisation of the small
//! `n_mels x n_mels` gram matrix.

use crate::error::{Result, VocoderError};
use murmur_core::ShapeError;
use ndarray::Array2;

/// Ridge strength relative to the mean diagonal of `M Mᵀ`.
const RIDGE: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct MelProjection {
    basis: Array2<f32>,
    inverse: Array2<f32>,
}

impl MelProjection {
    pub fn new(basis: Array2<f32>) -> Result<Self> {
        let (n_mels, n_bins) = basis.dim();
        if n_mels == 0 || n_bins == 0 {
            return Err(VocoderError::Shape(ShapeError::new(
                "mel filterbank",
                "non-empty [n_mels, n_bins] matrix",
                format!("{:?}", basis.shape()),
            )));
        }

        let m = basis.mapv(f64::from);
        let mut gram = m.dot(&m.t());
        let trace: f64 = gram.diag().sum();
        let lambda = (RIDGE * trace / n_mels as f64).max(1e-12);
        for i in 0..n_mels {
            gram[[i, i]] += lambda;
        }

        let chol = cholesky(&gram)?;
        // Solve (M Mᵀ + λI) X = M, then pinv = Xᵀ.
        let x = cholesky_solve(&chol, &m);
        let inverse = x.t().mapv(|v| v as f32);

        Ok(Self { basis, inverse })
    }

    pub fn n_mels(&self) -> usize {
        self.basis.nrows()
    }

    pub fn n_bins(&self) -> usize {
        self.basis.ncols()
    }

    /// `[n_mels, n_bins]`
    pub fn basis(&self) -> &Array2<f32> {
        &self.basis
    }

    /// `[n_bins, n_mels]`
    pub fn inverse(&self) -> &Array2<f32> {
        &self.inverse
    }

    /// Project `[n_mels, T]` mel magnitudes to `[n_bins, T]` linear
    /// magnitudes. Negative projections are clamped to zero.
    pub fn to_linear(&self, mel: &Array2<f32>) -> std::result::Result<Array2<f32>, ShapeError> {
        if mel.nrows() != self.n_mels() {
            return Err(ShapeError::new(
                "mel spectrogram",
                format!("{} mel channels", self.n_mels()),
                format!("{} rows", mel.nrows()),
            ));
        }
        let mut linear = self.inverse.dot(mel);
        linear.mapv_inplace(|v| v.max(0.0));
        Ok(linear)
    }

    /// Apply the filterbank to `[n_bins, T]` linear magnitudes.
    pub fn to_mel(&self, linear: &Array2<f32>) -> std::result::Result<Array2<f32>, ShapeError> {
        if linear.nrows() != self.n_bins() {
            return Err(ShapeError::new(
                "linear spectrogram",
                format!("{} frequency bins", self.n_bins()),
                format!("{} rows", linear.nrows()),
            ));
        }
        Ok(self.basis.dot(linear))
    }
}

/// Lower-triangular `L` with `L Lᵀ = a`.
fn cholesky(a: &Array2<f64>) -> Result<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return Err(VocoderError::SingularProjection(format!(
                        "non-positive pivot {:e} at row {}",
                        sum, i
                    )));
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }
    Ok(l)
}

/// Solve `L Lᵀ X = B` column by column.
fn cholesky_solve(l: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
    let n = l.nrows();
    let mut x = b.clone();
    for mut col in x.columns_mut() {
        // Forward: L y = b
        for i in 0..n {
            let mut sum = col[i];
            for k in 0..i {
                sum -= l[[i, k]] * col[k];
            }
            col[i] = sum / l[[i, i]];
        }
        // Backward: Lᵀ x = y
        for i in (0..n).rev() {
            let mut sum = col[i];
            for k in i + 1..n {
                sum -= l[[k, i]] * col[k];
            }
            col[i] = sum / l[[i, i]];
        }
    }
    x
}
