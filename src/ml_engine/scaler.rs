//! Standard-Score Feature Scaler
//!
//! Column-wise standardisation fitted on the training matrix and applied to
//! every scored row, so tree splits see comparable ranges across volts,
//! amps, and g-levels.

use crate::error::{EngineError, Result};

/// Columns whose spread falls below this floor scale by 1.0 instead of
/// exploding the standardised values.
const STD_FLOOR: f64 = 1e-12;

/// Fitted per-column mean/scale pairs.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on a row-major matrix. Uses population statistics (ddof = 0).
    pub fn fit(rows: &[Vec<f64>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(EngineError::InsufficientTraining { have: 0, need: 1 });
        };
        let dims = first.len();
        let n = rows.len() as f64;

        let mut means = vec![0.0; dims];
        for row in rows {
            for (d, v) in row.iter().enumerate() {
                means[d] += v;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut scales = vec![0.0; dims];
        for row in rows {
            for (d, v) in row.iter().enumerate() {
                let delta = v - means[d];
                scales[d] += delta * delta;
            }
        }
        for scale in &mut scales {
            let std = (*scale / n).sqrt();
            *scale = if std < STD_FLOOR { 1.0 } else { std };
        }

        Ok(Self { means, scales })
    }

    /// Standardise a single row.
    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(v, (mean, scale))| (v - mean) / scale)
            .collect()
    }

    /// Fit and transform the whole matrix in one pass.
    pub fn fit_transform(rows: &[Vec<f64>]) -> Result<(Self, Vec<Vec<f64>>)> {
        let scaler = Self::fit(rows)?;
        let scaled = rows.iter().map(|row| scaler.transform(row)).collect();
        Ok((scaler, scaled))
    }
}
