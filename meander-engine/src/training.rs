//! Closed-form readout training.
//!
//! `RidgeTrainer` drives the reservoir over a labelled window with noise
//! injection enabled, collects the masked design matrix, and solves the
//! ridge-regularized normal equations in f64 via Cholesky decomposition:
//!
//! `W_out = expectedᵗ·X·(XᵗX + εI)⁻¹`
//!
//! Noise during collection is what makes the learned readout robust to
//! perturbation rather than merely input-driven. No backpropagation and no
//! iteration: one solve per training call, and repeated calls overwrite.

use tracing::{debug, info};

use crate::error::{EsnError, Result};
use crate::reservoir::SpatialReservoir;

/// Ridge regression over reservoir activity histories.
#[derive(Debug, Clone)]
pub struct RidgeTrainer {
    /// Regularization strength (ε). Keeps `XᵗX + εI` invertible when the
    /// neuron count exceeds the effective training length or masked columns
    /// are all-zero.
    pub epsilon: f32,
}

impl Default for RidgeTrainer {
    fn default() -> Self {
        Self { epsilon: 1e-8 }
    }
}

impl RidgeTrainer {
    pub fn new(epsilon: f32) -> Self {
        Self { epsilon }
    }

    /// Train the readout on a driven window.
    ///
    /// For each step the current (pre-update) activity, masked to
    /// output-gated neurons, becomes a design-matrix row; the reservoir then
    /// advances with noise injection enabled. Row 0 stays zero; collection
    /// starts at step 1, matching the one-step lag between state and target.
    ///
    /// On success the reservoir transitions to the trained state and its
    /// output is recomputed from the current activity.
    pub fn train(
        &self,
        reservoir: &mut SpatialReservoir,
        inputs: &[Vec<f32>],
        expected: &[Vec<f32>],
    ) -> Result<()> {
        assert_eq!(
            inputs.len(),
            expected.len(),
            "inputs ({}) and expected ({}) must have equal length",
            inputs.len(),
            expected.len()
        );

        let t = inputs.len();
        let n = reservoir.num_neurons();
        let k = reservoir.output_dim();
        debug!(steps = t, neurons = n, epsilon = self.epsilon, "collecting design matrix");

        let mut x = vec![0.0f32; t * n];
        for i in 1..t {
            for j in 0..n {
                if reservoir.weights.connection_out[j] {
                    x[i * n + j] = reservoir.state.activities[j];
                }
            }
            reservoir.step(&inputs[i], true)?;
        }

        // Normal equations in f64: (XᵗX + εI)·Z = Xᵗ·expected, W_out = Zᵗ.
        // Upper triangle only for XᵗX (symmetric); masked columns contribute
        // nothing, so zero entries short-circuit the row accumulation.
        let mut xtx = vec![0.0f64; n * n];
        let mut xty = vec![0.0f64; n * k];
        for i in 0..t {
            let row = &x[i * n..(i + 1) * n];
            for a in 0..n {
                let xa = row[a] as f64;
                if xa == 0.0 {
                    continue;
                }
                for b in a..n {
                    xtx[a * n + b] += xa * row[b] as f64;
                }
                for b in 0..k {
                    xty[a * k + b] += xa * expected[i][b] as f64;
                }
            }
        }
        for a in 0..n {
            for b in (a + 1)..n {
                xtx[b * n + a] = xtx[a * n + b];
            }
        }
        let epsilon = self.epsilon as f64;
        for a in 0..n {
            xtx[a * n + a] += epsilon;
        }

        let z = cholesky_solve(&xtx, &xty, n, k);

        let mut w_out = vec![0.0f32; k * n];
        for a in 0..n {
            for b in 0..k {
                w_out[b * n + a] = z[a * k + b] as f32;
            }
        }
        if w_out.iter().any(|value| !value.is_finite()) {
            return Err(EsnError::TrainingFailed);
        }

        reservoir.install_readout(w_out);
        info!(steps = t, "readout trained");
        Ok(())
    }
}

/// Solve A·X = B via Cholesky decomposition.
///
/// `A` is `d × d` symmetric positive definite (row-major), `B` is `d × k`.
/// Non-positive pivots are clamped to a small positive value, so the solve
/// itself never faults; callers validate finiteness of the result.
fn cholesky_solve(a: &[f64], b: &[f64], d: usize, k: usize) -> Vec<f64> {
    // Factor A = L·Lᵗ.
    let mut l = vec![0.0f64; d * d];
    for i in 0..d {
        for j in 0..=i {
            let mut sum = 0.0f64;
            for p in 0..j {
                sum += l[i * d + p] * l[j * d + p];
            }
            if i == j {
                let pivot = a[i * d + i] - sum;
                l[i * d + j] = if pivot > 0.0 { pivot.sqrt() } else { 1e-10 };
            } else {
                l[i * d + j] = (a[i * d + j] - sum) / l[j * d + j];
            }
        }
    }

    // L·y = B.
    let mut y = vec![0.0f64; d * k];
    for i in 0..d {
        for col in 0..k {
            let mut sum = b[i * k + col];
            for j in 0..i {
                sum -= l[i * d + j] * y[j * k + col];
            }
            y[i * k + col] = sum / l[i * d + i];
        }
    }

    // Lᵗ·x = y.
    let mut x = vec![0.0f64; d * k];
    for i in (0..d).rev() {
        for col in 0..k {
            let mut sum = y[i * k + col];
            for j in (i + 1)..d {
                sum -= l[j * d + i] * x[j * k + col];
            }
            x[i * k + col] = sum / l[i * d + i];
        }
    }

    x
}

// ─── Evaluation utilities ────────────────────────────

/// Normalized mean squared error. NMSE < 1 beats predicting the mean.
pub fn nmse(predicted: &[f32], actual: &[f32]) -> f32 {
    assert_eq!(predicted.len(), actual.len());
    let n = predicted.len() as f32;

    let mean: f32 = actual.iter().sum::<f32>() / n;
    let variance: f32 = actual.iter().map(|&y| (y - mean) * (y - mean)).sum::<f32>() / n;
    if variance < 1e-12 {
        return 0.0;
    }

    let mse: f32 = predicted
        .iter()
        .zip(actual.iter())
        .map(|(&p, &a)| (p - a) * (p - a))
        .sum::<f32>()
        / n;
    mse / variance
}

/// Summed Euclidean distance between prediction and expectation, step by
/// step. The delay sweep minimizes this.
pub fn prediction_error(result: &[Vec<f32>], expected: &[Vec<f32>]) -> f32 {
    assert_eq!(result.len(), expected.len());
    let mut gap = 0.0f32;
    for (r, e) in result.iter().zip(expected.iter()) {
        let sq: f32 = r.iter().zip(e.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
        gap += sq.sqrt();
    }
    gap
}
