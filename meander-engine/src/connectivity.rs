//! Weight-matrix synthesis from neuron geometry.
//!
//! Connectivity is gated by distance and relative position:
//! 1. Internal edges survive only when the pair distance beats an independent
//!    uniform threshold AND the sender sits strictly left of the receiver,
//!    so signal flow is biased to sweep the reservoir in increasing-x order.
//! 2. Input edges favor neurons near x = 0.
//! 3. Output-gated neurons favor large x.
//!
//! After gating, the global gain of `w` is calibrated against a target
//! spectral radius, either eigenvalue-normalized on the closed-loop pseudo
//! matrix or as a flat multiplier (`SpectralCalibration`).

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::config::{EsnConfig, SpectralCalibration};
use crate::error::{EsnError, Result};

/// The five weight structures of a spatial reservoir.
///
/// All matrices are dense, flat, row-major `Vec<f32>`:
/// - `w` is N×N with row = receiving neuron, column = sending neuron
/// - `w_in` is N×(1+input_dim), column 0 being the bias
/// - `w_out` is output_dim×N
/// - `w_back` is N×output_dim, kept for interface symmetry with textbook
///   ESNs but never applied to the dynamics
#[derive(Debug, Clone)]
pub struct ReservoirWeights {
    pub n: usize,
    pub input_dim: usize,
    pub output_dim: usize,
    pub w: Vec<f32>,
    pub w_in: Vec<f32>,
    pub w_out: Vec<f32>,
    /// Which neurons participate in the readout. Fixed at construction,
    /// reused by training to select the regression feature subset.
    pub connection_out: Vec<bool>,
    pub w_back: Vec<f32>,
}

/// Connection counts, the numeric core of the original connectivity report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityCensus {
    /// Nonzero entries of `w_in` (bias column included).
    pub input_connections: usize,
    /// Nonzero entries of `w`.
    pub internal_connections: usize,
    /// Neurons passing the output gate.
    pub output_neurons: usize,
}

impl ReservoirWeights {
    /// Synthesize all weight structures for the given neuron positions.
    ///
    /// Fails with `DegenerateSpectrum` when `Normalized` calibration meets a
    /// zero-magnitude pseudo-spectrum.
    pub fn build(positions: &[[f32; 2]], config: &EsnConfig, rng: &mut StdRng) -> Result<Self> {
        assert!(config.intern_sparsity > 0.0, "intern_sparsity must be positive");
        assert!(config.external_sparsity > 0.0, "external_sparsity must be positive");

        let n = positions.len();
        let input_dim = config.input_dim;
        let output_dim = config.output_dim;

        // Internal weights, then the distance/direction gate. Each pair gets
        // an independent connection threshold.
        let mut w: Vec<f32> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        for i in 0..n {
            for j in 0..n {
                let dx = positions[i][0] - positions[j][0];
                let dy = positions[i][1] - positions[j][1];
                let dist = (dx * dx + dy * dy).sqrt();
                let threshold = rng.gen_range(0.0..config.intern_sparsity);
                let keep = dist < threshold && i != j && positions[j][0] < positions[i][0];
                if !keep {
                    w[i * n + j] = 0.0;
                }
            }
        }

        // Input weights with the position gate: large x makes a neuron less
        // likely to receive direct input, pushing the information path to
        // cross the reservoir.
        let in_cols = 1 + input_dim;
        let mut w_in: Vec<f32> = (0..n * in_cols).map(|_| rng.gen_range(-1.0..1.0)).collect();
        for i in 0..n {
            for c in 0..in_cols {
                let keep = positions[i][0] / config.external_sparsity < rng.gen::<f32>();
                if !keep {
                    w_in[i * in_cols + c] = 0.0;
                }
            }
        }

        // Output gate: large x makes a neuron more likely to be
        // output-connected. Gated neurons connect to every output component.
        let mut w_out: Vec<f32> = (0..output_dim * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let connection_out: Vec<bool> = (0..n)
            .map(|i| (1.0 - positions[i][0]) < rng.gen_range(0.0..config.external_sparsity))
            .collect();
        for k in 0..output_dim {
            for j in 0..n {
                if !connection_out[j] {
                    w_out[k * n + j] = 0.0;
                }
            }
        }

        // Gain calibration.
        let gain = match config.calibration {
            SpectralCalibration::Flat => config.spectral_radius,
            SpectralCalibration::Normalized => {
                let rho = pseudo_spectral_radius(&w, &w_in, &w_out, n, input_dim, output_dim);
                if rho == 0.0 {
                    return Err(EsnError::DegenerateSpectrum);
                }
                config.spectral_radius / rho
            }
        };
        for value in &mut w {
            *value *= gain;
        }

        let w_back: Vec<f32> = (0..n * output_dim).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let weights = Self {
            n,
            input_dim,
            output_dim,
            w,
            w_in,
            w_out,
            connection_out,
            w_back,
        };
        let census = weights.census();
        debug!(
            neurons = n,
            internal = census.internal_connections,
            input = census.input_connections,
            output = census.output_neurons,
            gain,
            "connectivity built"
        );
        Ok(weights)
    }

    /// Connection counts over the synthesized structures.
    pub fn census(&self) -> ConnectivityCensus {
        ConnectivityCensus {
            input_connections: self.w_in.iter().filter(|v| **v != 0.0).count(),
            internal_connections: self.w.iter().filter(|v| **v != 0.0).count(),
            output_neurons: self.connection_out.iter().filter(|c| **c).count(),
        }
    }

    /// Dominant eigenvalue magnitude of `w` alone. The calibration target
    /// applies to the pseudo-spectrum, so this is generally not equal to the
    /// configured radius.
    pub fn effective_spectral_radius(&self) -> f32 {
        let n = self.n;
        let m = DMatrix::from_fn(n, n, |i, j| self.w[i * n + j] as f64);
        max_eigenvalue_norm(&m)
    }
}

/// Dominant eigenvalue magnitude of the closed-loop pseudo matrix
/// `w + w_in[:,1:]·w_out`: a full, generally non-triangular matrix that
/// approximates the system including the implicit input/output feedback
/// path. The feedback product is only defined when input and output
/// dimensionality agree; otherwise `w` alone is measured.
pub fn pseudo_spectral_radius(
    w: &[f32],
    w_in: &[f32],
    w_out: &[f32],
    n: usize,
    input_dim: usize,
    output_dim: usize,
) -> f32 {
    let in_cols = 1 + input_dim;
    let feedback = input_dim == output_dim;
    let m = DMatrix::from_fn(n, n, |i, j| {
        let mut value = w[i * n + j] as f64;
        if feedback {
            for k in 0..output_dim {
                value += w_in[i * in_cols + 1 + k] as f64 * w_out[k * n + j] as f64;
            }
        }
        value
    });
    max_eigenvalue_norm(&m)
}

fn max_eigenvalue_norm(m: &DMatrix<f64>) -> f32 {
    m.complex_eigenvalues()
        .iter()
        .map(|ev| ev.norm())
        .fold(0.0f64, f64::max) as f32
}
