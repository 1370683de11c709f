//! Runtime configuration for the Meander spatial ESN.
//!
//! A single immutable `EsnConfig` is constructed once at startup and handed
//! to the engine; there is no ambient global state. `RunParams` is the flat
//! persisted record of everything a run used, round-tripped losslessly
//! through JSON and stamped with timestamp and git metadata.

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::DatasetLabel;

/// How the global gain of the internal weight matrix is calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpectralCalibration {
    /// Scale `w` by `spectral_radius / ρ(pseudo_w)` where `pseudo_w` is the
    /// closed-loop matrix including the implicit input/output feedback path.
    /// Fails with `DegenerateSpectrum` when ρ is zero.
    Normalized,
    /// Scale `w` by `spectral_radius` directly, with no eigenvalue correction.
    Flat,
}

/// Where injected noise enters the update rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoiseInjection {
    /// Added to the raw input vector before bias augmentation.
    Input,
    /// Added to the pre-nonlinearity sum, reservoir-wide.
    PreActivation,
}

/// Reservoir hyper-parameters. Immutable once the reservoir is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EsnConfig {
    /// Requested neuron count. The blue-noise sampler returns an approximate
    /// count; the realized count is authoritative after construction.
    pub number_neurons: usize,
    /// Input dimensionality (excluding the bias column).
    pub input_dim: usize,
    /// Output dimensionality.
    pub output_dim: usize,
    /// Gating scale for input/output connection probability.
    pub external_sparsity: f32,
    /// Gating scale for internal distance-based connectivity. Higher means
    /// more internal connections survive.
    pub intern_sparsity: f32,
    /// Target spectral radius for calibration.
    pub spectral_radius: f32,
    /// Leaky-integrator blend factor in (0, 1]. Near 1: reactive, short
    /// memory. Near 0: sluggish, long memory.
    pub leak_rate: f32,
    /// Amplitude of injected uniform noise.
    pub noise: f32,
    /// Ridge regularization constant for readout training.
    pub epsilon: f32,
    /// Seed for every stochastic draw: sampling, weights, activity init, noise.
    pub seed: u64,
    /// Width of the sampling rectangle (x ∈ [0, xmax]).
    pub xmax: f32,
    /// Height of the sampling rectangle (y ∈ [0, ymax]).
    pub ymax: f32,
    /// Candidate attempts per active point in Bridson sampling.
    pub bridson_k: usize,
    /// Spectral calibration mode.
    pub calibration: SpectralCalibration,
    /// Noise injection point.
    pub noise_injection: NoiseInjection,
}

impl Default for EsnConfig {
    fn default() -> Self {
        Self {
            number_neurons: 400,
            input_dim: 1,
            output_dim: 1,
            external_sparsity: 0.3,
            intern_sparsity: 0.15,
            spectral_radius: 1.0,
            leak_rate: 0.7,
            noise: 1e-3,
            epsilon: 1e-8,
            seed: 21,
            xmax: 1.0,
            ymax: 0.5,
            bridson_k: 30,
            calibration: SpectralCalibration::Normalized,
            noise_injection: NoiseInjection::Input,
        }
    }
}

/// Phase lengths for one warmup → train → free-run pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationPlan {
    /// Driven steps before training, letting transients decay.
    pub len_warmup: usize,
    /// Steps of the supervised training window.
    pub len_training: usize,
    /// Closed-loop steps after training.
    pub free_run_len: usize,
    /// Backward shift of the training target, compensating the propagation
    /// lag across the spatial reservoir. Must not exceed `len_warmup`.
    pub delay: usize,
    /// Re-randomize reservoir state (keeping layout and weights) before the
    /// warmup phase begins.
    pub reset_before_run: bool,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            len_warmup: 100,
            len_training: 1000,
            free_run_len: 1000,
            delay: 0,
            reset_before_run: false,
        }
    }
}

/// The full persisted record of a run: reservoir config, plan, dataset
/// selection, and the metadata stamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    pub label_input: DatasetLabel,
    /// Flattened so the saved file stays one flat key-value map.
    #[serde(flatten)]
    pub esn: EsnConfig,
    #[serde(flatten)]
    pub plan: SimulationPlan,
    /// Candidate training delays for the sweep.
    pub delays: Vec<usize>,
    pub timestamp: String,
    pub git_branch: String,
    pub git_hash: String,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            label_input: DatasetLabel::MackeyGlass,
            esn: EsnConfig::default(),
            plan: SimulationPlan::default(),
            delays: vec![0],
            timestamp: String::new(),
            git_branch: String::new(),
            git_hash: String::new(),
        }
    }
}

impl RunParams {
    /// Fill the timestamp and git metadata fields. Outside a git checkout the
    /// git fields are left empty.
    pub fn stamp(&mut self) {
        self.timestamp = chrono::Local::now().to_rfc2822();
        self.git_branch = git_output(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();
        self.git_hash = git_output(&["rev-parse", "HEAD"]).unwrap_or_default();
    }

    /// Save as pretty-printed JSON. Round-trips losslessly through `load`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("writing run parameters to {}", path.display()))?;
        debug!(path = %path.display(), "saved run parameters");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading run parameters from {}", path.display()))?;
        let params = serde_json::from_str(&json)
            .with_context(|| format!("parsing run parameters from {}", path.display()))?;
        debug!(path = %path.display(), "loaded run parameters");
        Ok(params)
    }
}

fn git_output(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    if !out.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&out.stdout).trim().to_string())
}
