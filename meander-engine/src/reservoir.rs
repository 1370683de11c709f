// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Meander-Proprietary
// See LICENSE in the repository root for full license terms.

//! The spatial reservoir: per-neuron state plus the leaky-integrator dynamics.
//!
//! `SpatialReservoir` owns its matrices exclusively; nothing outside this
//! crate mutates activity except through `step`. Cloning produces a fully
//! independent copy sharing no storage, so clones can be simulated on
//! separate threads without locking.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::{EsnConfig, NoiseInjection};
use crate::connectivity::{ConnectivityCensus, ReservoirWeights};
use crate::error::{EsnError, Result};
use crate::recorder::ActivityRecorder;
use crate::sampling;

/// Per-neuron record as a struct-of-arrays: index i refers to the same
/// physical neuron across all three containers.
#[derive(Debug, Clone)]
pub struct NeuronState {
    /// Current internal state, driven toward [-1, 1] by the nonlinearity.
    pub activities: Vec<f32>,
    /// Fixed at construction; x ∈ [0, xmax], y ∈ [0, ymax].
    pub positions: Vec<[f32; 2]>,
    /// Incremental mean of activity since the last reset. Observational only.
    pub means: Vec<f32>,
}

/// Explicit two-state readout machine: the output map exists only after
/// training, and `step` recomputes the output only in the trained state.
#[derive(Debug, Clone)]
pub enum ReadoutStage {
    Untrained,
    /// Trained readout matrix, output_dim×N row-major.
    Trained { w_out: Vec<f32> },
}

/// A spatially-constrained echo state network.
#[derive(Debug, Clone)]
pub struct SpatialReservoir {
    pub config: EsnConfig,
    pub weights: ReservoirWeights,
    pub state: NeuronState,
    pub recorder: ActivityRecorder,
    readout: ReadoutStage,
    /// Last computed output; zero until trained.
    y: Vec<f32>,
    /// Steps taken since the last reset.
    steps: u64,
    rng: StdRng,
}

impl SpatialReservoir {
    /// Build a reservoir from configuration: blue-noise sample the neuron
    /// positions, then synthesize and calibrate the weight structures.
    ///
    /// The realized neuron count is taken from the sampler and may differ
    /// from `config.number_neurons`.
    pub fn new(config: EsnConfig) -> Result<Self> {
        let rng = StdRng::seed_from_u64(config.seed);
        let reservoir = Self::from_rng(config, rng)?;
        info!(
            neurons = reservoir.num_neurons(),
            requested = reservoir.config.number_neurons,
            "reservoir created"
        );
        Ok(reservoir)
    }

    fn from_rng(config: EsnConfig, mut rng: StdRng) -> Result<Self> {
        let positions = sampling::bridson_sampling(
            config.number_neurons,
            config.xmax,
            config.ymax,
            config.bridson_k,
            &mut rng,
        );
        let weights = ReservoirWeights::build(&positions, &config, &mut rng)?;

        let n = positions.len();
        let activities: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let means = activities.clone();
        let y = vec![0.0; config.output_dim];

        Ok(Self {
            config,
            weights,
            state: NeuronState {
                activities,
                positions,
                means,
            },
            recorder: ActivityRecorder::default(),
            readout: ReadoutStage::Untrained,
            y,
            steps: 0,
            rng,
        })
    }

    /// Realized neuron count.
    pub fn num_neurons(&self) -> usize {
        self.weights.n
    }

    pub fn output_dim(&self) -> usize {
        self.weights.output_dim
    }

    /// Last computed output vector. Zero until trained.
    pub fn output(&self) -> &[f32] {
        &self.y
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn readout(&self) -> &ReadoutStage {
        &self.readout
    }

    pub fn is_trained(&self) -> bool {
        matches!(self.readout, ReadoutStage::Trained { .. })
    }

    pub fn census(&self) -> ConnectivityCensus {
        self.weights.census()
    }

    /// Advance the reservoir by one step.
    ///
    /// An empty `input` stands for a zero vector of the configured input
    /// width. Noise, when injected, enters at the configured point: added to
    /// the raw input before bias augmentation (`NoiseInjection::Input`), or
    /// to the pre-tanh sum (`NoiseInjection::PreActivation`). The feedback
    /// matrix `w_back` is never applied; its contribution is identically
    /// zero in this formulation.
    ///
    /// Fails with `NumericInstability` when any updated activity is
    /// non-finite; the reservoir must then be discarded.
    pub fn step(&mut self, input: &[f32], inject_noise: bool) -> Result<()> {
        let n = self.weights.n;
        let in_dim = self.weights.input_dim;
        let in_cols = 1 + in_dim;

        // Bias-augmented input.
        let mut u = vec![0.0f32; in_cols];
        u[0] = 1.0;
        if !input.is_empty() {
            assert_eq!(input.len(), in_dim, "input width mismatch");
            u[1..].copy_from_slice(input);
        }
        if inject_noise && self.config.noise_injection == NoiseInjection::Input {
            for value in &mut u[1..] {
                *value += self.config.noise * self.rng.gen_range(-1.0..1.0);
            }
        }

        // pre = w_in·u + w·activity
        let mut pre = vec![0.0f32; n];
        for i in 0..n {
            let mut sum = 0.0f32;
            let in_row = i * in_cols;
            for c in 0..in_cols {
                sum += self.weights.w_in[in_row + c] * u[c];
            }
            let w_row = i * n;
            for j in 0..n {
                sum += self.weights.w[w_row + j] * self.state.activities[j];
            }
            pre[i] = sum;
        }
        if inject_noise && self.config.noise_injection == NoiseInjection::PreActivation {
            for value in &mut pre {
                *value += self.config.noise * self.rng.gen_range(-1.0..1.0);
            }
        }

        // Leaky-integrator update.
        let alpha = self.config.leak_rate;
        for i in 0..n {
            self.state.activities[i] =
                (1.0 - alpha) * self.state.activities[i] + alpha * pre[i].tanh();
        }
        if self.state.activities.iter().any(|a| !a.is_finite()) {
            return Err(EsnError::NumericInstability { step: self.steps });
        }

        // Linear readout, trained state only.
        if let ReadoutStage::Trained { w_out } = &self.readout {
            for k in 0..self.weights.output_dim {
                let row = k * n;
                let mut sum = 0.0f32;
                for j in 0..n {
                    sum += w_out[row + j] * self.state.activities[j];
                }
                self.y[k] = sum;
            }
        }

        // Incremental mean, then the step counter.
        let count = self.steps as f32;
        for i in 0..n {
            self.state.means[i] =
                (self.state.means[i] * count + self.state.activities[i]) / (count + 1.0);
        }
        self.steps += 1;

        if self.recorder.is_recording() {
            let snapshot = self.state.activities.clone();
            self.recorder.record(snapshot);
        }
        Ok(())
    }

    /// Drive the reservoir through the warmup window: no noise, no readout
    /// collection, only transient decay.
    pub fn warmup(&mut self, inputs: &[Vec<f32>]) -> Result<()> {
        debug!(steps = inputs.len(), "warmup");
        for input in inputs {
            self.step(input, false)?;
        }
        Ok(())
    }

    /// Re-randomize activity and drop the trained readout. The spatial
    /// layout and all weight structures are kept; warmup should be redone.
    pub fn reset_state(&mut self) {
        let n = self.weights.n;
        self.state.activities = (0..n).map(|_| self.rng.gen_range(-1.0..1.0)).collect();
        self.state.means = self.state.activities.clone();
        self.readout = ReadoutStage::Untrained;
        self.y = vec![0.0; self.weights.output_dim];
        self.steps = 0;
        debug!("reservoir state reset");
    }

    /// Complete reset: re-sample neuron positions and re-derive every weight
    /// structure from scratch. The RNG stream continues, so the rebuilt
    /// layout differs from the original while the whole sequence stays
    /// deterministic for a fixed seed.
    pub fn rebuild(&mut self) -> Result<()> {
        let rng = self.rng.clone();
        *self = Self::from_rng(self.config.clone(), rng)?;
        info!(neurons = self.num_neurons(), "reservoir rebuilt");
        Ok(())
    }

    /// Install a trained readout and recompute the output from the current
    /// activity, so closed-loop simulation can begin seamlessly. Repeated
    /// installation overwrites.
    pub(crate) fn install_readout(&mut self, w_out: Vec<f32>) {
        assert_eq!(w_out.len(), self.weights.output_dim * self.weights.n);
        let n = self.weights.n;
        for k in 0..self.weights.output_dim {
            let row = k * n;
            let mut sum = 0.0f32;
            for j in 0..n {
                sum += w_out[row + j] * self.state.activities[j];
            }
            self.y[k] = sum;
        }
        self.readout = ReadoutStage::Trained { w_out };
    }

    /// Start recording activity history, snapshotting the current state
    /// first.
    pub fn begin_record(&mut self) {
        self.recorder.begin();
        let snapshot = self.state.activities.clone();
        self.recorder.record(snapshot);
    }

    pub fn end_record(&mut self) {
        self.recorder.end();
    }

    /// Index of the neuron nearest to a plane position.
    pub fn nearest_neuron(&self, x: f32, y: f32) -> usize {
        let mut best = 0;
        let mut best_d2 = f32::INFINITY;
        for (i, p) in self.state.positions.iter().enumerate() {
            let dx = p[0] - x;
            let dy = p[1] - y;
            let d2 = dx * dx + dy * dy;
            if d2 < best_d2 {
                best_d2 = d2;
                best = i;
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectralCalibration;

    fn small_config(seed: u64) -> EsnConfig {
        EsnConfig {
            number_neurons: 60,
            seed,
            calibration: SpectralCalibration::Normalized,
            ..EsnConfig::default()
        }
    }

    #[test]
    fn test_realized_count_authoritative() {
        let reservoir = SpatialReservoir::new(small_config(21)).unwrap();
        let n = reservoir.num_neurons();
        assert!(n > 0);
        assert_eq!(reservoir.state.activities.len(), n);
        assert_eq!(reservoir.state.positions.len(), n);
        assert_eq!(reservoir.state.means.len(), n);
        assert_eq!(reservoir.weights.w.len(), n * n);
    }

    #[test]
    fn test_empty_input_equals_zero_input() {
        let mut a = SpatialReservoir::new(small_config(4)).unwrap();
        let mut b = a.clone();

        a.step(&[], false).unwrap();
        b.step(&[0.0], false).unwrap();
        assert_eq!(a.state.activities, b.state.activities);
    }

    #[test]
    fn test_output_stays_zero_until_trained() {
        let mut reservoir = SpatialReservoir::new(small_config(8)).unwrap();
        reservoir.step(&[0.5], false).unwrap();
        reservoir.step(&[0.25], false).unwrap();
        assert!(!reservoir.is_trained());
        assert_eq!(reservoir.output(), &[0.0]);

        let n = reservoir.num_neurons();
        reservoir.install_readout(vec![0.01; n]);
        assert!(reservoir.is_trained());
        reservoir.step(&[0.5], false).unwrap();
        let expected: f32 = reservoir.state.activities.iter().map(|a| 0.01 * a).sum();
        assert!((reservoir.output()[0] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_non_finite_activity_is_fatal() {
        let mut reservoir = SpatialReservoir::new(small_config(2)).unwrap();
        reservoir.state.activities[0] = f32::NAN;
        let err = reservoir.step(&[0.1], false).unwrap_err();
        assert!(matches!(err, EsnError::NumericInstability { .. }));
    }

    #[test]
    fn test_running_mean_first_step() {
        let mut reservoir = SpatialReservoir::new(small_config(11)).unwrap();
        reservoir.step(&[0.3], false).unwrap();
        // After the first step the mean equals the current activity:
        // (mean·0 + a) / 1 = a.
        assert_eq!(reservoir.state.means, reservoir.state.activities);
        assert_eq!(reservoir.steps(), 1);
    }

    #[test]
    fn test_clone_shares_no_state() {
        let mut original = SpatialReservoir::new(small_config(6)).unwrap();
        let clone = original.clone();

        original.step(&[1.0], false).unwrap();
        assert_ne!(original.state.activities, clone.state.activities);
        assert_eq!(clone.steps(), 0);
    }

    #[test]
    fn test_clone_reproduces_trajectory() {
        let mut original = SpatialReservoir::new(small_config(6)).unwrap();
        let mut clone = original.clone();

        for i in 0..20 {
            let v = (i as f32 * 0.1).sin();
            original.step(&[v], true).unwrap();
            clone.step(&[v], true).unwrap();
        }
        // Identical RNG stream in the clone: bit-identical trajectories even
        // with noise injection.
        assert_eq!(original.state.activities, clone.state.activities);
    }

    #[test]
    fn test_reset_state_keeps_layout() {
        let mut reservoir = SpatialReservoir::new(small_config(14)).unwrap();
        let positions = reservoir.state.positions.clone();
        let w = reservoir.weights.w.clone();
        let n = reservoir.num_neurons();
        reservoir.install_readout(vec![0.5; n]);
        reservoir.step(&[0.2], false).unwrap();

        reservoir.reset_state();
        assert!(!reservoir.is_trained());
        assert_eq!(reservoir.steps(), 0);
        assert_eq!(reservoir.state.positions, positions);
        assert_eq!(reservoir.weights.w, w);
    }

    #[test]
    fn test_rebuild_resamples_layout() {
        let mut reservoir = SpatialReservoir::new(small_config(14)).unwrap();
        let positions = reservoir.state.positions.clone();
        reservoir.rebuild().unwrap();
        assert_ne!(reservoir.state.positions, positions);
    }

    #[test]
    fn test_recording_appends_snapshots() {
        let mut reservoir = SpatialReservoir::new(small_config(3)).unwrap();
        reservoir.begin_record();
        for _ in 0..5 {
            reservoir.step(&[0.1], false).unwrap();
        }
        reservoir.end_record();
        // Initial snapshot + one per step.
        assert_eq!(reservoir.recorder.len(), 6);
        assert_eq!(reservoir.recorder.history[5], reservoir.state.activities);
    }

    #[test]
    fn test_nearest_neuron() {
        let reservoir = SpatialReservoir::new(small_config(19)).unwrap();
        let target = reservoir.state.positions[7];
        assert_eq!(reservoir.nearest_neuron(target[0], target[1]), 7);
    }
}
