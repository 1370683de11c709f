// Copyright (c) 2025-2026 brdigetrlol. All rights reserved.
// SPDX-License-Identifier: LicenseRef-Meander-Proprietary
// See LICENSE in the repository root for full license terms.

//! Phase orchestration: warmup → training → free run.
//!
//! The phases are strictly sequential and none is skipped while its
//! configured length is nonzero. Warmup drives the reservoir noiselessly to
//! let transients decay; training delegates to `RidgeTrainer` over the next
//! window; the free run feeds the reservoir's own output back as input,
//! closed-loop autoregressive prediction with no ground truth.
//!
//! The delay sweep compares candidate training delays on independent clones
//! of one reservoir, so every candidate starts from the identical state and
//! the source reservoir is left untouched.

use tracing::info;

use crate::config::SimulationPlan;
use crate::error::{EsnError, Result};
use crate::reservoir::SpatialReservoir;
use crate::training::{prediction_error, RidgeTrainer};

/// One delay candidate's result from a sweep.
#[derive(Debug, Clone)]
pub struct DelayOutcome {
    pub delay: usize,
    /// Summed prediction error against the delay-shifted ground truth.
    pub error: f32,
    pub predictions: Vec<Vec<f32>>,
}

/// Executes a `SimulationPlan` against a reservoir.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    pub plan: SimulationPlan,
    pub trainer: RidgeTrainer,
}

impl Simulator {
    pub fn new(plan: SimulationPlan) -> Self {
        Self {
            plan,
            trainer: RidgeTrainer::default(),
        }
    }

    pub fn with_trainer(mut self, trainer: RidgeTrainer) -> Self {
        self.trainer = trainer;
        self
    }

    /// Run the full warmup → training → free-run sequence.
    ///
    /// `expected` must cover at least `len_training` steps; only that prefix
    /// is used. Fails with `InsufficientInput`, before any state mutation,
    /// when `len_warmup + len_training` exceeds the input length (the
    /// equal-length case succeeds). Returns the free-run predictions.
    pub fn run(
        &self,
        reservoir: &mut SpatialReservoir,
        inputs: &[Vec<f32>],
        expected: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>> {
        let plan = &self.plan;
        let required = plan.len_warmup + plan.len_training;
        if required > inputs.len() {
            return Err(EsnError::InsufficientInput {
                required,
                available: inputs.len(),
            });
        }
        assert!(
            expected.len() >= plan.len_training,
            "expected sequence shorter than the training window"
        );

        if plan.reset_before_run {
            reservoir.reset_state();
        }

        if plan.len_warmup > 0 {
            info!(steps = plan.len_warmup, "warmup phase");
            reservoir.warmup(&inputs[..plan.len_warmup])?;
        }

        if plan.len_training > 0 {
            info!(steps = plan.len_training, "training phase");
            let window = &inputs[plan.len_warmup..plan.len_warmup + plan.len_training];
            self.trainer
                .train(reservoir, window, &expected[..plan.len_training])?;
        }

        info!(steps = plan.free_run_len, "free-run phase");
        let mut predictions = Vec::with_capacity(plan.free_run_len);
        for _ in 0..plan.free_run_len {
            let feedback = reservoir.output().to_vec();
            reservoir.step(&feedback, false)?;
            predictions.push(reservoir.output().to_vec());
        }
        Ok(predictions)
    }

    /// Run against a single self-predicting series: the training target is
    /// the series itself, shifted back by the plan's delay to compensate the
    /// propagation lag across the spatial reservoir.
    pub fn run_series(
        &self,
        reservoir: &mut SpatialReservoir,
        series: &[Vec<f32>],
    ) -> Result<Vec<Vec<f32>>> {
        let plan = &self.plan;
        assert!(
            plan.delay <= plan.len_warmup,
            "delay ({}) cannot exceed warmup length ({})",
            plan.delay,
            plan.len_warmup
        );
        let required = plan.len_warmup + plan.len_training;
        if required > series.len() {
            return Err(EsnError::InsufficientInput {
                required,
                available: series.len(),
            });
        }
        let start = plan.len_warmup - plan.delay;
        let expected = &series[start..start + plan.len_training];
        self.run(reservoir, series, expected)
    }

    /// Train and free-run one independent clone per candidate delay, scoring
    /// each prediction run against the correspondingly shifted ground truth.
    /// The source reservoir is not mutated.
    pub fn delay_sweep(
        &self,
        reservoir: &SpatialReservoir,
        series: &[Vec<f32>],
        delays: &[usize],
    ) -> Result<Vec<DelayOutcome>> {
        let mut outcomes = Vec::with_capacity(delays.len());
        for &delay in delays {
            let mut candidate = self.clone();
            candidate.plan.delay = delay;

            let mut clone = reservoir.clone();
            let predictions = candidate.run_series(&mut clone, series)?;

            let start = self.plan.len_warmup + self.plan.len_training - delay;
            let scored = predictions.len().min(series.len().saturating_sub(start));
            let error = prediction_error(&predictions[..scored], &series[start..start + scored]);
            info!(delay, error, "delay candidate evaluated");

            outcomes.push(DelayOutcome {
                delay,
                error,
                predictions,
            });
        }
        Ok(outcomes)
    }
}

/// The sweep outcome with the smallest error.
pub fn best_delay(outcomes: &[DelayOutcome]) -> Option<&DelayOutcome> {
    outcomes
        .iter()
        .min_by(|a, b| a.error.partial_cmp(&b.error).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EsnConfig;

    fn sine_series(len: usize) -> Vec<Vec<f32>> {
        (0..len).map(|i| vec![(i as f32 * 0.1).sin()]).collect()
    }

    fn small_reservoir(seed: u64) -> SpatialReservoir {
        let config = EsnConfig {
            number_neurons: 50,
            seed,
            ..EsnConfig::default()
        };
        SpatialReservoir::new(config).unwrap()
    }

    fn small_plan() -> SimulationPlan {
        SimulationPlan {
            len_warmup: 20,
            len_training: 60,
            free_run_len: 30,
            delay: 0,
            reset_before_run: false,
        }
    }

    #[test]
    fn test_insufficient_input_boundary() {
        let simulator = Simulator::new(small_plan());
        let series = sine_series(80);

        // Exactly warmup + training succeeds.
        let mut reservoir = small_reservoir(2);
        assert!(simulator.run_series(&mut reservoir, &series).is_ok());

        // One step short fails before any mutation.
        let short = sine_series(79);
        let mut untouched = small_reservoir(2);
        let err = simulator.run_series(&mut untouched, &short).unwrap_err();
        assert!(matches!(
            err,
            EsnError::InsufficientInput {
                required: 80,
                available: 79
            }
        ));
        assert_eq!(untouched.steps(), 0);
        assert!(!untouched.is_trained());
    }

    #[test]
    fn test_phase_sequence_step_accounting() {
        let simulator = Simulator::new(small_plan());
        let series = sine_series(120);
        let mut reservoir = small_reservoir(7);

        let predictions = simulator.run_series(&mut reservoir, &series).unwrap();
        assert_eq!(predictions.len(), 30);
        assert!(reservoir.is_trained());
        // Warmup steps + (training - 1) collection steps + free-run steps.
        assert_eq!(reservoir.steps(), 20 + 59 + 30);
    }

    #[test]
    fn test_free_run_is_closed_loop() {
        let simulator = Simulator::new(small_plan());
        let series = sine_series(120);
        let mut reservoir = small_reservoir(7);

        let predictions = simulator.run_series(&mut reservoir, &series).unwrap();
        // The final prediction is the reservoir's current output.
        assert_eq!(predictions.last().unwrap().as_slice(), reservoir.output());
    }

    #[test]
    fn test_delay_sweep_leaves_source_untouched() {
        let simulator = Simulator::new(small_plan());
        let series = sine_series(150);
        let reservoir = small_reservoir(9);

        let outcomes = simulator.delay_sweep(&reservoir, &series, &[0, 2, 5]).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(reservoir.steps(), 0);
        assert!(!reservoir.is_trained());

        let best = best_delay(&outcomes).unwrap();
        assert!(outcomes.iter().all(|o| best.error <= o.error));
    }

    #[test]
    fn test_delay_sweep_deterministic() {
        let simulator = Simulator::new(small_plan());
        let series = sine_series(150);
        let reservoir = small_reservoir(11);

        let a = simulator.delay_sweep(&reservoir, &series, &[0, 3]).unwrap();
        let b = simulator.delay_sweep(&reservoir, &series, &[0, 3]).unwrap();
        for (oa, ob) in a.iter().zip(b.iter()) {
            assert_eq!(oa.predictions, ob.predictions);
        }
    }
}
