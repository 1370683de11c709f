//! Input series generation and loading.
//!
//! The engine treats every dataset as an opaque ordered sequence of float
//! vectors. Three series are generated here (the Mackey-Glass chaotic
//! signal, a two-tone sine blend, and a constant), plus a plain-text loader
//! for externally supplied data.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which input series to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetLabel {
    MackeyGlass,
    Sine,
    Constant,
}

impl DatasetLabel {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetLabel::MackeyGlass => "mackey-glass",
            DatasetLabel::Sine => "sine",
            DatasetLabel::Constant => "constant",
        }
    }

    /// Generate `len` steps of the selected series.
    pub fn series(&self, len: usize) -> Vec<Vec<f32>> {
        match self {
            DatasetLabel::MackeyGlass => mackey_glass(len),
            DatasetLabel::Sine => sine_blend(len),
            DatasetLabel::Constant => constant(len, 10.0),
        }
    }
}

/// Mackey-Glass delay differential equation
/// `ẋ = β·x(t−τ)/(1 + x(t−τ)^10) − γ·x(t)` with β = 0.2, γ = 0.1, τ = 17,
/// Euler-integrated at dt = 0.1 and subsampled to unit time steps. Chaotic
/// for τ > 16.8; values stay within (0, 2) from the standard x₀ = 1.2 start.
pub fn mackey_glass(len: usize) -> Vec<Vec<f32>> {
    const BETA: f64 = 0.2;
    const GAMMA: f64 = 0.1;
    const TAU: f64 = 17.0;
    const DT: f64 = 0.1;
    const SUBSAMPLE: usize = 10;

    let delay_steps = (TAU / DT) as usize;
    let total = len * SUBSAMPLE + delay_steps;
    let mut x = vec![1.2f64; total + 1];

    for t in delay_steps..total {
        let lagged = x[t - delay_steps];
        let derivative = BETA * lagged / (1.0 + lagged.powi(10)) - GAMMA * x[t];
        x[t + 1] = x[t] + DT * derivative;
    }

    (0..len)
        .map(|i| vec![x[delay_steps + i * SUBSAMPLE] as f32])
        .collect()
}

/// Two-tone blend `sin(t) + 0.1·cos(10t)` on a 0.1 step grid.
pub fn sine_blend(len: usize) -> Vec<Vec<f32>> {
    (0..len)
        .map(|i| {
            let t = i as f32 * 0.1;
            vec![t.sin() + 0.1 * (10.0 * t).cos()]
        })
        .collect()
}

/// Constant series.
pub fn constant(len: usize, value: f32) -> Vec<Vec<f32>> {
    vec![vec![value]; len]
}

/// Load a 1-D series from a text file, one float per line. Blank lines are
/// skipped.
pub fn load_series(path: impl AsRef<Path>) -> Result<Vec<Vec<f32>>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading series from {}", path.display()))?;
    let mut series = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: f32 = line
            .parse()
            .with_context(|| format!("{}:{}: not a number: {line:?}", path.display(), number + 1))?;
        series.push(vec![value]);
    }
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_lengths() {
        for label in [DatasetLabel::MackeyGlass, DatasetLabel::Sine, DatasetLabel::Constant] {
            let series = label.series(500);
            assert_eq!(series.len(), 500, "{}", label.name());
            assert_eq!(series[0].len(), 1);
        }
    }

    #[test]
    fn test_mackey_glass_bounded_and_varying() {
        let series = mackey_glass(2000);
        for step in &series {
            assert!(step[0] > 0.0 && step[0] < 2.0, "out of range: {}", step[0]);
        }
        let head = series[0][0];
        assert!(series.iter().any(|s| (s[0] - head).abs() > 0.1));
    }

    #[test]
    fn test_sine_blend_amplitude() {
        let series = sine_blend(1000);
        for step in &series {
            assert!(step[0].abs() <= 1.1 + 1e-6);
        }
    }

    #[test]
    fn test_constant_series() {
        let series = constant(10, 10.0);
        assert!(series.iter().all(|s| s == &vec![10.0]));
    }

    #[test]
    fn test_load_series_roundtrip() {
        let dir = std::env::temp_dir().join("meander_dataset_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("series.txt");
        std::fs::write(&path, "0.5\n-1.25\n\n3.0\n").unwrap();

        let series = load_series(&path).unwrap();
        assert_eq!(series, vec![vec![0.5], vec![-1.25], vec![3.0]]);
    }

    #[test]
    fn test_load_series_rejects_garbage() {
        let dir = std::env::temp_dir().join("meander_dataset_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("garbage.txt");
        std::fs::write(&path, "0.5\nnot-a-number\n").unwrap();
        assert!(load_series(&path).is_err());
    }
}
