//! Meander Spatial ESN demo and benchmark runner.
//!
//! Pipeline: load (or default) run parameters → generate the input series →
//! build the spatial reservoir → report the connectivity census and the
//! effective spectral radius → sweep candidate training delays → report
//! per-delay free-run error and the best candidate.
//!
//! Usage: `meander-bench [params.json] [save-path.json]`
//! The second argument persists the stamped parameters actually used.

use std::env;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use meander_engine::{
    best_delay, nmse, RidgeTrainer, RunParams, Simulator, SpatialReservoir,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut params = match env::args().nth(1) {
        Some(path) => RunParams::load(&path).context("loading run parameters")?,
        None => RunParams::default(),
    };
    params.stamp();

    println!("=== Meander Spatial ESN ===\n");
    println!("dataset          : {}", params.label_input.name());
    println!("neurons requested: {}", params.esn.number_neurons);
    println!("leak rate        : {}", params.esn.leak_rate);
    println!("spectral radius  : {} ({:?})", params.esn.spectral_radius, params.esn.calibration);
    println!("intern sparsity  : {}", params.esn.intern_sparsity);
    println!("extern sparsity  : {}", params.esn.external_sparsity);
    println!("seed             : {}", params.esn.seed);
    println!(
        "phases           : warmup {} / train {} / free-run {}",
        params.plan.len_warmup, params.plan.len_training, params.plan.free_run_len
    );

    let max_delay = params.delays.iter().copied().max().unwrap_or(0);
    let series_len =
        params.plan.len_warmup + params.plan.len_training + params.plan.free_run_len + max_delay;
    let series = params.label_input.series(series_len);

    let reservoir = SpatialReservoir::new(params.esn.clone())?;
    let census = reservoir.census();
    println!("\n─── Connectivity ───");
    println!("neurons realized : {}", reservoir.num_neurons());
    println!("input edges      : {}", census.input_connections);
    println!("internal edges   : {}", census.internal_connections);
    println!("output neurons   : {}", census.output_neurons);
    println!(
        "radius of W alone: {:.4}",
        reservoir.weights.effective_spectral_radius()
    );

    let simulator = Simulator::new(params.plan.clone())
        .with_trainer(RidgeTrainer::new(params.esn.epsilon));

    println!("\n─── Delay sweep ───");
    let outcomes = simulator.delay_sweep(&reservoir, &series, &params.delays)?;
    for outcome in &outcomes {
        let start = params.plan.len_warmup + params.plan.len_training - outcome.delay;
        let scored = outcome.predictions.len().min(series.len() - start);
        let predicted: Vec<f32> = outcome.predictions[..scored].iter().map(|p| p[0]).collect();
        let actual: Vec<f32> = series[start..start + scored].iter().map(|s| s[0]).collect();
        println!(
            "delay {:3} : error {:10.4}  nmse {:8.4}",
            outcome.delay,
            outcome.error,
            nmse(&predicted, &actual)
        );
    }
    if let Some(best) = best_delay(&outcomes) {
        println!("\nbest delay: {} (error {:.4})", best.delay, best.error);
    }

    if let Some(path) = env::args().nth(2) {
        params.save(&path)?;
        println!("parameters saved to {path}");
    }

    Ok(())
}
