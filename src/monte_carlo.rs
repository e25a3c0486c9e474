use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::Serialize;
use tracing::warn;

use crate::config::MonteCarloConfig;
use crate::error::MatchError;
use crate::scoregrid::{Prob3, ScoreGrid};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonteCarloSummary {
    pub samples: usize,
    pub analytic_weight: f64,
    pub empirical: Prob3,
    pub analytic: Prob3,
    /// Largest 1X2 gap between the analytic and sampled derivations.
    pub max_divergence: f64,
    pub mean_total_goals: f64,
    pub std_total_goals: f64,
}

/// Draws `samples` scorelines from the grid and tallies them into an empirical grid.
pub fn sample_grid<R: Rng + ?Sized>(
    grid: &ScoreGrid,
    samples: usize,
    rng: &mut R,
) -> Result<(ScoreGrid, f64, f64), MatchError> {
    if samples == 0 {
        return Err(MatchError::computation("monte carlo needs at least one sample"));
    }
    let dist = WeightedIndex::new(grid.cells())
        .map_err(|e| MatchError::computation(format!("score grid is not sampleable: {e}")))?;

    let mut counts = vec![0u32; grid.cells().len()];
    let mut sum = 0.0_f64;
    let mut sum_sq = 0.0_f64;
    for _ in 0..samples {
        let idx = dist.sample(rng);
        counts[idx] += 1;
        let (h, a) = grid.score_at(idx);
        let total = f64::from(h + a);
        sum += total;
        sum_sq += total * total;
    }

    let n = samples as f64;
    let mean = sum / n;
    let var = (sum_sq / n - mean * mean).max(0.0);
    let weights = counts.into_iter().map(|c| f64::from(c) / n).collect();
    let empirical = ScoreGrid::from_weights(grid.max_goals(), weights)
        .ok_or_else(|| MatchError::computation("empty monte carlo tally"))?;
    Ok((empirical, mean, var.sqrt()))
}

/// Blends the analytic grid with a sampled one. Every goals market downstream
/// reads from the returned grid.
pub fn resample<R: Rng + ?Sized>(
    grid: &ScoreGrid,
    cfg: &MonteCarloConfig,
    rng: &mut R,
) -> Result<(ScoreGrid, MonteCarloSummary), MatchError> {
    let (empirical, mean, std) = sample_grid(grid, cfg.samples, rng)?;
    let analytic_1x2 = grid.match_result();
    let empirical_1x2 = empirical.match_result();
    let divergence = analytic_1x2.max_abs_diff(&empirical_1x2);
    if divergence > cfg.divergence_warn {
        warn!(
            divergence,
            samples = cfg.samples,
            "monte carlo 1X2 drifted from the analytic grid"
        );
    }

    let blended = grid
        .blend(&empirical, cfg.analytic_weight)
        .ok_or_else(|| MatchError::computation("could not blend monte carlo grid"))?;

    Ok((
        blended,
        MonteCarloSummary {
            samples: cfg.samples,
            analytic_weight: cfg.analytic_weight,
            empirical: empirical_1x2,
            analytic: analytic_1x2,
            max_divergence: divergence,
            mean_total_goals: mean,
            std_total_goals: std,
        },
    ))
}
