use std::env;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::confidence::Confidence;
use crate::error::{MatchError, RejectionReason};
use crate::model::{self, ScoredMatch};
use crate::outputs::ModelOutputs;
use crate::snapshot::MatchSnapshot;
use crate::value::{self, ValueOpportunity};

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    /// Descending edge across every match.
    pub opportunities: Vec<ValueOpportunity>,
    pub matches: Vec<ModelOutputs>,
    pub rejections: Vec<Rejection>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub match_id: u64,
    pub fixture: String,
    #[serde(flatten)]
    pub cause: RejectionCause,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum RejectionCause {
    Data { reason: RejectionReason },
    Computation { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub snapshots: usize,
    pub modelled: usize,
    pub rejected: usize,
    pub failed: usize,
    pub opportunities: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub mean_edge: f64,
    pub total_stake: f64,
}

impl BatchReport {
    pub fn top(&self, n: usize) -> &[ValueOpportunity] {
        &self.opportunities[..n.min(self.opportunities.len())]
    }
}

/// Per-match generator: reproducible from `seed` whatever thread runs the match.
pub fn match_rng(seed: Option<u64>, match_id: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ match_id.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_entropy(),
    }
}

pub fn run_batch(snapshots: &[MatchSnapshot], cfg: &EngineConfig) -> BatchReport {
    let pool = build_pool();
    let results: Vec<Result<ScoredMatch, MatchError>> = with_pool(&pool, || {
        snapshots
            .par_iter()
            .map(|snap| {
                let mut rng = match_rng(cfg.monte_carlo.seed, snap.match_id);
                model::score_match(snap, cfg, &mut rng)
            })
            .collect()
    });

    let mut report = BatchReport {
        generated_at: Utc::now(),
        opportunities: Vec::new(),
        matches: Vec::new(),
        rejections: Vec::new(),
        summary: BatchSummary {
            snapshots: snapshots.len(),
            ..BatchSummary::default()
        },
    };

    for (snap, result) in snapshots.iter().zip(results) {
        match result {
            Ok(scored) => {
                report.summary.modelled += 1;
                report.opportunities.extend(scored.opportunities);
                report.matches.push(scored.outputs);
            }
            Err(MatchError::Rejected(reason)) => {
                debug!(match_id = snap.match_id, %reason, "snapshot rejected");
                report.summary.rejected += 1;
                report.rejections.push(Rejection {
                    match_id: snap.match_id,
                    fixture: snap.fixture_label(),
                    cause: RejectionCause::Data { reason },
                });
            }
            Err(MatchError::Computation(message)) => {
                warn!(match_id = snap.match_id, %message, "match failed");
                report.summary.failed += 1;
                report.rejections.push(Rejection {
                    match_id: snap.match_id,
                    fixture: snap.fixture_label(),
                    cause: RejectionCause::Computation { message },
                });
            }
        }
    }

    value::rank(&mut report.opportunities);
    tally(&mut report.summary, &report.opportunities);
    let s = &report.summary;
    info!(
        snapshots = s.snapshots,
        modelled = s.modelled,
        rejected = s.rejected,
        failed = s.failed,
        opportunities = s.opportunities,
        high = s.high,
        "batch scored"
    );
    report
}

fn tally(summary: &mut BatchSummary, opps: &[ValueOpportunity]) {
    summary.opportunities = opps.len();
    for opp in opps {
        match opp.confidence {
            Confidence::High => summary.high += 1,
            Confidence::Medium => summary.medium += 1,
            Confidence::Low => summary.low += 1,
        }
        summary.total_stake += opp.kelly_stake;
    }
    if !opps.is_empty() {
        summary.mean_edge = opps.iter().map(|o| o.edge).sum::<f64>() / opps.len() as f64;
    }
}

fn build_pool() -> Option<rayon::ThreadPool> {
    let threads = env::var("EDGE_THREADS")
        .ok()
        .and_then(|val| val.trim().parse::<usize>().ok())?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, 64))
        .build()
        .ok()
}

fn with_pool<T>(pool: &Option<rayon::ThreadPool>, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    if let Some(pool) = pool.as_ref() {
        pool.install(action)
    } else {
        action()
    }
}
