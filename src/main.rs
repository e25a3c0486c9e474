use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use matchday_edge::snapshot::{DataQuality, MatchSnapshot};
use matchday_edge::{BatchReport, EngineConfig, run_batch};

/// Scores pre-match snapshots and reports value bets.
#[derive(Parser)]
#[command(name = "matchday_edge")]
#[command(version, about = "Find value bets in football pre-match odds")]
struct Cli {
    /// JSON array of match snapshots
    #[arg(short, long)]
    input: PathBuf,

    /// Engine config JSON; defaults apply when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the full report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Monte Carlo seed, overriding config and EDGE_MC_SEED
    #[arg(long)]
    seed: Option<u64>,

    /// Opportunities listed in the summary
    #[arg(long, default_value = "10")]
    top: usize,

    /// Recompute data quality from snapshot contents instead of trusting the feed
    #[arg(long)]
    reassess: bool,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut cfg = EngineConfig::load(cli.config.as_deref())?;
    if let Some(seed) = cli.seed {
        cfg.monte_carlo.seed = Some(seed);
    }

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("read snapshots {}", cli.input.display()))?;
    let mut snapshots: Vec<MatchSnapshot> = serde_json::from_str(&raw)
        .with_context(|| format!("parse snapshots {}", cli.input.display()))?;
    if cli.reassess {
        for snap in &mut snapshots {
            snap.quality = DataQuality::assess(snap);
        }
    }
    info!(count = snapshots.len(), "snapshots loaded");

    let report = run_batch(&snapshots, &cfg);
    let json = serde_json::to_string_pretty(&report).context("serialize report")?;
    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("write report {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }
    print_summary(&report, cli.top);
    Ok(())
}

fn print_summary(report: &BatchReport, top: usize) {
    let s = &report.summary;
    eprintln!(
        "{} snapshots: {} modelled, {} rejected, {} failed, {} opportunities ({} ALTO / {} MÉDIO / {} BAIXO)",
        s.snapshots, s.modelled, s.rejected, s.failed, s.opportunities, s.high, s.medium, s.low
    );
    for (rank, opp) in report.top(top).iter().enumerate() {
        eprintln!(
            "{:>3}. {} vs {} | {} @ {:.2} | model {:.1}% vs implied {:.1}% | edge {:+.1}% | stake {:.2}% | {}",
            rank + 1,
            opp.home_team,
            opp.away_team,
            opp.label,
            opp.market_odd,
            opp.model_prob * 100.0,
            opp.implied_prob * 100.0,
            opp.edge * 100.0,
            opp.kelly_stake * 100.0,
            opp.confidence
        );
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("matchday_edge=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}
