use std::collections::BTreeMap;

use serde::Serialize;

use crate::context::{ContextReport, Urgency};
use crate::counts::{CountModel, ShotsForecast};
use crate::markets::{Market, Pick, Selection};
use crate::monte_carlo::MonteCarloSummary;
use crate::scoregrid::{Prob3, ScoreProb, Side};
use crate::strength::StrengthEstimate;
use crate::xg::ExpectedGoals;

pub const PROB_FLOOR: f64 = 1e-4;
pub const PROB_CEIL: f64 = 1.0 - 1e-4;

pub fn clamp_prob(p: f64) -> f64 {
    if p.is_nan() {
        return PROB_FLOOR;
    }
    p.clamp(PROB_FLOOR, PROB_CEIL)
}

/// Everything the model derived for one match, before and after context.
#[derive(Debug, Clone, Serialize)]
pub struct ModelOutputs {
    pub match_id: u64,
    pub fixture: String,
    pub suspect_venue: bool,
    pub strength: StrengthEstimate,
    /// Rates straight from the strength model, before context.
    pub xg_model: ExpectedGoals,
    pub form_points_home: f64,
    pub form_points_away: f64,
    pub rho: f64,
    pub home_xg: f64,
    pub away_xg: f64,
    pub result: Prob3,
    pub over_25: f64,
    pub btts: f64,
    pub expected_corners: f64,
    pub expected_cards: f64,
    pub corners_model: CountModel,
    pub cards_model: CountModel,
    pub shots: ShotsForecast,
    pub top_scores: Vec<ScoreProb>,
    pub monte_carlo: Option<MonteCarloSummary>,
    pub urgency: Urgency,
    pub context: Option<ContextReport>,
    pub probabilities: BTreeMap<Pick, f64>,
    pub player_props: Vec<PlayerPropProb>,
}

/// Empirical hit rate of one player over a shots line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerPropProb {
    pub player: String,
    pub side: Side,
    pub market: Market,
    pub selection: Selection,
    pub prob: f64,
    pub hits: usize,
    pub matches: usize,
}

impl ModelOutputs {
    pub fn total_xg(&self) -> f64 {
        self.home_xg + self.away_xg
    }

    pub fn prob(&self, pick: Pick) -> Option<f64> {
        self.probabilities.get(&pick).copied()
    }

    pub fn set_prob(&mut self, pick: Pick, p: f64) {
        self.probabilities.insert(pick, clamp_prob(p));
    }

    pub fn player_prob(
        &self,
        player_key: &str,
        market: Market,
        selection: Selection,
    ) -> Option<&PlayerPropProb> {
        self.player_props.iter().find(|p| {
            p.market == market
                && p.selection == selection
                && crate::value::normalize_selection(&p.player) == player_key
        })
    }
}
