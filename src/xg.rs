use serde::Serialize;

use crate::config::ModelConfig;
use crate::strength::StrengthCoefficients;

/// Goal rates for one fixture. `raw_*` keep the products before clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
    pub raw_home: f64,
    pub raw_away: f64,
    pub home_advantage: f64,
    pub form_home: f64,
    pub form_away: f64,
    pub coefficients: StrengthCoefficients,
}

impl ExpectedGoals {
    pub fn total(&self) -> f64 {
        self.home + self.away
    }
}

pub fn form_factor(form_points: f64, cfg: &ModelConfig) -> f64 {
    cfg.form_base + form_points.clamp(0.0, 1.0) * cfg.form_span
}

pub fn home_advantage(suspect: bool, cfg: &ModelConfig) -> f64 {
    if suspect { 1.0 } else { cfg.home_advantage }
}

pub fn expected_goals(
    coefficients: StrengthCoefficients,
    form_points_home: f64,
    form_points_away: f64,
    suspect: bool,
    cfg: &ModelConfig,
) -> ExpectedGoals {
    let home_advantage = home_advantage(suspect, cfg);
    let form_home = form_factor(form_points_home, cfg);
    let form_away = form_factor(form_points_away, cfg);

    let raw_home = coefficients.home_attack * coefficients.away_defense * home_advantage * form_home;
    let raw_away = coefficients.away_attack * coefficients.home_defense * form_away;

    ExpectedGoals {
        home: raw_home.clamp(cfg.home_xg_min, cfg.home_xg_max),
        away: raw_away.clamp(cfg.away_xg_min, cfg.away_xg_max),
        raw_home,
        raw_away,
        home_advantage,
        form_home,
        form_away,
        coefficients,
    }
}
