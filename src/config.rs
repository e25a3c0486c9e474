use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::devig::DevigMethod;
use crate::error::ConfigError;
use crate::markets::Line;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub model: ModelConfig,
    pub monte_carlo: MonteCarloConfig,
    pub counts: CountConfig,
    pub lines: LineConfig,
    pub context: ContextConfig,
    pub value: ValueConfig,
    pub odds_bounds: OddsBounds,
}

/// Dixon-Coles rho applied while total xG is below `below_total_xg`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RhoTier {
    pub below_total_xg: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub max_goals: u32,
    pub shrinkage_games: u32,
    pub home_advantage: f64,
    pub strength_floor: f64,
    pub form_window: usize,
    // 1.0 weighs every result in the window equally.
    pub form_decay: f64,
    pub form_base: f64,
    pub form_span: f64,
    pub home_xg_min: f64,
    pub home_xg_max: f64,
    pub away_xg_min: f64,
    pub away_xg_max: f64,
    // Calibration inputs; ordered by ascending threshold.
    pub rho_tiers: Vec<RhoTier>,
    pub rho_default: f64,
    pub suspect_odds_ratio: f64,
    pub exact_score_max_goals: u8,
    pub top_scores: usize,
    pub half_time_share: f64,
    pub half_time_max_goals: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_goals: 8,
            shrinkage_games: 15,
            home_advantage: 1.08,
            strength_floor: 0.3,
            form_window: 10,
            form_decay: 1.0,
            form_base: 0.85,
            form_span: 0.30,
            home_xg_min: 0.3,
            home_xg_max: 3.5,
            away_xg_min: 0.2,
            away_xg_max: 3.0,
            rho_tiers: vec![
                RhoTier {
                    below_total_xg: 1.5,
                    rho: -0.12,
                },
                RhoTier {
                    below_total_xg: 2.5,
                    rho: -0.08,
                },
                RhoTier {
                    below_total_xg: 3.5,
                    rho: -0.04,
                },
            ],
            rho_default: -0.02,
            suspect_odds_ratio: 2.0,
            exact_score_max_goals: 5,
            top_scores: 15,
            half_time_share: 0.42,
            half_time_max_goals: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloConfig {
    pub enabled: bool,
    pub samples: usize,
    pub analytic_weight: f64,
    pub seed: Option<u64>,
    pub divergence_warn: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 5_000,
            analytic_weight: 0.6,
            seed: None,
            divergence_warn: 0.05,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountConfig {
    pub corners_dispersion: f64,
    pub cards_dispersion: f64,
    pub shots_dispersion: f64,
    pub sot_dispersion: f64,
    pub corners_cap: u32,
    pub cards_cap: u32,
    pub total_shots_cap: u32,
    pub total_sot_cap: u32,
    pub team_shots_cap: u32,
    pub team_sot_cap: u32,
    pub shots_match_bet_cap: u32,
    pub sot_match_bet_cap: u32,
    pub corners_min: f64,
    pub corners_max: f64,
    pub cards_min: f64,
    pub cards_max: f64,
    pub shots_base: f64,
    pub sot_base: f64,
    pub shots_min: f64,
    pub shots_max: f64,
    pub sot_min: f64,
    pub sot_max: f64,
}

impl Default for CountConfig {
    fn default() -> Self {
        Self {
            corners_dispersion: 0.25,
            cards_dispersion: 0.35,
            shots_dispersion: 0.20,
            sot_dispersion: 0.25,
            corners_cap: 25,
            cards_cap: 20,
            total_shots_cap: 50,
            total_sot_cap: 30,
            team_shots_cap: 35,
            team_sot_cap: 20,
            shots_match_bet_cap: 35,
            sot_match_bet_cap: 20,
            corners_min: 4.0,
            corners_max: 16.0,
            cards_min: 2.0,
            cards_max: 10.0,
            shots_base: 10.5,
            sot_base: 3.8,
            shots_min: 5.0,
            shots_max: 20.0,
            sot_min: 2.0,
            sot_max: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub goals: Vec<Line>,
    pub team_goals: Vec<Line>,
    pub half_time_goals: Vec<Line>,
    pub corners: Vec<Line>,
    pub cards: Vec<Line>,
    pub total_shots: Vec<Line>,
    pub total_sot: Vec<Line>,
    pub team_shots: Vec<Line>,
    pub team_sot: Vec<Line>,
    pub player_shots: Vec<Line>,
    pub player_sot: Vec<Line>,
}

fn ladder(floors: impl IntoIterator<Item = u8>) -> Vec<Line> {
    floors.into_iter().map(Line::from_floor).collect()
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            goals: ladder(0..=5),
            team_goals: ladder(0..=3),
            half_time_goals: ladder(0..=2),
            corners: ladder(7..=12),
            cards: ladder(2..=6),
            total_shots: ladder((18..=28).step_by(2)),
            total_sot: ladder(4..=9),
            team_shots: ladder((8..=14).step_by(2)),
            team_sot: ladder(2..=5),
            player_shots: ladder(0..=3),
            player_sot: ladder(0..=2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub enabled: bool,
    pub wind_threshold_kmh: f64,
    pub rain_threshold_mm: f64,
    pub heat_threshold_c: f64,
    pub cold_threshold_c: f64,
    pub wind_xg_penalty: f64,
    pub rain_xg_penalty: f64,
    pub fatigue_window_hours: f64,
    pub fatigue_max_penalty: f64,
    pub injury_per_player: f64,
    pub injury_floor: f64,
    pub long_term_penalty: f64,
    pub injury_hard_floor: f64,
    pub urgency_low: f64,
    pub urgency_gap: f64,
    pub urgency_draw_shift: f64,
    pub urgency_side_shift: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wind_threshold_kmh: 20.0,
            rain_threshold_mm: 5.0,
            heat_threshold_c: 30.0,
            cold_threshold_c: 5.0,
            wind_xg_penalty: 0.08,
            rain_xg_penalty: 0.05,
            fatigue_window_hours: 72.0,
            fatigue_max_penalty: 0.15,
            injury_per_player: 0.025,
            injury_floor: 0.85,
            long_term_penalty: 0.01,
            injury_hard_floor: 0.80,
            urgency_low: 0.4,
            urgency_gap: 0.4,
            urgency_draw_shift: 0.07,
            urgency_side_shift: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    pub min_edge: f64,
    pub max_sane_edge: f64,
    pub kelly_fraction: f64,
    pub max_kelly_bet: f64,
    pub min_quality: f64,
    pub exclude_draw: bool,
    pub min_odd: f64,
    pub scan_prob_floor: f64,
    pub scan_prob_ceiling: f64,
    pub min_model_prob: f64,
    pub max_model_prob: f64,
    pub min_total_xg: f64,
    pub max_total_xg: f64,
    pub derive_double_chance_odds: bool,
    pub devig_method: DevigMethod,
    pub player_props_enabled: bool,
    pub player_min_matches: usize,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            min_edge: 0.03,
            max_sane_edge: 0.30,
            kelly_fraction: 0.25,
            max_kelly_bet: 0.05,
            min_quality: 0.40,
            exclude_draw: true,
            min_odd: 1.05,
            scan_prob_floor: 0.005,
            scan_prob_ceiling: 0.995,
            min_model_prob: 0.01,
            max_model_prob: 0.99,
            min_total_xg: 0.10,
            max_total_xg: 15.0,
            derive_double_chance_odds: true,
            devig_method: DevigMethod::Power,
            player_props_enabled: true,
            player_min_matches: 2,
        }
    }
}

/// Per-market ceilings on quoted decimal odds. The floor is `ValueConfig::min_odd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OddsBounds {
    pub match_result: f64,
    pub double_chance: f64,
    pub goals: f64,
    pub team_goals: f64,
    pub btts: f64,
    pub clean_sheet: f64,
    pub win_to_nil: f64,
    pub odd_even: f64,
    pub half_time: f64,
    pub exact_score: f64,
    pub corners: f64,
    pub cards: f64,
    pub shots: f64,
    pub player_shots: f64,
}

impl Default for OddsBounds {
    fn default() -> Self {
        Self {
            match_result: 25.0,
            double_chance: 5.0,
            goals: 15.0,
            team_goals: 12.0,
            btts: 4.0,
            clean_sheet: 6.0,
            win_to_nil: 15.0,
            odd_even: 3.0,
            half_time: 15.0,
            exact_score: 200.0,
            corners: 8.0,
            cards: 8.0,
            shots: 10.0,
            player_shots: 15.0,
        }
    }
}

impl EngineConfig {
    /// Defaults, then the optional JSON file, then `EDGE_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("read config {}", path.display()))?;
                serde_json::from_str::<EngineConfig>(&raw)
                    .with_context(|| format!("parse config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };
        cfg.apply_env_overrides();
        cfg.validate().context("invalid engine config")?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let num = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };
        if let Some(v) = num("EDGE_MIN_EDGE") {
            self.value.min_edge = v;
        }
        if let Some(v) = num("EDGE_KELLY_FRACTION") {
            self.value.kelly_fraction = v;
        }
        if let Some(v) = num("EDGE_MAX_KELLY_BET") {
            self.value.max_kelly_bet = v;
        }
        if let Some(v) = lookup("EDGE_MC_SAMPLES").and_then(|v| v.trim().parse::<usize>().ok()) {
            self.monte_carlo.samples = v;
        }
        if let Some(v) = lookup("EDGE_MC_SEED").and_then(|v| v.trim().parse::<u64>().ok()) {
            self.monte_carlo.seed = Some(v);
        }
        if let Some(v) = lookup("EDGE_EXCLUDE_DRAW") {
            self.value.exclude_draw = parse_bool(&v);
        }
        if let Some(v) = lookup("EDGE_MAX_GOALS").and_then(|v| v.trim().parse::<u32>().ok()) {
            self.model.max_goals = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check("model.max_goals", f64::from(self.model.max_goals), 1.0, 20.0)?;
        check("model.home_advantage", self.model.home_advantage, 0.5, 2.0)?;
        check("model.form_decay", self.model.form_decay, 0.01, 1.0)?;
        check("model.half_time_share", self.model.half_time_share, 0.05, 0.95)?;
        if self.model.home_xg_min > self.model.home_xg_max
            || self.model.away_xg_min > self.model.away_xg_max
        {
            return Err(ConfigError::Invalid("xG clamp bounds are inverted".to_string()));
        }
        if self.monte_carlo.enabled && self.monte_carlo.samples == 0 {
            return Err(ConfigError::Invalid(
                "monte_carlo.samples must be positive when enabled".to_string(),
            ));
        }
        check("monte_carlo.analytic_weight", self.monte_carlo.analytic_weight, 0.0, 1.0)?;
        for (field, alpha) in [
            ("counts.corners_dispersion", self.counts.corners_dispersion),
            ("counts.cards_dispersion", self.counts.cards_dispersion),
            ("counts.shots_dispersion", self.counts.shots_dispersion),
            ("counts.sot_dispersion", self.counts.sot_dispersion),
        ] {
            check(field, alpha, 1e-6, 10.0)?;
        }
        check("value.kelly_fraction", self.value.kelly_fraction, 0.0, 1.0)?;
        check("value.max_kelly_bet", self.value.max_kelly_bet, 0.0, 1.0)?;
        check("value.min_quality", self.value.min_quality, 0.0, 1.0)?;
        check("value.min_odd", self.value.min_odd, 1.0, 100.0)?;
        if self.value.min_edge >= self.value.max_sane_edge {
            return Err(ConfigError::Invalid(format!(
                "value.min_edge {} must be below value.max_sane_edge {}",
                self.value.min_edge, self.value.max_sane_edge
            )));
        }
        Ok(())
    }
}

fn check(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn parse_bool(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::EngineConfig;
    use crate::error::ConfigError;
    use crate::markets::Line;

    #[test]
    fn defaults_validate() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.model.max_goals, 8);
        assert_eq!(cfg.monte_carlo.samples, 5_000);
        assert_eq!(cfg.lines.corners.first(), Some(&Line::from_floor(7)));
        assert_eq!(cfg.lines.total_shots.len(), 6);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let raw = r#"{ "value": { "min_edge": 0.05 }, "lines": { "cards": [3.5] } }"#;
        let cfg: EngineConfig = serde_json::from_str(raw).expect("parse");
        assert_eq!(cfg.value.min_edge, 0.05);
        assert_eq!(cfg.value.kelly_fraction, 0.25);
        assert_eq!(cfg.lines.cards, vec![Line::from_floor(3)]);
        assert_eq!(cfg.lines.corners.len(), 6);
    }

    #[test]
    fn whole_number_lines_are_refused() {
        let raw = r#"{ "lines": { "goals": [2.0] } }"#;
        assert!(serde_json::from_str::<EngineConfig>(raw).is_err());
    }

    #[test]
    fn overrides_apply_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("EDGE_MIN_EDGE", "0.04"),
            ("EDGE_MC_SEED", "42"),
            ("EDGE_EXCLUDE_DRAW", "off"),
            ("EDGE_KELLY_FRACTION", "not a number"),
        ]
        .into_iter()
        .collect();
        let mut cfg = EngineConfig::default();
        cfg.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.value.min_edge, 0.04);
        assert_eq!(cfg.monte_carlo.seed, Some(42));
        assert!(!cfg.value.exclude_draw);
        assert_eq!(cfg.value.kelly_fraction, 0.25);
    }

    #[test]
    fn validate_flags_out_of_range_fields() {
        let mut cfg = EngineConfig::default();
        cfg.monte_carlo.analytic_weight = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange {
                field: "monte_carlo.analytic_weight",
                ..
            })
        ));

        let mut cfg = EngineConfig::default();
        cfg.value.min_edge = 0.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }
}
