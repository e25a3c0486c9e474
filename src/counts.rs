use serde::Serialize;

use crate::config::{CountConfig, ModelConfig};
use crate::markets::Line;
use crate::scoregrid::Prob3;
use crate::snapshot::MatchSnapshot;
use crate::strength::StrengthCoefficients;
use crate::xg;

/// Negative binomial with mean `mean` and variance `mean + dispersion * mean^2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountModel {
    pub mean: f64,
    pub dispersion: f64,
    /// Counts at or beyond this value are not summed.
    pub cap: u32,
}

impl CountModel {
    pub fn new(mean: f64, dispersion: f64, cap: u32) -> Self {
        Self {
            mean: mean.max(1e-6),
            dispersion: dispersion.max(1e-6),
            cap,
        }
    }

    pub fn with_mean(self, mean: f64) -> Self {
        Self::new(mean, self.dispersion, self.cap)
    }

    /// Point masses for 0..cap.
    pub fn pmf(&self) -> Vec<f64> {
        nb_pmf(self.mean, self.dispersion, self.cap)
    }

    pub fn over(&self, line: Line) -> f64 {
        let from = line.floor() as usize + 1;
        let pmf = self.pmf();
        pmf.iter().skip(from).sum::<f64>().clamp(0.0, 1.0)
    }

    pub fn under(&self, line: Line) -> f64 {
        1.0 - self.over(line)
    }

    /// (line, over) pairs for a ladder of lines.
    pub fn ladder(&self, lines: &[Line]) -> Vec<(Line, f64)> {
        let pmf = self.pmf();
        lines
            .iter()
            .map(|line| {
                let from = line.floor() as usize + 1;
                (*line, pmf.iter().skip(from).sum::<f64>().clamp(0.0, 1.0))
            })
            .collect()
    }
}

/// `r = 1/alpha`, `p = r/(r+mu)`; P(0) = p^r, P(k) = P(k-1) * (k-1+r)/k * (1-p).
pub fn nb_pmf(mean: f64, dispersion: f64, cap: u32) -> Vec<f64> {
    let r = 1.0 / dispersion.max(1e-6);
    let p = r / (r + mean.max(0.0));
    let q = 1.0 - p;
    let mut out = Vec::with_capacity(cap as usize);
    if cap == 0 {
        return out;
    }
    let mut mass = p.powf(r);
    out.push(mass);
    for k in 1..cap {
        let k = f64::from(k);
        mass *= (k - 1.0 + r) / k * q;
        out.push(mass);
    }
    out
}

/// Three-way "which side records more" under independence.
pub fn more_than(home: &CountModel, away: &CountModel, cap: u32) -> Prob3 {
    let pmf_h = nb_pmf(home.mean, home.dispersion, cap);
    let pmf_a = nb_pmf(away.mean, away.dispersion, cap);
    let mut out = Prob3 {
        home: 0.0,
        draw: 0.0,
        away: 0.0,
    };
    for (h, p_h) in pmf_h.iter().enumerate() {
        for (a, p_a) in pmf_a.iter().enumerate() {
            let joint = p_h * p_a;
            if h > a {
                out.home += joint;
            } else if h == a {
                out.draw += joint;
            } else {
                out.away += joint;
            }
        }
    }
    out.normalized()
}

pub fn predict_corners(snapshot: &MatchSnapshot, cfg: &CountConfig) -> CountModel {
    let (h, a) = (&snapshot.home, &snapshot.away);
    let sot = (h.shots_on_target_avg + a.shots_on_target_avg) / 8.0;
    let blocked = (h.shots_blocked_avg + a.shots_blocked_avg) / 6.0;
    let possession = (h.possession_final_third + a.possession_final_third) / 50.0;
    let base = h.corners_avg + a.corners_avg;
    let mean = base * (0.50 + 0.20 * sot + 0.15 * blocked + 0.15 * possession);
    CountModel::new(
        mean.clamp(cfg.corners_min, cfg.corners_max),
        cfg.corners_dispersion,
        cfg.corners_cap,
    )
}

/// Card rate from team discipline, referee strictness and what is at stake.
pub fn predict_cards(
    snapshot: &MatchSnapshot,
    urgency_home: f64,
    urgency_away: f64,
    cfg: &CountConfig,
) -> CountModel {
    let (h, a) = (&snapshot.home, &snapshot.away);
    let aggression = (h.fouls_avg + a.fouls_avg) / 25.0;
    let severity = snapshot.referee.cards_per_game_avg / 4.0;
    let stakes = 1.0 + (urgency_home + urgency_away) * 0.1;
    let mean = (h.cards_avg + a.cards_avg) * severity * aggression * stakes * 0.6;
    CountModel::new(
        mean.clamp(cfg.cards_min, cfg.cards_max),
        cfg.cards_dispersion,
        cfg.cards_cap,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShotsForecast {
    pub home: CountModel,
    pub away: CountModel,
    pub home_on_target: CountModel,
    pub away_on_target: CountModel,
    pub total: CountModel,
    pub total_on_target: CountModel,
    pub more_shots: Prob3,
    pub more_on_target: Prob3,
}

pub fn predict_shots(
    coefficients: &StrengthCoefficients,
    form_points_home: f64,
    form_points_away: f64,
    suspect: bool,
    model: &ModelConfig,
    cfg: &CountConfig,
) -> ShotsForecast {
    // A leaky defense (high coefficient) concedes more shots.
    let defense_h = (0.7 + coefficients.away_defense * 0.3).clamp(0.6, 1.5);
    let defense_a = (0.7 + coefficients.home_defense * 0.3).clamp(0.6, 1.5);
    let form_h = xg::form_factor(form_points_home, model);
    let form_a = xg::form_factor(form_points_away, model);
    let home_adv = xg::home_advantage(suspect, model);

    let home_factor = defense_h * form_h * home_adv;
    let away_factor = defense_a * form_a;

    let shots_h = (coefficients.home_attack * cfg.shots_base * home_factor)
        .clamp(cfg.shots_min, cfg.shots_max);
    let shots_a = (coefficients.away_attack * cfg.shots_base * away_factor)
        .clamp(cfg.shots_min, cfg.shots_max);
    let sot_h =
        (coefficients.home_attack * cfg.sot_base * home_factor).clamp(cfg.sot_min, cfg.sot_max);
    let sot_a =
        (coefficients.away_attack * cfg.sot_base * away_factor).clamp(cfg.sot_min, cfg.sot_max);

    let home = CountModel::new(shots_h, cfg.shots_dispersion, cfg.team_shots_cap);
    let away = CountModel::new(shots_a, cfg.shots_dispersion, cfg.team_shots_cap);
    let home_on_target = CountModel::new(sot_h, cfg.sot_dispersion, cfg.team_sot_cap);
    let away_on_target = CountModel::new(sot_a, cfg.sot_dispersion, cfg.team_sot_cap);

    ShotsForecast {
        home,
        away,
        home_on_target,
        away_on_target,
        total: CountModel::new(shots_h + shots_a, cfg.shots_dispersion, cfg.total_shots_cap),
        total_on_target: CountModel::new(sot_h + sot_a, cfg.sot_dispersion, cfg.total_sot_cap),
        more_shots: more_than(&home, &away, cfg.shots_match_bet_cap),
        more_on_target: more_than(&home_on_target, &away_on_target, cfg.sot_match_bet_cap),
    }
}
