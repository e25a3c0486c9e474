use serde::Serialize;

use crate::config::ModelConfig;
use crate::snapshot::{MatchSnapshot, TeamProfile};

/// Attack/defense multipliers relative to an average side in the league.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrengthCoefficients {
    pub home_attack: f64,
    pub home_defense: f64,
    pub away_attack: f64,
    pub away_defense: f64,
}

impl StrengthCoefficients {
    pub fn neutral() -> Self {
        Self {
            home_attack: 1.0,
            home_defense: 1.0,
            away_attack: 1.0,
            away_defense: 1.0,
        }
    }
}

/// Per-team goal rates after venue selection and shrinkage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TeamRates {
    pub observed_scored: f64,
    pub observed_conceded: f64,
    pub scored: f64,
    pub conceded: f64,
    pub games_played: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrengthEstimate {
    pub coefficients: StrengthCoefficients,
    pub home: TeamRates,
    pub away: TeamRates,
    /// Home and away splits were averaged because the venue looked swapped.
    pub neutral_venue: bool,
    pub league_half: f64,
}

/// Pulls small samples toward the league mean; full trust from `threshold` games on.
pub fn shrink_toward_mean(observed: f64, league_mean: f64, games_played: u32, threshold: u32) -> f64 {
    let games = games_played.max(1);
    if threshold == 0 || games >= threshold {
        return observed;
    }
    let w = f64::from(games) / f64::from(threshold);
    w * observed + (1.0 - w) * league_mean
}

pub fn coefficient(rate: f64, league_avg_goals: f64, floor: f64) -> f64 {
    let half = league_avg_goals / 2.0;
    if !half.is_finite() || half <= 0.0 {
        return 1.0;
    }
    (rate / half).max(floor)
}

pub fn estimate(snapshot: &MatchSnapshot, cfg: &ModelConfig, suspect: bool) -> StrengthEstimate {
    let league_half = snapshot.league_avg_goals / 2.0;
    let (h_scored, h_conceded) = venue_rates(&snapshot.home, true, suspect);
    let (a_scored, a_conceded) = venue_rates(&snapshot.away, false, suspect);

    let home = shrink_team(h_scored, h_conceded, &snapshot.home, league_half, cfg);
    let away = shrink_team(a_scored, a_conceded, &snapshot.away, league_half, cfg);

    let avg = snapshot.league_avg_goals;
    let floor = cfg.strength_floor;
    StrengthEstimate {
        coefficients: StrengthCoefficients {
            home_attack: coefficient(home.scored, avg, floor),
            home_defense: coefficient(home.conceded, avg, floor),
            away_attack: coefficient(away.scored, avg, floor),
            away_defense: coefficient(away.conceded, avg, floor),
        },
        home,
        away,
        neutral_venue: suspect,
        league_half,
    }
}

fn venue_rates(team: &TeamProfile, at_home: bool, neutral: bool) -> (f64, f64) {
    if neutral {
        (
            (team.home_scored_avg + team.away_scored_avg) / 2.0,
            (team.home_conceded_avg + team.away_conceded_avg) / 2.0,
        )
    } else if at_home {
        (team.home_scored_avg, team.home_conceded_avg)
    } else {
        (team.away_scored_avg, team.away_conceded_avg)
    }
}

fn shrink_team(
    scored: f64,
    conceded: f64,
    team: &TeamProfile,
    league_half: f64,
    cfg: &ModelConfig,
) -> TeamRates {
    let games = team.games_played.max(1);
    TeamRates {
        observed_scored: scored,
        observed_conceded: conceded,
        scored: shrink_toward_mean(scored, league_half, games, cfg.shrinkage_games),
        conceded: shrink_toward_mean(conceded, league_half, games, cfg.shrinkage_games),
        games_played: games,
    }
}

/// Weighted W/D/L score in [0, 1] over the most recent `window` results.
/// Unknown characters are skipped; no results at all reads as 0.5.
pub fn form_points(form: &str, window: usize, decay: f64) -> f64 {
    let mut earned = 0.0;
    let mut possible = 0.0;
    let results = form
        .chars()
        .filter_map(|c| match c.to_ascii_uppercase() {
            'W' => Some(3.0),
            'D' => Some(1.0),
            'L' => Some(0.0),
            _ => None,
        })
        .take(window);
    for (k, pts) in results.enumerate() {
        let w = decay.powi(k as i32);
        earned += w * pts;
        possible += w * 3.0;
    }
    if possible <= 0.0 {
        return 0.5;
    }
    (earned / possible).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::fixtures::snapshot;

    #[test]
    fn early_season_rate_is_pulled_to_league_mean() {
        let league_half = 1.35;
        let observed = 3.0;
        let early = shrink_toward_mean(observed, league_half, 3, 15);
        let settled = shrink_toward_mean(observed, league_half, 20, 15);
        assert_eq!(settled, observed);
        assert!((early - (0.2 * 3.0 + 0.8 * 1.35)).abs() < 1e-12);
        assert!((early - league_half).abs() < (settled - league_half).abs());
    }

    #[test]
    fn zero_games_counts_as_one() {
        let a = shrink_toward_mean(2.0, 1.0, 0, 10);
        let b = shrink_toward_mean(2.0, 1.0, 1, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn coefficients_have_a_floor() {
        assert!((coefficient(1.35, 2.7, 0.3) - 1.0).abs() < 1e-12);
        assert_eq!(coefficient(0.1, 2.7, 0.3), 0.3);
        assert_eq!(coefficient(1.5, 0.0, 0.3), 1.0);
    }

    #[test]
    fn venue_splits_are_used_unless_suspect() {
        let snap = snapshot();
        let cfg = ModelConfig::default();
        let est = estimate(&snap, &cfg, false);
        assert!((est.coefficients.home_attack - 1.8 / 1.35).abs() < 1e-9);
        assert!((est.coefficients.away_defense - 1.5 / 1.35).abs() < 1e-9);

        let neutral = estimate(&snap, &cfg, true);
        assert!(neutral.neutral_venue);
        assert!((neutral.coefficients.home_attack - 1.6 / 1.35).abs() < 1e-9);
        assert!((neutral.coefficients.away_attack - 1.2 / 1.35).abs() < 1e-9);
    }

    #[test]
    fn small_sample_team_gets_milder_coefficients() {
        let mut snap = snapshot();
        snap.home.home_scored_avg = 3.2;
        snap.home.games_played = 3;
        let cfg = ModelConfig::default();
        let early = estimate(&snap, &cfg, false);
        snap.home.games_played = 20;
        let late = estimate(&snap, &cfg, false);
        assert!(early.coefficients.home_attack < late.coefficients.home_attack);
        assert!(early.home.scored < early.home.observed_scored);
    }

    #[test]
    fn form_points_weigh_results() {
        assert_eq!(form_points("WWW", 10, 1.0), 1.0);
        assert_eq!(form_points("LLL", 10, 1.0), 0.0);
        assert_eq!(form_points("", 10, 1.0), 0.5);
        assert!((form_points("WDL", 10, 1.0) - 4.0 / 9.0).abs() < 1e-12);
        // Only the first `window` results count.
        assert_eq!(form_points("WWLLL", 2, 1.0), 1.0);
        // With decay the latest result dominates.
        assert!(form_points("WLL", 10, 0.5) > form_points("LLW", 10, 0.5));
    }
}
