use std::collections::BTreeMap;

use rand::Rng;
use tracing::debug;

use crate::config::{EngineConfig, LineConfig};
use crate::context::{self, Urgency};
use crate::counts::{self, CountModel};
use crate::error::{MatchError, RejectionReason};
use crate::markets::{Line, Market, Pick, Selection};
use crate::monte_carlo;
use crate::outputs::{ModelOutputs, PlayerPropProb, clamp_prob};
use crate::scoregrid::{self, Prob3, ScoreGrid, Side};
use crate::snapshot::MatchSnapshot;
use crate::strength;
use crate::value::{self, ValueOpportunity};
use crate::xg;

const OVER_25: Line = Line::from_floor(2);

/// Data-sufficiency checks that run before any modelling.
pub fn gate(snapshot: &MatchSnapshot, cfg: &EngineConfig) -> Result<(), RejectionReason> {
    let q = &snapshot.quality;
    if !q.has_real_odds && !q.has_real_standings {
        return Err(RejectionReason::NoRealData);
    }
    let floor = cfg.value.min_quality;
    if q.score.is_nan() || q.score < floor {
        return Err(RejectionReason::LowQuality {
            score: q.score,
            floor,
        });
    }
    let positive = |v: f64| v.is_finite() && v > 0.0;
    for team in [&snapshot.home, &snapshot.away] {
        if !positive(team.attack_strength) || !positive(team.defense_strength) {
            return Err(RejectionReason::NonPositiveStrength {
                team: team.name.clone(),
            });
        }
    }
    Ok(())
}

/// One fixture through the model and the value scan.
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub outputs: ModelOutputs,
    pub opportunities: Vec<ValueOpportunity>,
}

pub fn score_match<R: Rng + ?Sized>(
    snapshot: &MatchSnapshot,
    cfg: &EngineConfig,
    rng: &mut R,
) -> Result<ScoredMatch, MatchError> {
    let outputs = run_model(snapshot, cfg, rng)?;
    let opportunities = value::scan_match(snapshot, &outputs, cfg);
    Ok(ScoredMatch {
        outputs,
        opportunities,
    })
}

/// strength -> xG -> grid -> Monte Carlo -> counts -> context.
pub fn run_model<R: Rng + ?Sized>(
    snapshot: &MatchSnapshot,
    cfg: &EngineConfig,
    rng: &mut R,
) -> Result<ModelOutputs, MatchError> {
    gate(snapshot, cfg)?;
    let m = &cfg.model;
    let id = snapshot.match_id;

    let suspect = snapshot.venue_suspect(m.suspect_odds_ratio);
    let strength = strength::estimate(snapshot, m, suspect);
    let form_home = strength::form_points(&snapshot.home.form, m.form_window, m.form_decay);
    let form_away = strength::form_points(&snapshot.away.form, m.form_window, m.form_decay);
    let xg_model = xg::expected_goals(strength.coefficients, form_home, form_away, suspect, m);
    ensure_finite(id, "expected goals", &[xg_model.home, xg_model.away])?;

    let rho = scoregrid::heuristic_rho(xg_model.home, xg_model.away, m);
    let analytic = ScoreGrid::build(xg_model.home, xg_model.away, rho, m.max_goals);
    if !analytic.is_finite() || !analytic.total().is_finite() {
        return Err(MatchError::computation(format!(
            "match {id}: score grid is not finite"
        )));
    }
    let (grid, monte_carlo) = if cfg.monte_carlo.enabled {
        let (blended, summary) = monte_carlo::resample(&analytic, &cfg.monte_carlo, rng)?;
        (blended, Some(summary))
    } else {
        (analytic, None)
    };

    let urgency = Urgency::for_match(snapshot);
    let corners = counts::predict_corners(snapshot, &cfg.counts);
    let cards = counts::predict_cards(snapshot, urgency.home, urgency.away, &cfg.counts);
    let shots = counts::predict_shots(
        &strength.coefficients,
        form_home,
        form_away,
        suspect,
        m,
        &cfg.counts,
    );
    ensure_finite(
        id,
        "count means",
        &[corners.mean, cards.mean, shots.total.mean, shots.total_on_target.mean],
    )?;

    let player_props = if cfg.value.player_props_enabled {
        player_hit_rates(snapshot, cfg)
    } else {
        Vec::new()
    };

    let mut outputs = ModelOutputs {
        match_id: id,
        fixture: snapshot.fixture_label(),
        suspect_venue: suspect,
        home_xg: xg_model.home,
        away_xg: xg_model.away,
        strength,
        xg_model,
        form_points_home: form_home,
        form_points_away: form_away,
        rho,
        result: grid.match_result().normalized(),
        over_25: grid.over(OVER_25),
        btts: grid.btts(),
        expected_corners: corners.mean,
        expected_cards: cards.mean,
        corners_model: corners,
        cards_model: cards,
        shots,
        top_scores: grid.top_scores(m.top_scores, None),
        monte_carlo,
        urgency,
        context: None,
        probabilities: BTreeMap::new(),
        player_props,
    };

    fill_goal_markets(&mut outputs, &grid, cfg);
    fill_half_time(&mut outputs, cfg);
    fill_count_markets(&mut outputs, &cfg.lines);

    if cfg.context.enabled {
        let report = context::apply(&mut outputs, snapshot, &cfg.context);
        let corners = outputs.corners_model.with_mean(outputs.expected_corners);
        let cards = outputs.cards_model.with_mean(outputs.expected_cards);
        outputs.corners_model = corners;
        outputs.cards_model = cards;
        fill_ladder(&mut outputs, Market::Corners, corners, &cfg.lines.corners);
        fill_ladder(&mut outputs, Market::Cards, cards, &cfg.lines.cards);
        sync_headline(&mut outputs);
        outputs.context = Some(report);
    }

    ensure_finite(
        id,
        "adjusted outputs",
        &[
            outputs.home_xg,
            outputs.away_xg,
            outputs.result.sum(),
            outputs.over_25,
            outputs.btts,
            outputs.expected_corners,
            outputs.expected_cards,
        ],
    )?;

    debug!(
        match_id = id,
        fixture = %outputs.fixture,
        home_xg = outputs.home_xg,
        away_xg = outputs.away_xg,
        rho = outputs.rho,
        p_home = outputs.result.home,
        p_draw = outputs.result.draw,
        p_away = outputs.result.away,
        markets = outputs.probabilities.len(),
        "match modelled"
    );
    Ok(outputs)
}

fn ensure_finite(match_id: u64, what: &str, values: &[f64]) -> Result<(), MatchError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(MatchError::computation(format!(
            "match {match_id}: non-finite {what}"
        )))
    }
}

fn set_result(outputs: &mut ModelOutputs, market: Market, p: Prob3) {
    for sel in [Selection::Home, Selection::Draw, Selection::Away] {
        if let Some(v) = p.get(sel) {
            outputs.set_prob(Pick::new(market, sel), v);
        }
    }
}

fn set_double_chance(outputs: &mut ModelOutputs, p: Prob3) {
    for sel in [
        Selection::HomeOrDraw,
        Selection::DrawOrAway,
        Selection::HomeOrAway,
    ] {
        if let Some(v) = p.get(sel) {
            outputs.set_prob(Pick::new(Market::DoubleChance, sel), v);
        }
    }
}

fn set_over_under(outputs: &mut ModelOutputs, market: Market, line: Line, over: f64) {
    outputs.set_prob(Pick::new(market, Selection::Over(line)), over);
    outputs.set_prob(Pick::new(market, Selection::Under(line)), 1.0 - over);
}

fn set_yes_no(outputs: &mut ModelOutputs, market: Market, yes: f64) {
    outputs.set_prob(Pick::new(market, Selection::Yes), yes);
    outputs.set_prob(Pick::new(market, Selection::No), 1.0 - yes);
}

fn fill_goal_markets(outputs: &mut ModelOutputs, grid: &ScoreGrid, cfg: &EngineConfig) {
    let result = outputs.result;
    set_result(outputs, Market::MatchResult, result);
    set_double_chance(outputs, result);

    for &line in &cfg.lines.goals {
        set_over_under(outputs, Market::TotalGoals, line, grid.over(line));
    }
    for &line in &cfg.lines.team_goals {
        set_over_under(outputs, Market::HomeGoals, line, grid.team_over(Side::Home, line));
        set_over_under(outputs, Market::AwayGoals, line, grid.team_over(Side::Away, line));
    }

    set_yes_no(outputs, Market::BothTeamsToScore, grid.btts());
    set_yes_no(outputs, Market::CleanSheetHome, grid.clean_sheet(Side::Home));
    set_yes_no(outputs, Market::CleanSheetAway, grid.clean_sheet(Side::Away));
    set_yes_no(outputs, Market::WinToNilHome, grid.win_to_nil(Side::Home));
    set_yes_no(outputs, Market::WinToNilAway, grid.win_to_nil(Side::Away));

    outputs.set_prob(Pick::new(Market::OddEven, Selection::Odd), grid.odd_total());
    outputs.set_prob(Pick::new(Market::OddEven, Selection::Even), grid.even_total());

    let cap = u32::from(cfg.model.exact_score_max_goals).min(grid.max_goals());
    for h in 0..=cap {
        for a in 0..=cap {
            let score = Selection::Score(h as u8, a as u8);
            outputs.set_prob(Pick::new(Market::ExactScore, score), grid.get(h, a));
        }
    }
}

/// First half as independent Poisson on a fixed share of the full-match rates.
fn fill_half_time(outputs: &mut ModelOutputs, cfg: &EngineConfig) {
    let share = cfg.model.half_time_share;
    let lambda = (outputs.xg_model.home * share).max(0.01);
    let mu = (outputs.xg_model.away * share).max(0.01);
    let grid = ScoreGrid::independent(lambda, mu, cfg.model.half_time_max_goals);

    set_result(outputs, Market::HalfTimeResult, grid.match_result().normalized());
    for &line in &cfg.lines.half_time_goals {
        set_over_under(outputs, Market::HalfTimeGoals, line, grid.over(line));
    }
}

fn fill_ladder(outputs: &mut ModelOutputs, market: Market, model: CountModel, lines: &[Line]) {
    for (line, over) in model.ladder(lines) {
        set_over_under(outputs, market, line, over);
    }
}

fn fill_count_markets(outputs: &mut ModelOutputs, lines: &LineConfig) {
    let (corners, cards, shots) = (outputs.corners_model, outputs.cards_model, outputs.shots);
    fill_ladder(outputs, Market::Corners, corners, &lines.corners);
    fill_ladder(outputs, Market::Cards, cards, &lines.cards);
    fill_ladder(outputs, Market::TotalShots, shots.total, &lines.total_shots);
    fill_ladder(
        outputs,
        Market::TotalShotsOnTarget,
        shots.total_on_target,
        &lines.total_sot,
    );
    fill_ladder(outputs, Market::HomeShots, shots.home, &lines.team_shots);
    fill_ladder(outputs, Market::AwayShots, shots.away, &lines.team_shots);
    fill_ladder(
        outputs,
        Market::HomeShotsOnTarget,
        shots.home_on_target,
        &lines.team_sot,
    );
    fill_ladder(
        outputs,
        Market::AwayShotsOnTarget,
        shots.away_on_target,
        &lines.team_sot,
    );
    set_result(outputs, Market::ShotsMatchBet, shots.more_shots);
    set_result(outputs, Market::ShotsOnTargetMatchBet, shots.more_on_target);
}

/// Keeps the map in step with the context-adjusted headline numbers.
fn sync_headline(outputs: &mut ModelOutputs) {
    let result = outputs.result;
    set_result(outputs, Market::MatchResult, result);
    set_double_chance(outputs, result);
    let (over, btts) = (outputs.over_25, outputs.btts);
    set_over_under(outputs, Market::TotalGoals, OVER_25, over);
    set_yes_no(outputs, Market::BothTeamsToScore, btts);
}

/// Share of recorded matches in which the player cleared each line.
pub fn player_hit_rates(snapshot: &MatchSnapshot, cfg: &EngineConfig) -> Vec<PlayerPropProb> {
    let min_matches = cfg.value.player_min_matches.max(1);
    let mut out = Vec::new();
    for (side, team) in [(Side::Home, &snapshot.home), (Side::Away, &snapshot.away)] {
        for player in &team.players {
            let series = [
                (Market::PlayerShots, &player.shots, &cfg.lines.player_shots),
                (
                    Market::PlayerShotsOnTarget,
                    &player.on_target,
                    &cfg.lines.player_sot,
                ),
            ];
            for (market, counts, lines) in series {
                let matches = counts.len();
                if matches < min_matches {
                    continue;
                }
                for &line in lines {
                    let hits = counts.iter().filter(|c| **c > line.floor()).count();
                    let rate = hits as f64 / matches as f64;
                    for (selection, hits, prob) in [
                        (Selection::Over(line), hits, rate),
                        (Selection::Under(line), matches - hits, 1.0 - rate),
                    ] {
                        out.push(PlayerPropProb {
                            player: player.name.clone(),
                            side,
                            market,
                            selection,
                            prob: clamp_prob(prob),
                            hits,
                            matches,
                        });
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::snapshot::PlayerShotProfile;
    use crate::snapshot::fixtures::snapshot;

    fn analytic_only() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.monte_carlo.enabled = false;
        cfg.context.enabled = false;
        cfg
    }

    #[test]
    fn gate_rejects_thin_or_broken_data() {
        let cfg = EngineConfig::default();
        assert!(gate(&snapshot(), &cfg).is_ok());

        let mut low = snapshot();
        low.quality.score = 0.30;
        assert_eq!(
            gate(&low, &cfg),
            Err(RejectionReason::LowQuality {
                score: 0.30,
                floor: 0.40
            })
        );

        let mut blind = snapshot();
        blind.quality.has_real_odds = false;
        blind.quality.has_real_standings = false;
        assert_eq!(gate(&blind, &cfg), Err(RejectionReason::NoRealData));

        let mut broken = snapshot();
        broken.away.defense_strength = 0.0;
        assert!(matches!(
            gate(&broken, &cfg),
            Err(RejectionReason::NonPositiveStrength { team }) if team == "Valley Rovers"
        ));
    }

    #[test]
    fn analytic_run_fills_every_goals_market() {
        let cfg = analytic_only();
        let mut rng = StdRng::seed_from_u64(1);
        let out = run_model(&snapshot(), &cfg, &mut rng).expect("model");

        assert!((out.result.sum() - 1.0).abs() < 1e-9);
        assert!(out.monte_carlo.is_none());
        assert!(out.context.is_none());
        let p = |m, s| out.prob(Pick::new(m, s)).expect("market present");

        let home = p(Market::MatchResult, Selection::Home);
        let draw = p(Market::MatchResult, Selection::Draw);
        assert!((p(Market::DoubleChance, Selection::HomeOrDraw) - (home + draw)).abs() < 1e-9);
        for floor in 0..=5 {
            let l = Line::from_floor(floor);
            let over = p(Market::TotalGoals, Selection::Over(l));
            let under = p(Market::TotalGoals, Selection::Under(l));
            assert!((over + under - 1.0).abs() < 1e-9);
        }
        assert!((p(Market::TotalGoals, Selection::Over(OVER_25)) - out.over_25).abs() < 1e-12);
        assert!(out.prob(Pick::new(Market::ExactScore, Selection::Score(5, 5))).is_some());
        assert!(out.prob(Pick::new(Market::ExactScore, Selection::Score(6, 0))).is_none());
        assert!(p(Market::HalfTimeResult, Selection::Draw) > p(Market::MatchResult, Selection::Draw));
        assert!(p(Market::Corners, Selection::Over(Line::from_floor(7))) > 0.5);
        assert!(out.probabilities.values().all(|v| *v > 0.0 && *v < 1.0));
    }

    #[test]
    fn context_adjustment_reaches_the_probability_map() {
        let mut cfg = analytic_only();
        cfg.context.enabled = true;
        let mut snap = snapshot();
        snap.weather.wind_speed_kmh = 50.0;
        snap.weather.rain_mm = 20.0;

        let mut rng = StdRng::seed_from_u64(1);
        let out = run_model(&snap, &cfg, &mut rng).expect("model");
        let report = out.context.as_ref().expect("context report");
        assert!(!report.weather_stable);
        assert!(out.home_xg < out.xg_model.home);
        assert_eq!(
            out.prob(Pick::new(Market::TotalGoals, Selection::Over(OVER_25))),
            Some(out.over_25)
        );
        assert_eq!(
            out.prob(Pick::new(Market::MatchResult, Selection::Home)),
            Some(out.result.home)
        );
        let over_95 = out
            .prob(Pick::new(Market::Corners, Selection::Over(Line::from_floor(9))))
            .expect("corners");
        assert!((over_95 - out.corners_model.over(Line::from_floor(9))).abs() < 1e-12);
    }

    #[test]
    fn seeded_monte_carlo_runs_repeat_exactly() {
        let cfg = EngineConfig::default();
        let a = run_model(&snapshot(), &cfg, &mut StdRng::seed_from_u64(9)).expect("model");
        let b = run_model(&snapshot(), &cfg, &mut StdRng::seed_from_u64(9)).expect("model");
        assert_eq!(a.result, b.result);
        assert_eq!(a.probabilities, b.probabilities);
        let mc = a.monte_carlo.expect("summary");
        assert_eq!(mc.samples, 5000);
    }

    #[test]
    fn player_rates_need_enough_matches() {
        let mut snap = snapshot();
        snap.home.players = vec![
            PlayerShotProfile {
                name: "João Silva".to_string(),
                shots: vec![3, 0, 2, 1],
                on_target: vec![1, 0, 1, 0],
            },
            PlayerShotProfile {
                name: "One Game".to_string(),
                shots: vec![4],
                on_target: vec![2],
            },
        ];
        let cfg = EngineConfig::default();
        let rates = player_hit_rates(&snap, &cfg);
        assert!(rates.iter().all(|r| r.player == "João Silva"));
        let over_15 = rates
            .iter()
            .find(|r| {
                r.market == Market::PlayerShots && r.selection == Selection::Over(Line::from_floor(1))
            })
            .expect("over 1.5 shots");
        assert_eq!((over_15.hits, over_15.matches), (2, 4));
        assert!((over_15.prob - 0.5).abs() < 1e-12);
    }

    #[test]
    fn low_quality_snapshot_never_reaches_the_model() {
        let mut snap = snapshot();
        snap.quality.score = 0.30;
        let err = score_match(&snap, &EngineConfig::default(), &mut StdRng::seed_from_u64(3))
            .expect_err("rejected");
        assert!(matches!(err, MatchError::Rejected(RejectionReason::LowQuality { .. })));
    }
}
