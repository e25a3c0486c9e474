use std::collections::HashMap;

use matchday_edge::confidence::{self, Conditions};
use matchday_edge::devig::{self, DevigMethod};
use matchday_edge::markets::{Line, Market, Pick, Selection};
use matchday_edge::model;
use matchday_edge::outputs::ModelOutputs;
use matchday_edge::value::{self, OddsSource};
use matchday_edge::{EngineConfig, MatchSnapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;

const OVER_25: Selection = Selection::Over(Line::from_floor(2));

fn base() -> MatchSnapshot {
    let all: Vec<MatchSnapshot> =
        serde_json::from_str(include_str!("fixtures/snapshots.json")).expect("fixture parses");
    all.into_iter()
        .find(|s| s.match_id == 2001)
        .expect("fixture present")
}

fn analytic() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.monte_carlo.enabled = false;
    cfg
}

fn modelled(snap: &MatchSnapshot, cfg: &EngineConfig) -> ModelOutputs {
    model::run_model(snap, cfg, &mut StdRng::seed_from_u64(1)).expect("model runs")
}

/// Clears every price so a test controls exactly what is quoted.
fn unpriced(mut snap: MatchSnapshot) -> MatchSnapshot {
    let bookmaker = snap.odds.bookmaker.clone();
    snap.odds = Default::default();
    snap.odds.bookmaker = bookmaker;
    snap
}

#[test]
fn priced_edge_becomes_an_opportunity() {
    let cfg = analytic();
    let mut snap = unpriced(base());
    let out = modelled(&snap, &cfg);
    let p = out.prob(Pick::new(Market::TotalGoals, OVER_25)).expect("over 2.5");

    snap.odds.over_25 = 1.12 / p;
    snap.odds.under_25 = 0.90 / (1.0 - p);
    let opps = value::scan_match(&snap, &out, &cfg);
    assert_eq!(opps.len(), 1);

    let opp = &opps[0];
    assert_eq!(opp.market, Market::TotalGoals);
    assert_eq!(opp.selection, OVER_25);
    assert_eq!(opp.label, "Over 2.5 Goals");
    assert!((opp.edge - 0.12).abs() < 1e-9);
    assert!((opp.model_prob - p).abs() < 1e-12);
    assert_eq!(opp.devig_method, Some(DevigMethod::Power));
    let fair = devig::devig(&[snap.odds.over_25, snap.odds.under_25], DevigMethod::Power);
    assert!((opp.implied_prob - fair.probs[0]).abs() < 1e-12);
    assert!((opp.fair_odd - 1.0 / p).abs() < 1e-9);
    assert_eq!(
        opp.kelly_stake,
        value::kelly_stake(p, snap.odds.over_25, 0.25, 0.05)
    );
    let report = out.context.as_ref().expect("context ran");
    let conditions = Conditions {
        weather_stable: report.weather_stable,
        fatigue_free: report.fatigue_free(),
    };
    assert_eq!(opp.confidence, confidence::classify(opp.edge, p, conditions));
    assert_eq!(opp.bookmaker, "Harbourline");
    assert_eq!(opp.odds_source, OddsSource::Explicit);
}

#[test]
fn lone_price_uses_raw_implied_probability() {
    let cfg = analytic();
    let mut snap = unpriced(base());
    let out = modelled(&snap, &cfg);
    let p = out.prob(Pick::new(Market::TotalGoals, OVER_25)).expect("over 2.5");
    snap.odds.over_25 = 1.10 / p;

    let opps = value::scan_match(&snap, &out, &cfg);
    assert_eq!(opps.len(), 1);
    assert_eq!(opps[0].devig_method, None);
    assert!((opps[0].implied_prob - p / 1.10).abs() < 1e-9);
}

#[test]
fn draw_is_skipped_only_when_excluded() {
    let mut cfg = analytic();
    let mut snap = unpriced(base());
    let out = modelled(&snap, &cfg);
    let draw = out.result.draw;
    snap.odds.draw = 1.15 / draw;
    let is_draw = |o: &value::ValueOpportunity| {
        o.market == Market::MatchResult && o.selection == Selection::Draw
    };

    assert!(!value::scan_match(&snap, &out, &cfg).iter().any(is_draw));
    cfg.value.exclude_draw = false;
    assert!(value::scan_match(&snap, &out, &cfg).iter().any(is_draw));
}

#[test]
fn anomalous_edges_and_implausible_odds_are_dropped() {
    let cfg = analytic();
    let mut snap = unpriced(base());
    let mut out = modelled(&snap, &cfg);
    let p_over = out.prob(Pick::new(Market::TotalGoals, OVER_25)).expect("over");
    let btts_yes = Pick::new(Market::BothTeamsToScore, Selection::Yes);
    out.set_prob(btts_yes, 0.55);

    snap.odds.over_25 = 1.40 / p_over;
    snap.odds.btts_yes = 1.02;
    snap.odds.over_95_corners = 9.0;
    assert!(value::scan_match(&snap, &out, &cfg).is_empty());

    snap.odds.btts_yes = 2.0;
    let opps = value::scan_match(&snap, &out, &cfg);
    assert_eq!(opps.len(), 1);
    assert_eq!(opps[0].market, Market::BothTeamsToScore);
    assert_eq!(opps[0].selection, Selection::Yes);
    assert!((opps[0].edge - 0.10).abs() < 1e-9);
}

#[test]
fn duplicate_selection_keeps_the_better_price() {
    let cfg = analytic();
    let mut snap = unpriced(base());
    let out = modelled(&snap, &cfg);
    let p = out.prob(Pick::new(Market::TotalGoals, OVER_25)).expect("over");

    snap.odds.over_25 = 1.05 / p;
    snap.odds.all_markets.insert(
        "goals_ou".to_string(),
        HashMap::from([("over_2.5".to_string(), 1.15 / p)]),
    );
    let opps = value::scan_match(&snap, &out, &cfg);
    assert_eq!(opps.len(), 1);
    assert!((opps[0].edge - 0.15).abs() < 1e-9);
    assert_eq!(opps[0].odds_source, OddsSource::Catalog);
}

#[test]
fn derived_double_chance_is_scanned() {
    let cfg = analytic();
    let mut snap = unpriced(base());
    let out = modelled(&snap, &cfg);
    snap.odds.home_win = 1.95;
    snap.odds.draw = 3.50;
    snap.odds.away_win = 4.20;

    let quotes = value::collect_quotes(&snap.odds, true);
    assert!(quotes.iter().any(|q| q.source == OddsSource::Derived
        && q.pick == Pick::new(Market::DoubleChance, Selection::HomeOrDraw)));
    for opp in value::scan_match(&snap, &out, &cfg) {
        if opp.market == Market::DoubleChance {
            assert_eq!(opp.odds_source, OddsSource::Derived);
            assert_eq!(opp.devig_method, None);
        }
    }
}

#[test]
fn player_prop_uses_empirical_hit_rate() {
    let cfg = analytic();
    let snap = unpriced(base());
    let mut priced = snap.clone();
    priced.odds.player_props.insert(
        "Tomas Ferreira".to_string(),
        HashMap::from([
            ("shots_over_1.5".to_string(), 1.40),
            ("shots_under_1.5".to_string(), 3.20),
        ]),
    );
    let out = modelled(&snap, &cfg);

    let opps = value::scan_match(&priced, &out, &cfg);
    let prop = opps
        .iter()
        .find(|o| o.market == Market::PlayerShots)
        .expect("player prop opportunity");
    // 4 of 5 recorded matches had two or more shots.
    assert!((prop.model_prob - 0.8).abs() < 1e-12);
    assert!((prop.edge - 0.12).abs() < 1e-9);
    assert_eq!(prop.player.as_deref(), Some("Tomas Ferreira"));
    assert_eq!(prop.odds_source, OddsSource::PlayerProp);
    assert_eq!(prop.devig_method, Some(DevigMethod::Power));

    let mut off = cfg.clone();
    off.value.player_props_enabled = false;
    assert!(
        value::scan_match(&priced, &out, &off)
            .iter()
            .all(|o| o.player.is_none())
    );
}

#[test]
fn low_quality_snapshot_yields_nothing() {
    let cfg = analytic();
    let snap = base();
    let out = modelled(&snap, &cfg);

    let mut poor = snap.clone();
    poor.quality.score = 0.30;
    assert!(value::scan_match(&poor, &out, &cfg).is_empty());
}
