use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::confidence::{self, Conditions, Confidence};
use crate::context;
use crate::devig::{self, DevigMethod};
use crate::markets::{Line, Market, Pick, Selection};
use crate::model;
use crate::outputs::ModelOutputs;
use crate::snapshot::{MarketOdds, MatchSnapshot};

pub fn edge(prob: f64, odd: f64) -> f64 {
    prob * odd - 1.0
}

/// Fractional Kelly, never negative and never above `max_bet`.
pub fn kelly_stake(prob: f64, odd: f64, fraction: f64, max_bet: f64) -> f64 {
    let b = odd - 1.0;
    if !b.is_finite() || b <= 0.0 {
        return 0.0;
    }
    let full = (prob * odd - 1.0) / b;
    if full <= 0.0 {
        return 0.0;
    }
    (full * fraction).clamp(0.0, max_bet.max(0.0))
}

pub fn fair_odd(prob: f64) -> f64 {
    1.0 / prob.max(0.01)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OddsSource {
    /// A named field of the bookmaker feed.
    Explicit,
    /// The generic market-key map.
    Catalog,
    /// Double chance built from the bookmaker's own 1X2 prices.
    Derived,
    PlayerProp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub pick: Pick,
    pub odd: f64,
    pub source: OddsSource,
}

/// Why one candidate was dropped. Only that candidate is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    DrawExcluded,
    NoModelProbability,
    ProbabilityOutOfScan,
    OddImplausible,
    ModelInsane,
    EdgeBelowMinimum,
    EdgeAnomalous,
}

impl Gate {
    pub fn as_str(self) -> &'static str {
        match self {
            Gate::DrawExcluded => "draw_excluded",
            Gate::NoModelProbability => "no_model_probability",
            Gate::ProbabilityOutOfScan => "probability_out_of_scan",
            Gate::OddImplausible => "odd_implausible",
            Gate::ModelInsane => "model_insane",
            Gate::EdgeBelowMinimum => "edge_below_minimum",
            Gate::EdgeAnomalous => "edge_anomalous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueOpportunity {
    pub match_id: u64,
    pub league: String,
    pub kickoff: NaiveDateTime,
    pub home_team: String,
    pub away_team: String,
    pub market: Market,
    pub selection: Selection,
    pub player: Option<String>,
    pub label: String,
    pub market_odd: f64,
    pub fair_odd: f64,
    pub model_prob: f64,
    pub implied_prob: f64,
    /// `None` when the rest of the outcome set was not quoted and `1/odd` was used.
    pub devig_method: Option<DevigMethod>,
    pub edge: f64,
    pub kelly_stake: f64,
    pub confidence: Confidence,
    pub bookmaker: String,
    pub odds_source: OddsSource,
    pub home_xg: f64,
    pub away_xg: f64,
    pub urgency_home: f64,
    pub urgency_away: f64,
    pub data_quality: f64,
    pub suspect_venue: bool,
    pub trail: Vec<String>,
}

/// Every quoted price as a typed pick: named fields first, then the generic map,
/// then derived double chance.
pub fn collect_quotes(odds: &MarketOdds, derive_double_chance: bool) -> Vec<Quote> {
    use Market as M;
    use Selection as S;

    let two = Line::from_floor(2);
    let nine = Line::from_floor(9);
    let three = Line::from_floor(3);
    let explicit = [
        (M::MatchResult, S::Home, odds.home_win),
        (M::MatchResult, S::Draw, odds.draw),
        (M::MatchResult, S::Away, odds.away_win),
        (M::DoubleChance, S::HomeOrDraw, odds.double_chance_1x),
        (M::DoubleChance, S::DrawOrAway, odds.double_chance_x2),
        (M::DoubleChance, S::HomeOrAway, odds.double_chance_12),
        (M::TotalGoals, S::Over(two), odds.over_25),
        (M::TotalGoals, S::Under(two), odds.under_25),
        (M::BothTeamsToScore, S::Yes, odds.btts_yes),
        (M::BothTeamsToScore, S::No, odds.btts_no),
        (M::Corners, S::Over(nine), odds.over_95_corners),
        (M::Corners, S::Under(nine), odds.under_95_corners),
        (M::Cards, S::Over(three), odds.over_35_cards),
        (M::Cards, S::Under(three), odds.under_35_cards),
    ];

    let mut quotes: Vec<Quote> = explicit
        .into_iter()
        .filter(|(_, _, odd)| *odd > 0.0)
        .map(|(market, selection, odd)| Quote {
            pick: Pick::new(market, selection),
            odd,
            source: OddsSource::Explicit,
        })
        .collect();

    let mut catalog = Vec::new();
    for (market_key, selections) in &odds.all_markets {
        for (selection_key, odd) in selections {
            if *odd <= 0.0 {
                continue;
            }
            match Pick::from_keys(market_key, selection_key) {
                Some(pick) => catalog.push(Quote {
                    pick,
                    odd: *odd,
                    source: OddsSource::Catalog,
                }),
                None => trace!(
                    market = %market_key,
                    selection = %selection_key,
                    "unrecognised market entry"
                ),
            }
        }
    }
    catalog.sort_by(|a, b| a.pick.cmp(&b.pick).then(a.odd.total_cmp(&b.odd)));
    quotes.extend(catalog);

    if derive_double_chance && odds.home_win > 1.0 && odds.draw > 1.0 && odds.away_win > 1.0 {
        let quoted = |sel: Selection| quotes.iter().any(|q| q.pick == Pick::new(M::DoubleChance, sel));
        let mut derived = Vec::new();
        if !quoted(S::HomeOrDraw) {
            derived.push((S::HomeOrDraw, combine(odds.home_win, odds.draw)));
        }
        if !quoted(S::DrawOrAway) {
            derived.push((S::DrawOrAway, combine(odds.draw, odds.away_win)));
        }
        quotes.extend(derived.into_iter().map(|(selection, odd)| Quote {
            pick: Pick::new(M::DoubleChance, selection),
            odd,
            source: OddsSource::Derived,
        }));
    }
    quotes
}

fn combine(a: f64, b: f64) -> f64 {
    1.0 / (1.0 / a + 1.0 / b)
}

/// Player prop key such as `shots_over_1.5` or `sot_under_0.5`.
pub fn parse_player_prop(raw: &str) -> Option<(Market, Selection)> {
    let key = raw.trim().to_ascii_lowercase();
    let (kind, rest) = key.split_once('_')?;
    let market = match kind {
        "shots" => Market::PlayerShots,
        "sot" | "shots-on-target" => Market::PlayerShotsOnTarget,
        _ => return None,
    };
    let selection = Selection::parse(rest)?;
    market.accepts(selection).then_some((market, selection))
}

/// Case, accents, dashes and punctuation folded; whitespace collapsed.
/// Diacritics fold across Latin-1 and Latin Extended-A; other scripts pass through.
pub fn normalize_selection(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_space = false;
    for ch in label.chars().flat_map(char::to_lowercase) {
        match fold_ligature(ch) {
            Some(pair) => pair
                .chars()
                .for_each(|c| push_folded(&mut out, &mut pending_space, c)),
            None => push_folded(&mut out, &mut pending_space, fold_accent(ch)),
        }
    }
    out
}

fn push_folded(out: &mut String, pending_space: &mut bool, ch: char) {
    if ('\u{0300}'..='\u{036f}').contains(&ch) {
        return;
    }
    if ch.is_alphanumeric() {
        if *pending_space && !out.is_empty() {
            out.push(' ');
        }
        out.push(ch);
        *pending_space = false;
    } else {
        *pending_space = true;
    }
}

fn fold_ligature(ch: char) -> Option<&'static str> {
    match ch {
        'ß' => Some("ss"),
        'æ' => Some("ae"),
        'œ' => Some("oe"),
        'þ' => Some("th"),
        'ĳ' => Some("ij"),
        _ => None,
    }
}

fn fold_accent(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' | 'ð' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' | 'ș' => 's',
        'ţ' | 'ť' | 'ŧ' | 'ț' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        _ => ch,
    }
}

struct Candidate<'a> {
    market: Market,
    selection: Selection,
    player: Option<&'a str>,
    label: String,
    odd: f64,
    source: OddsSource,
    prob: Option<f64>,
    /// Odds of the full outcome set and this selection's index in it.
    book: Option<(Vec<f64>, usize)>,
}

struct Scan<'a> {
    snapshot: &'a MatchSnapshot,
    outputs: &'a ModelOutputs,
    cfg: &'a EngineConfig,
    conditions: Conditions,
}

pub fn scan_match(
    snapshot: &MatchSnapshot,
    outputs: &ModelOutputs,
    cfg: &EngineConfig,
) -> Vec<ValueOpportunity> {
    if let Err(reason) = model::gate(snapshot, cfg) {
        debug!(match_id = snapshot.match_id, %reason, "scan skipped");
        return Vec::new();
    }

    let conditions = match &outputs.context {
        Some(report) => Conditions {
            weather_stable: report.weather_stable,
            fatigue_free: report.fatigue_free(),
        },
        None => Conditions {
            weather_stable: context::weather_stable(&snapshot.weather, &cfg.context),
            fatigue_free: context::fatigue_free(snapshot, &cfg.context),
        },
    };
    let scan = Scan {
        snapshot,
        outputs,
        cfg,
        conditions,
    };

    let quotes = collect_quotes(&snapshot.odds, cfg.value.derive_double_chance_odds);
    let mut book: HashMap<Pick, f64> = HashMap::new();
    for q in &quotes {
        book.entry(q.pick).or_insert(q.odd);
    }

    let mut candidates: Vec<Candidate> = quotes
        .iter()
        .map(|q| Candidate {
            market: q.pick.market,
            selection: q.pick.selection,
            player: None,
            label: q.pick.label(),
            odd: q.odd,
            source: q.source,
            prob: outputs.prob(q.pick),
            book: outcome_book(q.pick.market, q.pick.selection, q.odd, |sel| {
                book.get(&Pick::new(q.pick.market, sel)).copied()
            }),
        })
        .collect();

    if cfg.value.player_props_enabled {
        candidates.extend(player_candidates(&snapshot.odds, outputs));
    }

    let mut found = Vec::new();
    for candidate in &candidates {
        match scan.evaluate(candidate) {
            Ok(opp) => found.push(opp),
            Err(gate) => trace!(
                match_id = snapshot.match_id,
                pick = %candidate.label,
                odd = candidate.odd,
                gate = gate.as_str(),
                "candidate dropped"
            ),
        }
    }
    let kept = dedup(found);
    debug!(
        match_id = snapshot.match_id,
        candidates = candidates.len(),
        opportunities = kept.len(),
        "match scanned"
    );
    kept
}

fn outcome_book(
    market: Market,
    selection: Selection,
    own_odd: f64,
    lookup: impl Fn(Selection) -> Option<f64>,
) -> Option<(Vec<f64>, usize)> {
    let outcomes = market.partition(selection)?;
    let index = outcomes.iter().position(|s| *s == selection)?;
    let odds = outcomes
        .iter()
        .map(|s| if *s == selection { Some(own_odd) } else { lookup(*s) })
        .collect::<Option<Vec<f64>>>()?;
    Some((odds, index))
}

fn player_candidates<'a>(odds: &'a MarketOdds, outputs: &ModelOutputs) -> Vec<Candidate<'a>> {
    let mut players: Vec<_> = odds.player_props.iter().collect();
    players.sort_by(|a, b| a.0.cmp(b.0));

    let mut out = Vec::new();
    for (player, props) in players {
        let player_key = normalize_selection(player);
        let parsed: HashMap<(Market, Selection), f64> = props
            .iter()
            .filter(|(_, odd)| **odd > 0.0)
            .filter_map(|(key, odd)| parse_player_prop(key).map(|ms| (ms, *odd)))
            .collect();
        let mut entries: Vec<_> = parsed.iter().map(|(k, odd)| (*k, *odd)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for ((market, selection), odd) in entries {
            out.push(Candidate {
                market,
                selection,
                player: Some(player.as_str()),
                label: format!("{player} {}", Pick::new(market, selection).label()),
                odd,
                source: OddsSource::PlayerProp,
                prob: outputs
                    .player_prob(&player_key, market, selection)
                    .map(|p| p.prob),
                book: outcome_book(market, selection, odd, |sel| {
                    parsed.get(&(market, sel)).copied()
                }),
            });
        }
    }
    out
}

impl Scan<'_> {
    fn evaluate(&self, c: &Candidate) -> Result<ValueOpportunity, Gate> {
        let value = &self.cfg.value;
        if value.exclude_draw && c.market == Market::MatchResult && c.selection == Selection::Draw
        {
            return Err(Gate::DrawExcluded);
        }

        let prob = c.prob.ok_or(Gate::NoModelProbability)?;
        if prob <= value.scan_prob_floor || prob >= value.scan_prob_ceiling {
            return Err(Gate::ProbabilityOutOfScan);
        }

        let ceiling = c.market.odds_ceiling(&self.cfg.odds_bounds);
        if !c.odd.is_finite() || c.odd <= 1.0 || c.odd < value.min_odd || c.odd > ceiling {
            return Err(Gate::OddImplausible);
        }

        let total_xg = self.outputs.total_xg();
        let xg_sane = (value.min_total_xg..=value.max_total_xg).contains(&total_xg);
        if !(value.min_model_prob..=value.max_model_prob).contains(&prob)
            || (c.market.is_goal_based() && !xg_sane)
        {
            return Err(Gate::ModelInsane);
        }

        let edge = edge(prob, c.odd);
        if edge < value.min_edge {
            return Err(Gate::EdgeBelowMinimum);
        }
        if edge >= value.max_sane_edge {
            return Err(Gate::EdgeAnomalous);
        }

        let stake = kelly_stake(prob, c.odd, value.kelly_fraction, value.max_kelly_bet);
        let confidence = confidence::classify(edge, prob, self.conditions);
        let (implied_prob, devig_method) = match &c.book {
            Some((odds, idx)) => {
                let fair = devig::devig(odds, value.devig_method);
                (fair.probs[*idx], Some(fair.method))
            }
            None => (1.0 / c.odd, None),
        };

        let snap = self.snapshot;
        let trail = self.trail(c, prob, edge, stake, implied_prob, devig_method, confidence);
        Ok(ValueOpportunity {
            match_id: snap.match_id,
            league: snap.league_name.clone(),
            kickoff: snap.kickoff,
            home_team: snap.home.name.clone(),
            away_team: snap.away.name.clone(),
            market: c.market,
            selection: c.selection,
            player: c.player.map(str::to_string),
            label: c.label.clone(),
            market_odd: c.odd,
            fair_odd: fair_odd(prob),
            model_prob: prob,
            implied_prob,
            devig_method,
            edge,
            kelly_stake: stake,
            confidence,
            bookmaker: snap.odds.bookmaker.clone(),
            odds_source: c.source,
            home_xg: self.outputs.home_xg,
            away_xg: self.outputs.away_xg,
            urgency_home: self.outputs.urgency.home,
            urgency_away: self.outputs.urgency.away,
            data_quality: snap.quality.score,
            suspect_venue: self.outputs.suspect_venue,
            trail,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn trail(
        &self,
        c: &Candidate,
        prob: f64,
        edge: f64,
        stake: f64,
        implied: f64,
        method: Option<DevigMethod>,
        confidence: Confidence,
    ) -> Vec<String> {
        let out = self.outputs;
        let snap = self.snapshot;
        let xg = &out.xg_model;
        let k = &out.strength.coefficients;
        let n = self.cfg.model.max_goals + 1;
        let mut lines = Vec::new();

        let mc = match &out.monte_carlo {
            Some(mc) => format!(
                ", {} Monte Carlo samples blended {:.0}/{:.0}",
                mc.samples,
                mc.analytic_weight * 100.0,
                (1.0 - mc.analytic_weight) * 100.0
            ),
            None => String::new(),
        };
        lines.push(format!(
            "Model: bivariate Poisson with Dixon-Coles rho {:.3}, {n}x{n} score grid{mc}",
            out.rho
        ));
        lines.push(format!(
            "Strength: {} attack {:.3} / defense {:.3} ({} games); {} attack {:.3} / defense {:.3} ({} games){}",
            snap.home.name,
            k.home_attack,
            k.home_defense,
            out.strength.home.games_played,
            snap.away.name,
            k.away_attack,
            k.away_defense,
            out.strength.away.games_played,
            if out.suspect_venue {
                "; venue suspect, splits averaged and no home advantage"
            } else {
                ""
            }
        ));
        lines.push(format!(
            "Form: home {:.2} (x{:.3}), away {:.2} (x{:.3})",
            out.form_points_home, xg.form_home, out.form_points_away, xg.form_away
        ));
        lines.push(format!(
            "xG: home {:.3} x {:.3} x {:.2} x {:.3} = {:.3} -> {:.3}; away {:.3} x {:.3} x {:.3} = {:.3} -> {:.3}",
            k.home_attack,
            k.away_defense,
            xg.home_advantage,
            xg.form_home,
            xg.raw_home,
            xg.home,
            k.away_attack,
            k.home_defense,
            xg.form_away,
            xg.raw_away,
            xg.away
        ));
        lines.push(format!(
            "Probabilities: 1X2 {:.1}% / {:.1}% / {:.1}%, Over 2.5 {:.1}%, BTTS {:.1}%, xG {:.2}-{:.2}, corners {:.1}, cards {:.1}",
            out.result.home * 100.0,
            out.result.draw * 100.0,
            out.result.away * 100.0,
            out.over_25 * 100.0,
            out.btts * 100.0,
            out.home_xg,
            out.away_xg,
            out.expected_corners,
            out.expected_cards
        ));
        if let Some(report) = &out.context {
            for note in &report.notes {
                lines.push(format!("Context: {note}"));
            }
        }
        let method = match method {
            Some(m) => format!("de-vigged ({m:?})"),
            None => "raw 1/odd".to_string(),
        };
        lines.push(format!(
            "Market: {} @ {:.2} ({}, {:?}), implied {:.1}% {method}",
            c.label,
            c.odd,
            if snap.odds.bookmaker.is_empty() {
                "unknown book"
            } else {
                snap.odds.bookmaker.as_str()
            },
            c.source,
            implied * 100.0
        ));
        lines.push(format!(
            "Edge: {:.4} x {:.2} - 1 = {:+.4}; Kelly stake {:.2}% of bankroll",
            prob,
            c.odd,
            edge,
            stake * 100.0
        ));
        lines.push(format!(
            "Conclusion: {confidence} confidence, model {:.1}% vs market {:.1}%",
            prob * 100.0,
            implied * 100.0
        ));
        lines
    }
}

/// Keeps the highest-edge instance of each normalised selection per match.
pub fn dedup(opps: Vec<ValueOpportunity>) -> Vec<ValueOpportunity> {
    let mut seen: HashMap<(u64, String), usize> = HashMap::new();
    let mut out: Vec<ValueOpportunity> = Vec::with_capacity(opps.len());
    for opp in opps {
        let key = (opp.match_id, normalize_selection(&opp.label));
        match seen.get(&key) {
            Some(&idx) => {
                if opp.edge > out[idx].edge {
                    out[idx] = opp;
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(opp);
            }
        }
    }
    out
}

/// Descending edge; ties keep match and label order stable.
pub fn rank(opps: &mut [ValueOpportunity]) {
    opps.sort_by(|a, b| {
        b.edge
            .total_cmp(&a.edge)
            .then(a.match_id.cmp(&b.match_id))
            .then_with(|| a.label.cmp(&b.label))
    });
}
