use chrono::NaiveDateTime;
use serde::Serialize;

use crate::config::ContextConfig;
use crate::outputs::ModelOutputs;
use crate::scoregrid::Side;
use crate::snapshot::{Injury, MatchSnapshot, TeamProfile, WeatherReading};

const MIN_PROB: f64 = 1e-4;

/// League urgency score per side, 0.2 (nothing to play for) to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Urgency {
    pub home: f64,
    pub away: f64,
}

impl Urgency {
    pub fn for_match(snapshot: &MatchSnapshot) -> Self {
        Self {
            home: league_urgency(&snapshot.home, snapshot.league_size),
            away: league_urgency(&snapshot.away, snapshot.league_size),
        }
    }
}

pub fn league_urgency(team: &TeamProfile, league_size: u32) -> f64 {
    if team.points_to_title <= 3 || team.points_to_relegation <= 3 {
        return 1.0;
    }

    let mid_start = league_size / 3;
    let mid_end = 2 * league_size / 3;
    let mid_table = (mid_start..=mid_end).contains(&team.league_position);
    if mid_table && team.games_remaining <= 5 {
        return 0.2;
    }

    let title = (1.0 - f64::from(team.points_to_title) / 20.0).max(0.0);
    let relegation = (1.0 - f64::from(team.points_to_relegation) / 15.0).max(0.0);
    let mut base = title.max(relegation);
    if team.games_remaining <= 8 {
        let pressure = 1.0 + f64::from(8 - team.games_remaining) * 0.05;
        base = (base * pressure).min(1.0);
    }
    (base + 0.2).clamp(0.2, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Motivation {
    Neutral,
    /// Both sides coasting; mass moved to the draw.
    Complacency,
    Favours { side: Side },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherAdjustment {
    pub xg: f64,
    pub corners: f64,
    pub cards: f64,
    pub btts_boost: f64,
    pub variance: f64,
    pub notes: Vec<String>,
}

impl WeatherAdjustment {
    pub fn none() -> Self {
        Self {
            xg: 1.0,
            corners: 1.0,
            cards: 1.0,
            btts_boost: 0.0,
            variance: 1.0,
            notes: Vec::new(),
        }
    }
}

pub fn weather_adjustment(weather: &WeatherReading, cfg: &ContextConfig) -> WeatherAdjustment {
    let mut adj = WeatherAdjustment::none();

    if weather.wind_speed_kmh > cfg.wind_threshold_kmh {
        let severity = ((weather.wind_speed_kmh - cfg.wind_threshold_kmh) / 30.0).min(1.0);
        let penalty = cfg.wind_xg_penalty * (1.0 + severity);
        adj.xg -= penalty;
        adj.corners -= penalty * 0.5;
        adj.variance += severity * 0.15;
        adj.notes.push(format!(
            "strong wind ({:.0} km/h): xG -{:.1}%",
            weather.wind_speed_kmh,
            penalty * 100.0
        ));
    }

    if weather.rain_mm > cfg.rain_threshold_mm {
        let severity = ((weather.rain_mm - cfg.rain_threshold_mm) / 15.0).min(1.0);
        adj.xg -= cfg.rain_xg_penalty * (1.0 + severity) * 0.3;
        adj.btts_boost = severity * 0.05;
        adj.variance += severity * 0.20;
        adj.cards += severity * 0.10;
        adj.notes.push(format!(
            "rain ({:.1} mm): variance up, BTTS +{:.1}%",
            weather.rain_mm,
            severity * 5.0
        ));
    }

    if weather.temperature_c > cfg.heat_threshold_c {
        let severity = ((weather.temperature_c - cfg.heat_threshold_c) / 10.0).min(1.0);
        adj.xg -= severity * 0.04;
        adj.corners -= severity * 0.10;
        adj.notes.push(format!(
            "heat ({:.0} C): lower pressing, fewer corners",
            weather.temperature_c
        ));
    } else if weather.temperature_c < cfg.cold_threshold_c {
        let severity = ((cfg.cold_threshold_c - weather.temperature_c) / 15.0).min(1.0);
        adj.variance += severity * 0.10;
        adj.notes.push(format!(
            "cold ({:.0} C): variance slightly up",
            weather.temperature_c
        ));
    }

    adj.xg = adj.xg.clamp(0.75, 1.10);
    adj.corners = adj.corners.clamp(0.70, 1.10);
    adj.cards = adj.cards.clamp(0.85, 1.25);
    adj.variance = adj.variance.clamp(1.0, 1.50);
    adj
}

pub fn weather_stable(weather: &WeatherReading, cfg: &ContextConfig) -> bool {
    weather.wind_speed_kmh <= cfg.wind_threshold_kmh && weather.rain_mm <= cfg.rain_threshold_mm
}

/// Multiplier below 1.0 when the side played inside the rest window.
pub fn fatigue_factor(
    last_match_at: Option<NaiveDateTime>,
    kickoff: NaiveDateTime,
    cfg: &ContextConfig,
) -> Option<f64> {
    let last = last_match_at?;
    let hours = (kickoff - last).num_minutes() as f64 / 60.0;
    if hours < 0.0 || hours >= cfg.fatigue_window_hours {
        return None;
    }
    let rest = hours / cfg.fatigue_window_hours;
    Some(1.0 - cfg.fatigue_max_penalty * (1.0 - rest))
}

pub fn fatigue_free(snapshot: &MatchSnapshot, cfg: &ContextConfig) -> bool {
    fatigue_factor(snapshot.home.last_match_at, snapshot.kickoff, cfg).is_none()
        && fatigue_factor(snapshot.away.last_match_at, snapshot.kickoff, cfg).is_none()
}

pub fn injury_factor(injuries: &[Injury], cfg: &ContextConfig) -> f64 {
    if injuries.is_empty() {
        return 1.0;
    }
    let mut impact = (1.0 - injuries.len() as f64 * cfg.injury_per_player).max(cfg.injury_floor);
    impact -= injuries.iter().filter(|i| i.is_long_term()).count() as f64 * cfg.long_term_penalty;
    impact.max(cfg.injury_hard_floor)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextReport {
    pub urgency: Urgency,
    pub motivation: Motivation,
    pub weather: WeatherAdjustment,
    pub weather_stable: bool,
    pub fatigue_home: Option<f64>,
    pub fatigue_away: Option<f64>,
    pub injury_home: f64,
    pub injury_away: f64,
    pub notes: Vec<String>,
}

impl ContextReport {
    pub fn fatigue_free(&self) -> bool {
        self.fatigue_home.is_none() && self.fatigue_away.is_none()
    }
}

/// Urgency, weather, fatigue, injuries, in that order, on the headline numbers.
pub fn apply(
    outputs: &mut ModelOutputs,
    snapshot: &MatchSnapshot,
    cfg: &ContextConfig,
) -> ContextReport {
    let urgency = outputs.urgency;
    let mut notes = Vec::new();
    let mut p = outputs.result;

    let motivation = if urgency.home < cfg.urgency_low && urgency.away < cfg.urgency_low {
        let shift = cfg.urgency_draw_shift;
        p.home *= 1.0 - shift * 0.5;
        p.away *= 1.0 - shift * 0.5;
        p.draw += shift;
        notes.push(format!(
            "both sides complacent (LUS {:.2}/{:.2}): draw +{:.0}%",
            urgency.home,
            urgency.away,
            shift * 100.0
        ));
        Motivation::Complacency
    } else if (urgency.home - urgency.away).abs() > cfg.urgency_gap {
        let shift = cfg.urgency_side_shift;
        let side = if urgency.home > urgency.away {
            p.home += shift;
            p.away = (p.away - shift).max(MIN_PROB);
            Side::Home
        } else {
            p.away += shift;
            p.home = (p.home - shift).max(MIN_PROB);
            Side::Away
        };
        notes.push(format!(
            "motivation gap (LUS {:.2}/{:.2}) favours {side:?}",
            urgency.home, urgency.away
        ));
        Motivation::Favours { side }
    } else {
        Motivation::Neutral
    };

    let weather = weather_adjustment(&snapshot.weather, cfg);
    outputs.home_xg *= weather.xg;
    outputs.away_xg *= weather.xg;
    outputs.expected_corners *= weather.corners;
    outputs.expected_cards *= weather.cards;
    if weather.btts_boost > 0.0 {
        outputs.btts = (outputs.btts + weather.btts_boost).min(0.95);
    }
    if weather.xg < 0.95 {
        outputs.over_25 *= 1.0 - (1.0 - weather.xg) * 0.8;
    }
    notes.extend(weather.notes.iter().cloned());

    let fatigue_home = fatigue_factor(snapshot.home.last_match_at, snapshot.kickoff, cfg);
    let fatigue_away = fatigue_factor(snapshot.away.last_match_at, snapshot.kickoff, cfg);
    if let Some(f) = fatigue_home {
        p.home *= f;
        p.away *= 2.0 - f;
        outputs.home_xg *= f;
        outputs.expected_corners *= (f + 1.0) / 2.0;
        notes.push(format!("{} fatigued: factor {f:.3}", snapshot.home.name));
    }
    if let Some(f) = fatigue_away {
        p.away *= f;
        p.home *= 2.0 - f;
        outputs.away_xg *= f;
        outputs.expected_corners *= (f + 1.0) / 2.0;
        notes.push(format!("{} fatigued: factor {f:.3}", snapshot.away.name));
    }

    let injury_home = injury_factor(&snapshot.home.injuries, cfg);
    let injury_away = injury_factor(&snapshot.away.injuries, cfg);
    p.home *= injury_home;
    outputs.away_xg /= injury_home.max(cfg.injury_floor);
    p.away *= injury_away;
    outputs.home_xg /= injury_away.max(cfg.injury_floor);
    for (team, factor) in [
        (&snapshot.home, injury_home),
        (&snapshot.away, injury_away),
    ] {
        if factor < 1.0 {
            notes.push(format!(
                "{}: {} injuries, factor {factor:.3}",
                team.name,
                team.injuries.len()
            ));
        }
    }

    outputs.result = p.normalized();
    outputs.over_25 = outputs.over_25.clamp(0.05, 0.95);
    outputs.btts = outputs.btts.clamp(0.05, 0.95);
    outputs.home_xg = outputs.home_xg.max(0.2);
    outputs.away_xg = outputs.away_xg.max(0.15);
    outputs.expected_corners = outputs.expected_corners.max(3.0);
    outputs.expected_cards = outputs.expected_cards.max(1.5);

    ContextReport {
        urgency,
        motivation,
        weather_stable: weather_stable(&snapshot.weather, cfg),
        weather,
        fatigue_home,
        fatigue_away,
        injury_home,
        injury_away,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::snapshot::fixtures::snapshot;

    fn team(title: u32, releg: u32, pos: u32, remaining: u32) -> TeamProfile {
        TeamProfile {
            points_to_title: title,
            points_to_relegation: releg,
            league_position: pos,
            games_remaining: remaining,
            ..TeamProfile::default()
        }
    }

    #[test]
    fn urgency_extremes() {
        assert_eq!(league_urgency(&team(2, 30, 1, 10), 20), 1.0);
        assert_eq!(league_urgency(&team(30, 3, 18, 10), 20), 1.0);
        assert_eq!(league_urgency(&team(25, 20, 10, 4), 20), 0.2);
    }

    #[test]
    fn urgency_gradient_and_time_pressure() {
        // title gap 10 -> 0.5, plus 0.2
        assert!((league_urgency(&team(10, 40, 3, 20), 20) - 0.7).abs() < 1e-12);
        // with 4 games left the base is boosted by 20%
        assert!((league_urgency(&team(10, 40, 3, 4), 20) - 0.8).abs() < 1e-12);
        assert_eq!(league_urgency(&team(60, 60, 3, 20), 20), 0.2);
    }

    #[test]
    fn wind_degrades_goals_and_corners() {
        let cfg = ContextConfig::default();
        let weather = WeatherReading {
            wind_speed_kmh: 35.0,
            ..WeatherReading::default()
        };
        let adj = weather_adjustment(&weather, &cfg);
        assert!((adj.xg - 0.88).abs() < 1e-12);
        assert!((adj.corners - 0.94).abs() < 1e-12);
        assert!((adj.variance - 1.075).abs() < 1e-12);
        assert!(!weather_stable(&weather, &cfg));
        assert_eq!(adj.notes.len(), 1);
    }

    #[test]
    fn rain_and_storm_stay_in_bands() {
        let cfg = ContextConfig::default();
        let storm = WeatherReading {
            wind_speed_kmh: 90.0,
            rain_mm: 40.0,
            temperature_c: 38.0,
            ..WeatherReading::default()
        };
        let adj = weather_adjustment(&storm, &cfg);
        assert!((adj.xg - 0.778).abs() < 1e-12);
        assert!((adj.corners - 0.84).abs() < 1e-12);
        assert!((adj.cards - 1.10).abs() < 1e-12);
        assert!((adj.btts_boost - 0.05).abs() < 1e-12);
        assert!((adj.variance - 1.35).abs() < 1e-12);
        assert_eq!(adj.notes.len(), 3);

        let calm = weather_adjustment(&WeatherReading::default(), &cfg);
        assert_eq!(calm, WeatherAdjustment::none());
    }

    #[test]
    fn fatigue_scales_with_rest() {
        let cfg = ContextConfig::default();
        let kickoff = snapshot().kickoff;
        let tired = fatigue_factor(Some(kickoff - Duration::hours(36)), kickoff, &cfg);
        assert!((tired.expect("inside window") - 0.925).abs() < 1e-12);
        assert_eq!(fatigue_factor(Some(kickoff - Duration::hours(96)), kickoff, &cfg), None);
        assert_eq!(fatigue_factor(None, kickoff, &cfg), None);
        assert_eq!(fatigue_factor(Some(kickoff + Duration::hours(5)), kickoff, &cfg), None);
    }

    #[test]
    fn injuries_with_long_absences_cost_more() {
        let cfg = ContextConfig::default();
        let inj = |detail: &str| Injury {
            player: "P".to_string(),
            detail: detail.to_string(),
            long_term: false,
        };
        assert_eq!(injury_factor(&[], &cfg), 1.0);
        let three = [inj("knock"), inj("hamstring"), inj("out for 4 months")];
        assert!((injury_factor(&three, &cfg) - 0.915).abs() < 1e-12);
        let many: Vec<Injury> = (0..12).map(|_| inj("6 months")).collect();
        assert_eq!(injury_factor(&many, &cfg), 0.80);
    }
}
