use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Everything known about one fixture before kickoff. Never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub match_id: u64,
    #[serde(default)]
    pub league_id: u32,
    #[serde(default)]
    pub league_name: String,
    #[serde(default)]
    pub league_country: String,
    pub kickoff: NaiveDateTime,
    #[serde(default)]
    pub venue: String,
    pub home: TeamProfile,
    pub away: TeamProfile,
    #[serde(default)]
    pub weather: WeatherReading,
    #[serde(default)]
    pub referee: RefereeProfile,
    #[serde(default)]
    pub odds: MarketOdds,
    #[serde(default = "default_league_avg_goals")]
    pub league_avg_goals: f64,
    #[serde(default = "default_league_size")]
    pub league_size: u32,
    #[serde(default)]
    pub quality: DataQuality,
}

fn default_league_avg_goals() -> f64 {
    2.7
}

fn default_league_size() -> u32 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamProfile {
    pub team_id: u32,
    pub name: String,
    pub attack_strength: f64,
    pub defense_strength: f64,
    pub home_scored_avg: f64,
    pub home_conceded_avg: f64,
    pub away_scored_avg: f64,
    pub away_conceded_avg: f64,
    pub shots_total_avg: f64,
    pub shots_on_target_avg: f64,
    pub shots_blocked_avg: f64,
    pub corners_avg: f64,
    pub cards_avg: f64,
    pub fouls_avg: f64,
    pub possession_final_third: f64,
    /// Most recent first, one of `W`, `D`, `L` per match.
    pub form: String,
    pub league_position: u32,
    pub league_points: u32,
    pub games_played: u32,
    pub games_remaining: u32,
    pub points_to_title: u32,
    pub points_to_relegation: u32,
    pub last_match_at: Option<NaiveDateTime>,
    pub injuries: Vec<Injury>,
    pub injuries_checked: bool,
    pub has_real_data: bool,
    pub players: Vec<PlayerShotProfile>,
}

impl Default for TeamProfile {
    fn default() -> Self {
        Self {
            team_id: 0,
            name: String::new(),
            attack_strength: 1.0,
            defense_strength: 1.0,
            home_scored_avg: 1.35,
            home_conceded_avg: 1.35,
            away_scored_avg: 1.35,
            away_conceded_avg: 1.35,
            shots_total_avg: 11.0,
            shots_on_target_avg: 4.0,
            shots_blocked_avg: 3.0,
            corners_avg: 5.0,
            cards_avg: 2.0,
            fouls_avg: 12.5,
            possession_final_third: 25.0,
            form: String::new(),
            league_position: 0,
            league_points: 0,
            games_played: 0,
            games_remaining: 0,
            points_to_title: 99,
            points_to_relegation: 99,
            last_match_at: None,
            injuries: Vec::new(),
            injuries_checked: false,
            has_real_data: false,
            players: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Injury {
    pub player: String,
    pub detail: String,
    pub long_term: bool,
}

impl Injury {
    /// Explicit flag, or an absence described in months.
    pub fn is_long_term(&self) -> bool {
        if self.long_term {
            return true;
        }
        let detail = self.detail.to_ascii_lowercase();
        detail.contains("month") || detail.contains("meses")
    }
}

/// Per-match shot counts for one player, most recent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerShotProfile {
    pub name: String,
    pub shots: Vec<u32>,
    pub on_target: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherReading {
    pub temperature_c: f64,
    pub wind_speed_kmh: f64,
    pub rain_mm: f64,
    pub humidity_pct: f64,
    pub description: String,
}

impl Default for WeatherReading {
    fn default() -> Self {
        Self {
            temperature_c: 20.0,
            wind_speed_kmh: 5.0,
            rain_mm: 0.0,
            humidity_pct: 50.0,
            description: "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeProfile {
    pub name: Option<String>,
    pub cards_per_game_avg: f64,
    pub fouls_per_game_avg: f64,
}

impl Default for RefereeProfile {
    fn default() -> Self {
        Self {
            name: None,
            cards_per_game_avg: 4.0,
            fouls_per_game_avg: 25.0,
        }
    }
}

impl RefereeProfile {
    pub fn is_known(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}

/// Bookmaker prices. A price of 0.0 means the market was not quoted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketOdds {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
    pub over_25: f64,
    pub under_25: f64,
    pub btts_yes: f64,
    pub btts_no: f64,
    pub over_95_corners: f64,
    pub under_95_corners: f64,
    pub over_35_cards: f64,
    pub under_35_cards: f64,
    pub double_chance_1x: f64,
    pub double_chance_x2: f64,
    pub double_chance_12: f64,
    pub bookmaker: String,
    /// market key -> selection key -> decimal odd, e.g. `goals_ou` -> `over_1.5`.
    pub all_markets: HashMap<String, HashMap<String, f64>>,
    /// player name -> prop key -> decimal odd, e.g. `shots_over_1.5`.
    pub player_props: HashMap<String, HashMap<String, f64>>,
}

impl MarketOdds {
    pub fn has_match_result(&self) -> bool {
        self.home_win > 1.0 && self.away_win > 1.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataQuality {
    pub has_real_odds: bool,
    pub has_real_standings: bool,
    pub has_real_weather: bool,
    pub score: f64,
    pub home_away_suspect: bool,
}

impl DataQuality {
    /// Rebuilds flags and the composite score from what the snapshot carries.
    pub fn assess(snapshot: &MatchSnapshot) -> Self {
        let real_home = snapshot.home.has_real_data;
        let real_away = snapshot.away.has_real_data;
        let mut score = 0.0;
        if real_home && real_away {
            score += 0.40;
        } else if real_home || real_away {
            score += 0.20;
        }
        if snapshot.quality.has_real_odds {
            score += 0.35;
        }
        if snapshot.referee.is_known() {
            score += 0.10;
        }
        if snapshot.quality.has_real_weather {
            score += 0.10;
        }
        if snapshot.home.injuries_checked || snapshot.away.injuries_checked {
            score += 0.15;
        }
        Self {
            has_real_odds: snapshot.quality.has_real_odds,
            has_real_standings: real_home || real_away,
            has_real_weather: snapshot.quality.has_real_weather,
            score: f64::min(score, 1.0),
            home_away_suspect: snapshot.quality.home_away_suspect,
        }
    }
}

impl MatchSnapshot {
    /// Heavy away favourite on real odds hints the venue is swapped or neutral.
    pub fn odds_suggest_swapped_venue(&self, ratio: f64) -> bool {
        self.quality.has_real_odds
            && self.odds.has_match_result()
            && self.odds.home_win / self.odds.away_win > ratio
    }

    pub fn venue_suspect(&self, ratio: f64) -> bool {
        self.quality.home_away_suspect || self.odds_suggest_swapped_venue(ratio)
    }

    pub fn fixture_label(&self) -> String {
        format!("{} vs {}", self.home.name, self.away.name)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::snapshot;
    use super::{DataQuality, Injury};

    #[test]
    fn quality_score_adds_components() {
        let snap = snapshot();
        let q = DataQuality::assess(&snap);
        assert!((q.score - 1.0).abs() < 1e-12);

        let mut partial = snapshot();
        partial.away.has_real_data = false;
        partial.referee.name = None;
        partial.home.injuries_checked = false;
        partial.away.injuries_checked = false;
        let q = DataQuality::assess(&partial);
        assert!((q.score - 0.55).abs() < 1e-12);
        assert!(q.has_real_standings);

        partial.quality.has_real_weather = true;
        let with_weather = DataQuality::assess(&partial);
        assert!((with_weather.score - q.score - 0.10).abs() < 1e-12);
        assert!(with_weather.has_real_weather);
    }

    #[test]
    fn real_weather_lifts_a_borderline_match_over_the_floor() {
        let mut snap = snapshot();
        snap.referee.name = None;
        snap.home.injuries_checked = false;
        snap.away.injuries_checked = false;
        assert!((DataQuality::assess(&snap).score - 0.75).abs() < 1e-12);
        snap.quality.has_real_weather = true;
        assert!((DataQuality::assess(&snap).score - 0.85).abs() < 1e-12);
        snap.referee.name = Some("Ref".to_string());
        snap.home.injuries_checked = true;
        assert!((DataQuality::assess(&snap).score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn heavy_away_favourite_flags_venue() {
        let mut snap = snapshot();
        assert!(!snap.venue_suspect(2.0));
        snap.odds.home_win = 6.0;
        snap.odds.away_win = 1.5;
        assert!(snap.venue_suspect(2.0));
        snap.quality.has_real_odds = false;
        assert!(!snap.venue_suspect(2.0));
    }

    #[test]
    fn long_term_injury_from_detail() {
        let inj = Injury {
            player: "X".to_string(),
            detail: "Out for 3 months".to_string(),
            long_term: false,
        };
        assert!(inj.is_long_term());
        assert!(!Injury::default().is_long_term());
    }

    #[test]
    fn minimal_json_fills_defaults() {
        let raw = r#"{
            "match_id": 7,
            "kickoff": "2026-10-18T16:00:00",
            "home": { "name": "A" },
            "away": { "name": "B" }
        }"#;
        let snap: super::MatchSnapshot = serde_json::from_str(raw).expect("parse");
        assert_eq!(snap.league_avg_goals, 2.7);
        assert_eq!(snap.weather.temperature_c, 20.0);
        assert_eq!(snap.home.points_to_title, 99);
        assert!(snap.odds.all_markets.is_empty());
    }
}
