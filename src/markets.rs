use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::OddsBounds;

/// A half-goal threshold `n + 0.5`. Over settles when the count exceeds `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Line(u8);

impl Line {
    pub const fn from_floor(floor: u8) -> Self {
        Self(floor)
    }

    pub fn from_value(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.5..=255.5).contains(&value) {
            return None;
        }
        let floor = value.floor();
        if ((value - floor) - 0.5).abs() > 1e-6 {
            return None;
        }
        Some(Self(floor as u8))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse::<f64>().ok().and_then(Self::from_value)
    }

    pub fn value(self) -> f64 {
        f64::from(self.0) + 0.5
    }

    /// Highest count that still settles Under.
    pub fn floor(self) -> u32 {
        u32::from(self.0)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.5", self.0)
    }
}

impl Serialize for Line {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for Line {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Line::from_value(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("{raw} is not a half-goal line")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Market {
    MatchResult,
    DoubleChance,
    TotalGoals,
    HomeGoals,
    AwayGoals,
    BothTeamsToScore,
    CleanSheetHome,
    CleanSheetAway,
    WinToNilHome,
    WinToNilAway,
    OddEven,
    HalfTimeResult,
    HalfTimeGoals,
    ExactScore,
    Corners,
    Cards,
    TotalShots,
    TotalShotsOnTarget,
    HomeShots,
    AwayShots,
    HomeShotsOnTarget,
    AwayShotsOnTarget,
    ShotsMatchBet,
    ShotsOnTargetMatchBet,
    PlayerShots,
    PlayerShotsOnTarget,
}

impl Market {
    pub const ALL: [Market; 26] = [
        Market::MatchResult,
        Market::DoubleChance,
        Market::TotalGoals,
        Market::HomeGoals,
        Market::AwayGoals,
        Market::BothTeamsToScore,
        Market::CleanSheetHome,
        Market::CleanSheetAway,
        Market::WinToNilHome,
        Market::WinToNilAway,
        Market::OddEven,
        Market::HalfTimeResult,
        Market::HalfTimeGoals,
        Market::ExactScore,
        Market::Corners,
        Market::Cards,
        Market::TotalShots,
        Market::TotalShotsOnTarget,
        Market::HomeShots,
        Market::AwayShots,
        Market::HomeShotsOnTarget,
        Market::AwayShotsOnTarget,
        Market::ShotsMatchBet,
        Market::ShotsOnTargetMatchBet,
        Market::PlayerShots,
        Market::PlayerShotsOnTarget,
    ];

    /// Key used by odds feeds in `all_markets`.
    pub fn key(self) -> &'static str {
        match self {
            Market::MatchResult => "1x2",
            Market::DoubleChance => "double_chance",
            Market::TotalGoals => "goals_ou",
            Market::HomeGoals => "home_goals_ou",
            Market::AwayGoals => "away_goals_ou",
            Market::BothTeamsToScore => "btts",
            Market::CleanSheetHome => "cs_home",
            Market::CleanSheetAway => "cs_away",
            Market::WinToNilHome => "wtn_home",
            Market::WinToNilAway => "wtn_away",
            Market::OddEven => "odd_even",
            Market::HalfTimeResult => "ht_result",
            Market::HalfTimeGoals => "ht_goals_ou",
            Market::ExactScore => "exact_score",
            Market::Corners => "corners_ou",
            Market::Cards => "cards_ou",
            Market::TotalShots => "shots_ou",
            Market::TotalShotsOnTarget => "sot_ou",
            Market::HomeShots => "home_shots_ou",
            Market::AwayShots => "away_shots_ou",
            Market::HomeShotsOnTarget => "home_sot_ou",
            Market::AwayShotsOnTarget => "away_sot_ou",
            Market::ShotsMatchBet => "shots_1x2",
            Market::ShotsOnTargetMatchBet => "sot_1x2",
            Market::PlayerShots => "player_shots",
            Market::PlayerShotsOnTarget => "player_sot",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        if let Some(m) = Market::ALL.iter().copied().find(|m| m.key() == key) {
            return Some(m);
        }
        match key.as_str() {
            "match_winner" | "match_result" | "moneyline" => Some(Market::MatchResult),
            "dc" => Some(Market::DoubleChance),
            "totals" | "goals" | "over_under" => Some(Market::TotalGoals),
            "both_teams_to_score" => Some(Market::BothTeamsToScore),
            "correct_score" => Some(Market::ExactScore),
            "corners" => Some(Market::Corners),
            "cards" | "bookings" => Some(Market::Cards),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Market::MatchResult => "1X2",
            Market::DoubleChance => "Double Chance",
            Market::TotalGoals => "Goals O/U",
            Market::HomeGoals => "Home Goals O/U",
            Market::AwayGoals => "Away Goals O/U",
            Market::BothTeamsToScore => "Both Teams To Score",
            Market::CleanSheetHome => "Home Clean Sheet",
            Market::CleanSheetAway => "Away Clean Sheet",
            Market::WinToNilHome => "Home Win To Nil",
            Market::WinToNilAway => "Away Win To Nil",
            Market::OddEven => "Odd/Even Goals",
            Market::HalfTimeResult => "Half-Time Result",
            Market::HalfTimeGoals => "Half-Time Goals O/U",
            Market::ExactScore => "Exact Score",
            Market::Corners => "Corners O/U",
            Market::Cards => "Cards O/U",
            Market::TotalShots => "Shots O/U",
            Market::TotalShotsOnTarget => "Shots On Target O/U",
            Market::HomeShots => "Home Shots O/U",
            Market::AwayShots => "Away Shots O/U",
            Market::HomeShotsOnTarget => "Home Shots On Target O/U",
            Market::AwayShotsOnTarget => "Away Shots On Target O/U",
            Market::ShotsMatchBet => "Most Shots",
            Market::ShotsOnTargetMatchBet => "Most Shots On Target",
            Market::PlayerShots => "Player Shots",
            Market::PlayerShotsOnTarget => "Player Shots On Target",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Market::TotalGoals | Market::HomeGoals | Market::AwayGoals => "Goals",
            Market::HalfTimeGoals => "1st Half Goals",
            Market::Corners => "Corners",
            Market::Cards => "Cards",
            Market::TotalShots | Market::HomeShots | Market::AwayShots | Market::PlayerShots => {
                "Shots"
            }
            Market::TotalShotsOnTarget
            | Market::HomeShotsOnTarget
            | Market::AwayShotsOnTarget
            | Market::PlayerShotsOnTarget => "Shots On Target",
            _ => "",
        }
    }

    fn side_prefix(self) -> &'static str {
        match self {
            Market::HomeGoals | Market::HomeShots | Market::HomeShotsOnTarget => "Home ",
            Market::AwayGoals | Market::AwayShots | Market::AwayShotsOnTarget => "Away ",
            _ => "",
        }
    }

    /// Markets settled by the final score, gated on a plausible total xG.
    pub fn is_goal_based(self) -> bool {
        matches!(
            self,
            Market::MatchResult
                | Market::DoubleChance
                | Market::TotalGoals
                | Market::HomeGoals
                | Market::AwayGoals
                | Market::BothTeamsToScore
                | Market::CleanSheetHome
                | Market::CleanSheetAway
                | Market::WinToNilHome
                | Market::WinToNilAway
                | Market::OddEven
                | Market::HalfTimeResult
                | Market::HalfTimeGoals
                | Market::ExactScore
        )
    }

    pub fn is_over_under(self) -> bool {
        matches!(
            self,
            Market::TotalGoals
                | Market::HomeGoals
                | Market::AwayGoals
                | Market::HalfTimeGoals
                | Market::Corners
                | Market::Cards
                | Market::TotalShots
                | Market::TotalShotsOnTarget
                | Market::HomeShots
                | Market::AwayShots
                | Market::HomeShotsOnTarget
                | Market::AwayShotsOnTarget
                | Market::PlayerShots
                | Market::PlayerShotsOnTarget
        )
    }

    fn is_three_way(self) -> bool {
        matches!(
            self,
            Market::MatchResult
                | Market::HalfTimeResult
                | Market::ShotsMatchBet
                | Market::ShotsOnTargetMatchBet
        )
    }

    fn is_yes_no(self) -> bool {
        matches!(
            self,
            Market::BothTeamsToScore
                | Market::CleanSheetHome
                | Market::CleanSheetAway
                | Market::WinToNilHome
                | Market::WinToNilAway
        )
    }

    /// Whether `selection` is a well-formed outcome of this market.
    pub fn accepts(self, selection: Selection) -> bool {
        match selection {
            Selection::Over(_) | Selection::Under(_) => self.is_over_under(),
            Selection::Yes | Selection::No => self.is_yes_no(),
            Selection::Home | Selection::Draw | Selection::Away => self.is_three_way(),
            Selection::HomeOrDraw | Selection::DrawOrAway | Selection::HomeOrAway => {
                self == Market::DoubleChance
            }
            Selection::Odd | Selection::Even => self == Market::OddEven,
            Selection::Score(..) => self == Market::ExactScore,
        }
    }

    /// The mutually exclusive, exhaustive outcome set containing `selection`,
    /// when the market has one. Double chance overlaps and exact score is open.
    pub fn partition(self, selection: Selection) -> Option<Vec<Selection>> {
        if !self.accepts(selection) {
            return None;
        }
        match selection {
            Selection::Over(line) | Selection::Under(line) => {
                Some(vec![Selection::Over(line), Selection::Under(line)])
            }
            Selection::Yes | Selection::No => Some(vec![Selection::Yes, Selection::No]),
            Selection::Home | Selection::Draw | Selection::Away => {
                Some(vec![Selection::Home, Selection::Draw, Selection::Away])
            }
            Selection::Odd | Selection::Even => Some(vec![Selection::Odd, Selection::Even]),
            _ => None,
        }
    }

    /// Upper plausibility bound on a quoted decimal price.
    pub fn odds_ceiling(self, bounds: &OddsBounds) -> f64 {
        match self {
            Market::MatchResult => bounds.match_result,
            Market::DoubleChance => bounds.double_chance,
            Market::TotalGoals => bounds.goals,
            Market::HomeGoals | Market::AwayGoals => bounds.team_goals,
            Market::BothTeamsToScore => bounds.btts,
            Market::CleanSheetHome | Market::CleanSheetAway => bounds.clean_sheet,
            Market::WinToNilHome | Market::WinToNilAway => bounds.win_to_nil,
            Market::OddEven => bounds.odd_even,
            Market::HalfTimeResult | Market::HalfTimeGoals => bounds.half_time,
            Market::ExactScore => bounds.exact_score,
            Market::Corners => bounds.corners,
            Market::Cards => bounds.cards,
            Market::TotalShots
            | Market::TotalShotsOnTarget
            | Market::HomeShots
            | Market::AwayShots
            | Market::HomeShotsOnTarget
            | Market::AwayShotsOnTarget
            | Market::ShotsMatchBet
            | Market::ShotsOnTargetMatchBet => bounds.shots,
            Market::PlayerShots | Market::PlayerShotsOnTarget => bounds.player_shots,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Market {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Selection {
    Over(Line),
    Under(Line),
    Yes,
    No,
    Home,
    Draw,
    Away,
    HomeOrDraw,
    DrawOrAway,
    HomeOrAway,
    Odd,
    Even,
    Score(u8, u8),
}

impl Selection {
    pub fn key(self) -> String {
        match self {
            Selection::Over(line) => format!("over_{line}"),
            Selection::Under(line) => format!("under_{line}"),
            Selection::Yes => "yes".to_string(),
            Selection::No => "no".to_string(),
            Selection::Home => "home".to_string(),
            Selection::Draw => "draw".to_string(),
            Selection::Away => "away".to_string(),
            Selection::HomeOrDraw => "home/draw".to_string(),
            Selection::DrawOrAway => "draw/away".to_string(),
            Selection::HomeOrAway => "home/away".to_string(),
            Selection::Odd => "odd".to_string(),
            Selection::Even => "even".to_string(),
            Selection::Score(h, a) => format!("{h}-{a}"),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let key = raw.trim().to_ascii_lowercase();
        if let Some(rest) = key.strip_prefix("over") {
            return Line::parse(rest.trim_start_matches(['_', '-', ' '])).map(Selection::Over);
        }
        if let Some(rest) = key.strip_prefix("under") {
            return Line::parse(rest.trim_start_matches(['_', '-', ' '])).map(Selection::Under);
        }
        if let Some(score) = parse_score(&key) {
            return Some(score);
        }
        match key.as_str() {
            "yes" => Some(Selection::Yes),
            "no" => Some(Selection::No),
            "home" | "1" => Some(Selection::Home),
            "draw" | "x" => Some(Selection::Draw),
            "away" | "2" => Some(Selection::Away),
            "home/draw" | "1x" | "home-or-draw" | "home_or_draw" => Some(Selection::HomeOrDraw),
            "draw/away" | "x2" | "draw-or-away" | "draw_or_away" => Some(Selection::DrawOrAway),
            "home/away" | "12" | "home-or-away" | "home_or_away" => Some(Selection::HomeOrAway),
            "odd" => Some(Selection::Odd),
            "even" => Some(Selection::Even),
            _ => None,
        }
    }
}

/// `h-a` or `h:a` with digits on both sides; anything else is not a score.
fn parse_score(key: &str) -> Option<Selection> {
    let (h, a) = key.split_once(['-', ':'])?;
    let (h, a) = (h.trim(), a.trim());
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !digits(h) || !digits(a) {
        return None;
    }
    Some(Selection::Score(h.parse().ok()?, a.parse().ok()?))
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

/// One outcome of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pick {
    pub market: Market,
    pub selection: Selection,
}

impl Pick {
    pub const fn new(market: Market, selection: Selection) -> Self {
        Self { market, selection }
    }

    pub fn from_keys(market: &str, selection: &str) -> Option<Self> {
        let market = Market::parse(market)?;
        let selection = Selection::parse(selection)?;
        market
            .accepts(selection)
            .then_some(Self { market, selection })
    }

    pub fn key(self) -> String {
        format!("{}__{}", self.market.key(), self.selection.key())
    }

    pub fn label(self) -> String {
        use Market as M;
        use Selection as S;
        match (self.market, self.selection) {
            (M::MatchResult, S::Home) => "Home Win".to_string(),
            (M::MatchResult, S::Draw) => "Draw".to_string(),
            (M::MatchResult, S::Away) => "Away Win".to_string(),
            (M::DoubleChance, S::HomeOrDraw) => "Home or Draw (1X)".to_string(),
            (M::DoubleChance, S::DrawOrAway) => "Draw or Away (X2)".to_string(),
            (M::DoubleChance, S::HomeOrAway) => "Home or Away (12)".to_string(),
            (M::HalfTimeResult, S::Home) => "Home Leads At Half Time".to_string(),
            (M::HalfTimeResult, S::Draw) => "Level At Half Time".to_string(),
            (M::HalfTimeResult, S::Away) => "Away Leads At Half Time".to_string(),
            (M::ShotsMatchBet, S::Home) => "Home More Shots".to_string(),
            (M::ShotsMatchBet, S::Draw) => "Shots Level".to_string(),
            (M::ShotsMatchBet, S::Away) => "Away More Shots".to_string(),
            (M::ShotsOnTargetMatchBet, S::Home) => "Home More Shots On Target".to_string(),
            (M::ShotsOnTargetMatchBet, S::Draw) => "Shots On Target Level".to_string(),
            (M::ShotsOnTargetMatchBet, S::Away) => "Away More Shots On Target".to_string(),
            (M::OddEven, S::Odd) => "Odd Total Goals".to_string(),
            (M::OddEven, S::Even) => "Even Total Goals".to_string(),
            (M::ExactScore, S::Score(h, a)) => format!("Exact Score {h}-{a}"),
            (m, S::Over(line)) => format!("{}Over {line} {}", m.side_prefix(), m.unit()),
            (m, S::Under(line)) => format!("{}Under {line} {}", m.side_prefix(), m.unit()),
            (m, S::Yes) => format!("{}: Yes", m.label()),
            (m, S::No) => format!("{}: No", m.label()),
            (m, s) => format!("{} {}", m.label(), s.key()),
        }
    }
}

impl Serialize for Pick {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.key())
    }
}

impl fmt::Display for Pick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::{Line, Market, Pick, Selection};

    #[test]
    fn line_accepts_only_half_values() {
        assert_eq!(Line::parse("2.5"), Some(Line::from_floor(2)));
        assert_eq!(Line::parse(" 10.5 "), Some(Line::from_floor(10)));
        assert_eq!(Line::parse("2.0"), None);
        assert_eq!(Line::parse("-1.5"), None);
        assert_eq!(Line::from_floor(9).to_string(), "9.5");
    }

    #[test]
    fn feed_keys_parse_into_typed_picks() {
        let p = Pick::from_keys("goals_ou", "over_2.5").expect("pick");
        assert_eq!(p.market, Market::TotalGoals);
        assert_eq!(p.selection, Selection::Over(Line::from_floor(2)));
        assert_eq!(p.key(), "goals_ou__over_2.5");

        let dc = Pick::from_keys("double_chance", "1X").expect("pick");
        assert_eq!(dc.selection, Selection::HomeOrDraw);

        let score = Pick::from_keys("exact_score", "2-1").expect("pick");
        assert_eq!(score.selection, Selection::Score(2, 1));
    }

    #[test]
    fn hyphenated_keys_reach_named_selections() {
        assert_eq!(Selection::parse("home-or-draw"), Some(Selection::HomeOrDraw));
        assert_eq!(Selection::parse("Draw_or_Away"), Some(Selection::DrawOrAway));
        assert_eq!(Selection::parse("over-2.5"), Selection::parse("over_2.5"));
        assert_eq!(Selection::parse("3:0"), Some(Selection::Score(3, 0)));
        assert_eq!(Selection::parse(" 1 - 1 "), Some(Selection::Score(1, 1)));
        assert_eq!(Selection::parse("1-x"), None);
        assert_eq!(Selection::parse("-1"), None);

        let dc = Pick::from_keys("double_chance", "home-or-away").expect("pick");
        assert_eq!(dc.selection, Selection::HomeOrAway);
    }

    #[test]
    fn mismatched_selection_is_rejected() {
        assert!(Pick::from_keys("btts", "over_2.5").is_none());
        assert!(Pick::from_keys("corners_ou", "home").is_none());
        assert!(Pick::from_keys("no_such_market", "yes").is_none());
    }

    #[test]
    fn partitions_cover_complementary_outcomes() {
        let over = Selection::Over(Line::from_floor(9));
        assert_eq!(
            Market::Corners.partition(over),
            Some(vec![over, Selection::Under(Line::from_floor(9))])
        );
        assert_eq!(
            Market::MatchResult.partition(Selection::Draw).map(|v| v.len()),
            Some(3)
        );
        assert!(Market::DoubleChance.partition(Selection::HomeOrDraw).is_none());
        assert!(Market::ExactScore.partition(Selection::Score(1, 0)).is_none());
    }

    #[test]
    fn labels_read_naturally() {
        let l = Line::from_floor(2);
        assert_eq!(
            Pick::new(Market::TotalGoals, Selection::Over(l)).label(),
            "Over 2.5 Goals"
        );
        assert_eq!(
            Pick::new(Market::HomeShots, Selection::Under(Line::from_floor(10))).label(),
            "Home Under 10.5 Shots"
        );
        assert_eq!(
            Pick::new(Market::BothTeamsToScore, Selection::Yes).label(),
            "Both Teams To Score: Yes"
        );
    }
}
