use serde::Serialize;

use crate::config::ModelConfig;
use crate::markets::{Line, Selection};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn sum(&self) -> f64 {
        self.home + self.draw + self.away
    }

    pub fn normalized(self) -> Self {
        let sum = self.sum();
        if !sum.is_finite() || sum <= 0.0 {
            return Self::uniform();
        }
        Self {
            home: self.home / sum,
            draw: self.draw / sum,
            away: self.away / sum,
        }
    }

    pub fn get(&self, selection: Selection) -> Option<f64> {
        match selection {
            Selection::Home => Some(self.home),
            Selection::Draw => Some(self.draw),
            Selection::Away => Some(self.away),
            Selection::HomeOrDraw => Some(self.home + self.draw),
            Selection::DrawOrAway => Some(self.draw + self.away),
            Selection::HomeOrAway => Some(self.home + self.away),
            _ => None,
        }
    }

    pub fn max_abs_diff(&self, other: &Prob3) -> f64 {
        (self.home - other.home)
            .abs()
            .max((self.draw - other.draw).abs())
            .max((self.away - other.away).abs())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreProb {
    pub home: u8,
    pub away: u8,
    pub prob: f64,
}

/// Joint distribution of final (home, away) goals, row-major by home goals.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGrid {
    max_goals: u32,
    cells: Vec<f64>,
}

/// Dixon-Coles low-score adjustment.
pub fn tau(home: u32, away: u32, lambda: f64, mu: f64, rho: f64) -> f64 {
    match (home, away) {
        (0, 0) => 1.0 - lambda * mu * rho,
        (0, 1) => 1.0 + lambda * rho,
        (1, 0) => 1.0 + mu * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

/// Poisson point masses for 0..=max_k, without folding the tail.
pub fn poisson_pmf(lambda: f64, max_k: u32) -> Vec<f64> {
    let lambda = lambda.max(0.0);
    let mut out = Vec::with_capacity(max_k as usize + 1);
    let mut p = (-lambda).exp();
    out.push(p);
    for k in 1..=max_k {
        p *= lambda / f64::from(k);
        out.push(p);
    }
    out
}

/// Largest |rho| that keeps every tau cell non-negative.
pub fn rho_bound(lambda: f64, mu: f64) -> f64 {
    let joint = 1.0 / (lambda * mu).max(1e-9);
    let single = 1.0 / lambda.max(mu).max(1e-9);
    joint.min(single).min(1.0)
}

pub fn clamp_rho(rho: f64, lambda: f64, mu: f64) -> f64 {
    let bound = rho_bound(lambda, mu);
    rho.clamp(-bound, bound)
}

/// Low-scoring fixtures get the stronger negative correlation.
pub fn heuristic_rho(lambda: f64, mu: f64, cfg: &ModelConfig) -> f64 {
    let total = lambda + mu;
    let rho = cfg
        .rho_tiers
        .iter()
        .find(|tier| total < tier.below_total_xg)
        .map(|tier| tier.rho)
        .unwrap_or(cfg.rho_default);
    clamp_rho(rho, lambda, mu)
}

impl ScoreGrid {
    pub fn build(lambda: f64, mu: f64, rho: f64, max_goals: u32) -> Self {
        let pmf_h = poisson_pmf(lambda, max_goals);
        let pmf_a = poisson_pmf(mu, max_goals);
        let mut cells = Vec::with_capacity(pmf_h.len() * pmf_a.len());
        for (h, p_h) in pmf_h.iter().enumerate() {
            for (a, p_a) in pmf_a.iter().enumerate() {
                let t = tau(h as u32, a as u32, lambda, mu, rho);
                cells.push((t * p_h * p_a).max(0.0));
            }
        }
        let mut grid = Self { max_goals, cells };
        grid.normalize();
        grid
    }

    pub fn independent(lambda: f64, mu: f64, max_goals: u32) -> Self {
        Self::build(lambda, mu, 0.0, max_goals)
    }

    /// Grid from arbitrary non-negative weights; `None` when they carry no mass.
    pub fn from_weights(max_goals: u32, weights: Vec<f64>) -> Option<Self> {
        let n = max_goals as usize + 1;
        if weights.len() != n * n || weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return None;
        }
        let mut grid = Self {
            max_goals,
            cells: weights,
        };
        grid.normalize();
        Some(grid)
    }

    fn normalize(&mut self) {
        let total: f64 = self.cells.iter().sum();
        if total > 0.0 && total.is_finite() {
            for c in &mut self.cells {
                *c /= total;
            }
        }
    }

    /// `weight` of self, the rest of `other`. Grids must share a size.
    pub fn blend(&self, other: &ScoreGrid, weight: f64) -> Option<ScoreGrid> {
        if self.max_goals != other.max_goals {
            return None;
        }
        let w = weight.clamp(0.0, 1.0);
        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| w * a + (1.0 - w) * b)
            .collect();
        Self::from_weights(self.max_goals, cells)
    }

    pub fn max_goals(&self) -> u32 {
        self.max_goals
    }

    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    pub fn is_finite(&self) -> bool {
        self.cells.iter().all(|c| c.is_finite())
    }

    pub fn get(&self, home: u32, away: u32) -> f64 {
        if home > self.max_goals || away > self.max_goals {
            return 0.0;
        }
        let n = self.max_goals as usize + 1;
        self.cells[home as usize * n + away as usize]
    }

    /// Decodes a flat index back into (home, away).
    pub fn score_at(&self, index: usize) -> (u32, u32) {
        let n = self.max_goals as usize + 1;
        ((index / n) as u32, (index % n) as u32)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, f64)> + '_ {
        self.cells.iter().enumerate().map(|(i, p)| {
            let (h, a) = self.score_at(i);
            (h, a, *p)
        })
    }

    pub fn prob_where(&self, pred: impl Fn(u32, u32) -> bool) -> f64 {
        self.iter()
            .filter(|(h, a, _)| pred(*h, *a))
            .map(|(_, _, p)| p)
            .sum()
    }

    pub fn match_result(&self) -> Prob3 {
        let mut out = Prob3 {
            home: 0.0,
            draw: 0.0,
            away: 0.0,
        };
        for (h, a, p) in self.iter() {
            if h > a {
                out.home += p;
            } else if h == a {
                out.draw += p;
            } else {
                out.away += p;
            }
        }
        out.normalized()
    }

    pub fn over(&self, line: Line) -> f64 {
        let floor = line.floor();
        self.prob_where(|h, a| h + a > floor)
    }

    pub fn under(&self, line: Line) -> f64 {
        let floor = line.floor();
        self.prob_where(|h, a| h + a <= floor)
    }

    pub fn team_over(&self, side: Side, line: Line) -> f64 {
        let floor = line.floor();
        match side {
            Side::Home => self.prob_where(|h, _| h > floor),
            Side::Away => self.prob_where(|_, a| a > floor),
        }
    }

    pub fn team_under(&self, side: Side, line: Line) -> f64 {
        let floor = line.floor();
        match side {
            Side::Home => self.prob_where(|h, _| h <= floor),
            Side::Away => self.prob_where(|_, a| a <= floor),
        }
    }

    pub fn btts(&self) -> f64 {
        self.prob_where(|h, a| h > 0 && a > 0)
    }

    /// `side` concedes nothing.
    pub fn clean_sheet(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.prob_where(|_, a| a == 0),
            Side::Away => self.prob_where(|h, _| h == 0),
        }
    }

    pub fn win_to_nil(&self, side: Side) -> f64 {
        match side {
            Side::Home => self.prob_where(|h, a| h > 0 && a == 0),
            Side::Away => self.prob_where(|h, a| a > 0 && h == 0),
        }
    }

    pub fn odd_total(&self) -> f64 {
        self.prob_where(|h, a| (h + a) % 2 == 1)
    }

    pub fn even_total(&self) -> f64 {
        self.prob_where(|h, a| (h + a) % 2 == 0)
    }

    pub fn mean_total(&self) -> f64 {
        self.iter().map(|(h, a, p)| f64::from(h + a) * p).sum()
    }

    /// Most likely scorelines, optionally limited to `cap` goals per side.
    pub fn top_scores(&self, n: usize, cap: Option<u32>) -> Vec<ScoreProb> {
        let mut rows: Vec<ScoreProb> = self
            .iter()
            .filter(|(h, a, _)| cap.is_none_or(|c| *h <= c && *a <= c))
            .map(|(h, a, prob)| ScoreProb {
                home: h.min(u32::from(u8::MAX)) as u8,
                away: a.min(u32::from(u8::MAX)) as u8,
                prob,
            })
            .collect();
        rows.sort_by(|x, y| y.prob.total_cmp(&x.prob));
        rows.truncate(n);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(floor: u8) -> Line {
        Line::from_floor(floor)
    }

    #[test]
    fn reference_grid_matches_hand_summation() {
        let grid = ScoreGrid::build(1.2, 1.0, -0.08, 8);
        assert!((grid.total() - 1.0).abs() < 1e-6);
        let p = grid.match_result();
        assert!((p.home - 0.394_910).abs() < 1e-4);
        assert!((p.draw - 0.310_669).abs() < 1e-4);
        assert!((p.sum() - 1.0).abs() < 1e-12);
        assert!((grid.over(line(2)) - 0.377_283).abs() < 1e-4);
        assert!((grid.btts() - 0.452_365).abs() < 1e-4);
    }

    #[test]
    fn admissible_parameters_give_valid_grids() {
        for &lambda in &[0.3, 0.8, 1.4, 2.2, 3.5] {
            for &mu in &[0.2, 0.7, 1.3, 3.0] {
                for &rho in &[-0.5, -0.12, -0.02, 0.0, 0.1, 0.9] {
                    let rho = clamp_rho(rho, lambda, mu);
                    let grid = ScoreGrid::build(lambda, mu, rho, 8);
                    assert!(grid.cells().iter().all(|c| *c >= 0.0));
                    assert!((grid.total() - 1.0).abs() < 1e-9);
                    assert!((grid.match_result().sum() - 1.0).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn tau_only_touches_low_scores() {
        assert!((tau(0, 0, 1.2, 1.0, -0.08) - 1.096).abs() < 1e-12);
        assert!((tau(0, 1, 1.2, 1.0, -0.08) - 0.904).abs() < 1e-12);
        assert!((tau(1, 0, 1.2, 1.0, -0.08) - 0.92).abs() < 1e-12);
        assert!((tau(1, 1, 1.2, 1.0, -0.08) - 1.08).abs() < 1e-12);
        assert_eq!(tau(2, 1, 1.2, 1.0, -0.08), 1.0);
    }

    #[test]
    fn negative_rho_lifts_draws() {
        let indep = ScoreGrid::independent(1.2, 1.0, 8).match_result();
        let dc = ScoreGrid::build(1.2, 1.0, -0.12, 8).match_result();
        assert!(dc.draw > indep.draw);
    }

    #[test]
    fn heuristic_rho_follows_total_xg() {
        let cfg = ModelConfig::default();
        assert_eq!(heuristic_rho(0.7, 0.6, &cfg), -0.12);
        assert_eq!(heuristic_rho(1.2, 1.0, &cfg), -0.08);
        assert_eq!(heuristic_rho(1.8, 1.2, &cfg), -0.04);
        assert_eq!(heuristic_rho(2.5, 1.5, &cfg), -0.02);
    }

    #[test]
    fn rho_is_clamped_for_high_rates() {
        let rho = clamp_rho(-0.9, 3.5, 3.0);
        assert!((rho + 1.0 / 10.5).abs() < 1e-12);
        for (h, a) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert!(tau(h, a, 3.5, 3.0, rho) >= 0.0);
        }
    }

    #[test]
    fn derived_markets_are_complementary() {
        let grid = ScoreGrid::build(1.6, 0.9, -0.04, 8);
        assert!((grid.over(line(2)) + grid.under(line(2)) - 1.0).abs() < 1e-12);
        assert!((grid.odd_total() + grid.even_total() - 1.0).abs() < 1e-12);
        let no_btts = grid.prob_where(|h, a| h == 0 || a == 0);
        assert!((grid.btts() + no_btts - 1.0).abs() < 1e-12);
        assert!(grid.win_to_nil(Side::Home) < grid.clean_sheet(Side::Home));
        assert!(
            (grid.clean_sheet(Side::Home) - grid.win_to_nil(Side::Home) - grid.get(0, 0)).abs()
                < 1e-12
        );
        assert!(grid.team_over(Side::Home, line(0)) > grid.team_over(Side::Away, line(0)));
        assert!(grid.over(line(1)) > grid.over(line(2)));
    }

    #[test]
    fn top_scores_are_sorted_and_capped() {
        let grid = ScoreGrid::build(1.2, 1.0, -0.08, 8);
        let top = grid.top_scores(5, Some(5));
        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].prob >= w[1].prob));
        assert_eq!((top[0].home, top[0].away), (1, 0));
        assert!(grid.top_scores(100, Some(2)).len() == 9);
    }

    #[test]
    fn blend_keeps_a_distribution() {
        let a = ScoreGrid::build(1.2, 1.0, -0.08, 6);
        let b = ScoreGrid::independent(2.0, 0.5, 6);
        let mixed = a.blend(&b, 0.6).expect("same size");
        assert!((mixed.total() - 1.0).abs() < 1e-12);
        let expected = 0.6 * a.get(1, 1) + 0.4 * b.get(1, 1);
        assert!((mixed.get(1, 1) - expected).abs() < 1e-12);
        assert!(a.blend(&ScoreGrid::independent(1.0, 1.0, 8), 0.5).is_none());
        assert!(ScoreGrid::from_weights(1, vec![0.0; 4]).is_none());
    }
}
