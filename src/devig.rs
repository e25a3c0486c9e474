use serde::{Deserialize, Serialize};

const POWER_K_LO: f64 = 0.5;
const POWER_K_HI: f64 = 2.0;
const SHIN_Z_LO: f64 = 0.001;
const SHIN_Z_HI: f64 = 0.5;
const BISECT_ITERS: usize = 200;
const BISECT_TOL: f64 = 1e-13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevigMethod {
    #[default]
    Power,
    Shin,
    Multiplicative,
}

impl DevigMethod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "power" => Some(Self::Power),
            "shin" => Some(Self::Shin),
            "multiplicative" | "normalize" | "basic" => Some(Self::Multiplicative),
            _ => None,
        }
    }
}

/// Fair probabilities for one outcome set, plus how they were obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Devigged {
    pub probs: Vec<f64>,
    /// The method actually applied, which is `Multiplicative` after a fallback.
    pub method: DevigMethod,
    pub fallback: bool,
    pub booksum: f64,
}

/// Sum of raw implied probabilities; above 1.0 means the book carries a margin.
pub fn booksum(odds: &[f64]) -> f64 {
    odds.iter()
        .filter(|o| o.is_finite() && **o > 0.0)
        .map(|o| 1.0 / o)
        .sum()
}

pub fn devig(odds: &[f64], method: DevigMethod) -> Devigged {
    let total = booksum(odds);
    let valid = !odds.is_empty() && odds.iter().all(|o| o.is_finite() && *o > 1.0);
    if !valid {
        return fallback(odds, total, method != DevigMethod::Multiplicative);
    }

    let solved = match method {
        DevigMethod::Power => power(odds, total),
        DevigMethod::Shin => shin(odds, total),
        DevigMethod::Multiplicative => return fallback(odds, total, false),
    };
    match solved {
        Some(probs) => Devigged {
            probs,
            method,
            fallback: false,
            booksum: total,
        },
        None => fallback(odds, total, true),
    }
}

fn fallback(odds: &[f64], total: f64, fallback: bool) -> Devigged {
    Devigged {
        probs: normalize(odds),
        method: DevigMethod::Multiplicative,
        fallback,
        booksum: total,
    }
}

fn normalize(odds: &[f64]) -> Vec<f64> {
    let implied: Vec<f64> = odds
        .iter()
        .map(|o| if o.is_finite() && *o > 0.0 { 1.0 / o } else { 0.0 })
        .collect();
    let sum: f64 = implied.iter().sum();
    if sum <= 0.0 {
        let n = odds.len().max(1) as f64;
        return vec![1.0 / n; odds.len()];
    }
    implied.into_iter().map(|p| p / sum).collect()
}

// Solves sum((1/o)^k) = 1 for k.
fn power(odds: &[f64], total: f64) -> Option<Vec<f64>> {
    let implied: Vec<f64> = odds.iter().map(|o| 1.0 / o).collect();
    if (total - 1.0).abs() < 1e-12 {
        return Some(implied);
    }
    let f = |k: f64| implied.iter().map(|p| p.powf(k)).sum::<f64>() - 1.0;
    let k = bisect(f, POWER_K_LO, POWER_K_HI)?;
    let probs: Vec<f64> = implied.iter().map(|p| p.powf(k)).collect();
    Some(renormalize(probs))
}

fn shin(odds: &[f64], total: f64) -> Option<Vec<f64>> {
    if total <= 1.0 {
        return Some(normalize(odds));
    }
    let implied: Vec<f64> = odds.iter().map(|o| 1.0 / o).collect();
    let probs_at = |z: f64| -> Vec<f64> {
        implied
            .iter()
            .map(|pi| {
                let disc = z * z + 4.0 * (1.0 - z) * pi * pi / total;
                (disc.sqrt() - z) / (2.0 * (1.0 - z))
            })
            .collect()
    };
    let z = bisect(|z| probs_at(z).iter().sum::<f64>() - 1.0, SHIN_Z_LO, SHIN_Z_HI)?;
    Some(renormalize(probs_at(z)))
}

fn renormalize(probs: Vec<f64>) -> Vec<f64> {
    let sum: f64 = probs.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return probs;
    }
    probs.into_iter().map(|p| p / sum).collect()
}

/// Root of `f` on `[lo, hi]`; `None` when the bracket holds no sign change.
fn bisect(f: impl Fn(f64) -> f64, mut lo: f64, mut hi: f64) -> Option<f64> {
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if !(f_lo.is_finite() && f_hi.is_finite()) {
        return None;
    }
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..BISECT_ITERS {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 || (hi - lo) < BISECT_TOL {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    Some(0.5 * (lo + hi))
}
