use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Confidence {
    #[serde(rename = "BAIXO")]
    Low,
    #[serde(rename = "MÉDIO")]
    Medium,
    #[serde(rename = "ALTO")]
    High,
}

impl Confidence {
    pub fn label(self) -> &'static str {
        match self {
            Confidence::High => "ALTO",
            Confidence::Medium => "MÉDIO",
            Confidence::Low => "BAIXO",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conditions {
    pub weather_stable: bool,
    pub fatigue_free: bool,
}

impl Conditions {
    pub fn stable() -> Self {
        Self {
            weather_stable: true,
            fatigue_free: true,
        }
    }

    fn calm(self) -> bool {
        self.weather_stable && self.fatigue_free
    }
}

/// Candidates below the minimum edge never get here; anything that does is at least `Low`.
pub fn classify(edge: f64, prob: f64, conditions: Conditions) -> Confidence {
    if (edge > 0.10 && prob > 0.40 && conditions.calm()) || (edge > 0.08 && prob > 0.35) {
        Confidence::High
    } else if edge > 0.05 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}
