use serde::Serialize;
use thiserror::Error;

/// Why a snapshot never reached the model. These are data problems, not bugs.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("neither real odds nor real standings are available")]
    NoRealData,
    #[error("data quality {score:.2} is below the {floor:.2} floor")]
    LowQuality { score: f64, floor: f64 },
    #[error("team {team} has a non-positive attack or defense strength")]
    NonPositiveStrength { team: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    #[error("rejected: {0}")]
    Rejected(#[from] RejectionReason),
    #[error("computation failed: {0}")]
    Computation(String),
}

impl MatchError {
    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::{MatchError, RejectionReason};

    #[test]
    fn rejection_messages_carry_the_numbers() {
        let r = RejectionReason::LowQuality {
            score: 0.3,
            floor: 0.4,
        };
        assert_eq!(r.to_string(), "data quality 0.30 is below the 0.40 floor");
        let e: MatchError = r.into();
        assert!(matches!(e, MatchError::Rejected(_)));
    }

    #[test]
    fn rejection_serializes_with_kind_tag() {
        let json = serde_json::to_value(RejectionReason::NoRealData).unwrap();
        assert_eq!(json["kind"], "no_real_data");
    }
}
