//! Football value detection: team strength to expected goals, a Dixon-Coles
//! score grid with Monte Carlo resampling, negative binomial count markets,
//! contextual adjustment, and a scanner that compares the result against
//! de-vigged bookmaker prices.

pub mod batch;
pub mod confidence;
pub mod config;
pub mod context;
pub mod counts;
pub mod devig;
pub mod error;
pub mod markets;
pub mod model;
pub mod monte_carlo;
pub mod outputs;
pub mod scoregrid;
pub mod snapshot;
pub mod strength;
pub mod value;
pub mod xg;

pub use batch::{BatchReport, run_batch};
pub use config::EngineConfig;
pub use error::{MatchError, RejectionReason};
pub use model::{ScoredMatch, score_match};
pub use snapshot::MatchSnapshot;
pub use value::ValueOpportunity;
