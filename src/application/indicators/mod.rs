pub mod engine;
pub mod patterns;
pub mod regime_cache;

pub use engine::{compute_votes, IndicatorOutput, IndicatorReadings, IndicatorVote};
pub use regime_cache::{CachedIndicators, RegimeCache};
