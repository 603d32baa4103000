pub mod pipeline;

pub use pipeline::{DecisionOutcome, DecisionPipeline};
