//! Narrow read contracts for the three systems explicitly out of scope
//! (§1: auto-optimization, ML prediction, news-calendar fetching). The
//! decision pipeline and signal generator consult these ports; the tuning
//! logic behind them is not implemented here, only a static/in-memory
//! default matching the teacher's narrow-adapter-trait style.

pub mod ml_score;
pub mod news_window;
pub mod parameters;

pub use ml_score::{InMemoryMlScoreSource, MlScoreSource};
pub use news_window::{InMemoryNewsWindowSource, NewsWindow, NewsWindowSource};
pub use parameters::{InMemoryParameterSource, ParameterOverride, ParameterSource};
