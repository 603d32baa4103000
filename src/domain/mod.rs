//! Core domain model: entities, invariants and port traits (§3, §4 of
//! `SPEC_FULL.md`). Nothing in this module talks to a database, a socket or
//! the clock directly — it is pure data and behavior.

pub mod errors;
pub mod market_regime;
pub mod ports;
pub mod timeframe;
pub mod types;
