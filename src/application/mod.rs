// Market data processing
pub mod market_data;

// Indicator & pattern engine, signal generation, decision pipeline
pub mod adaptive_symbol_config;
pub mod decision;
pub mod indicators;
pub mod reconciliation;
pub mod registry;
pub mod signals;
pub mod supervisor;
pub mod trailing_stops;

// Risk management and position control
pub mod risk_management;

// System orchestrator
pub mod system;
