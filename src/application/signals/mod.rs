pub mod generator;
pub mod smart_tp_sl;

pub use generator::{generate_signal, GeneratedSignal};
pub use smart_tp_sl::{compute_tp_sl, SmartTpSlInput};
