pub mod ohlc_ingestion;
pub mod retention;
pub mod tick_writer;

pub use tick_writer::TickWriter;
