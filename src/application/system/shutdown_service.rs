//! Graceful shutdown. Unlike the teacher's position-liquidation sequence,
//! an MT5 trade lives on the broker/terminal, not in this process — there
//! is nothing here to flatten on exit. Shutdown is limited to what this
//! process actually owns: stop accepting new supervised-worker iterations
//! and make sure buffered ticks reach the database before the process
//! exits.

use crate::application::market_data::TickWriter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct ShutdownService {
    shutdown: Arc<AtomicBool>,
    tick_writer: Arc<TickWriter>,
}

impl ShutdownService {
    pub fn new(shutdown: Arc<AtomicBool>, tick_writer: Arc<TickWriter>) -> Self {
        Self { shutdown, tick_writer }
    }

    pub async fn shutdown(&self) {
        info!("graceful shutdown: signalling supervised workers to stop");
        self.shutdown.store(true, Ordering::Relaxed);

        info!("graceful shutdown: flushing buffered ticks");
        if let Err(e) = self.tick_writer.flush().await {
            warn!("final tick flush on shutdown failed: {}", e);
        }

        info!("graceful shutdown complete");
    }
}
