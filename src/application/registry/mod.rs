pub mod connection_registry;

pub use connection_registry::{ConnectionRegistry, HealthSnapshot};
