pub mod command_queue;

pub use command_queue::{CommandQueue, RedisCommandQueue};
