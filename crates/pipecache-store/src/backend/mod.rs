//! Store backends.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
