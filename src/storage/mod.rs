pub mod matcher;
pub mod memory;

pub use memory::{MemorySession, MemoryStore};
