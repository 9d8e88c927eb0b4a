//! Download engine implementations bundled with the session crate.

mod memory;

pub use memory::{EngineCall, MemoryEngine};
