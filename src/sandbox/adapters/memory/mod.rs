//! In-memory container engine for deterministic sandbox tests.

mod engine;

pub use engine::{EngineEvent, InMemoryContainerEngine};
