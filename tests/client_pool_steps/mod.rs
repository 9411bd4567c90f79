//! Step definitions for client pool scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
