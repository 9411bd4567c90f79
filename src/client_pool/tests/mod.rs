//! Unit tests for pooled backend connections.

mod fixtures;
mod pool_tests;
