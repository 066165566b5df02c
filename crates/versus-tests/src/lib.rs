//! Integration test suite for Versus.
//!
//! Exercises the engine end to end over a `MemoryStore`: write paths with
//! their reputation side effects, discovery and search over the resulting
//! aggregates, and the at-most-once and atomic-increment guarantees under
//! concurrent writers.

pub mod helpers;
