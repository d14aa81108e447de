//! Test utilities and fixtures for Stagehand
//!
//! This crate provides shared test helpers that can be used by both
//! unit tests (#[cfg(test)]) and integration tests (tests/ directory).

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
