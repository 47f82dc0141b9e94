//! Shared test utilities for docarchive integration tests.
//!
//! This module provides:
//! - `TestHarness`: an isolated media root and repository in a temp directory
//! - Builders for configs, documents and fake parsers

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
