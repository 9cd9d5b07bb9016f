//! Shared test utilities for zipfast integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a store, storage, pool and router in temp directories
//! - `FakeCompressor` producing deterministic results without external tools
//! - `MultipartBuilder` for upload request bodies

pub mod fakes;
pub mod harness;
pub mod multipart;

pub use fakes::FakeCompressor;
pub use harness::TestHarness;
pub use multipart::MultipartBuilder;
