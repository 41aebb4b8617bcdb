//! # Bridge Test Suite
//!
//! Unified test crate for cross-endpoint scenarios: two complete bus +
//! gateway endpoints wired together over an in-memory channel pair.
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p bridge-tests
//!
//! # End-to-end scenarios only
//! cargo test -p bridge-tests integration::
//! ```

pub mod integration;
