//! Cross-endpoint integration scenarios.

pub mod end_to_end;
