//! # Math Module
//!
//! Checked integer arithmetic for ledger accounting.

pub mod safe_math;

pub use safe_math::*;
