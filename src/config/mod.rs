//! # cityblock Configuration Module
//!
//! Centralizes the configuration constants for the index. Runtime settings
//! (workspace directory, chunk capacity, merge strategy) are chosen through
//! [`crate::session::SessionBuilder`]; the values here are its defaults and
//! the fixed parts of the on-disk format.
//!
//! ## Module Organization
//!
//! - [`constants`]: All numeric and naming constants with dependency documentation

pub mod constants;
pub use constants::*;
