//! # Nestwatch Domain
//!
//! Business domain types and models for Nestwatch.
//!
//! This crate contains:
//! - Domain data types (operating modes, battery state, controller status)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Battery chemistry and controller tuning constants
//!
//! ## Architecture
//! - No dependencies on other Nestwatch crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
