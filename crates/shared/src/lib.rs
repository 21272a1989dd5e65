//! Shared types and utilities for the swwap client.

pub mod models;
pub mod error;
pub mod validation;

pub use models::*;
pub use error::*;
pub use validation::*;
