//! Shared types and models for the Farm Produce Distribution Platform
//!
//! This crate contains domain types shared between the backend and other
//! components of the system. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
