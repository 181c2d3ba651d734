//! HTTP handlers for the Farm Produce Distribution Platform

mod allocation;
mod health;
mod orders;
mod pallets;
mod products;
mod reservations;

pub use allocation::*;
pub use health::*;
pub use orders::*;
pub use pallets::*;
pub use products::*;
pub use reservations::*;
