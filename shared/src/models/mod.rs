//! Domain models for the Farm Produce Distribution Platform

mod allocation;
mod commission;
mod order;
mod pallet;
mod reservation;

pub use allocation::*;
pub use commission::*;
pub use order::*;
pub use pallet::*;
pub use reservation::*;
