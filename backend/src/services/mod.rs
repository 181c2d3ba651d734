//! Business logic services for the Farm Produce Distribution Platform

pub mod allocation;
pub mod order;
pub mod pallet;
pub mod product;
pub mod reservation;

pub use allocation::AllocationService;
pub use order::OrderService;
pub use pallet::PalletService;
pub use product::ProductService;
pub use reservation::ReservationService;
