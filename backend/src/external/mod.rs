//! Clients for external collaborators (payment, messaging)

pub mod messaging;
pub mod payment;

pub use messaging::MessagingClient;
pub use payment::{PaymentClient, PaymentStatus};
