// Services module - Business logic

pub mod checkout;
pub mod fees;
pub mod notifications;
pub mod orders;
pub mod payouts;
pub mod publishing;
pub mod rut;
pub mod tiers;
