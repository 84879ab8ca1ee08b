// API module - HTTP endpoints

pub mod admin;
pub mod disputes;
pub mod events;
pub mod health;
pub mod middleware;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod profile;
pub mod tickets;
