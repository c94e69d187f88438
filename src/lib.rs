pub mod api_router;
pub mod auth;
pub mod config;
pub mod notifications;
pub mod rentals;
pub mod shared;
pub mod tickets;
