pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod socket;
pub mod state;
