// API module - HTTP endpoints

pub mod attendees;
pub mod auth;
pub mod events;
pub mod health;
pub mod middleware;
pub mod registrations;
pub mod scans;
pub mod sync;
