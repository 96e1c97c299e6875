// Services module - Business logic

pub mod access_codes;
pub mod email;
pub mod offline_queue;
pub mod qr_generator;
pub mod scan_classifier;
pub mod signature;
pub mod sync;
