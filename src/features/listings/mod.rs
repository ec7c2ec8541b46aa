//! Realtor listing sync into broker website databases

pub mod models;
pub mod services;
pub mod workers;

pub use services::ListingSyncService;
pub use workers::ListingSyncWorker;
