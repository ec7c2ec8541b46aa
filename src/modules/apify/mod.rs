//! Apify actor client used by the listing sync job

mod client;

pub use client::{ApifyClient, ApifyError};
