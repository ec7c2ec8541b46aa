//! Practice operations core: dental reporting, X-ray ingestion and the
//! realtor listing sync, shared by the HTTP server and the sync binary.

pub mod core;
pub mod features;
pub mod modules;
pub mod shared;
