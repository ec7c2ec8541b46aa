//! Modules layer - Infrastructure components for external integrations
//!
//! Contains clients and adapters for storage, DICOM decoding, image
//! compression, VNA routing, workflow notification and the scraping actor.

pub mod apify;
pub mod dicom;
pub mod imaging;
pub mod storage;
pub mod vna;
pub mod workflow;
