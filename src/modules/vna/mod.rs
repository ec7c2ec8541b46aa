//! Vendor Neutral Archive routing for DICOM originals
//!
//! Each tenant registers archives (Orthanc, S3, ...) and routing rules. An
//! uploaded DICOM goes to the first active archive whose rule matches, or to
//! the tenant's default archive.

mod cloud;
mod models;
mod orthanc;
mod routing;
mod service;

use async_trait::async_trait;
use thiserror::Error;

use crate::modules::dicom::DicomMetadata;

pub use cloud::CloudStorageProvider;
pub use models::{
    RoutingConditions, RoutingContext, VnaConfiguration, VnaCredentials, VnaRoutingRule,
    VnaType, VnaUploadResult,
};
pub use orthanc::OrthancProvider;
pub use routing::{find_matching_vna, select_vna};
pub use service::VnaService;

#[derive(Debug, Error)]
pub enum VnaError {
    #[error("No matching VNA and no default VNA configured")]
    NoVnaConfigured,

    #[error("VNA upload failed: {0}")]
    Upload(String),

    #[error("VNA type not supported: {0}")]
    Unsupported(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Stores a DICOM instance in one archive
#[async_trait]
pub trait VnaProvider: Send + Sync {
    async fn upload_dicom(
        &self,
        config: &VnaConfiguration,
        data: &[u8],
        metadata: &DicomMetadata,
    ) -> Result<VnaUploadResult, VnaError>;
}

/// Routing seam used by the upload pipeline
#[async_trait]
pub trait DicomRouter: Send + Sync {
    async fn route_dicom(
        &self,
        user_id: &str,
        data: &[u8],
        metadata: &DicomMetadata,
        context: &RoutingContext,
    ) -> Result<VnaUploadResult, VnaError>;
}
