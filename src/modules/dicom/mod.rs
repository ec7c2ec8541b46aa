//! DICOM support for X-ray ingestion
//!
//! Thin layer over dicom-rs: validate an upload, pull the handful of tags we
//! index, and render the first frame to an 8-bit image for the JPEG variants.

mod error;
mod parser;

pub use error::DicomError;
#[cfg(test)]
pub(crate) use parser::test_support;
pub use parser::{
    is_dicom_upload, DecodedDicom, DicomMetadata, NativeDicomDecoder, MAX_SEQUENCE_DEPTH,
};

/// Decoder seam used by the upload pipeline
pub trait DicomDecoder: Send + Sync {
    /// Cheap structural check; does not touch pixel data
    fn validate(&self, data: &[u8]) -> Result<DicomMetadata, DicomError>;

    /// Full decode to an 8-bit image
    fn decode(&self, data: &[u8]) -> Result<DecodedDicom, DicomError>;
}
