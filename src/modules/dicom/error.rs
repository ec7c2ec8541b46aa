use thiserror::Error;

/// DICOM decoding failures, classified for the upload pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DicomError {
    #[error("Not a DICOM file: {0}")]
    InvalidFormat(String),

    #[error("Corrupt pixel data: {0}")]
    CorruptPixelData(String),

    #[error("Unsupported transfer syntax: {0}")]
    UnsupportedTransferSyntax(String),

    #[error("Unsupported pixel format: {0}")]
    UnsupportedPixelFormat(String),

    #[error("DICOM file has no pixel data")]
    MissingPixelData,

    #[error("Decoder worker failed: {0}")]
    Worker(String),
}

impl DicomError {
    /// The file is valid DICOM we cannot render. The original is still worth
    /// keeping, so the upload continues without derived images.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DicomError::UnsupportedTransferSyntax(_)
                | DicomError::UnsupportedPixelFormat(_)
                | DicomError::MissingPixelData
                | DicomError::Worker(_)
        )
    }

    /// Worth another attempt with the same input
    pub fn is_transient(&self) -> bool {
        matches!(self, DicomError::Worker(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(!DicomError::InvalidFormat("x".into()).is_recoverable());
        assert!(!DicomError::CorruptPixelData("x".into()).is_recoverable());
        assert!(DicomError::UnsupportedTransferSyntax("1.2.840.10008.1.2.4.50".into()).is_recoverable());
        assert!(DicomError::MissingPixelData.is_recoverable());

        assert!(DicomError::Worker("join".into()).is_transient());
        assert!(!DicomError::MissingPixelData.is_transient());
    }
}
