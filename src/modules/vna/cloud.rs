use async_trait::async_trait;
use chrono::Utc;
use s3::creds::Credentials;
use s3::{Bucket, Region};

use super::models::{VnaConfiguration, VnaType, VnaUploadResult};
use super::{VnaError, VnaProvider};
use crate::modules::dicom::DicomMetadata;

const DEFAULT_PATH_PREFIX: &str = "dicom";

/// Object storage archive. Only S3 is wired; Azure Blob is rejected.
#[derive(Debug, Default)]
pub struct CloudStorageProvider;

impl CloudStorageProvider {
    /// `{prefix}/{patient}/{millis}.dcm`
    pub fn object_path(config: &VnaConfiguration, metadata: &DicomMetadata, now_millis: i64) -> String {
        let prefix = config
            .path_prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PATH_PREFIX);
        let patient = metadata.patient_id.as_deref().unwrap_or("unknown");
        format!("{}/{}/{}.dcm", prefix, patient, now_millis)
    }

    fn bucket(config: &VnaConfiguration) -> Result<Box<Bucket>, VnaError> {
        let name = config
            .bucket
            .as_deref()
            .ok_or_else(|| VnaError::Upload(format!("VNA '{}' has no bucket", config.name)))?;

        let region_name = config.region.clone().unwrap_or_else(|| "us-east-1".to_string());
        let region = match config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => Region::Custom {
                region: region_name,
                endpoint: endpoint.to_string(),
            },
            None => region_name
                .parse::<Region>()
                .map_err(|e| VnaError::Upload(format!("Invalid region: {}", e)))?,
        };

        let keys = config.credentials();
        let credentials = Credentials::new(
            keys.and_then(|c| c.access_key_id.as_deref()),
            keys.and_then(|c| c.secret_access_key.as_deref()),
            None,
            None,
            None,
        )
        .map_err(|e| VnaError::Upload(format!("Invalid VNA credentials: {}", e)))?;

        Bucket::new(name, region, credentials)
            .map_err(|e| VnaError::Upload(format!("Invalid bucket: {}", e)))
    }
}

#[async_trait]
impl VnaProvider for CloudStorageProvider {
    async fn upload_dicom(
        &self,
        config: &VnaConfiguration,
        data: &[u8],
        metadata: &DicomMetadata,
    ) -> Result<VnaUploadResult, VnaError> {
        if config.vna_type != VnaType::AwsS3 {
            return Err(VnaError::Unsupported(format!("{:?}", config.vna_type)));
        }

        let bucket = Self::bucket(config)?;
        let path = Self::object_path(config, metadata, Utc::now().timestamp_millis());

        bucket
            .put_object_with_content_type(&path, data, "application/dicom")
            .await
            .map_err(|e| VnaError::Upload(format!("S3 upload failed: {}", e)))?;

        Ok(VnaUploadResult {
            vna_id: config.id,
            url: Some(format!("s3://{}/{}", bucket.name(), path)),
            storage_path: path,
        })
    }
}
