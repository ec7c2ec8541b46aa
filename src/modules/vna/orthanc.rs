use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::models::{VnaConfiguration, VnaUploadResult};
use super::{VnaError, VnaProvider};
use crate::modules::dicom::DicomMetadata;

const DEFAULT_ORTHANC_PORT: i32 = 8042;

#[derive(Debug, Deserialize)]
struct OrthancInstance {
    #[serde(rename = "ID")]
    id: String,
}

/// Orthanc REST API (`POST /instances`)
pub struct OrthancProvider {
    client: Client,
}

impl OrthancProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn base_url(config: &VnaConfiguration) -> Result<String, VnaError> {
        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            return Ok(endpoint.trim_end_matches('/').to_string());
        }
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| VnaError::Upload(format!("VNA '{}' has no endpoint or host", config.name)))?;
        Ok(format!(
            "http://{}:{}",
            host,
            config.port.unwrap_or(DEFAULT_ORTHANC_PORT)
        ))
    }
}

#[async_trait]
impl VnaProvider for OrthancProvider {
    async fn upload_dicom(
        &self,
        config: &VnaConfiguration,
        data: &[u8],
        _metadata: &DicomMetadata,
    ) -> Result<VnaUploadResult, VnaError> {
        let base_url = Self::base_url(config)?;

        let mut request = self
            .client
            .post(format!("{}/instances", base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/dicom")
            .body(data.to_vec());

        if let Some(credentials) = config.credentials() {
            if let (Some(user), Some(password)) = (&credentials.username, &credentials.password) {
                request = request.basic_auth(user, Some(password));
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| VnaError::Upload(format!("Orthanc request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VnaError::Upload(format!(
                "Orthanc upload failed: {}",
                response.status()
            )));
        }

        let instance: OrthancInstance = response
            .json()
            .await
            .map_err(|e| VnaError::Upload(format!("Unexpected Orthanc response: {}", e)))?;

        Ok(VnaUploadResult {
            vna_id: config.id,
            url: Some(format!("{}/instances/{}", base_url, instance.id)),
            storage_path: instance.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::vna::models::VnaType;
    use uuid::Uuid;

    fn config(endpoint: Option<&str>, host: Option<&str>, port: Option<i32>) -> VnaConfiguration {
        VnaConfiguration {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            name: "orthanc".to_string(),
            vna_type: VnaType::Orthanc,
            endpoint: endpoint.map(String::from),
            host: host.map(String::from),
            port,
            credentials: None,
            bucket: None,
            region: None,
            path_prefix: None,
            is_active: true,
            is_default: true,
            priority: 0,
        }
    }

    #[test]
    fn test_base_url() {
        assert_eq!(
            OrthancProvider::base_url(&config(Some("https://pacs.example.com/"), None, None)).unwrap(),
            "https://pacs.example.com"
        );
        assert_eq!(
            OrthancProvider::base_url(&config(None, Some("10.0.0.5"), None)).unwrap(),
            "http://10.0.0.5:8042"
        );
        assert_eq!(
            OrthancProvider::base_url(&config(None, Some("pacs"), Some(9000))).unwrap(),
            "http://pacs:9000"
        );
        assert!(OrthancProvider::base_url(&config(None, None, None)).is_err());
    }
}
