use async_trait::async_trait;
use reqwest::Client;
use sqlx::PgPool;
use std::time::Duration;

use super::cloud::CloudStorageProvider;
use super::models::{RoutingContext, VnaConfiguration, VnaRoutingRule, VnaType, VnaUploadResult};
use super::orthanc::OrthancProvider;
use super::routing::select_vna;
use super::{DicomRouter, VnaError, VnaProvider};
use crate::core::error::AppError;
use crate::modules::dicom::DicomMetadata;

/// Loads a tenant's archives and rules and dispatches to the right provider
pub struct VnaService {
    pool: PgPool,
    orthanc: OrthancProvider,
    cloud: CloudStorageProvider,
}

impl VnaService {
    pub fn new(pool: PgPool) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build VNA HTTP client: {}", e)))?;

        Ok(Self {
            pool,
            orthanc: OrthancProvider::new(client),
            cloud: CloudStorageProvider,
        })
    }

    async fn load_configurations(&self, user_id: &str) -> Result<Vec<VnaConfiguration>, VnaError> {
        let configurations = sqlx::query_as::<_, VnaConfiguration>(
            r#"
            SELECT id, user_id, name, vna_type, endpoint, host, port, credentials,
                   bucket, region, path_prefix, is_active, is_default, priority
            FROM vna_configurations
            WHERE user_id = $1
            ORDER BY priority ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(configurations)
    }

    async fn load_rules(&self, user_id: &str) -> Result<Vec<VnaRoutingRule>, VnaError> {
        let rules = sqlx::query_as::<_, VnaRoutingRule>(
            r#"
            SELECT id, name, priority, conditions, vna_id, compress, is_active
            FROM vna_routing_rules
            WHERE user_id = $1 AND is_active = TRUE
            ORDER BY priority ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rules)
    }

    fn provider(&self, vna_type: VnaType) -> &dyn VnaProvider {
        match vna_type {
            VnaType::Orthanc => &self.orthanc,
            VnaType::AwsS3 | VnaType::AzureBlob => &self.cloud,
        }
    }
}

#[async_trait]
impl DicomRouter for VnaService {
    async fn route_dicom(
        &self,
        user_id: &str,
        data: &[u8],
        metadata: &DicomMetadata,
        context: &RoutingContext,
    ) -> Result<VnaUploadResult, VnaError> {
        let configurations = self.load_configurations(user_id).await?;
        let rules = self.load_rules(user_id).await?;

        let target =
            select_vna(&configurations, &rules, context).ok_or(VnaError::NoVnaConfigured)?;

        tracing::debug!("Routing DICOM for {} to VNA '{}'", user_id, target.name);

        self.provider(target.vna_type)
            .upload_dicom(target, data, metadata)
            .await
    }
}
