use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vna_type")]
pub enum VnaType {
    #[sqlx(rename = "orthanc")]
    #[serde(rename = "ORTHANC")]
    Orthanc,
    #[sqlx(rename = "aws_s3")]
    #[serde(rename = "AWS_S3")]
    AwsS3,
    #[sqlx(rename = "azure_blob")]
    #[serde(rename = "AZURE_BLOB")]
    AzureBlob,
}

/// Secrets stored alongside a VNA configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnaCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct VnaConfiguration {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub vna_type: VnaType,
    pub endpoint: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub credentials: Option<Json<VnaCredentials>>,
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub path_prefix: Option<String>,
    pub is_active: bool,
    pub is_default: bool,
    pub priority: i32,
}

impl VnaConfiguration {
    pub fn credentials(&self) -> Option<&VnaCredentials> {
        self.credentials.as_ref().map(|c| &c.0)
    }
}

/// Rule conditions; every condition that is set must hold
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingConditions {
    pub location: Option<String>,
    #[serde(default, alias = "imageType")]
    pub image_types: Vec<String>,
    pub patient_id: Option<String>,
    pub lead_id: Option<String>,
}

impl RoutingConditions {
    pub fn matches(&self, context: &RoutingContext) -> bool {
        fn equals(expected: &Option<String>, actual: &Option<String>) -> bool {
            match expected {
                Some(expected) => actual.as_deref() == Some(expected.as_str()),
                None => true,
            }
        }

        let image_type_ok = self.image_types.is_empty()
            || context.image_type.as_deref().is_some_and(|actual| {
                self.image_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(actual))
            });

        equals(&self.location, &context.location)
            && image_type_ok
            && equals(&self.patient_id, &context.patient_id)
            && equals(&self.lead_id, &context.lead_id)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct VnaRoutingRule {
    pub id: Uuid,
    pub name: String,
    pub priority: i32,
    pub conditions: Json<RoutingConditions>,
    pub vna_id: Uuid,
    pub compress: bool,
    pub is_active: bool,
}

/// Facts about the upload that rules can match on
#[derive(Debug, Clone, Default)]
pub struct RoutingContext {
    pub location: Option<String>,
    pub image_type: Option<String>,
    pub patient_id: Option<String>,
    pub lead_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VnaUploadResult {
    pub vna_id: Uuid,
    pub storage_path: String,
    pub url: Option<String>,
}
