use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, Type};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// X-ray type enum matching database enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "xray_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum XrayType {
    Panoramic,
    Bitewing,
    Periapical,
    Cephalometric,
    Cbct,
    FullMouth,
    Other,
}

impl XrayType {
    pub fn as_str(&self) -> &'static str {
        match self {
            XrayType::Panoramic => "PANORAMIC",
            XrayType::Bitewing => "BITEWING",
            XrayType::Periapical => "PERIAPICAL",
            XrayType::Cephalometric => "CEPHALOMETRIC",
            XrayType::Cbct => "CBCT",
            XrayType::FullMouth => "FULL_MOUTH",
            XrayType::Other => "OTHER",
        }
    }
}

impl FromStr for XrayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PANORAMIC" => Ok(XrayType::Panoramic),
            "BITEWING" => Ok(XrayType::Bitewing),
            "PERIAPICAL" => Ok(XrayType::Periapical),
            "CEPHALOMETRIC" => Ok(XrayType::Cephalometric),
            "CBCT" => Ok(XrayType::Cbct),
            "FULL_MOUTH" => Ok(XrayType::FullMouth),
            "OTHER" => Ok(XrayType::Other),
            other => Err(format!("Unknown X-ray type '{}'", other)),
        }
    }
}

/// How much of the upload made it to storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, ToSchema)]
#[sqlx(type_name = "xray_processing_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Original plus all JPEG variants
    Complete,
    /// DICOM stored, variants missing (to be backfilled)
    DicomOnly,
    /// Plain image stored as-is, placeholders for thumbnail/preview
    OriginalOnly,
}

/// Database model for an X-ray record
#[derive(Debug, Clone, FromRow)]
pub struct DentalXray {
    pub id: Uuid,
    pub user_id: String,
    pub lead_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub xray_type: XrayType,
    pub date_taken: NaiveDate,
    pub teeth_included: Vec<String>,
    pub notes: Option<String>,
    pub original_filename: String,
    pub content_type: String,
    pub is_dicom: bool,
    pub dicom_storage_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub full_url: Option<String>,
    pub original_size: i64,
    pub compressed_size: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    pub dicom_metadata: Option<Json<serde_json::Value>>,
    pub processing_status: ProcessingStatus,
    pub processing_warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting an X-ray record
#[derive(Debug, Clone)]
pub struct CreateDentalXray {
    pub id: Uuid,
    pub user_id: String,
    pub lead_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub xray_type: XrayType,
    pub date_taken: NaiveDate,
    pub teeth_included: Vec<String>,
    pub notes: Option<String>,
    pub original_filename: String,
    pub content_type: String,
    pub is_dicom: bool,
    pub dicom_storage_key: Option<String>,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub full_url: Option<String>,
    pub original_size: i64,
    pub compressed_size: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    pub dicom_metadata: Option<serde_json::Value>,
    pub processing_status: ProcessingStatus,
    pub processing_warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xray_type_parsing() {
        assert_eq!("PANORAMIC".parse::<XrayType>(), Ok(XrayType::Panoramic));
        assert_eq!("full_mouth".parse::<XrayType>(), Ok(XrayType::FullMouth));
        assert_eq!(" cbct ".parse::<XrayType>(), Ok(XrayType::Cbct));
        assert!("MRI".parse::<XrayType>().is_err());
        assert_eq!(XrayType::FullMouth.as_str(), "FULL_MOUTH");
        assert_eq!(
            serde_json::to_value(XrayType::FullMouth).unwrap(),
            serde_json::json!("FULL_MOUTH")
        );
    }
}
