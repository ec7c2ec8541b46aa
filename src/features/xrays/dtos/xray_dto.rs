use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::features::xrays::models::{DentalXray, ProcessingStatus, XrayType};

/// Multipart form for `POST /api/dental/xrays` (documentation only)
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct UploadXrayForm {
    /// X-ray image or DICOM file
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    pub lead_id: Uuid,
    pub xray_type: XrayType,
    /// Defaults to today
    pub date_taken: Option<NaiveDate>,
    /// JSON array of tooth numbers, e.g. `["11","12"]`
    pub teeth_included: Option<String>,
    pub notes: Option<String>,
    pub clinic_id: Option<Uuid>,
}

/// Validated upload metadata
#[derive(Debug, Clone, Validate)]
pub struct CreateXrayRequest {
    pub lead_id: Uuid,
    pub xray_type: XrayType,
    pub date_taken: NaiveDate,
    #[validate(length(max = 52, message = "At most 52 teeth can be listed"))]
    pub teeth_included: Vec<String>,
    #[validate(length(max = 2000, message = "Notes must not exceed 2000 characters"))]
    pub notes: Option<String>,
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct XrayQueryParams {
    pub lead_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct XrayUploadDto {
    pub id: Uuid,
    pub is_dicom: bool,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub full_url: Option<String>,
    pub compression_ratio: Option<f64>,
    pub processing_status: ProcessingStatus,
    pub warnings: Vec<String>,
    /// False when storage succeeded but the record could not be written
    pub record_saved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DentalXrayDto {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub xray_type: XrayType,
    pub date_taken: NaiveDate,
    pub teeth_included: Vec<String>,
    pub notes: Option<String>,
    pub original_filename: String,
    pub is_dicom: bool,
    pub thumbnail_url: Option<String>,
    pub preview_url: Option<String>,
    pub full_url: Option<String>,
    /// Short-lived signed link to the stored DICOM original
    pub dicom_url: Option<String>,
    pub original_size: i64,
    pub compressed_size: Option<i64>,
    pub compression_ratio: Option<f64>,
    pub image_width: Option<i32>,
    pub image_height: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub dicom_metadata: Option<serde_json::Value>,
    pub processing_status: ProcessingStatus,
    pub processing_warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DentalXray> for DentalXrayDto {
    fn from(xray: DentalXray) -> Self {
        Self {
            id: xray.id,
            lead_id: xray.lead_id,
            clinic_id: xray.clinic_id,
            xray_type: xray.xray_type,
            date_taken: xray.date_taken,
            teeth_included: xray.teeth_included,
            notes: xray.notes,
            original_filename: xray.original_filename,
            is_dicom: xray.is_dicom,
            thumbnail_url: xray.thumbnail_url,
            preview_url: xray.preview_url,
            full_url: xray.full_url,
            dicom_url: None,
            original_size: xray.original_size,
            compressed_size: xray.compressed_size,
            compression_ratio: xray.compression_ratio,
            image_width: xray.image_width,
            image_height: xray.image_height,
            dicom_metadata: xray.dicom_metadata.map(|m| m.0),
            processing_status: xray.processing_status,
            processing_warnings: xray.processing_warnings,
            created_at: xray.created_at,
        }
    }
}
