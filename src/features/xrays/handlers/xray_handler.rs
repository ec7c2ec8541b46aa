use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use crate::core::error::AppError;
use crate::core::extractor::AppQuery;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::xrays::dtos::{
    CreateXrayRequest, DentalXrayDto, UploadXrayForm, XrayQueryParams, XrayUploadDto,
};
use crate::features::xrays::models::XrayType;
use crate::features::xrays::services::{XrayService, XrayUpload};
use crate::shared::types::{ApiResponse, Meta};

/// List X-rays of a lead, newest first
#[utoipa::path(
    get,
    path = "/api/dental/xrays",
    tag = "X-rays",
    params(XrayQueryParams),
    responses(
        (status = 200, description = "X-ray records of the lead", body = ApiResponse<Vec<DentalXrayDto>>),
        (status = 400, description = "Missing or invalid leadId"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Lead not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_xrays(
    user: AuthenticatedUser,
    State(service): State<Arc<XrayService>>,
    AppQuery(params): AppQuery<XrayQueryParams>,
) -> Result<Json<ApiResponse<Vec<DentalXrayDto>>>, AppError> {
    let xrays = service.list_for_lead(user.user_id(), params.lead_id).await?;
    let total = xrays.len() as i64;
    Ok(Json(ApiResponse::success(
        Some(xrays),
        None,
        Some(Meta { total }),
    )))
}

/// Upload an X-ray
///
/// DICOM files (`.dcm`/`.dicom` or `application/dicom`) are archived as-is and
/// rendered to JPEG variants; other images are only compressed. Returns 202
/// when the files were stored but the record could not be written.
#[utoipa::path(
    post,
    path = "/api/dental/xrays",
    tag = "X-rays",
    request_body(
        content = UploadXrayForm,
        content_type = "multipart/form-data",
    ),
    responses(
        (status = 201, description = "X-ray stored and recorded", body = ApiResponse<XrayUploadDto>),
        (status = 202, description = "Files stored, record not saved", body = ApiResponse<XrayUploadDto>),
        (status = 400, description = "Invalid form field or unreadable DICOM"),
        (status = 401, description = "Authentication required"),
        (status = 404, description = "Lead not found"),
        (status = 413, description = "File too large")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_xray(
    user: AuthenticatedUser,
    State(service): State<Arc<XrayService>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<XrayUploadDto>>), AppError> {
    let mut form = RawUploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == "file" {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let file_name = field
                .file_name()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unnamed".to_string());
            let data = field.bytes().await.map_err(|e| {
                debug!("Failed to read file bytes: {}", e);
                AppError::BadRequest(format!("Failed to read file data: {}", e))
            })?;

            form.file = Some(XrayUpload {
                file_name,
                content_type,
                data,
            });
            continue;
        }

        let text = field.text().await.map_err(|e| {
            AppError::BadRequest(format!("Failed to read field '{}': {}", field_name, e))
        })?;
        let text = text.trim().to_string();
        if text.is_empty() {
            continue;
        }

        match field_name.as_str() {
            "leadId" => form.lead_id = Some(text),
            "xrayType" => form.xray_type = Some(text),
            "dateTaken" => form.date_taken = Some(text),
            "teethIncluded" => form.teeth_included = Some(text),
            "notes" => form.notes = Some(text),
            "clinicId" => form.clinic_id = Some(text),
            _ => debug!("Ignoring unknown field: {}", field_name),
        }
    }

    let (request, upload) = form.validate(service.max_upload_size(), Utc::now().date_naive())?;

    let result = service.upload(user.user_id(), request, upload).await?;
    let status = if result.record_saved {
        StatusCode::CREATED
    } else {
        StatusCode::ACCEPTED
    };

    Ok((status, Json(ApiResponse::success(Some(result), None, None))))
}

/// Multipart fields as received
#[derive(Debug, Default)]
struct RawUploadForm {
    file: Option<XrayUpload>,
    lead_id: Option<String>,
    xray_type: Option<String>,
    date_taken: Option<String>,
    teeth_included: Option<String>,
    notes: Option<String>,
    clinic_id: Option<String>,
}

impl RawUploadForm {
    /// Everything the upload needs that can be checked without the database
    fn validate(
        self,
        max_size: usize,
        today: NaiveDate,
    ) -> Result<(CreateXrayRequest, XrayUpload), AppError> {
        let upload = self
            .file
            .ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
        if upload.data.is_empty() {
            return Err(AppError::BadRequest("File is empty".to_string()));
        }
        if upload.data.len() > max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "File too large. Maximum size is {} MB",
                max_size / 1024 / 1024
            )));
        }

        let lead_id = parse_uuid("leadId", self.lead_id.as_deref())?
            .ok_or_else(|| AppError::BadRequest("leadId is required".to_string()))?;
        let clinic_id = parse_uuid("clinicId", self.clinic_id.as_deref())?;

        let xray_type = self
            .xray_type
            .ok_or_else(|| AppError::BadRequest("xrayType is required".to_string()))?
            .parse::<XrayType>()
            .map_err(AppError::BadRequest)?;

        let date_taken = match self.date_taken.as_deref() {
            Some(raw) => parse_date(raw)?,
            None => today,
        };

        let teeth_included = match self.teeth_included.as_deref() {
            Some(raw) => serde_json::from_str::<Vec<String>>(raw).map_err(|_| {
                AppError::BadRequest("teethIncluded must be a JSON array of strings".to_string())
            })?,
            None => Vec::new(),
        };

        let request = CreateXrayRequest {
            lead_id,
            xray_type,
            date_taken,
            teeth_included,
            notes: self.notes,
            clinic_id,
        };
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        Ok((request, upload))
    }
}

fn parse_uuid(field: &str, raw: Option<&str>) -> Result<Option<Uuid>, AppError> {
    raw.map(|value| {
        Uuid::parse_str(value)
            .map_err(|_| AppError::BadRequest(format!("{} must be a valid UUID", field)))
    })
    .transpose()
}

/// `YYYY-MM-DD`, or an RFC 3339 timestamp from date pickers
fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::BadRequest("dateTaken must be a date (YYYY-MM-DD)".to_string()))
}
