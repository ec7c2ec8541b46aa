use axum::{extract::State, Json};
use std::sync::Arc;

use crate::core::error::AppError;
use crate::core::extractor::AppQuery;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::dental_reports::dtos::*;
use crate::features::dental_reports::services::DentalReportService;
use crate::shared::types::ApiResponse;

/// Revenue, patient, appointment and procedure metrics per period
#[utoipa::path(
    get,
    path = "/api/dental/reports",
    tag = "Dental Reports",
    params(ReportQueryParams),
    responses(
        (status = 200, description = "Report with per-period breakdown and summary", body = ApiResponse<DentalReportDto>),
        (status = 400, description = "Invalid range or query parameters"),
        (status = 401, description = "Authentication required"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_report(
    user: AuthenticatedUser,
    State(service): State<Arc<DentalReportService>>,
    AppQuery(params): AppQuery<ReportQueryParams>,
) -> Result<Json<ApiResponse<DentalReportDto>>, AppError> {
    let report = service.generate_report(user.user_id(), &params).await?;
    Ok(Json(ApiResponse::success(Some(report), None, None)))
}
