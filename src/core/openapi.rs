use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::dental_reports::{dtos as reports_dtos, handlers as reports_handlers};
use crate::features::xrays::{dtos as xrays_dtos, handlers as xrays_handlers, models as xrays_models};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Reports
        reports_handlers::get_report,
        // X-rays
        xrays_handlers::list_xrays,
        xrays_handlers::upload_xray,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Reports
            reports_dtos::ReportType,
            reports_dtos::DateRange,
            reports_dtos::PeriodMetricsDto,
            reports_dtos::ReportSummaryDto,
            reports_dtos::DentalReportDto,
            ApiResponse<reports_dtos::DentalReportDto>,
            // X-rays
            xrays_models::XrayType,
            xrays_models::ProcessingStatus,
            xrays_dtos::UploadXrayForm,
            xrays_dtos::XrayUploadDto,
            xrays_dtos::DentalXrayDto,
            ApiResponse<xrays_dtos::XrayUploadDto>,
            ApiResponse<Vec<xrays_dtos::DentalXrayDto>>,
        )
    ),
    tags(
        (name = "Dental Reports", description = "Practice revenue, patient and procedure reporting"),
        (name = "X-rays", description = "X-ray and DICOM upload and retrieval"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Practice Ops API",
        version = "0.1.0",
        description = "API documentation for the practice operations core",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to the OpenAPI document
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_dental_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/dental/reports"));
        assert!(doc.paths.paths.contains_key("/api/dental/xrays"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
