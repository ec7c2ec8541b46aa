use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;

use crate::features::xrays::handlers;
use crate::features::xrays::services::XrayService;

/// Multipart framing on top of the file itself
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create protected X-ray routes
pub fn routes(xray_service: Arc<XrayService>) -> Router {
    let body_limit = xray_service.max_upload_size() + MULTIPART_OVERHEAD;

    Router::new()
        .route(
            "/api/dental/xrays",
            get(handlers::list_xrays).post(handlers::upload_xray),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(xray_service)
}
