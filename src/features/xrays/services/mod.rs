mod pipeline;
mod xray_service;

pub use pipeline::{ProcessedXray, XrayPipeline, XrayUpload};
pub use xray_service::XrayService;
