mod xray_dto;

pub use xray_dto::*;
