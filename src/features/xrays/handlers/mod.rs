mod xray_handler;

pub use xray_handler::*;
