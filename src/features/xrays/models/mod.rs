mod xray;

pub use xray::{CreateDentalXray, DentalXray, ProcessingStatus, XrayType};
