pub mod auth;
pub mod dental_reports;
pub mod listings;
pub mod xrays;
