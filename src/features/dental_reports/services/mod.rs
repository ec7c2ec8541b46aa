mod aggregation;
mod periods;
mod report_service;

pub use aggregation::aggregate;
pub use periods::{compute_window, end_of_day, split_periods, start_of_day};
pub use report_service::DentalReportService;
