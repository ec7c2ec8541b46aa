mod activity;
mod report_period;

pub use activity::{
    AppointmentActivity, InvoiceActivity, PaymentActivity, ProcedureActivity, ReportActivity,
};
pub use report_period::{ReportPeriod, ReportWindow};
