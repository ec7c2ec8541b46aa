use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct InvoiceActivity {
    pub lead_id: Option<Uuid>,
    pub paid_amount: Decimal,
    pub issue_date: DateTime<Utc>,
}

/// Completed payments only
#[derive(Debug, Clone, FromRow)]
pub struct PaymentActivity {
    pub lead_id: Option<Uuid>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct AppointmentActivity {
    pub lead_id: Option<Uuid>,
    pub appointment_date: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ProcedureActivity {
    pub lead_id: Option<Uuid>,
    pub performed_date: DateTime<Utc>,
}

/// Everything that happened inside a report window
#[derive(Debug, Clone, Default)]
pub struct ReportActivity {
    pub invoices: Vec<InvoiceActivity>,
    pub payments: Vec<PaymentActivity>,
    pub appointments: Vec<AppointmentActivity>,
    pub procedures: Vec<ProcedureActivity>,
}
