use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Echoed back to the client; every metric is always computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Revenue,
    Patients,
    Procedures,
    #[default]
    Comprehensive,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    Week,
    #[default]
    Month,
    Quarter,
    Year,
    Custom,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReportQueryParams {
    /// revenue | patients | procedures | comprehensive
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub report_type: ReportType,

    /// today | week | month | quarter | year | custom
    #[serde(default)]
    #[param(value_type = Option<String>)]
    pub date_range: DateRange,

    /// First day of a custom range (YYYY-MM-DD)
    pub start_date: Option<NaiveDate>,

    /// Last day of a custom range, inclusive
    pub end_date: Option<NaiveDate>,

    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PeriodMetricsDto {
    pub period: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub revenue: f64,
    pub patients: i64,
    pub appointments: i64,
    pub procedures: i64,
    pub average_ticket: f64,
    /// Percent change of revenue vs the previous period
    pub growth_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummaryDto {
    pub total_revenue: f64,
    pub total_patients: i64,
    pub total_appointments: i64,
    pub total_procedures: i64,
    pub average_ticket: f64,
    pub avg_growth_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DentalReportDto {
    pub report_type: ReportType,
    pub date_range: DateRange,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub clinic_id: Option<Uuid>,
    pub data: Vec<PeriodMetricsDto>,
    pub summary: ReportSummaryDto,
}
