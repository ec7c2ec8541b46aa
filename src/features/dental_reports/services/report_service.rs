use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::error::Result;
use crate::features::dental_reports::dtos::{DentalReportDto, ReportQueryParams};
use crate::features::dental_reports::models::{
    AppointmentActivity, InvoiceActivity, PaymentActivity, ProcedureActivity, ReportActivity,
    ReportWindow,
};
use crate::features::dental_reports::services::{aggregate, compute_window, split_periods};

/// Read-only practice reporting
pub struct DentalReportService {
    pool: PgPool,
}

impl DentalReportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn generate_report(
        &self,
        user_id: &str,
        params: &ReportQueryParams,
    ) -> Result<DentalReportDto> {
        let today = Utc::now().date_naive();
        let window = compute_window(params.date_range, params.start_date, params.end_date, today)?;
        let periods = split_periods(params.date_range, &window)?;

        let activity = self
            .fetch_activity(user_id, &window, params.clinic_id)
            .await?;

        tracing::debug!(
            "Report for {}: {} periods, {} invoices, {} payments, {} appointments, {} procedures",
            user_id,
            periods.len(),
            activity.invoices.len(),
            activity.payments.len(),
            activity.appointments.len(),
            activity.procedures.len()
        );

        let (data, summary) = aggregate(&periods, &activity);

        Ok(DentalReportDto {
            report_type: params.report_type,
            date_range: params.date_range,
            start_date: window.start,
            end_date: window.end,
            clinic_id: params.clinic_id,
            data,
            summary,
        })
    }

    /// Leads with an appointment or a procedure at the clinic
    async fn clinic_lead_ids(&self, user_id: &str, clinic_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT lead_id FROM booking_appointments
            WHERE user_id = $1 AND clinic_id = $2 AND lead_id IS NOT NULL
            UNION
            SELECT lead_id FROM dental_procedures
            WHERE user_id = $1 AND clinic_id = $2 AND lead_id IS NOT NULL
            "#,
        )
        .bind(user_id)
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn fetch_activity(
        &self,
        user_id: &str,
        window: &ReportWindow,
        clinic_id: Option<Uuid>,
    ) -> Result<ReportActivity> {
        let lead_filter = match clinic_id {
            Some(clinic_id) => Some(self.clinic_lead_ids(user_id, clinic_id).await?),
            None => None,
        };

        let procedures = self.fetch_procedures(user_id, window, clinic_id).await?;

        if lead_filter.as_ref().is_some_and(|ids| ids.is_empty()) {
            return Ok(ReportActivity {
                procedures,
                ..Default::default()
            });
        }

        let (invoices, payments, appointments) = tokio::try_join!(
            self.fetch_invoices(user_id, window, lead_filter.as_deref()),
            self.fetch_payments(user_id, window, lead_filter.as_deref()),
            self.fetch_appointments(user_id, window, lead_filter.as_deref()),
        )?;

        Ok(ReportActivity {
            invoices,
            payments,
            appointments,
            procedures,
        })
    }

    async fn fetch_invoices(
        &self,
        user_id: &str,
        window: &ReportWindow,
        lead_ids: Option<&[Uuid]>,
    ) -> Result<Vec<InvoiceActivity>> {
        let rows = sqlx::query_as::<_, InvoiceActivity>(
            r#"
            SELECT lead_id, paid_amount, issue_date
            FROM invoices
            WHERE user_id = $1
              AND issue_date BETWEEN $2 AND $3
              AND ($4::uuid[] IS NULL OR lead_id = ANY($4))
            "#,
        )
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(lead_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_payments(
        &self,
        user_id: &str,
        window: &ReportWindow,
        lead_ids: Option<&[Uuid]>,
    ) -> Result<Vec<PaymentActivity>> {
        let rows = sqlx::query_as::<_, PaymentActivity>(
            r#"
            SELECT lead_id, amount, created_at
            FROM payments
            WHERE user_id = $1
              AND status = 'completed'
              AND created_at BETWEEN $2 AND $3
              AND ($4::uuid[] IS NULL OR lead_id = ANY($4))
            "#,
        )
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(lead_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_appointments(
        &self,
        user_id: &str,
        window: &ReportWindow,
        lead_ids: Option<&[Uuid]>,
    ) -> Result<Vec<AppointmentActivity>> {
        let rows = sqlx::query_as::<_, AppointmentActivity>(
            r#"
            SELECT lead_id, appointment_date
            FROM booking_appointments
            WHERE user_id = $1
              AND appointment_date BETWEEN $2 AND $3
              AND ($4::uuid[] IS NULL OR lead_id = ANY($4))
            "#,
        )
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(lead_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn fetch_procedures(
        &self,
        user_id: &str,
        window: &ReportWindow,
        clinic_id: Option<Uuid>,
    ) -> Result<Vec<ProcedureActivity>> {
        let rows = sqlx::query_as::<_, ProcedureActivity>(
            r#"
            SELECT lead_id, performed_date
            FROM dental_procedures
            WHERE user_id = $1
              AND performed_date BETWEEN $2 AND $3
              AND ($4::uuid IS NULL OR clinic_id = $4)
            "#,
        )
        .bind(user_id)
        .bind(window.start)
        .bind(window.end)
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
