use std::collections::HashSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::features::dental_reports::dtos::{PeriodMetricsDto, ReportSummaryDto};
use crate::features::dental_reports::models::{ReportActivity, ReportPeriod};

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn per_appointment(revenue: Decimal, appointments: usize) -> f64 {
    if appointments == 0 {
        0.0
    } else {
        to_f64(revenue / Decimal::from(appointments))
    }
}

/// Bucket window activity into periods and compute the summary
pub fn aggregate(
    periods: &[ReportPeriod],
    activity: &ReportActivity,
) -> (Vec<PeriodMetricsDto>, ReportSummaryDto) {
    let mut data = Vec::with_capacity(periods.len());
    let mut previous_revenue: Option<Decimal> = None;
    let mut total_revenue = Decimal::ZERO;
    let mut total_appointments = 0usize;
    let mut total_procedures = 0usize;

    for period in periods {
        let invoices: Vec<_> = activity
            .invoices
            .iter()
            .filter(|i| period.contains(i.issue_date))
            .collect();
        let payments_total: Decimal = activity
            .payments
            .iter()
            .filter(|p| period.contains(p.created_at))
            .map(|p| p.amount)
            .sum();
        let appointments: Vec<_> = activity
            .appointments
            .iter()
            .filter(|a| period.contains(a.appointment_date))
            .collect();
        let procedures: Vec<_> = activity
            .procedures
            .iter()
            .filter(|p| period.contains(p.performed_date))
            .collect();

        let revenue = invoices.iter().map(|i| i.paid_amount).sum::<Decimal>() + payments_total;

        let patients: HashSet<Uuid> = appointments
            .iter()
            .filter_map(|a| a.lead_id)
            .chain(procedures.iter().filter_map(|p| p.lead_id))
            .chain(invoices.iter().filter_map(|i| i.lead_id))
            .collect();

        let growth_rate = match previous_revenue {
            Some(previous) if !previous.is_zero() => {
                to_f64((revenue - previous) / previous * Decimal::ONE_HUNDRED)
            }
            _ => 0.0,
        };

        data.push(PeriodMetricsDto {
            period: period.label.clone(),
            start_date: period.start,
            end_date: period.end,
            revenue: to_f64(revenue),
            patients: patients.len() as i64,
            appointments: appointments.len() as i64,
            procedures: procedures.len() as i64,
            average_ticket: per_appointment(revenue, appointments.len()),
            growth_rate,
        });

        previous_revenue = Some(revenue);
        total_revenue += revenue;
        total_appointments += appointments.len();
        total_procedures += procedures.len();
    }

    // Distinct over the whole window, not the sum of per-period counts
    let total_patients: HashSet<Uuid> = activity
        .appointments
        .iter()
        .filter_map(|a| a.lead_id)
        .chain(activity.procedures.iter().filter_map(|p| p.lead_id))
        .chain(activity.invoices.iter().filter_map(|i| i.lead_id))
        .collect();

    let avg_growth_rate = if data.is_empty() {
        0.0
    } else {
        data.iter().map(|d| d.growth_rate).sum::<f64>() / data.len() as f64
    };

    let summary = ReportSummaryDto {
        total_revenue: to_f64(total_revenue),
        total_patients: total_patients.len() as i64,
        total_appointments: total_appointments as i64,
        total_procedures: total_procedures as i64,
        average_ticket: per_appointment(total_revenue, total_appointments),
        avg_growth_rate,
    };

    (data, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::dental_reports::models::{
        AppointmentActivity, InvoiceActivity, PaymentActivity, ProcedureActivity,
    };
    use crate::features::dental_reports::services::{end_of_day, start_of_day};
    use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
    use fake::{Fake, Faker};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn noon(d: u32) -> DateTime<Utc> {
        start_of_day(day(d)) + TimeDelta::hours(12)
    }

    fn periods(days: &[u32]) -> Vec<ReportPeriod> {
        days.iter()
            .map(|d| ReportPeriod {
                label: format!("Mar {:02}", d),
                start: start_of_day(day(*d)),
                end: end_of_day(day(*d)),
            })
            .collect()
    }

    fn invoice(lead: Option<Uuid>, paid: i64, d: u32) -> InvoiceActivity {
        InvoiceActivity {
            lead_id: lead,
            paid_amount: Decimal::from(paid),
            issue_date: noon(d),
        }
    }

    fn payment(amount: i64, d: u32) -> PaymentActivity {
        PaymentActivity {
            lead_id: None,
            amount: Decimal::from(amount),
            created_at: noon(d),
        }
    }

    fn appointment(lead: Uuid, d: u32) -> AppointmentActivity {
        AppointmentActivity {
            lead_id: Some(lead),
            appointment_date: noon(d),
        }
    }

    fn procedure(lead: Uuid, d: u32) -> ProcedureActivity {
        ProcedureActivity {
            lead_id: Some(lead),
            performed_date: noon(d),
        }
    }

    #[test]
    fn test_revenue_growth_and_tickets() {
        let alice: Uuid = Faker.fake();
        let bob: Uuid = Faker.fake();

        let activity = ReportActivity {
            invoices: vec![invoice(Some(alice), 60, 1), invoice(Some(bob), 150, 2)],
            payments: vec![payment(40, 1)],
            appointments: vec![appointment(alice, 1), appointment(bob, 1), appointment(bob, 2)],
            procedures: vec![procedure(alice, 2)],
        };

        let (data, summary) = aggregate(&periods(&[1, 2, 3, 4]), &activity);

        assert_eq!(data.len(), 4);
        assert_eq!(data[0].revenue, 100.0);
        assert_eq!(data[0].growth_rate, 0.0);
        assert_eq!(data[0].average_ticket, 50.0);
        assert_eq!(data[0].patients, 2);

        assert_eq!(data[1].revenue, 150.0);
        assert_eq!(data[1].growth_rate, 50.0);
        assert_eq!(data[1].appointments, 1);
        assert_eq!(data[1].procedures, 1);
        assert_eq!(data[1].patients, 2);

        assert_eq!(data[2].revenue, 0.0);
        assert_eq!(data[2].growth_rate, -100.0);
        assert_eq!(data[2].average_ticket, 0.0);

        // Previous revenue of zero never divides
        assert_eq!(data[3].growth_rate, 0.0);

        assert_eq!(summary.total_revenue, 250.0);
        assert_eq!(summary.total_patients, 2);
        assert_eq!(summary.total_appointments, 3);
        assert_eq!(summary.total_procedures, 1);
        assert_eq!(summary.avg_growth_rate, -12.5);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        let lead: Uuid = Faker.fake();
        let p = periods(&[5]);
        let activity = ReportActivity {
            appointments: vec![
                AppointmentActivity {
                    lead_id: Some(lead),
                    appointment_date: p[0].start,
                },
                AppointmentActivity {
                    lead_id: Some(lead),
                    appointment_date: p[0].end,
                },
                AppointmentActivity {
                    lead_id: Some(lead),
                    appointment_date: p[0].start + TimeDelta::days(1) - TimeDelta::nanoseconds(500_000),
                },
                AppointmentActivity {
                    lead_id: Some(lead),
                    appointment_date: p[0].end + TimeDelta::microseconds(1),
                },
            ],
            ..Default::default()
        };

        let (data, _) = aggregate(&p, &activity);
        assert_eq!(data[0].appointments, 3);
        assert_eq!(data[0].patients, 1);
    }

    #[test]
    fn test_empty_activity_yields_zero_metrics() {
        let (data, summary) = aggregate(&periods(&[1, 2]), &ReportActivity::default());
        assert!(data.iter().all(|d| d.revenue == 0.0 && d.patients == 0));
        assert_eq!(summary.total_revenue, 0.0);
        assert_eq!(summary.average_ticket, 0.0);
        assert_eq!(summary.avg_growth_rate, 0.0);
    }
}
