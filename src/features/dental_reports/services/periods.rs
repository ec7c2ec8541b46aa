use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, Utc};

use crate::core::error::{AppError, Result};
use crate::features::dental_reports::dtos::DateRange;
use crate::features::dental_reports::models::{ReportPeriod, ReportWindow};
use crate::shared::constants::DAILY_BREAKDOWN_MAX_DAYS;

const DAY_LABEL: &str = "%b %d";
const FULL_DAY_LABEL: &str = "%b %d, %Y";
const MONTH_LABEL: &str = "%b %Y";

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Last microsecond of the day, the finest `TIMESTAMPTZ` resolution
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date) + TimeDelta::days(1) - TimeDelta::microseconds(1)
}

fn month_start(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::Internal(format!("Invalid month {}-{}", year, month)))
}

fn month_end(year: i32, month: u32) -> Result<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    Ok(month_start(next_year, next_month)? - TimeDelta::days(1))
}

/// Resolve the reporting window relative to `today`
pub fn compute_window(
    range: DateRange,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<ReportWindow> {
    let last_30_days = (today - TimeDelta::days(29), today);

    let (first, last) = match range {
        DateRange::Today => (today, today),
        DateRange::Week => (today - TimeDelta::days(6), today),
        DateRange::Month => last_30_days,
        DateRange::Quarter => {
            let first_month = today.month0() / 3 * 3 + 1;
            (
                month_start(today.year(), first_month)?,
                month_end(today.year(), first_month + 2)?,
            )
        }
        DateRange::Year => (month_start(today.year(), 1)?, month_end(today.year(), 12)?),
        DateRange::Custom => match (start_date, end_date) {
            (Some(start), Some(end)) if start > end => {
                return Err(AppError::BadRequest(
                    "startDate must not be after endDate".to_string(),
                ))
            }
            (Some(start), Some(end)) => (start, end),
            _ => last_30_days,
        },
    };

    Ok(ReportWindow {
        start: start_of_day(first),
        end: end_of_day(last),
    })
}

/// Contiguous, non-overlapping buckets covering the window
pub fn split_periods(range: DateRange, window: &ReportWindow) -> Result<Vec<ReportPeriod>> {
    let first = window.start.date_naive();
    let last = window.end.date_naive();

    let periods = match range {
        DateRange::Today => vec![ReportPeriod {
            label: first.format(FULL_DAY_LABEL).to_string(),
            start: window.start,
            end: window.end,
        }],
        DateRange::Week | DateRange::Month => daily(first, last),
        DateRange::Quarter | DateRange::Year => monthly(first, last)?,
        DateRange::Custom => {
            let days = (last - first).num_days() + 1;
            if days <= DAILY_BREAKDOWN_MAX_DAYS {
                daily(first, last)
            } else {
                weekly(first, last)
            }
        }
    };

    Ok(periods)
}

fn daily(first: NaiveDate, last: NaiveDate) -> Vec<ReportPeriod> {
    first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| ReportPeriod {
            label: day.format(DAY_LABEL).to_string(),
            start: start_of_day(day),
            end: end_of_day(day),
        })
        .collect()
}

/// 7-day buckets from `first`; the last one is clamped to `last`
fn weekly(first: NaiveDate, last: NaiveDate) -> Vec<ReportPeriod> {
    let mut periods = Vec::new();
    let mut week_start = first;

    while week_start <= last {
        let week_end = (week_start + TimeDelta::days(6)).min(last);
        periods.push(ReportPeriod {
            label: format!(
                "{} - {}",
                week_start.format(DAY_LABEL),
                week_end.format(DAY_LABEL)
            ),
            start: start_of_day(week_start),
            end: end_of_day(week_end),
        });
        week_start = week_end + TimeDelta::days(1);
    }

    periods
}

fn monthly(first: NaiveDate, last: NaiveDate) -> Result<Vec<ReportPeriod>> {
    let mut periods = Vec::new();
    let (mut year, mut month) = (first.year(), first.month());

    loop {
        let start = month_start(year, month)?;
        let end = month_end(year, month)?;
        periods.push(ReportPeriod {
            label: start.format(MONTH_LABEL).to_string(),
            start: start_of_day(start),
            end: end_of_day(end),
        });

        if end >= last {
            break;
        }
        (year, month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
    }

    Ok(periods)
}
