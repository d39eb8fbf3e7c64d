// src/common/periods.rs

use chrono::{Datelike, Duration, NaiveDate};

use crate::common::dates::{first_of_month, first_of_quarter, first_of_year, last_of_month, monday_of_week};
use crate::models::finance::PeriodType;

/// A calendar period with its canonical key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodWindow {
    pub period_type: PeriodType,
    pub period_key: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl PeriodWindow {
    pub fn num_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

/// The period of `period_type` that contains `date`.
pub fn period_containing(period_type: PeriodType, date: NaiveDate) -> PeriodWindow {
    let (start_date, end_date) = match period_type {
        PeriodType::Daily => (date, date),
        PeriodType::Weekly => {
            let monday = monday_of_week(date);
            (monday, monday + Duration::days(6))
        }
        PeriodType::Monthly => (first_of_month(date), last_of_month(date)),
        PeriodType::Quarterly => {
            let start = first_of_quarter(date);
            let last_month = first_of_month(first_of_month(start + Duration::days(32)) + Duration::days(32));
            (start, last_of_month(last_month))
        }
        PeriodType::Yearly => {
            let start = first_of_year(date);
            let next_year = first_of_year(start + Duration::days(366));
            (start, next_year - Duration::days(1))
        }
    };

    PeriodWindow {
        period_type,
        period_key: period_key(period_type, date),
        start_date,
        end_date,
    }
}

/// Canonical key: `yyyy-MM-dd`, `yyyy-'W'ww` (ISO week-year), `yyyy-MM`, `yyyy-'Q'q`, `yyyy`.
pub fn period_key(period_type: PeriodType, date: NaiveDate) -> String {
    match period_type {
        PeriodType::Daily => date.format("%Y-%m-%d").to_string(),
        PeriodType::Weekly => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        PeriodType::Monthly => date.format("%Y-%m").to_string(),
        PeriodType::Quarterly => format!("{}-Q{}", date.year(), date.month0() / 3 + 1),
        PeriodType::Yearly => date.year().to_string(),
    }
}

/// True when `date` is the last day of its period. Daily periods always close.
pub fn closes_on(period_type: PeriodType, date: NaiveDate) -> bool {
    period_containing(period_type, date).end_date == date
}

/// Periods to (re)compute for a run targeting `date`.
///
/// The daily period is always included; the others only when `date` is their
/// last day, so a weekly/monthly/... row never holds a partial period.
pub fn periods_closing_on(date: NaiveDate) -> Vec<PeriodWindow> {
    PeriodType::ALL
        .into_iter()
        .filter(|p| closes_on(*p, date))
        .map(|p| period_containing(p, date))
        .collect()
}
