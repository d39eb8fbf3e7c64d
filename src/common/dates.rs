// src/common/dates.rs

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Utc,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::common::error::AppError;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DEFAULT_PRESET_DAYS: i64 = 30;
/// Longest range a caller may ask for, explicit or preset (two years and a leap day).
pub const MAX_RANGE_DAYS: i64 = 731;
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 9999;

/// Half-open instant window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Maps calendar days of the business to UTC instants.
///
/// All day boundaries are taken in a single fixed offset, so a "day" is always
/// 24 hours long and `day_window(d).end == day_window(d + 1).start`.
#[derive(Debug, Clone, Copy)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let shifted = local - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&shifted)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    pub fn day_window(&self, date: NaiveDate) -> TimeWindow {
        self.range_window(date, date)
    }

    /// Window covering the calendar days `first..=last`.
    pub fn range_window(&self, first: NaiveDate, last: NaiveDate) -> TimeWindow {
        TimeWindow {
            start: self.to_utc(first.and_time(NaiveTime::MIN)),
            end: self.to_utc((last + Duration::days(1)).and_time(NaiveTime::MIN)),
        }
    }
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[schema(value_type = String, format = Date, example = "2024-03-01")]
    pub start: NaiveDate,
    #[schema(value_type = String, format = Date, example = "2024-03-31")]
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn num_days(&self) -> i64 {
        if self.is_inverted() {
            0
        } else {
            (self.end - self.start).num_days() + 1
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// The range of equal length that ends the day before this one starts.
    /// Saturates at `NaiveDate::MIN` instead of overflowing.
    pub fn preceding(&self) -> DateRange {
        let len = self.num_days().max(1);
        let back = |days: i64| {
            self.start
                .checked_sub_signed(Duration::days(days))
                .unwrap_or(NaiveDate::MIN)
        };
        DateRange::new(back(len), back(1))
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let start = self.start;
        (0..self.num_days()).map(move |offset| start + Duration::days(offset))
    }

    /// Builds a range from explicit `start`/`end` parameters or a named preset.
    ///
    /// Explicit dates win over the preset. With neither, the last 30 days are used.
    /// An inverted explicit range is returned as-is: callers render it as empty.
    pub fn resolve(
        start: Option<&str>,
        end: Option<&str>,
        preset: Option<&str>,
        today: NaiveDate,
    ) -> Result<DateRange, AppError> {
        match (non_blank(start), non_blank(end)) {
            (Some(start), Some(end)) => {
                let range = DateRange::new(parse_date(start)?, parse_date(end)?);
                if range.num_days() > MAX_RANGE_DAYS {
                    return Err(AppError::InvalidDateRange(format!(
                        "Date ranges are limited to {} days.",
                        MAX_RANGE_DAYS
                    )));
                }
                Ok(range)
            }
            (Some(_), None) | (None, Some(_)) => Err(AppError::InvalidDateRange(
                "Both 'start' and 'end' must be provided together.".to_string(),
            )),
            (None, None) => match non_blank(preset) {
                Some(preset) => Self::from_preset(preset, today),
                None => Ok(Self::last_days(DEFAULT_PRESET_DAYS, today)),
            },
        }
    }

    pub fn from_preset(preset: &str, today: NaiveDate) -> Result<DateRange, AppError> {
        let normalized = preset.trim().to_ascii_lowercase();
        let range = match normalized.as_str() {
            "today" => DateRange::single(today),
            "yesterday" => DateRange::single(today - Duration::days(1)),
            "mtd" => DateRange::new(first_of_month(today), today),
            "qtd" => DateRange::new(first_of_quarter(today), today),
            "ytd" => DateRange::new(first_of_year(today), today),
            other => {
                let days = other
                    .strip_suffix('d')
                    .and_then(|n| n.parse::<i64>().ok())
                    .filter(|n| (1..=MAX_RANGE_DAYS).contains(n))
                    .ok_or_else(|| {
                        AppError::InvalidDateRange(format!("Unknown date range preset '{}'.", preset))
                    })?;
                Self::last_days(days, today)
            }
        };
        Ok(range)
    }

    fn last_days(days: i64, today: NaiveDate) -> DateRange {
        DateRange::new(today - Duration::days(days - 1), today)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses `yyyy-MM-dd`. Years outside 1900..=9999 are rejected, so day
/// arithmetic on the result cannot overflow.
pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    let invalid = || {
        AppError::InvalidDateRange(format!("'{}' is not a valid date (expected yyyy-MM-dd).", value))
    };
    let date = NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| invalid())?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        return Err(invalid());
    }
    Ok(date)
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    first_of_month(first_of_month(date) + Duration::days(32)) - Duration::days(1)
}

pub fn first_of_quarter(date: NaiveDate) -> NaiveDate {
    let mut start = first_of_month(date);
    while start.month0() % 3 != 0 {
        start = first_of_month(start - Duration::days(1));
    }
    start
}

pub fn first_of_year(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.ordinal0()))
}

pub fn monday_of_week(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_window_honors_business_offset() {
        let clock = BusinessClock::new(FixedOffset::east_opt(5 * 3600 + 1800).unwrap());
        let window = clock.day_window(d(2024, 3, 15));

        assert_eq!(window.start.to_rfc3339(), "2024-03-14T18:30:00+00:00");
        assert_eq!(window.end.to_rfc3339(), "2024-03-15T18:30:00+00:00");
        assert!(window.contains(window.start));
        assert!(!window.contains(window.end));
    }

    #[test]
    fn consecutive_day_windows_touch() {
        let clock = BusinessClock::utc();
        assert_eq!(clock.day_window(d(2024, 2, 28)).end, clock.day_window(d(2024, 2, 29)).start);
    }

    #[test]
    fn preceding_range_has_equal_length() {
        let range = DateRange::new(d(2024, 3, 1), d(2024, 3, 10));
        let prev = range.preceding();
        assert_eq!(prev, DateRange::new(d(2024, 2, 20), d(2024, 2, 29)));
        assert_eq!(prev.num_days(), range.num_days());
    }

    #[test]
    fn inverted_range_has_no_days() {
        let range = DateRange::new(d(2024, 3, 10), d(2024, 3, 1));
        assert!(range.is_inverted());
        assert_eq!(range.num_days(), 0);
        assert_eq!(range.days().count(), 0);
    }

    #[test]
    fn presets_resolve_relative_to_today() {
        let today = d(2024, 5, 20);
        assert_eq!(
            DateRange::resolve(None, None, Some("7d"), today).unwrap(),
            DateRange::new(d(2024, 5, 14), today)
        );
        assert_eq!(
            DateRange::resolve(None, None, Some("ytd"), today).unwrap(),
            DateRange::new(d(2024, 1, 1), today)
        );
        assert_eq!(
            DateRange::resolve(None, None, Some("qtd"), today).unwrap(),
            DateRange::new(d(2024, 4, 1), today)
        );
        assert_eq!(
            DateRange::resolve(None, None, None, today).unwrap().num_days(),
            30
        );
    }

    #[test]
    fn explicit_dates_win_over_preset() {
        let range =
            DateRange::resolve(Some("2024-01-05"), Some("2024-01-07"), Some("ytd"), d(2024, 5, 1))
                .unwrap();
        assert_eq!(range, DateRange::new(d(2024, 1, 5), d(2024, 1, 7)));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let today = d(2024, 5, 20);
        assert!(matches!(
            DateRange::resolve(Some("2024-13-01"), Some("2024-12-01"), None, today),
            Err(AppError::InvalidDateRange(_))
        ));
        assert!(matches!(
            DateRange::resolve(Some("2024-01-01"), None, None, today),
            Err(AppError::InvalidDateRange(_))
        ));
        assert!(matches!(
            DateRange::resolve(None, None, Some("fortnight"), today),
            Err(AppError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn extreme_years_are_rejected() {
        let today = d(2024, 5, 20);
        assert!(matches!(parse_date("+262143-12-31"), Err(AppError::InvalidDateRange(_))));
        assert!(matches!(parse_date("-200000-01-01"), Err(AppError::InvalidDateRange(_))));
        assert!(matches!(parse_date("1899-12-31"), Err(AppError::InvalidDateRange(_))));
        assert_eq!(parse_date("9999-12-31").unwrap(), d(9999, 12, 31));
        assert!(matches!(
            DateRange::resolve(Some("-200000-01-01"), Some("+200000-01-01"), None, today),
            Err(AppError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn explicit_ranges_are_capped() {
        let today = d(2024, 5, 20);
        assert_eq!(
            DateRange::resolve(Some("2023-01-01"), Some("2024-12-31"), None, today)
                .unwrap()
                .num_days(),
            MAX_RANGE_DAYS
        );
        assert!(matches!(
            DateRange::resolve(Some("2000-01-01"), Some("2024-01-01"), None, today),
            Err(AppError::InvalidDateRange(_))
        ));
        assert!(matches!(
            DateRange::resolve(None, None, Some("5000d"), today),
            Err(AppError::InvalidDateRange(_))
        ));
    }

    #[test]
    fn preceding_saturates_at_the_calendar_floor() {
        let range = DateRange::new(NaiveDate::MIN, d(2024, 1, 1));
        let prev = range.preceding();
        assert_eq!(prev.start, NaiveDate::MIN);
        assert_eq!(prev.end, NaiveDate::MIN);
    }

    #[test]
    fn month_and_quarter_edges() {
        assert_eq!(last_of_month(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(last_of_month(d(2023, 12, 31)), d(2023, 12, 31));
        assert_eq!(first_of_quarter(d(2024, 12, 31)), d(2024, 10, 1));
        assert_eq!(monday_of_week(d(2024, 3, 17)), d(2024, 3, 11));
    }
}
