use chrono::{DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveTime, TimeZone};
use clap::ValueEnum;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    Day,
    Week,
    Month,
    Year,
}

/// Half-open reporting window `[start, end)` with its display label, derived
/// purely from an anchor date and a granularity.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodRange {
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
    pub label: String,
}

fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Week-number arithmetic carried over from the source dashboard. Not
/// ISO-8601: `ceil((dayOfYear + jan1Weekday + 1) / 7)` with Sunday = 0.
pub fn week_number(date: NaiveDate) -> u32 {
    let jan1 = date.with_ordinal(1).unwrap_or(date);
    let past_days = date.ordinal0() as i64;
    let jan1_weekday = jan1.weekday().num_days_from_sunday() as i64;
    ((past_days + jan1_weekday + 1 + 6) / 7) as u32
}

pub fn range(anchor: NaiveDate, granularity: Granularity) -> PeriodRange {
    match granularity {
        Granularity::Day => {
            let start = local_midnight(anchor);
            PeriodRange {
                start,
                end: local_midnight(anchor + Duration::days(1)),
                label: anchor.format("%A, %B %-d, %Y").to_string(),
            }
        }
        Granularity::Week => {
            let week_start = anchor - Duration::days(anchor.weekday().num_days_from_sunday() as i64);
            PeriodRange {
                start: local_midnight(week_start),
                end: local_midnight(week_start + Duration::days(7)),
                label: format!(
                    "Week {} - {}",
                    week_number(anchor),
                    week_start.format("%B %-d, %Y")
                ),
            }
        }
        Granularity::Month => {
            let first = anchor.with_day(1).unwrap_or(anchor);
            let next_first = first
                .checked_add_months(Months::new(1))
                .unwrap_or(first);
            PeriodRange {
                start: local_midnight(first),
                end: local_midnight(next_first),
                label: anchor.format("%B %Y").to_string(),
            }
        }
        Granularity::Year => {
            let jan1 = anchor.with_ordinal(1).unwrap_or(anchor);
            let next_jan1 = jan1.checked_add_months(Months::new(12)).unwrap_or(jan1);
            PeriodRange {
                start: local_midnight(jan1),
                end: local_midnight(next_jan1),
                label: anchor.format("%Y").to_string(),
            }
        }
    }
}

/// Shifts the anchor by one period per unit of `direction`, using calendar
/// arithmetic for months and years so day-of-month overflow clamps instead of
/// rolling into the following month.
pub fn navigate(anchor: NaiveDate, granularity: Granularity, direction: i32) -> NaiveDate {
    match granularity {
        Granularity::Day => anchor + Duration::days(direction as i64),
        Granularity::Week => anchor + Duration::days(7 * direction as i64),
        Granularity::Month => shift_months(anchor, direction),
        Granularity::Year => shift_months(anchor, direction.saturating_mul(12)),
    }
}

fn shift_months(anchor: NaiveDate, months: i32) -> NaiveDate {
    if months >= 0 {
        anchor
            .checked_add_months(Months::new(months as u32))
            .unwrap_or(anchor)
    } else {
        anchor
            .checked_sub_months(Months::new(months.unsigned_abs()))
            .unwrap_or(anchor)
    }
}
