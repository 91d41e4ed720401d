//! Week bucketing of date ranges.
//!
//! A [`Bucketer`] carries one week-start convention; the engine builds all of
//! its bucketers from the same config so conventions never mix.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};
use crate::logging::{log, log_rejected, obj, v_str, Domain, Level};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Monday,
    Sunday,
}

impl WeekStart {
    /// First day of the week containing `date`; `None` before the calendar floor.
    pub fn week_of(&self, date: NaiveDate) -> Option<NaiveDate> {
        let back = match self {
            WeekStart::Monday => date.weekday().num_days_from_monday(),
            WeekStart::Sunday => date.weekday().num_days_from_sunday(),
        };
        date.checked_sub_days(Days::new(u64::from(back)))
    }
}

impl FromStr for WeekStart {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "monday" | "mon" | "iso" => Ok(WeekStart::Monday),
            "sunday" | "sun" => Ok(WeekStart::Sunday),
            other => Err(format!("unknown week start: {}", other)),
        }
    }
}

/// Inclusive calendar date range; `start <= end` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(EngineError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

/// One calendar week.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub label: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    /// Short date span, e.g. `Aug 05-Aug 11`.
    pub fn range_label(&self) -> String {
        format!(
            "{}-{}",
            self.start_date.format("%b %d"),
            self.end_date.format("%b %d")
        )
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.range_label())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bucketer {
    week_start: WeekStart,
}

impl Bucketer {
    pub fn new(week_start: WeekStart) -> Self {
        Self { week_start }
    }

    /// Every calendar week intersecting `[range_start, range_end]`, ascending.
    ///
    /// Partial weeks at either edge are included whole, so consecutive
    /// periods are contiguous and the union covers the range.
    pub fn bucketize(&self, range_start: NaiveDate, range_end: NaiveDate) -> Result<Vec<Period>> {
        let range = DateRange::new(range_start, range_end).map_err(|err| {
            log_rejected(Domain::Bucket, "invalid_range", &err.to_string());
            err
        })?;
        self.bucketize_range(&range)
    }

    /// Fails with `InvalidRange` when a bucket would leave the representable
    /// calendar.
    pub fn bucketize_range(&self, range: &DateRange) -> Result<Vec<Period>> {
        let out_of_calendar = || {
            let err = EngineError::InvalidRange {
                start: range.start(),
                end: range.end(),
            };
            log_rejected(Domain::Bucket, "out_of_calendar", &err.to_string());
            err
        };
        let mut periods = Vec::new();
        let mut week = self
            .week_start
            .week_of(range.start())
            .ok_or_else(out_of_calendar)?;
        loop {
            let period = self.period_starting(week).ok_or_else(out_of_calendar)?;
            let next = period.end_date.succ_opt();
            periods.push(period);
            match next {
                Some(n) if n <= range.end() => week = n,
                _ => break,
            }
        }
        log(
            Level::Debug,
            Domain::Bucket,
            "bucketized",
            obj(&[
                ("start", v_str(&range.start().to_string())),
                ("end", v_str(&range.end().to_string())),
                ("periods", serde_json::json!(periods.len())),
            ]),
        );
        Ok(periods)
    }

    /// The period containing `date`.
    pub fn period_of(&self, date: NaiveDate) -> Result<Period> {
        self.week_start
            .week_of(date)
            .and_then(|start| self.period_starting(start))
            .ok_or(EngineError::InvalidRange { start: date, end: date })
    }

    fn period_starting(&self, start: NaiveDate) -> Option<Period> {
        // ISO week number of the Monday inside the bucket
        let monday = match self.week_start {
            WeekStart::Monday => start,
            WeekStart::Sunday => start.succ_opt()?,
        };
        Some(Period {
            label: format!("Week {}", monday.iso_week().week()),
            start_date: start,
            end_date: start.checked_add_days(Days::new(6))?,
        })
    }
}

/// User-facing time frame choices, resolved against an explicit `today`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFrame {
    LastWeeks(u32),
    YearToDate,
    /// A whole calendar year, Jan 1 to Dec 31.
    Year(i32),
    Custom(DateRange),
}

impl TimeFrame {
    pub fn resolve(&self, today: NaiveDate) -> Result<DateRange> {
        match self {
            TimeFrame::LastWeeks(n) => {
                let start = today
                    .checked_sub_days(Days::new(u64::from(*n) * 7))
                    .ok_or_else(|| EngineError::InvalidTimeFrame(format!("weeks:{}", n)))?;
                DateRange::new(start, today)
            }
            TimeFrame::YearToDate => DateRange::new(today.with_ordinal(1).unwrap_or(today), today),
            TimeFrame::Year(year) => {
                let bad = || EngineError::InvalidTimeFrame(format!("year:{}", year));
                let start = NaiveDate::from_ymd_opt(*year, 1, 1).ok_or_else(bad)?;
                let end = NaiveDate::from_ymd_opt(*year, 12, 31).ok_or_else(bad)?;
                DateRange::new(start, end)
            }
            TimeFrame::Custom(range) => Ok(*range),
        }
    }
}

impl FromStr for TimeFrame {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || EngineError::InvalidTimeFrame(s.to_string());
        if s == "ytd" {
            return Ok(TimeFrame::YearToDate);
        }
        if let Some(n) = s.strip_prefix("weeks:") {
            return n.parse::<u32>().map(TimeFrame::LastWeeks).map_err(|_| invalid());
        }
        if let Some(y) = s.strip_prefix("year:") {
            let year = y.parse::<i32>().map_err(|_| invalid())?;
            // reject years chrono cannot represent at parse time
            NaiveDate::from_ymd_opt(year, 12, 31).ok_or_else(invalid)?;
            return Ok(TimeFrame::Year(year));
        }
        if let Some((a, b)) = s.split_once("..") {
            let parse = |d: &str| d.trim().parse::<NaiveDate>().map_err(|_| invalid());
            return Ok(TimeFrame::Custom(DateRange::new(parse(a)?, parse(b)?)?));
        }
        Err(invalid())
    }
}
