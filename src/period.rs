use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::DueDatePolicy;
use crate::errors::{BillingError, Result};
use crate::member::Member;
use crate::types::BillingFrequency;

/// one billing cycle key, formatted as "YYYY-MM"
///
/// Totally ordered by (year, month). For monthly members the key is the
/// calendar month itself; for other cadences it is the month in which the
/// member's own cycle begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::InvalidPeriod {
                value: format!("{}-{}", year, month),
            });
        }
        Ok(Self { year, month })
    }

    /// period containing the given date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// period n calendar months after this one
    pub fn plus_months(&self, n: u32) -> Self {
        let total = self.year as i64 * 12 + (self.month as i64 - 1) + n as i64;
        Self {
            year: total.div_euclid(12) as i32,
            month: (total.rem_euclid(12) + 1) as u32,
        }
    }

    /// whole calendar months from `earlier` to this period; negative if earlier is later
    pub fn months_since(&self, earlier: Period) -> i64 {
        (self.year as i64 * 12 + self.month as i64)
            - (earlier.year as i64 * 12 + earlier.month as i64)
    }

    /// first calendar day of the period's month
    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("month validated at construction")
    }

    /// last calendar day of the period's month
    pub fn last_day(&self) -> NaiveDate {
        let next = self.plus_months(1);
        next.first_day().pred_opt().expect("date in supported range")
    }

    /// number of days in the period's month
    pub fn days_in_month(&self) -> u32 {
        self.last_day().day()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BillingError::InvalidPeriod {
            value: s.to_string(),
        };
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Period::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Period {
    type Error = BillingError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> String {
        p.to_string()
    }
}

/// deterministic mapping from a member's cadence to billing periods
///
/// Monthly members bill on the calendar-month grid. Every other cadence is
/// anchored to the member's own start date, so two quarterly members with
/// different start months bill on different quarter boundaries.
#[derive(Debug, Clone)]
pub struct PeriodCalendar {
    due_date_policy: DueDatePolicy,
}

impl PeriodCalendar {
    pub fn new(due_date_policy: DueDatePolicy) -> Self {
        Self { due_date_policy }
    }

    /// the member's first billing period
    pub fn start_period(&self, member: &Member) -> Period {
        Period::from_date(member.start_date)
    }

    /// whether the member's cadence bills in the given period
    pub fn bills_in(&self, member: &Member, period: Period) -> bool {
        let start = self.start_period(member);
        let delta = period.months_since(start);
        delta >= 0 && delta % member.frequency.months() as i64 == 0
    }

    /// ordered billing periods for the member intersecting [from, to]
    ///
    /// No gaps, no duplicates; empty when the range ends before the member's
    /// start period.
    pub fn periods_between(&self, member: &Member, from: Period, to: Period) -> Vec<Period> {
        let start = self.start_period(member);
        let step = member.frequency.months();
        let mut current = if from <= start {
            start
        } else {
            // first cycle boundary at or after `from`
            let delta = from.months_since(start);
            let cycles = (delta + step as i64 - 1) / step as i64;
            start.plus_months((cycles * step as i64) as u32)
        };

        let mut periods = Vec::new();
        while current <= to {
            periods.push(current);
            current = current.plus_months(step);
        }
        periods
    }

    /// first calendar day of the member's cycle labeled by `period`
    ///
    /// Monthly cycles start on the 1st; anchored cadences start on the
    /// member's start day-of-month, clamped to the month length.
    pub fn cycle_anchor(&self, member: &Member, period: Period) -> NaiveDate {
        match member.frequency {
            BillingFrequency::Monthly => period.first_day(),
            _ => {
                let day = member.start_date.day().min(period.days_in_month());
                NaiveDate::from_ymd_opt(period.year(), period.month(), day)
                    .expect("day clamped to month length")
            }
        }
    }

    /// invoice due date for the member's cycle under the configured policy
    pub fn due_date(&self, member: &Member, period: Period) -> NaiveDate {
        let anchor = self.cycle_anchor(member, period);
        match self.due_date_policy {
            DueDatePolicy::PeriodStart => anchor,
            DueDatePolicy::PeriodEnd => {
                let next = period.plus_months(member.frequency.months());
                self.cycle_anchor(member, next)
                    .pred_opt()
                    .expect("date in supported range")
            }
            DueDatePolicy::DaysAfterStart(days) => {
                anchor + chrono::Duration::days(days as i64)
            }
        }
    }
}

impl Default for PeriodCalendar {
    fn default() -> Self {
        Self::new(DueDatePolicy::PeriodStart)
    }
}
