//! Calendar month keys.
//!
//! A [`YearMonth`] is the granule every info record and every month-level
//! posting cache is keyed by. It is stored as the first day of the month so
//! every value is a real calendar month.
use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

pub const MIN_YEAR: i32 = 1950;
pub const MAX_YEAR: i32 = 2199;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "(i32, u32)", into = "(i32, u32)")]
pub struct YearMonth(NaiveDate);

impl YearMonth {
    /// Builds a validated key for an info record.
    pub fn new(year: i32, month: u32) -> ResultEngine<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(EngineError::InvalidArgument(format!(
                "year must be between {MIN_YEAR} and {MAX_YEAR}, got {year}"
            )));
        }
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(Self)
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("month must be between 1 and 12, got {month}"))
            })
    }

    /// The month of a status date; dates outside the supported years are
    /// rejected.
    pub fn of_status_date(status_date: NaiveDate) -> ResultEngine<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&status_date.year()) {
            return Err(EngineError::InvalidArgument(format!(
                "status date must be between {MIN_YEAR} and {MAX_YEAR}, got {status_date}"
            )));
        }
        Ok(Self::from_date(status_date))
    }

    /// The month `date` falls in.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.0.month()
    }

    /// `year * 100 + month`, the integer key used by lookup indexes.
    #[must_use]
    pub fn key(self) -> i32 {
        self.year() * 100 + self.month() as i32
    }

    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        self.0
    }

    #[must_use]
    pub fn last_day(self) -> NaiveDate {
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    #[must_use]
    pub fn next(self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }

    #[must_use]
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub_months(Months::new(1)).map(Self)
    }

    /// `true` when `date` is the first day of this month.
    #[must_use]
    pub fn starts_on(self, date: NaiveDate) -> bool {
        self.0 == date
    }

    /// `true` when `date` is the last day of this month.
    #[must_use]
    pub fn ends_on(self, date: NaiveDate) -> bool {
        self.last_day() == date
    }

    #[must_use]
    pub fn contains(self, date: NaiveDate) -> bool {
        Self::from_date(date) == self
    }

    #[must_use]
    pub fn is_month_of(self, status_date: NaiveDate) -> bool {
        self.contains(status_date)
    }

    #[must_use]
    pub fn is_last_month_of(self, status_date: NaiveDate) -> bool {
        Self::from_date(status_date).prev() == Some(self)
    }

    #[must_use]
    pub fn is_year_to_date_of(self, status_date: NaiveDate) -> bool {
        self.year() == status_date.year() && self.month() <= status_date.month()
    }

    #[must_use]
    pub fn is_last_year_of(self, status_date: NaiveDate) -> bool {
        self.year() == status_date.year() - 1
    }

    /// December of the year before `status_date`.
    #[must_use]
    pub fn is_end_of_last_year_of(self, status_date: NaiveDate) -> bool {
        self.is_last_year_of(status_date) && self.month() == 12
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl TryFrom<(i32, u32)> for YearMonth {
    type Error = EngineError;

    fn try_from((year, month): (i32, u32)) -> Result<Self, Self::Error> {
        Self::new(year, month)
    }
}

impl From<YearMonth> for (i32, u32) {
    fn from(value: YearMonth) -> Self {
        (value.year(), value.month())
    }
}
