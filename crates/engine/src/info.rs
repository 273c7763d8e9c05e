//! Per-month calculation units and their collections.
//!
//! An info record holds the monthly inputs of an account (a credit line, a
//! budget, nothing at all for contacts) and the values calculated from the
//! account's postings for that month. An [`InfoCollection`] keeps one record
//! per calendar month, fills the months the summaries need and reduces the
//! records to a [`StatusSummary`] for the collection's status date.
use std::{collections::HashMap, fmt::Debug, ops::Add, sync::RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, PostingLineCollection, ResultEngine, YearMonth,
    cache::CacheCell,
    status::StatusGuard,
    util::{read_lock, write_lock},
};

pub mod budget;
pub mod contact;
pub mod credit;

/// The four value sets every calculated aggregate reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary<V> {
    pub at_status_date: V,
    pub end_of_last_month: V,
    pub year_to_date: V,
    pub end_of_last_year: V,
}

impl<V: Copy> StatusSummary<V> {
    pub fn map<U>(self, f: impl Fn(V) -> U) -> StatusSummary<U> {
        StatusSummary {
            at_status_date: f(self.at_status_date),
            end_of_last_month: f(self.end_of_last_month),
            year_to_date: f(self.year_to_date),
            end_of_last_year: f(self.end_of_last_year),
        }
    }
}

impl<V: Add<Output = V>> Add for StatusSummary<V> {
    type Output = StatusSummary<V>;

    fn add(self, rhs: Self) -> Self::Output {
        StatusSummary {
            at_status_date: self.at_status_date + rhs.at_status_date,
            end_of_last_month: self.end_of_last_month + rhs.end_of_last_month,
            year_to_date: self.year_to_date + rhs.year_to_date,
            end_of_last_year: self.end_of_last_year + rhs.end_of_last_year,
        }
    }
}

/// Protection and deletion flags shared by every info record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InfoFlags {
    protected: bool,
    deletable: bool,
}

impl InfoFlags {
    pub fn is_protected(self) -> bool {
        self.protected
    }

    pub fn is_deletable(self) -> bool {
        self.deletable
    }

    pub(crate) fn ensure_mutable(self, what: &str) -> ResultEngine<()> {
        if self.protected {
            return Err(EngineError::Unsupported(format!("{what} is protected")));
        }
        Ok(())
    }
}

/// One per-month calculation unit.
pub trait InfoRecord: Clone + Debug + Send + Sync {
    type Values: Copy + Debug + Default + Add<Output = Self::Values> + Send + Sync;

    /// Human readable kind used in error messages.
    const KIND: &'static str;

    fn year_month(&self) -> YearMonth;

    /// Builds the record for a month missing from a collection; `previous` is
    /// the nearest earlier record, if any.
    fn populate(year_month: YearMonth, previous: Option<&Self>) -> Self;

    fn calculate(
        &mut self,
        status_date: NaiveDate,
        posting_lines: &PostingLineCollection,
    ) -> ResultEngine<()>;

    fn values(&self) -> Self::Values;

    fn flags(&self) -> InfoFlags;

    fn flags_mut(&mut self) -> &mut InfoFlags;

    /// Reduces calculated records to the status summary.
    ///
    /// The default selects the single record matching each period, which is
    /// right for running balances: a balance carried from the first posting
    /// already includes the whole year, so its year-to-date value is the
    /// record of the status month.
    fn summarize(records: &[Self], status_date: NaiveDate) -> StatusSummary<Self::Values> {
        let pick = |matches: fn(YearMonth, NaiveDate) -> bool| {
            records
                .iter()
                .find(|record| matches(record.year_month(), status_date))
                .map(Self::values)
                .unwrap_or_default()
        };

        StatusSummary {
            at_status_date: pick(YearMonth::is_month_of),
            end_of_last_month: pick(YearMonth::is_last_month_of),
            // running balance to date
            year_to_date: pick(YearMonth::is_month_of),
            end_of_last_year: pick(YearMonth::is_end_of_last_year_of),
        }
    }
}

/// Month-keyed records of one account.
///
/// Records are kept sorted by month; lookups go through a lazily built
/// `year * 100 + month` index that is dropped on every insert.
#[derive(Debug)]
pub struct InfoCollection<T: InfoRecord> {
    records: RwLock<Vec<T>>,
    index: CacheCell<HashMap<i32, usize>>,
    summary: RwLock<StatusSummary<T::Values>>,
    protected: RwLock<bool>,
    guard: StatusGuard,
}

impl<T: InfoRecord> InfoCollection<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            index: CacheCell::new(),
            summary: RwLock::new(StatusSummary::default()),
            protected: RwLock::new(false),
            guard: StatusGuard::new(),
        }
    }

    pub fn len(&self) -> usize {
        read_lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.records).is_empty()
    }

    pub fn status_date(&self) -> Option<NaiveDate> {
        self.guard.status_date()
    }

    pub fn summary(&self) -> StatusSummary<T::Values> {
        *read_lock(&self.summary)
    }

    pub fn is_protected(&self) -> bool {
        *read_lock(&self.protected)
    }

    /// A protected collection whose records may all be deleted.
    pub fn deletable(&self) -> bool {
        self.is_protected() && read_lock(&self.records).iter().all(|r| r.flags().is_deletable())
    }

    pub fn add(&self, record: T) -> ResultEngine<()> {
        self.add_many([record])
    }

    /// Adds every record or none of them.
    pub fn add_many(&self, records: impl IntoIterator<Item = T>) -> ResultEngine<()> {
        if self.is_protected() {
            return Err(EngineError::Unsupported(format!(
                "{} collection is protected",
                T::KIND
            )));
        }

        let mut current = write_lock(&self.records);
        let mut incoming: Vec<T> = Vec::new();
        for record in records {
            let year_month = record.year_month();
            let exists = current.iter().chain(incoming.iter()).any(|r| r.year_month() == year_month);
            if exists {
                return Err(EngineError::ExistingKey(format!("{} {year_month}", T::KIND)));
            }
            incoming.push(record);
        }

        for record in incoming {
            let position = current.partition_point(|r| r.year_month() < record.year_month());
            current.insert(position, record);
        }
        drop(current);
        self.index.invalidate();
        Ok(())
    }

    /// Mutates the numeric inputs of the record for `year_month`.
    pub fn update(
        &self,
        year_month: YearMonth,
        update: impl FnOnce(&mut T) -> ResultEngine<()>,
    ) -> ResultEngine<()> {
        let position = self
            .position(year_month)
            .ok_or_else(|| EngineError::KeyNotFound(format!("{} {year_month}", T::KIND)))?;
        let mut records = write_lock(&self.records);
        let record = records
            .get_mut(position)
            .ok_or_else(|| EngineError::KeyNotFound(format!("{} {year_month}", T::KIND)))?;
        record.flags().ensure_mutable(T::KIND)?;
        update(record)
    }

    pub fn allow_deletion(&self, year_month: YearMonth) -> ResultEngine<()> {
        let position = self
            .position(year_month)
            .ok_or_else(|| EngineError::KeyNotFound(format!("{} {year_month}", T::KIND)))?;
        if let Some(record) = write_lock(&self.records).get_mut(position) {
            record.flags_mut().deletable = true;
        }
        Ok(())
    }

    /// Marks every record and the collection itself as immutable.
    pub fn apply_protection(&self) {
        for record in write_lock(&self.records).iter_mut() {
            record.flags_mut().protected = true;
        }
        *write_lock(&self.protected) = true;
    }

    pub fn find(&self, date: NaiveDate) -> Option<T> {
        self.get(YearMonth::from_date(date))
    }

    /// The record of the month `date` falls in, or the nearest earlier one.
    pub fn find_latest(&self, date: NaiveDate) -> Option<T> {
        let year_month = YearMonth::from_date(date);
        read_lock(&self.records)
            .iter()
            .rev()
            .find(|record| record.year_month() <= year_month)
            .cloned()
    }

    pub fn next(&self, record: &T) -> Option<T> {
        record.year_month().next().and_then(|next| self.get(next))
    }

    pub fn prev(&self, record: &T) -> Option<T> {
        record.year_month().prev().and_then(|prev| self.get(prev))
    }

    pub fn first(&self) -> Option<T> {
        read_lock(&self.records).first().cloned()
    }

    pub fn last(&self) -> Option<T> {
        read_lock(&self.records).last().cloned()
    }

    pub fn records(&self) -> Vec<T> {
        read_lock(&self.records).clone()
    }

    /// Adds the months the summaries of `status_date` rely on.
    ///
    /// Fills every month from the earliest of the first record and December
    /// of the previous year up to the month of `status_date`.
    pub fn ensure_population(&self, status_date: NaiveDate) -> ResultEngine<()> {
        let status_month = YearMonth::of_status_date(status_date)?;
        let end_of_last_year =
            YearMonth::new(status_month.year() - 1, 12).unwrap_or(status_month);

        let mut records = write_lock(&self.records);
        let mut month = records
            .first()
            .map(|first| first.year_month().min(end_of_last_year))
            .unwrap_or(end_of_last_year);

        let protected = self.is_protected();
        let mut populated = Vec::new();
        let mut previous: Option<T> = None;
        while month <= status_month {
            match records.iter().find(|r| r.year_month() == month) {
                Some(existing) => previous = Some(existing.clone()),
                None => {
                    let mut record = T::populate(month, previous.as_ref());
                    record.flags_mut().protected = protected;
                    previous = Some(record.clone());
                    populated.push(record);
                }
            }
            match month.next() {
                Some(next) => month = next,
                None => break,
            }
        }

        if populated.is_empty() {
            return Ok(());
        }
        tracing::trace!(kind = T::KIND, count = populated.len(), "populating info records");
        records.extend(populated);
        records.sort_by_key(InfoRecord::year_month);
        drop(records);
        self.index.invalidate();
        Ok(())
    }

    /// Calculates every record for `status_date` and refreshes the summary.
    pub async fn calculate(
        &self,
        status_date: NaiveDate,
        posting_lines: &PostingLineCollection,
    ) -> ResultEngine<()> {
        self.guard
            .run(T::KIND, status_date, move || async move {
                self.ensure_population(status_date)?;
                let mut records = write_lock(&self.records);
                for record in records.iter_mut() {
                    record.calculate(status_date, posting_lines)?;
                }
                let summary = T::summarize(&records, status_date);
                drop(records);
                *write_lock(&self.summary) = summary;
                Ok(())
            })
            .await?;
        Ok(())
    }

    fn get(&self, year_month: YearMonth) -> Option<T> {
        let position = self.position(year_month)?;
        read_lock(&self.records).get(position).cloned()
    }

    fn position(&self, year_month: YearMonth) -> Option<usize> {
        let index = self.index.get_or_build(|| {
            read_lock(&self.records)
                .iter()
                .enumerate()
                .map(|(position, record)| (record.year_month().key(), position))
                .collect()
        });
        index.get(&year_month.key()).copied()
    }
}

impl<T: InfoRecord> Default for InfoCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}
